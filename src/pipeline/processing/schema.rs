//! Column-name normalization and ordered candidate lists for key/date discovery.
//!
//! Each list is `(candidate_name, canonical_name)` pairs evaluated in order; the first
//! candidate present in a dataset wins. New source formats are added here, not in the
//! cleaners.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

use crate::constants::EMPLOYEE_KEY;
use crate::error::{EtlError, Result};
use crate::pipeline::frame::{Cell, Frame};

pub type CandidateList = &'static [(&'static str, &'static str)];

pub const EMPLOYEE_KEY_CANDIDATES: CandidateList = &[
    (EMPLOYEE_KEY, EMPLOYEE_KEY),
    ("id", EMPLOYEE_KEY),
    ("employee_number", EMPLOYEE_KEY),
    ("emp_id", EMPLOYEE_KEY),
    ("employeeid", EMPLOYEE_KEY),
    ("employeenumber", EMPLOYEE_KEY),
];

/// Fact tables only accept the canonical key.
pub const FACT_KEY_CANDIDATES: CandidateList = &[(EMPLOYEE_KEY, EMPLOYEE_KEY)];

pub const ATTENDANCE_TIME_CANDIDATES: CandidateList = &[
    ("timestamp", "timestamp"),
    ("timestamp_local", "timestamp"),
    ("check_in", "timestamp"),
    ("date", "date"),
];

pub const ENGAGEMENT_DATE_CANDIDATES: CandidateList = &[
    ("survey_date", "survey_date"),
    ("date", "survey_date"),
    ("timestamp", "survey_date"),
];

pub const PERFORMANCE_DATE_CANDIDATES: CandidateList = &[
    ("review_date", "review_date"),
    ("date", "review_date"),
    ("timestamp", "review_date"),
];

static CAMEL_LOWER_UPPER: Lazy<Regex> = Lazy::new(|| Regex::new(r"([a-z0-9])([A-Z])").unwrap());
static CAMEL_ACRONYM: Lazy<Regex> = Lazy::new(|| Regex::new(r"([A-Z]+)([A-Z][a-z])").unwrap());
static SEPARATORS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\s\-]+").unwrap());
static UNDERSCORE_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"_{2,}").unwrap());

/// `" Monthly Income"` -> `monthly_income`, `EmployeeNumber` -> `employee_number`,
/// `check-in` -> `check_in`.
pub fn normalize_column_name(raw: &str) -> String {
    let trimmed = raw.trim_start_matches('\u{feff}').trim();
    let split = CAMEL_ACRONYM.replace_all(trimmed, "${1}_${2}");
    let split = CAMEL_LOWER_UPPER.replace_all(&split, "${1}_${2}");
    let lowered = split.to_lowercase();
    let underscored = SEPARATORS.replace_all(&lowered, "_");
    UNDERSCORE_RUNS.replace_all(&underscored, "_").into_owned()
}

/// Step 1 of every cleaner; must run before any column lookup.
/// Two raw headers that normalize to the same name are a schema error.
pub fn normalize_schema(frame: &mut Frame, dataset: &str) -> Result<()> {
    frame.rename_headers(normalize_column_name);
    let mut seen = HashSet::new();
    if let Some(duplicate) = frame.headers().iter().find(|h| !seen.insert(h.as_str())) {
        return Err(EtlError::schema(
            dataset,
            format!("several columns normalize to '{}'", duplicate),
        ));
    }
    Ok(())
}

pub fn resolve_candidate(
    frame: &Frame,
    candidates: CandidateList,
) -> Option<(&'static str, &'static str)> {
    candidates
        .iter()
        .copied()
        .find(|(candidate, _)| frame.has_column(candidate))
}

pub fn require_candidate(
    frame: &Frame,
    candidates: CandidateList,
    dataset: &str,
    field: &str,
) -> Result<(&'static str, &'static str)> {
    resolve_candidate(frame, candidates).ok_or_else(|| {
        let names: Vec<&str> = candidates.iter().map(|(c, _)| *c).collect();
        EtlError::schema(
            dataset,
            format!("no usable {} column found, expected one of: {}", field, names.join(", ")),
        )
    })
}

/// Find the key column through the candidate list and rename it to `employee_id`.
pub fn resolve_key(frame: &mut Frame, candidates: CandidateList, dataset: &str) -> Result<()> {
    let (found, canonical) = require_candidate(frame, candidates, dataset, "primary key")?;
    if found != canonical {
        frame.rename_column(found, canonical);
    }
    Ok(())
}

/// Force the key to trimmed text so `"007"` and `7` never collide or drift.
pub fn coerce_key_to_text(frame: &mut Frame) {
    frame.map_column(EMPLOYEE_KEY, |cell| match cell {
        Cell::Null => Cell::Null,
        Cell::Text(s) => Cell::Text(s.trim().to_string()),
        other => Cell::Text(other.render()),
    });
}

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d.%m.%Y"];

/// Parse a raw date or timestamp. Date-only inputs yield `Cell::Date`, anything with a
/// time component yields `Cell::DateTime` (offsets are dropped, wall-clock time kept).
pub fn parse_temporal(raw: &str) -> Option<Cell> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(Cell::DateTime(dt.naive_local()));
    }
    if let Some(dt) = DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
    {
        return Some(Cell::DateTime(dt));
    }
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
        .map(Cell::Date)
}

pub fn date_of(cell: &Cell) -> Option<NaiveDate> {
    match cell {
        Cell::Date(d) => Some(*d),
        Cell::DateTime(dt) => Some(dt.date()),
        _ => None,
    }
}
