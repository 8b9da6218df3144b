//! Per-domain cleaners turning a raw batch into a staging dataset.
//!
//! Structural problems (missing key or date column) fail the run with a schema error.
//! Value-level problems become nulls and are recorded as coercion warnings.

pub mod attendance;
pub mod employee;
pub mod engagement;
pub mod performance;

use chrono::Datelike;
use serde::Serialize;
use std::fmt;
use tracing::warn;

use crate::constants::EMPLOYEE_KEY;
use crate::domain::Domain;
use crate::error::Result;
use crate::pipeline::frame::{Cell, Frame};
use crate::pipeline::processing::schema::{date_of, parse_temporal};

pub use attendance::AttendanceCleaner;
pub use employee::EmployeeCleaner;
pub use engagement::EngagementCleaner;
pub use performance::PerformanceCleaner;

/// Why a value was replaced by null (or kept verbatim) during cleaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CoercionReason {
    NotNumeric,
    UnmappedCategory,
    UnparseableDate,
}

impl fmt::Display for CoercionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CoercionReason::NotNumeric => "not numeric",
            CoercionReason::UnmappedCategory => "unmapped category",
            CoercionReason::UnparseableDate => "unparseable date",
        };
        f.write_str(s)
    }
}

/// Non-fatal coercion failures, aggregated per column and reason.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoercionWarning {
    pub column: String,
    pub reason: CoercionReason,
    pub count: usize,
    /// First offending raw value.
    pub sample: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CleanReport {
    pub rows_in: usize,
    pub rows_out: usize,
    pub duplicates_dropped: usize,
    warnings: Vec<CoercionWarning>,
}

impl CleanReport {
    pub fn new(rows_in: usize) -> Self {
        Self {
            rows_in,
            ..Self::default()
        }
    }

    pub fn record(&mut self, column: &str, reason: CoercionReason, value: &str) {
        match self
            .warnings
            .iter_mut()
            .find(|w| w.column == column && w.reason == reason)
        {
            Some(existing) => existing.count += 1,
            None => self.warnings.push(CoercionWarning {
                column: column.to_string(),
                reason,
                count: 1,
                sample: value.to_string(),
            }),
        }
    }

    pub fn warnings(&self) -> &[CoercionWarning] {
        &self.warnings
    }

    pub fn warning_count(&self) -> usize {
        self.warnings.iter().map(|w| w.count).sum()
    }

    pub fn warnings_for(&self, column: &str) -> usize {
        self.warnings
            .iter()
            .filter(|w| w.column == column)
            .map(|w| w.count)
            .sum()
    }

    pub fn log(&self, domain: Domain) {
        for w in &self.warnings {
            warn!(
                domain = %domain,
                column = %w.column,
                reason = %w.reason,
                count = w.count,
                sample = %w.sample,
                "values coerced to null"
            );
        }
        if self.duplicates_dropped > 0 {
            warn!(domain = %domain, dropped = self.duplicates_dropped, "duplicate keys dropped");
        }
    }
}

/// A cleaned dataset plus what happened to it.
#[derive(Debug, Clone)]
pub struct CleanOutcome {
    pub frame: Frame,
    pub report: CleanReport,
}

pub trait Cleaner: Send + Sync {
    fn domain(&self) -> Domain;

    /// Clean a raw (all-text) batch. Never writes anything.
    fn clean(&self, raw: Frame) -> Result<CleanOutcome>;
}

pub fn cleaner_for(domain: Domain) -> Box<dyn Cleaner> {
    match domain {
        Domain::Attendance => Box::new(AttendanceCleaner),
        Domain::Employee => Box::new(EmployeeCleaner),
        Domain::Engagement => Box::new(EngagementCleaner),
        Domain::Performance => Box::new(PerformanceCleaner),
    }
}

/// Calendar fields derivable from a date column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalendarPart {
    Year,
    Month,
    Weekday,
    Quarter,
}

impl CalendarPart {
    pub fn column(&self) -> &'static str {
        match self {
            CalendarPart::Year => "year",
            CalendarPart::Month => "month",
            CalendarPart::Weekday => "weekday",
            CalendarPart::Quarter => "quarter",
        }
    }

    fn extract(&self, cell: &Cell) -> Cell {
        let Some(date) = date_of(cell) else {
            return Cell::Null;
        };
        match self {
            CalendarPart::Year => Cell::Int(date.year() as i64),
            CalendarPart::Month => Cell::Int(date.month() as i64),
            CalendarPart::Weekday => Cell::Text(date.format("%A").to_string()),
            CalendarPart::Quarter => Cell::Int(((date.month() - 1) / 3 + 1) as i64),
        }
    }
}

/// Derived calendar columns never take part in numeric aggregation.
pub const CALENDAR_COLUMNS: &[&str] = &["year", "month", "weekday", "quarter"];

pub fn derive_calendar(frame: &mut Frame, source: &str, parts: &[CalendarPart]) {
    let Some(values) = frame.column(source) else {
        return;
    };
    let values: Vec<Cell> = values.into_iter().cloned().collect();
    for part in parts {
        let derived = values.iter().map(|c| part.extract(c)).collect();
        frame.set_column(part.column(), derived);
    }
}

/// Parse a column into dates/timestamps in place. Unparseable values become null.
pub fn parse_temporal_column(frame: &mut Frame, column: &str, report: &mut CleanReport) {
    frame.map_column(column, |cell| match cell {
        Cell::Text(s) => match parse_temporal(s) {
            Some(parsed) => parsed,
            None => {
                report.record(column, CoercionReason::UnparseableDate, s);
                Cell::Null
            }
        },
        other => other.clone(),
    });
}

/// Numeric coercion: integers stay integers, other numbers become floats,
/// anything else becomes null.
pub fn coerce_numeric_column(frame: &mut Frame, column: &str, report: &mut CleanReport) {
    frame.map_column(column, |cell| match cell {
        Cell::Text(s) => match parse_number(s) {
            Some(n) => n,
            None => {
                report.record(column, CoercionReason::NotNumeric, s);
                Cell::Null
            }
        },
        other => other.clone(),
    });
}

pub fn parse_number(raw: &str) -> Option<Cell> {
    let s = raw.trim();
    if let Ok(i) = s.parse::<i64>() {
        return Some(Cell::Int(i));
    }
    s.parse::<f64>()
        .ok()
        .filter(|f| f.is_finite())
        .map(Cell::Float)
}

/// Lower-cased, trimmed lookup into a fixed vocabulary. Nulls pass through;
/// values outside the vocabulary become null.
pub fn map_vocabulary(
    frame: &mut Frame,
    column: &str,
    vocabulary: &[(&str, Cell)],
    report: &mut CleanReport,
) {
    frame.map_column(column, |cell| match cell {
        Cell::Null => Cell::Null,
        other => {
            let raw = other.render();
            let key = raw.trim().to_lowercase();
            match vocabulary.iter().find(|(word, _)| *word == key) {
                Some((_, mapped)) => mapped.clone(),
                None => {
                    report.record(column, CoercionReason::UnmappedCategory, &raw);
                    Cell::Null
                }
            }
        }
    });
}

/// Sort by key, then by the most precise time field available.
pub fn sort_by_key_and_time(frame: &mut Frame, time_fields: &[&str]) {
    let mut columns = vec![EMPLOYEE_KEY];
    if let Some(field) = time_fields.iter().find(|f| frame.has_column(f)) {
        columns.push(*field);
    }
    frame.sort_by_columns(&columns);
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn report_aggregates_by_column_and_reason() {
        let mut report = CleanReport::new(3);
        report.record("age", CoercionReason::NotNumeric, "n/a");
        report.record("age", CoercionReason::NotNumeric, "unknown");
        report.record("attrition", CoercionReason::UnmappedCategory, "maybe");
        assert_eq!(report.warnings().len(), 2);
        assert_eq!(report.warnings_for("age"), 2);
        assert_eq!(report.warnings()[0].sample, "n/a");
        assert_eq!(report.warning_count(), 3);
    }

    #[test]
    fn calendar_parts_follow_the_date() {
        let d = Cell::Date(NaiveDate::from_ymd_opt(2022, 11, 4).unwrap());
        assert_eq!(CalendarPart::Year.extract(&d), Cell::Int(2022));
        assert_eq!(CalendarPart::Quarter.extract(&d), Cell::Int(4));
        assert_eq!(CalendarPart::Weekday.extract(&d), Cell::text("Friday"));
        assert_eq!(CalendarPart::Month.extract(&Cell::Null), Cell::Null);
    }

    #[test]
    fn numbers_parse_as_int_before_float() {
        assert_eq!(parse_number(" 42 "), Some(Cell::Int(42)));
        assert_eq!(parse_number("4.5"), Some(Cell::Float(4.5)));
        assert_eq!(parse_number("forty"), None);
        assert_eq!(parse_number("NaN"), None);
    }
}
