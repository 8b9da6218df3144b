use std::collections::HashSet;

use crate::constants::EMPLOYEE_KEY;
use crate::domain::Domain;
use crate::error::Result;
use crate::pipeline::frame::{Cell, Frame};
use crate::pipeline::processing::schema::{
    coerce_key_to_text, normalize_schema, resolve_key, EMPLOYEE_KEY_CANDIDATES,
};

use super::{coerce_numeric_column, map_vocabulary, sort_by_key_and_time, CleanOutcome, CleanReport, Cleaner};

const DATASET: &str = "employee";
const NUMERIC_COLUMNS: &[&str] = &["age", "monthly_income"];
const YES_NO_COLUMNS: &[&str] = &["attrition", "over_time"];

pub struct EmployeeCleaner;

impl Cleaner for EmployeeCleaner {
    fn domain(&self) -> Domain {
        Domain::Employee
    }

    fn clean(&self, mut frame: Frame) -> Result<CleanOutcome> {
        let mut report = CleanReport::new(frame.len());
        normalize_schema(&mut frame, DATASET)?;
        resolve_key(&mut frame, EMPLOYEE_KEY_CANDIDATES, DATASET)?;
        coerce_key_to_text(&mut frame);
        report.duplicates_dropped = drop_duplicate_keys(&mut frame);

        frame.map_column("department", |cell| match cell {
            Cell::Text(s) => Cell::Text(title_case(s.trim())),
            other => other.clone(),
        });

        for column in NUMERIC_COLUMNS {
            coerce_numeric_column(&mut frame, column, &mut report);
        }

        let yes_no = vec![("yes", Cell::Int(1)), ("no", Cell::Int(0))];
        for column in YES_NO_COLUMNS {
            map_vocabulary(&mut frame, column, &yes_no, &mut report);
        }

        sort_by_key_and_time(&mut frame, &[]);
        report.rows_out = frame.len();
        Ok(CleanOutcome { frame, report })
    }
}

/// Keep the first row per non-null key; returns how many rows were dropped.
fn drop_duplicate_keys(frame: &mut Frame) -> usize {
    let Some(idx) = frame.column_index(EMPLOYEE_KEY) else {
        return 0;
    };
    let before = frame.len();
    let mut seen = HashSet::new();
    frame.retain_rows(|row| match &row[idx] {
        Cell::Null => true,
        key => seen.insert(key.render()),
    });
    before - frame.len()
}

/// Capitalize the first letter of every alphabetic run: `r&d` -> `R&D`,
/// `human resources` -> `Human Resources`.
pub fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_alpha = false;
    for ch in s.chars() {
        if prev_alpha {
            out.extend(ch.to_lowercase());
        } else {
            out.extend(ch.to_uppercase());
        }
        prev_alpha = ch.is_alphabetic();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(csv: &str) -> Frame {
        Frame::from_reader_untyped(csv.as_bytes()).unwrap()
    }

    #[test]
    fn employee_number_header_becomes_the_key() {
        let outcome = EmployeeCleaner
            .clean(raw("EmployeeNumber,Age,Department\n1,41,sales\n2,49,research & development\n"))
            .unwrap();
        let frame = outcome.frame;
        assert_eq!(frame.headers()[0], "employee_id");
        assert_eq!(frame.value(0, "employee_id"), Some(&Cell::text("1")));
        assert_eq!(frame.value(1, "department"), Some(&Cell::text("Research & Development")));
        assert_eq!(frame.value(0, "age"), Some(&Cell::Int(41)));
    }

    #[test]
    fn key_keeps_leading_zeros() {
        let outcome = EmployeeCleaner.clean(raw("employee_id\n007\n7\n")).unwrap();
        let keys: Vec<String> = outcome.frame.column("employee_id").unwrap().iter().map(|c| c.render()).collect();
        assert_eq!(keys, vec!["007", "7"]);
        assert_eq!(outcome.report.duplicates_dropped, 0);
    }

    #[test]
    fn value_coercion_failures_become_null() {
        let outcome = EmployeeCleaner
            .clean(raw(
                "emp_id,Age,Monthly Income,Attrition,OverTime\n\
                 1,forty,5000.5,Yes,no\n\
                 2,30,n/a,maybe,YES\n",
            ))
            .unwrap();
        let frame = &outcome.frame;
        assert_eq!(frame.value(0, "age"), Some(&Cell::Null));
        assert_eq!(frame.value(0, "monthly_income"), Some(&Cell::Float(5000.5)));
        assert_eq!(frame.value(1, "monthly_income"), Some(&Cell::Null));
        assert_eq!(frame.value(0, "attrition"), Some(&Cell::Int(1)));
        assert_eq!(frame.value(1, "attrition"), Some(&Cell::Null));
        assert_eq!(frame.value(0, "over_time"), Some(&Cell::Int(0)));
        assert_eq!(frame.value(1, "over_time"), Some(&Cell::Int(1)));
        assert_eq!(outcome.report.warning_count(), 3);
    }

    #[test]
    fn duplicate_keys_keep_first_row() {
        let outcome = EmployeeCleaner
            .clean(raw("employee_id,department\n5,sales\n5,it\n6,hr\n"))
            .unwrap();
        assert_eq!(outcome.frame.len(), 2);
        assert_eq!(outcome.frame.value(0, "department"), Some(&Cell::text("Sales")));
        assert_eq!(outcome.report.duplicates_dropped, 1);
    }

    #[test]
    fn missing_key_is_a_schema_error() {
        let err = EmployeeCleaner.clean(raw("name,age\nx,3\n")).unwrap_err();
        assert!(err.is_schema());
    }

    #[test]
    fn title_case_handles_symbols() {
        assert_eq!(title_case("r&d"), "R&D");
        assert_eq!(title_case("HUMAN resources"), "Human Resources");
    }
}
