use crate::constants::EMPLOYEE_KEY;
use crate::domain::Domain;
use crate::error::Result;
use crate::pipeline::frame::{Cell, Frame};
use crate::pipeline::processing::schema::{
    coerce_key_to_text, normalize_schema, require_candidate, resolve_key,
    ENGAGEMENT_DATE_CANDIDATES, FACT_KEY_CANDIDATES,
};

use super::{
    derive_calendar, map_vocabulary, parse_temporal_column, sort_by_key_and_time, CalendarPart,
    CleanOutcome, CleanReport, Cleaner, CALENDAR_COLUMNS,
};

const DATASET: &str = "engagement";
const DATE_COLUMN: &str = "survey_date";

pub fn likert_vocabulary() -> Vec<(&'static str, Cell)> {
    vec![
        ("strongly disagree", Cell::Int(1)),
        ("disagree", Cell::Int(2)),
        ("neutral", Cell::Int(3)),
        ("agree", Cell::Int(4)),
        ("strongly agree", Cell::Int(5)),
    ]
}

pub struct EngagementCleaner;

impl Cleaner for EngagementCleaner {
    fn domain(&self) -> Domain {
        Domain::Engagement
    }

    fn clean(&self, mut frame: Frame) -> Result<CleanOutcome> {
        let mut report = CleanReport::new(frame.len());
        normalize_schema(&mut frame, DATASET)?;

        resolve_key(&mut frame, FACT_KEY_CANDIDATES, DATASET)?;
        let (date_column, _) =
            require_candidate(&frame, ENGAGEMENT_DATE_CANDIDATES, DATASET, "survey date")?;

        parse_temporal_column(&mut frame, date_column, &mut report);
        frame.rename_column(date_column, DATE_COLUMN);
        derive_calendar(&mut frame, DATE_COLUMN, &[CalendarPart::Year, CalendarPart::Month]);

        let vocabulary = likert_vocabulary();
        for column in likert_columns(&frame, &vocabulary) {
            map_vocabulary(&mut frame, &column, &vocabulary, &mut report);
        }

        coerce_key_to_text(&mut frame);
        sort_by_key_and_time(&mut frame, &[DATE_COLUMN]);

        report.rows_out = frame.len();
        Ok(CleanOutcome { frame, report })
    }
}

/// Text columns holding at least one Likert answer. Columns without any are free text
/// (comments, ids) and stay untouched.
fn likert_columns(frame: &Frame, vocabulary: &[(&str, Cell)]) -> Vec<String> {
    frame
        .headers()
        .iter()
        .filter(|h| {
            h.as_str() != EMPLOYEE_KEY
                && h.as_str() != DATE_COLUMN
                && !CALENDAR_COLUMNS.contains(&h.as_str())
        })
        .filter(|h| {
            frame.column(h).map_or(false, |cells| {
                cells.iter().filter_map(|c| c.as_text()).any(|s| {
                    let key = s.trim().to_lowercase();
                    vocabulary.iter().any(|(word, _)| *word == key)
                })
            })
        })
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(csv: &str) -> Frame {
        Frame::from_reader_untyped(csv.as_bytes()).unwrap()
    }

    #[test]
    fn likert_columns_map_to_ordinals() {
        let outcome = EngagementCleaner
            .clean(raw(
                "survey_id,employee_id,Survey Date,Q Manager Support,comment_text\n\
                 10001,1,2022-05-01,Strongly Agree,great team\n\
                 10002,1,2022-11-01,neutral,\n\
                 10003,2,2022-05-01,disagree,meh\n",
            ))
            .unwrap();
        let frame = outcome.frame;
        let answers: Vec<Cell> = frame.column("q_manager_support").unwrap().into_iter().cloned().collect();
        assert_eq!(answers, vec![Cell::Int(5), Cell::Int(3), Cell::Int(2)]);
        assert_eq!(frame.value(0, "comment_text"), Some(&Cell::text("great team")));
        assert_eq!(frame.value(0, "survey_id"), Some(&Cell::text("10001")));
        assert_eq!(frame.value(1, "year"), Some(&Cell::Int(2022)));
        assert_eq!(frame.value(1, "month"), Some(&Cell::Int(11)));
    }

    #[test]
    fn comment_column_without_likert_words_is_untouched() {
        let outcome = EngagementCleaner
            .clean(raw(
                "employee_id,date,q_recognition,comment_text\n\
                 1,2022-05-01,agree,I would disagree with the new policy\n",
            ))
            .unwrap();
        let frame = outcome.frame;
        assert!(frame.has_column("survey_date"));
        assert_eq!(
            frame.value(0, "comment_text"),
            Some(&Cell::text("I would disagree with the new policy"))
        );
        assert_eq!(frame.value(0, "q_recognition"), Some(&Cell::Int(4)));
    }

    #[test]
    fn stray_values_in_a_likert_column_become_null() {
        let outcome = EngagementCleaner
            .clean(raw("employee_id,survey_date,q_growth\n1,2022-01-01,agree\n1,2022-02-01,N/A\n"))
            .unwrap();
        assert_eq!(outcome.frame.value(1, "q_growth"), Some(&Cell::Null));
        assert_eq!(outcome.report.warnings_for("q_growth"), 1);
    }

    #[test]
    fn missing_survey_date_is_a_schema_error() {
        let err = EngagementCleaner
            .clean(raw("employee_id,q1\n1,agree\n"))
            .unwrap_err();
        assert!(err.is_schema());
    }
}
