use crate::domain::Domain;
use crate::error::Result;
use crate::pipeline::frame::{Cell, Frame};
use crate::pipeline::processing::schema::{
    coerce_key_to_text, normalize_schema, require_candidate, resolve_key, FACT_KEY_CANDIDATES,
    PERFORMANCE_DATE_CANDIDATES,
};

use super::{
    coerce_numeric_column, derive_calendar, parse_number, parse_temporal_column,
    sort_by_key_and_time, CalendarPart, CleanOutcome, CleanReport, Cleaner, CoercionReason,
};

const DATASET: &str = "performance";
const DATE_COLUMN: &str = "review_date";

const RATING_SCALE: &[(&str, i64)] = &[
    ("needs improvement", 1),
    ("meets expectations", 2),
    ("exceeds expectations", 3),
    ("outstanding", 4),
];

pub struct PerformanceCleaner;

impl Cleaner for PerformanceCleaner {
    fn domain(&self) -> Domain {
        Domain::Performance
    }

    fn clean(&self, mut frame: Frame) -> Result<CleanOutcome> {
        let mut report = CleanReport::new(frame.len());
        normalize_schema(&mut frame, DATASET)?;

        resolve_key(&mut frame, FACT_KEY_CANDIDATES, DATASET)?;
        let (date_column, _) =
            require_candidate(&frame, PERFORMANCE_DATE_CANDIDATES, DATASET, "review date")?;

        parse_temporal_column(&mut frame, date_column, &mut report);
        frame.rename_column(date_column, DATE_COLUMN);
        derive_calendar(&mut frame, DATE_COLUMN, &[CalendarPart::Year, CalendarPart::Quarter]);

        // Textual ratings map onto the ordinal scale, numeric ones stay numeric and
        // anything else is kept verbatim.
        frame.map_column("rating", |cell| match cell {
            Cell::Text(s) => {
                let key = s.trim().to_lowercase();
                if let Some((_, ordinal)) = RATING_SCALE.iter().find(|(label, _)| *label == key) {
                    Cell::Int(*ordinal)
                } else if let Some(number) = parse_number(s) {
                    number
                } else {
                    report.record("rating", CoercionReason::UnmappedCategory, s);
                    cell.clone()
                }
            }
            other => other.clone(),
        });
        coerce_numeric_column(&mut frame, "score", &mut report);

        coerce_key_to_text(&mut frame);
        sort_by_key_and_time(&mut frame, &[DATE_COLUMN]);

        report.rows_out = frame.len();
        Ok(CleanOutcome { frame, report })
    }
}
