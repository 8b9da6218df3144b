use crate::domain::Domain;
use crate::error::Result;
use crate::pipeline::frame::{Cell, Frame};
use crate::pipeline::processing::schema::{
    coerce_key_to_text, date_of, normalize_schema, require_candidate, resolve_key,
    ATTENDANCE_TIME_CANDIDATES, FACT_KEY_CANDIDATES,
};

use super::{
    derive_calendar, map_vocabulary, parse_temporal_column, sort_by_key_and_time, CalendarPart,
    CleanOutcome, CleanReport, Cleaner,
};

const DATASET: &str = "attendance";

/// Presence score per normalized status.
pub fn status_vocabulary() -> Vec<(&'static str, Cell)> {
    vec![
        ("present", Cell::Float(1.0)),
        ("remote", Cell::Float(1.0)),
        ("late", Cell::Float(0.5)),
        ("leave", Cell::Float(0.0)),
        ("absent", Cell::Float(0.0)),
    ]
}

pub struct AttendanceCleaner;

impl Cleaner for AttendanceCleaner {
    fn domain(&self) -> Domain {
        Domain::Attendance
    }

    fn clean(&self, mut frame: Frame) -> Result<CleanOutcome> {
        let mut report = CleanReport::new(frame.len());
        normalize_schema(&mut frame, DATASET)?;

        resolve_key(&mut frame, FACT_KEY_CANDIDATES, DATASET)?;
        let (time_column, canonical) =
            require_candidate(&frame, ATTENDANCE_TIME_CANDIDATES, DATASET, "date or timestamp")?;

        if frame.has_column("status") {
            map_vocabulary(&mut frame, "status", &status_vocabulary(), &mut report);
        }

        parse_temporal_column(&mut frame, time_column, &mut report);
        if canonical == "timestamp" {
            frame.map_column(time_column, |cell| match cell {
                Cell::Date(d) => d.and_hms_opt(0, 0, 0).map(Cell::DateTime).unwrap_or(Cell::Null),
                other => other.clone(),
            });
            frame.rename_column(time_column, "timestamp");
            let dates = frame
                .column("timestamp")
                .unwrap_or_default()
                .into_iter()
                .map(|c| date_of(c).map(Cell::Date).unwrap_or(Cell::Null))
                .collect();
            frame.set_column("date", dates);
        } else {
            frame.map_column("date", |cell| match date_of(cell) {
                Some(d) => Cell::Date(d),
                None => Cell::Null,
            });
        }

        derive_calendar(
            &mut frame,
            "date",
            &[CalendarPart::Year, CalendarPart::Month, CalendarPart::Weekday],
        );
        coerce_key_to_text(&mut frame);
        sort_by_key_and_time(&mut frame, &["timestamp", "date"]);

        report.rows_out = frame.len();
        Ok(CleanOutcome { frame, report })
    }
}
