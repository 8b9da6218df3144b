//! Per-employee aggregation of the fact domains and the employee-anchored master join.
//!
//! Every aggregate holds at most one row per `employee_id`, so left-joining them onto
//! the employee dimension never changes its row count.

use std::collections::{BTreeMap, HashMap};

use crate::constants::{EMPLOYEE_KEY, ENGAGEMENT_PREFIX, PERFORMANCE_PREFIX};
use crate::error::{EtlError, Result};
use crate::pipeline::frame::{Cell, ColumnKind, Frame};
use crate::pipeline::processing::clean::CALENDAR_COLUMNS;

/// Suffix appended to a joined column whose name is already taken.
pub const COLLISION_SUFFIX: &str = "_y";

/// `(source column, aggregate column, is a count)`. Counts stay integral when the
/// source column is.
const ATTENDANCE_SUMS: &[(&str, &str, bool)] = &[
    ("status", "presence_score", false),
    ("hours_worked", "total_hours", false),
    ("is_late", "late_count", true),
    ("is_overtime", "overtime_count", true),
];

/// Latest cleaned batch of every domain, read with a text `employee_id`.
#[derive(Debug, Clone)]
pub struct MergeInputs {
    pub employee: Frame,
    pub attendance: Frame,
    pub engagement: Frame,
    pub performance: Frame,
}

pub fn build_master(inputs: &MergeInputs) -> Result<Frame> {
    let attendance = aggregate_attendance(&inputs.attendance)?;
    let engagement = aggregate_engagement(&inputs.engagement)?;
    let performance = latest_performance(&inputs.performance)?;

    let mut master = left_join(&inputs.employee, &attendance)?;
    master = left_join(&master, &engagement)?;
    master = left_join(&master, &performance)?;
    fill_numeric_nulls(&mut master);
    Ok(master)
}

fn key_index(frame: &Frame, dataset: &str) -> Result<usize> {
    frame
        .column_index(EMPLOYEE_KEY)
        .ok_or_else(|| EtlError::schema(dataset, format!("missing `{}` column", EMPLOYEE_KEY)))
}

/// Row indices per key, in key order. Rows with a null key belong to no employee.
fn group_rows(frame: &Frame, key_idx: usize) -> BTreeMap<String, Vec<usize>> {
    let mut groups: BTreeMap<String, Vec<usize>> = BTreeMap::new();
    for (i, row) in frame.rows().iter().enumerate() {
        if row[key_idx].is_null() {
            continue;
        }
        groups.entry(row[key_idx].render()).or_default().push(i);
    }
    groups
}

/// Sums of presence score, hours, late and overtime flags per employee.
pub fn aggregate_attendance(attendance: &Frame) -> Result<Frame> {
    let key_idx = key_index(attendance, "attendance")?;

    let mut sources = Vec::with_capacity(ATTENDANCE_SUMS.len());
    for (column, output, is_count) in ATTENDANCE_SUMS {
        let idx = attendance.column_index(column).ok_or_else(|| {
            EtlError::schema("attendance", format!("missing `{}` column required for aggregation", column))
        })?;
        let kind = attendance.column_kind(column).unwrap_or(ColumnKind::Empty);
        if !kind.is_numeric() {
            return Err(EtlError::schema(
                "attendance",
                format!("`{}` is not numeric and cannot be summed", column),
            ));
        }
        sources.push((idx, *output, *is_count && kind != ColumnKind::Float));
    }

    let mut headers = vec![EMPLOYEE_KEY.to_string()];
    headers.extend(sources.iter().map(|(_, output, _)| output.to_string()));
    let mut out = Frame::new(headers);

    let rows = attendance.rows();
    for (key, members) in group_rows(attendance, key_idx) {
        let mut row = vec![Cell::Text(key)];
        for (idx, _, integral) in &sources {
            let values = members.iter().filter_map(|&i| rows[i][*idx].as_f64());
            row.push(if *integral {
                Cell::Int(values.map(|v| v as i64).sum())
            } else {
                Cell::Float(values.sum())
            });
        }
        out.push_row(row);
    }
    Ok(out)
}

/// Columns averaged by [`aggregate_engagement`]: every numeric column except the key,
/// the survey date and derived calendar fields.
pub fn engagement_measures(engagement: &Frame) -> Vec<String> {
    engagement
        .numeric_columns()
        .into_iter()
        .filter(|c| {
            c != EMPLOYEE_KEY && c != "survey_date" && !CALENDAR_COLUMNS.contains(&c.as_str())
        })
        .collect()
}

/// Per-employee arithmetic mean of every survey measure, prefixed `eng_`.
pub fn aggregate_engagement(engagement: &Frame) -> Result<Frame> {
    let key_idx = key_index(engagement, "engagement")?;
    let measures = engagement_measures(engagement);
    if measures.is_empty() {
        return Err(EtlError::schema(
            "engagement",
            "no numeric columns left to aggregate after excluding key and calendar fields",
        ));
    }
    let indices: Vec<usize> = measures
        .iter()
        .filter_map(|m| engagement.column_index(m))
        .collect();

    let mut headers = vec![EMPLOYEE_KEY.to_string()];
    headers.extend(measures.iter().map(|m| format!("{}{}", ENGAGEMENT_PREFIX, m)));
    let mut out = Frame::new(headers);

    let rows = engagement.rows();
    for (key, members) in group_rows(engagement, key_idx) {
        let mut row = vec![Cell::Text(key)];
        for &idx in &indices {
            let values: Vec<f64> = members.iter().filter_map(|&i| rows[i][idx].as_f64()).collect();
            row.push(if values.is_empty() {
                Cell::Null
            } else {
                Cell::Float(values.iter().sum::<f64>() / values.len() as f64)
            });
        }
        out.push_row(row);
    }
    Ok(out)
}

/// The most recent review per employee with every field prefixed `perf_`. A review
/// without a date never beats a dated one; on equal dates the later row wins.
pub fn latest_performance(performance: &Frame) -> Result<Frame> {
    let key_idx = key_index(performance, "performance")?;
    let date_idx = performance
        .column_index("review_date")
        .ok_or_else(|| EtlError::schema("performance", "missing `review_date` column"))?;

    let mut headers = vec![EMPLOYEE_KEY.to_string()];
    headers.extend(
        performance
            .headers()
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != key_idx)
            .map(|(_, h)| format!("{}{}", PERFORMANCE_PREFIX, h)),
    );
    let mut out = Frame::new(headers);

    let rows = performance.rows();
    for (key, members) in group_rows(performance, key_idx) {
        let mut latest = members[0];
        for &candidate in &members[1..] {
            if rows[candidate][date_idx].as_datetime() >= rows[latest][date_idx].as_datetime() {
                latest = candidate;
            }
        }
        let mut row = vec![Cell::Text(key)];
        row.extend(
            rows[latest]
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != key_idx)
                .map(|(_, c)| c.clone()),
        );
        out.push_row(row);
    }
    Ok(out)
}

/// Left join on `employee_id`. Every left row is kept exactly once; unmatched rows get
/// nulls for the right-hand columns.
pub fn left_join(left: &Frame, right: &Frame) -> Result<Frame> {
    let left_key = key_index(left, "join")?;
    let right_key = key_index(right, "join")?;

    let mut lookup: HashMap<String, usize> = HashMap::new();
    for (i, row) in right.rows().iter().enumerate() {
        if !row[right_key].is_null() {
            lookup.entry(row[right_key].render()).or_insert(i);
        }
    }

    let right_columns: Vec<usize> = (0..right.headers().len()).filter(|&i| i != right_key).collect();
    let mut headers = left.headers().to_vec();
    for &i in &right_columns {
        let mut name = right.headers()[i].clone();
        while headers.contains(&name) {
            name.push_str(COLLISION_SUFFIX);
        }
        headers.push(name);
    }

    let mut out = Frame::new(headers);
    for row in left.rows() {
        let matched = match &row[left_key] {
            Cell::Null => None,
            key => lookup.get(&key.render()).map(|&i| &right.rows()[i]),
        };
        let mut joined = row.clone();
        joined.extend(right_columns.iter().map(|&i| match matched {
            Some(r) => r[i].clone(),
            None => Cell::Null,
        }));
        out.push_row(joined);
    }
    Ok(out)
}

/// Zero-fill nulls in numeric columns; text columns keep their nulls.
pub fn fill_numeric_nulls(frame: &mut Frame) {
    for column in frame.numeric_columns() {
        let zero = match frame.column_kind(&column) {
            Some(ColumnKind::Integer) => Cell::Int(0),
            _ => Cell::Float(0.0),
        };
        frame.map_column(&column, |cell| match cell {
            Cell::Null => zero.clone(),
            other => other.clone(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn staged(csv: &str) -> Frame {
        let mut frame = Frame::from_reader_untyped(csv.as_bytes()).unwrap();
        frame.infer_types(&[EMPLOYEE_KEY]);
        frame
    }

    fn inputs() -> MergeInputs {
        MergeInputs {
            employee: staged("employee_id,department,age\n1,Sales,41\n2,Hr,\n3,It,29\n42,Sales,50\n"),
            attendance: staged(
                "employee_id,date,status,hours_worked,is_late,is_overtime\n\
                 1,2022-01-03,1.0,8.0,0,1\n\
                 1,2022-01-04,0.5,7.5,1,0\n\
                 2,2022-01-03,0.0,0.0,1,0\n",
            ),
            engagement: staged(
                "employee_id,survey_id,survey_date,year,month,q_support,comment_text\n\
                 1,10,2022-05-01,2022,5,4,ok\n\
                 1,11,2022-11-01,2022,11,2,\n",
            ),
            performance: staged(
                "employee_id,review_date,year,quarter,rating,score\n\
                 42,2022-12-15,2022,4,4,4.6\n\
                 42,2022-06-15,2022,2,1,2.5\n",
            ),
        }
    }

    #[test]
    fn master_keeps_one_row_per_employee() {
        let inputs = inputs();
        let master = build_master(&inputs).unwrap();
        assert_eq!(master.len(), inputs.employee.len());
        let keys: Vec<String> = master.column(EMPLOYEE_KEY).unwrap().iter().map(|c| c.render()).collect();
        assert_eq!(keys, vec!["1", "2", "3", "42"]);
    }

    #[test]
    fn columns_follow_join_order_with_prefixes() {
        let master = build_master(&inputs()).unwrap();
        let expected = [
            "employee_id", "department", "age", "presence_score", "total_hours", "late_count",
            "overtime_count", "eng_survey_id", "eng_q_support", "perf_review_date", "perf_year",
            "perf_quarter", "perf_rating", "perf_score",
        ];
        assert_eq!(master.headers(), &expected.map(String::from));
    }

    #[test]
    fn employee_without_attendance_gets_zero_aggregates() {
        let master = build_master(&inputs()).unwrap();
        assert_eq!(master.value(2, "presence_score"), Some(&Cell::Float(0.0)));
        assert_eq!(master.value(2, "total_hours"), Some(&Cell::Float(0.0)));
        assert_eq!(master.value(2, "late_count"), Some(&Cell::Int(0)));
        assert_eq!(master.value(2, "overtime_count"), Some(&Cell::Int(0)));
        assert_eq!(master.value(2, "eng_q_support"), Some(&Cell::Float(0.0)));
        // Text columns keep their nulls, numeric employee fields are filled
        assert_eq!(master.value(2, "perf_review_date"), Some(&Cell::Null));
        assert_eq!(master.value(1, "age"), Some(&Cell::Int(0)));
    }

    #[test]
    fn attendance_sums_and_late_flag_is_independent_of_status() {
        let master = build_master(&inputs()).unwrap();
        assert_eq!(master.value(0, "presence_score"), Some(&Cell::Float(1.5)));
        assert_eq!(master.value(0, "total_hours"), Some(&Cell::Float(15.5)));
        assert_eq!(master.value(0, "late_count"), Some(&Cell::Int(1)));
        assert_eq!(master.value(0, "overtime_count"), Some(&Cell::Int(1)));
        assert_eq!(master.value(1, "presence_score"), Some(&Cell::Float(0.0)));
        assert_eq!(master.value(1, "late_count"), Some(&Cell::Int(1)));
    }

    #[test]
    fn engagement_means_skip_calendar_and_text_columns() {
        let master = build_master(&inputs()).unwrap();
        assert_eq!(master.value(0, "eng_q_support"), Some(&Cell::Float(3.0)));
        assert_eq!(master.value(0, "eng_survey_id"), Some(&Cell::Float(10.5)));
        assert!(!master.has_column("eng_year"));
        assert!(!master.has_column("eng_comment_text"));
    }

    #[test]
    fn latest_review_wins() {
        let master = build_master(&inputs()).unwrap();
        assert_eq!(master.value(3, "perf_review_date"), Some(&Cell::text("2022-12-15")));
        assert_eq!(master.value(3, "perf_rating"), Some(&Cell::Int(4)));
        assert_eq!(master.value(3, "perf_score"), Some(&Cell::Float(4.6)));
    }

    #[test]
    fn undated_review_never_beats_a_dated_one() {
        let perf = staged("employee_id,review_date,rating\n5,2022-06-15,2\n5,,4\n");
        let latest = latest_performance(&perf).unwrap();
        assert_eq!(latest.value(0, "perf_rating"), Some(&Cell::Int(2)));
    }

    #[test]
    fn text_keys_do_not_match_numerically() {
        let mut inputs = inputs();
        inputs.employee = staged("employee_id,age\n007,30\n");
        inputs.attendance = staged(
            "employee_id,status,hours_worked,is_late,is_overtime\n7,1.0,8.0,0,0\n",
        );
        let master = build_master(&inputs).unwrap();
        assert_eq!(master.value(0, EMPLOYEE_KEY), Some(&Cell::text("007")));
        assert_eq!(master.value(0, "total_hours"), Some(&Cell::Float(0.0)));
    }

    #[test]
    fn engagement_without_measures_is_a_schema_error() {
        let engagement = staged("employee_id,survey_date,year,month,comment_text\n1,2022-05-01,2022,5,hello\n");
        let err = aggregate_engagement(&engagement).unwrap_err();
        assert!(err.is_schema());
    }

    #[test]
    fn header_only_engagement_is_a_schema_error() {
        let engagement = staged("employee_id,survey_id,survey_date,year,month,q1,comment_text\n");
        assert!(engagement_measures(&engagement).is_empty());
        let err = aggregate_engagement(&engagement).unwrap_err();
        assert!(err.is_schema());
    }

    #[test]
    fn attendance_without_flags_is_a_schema_error() {
        let attendance = staged("employee_id,status,hours_worked\n1,1.0,8.0\n");
        assert!(aggregate_attendance(&attendance).unwrap_err().is_schema());
    }

    #[test]
    fn colliding_right_columns_get_a_suffix() {
        let left = staged("employee_id,total_hours\n1,3\n");
        let right = staged("employee_id,total_hours\n1,4\n");
        let joined = left_join(&left, &right).unwrap();
        assert_eq!(joined.headers()[2], "total_hours_y");
        assert_eq!(joined.value(0, "total_hours_y"), Some(&Cell::Int(4)));
    }
}
