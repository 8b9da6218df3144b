//! Metrics for the people analytics pipeline.
//!
//! Recording goes through the `metrics` facade; without an installed recorder every
//! call is a no-op. Names follow the Prometheus conventions.

use std::fmt;
use std::time::Instant;

/// All metric names used in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricName {
    // Extract metrics
    ExtractBatchesDeposited,
    ExtractBytes,

    // Transform metrics
    TransformRowsRead,
    TransformRowsWritten,
    TransformCoercionNulls,
    TransformDuplicatesDropped,
    TransformSchemaErrors,

    // Merge metrics
    MergeRowsWritten,
    MergeColumns,

    // Load metrics
    LoadTablesLoaded,
    LoadRowsLoaded,
    LoadErrors,

    // Stage timing
    StageDuration,
}

impl MetricName {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricName::ExtractBatchesDeposited => "people_etl_extract_batches_deposited_total",
            MetricName::ExtractBytes => "people_etl_extract_bytes",
            MetricName::TransformRowsRead => "people_etl_transform_rows_read_total",
            MetricName::TransformRowsWritten => "people_etl_transform_rows_written_total",
            MetricName::TransformCoercionNulls => "people_etl_transform_coercion_nulls_total",
            MetricName::TransformDuplicatesDropped => "people_etl_transform_duplicates_dropped_total",
            MetricName::TransformSchemaErrors => "people_etl_transform_schema_errors_total",
            MetricName::MergeRowsWritten => "people_etl_merge_rows_written_total",
            MetricName::MergeColumns => "people_etl_merge_columns",
            MetricName::LoadTablesLoaded => "people_etl_load_tables_loaded_total",
            MetricName::LoadRowsLoaded => "people_etl_load_rows_loaded_total",
            MetricName::LoadErrors => "people_etl_load_errors_total",
            MetricName::StageDuration => "people_etl_stage_duration_seconds",
        }
    }

    pub fn all_metrics() -> impl Iterator<Item = MetricName> {
        use MetricName::*;
        [
            ExtractBatchesDeposited,
            ExtractBytes,
            TransformRowsRead,
            TransformRowsWritten,
            TransformCoercionNulls,
            TransformDuplicatesDropped,
            TransformSchemaErrors,
            MergeRowsWritten,
            MergeColumns,
            LoadTablesLoaded,
            LoadRowsLoaded,
            LoadErrors,
            StageDuration,
        ]
        .into_iter()
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Records the elapsed time of a stage into the stage duration histogram when dropped.
pub struct StageTimer {
    start: Instant,
    stage: &'static str,
}

impl StageTimer {
    pub fn start(stage: &'static str) -> Self {
        Self {
            start: Instant::now(),
            stage,
        }
    }
}

impl Drop for StageTimer {
    fn drop(&mut self) {
        let secs = self.start.elapsed().as_secs_f64();
        ::metrics::histogram!(MetricName::StageDuration.as_str(), "stage" => self.stage).record(secs);
    }
}

// ============================================================================
// Phase modules
// ============================================================================

pub mod extract {
    use super::MetricName;

    pub fn batch_deposited(domain: &str, bytes: usize) {
        ::metrics::counter!(MetricName::ExtractBatchesDeposited.as_str(), "domain" => domain.to_string())
            .increment(1);
        ::metrics::histogram!(MetricName::ExtractBytes.as_str(), "domain" => domain.to_string())
            .record(bytes as f64);
    }
}

pub mod transform {
    use super::MetricName;

    pub fn rows_read(domain: &str, rows: usize) {
        ::metrics::counter!(MetricName::TransformRowsRead.as_str(), "domain" => domain.to_string())
            .increment(rows as u64);
    }

    pub fn rows_written(domain: &str, rows: usize) {
        ::metrics::counter!(MetricName::TransformRowsWritten.as_str(), "domain" => domain.to_string())
            .increment(rows as u64);
    }

    pub fn coercion_nulls(domain: &str, column: &str, count: usize) {
        ::metrics::counter!(
            MetricName::TransformCoercionNulls.as_str(),
            "domain" => domain.to_string(),
            "column" => column.to_string()
        )
        .increment(count as u64);
    }

    pub fn duplicates_dropped(domain: &str, count: usize) {
        ::metrics::counter!(MetricName::TransformDuplicatesDropped.as_str(), "domain" => domain.to_string())
            .increment(count as u64);
    }

    pub fn schema_error(domain: &str) {
        ::metrics::counter!(MetricName::TransformSchemaErrors.as_str(), "domain" => domain.to_string())
            .increment(1);
    }
}

pub mod merge {
    use super::MetricName;

    pub fn master_written(rows: usize, columns: usize) {
        ::metrics::counter!(MetricName::MergeRowsWritten.as_str()).increment(rows as u64);
        ::metrics::gauge!(MetricName::MergeColumns.as_str()).set(columns as f64);
    }
}

pub mod load {
    use super::MetricName;

    pub fn table_loaded(table: &str, rows: usize) {
        ::metrics::counter!(MetricName::LoadTablesLoaded.as_str(), "table" => table.to_string()).increment(1);
        ::metrics::counter!(MetricName::LoadRowsLoaded.as_str(), "table" => table.to_string())
            .increment(rows as u64);
    }

    pub fn error(table: &str) {
        ::metrics::counter!(MetricName::LoadErrors.as_str(), "table" => table.to_string()).increment(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn metric_names_are_unique_and_prefixed() {
        let names: HashSet<&str> = MetricName::all_metrics().map(|m| m.as_str()).collect();
        assert_eq!(names.len(), MetricName::all_metrics().count());
        assert!(names.iter().all(|n| n.starts_with("people_etl_")));
    }

    #[test]
    fn recording_without_a_recorder_is_a_no_op() {
        transform::rows_read("attendance", 10);
        merge::master_written(3, 12);
        load::table_loaded("main.dim_employee", 3);
        drop(StageTimer::start("transform"));
    }
}
