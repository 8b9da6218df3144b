use chrono::Utc;
use tracing::{info, info_span};

use crate::config::PipelineConfig;
use crate::domain::Domain;
use crate::error::Result;
use crate::gateway::raw_batch;
use crate::gateway::run_log::{self, RunRecord, Stage};
use crate::observability::metrics::{self, StageTimer};
use crate::pipeline::layout::DataLayout;

/// Deposits configured source exports as dated raw batches.
pub struct ExtractUseCase {
    config: PipelineConfig,
    layout: DataLayout,
}

impl ExtractUseCase {
    pub fn new(config: PipelineConfig) -> Self {
        let layout = config.layout();
        Self { config, layout }
    }

    /// Today's UTC date, the default extract date.
    pub fn today() -> String {
        Utc::now().date_naive().format("%Y-%m-%d").to_string()
    }

    pub fn run(&self, domain: Domain, extract_date: &str) -> Result<RunRecord> {
        let _span = info_span!("stage", stage = "extract", domain = %domain).entered();
        let _timer = StageTimer::start("extract");

        let source = self.config.source_for(domain)?;
        let batch = raw_batch::deposit(
            &self.layout,
            domain,
            &source.path,
            &source.source_system,
            extract_date,
        )?;
        metrics::extract::batch_deposited(domain.as_str(), batch.bytes);

        let record = RunRecord {
            stage: Stage::Extract,
            domain: Some(domain),
            extract_date: batch.extract_date,
            input: source.path,
            output: batch.path.display().to_string(),
            rows_in: 0,
            rows_out: 0,
            warnings: 0,
            sha256: None,
            finished_at: Utc::now(),
        };
        run_log::append(&self.layout.run_log_file(), &record)?;
        info!(batch_id = %batch.batch_id, output = %record.output, "extract finished");
        Ok(record)
    }

    /// Extract each domain in turn, stopping at the first failure.
    pub fn run_many(&self, domains: &[Domain], extract_date: &str) -> Result<Vec<RunRecord>> {
        domains.iter().map(|d| self.run(*d, extract_date)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn extracts_configured_sources_into_dated_batches() {
        let dir = tempfile::tempdir().unwrap();
        let config = PipelineConfig::with_data_root(dir.path());
        let source = config.source_for(Domain::Attendance).unwrap();
        fs::create_dir_all(source.path.parent().unwrap()).unwrap();
        fs::write(&source.path, "employee_id,date\n1,2024-01-01\n").unwrap();

        let use_case = ExtractUseCase::new(config.clone());
        let record = use_case.run(Domain::Attendance, "2024-03-01").unwrap();

        let batch_dir = config.layout().raw_batch_dir(Domain::Attendance, "2024-03-01");
        assert!(record.output.starts_with(&batch_dir.display().to_string()));
        assert!(record.output.contains("attendance_system_batch_"));
        assert!(batch_dir.join("manifest.txt").is_file());
    }

    #[test]
    fn missing_source_stops_the_run() {
        let dir = tempfile::tempdir().unwrap();
        let use_case = ExtractUseCase::new(PipelineConfig::with_data_root(dir.path()));
        let err = use_case.run_many(&Domain::ALL, "2024-03-01").unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn today_is_an_iso_date() {
        assert_eq!(ExtractUseCase::today().len(), 10);
    }
}
