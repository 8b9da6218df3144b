use chrono::Utc;
use tracing::{info, info_span, warn};

use crate::constants::CSV_EXTENSION;
use crate::domain::Domain;
use crate::error::{EtlError, Result};
use crate::gateway::raw_batch::parse_batch_file_name;
use crate::gateway::run_log::{self, RunRecord, Stage};
use crate::observability::metrics::{self, StageTimer};
use crate::pipeline::frame::Frame;
use crate::pipeline::layout::{extract_date_of, DataLayout};
use crate::pipeline::locator::BatchLocator;
use crate::pipeline::processing::clean::{cleaner_for, Cleaner};

/// Cleans the latest raw batch of one domain into its staging area.
pub struct TransformUseCase {
    layout: DataLayout,
    locator: BatchLocator,
}

impl TransformUseCase {
    pub fn new(layout: DataLayout, locator: BatchLocator) -> Self {
        Self { layout, locator }
    }

    pub fn run(&self, domain: Domain) -> Result<RunRecord> {
        let _span = info_span!("stage", stage = "transform", domain = %domain).entered();
        let _timer = StageTimer::start("transform");
        self.run_with(cleaner_for(domain).as_ref())
    }

    /// Locate, clean and write. Nothing is written unless cleaning succeeds.
    pub fn run_with(&self, cleaner: &dyn Cleaner) -> Result<RunRecord> {
        let domain = cleaner.domain();
        let batch_dir = self
            .locator
            .latest_batch_dir(&self.layout.raw_domain_dir(domain))?;
        let extract_date = extract_date_of(&batch_dir)
            .ok_or_else(|| EtlError::not_found("extract date folder name", &batch_dir))?;
        let input = self.locator.latest_file(&batch_dir, CSV_EXTENSION)?;
        let file_name = input.file_name().and_then(|n| n.to_str()).unwrap_or_default();
        match parse_batch_file_name(file_name) {
            Some((source_system, batch_id)) => info!(
                input = %input.display(),
                extract_date = %extract_date,
                source_system = %source_system,
                batch_id = %batch_id,
                "transform started"
            ),
            None => warn!(
                input = %input.display(),
                extract_date = %extract_date,
                "transform started on a file not named <system>_batch_<id>.csv"
            ),
        }

        let raw = Frame::read_csv_untyped(&input)?;
        metrics::transform::rows_read(domain.as_str(), raw.len());

        let outcome = cleaner.clean(raw).map_err(|e| {
            if e.is_schema() {
                metrics::transform::schema_error(domain.as_str());
            }
            e
        })?;
        outcome.report.log(domain);
        for warning in outcome.report.warnings() {
            metrics::transform::coercion_nulls(domain.as_str(), &warning.column, warning.count);
        }
        metrics::transform::duplicates_dropped(domain.as_str(), outcome.report.duplicates_dropped);

        let output = self.layout.cleaned_file(domain, &extract_date);
        let bytes = outcome.frame.write_csv(&output)?;
        metrics::transform::rows_written(domain.as_str(), outcome.frame.len());

        let record = RunRecord {
            stage: Stage::Transform,
            domain: Some(domain),
            extract_date,
            input,
            output: output.display().to_string(),
            rows_in: outcome.report.rows_in,
            rows_out: outcome.report.rows_out,
            warnings: outcome.report.warning_count(),
            sha256: Some(run_log::sha256_hex(&bytes)),
            finished_at: Utc::now(),
        };
        run_log::append(&self.layout.run_log_file(), &record)?;
        info!(
            output = %record.output,
            rows = record.rows_out,
            warnings = record.warnings,
            "transform finished"
        );
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn seed(layout: &DataLayout, domain: Domain, date: &str, name: &str, csv: &str) {
        let dir = layout.raw_batch_dir(domain, date);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(name), csv).unwrap();
    }

    #[test]
    fn cleans_latest_raw_batch_into_staging() {
        let dir = tempfile::tempdir().unwrap();
        let layout = DataLayout::with_default_dirs(dir.path());
        seed(&layout, Domain::Employee, "2024-01-01", "hr_core_system_batch_00000001.csv", "id,Age\n9,20\n");
        seed(
            &layout,
            Domain::Employee,
            "2024-02-01",
            "hr_core_system_batch_0000000a.csv",
            "EmployeeNumber,Age\n2,30\n1,41\n",
        );

        let use_case = TransformUseCase::new(layout.clone(), BatchLocator::default());
        let record = use_case.run(Domain::Employee).unwrap();

        assert_eq!(record.extract_date, "2024-02-01");
        assert_eq!(record.rows_out, 2);
        let written = fs::read_to_string(layout.cleaned_file(Domain::Employee, "2024-02-01")).unwrap();
        assert_eq!(written, "employee_id,age\n1,41\n2,30\n");
        assert_eq!(run_log::read_all(&layout.run_log_file()).unwrap().len(), 1);
    }

    #[test]
    fn schema_failure_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let layout = DataLayout::with_default_dirs(dir.path());
        seed(&layout, Domain::Attendance, "2024-02-01", "a.csv", "employee_id,status\n1,present\n");

        let use_case = TransformUseCase::new(layout.clone(), BatchLocator::default());
        let err = use_case.run(Domain::Attendance).unwrap_err();

        assert!(err.is_schema());
        assert!(!layout.staging_batch_dir(Domain::Attendance, "2024-02-01").exists());
        assert!(!layout.run_log_file().exists());
    }

    #[test]
    fn over_long_raw_record_fails_without_output() {
        let dir = tempfile::tempdir().unwrap();
        let layout = DataLayout::with_default_dirs(dir.path());
        seed(
            &layout,
            Domain::Employee,
            "2024-02-01",
            "hr_core_system_batch_0000000b.csv",
            "employee_id,age\n1,30,EXTRA,MORE\n2\n",
        );

        let use_case = TransformUseCase::new(layout.clone(), BatchLocator::default());
        let err = use_case.run(Domain::Employee).unwrap_err();

        assert!(err.is_schema());
        let message = err.to_string();
        assert!(message.contains("hr_core_system_batch_0000000b.csv"));
        assert!(message.contains("line 2"));
        assert!(!layout.cleaned_file(Domain::Employee, "2024-02-01").exists());
    }

    #[test]
    fn missing_raw_root_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let use_case = TransformUseCase::new(DataLayout::with_default_dirs(dir.path()), BatchLocator::default());
        assert!(use_case.run(Domain::Engagement).unwrap_err().is_not_found());
    }
}
