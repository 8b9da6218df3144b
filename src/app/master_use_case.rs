use chrono::Utc;
use tracing::{info, info_span};

use crate::app::staged::latest_cleaned;
use crate::domain::Domain;
use crate::error::Result;
use crate::gateway::run_log::{self, RunRecord, Stage};
use crate::observability::metrics::{self, StageTimer};
use crate::pipeline::layout::DataLayout;
use crate::pipeline::locator::BatchLocator;
use crate::pipeline::processing::merge::{build_master, MergeInputs};

/// Merges the latest cleaned batch of every domain into the master dataset.
pub struct MasterUseCase {
    layout: DataLayout,
    locator: BatchLocator,
}

impl MasterUseCase {
    pub fn new(layout: DataLayout, locator: BatchLocator) -> Self {
        Self { layout, locator }
    }

    pub fn run(&self) -> Result<RunRecord> {
        let _span = info_span!("stage", stage = "master").entered();
        let _timer = StageTimer::start("master");

        // Each domain resolves its own latest batch; the dates need not agree.
        let employee = latest_cleaned(&self.layout, &self.locator, Domain::Employee)?;
        let attendance = latest_cleaned(&self.layout, &self.locator, Domain::Attendance)?;
        let engagement = latest_cleaned(&self.layout, &self.locator, Domain::Engagement)?;
        let performance = latest_cleaned(&self.layout, &self.locator, Domain::Performance)?;
        info!(
            employee = %employee.extract_date,
            attendance = %attendance.extract_date,
            engagement = %engagement.extract_date,
            performance = %performance.extract_date,
            "merging cleaned batches"
        );

        let inputs = MergeInputs {
            employee: employee.frame,
            attendance: attendance.frame,
            engagement: engagement.frame,
            performance: performance.frame,
        };
        let master = build_master(&inputs)?;

        let output = self.layout.master_file(&employee.extract_date);
        let bytes = master.write_csv(&output)?;
        metrics::merge::master_written(master.len(), master.headers().len());

        let record = RunRecord {
            stage: Stage::Master,
            domain: None,
            extract_date: employee.extract_date,
            input: employee.path,
            output: output.display().to_string(),
            rows_in: inputs.employee.len(),
            rows_out: master.len(),
            warnings: 0,
            sha256: Some(run_log::sha256_hex(&bytes)),
            finished_at: Utc::now(),
        };
        run_log::append(&self.layout.run_log_file(), &record)?;
        info!(output = %record.output, rows = record.rows_out, columns = master.headers().len(), "master written");
        Ok(record)
    }
}
