use chrono::Utc;
use tracing::{info, Instrument};

use crate::app::ports::{TableRef, WarehouseSinkPort};
use crate::app::staged::{latest_cleaned, latest_master, StagedBatch};
use crate::config::TableNamesConfig;
use crate::domain::Domain;
use crate::error::Result;
use crate::gateway::run_log::{self, RunRecord, Stage};
use crate::observability::metrics::{self, StageTimer};
use crate::pipeline::layout::DataLayout;
use crate::pipeline::locator::BatchLocator;

/// Publishes the latest cleaned batches and master dataset to the warehouse.
pub struct LoadUseCase {
    layout: DataLayout,
    locator: BatchLocator,
    sink: Box<dyn WarehouseSinkPort>,
    dataset: String,
    tables: TableNamesConfig,
}

impl LoadUseCase {
    pub fn new(
        layout: DataLayout,
        locator: BatchLocator,
        sink: Box<dyn WarehouseSinkPort>,
        dataset: impl Into<String>,
        tables: TableNamesConfig,
    ) -> Self {
        Self {
            layout,
            locator,
            sink,
            dataset: dataset.into(),
            tables,
        }
    }

    /// Dimension and fact tables first, master last. Stops at the first failure.
    pub async fn run(&self) -> Result<Vec<RunRecord>> {
        let span = tracing::info_span!("stage", stage = "load");
        async {
            let _timer = StageTimer::start("load");
            let mut records = Vec::new();
            for domain in [
                Domain::Employee,
                Domain::Attendance,
                Domain::Engagement,
                Domain::Performance,
            ] {
                let batch = latest_cleaned(&self.layout, &self.locator, domain)?;
                let table = TableRef::new(&self.dataset, self.tables.for_domain(domain));
                records.push(self.publish(Some(domain), batch, table).await?);
            }
            let master = latest_master(&self.layout, &self.locator)?;
            let table = TableRef::new(&self.dataset, &self.tables.master);
            records.push(self.publish(None, master, table).await?);
            Ok(records)
        }
        .instrument(span)
        .await
    }

    async fn publish(&self, domain: Option<Domain>, batch: StagedBatch, table: TableRef) -> Result<RunRecord> {
        let rows = match self.sink.load_table(&table, &batch.frame).await {
            Ok(rows) => rows,
            Err(e) => {
                metrics::load::error(&table.qualified());
                return Err(e);
            }
        };
        metrics::load::table_loaded(&table.qualified(), rows);

        let record = RunRecord {
            stage: Stage::Load,
            domain,
            extract_date: batch.extract_date,
            input: batch.path,
            output: table.qualified(),
            rows_in: batch.frame.len(),
            rows_out: rows,
            warnings: 0,
            sha256: None,
            finished_at: Utc::now(),
        };
        run_log::append(&self.layout.run_log_file(), &record)?;
        info!(table = %table, rows, extract_date = %record.extract_date, "table published");
        Ok(record)
    }
}
