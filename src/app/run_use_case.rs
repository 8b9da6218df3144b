use tracing::{error, info};

use crate::app::load_use_case::LoadUseCase;
use crate::app::master_use_case::MasterUseCase;
use crate::app::ports::WarehouseSinkPort;
use crate::app::transform_use_case::TransformUseCase;
use crate::config::PipelineConfig;
use crate::domain::Domain;
use crate::error::Result;
use crate::gateway::run_log::RunRecord;
use crate::infra::SqliteWarehouse;
use crate::pipeline::layout::DataLayout;
use crate::pipeline::locator::BatchLocator;

/// Everything one full run produced.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub transforms: Vec<RunRecord>,
    pub master: RunRecord,
    pub loads: Vec<RunRecord>,
}

/// Sequences the stages: cleaners (in parallel), then master, then load.
pub struct PipelineRunner {
    config: PipelineConfig,
    layout: DataLayout,
    locator: BatchLocator,
}

impl PipelineRunner {
    pub fn new(config: PipelineConfig) -> Self {
        let layout = config.layout();
        let locator = BatchLocator::new(config.locator.order);
        Self {
            config,
            layout,
            locator,
        }
    }

    pub fn layout(&self) -> &DataLayout {
        &self.layout
    }

    /// SQLite warehouse at the configured path.
    pub fn default_sink(&self) -> Box<dyn WarehouseSinkPort> {
        Box::new(SqliteWarehouse::new(self.config.warehouse_path()))
    }

    pub fn transform(&self, domain: Domain) -> Result<RunRecord> {
        TransformUseCase::new(self.layout.clone(), self.locator).run(domain)
    }

    /// Run the four cleaners on blocking tasks. All of them finish; the first failure
    /// in domain order is returned.
    pub async fn transform_all(&self) -> Result<Vec<RunRecord>> {
        let handles: Vec<_> = Domain::ALL
            .into_iter()
            .map(|domain| {
                let use_case = TransformUseCase::new(self.layout.clone(), self.locator);
                (domain, tokio::task::spawn_blocking(move || use_case.run(domain)))
            })
            .collect();

        let mut records = Vec::with_capacity(handles.len());
        let mut first_error = None;
        for (domain, handle) in handles {
            match handle.await? {
                Ok(record) => records.push(record),
                Err(e) => {
                    error!(domain = %domain, error = %e, "transform failed");
                    first_error.get_or_insert(e);
                }
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(records),
        }
    }

    pub fn master(&self) -> Result<RunRecord> {
        MasterUseCase::new(self.layout.clone(), self.locator).run()
    }

    pub async fn load(&self, sink: Box<dyn WarehouseSinkPort>) -> Result<Vec<RunRecord>> {
        LoadUseCase::new(
            self.layout.clone(),
            self.locator,
            sink,
            self.config.warehouse.dataset.clone(),
            self.config.warehouse.tables.clone(),
        )
        .run()
        .await
    }

    /// transform-all, master, load; halts at the first failing stage.
    pub async fn run(&self, sink: Box<dyn WarehouseSinkPort>) -> Result<RunSummary> {
        let transforms = self.transform_all().await?;
        let master = self.master()?;
        let loads = self.load(sink).await?;
        info!(
            transforms = transforms.len(),
            master_rows = master.rows_out,
            tables = loads.len(),
            "pipeline run finished"
        );
        Ok(RunSummary {
            transforms,
            master,
            loads,
        })
    }
}
