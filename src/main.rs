use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{error, info};

use people_etl::app::extract_use_case::ExtractUseCase;
use people_etl::app::PipelineRunner;
use people_etl::config::PipelineConfig;
use people_etl::domain::Domain;
use people_etl::gateway::run_log::RunRecord;
use people_etl::logging;

#[derive(Parser)]
#[command(name = "people_etl")]
#[command(about = "Batch ETL for people-analytics data")]
#[command(version = "0.1.0")]
struct Cli {
    /// Pipeline config file (defaults to ./pipeline.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Deposit configured source exports as dated raw batches
    Extract {
        /// Only this domain (default: all four)
        #[arg(long, value_enum)]
        domain: Option<Domain>,
        /// Extract date, YYYY-MM-DD (default: today, UTC)
        #[arg(long)]
        date: Option<String>,
    },
    /// Clean the latest raw batch of one domain
    Transform {
        #[arg(value_enum)]
        domain: Domain,
    },
    /// Clean the latest raw batch of every domain in parallel
    TransformAll,
    /// Merge the latest cleaned batches into the master dataset
    Master,
    /// Load cleaned batches and the master dataset into the warehouse
    Load,
    /// transform-all, master and load in sequence
    Run,
}

fn print_record(record: &RunRecord) {
    let label = record
        .domain
        .map(|d| d.to_string())
        .unwrap_or_else(|| "master".to_string());
    println!(
        "   {:<12} {}  rows {} -> {}  warnings {}  {}",
        label, record.extract_date, record.rows_in, record.rows_out, record.warnings, record.output
    );
}

fn validate_date(date: &str) -> anyhow::Result<()> {
    chrono::NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map(|_| ())
        .with_context(|| format!("extract date must be YYYY-MM-DD, got '{}'", date))
}

async fn execute(command: Commands, config: PipelineConfig) -> anyhow::Result<()> {
    let runner = PipelineRunner::new(config.clone());
    match command {
        Commands::Extract { domain, date } => {
            let date = date.unwrap_or_else(ExtractUseCase::today);
            validate_date(&date)?;
            let domains = domain.map(|d| vec![d]).unwrap_or_else(|| Domain::ALL.to_vec());
            let use_case = ExtractUseCase::new(config);
            let records = use_case.run_many(&domains, &date).context("extract failed")?;
            println!("✅ Extracted {} batch(es) for {}", records.len(), date);
            records.iter().for_each(print_record);
        }
        Commands::Transform { domain } => {
            let record = runner
                .transform(domain)
                .with_context(|| format!("transform {} failed", domain))?;
            println!("✅ Transform finished");
            print_record(&record);
        }
        Commands::TransformAll => {
            let records = runner.transform_all().await.context("transform-all failed")?;
            println!("✅ All domains transformed");
            records.iter().for_each(print_record);
        }
        Commands::Master => {
            let record = runner.master().context("master merge failed")?;
            println!("✅ Master dataset written");
            print_record(&record);
        }
        Commands::Load => {
            let records = runner.load(runner.default_sink()).await.context("load failed")?;
            println!("✅ Loaded {} table(s)", records.len());
            records.iter().for_each(print_record);
        }
        Commands::Run => {
            let summary = runner.run(runner.default_sink()).await.context("pipeline run failed")?;
            println!("✅ Pipeline run completed");
            summary.transforms.iter().for_each(print_record);
            print_record(&summary.master);
            println!("   {} warehouse table(s) loaded", summary.loads.len());
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let config = PipelineConfig::load(cli.config.as_deref()).context("failed to load configuration")?;
    let guard = logging::init_logging(&config.paths.logs_dir).context("failed to initialise logging")?;
    info!(data_root = %config.paths.data_root.display(), "people_etl starting");

    if let Err(e) = execute(cli.command, config).await {
        let message = format!("{:#}", e);
        error!(error = %message, "run failed");
        eprintln!("❌ {}", message);
        // Flush the file log before exiting non-zero
        drop(guard);
        std::process::exit(1);
    }
    Ok(())
}
