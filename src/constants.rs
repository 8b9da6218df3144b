/// Layout and naming constants shared by every stage.
/// Paths are never assembled from literals outside `pipeline::layout`; these are its inputs.

// Top-level areas under the data root
pub const RAW_DIR: &str = "raw";
pub const STAGING_DIR: &str = "staging";
pub const RUN_LOG_DIR: &str = "run_log";
pub const WAREHOUSE_DIR: &str = "warehouse";

// File names
pub const CSV_EXTENSION: &str = "csv";
pub const CLEANED_SUFFIX: &str = "_cleaned.csv";
pub const MASTER_AREA: &str = "master";
pub const MASTER_FILE: &str = "master_dataset.csv";
pub const MANIFEST_FILE: &str = "manifest.txt";
pub const RUN_LOG_FILE: &str = "runs.ndjson";
pub const WAREHOUSE_FILE: &str = "people_analytics.db";

// Join key carried by every dataset
pub const EMPLOYEE_KEY: &str = "employee_id";

// Default warehouse tables
pub const DIM_EMPLOYEE_TABLE: &str = "dim_employee";
pub const FACT_ATTENDANCE_TABLE: &str = "fact_attendance";
pub const FACT_ENGAGEMENT_TABLE: &str = "fact_engagement";
pub const FACT_PERFORMANCE_TABLE: &str = "fact_performance";
pub const MASTER_TABLE: &str = "master_dataset";

// Column prefixes used by the master merge
pub const ENGAGEMENT_PREFIX: &str = "eng_";
pub const PERFORMANCE_PREFIX: &str = "perf_";
