// File-system edges of the pipeline: raw batch deposit and the run log

pub mod raw_batch;
pub mod run_log;
