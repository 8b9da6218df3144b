pub mod ports;
pub mod staged;
pub mod extract_use_case;
pub mod transform_use_case;
pub mod master_use_case;
pub mod load_use_case;
pub mod run_use_case;

pub use run_use_case::{PipelineRunner, RunSummary};
