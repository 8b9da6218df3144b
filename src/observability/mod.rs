// Observability: structured logging setup and pipeline metrics

pub mod metrics;

pub use metrics::{MetricName, StageTimer};
