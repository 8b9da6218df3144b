use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EtlError {
    /// Missing source path, empty batch directory or no matching files.
    #[error("{what} not found: {}", path.display())]
    NotFound { what: String, path: PathBuf },

    /// Required column or candidate absent from a dataset.
    #[error("schema error in {dataset}: {message}")]
    Schema { dataset: String, message: String },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl EtlError {
    pub fn not_found(what: impl Into<String>, path: impl AsRef<Path>) -> Self {
        Self::NotFound {
            what: what.into(),
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn schema(dataset: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Schema {
            dataset: dataset.into(),
            message: message.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_schema(&self) -> bool {
        matches!(self, Self::Schema { .. })
    }
}

pub type Result<T> = std::result::Result<T, EtlError>;
