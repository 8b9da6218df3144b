use async_trait::async_trait;
use std::fmt;

use crate::error::Result;
use crate::pipeline::frame::Frame;

/// Fully-qualified warehouse table, `<dataset>.<table>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableRef {
    pub dataset: String,
    pub table: String,
}

impl TableRef {
    pub fn new(dataset: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            dataset: dataset.into(),
            table: table.into(),
        }
    }

    pub fn qualified(&self) -> String {
        format!("{}.{}", self.dataset, self.table)
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.dataset, self.table)
    }
}

// Load-side ports
#[async_trait]
pub trait WarehouseSinkPort: Send + Sync {
    /// Replace the content of `table` with `frame`. Returns the number of rows loaded.
    async fn load_table(&self, table: &TableRef, frame: &Frame) -> Result<usize>;
}
