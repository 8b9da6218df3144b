use async_trait::async_trait;
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::app::ports::{TableRef, WarehouseSinkPort};
use crate::error::{EtlError, Result};
use crate::pipeline::frame::{Cell, ColumnKind, Frame};

/// Local analytical store backed by a SQLite file.
///
/// The `main` dataset lives in the file itself; any other dataset is a sibling
/// `<dataset>.db` attached under that name.
pub struct SqliteWarehouse {
    path: PathBuf,
}

impl SqliteWarehouse {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl WarehouseSinkPort for SqliteWarehouse {
    async fn load_table(&self, table: &TableRef, frame: &Frame) -> Result<usize> {
        let path = self.path.clone();
        let table = table.clone();
        let frame = frame.clone();
        let rows = tokio::task::spawn_blocking(move || replace_table(&path, &table, &frame)).await??;
        Ok(rows)
    }
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn column_affinity(kind: ColumnKind) -> &'static str {
    match kind {
        ColumnKind::Integer => "INTEGER",
        ColumnKind::Float => "REAL",
        ColumnKind::Empty | ColumnKind::Temporal | ColumnKind::Text => "TEXT",
    }
}

fn to_sql_value(cell: &Cell) -> Value {
    match cell {
        Cell::Null => Value::Null,
        Cell::Int(i) => Value::Integer(*i),
        Cell::Float(f) => Value::Real(*f),
        other => Value::Text(other.render()),
    }
}

fn open(path: &Path, dataset: &str) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let conn = Connection::open(path)?;
    if dataset != "main" {
        let attached = path.with_file_name(format!("{}.db", dataset));
        let attached = attached
            .to_str()
            .ok_or_else(|| EtlError::Config(format!("non UTF-8 warehouse path {}", attached.display())))?;
        conn.execute("ATTACH DATABASE ?1 AS ?2", rusqlite::params![attached, dataset])?;
    }
    Ok(conn)
}

/// Drop, recreate and fill the table in one transaction.
fn replace_table(path: &Path, table: &TableRef, frame: &Frame) -> Result<usize> {
    if frame.headers().is_empty() {
        return Err(EtlError::schema(table.qualified(), "dataset has no columns"));
    }
    let mut conn = open(path, &table.dataset)?;
    let target = format!("{}.{}", quote_ident(&table.dataset), quote_ident(&table.table));

    let columns: Vec<String> = frame
        .headers()
        .iter()
        .map(|h| {
            let kind = frame.column_kind(h).unwrap_or(ColumnKind::Empty);
            format!("{} {}", quote_ident(h), column_affinity(kind))
        })
        .collect();
    let placeholders: Vec<String> = (1..=frame.headers().len()).map(|i| format!("?{}", i)).collect();

    let tx = conn.transaction()?;
    tx.execute_batch(&format!(
        "DROP TABLE IF EXISTS {target}; CREATE TABLE {target} ({});",
        columns.join(", ")
    ))?;
    {
        let mut stmt = tx.prepare(&format!(
            "INSERT INTO {} VALUES ({})",
            target,
            placeholders.join(", ")
        ))?;
        for row in frame.rows() {
            stmt.execute(params_from_iter(row.iter().map(to_sql_value)))?;
        }
    }
    tx.commit()?;

    debug!(table = %table, columns = frame.headers().len(), "table replaced");
    info!(table = %table, rows = frame.len(), path = %path.display(), "warehouse table loaded");
    Ok(frame.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Frame {
        Frame::from_rows(
            vec!["employee_id".into(), "presence_score".into(), "late_count".into(), "department".into()],
            vec![
                vec![Cell::text("007"), Cell::Float(1.5), Cell::Int(1), Cell::text("Sales")],
                vec![Cell::text("8"), Cell::Float(0.0), Cell::Int(0), Cell::Null],
            ],
        )
    }

    #[tokio::test]
    async fn load_replaces_table_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("warehouse").join("people.db");
        let sink = SqliteWarehouse::new(&path);
        let table = TableRef::new("main", "master_dataset");

        assert_eq!(sink.load_table(&table, &sample()).await.unwrap(), 2);
        assert_eq!(sink.load_table(&table, &sample()).await.unwrap(), 2);

        let conn = Connection::open(&path).unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM master_dataset", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 2);
        let (id, score): (String, f64) = conn
            .query_row(
                "SELECT employee_id, presence_score FROM master_dataset WHERE late_count = 1",
                [],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .unwrap();
        assert_eq!(id, "007");
        assert_eq!(score, 1.5);
    }

    #[tokio::test]
    async fn other_datasets_are_attached_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("people.db");
        let sink = SqliteWarehouse::new(&path);
        sink.load_table(&TableRef::new("analytics", "dim_employee"), &sample())
            .await
            .unwrap();

        let conn = Connection::open(dir.path().join("analytics.db")).unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM dim_employee", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 2);
    }

    #[test]
    fn identifiers_are_quoted() {
        assert_eq!(quote_ident("weird\"name"), "\"weird\"\"name\"");
        assert_eq!(TableRef::new("main", "t").qualified(), "main.t");
    }
}
