//! Append-only NDJSON record of every successful stage run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use crate::domain::Domain;
use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Extract,
    Transform,
    Master,
    Load,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub stage: Stage,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<Domain>,
    pub extract_date: String,
    pub input: PathBuf,
    pub output: String,
    pub rows_in: usize,
    pub rows_out: usize,
    pub warnings: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
    pub finished_at: DateTime<Utc>,
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

pub fn append(path: &Path, record: &RunRecord) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    let line = serde_json::to_string(record)?;
    writeln!(file, "{}", line)?;
    Ok(())
}

/// Every record in file order; a missing log is empty.
pub fn read_all(path: &Path) -> Result<Vec<RunRecord>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let reader = BufReader::new(fs::File::open(path)?);
    let mut records = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        records.push(serde_json::from_str(&line)?);
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_is_lowercase_hex() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn records_append_and_read_back_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run_log").join("runs.ndjson");
        for (i, stage) in [Stage::Transform, Stage::Master].into_iter().enumerate() {
            let record = RunRecord {
                stage,
                domain: (stage == Stage::Transform).then_some(Domain::Attendance),
                extract_date: "2024-03-01".into(),
                input: PathBuf::from("in.csv"),
                output: "out.csv".into(),
                rows_in: i,
                rows_out: i,
                warnings: 0,
                sha256: Some(sha256_hex(b"x")),
                finished_at: Utc::now(),
            };
            append(&path, &record).unwrap();
        }
        let records = read_all(&path).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].domain, Some(Domain::Attendance));
        assert_eq!(records[1].stage, Stage::Master);
        assert!(!fs::read_to_string(&path).unwrap().lines().nth(1).unwrap().contains("\"domain\""));
    }

    #[test]
    fn missing_log_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_all(&dir.path().join("runs.ndjson")).unwrap().is_empty());
    }
}
