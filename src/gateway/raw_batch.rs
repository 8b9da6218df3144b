//! Raw batch deposit: copy a source export into its dated batch folder under a
//! generated batch name and record the copy in the folder's append-only manifest.

use chrono::{DateTime, SecondsFormat, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;
use uuid::Uuid;

use crate::constants::CSV_EXTENSION;
use crate::domain::Domain;
use crate::error::{EtlError, Result};
use crate::pipeline::frame::write_atomically;
use crate::pipeline::layout::DataLayout;

static BATCH_FILE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?P<system>.+)_batch_(?P<id>[0-9a-f]{8})\.csv$").unwrap());

/// What one extraction produced.
#[derive(Debug, Clone)]
pub struct DepositedBatch {
    pub domain: Domain,
    pub extract_date: String,
    pub batch_id: String,
    pub path: PathBuf,
    pub manifest: PathBuf,
    pub bytes: usize,
}

/// First 8 hex digits of a random v4 UUID.
pub fn new_batch_id() -> String {
    let mut id = Uuid::new_v4().simple().to_string();
    id.truncate(8);
    id
}

pub fn batch_file_name(source_system: &str, batch_id: &str) -> String {
    format!("{}_batch_{}.{}", source_system, batch_id, CSV_EXTENSION)
}

/// Split a deposited file name back into `(source_system, batch_id)`.
pub fn parse_batch_file_name(name: &str) -> Option<(String, String)> {
    let caps = BATCH_FILE.captures(name)?;
    Some((caps["system"].to_string(), caps["id"].to_string()))
}

pub fn manifest_line(at: DateTime<Utc>, source_system: &str, original: &str, batch_id: &str) -> String {
    format!(
        "{} | {} | {} | batch = {}",
        at.to_rfc3339_opts(SecondsFormat::Micros, true),
        source_system,
        original,
        batch_id
    )
}

fn append_manifest(path: &Path, line: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{}", line)?;
    Ok(())
}

/// Copy `source` into `raw/<raw_dir>/<extract_date>/` and append the manifest line.
pub fn deposit(
    layout: &DataLayout,
    domain: Domain,
    source: &Path,
    source_system: &str,
    extract_date: &str,
) -> Result<DepositedBatch> {
    let bytes = fs::read(source).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => EtlError::not_found("source export", source),
        _ => EtlError::Io(e),
    })?;
    let original = source
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| EtlError::Config(format!("source path has no file name: {}", source.display())))?;

    let batch_id = new_batch_id();
    let path = layout
        .raw_batch_dir(domain, extract_date)
        .join(batch_file_name(source_system, &batch_id));
    write_atomically(&path, &bytes)?;

    let manifest = layout.manifest_file(domain, extract_date);
    append_manifest(&manifest, &manifest_line(Utc::now(), source_system, original, &batch_id))?;

    info!(
        domain = %domain,
        extract_date,
        batch_id = %batch_id,
        path = %path.display(),
        bytes = bytes.len(),
        "raw batch deposited"
    );
    Ok(DepositedBatch {
        domain,
        extract_date: extract_date.to_string(),
        batch_id,
        path,
        manifest,
        bytes: bytes.len(),
    })
}
