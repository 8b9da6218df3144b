use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{EtlError, Result};

/// How "most recent" is decided among dated batch folders.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecencyOrder {
    /// Greatest folder name wins. Correct only for names that sort by date (`YYYY-MM-DD`).
    #[default]
    Lexicographic,
    /// Folder names are parsed as dates and the latest date wins; names that do not
    /// parse rank below any that do.
    ParsedDate,
}

const FOLDER_DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y%m%d", "%d-%m-%Y", "%d.%m.%Y", "%m/%d/%Y"];

fn parse_folder_date(name: &str) -> Option<NaiveDate> {
    FOLDER_DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(name, fmt).ok())
}

/// Resolves the latest batch folder under a domain root and the latest file inside it.
#[derive(Debug, Clone, Copy, Default)]
pub struct BatchLocator {
    order: RecencyOrder,
}

impl BatchLocator {
    pub fn new(order: RecencyOrder) -> Self {
        Self { order }
    }

    pub fn latest_batch_dir(&self, root: &Path) -> Result<PathBuf> {
        if !root.exists() {
            return Err(EtlError::not_found("batch root", root));
        }

        let mut folders = Vec::new();
        for entry in fs::read_dir(root)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                folders.push(name.to_string());
            }
        }

        let latest = match self.order {
            RecencyOrder::Lexicographic => folders.into_iter().max(),
            RecencyOrder::ParsedDate => folders
                .into_iter()
                .max_by(|a, b| (parse_folder_date(a), a).cmp(&(parse_folder_date(b), b))),
        };

        let latest = latest.ok_or_else(|| EtlError::not_found("dated batch folder", root))?;
        debug!(root = %root.display(), batch = %latest, "resolved latest batch folder");
        Ok(root.join(latest))
    }

    pub fn latest_file(&self, dir: &Path, extension: &str) -> Result<PathBuf> {
        if !dir.exists() {
            return Err(EtlError::not_found("batch folder", dir));
        }

        let suffix = format!(".{}", extension.trim_start_matches('.'));
        let mut files = Vec::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if name.ends_with(&suffix) {
                    files.push(name.to_string());
                }
            }
        }

        let latest = files
            .into_iter()
            .max()
            .ok_or_else(|| EtlError::not_found(format!("{} file", suffix), dir))?;
        debug!(dir = %dir.display(), file = %latest, "resolved latest file");
        Ok(dir.join(latest))
    }
}

/// Latest batch folder using the default lexicographic ordering.
pub fn latest_batch_dir(root: &Path) -> Result<PathBuf> {
    BatchLocator::default().latest_batch_dir(root)
}

/// Latest file with the given extension directly inside `dir`.
pub fn latest_file(dir: &Path, extension: &str) -> Result<PathBuf> {
    BatchLocator::default().latest_file(dir, extension)
}
