//! Single source of truth for where every stage reads and writes.
//!
//! Raw batches:     `<root>/raw/<raw_dir>/<extract_date>/<system>_batch_<id>.csv`
//! Cleaned batches: `<root>/staging/<domain>/<extract_date>/<domain>_cleaned.csv`
//! Master batches:  `<root>/staging/master/<extract_date>/master_dataset.csv`

use std::path::{Path, PathBuf};

use crate::config::RawDirsConfig;
use crate::constants::{
    CLEANED_SUFFIX, MANIFEST_FILE, MASTER_AREA, MASTER_FILE, RAW_DIR, RUN_LOG_DIR, RUN_LOG_FILE,
    STAGING_DIR, WAREHOUSE_DIR, WAREHOUSE_FILE,
};
use crate::domain::Domain;

#[derive(Debug, Clone)]
pub struct DataLayout {
    root: PathBuf,
    raw_dirs: RawDirsConfig,
}

impl DataLayout {
    pub fn new<P: Into<PathBuf>>(root: P, raw_dirs: RawDirsConfig) -> Self {
        Self {
            root: root.into(),
            raw_dirs,
        }
    }

    pub fn with_default_dirs<P: Into<PathBuf>>(root: P) -> Self {
        Self::new(root, RawDirsConfig::default())
    }

    pub fn raw_domain_dir(&self, domain: Domain) -> PathBuf {
        self.root.join(RAW_DIR).join(self.raw_dirs.for_domain(domain))
    }

    pub fn raw_batch_dir(&self, domain: Domain, extract_date: &str) -> PathBuf {
        self.raw_domain_dir(domain).join(extract_date)
    }

    pub fn manifest_file(&self, domain: Domain, extract_date: &str) -> PathBuf {
        self.raw_batch_dir(domain, extract_date).join(MANIFEST_FILE)
    }

    pub fn staging_domain_dir(&self, domain: Domain) -> PathBuf {
        self.root.join(STAGING_DIR).join(domain.as_str())
    }

    pub fn staging_batch_dir(&self, domain: Domain, extract_date: &str) -> PathBuf {
        self.staging_domain_dir(domain).join(extract_date)
    }

    pub fn cleaned_file_name(domain: Domain) -> String {
        format!("{}{}", domain.as_str(), CLEANED_SUFFIX)
    }

    pub fn cleaned_file(&self, domain: Domain, extract_date: &str) -> PathBuf {
        self.staging_batch_dir(domain, extract_date)
            .join(Self::cleaned_file_name(domain))
    }

    pub fn master_dir(&self) -> PathBuf {
        self.root.join(STAGING_DIR).join(MASTER_AREA)
    }

    pub fn master_batch_dir(&self, extract_date: &str) -> PathBuf {
        self.master_dir().join(extract_date)
    }

    pub fn master_file(&self, extract_date: &str) -> PathBuf {
        self.master_batch_dir(extract_date).join(MASTER_FILE)
    }

    pub fn run_log_file(&self) -> PathBuf {
        self.root.join(RUN_LOG_DIR).join(RUN_LOG_FILE)
    }

    pub fn default_warehouse_file(&self) -> PathBuf {
        self.root.join(WAREHOUSE_DIR).join(WAREHOUSE_FILE)
    }
}

/// The batch folder name of a file, i.e. its extract date.
pub fn extract_date_of(batch_dir: &Path) -> Option<String> {
    batch_dir
        .file_name()
        .and_then(|n| n.to_str())
        .map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn staging_paths_are_partitioned_by_domain_and_date() {
        let layout = DataLayout::with_default_dirs("/data");
        assert_eq!(
            layout.cleaned_file(Domain::Attendance, "2024-03-01"),
            PathBuf::from("/data/staging/attendance/2024-03-01/attendance_cleaned.csv")
        );
        assert_eq!(
            layout.master_file("2024-03-01"),
            PathBuf::from("/data/staging/master/2024-03-01/master_dataset.csv")
        );
    }

    #[test]
    fn raw_paths_use_configured_folder() {
        let layout = DataLayout::with_default_dirs("/data");
        assert_eq!(
            layout.raw_batch_dir(Domain::Employee, "2024-03-01"),
            PathBuf::from("/data/raw/ibm_hr/2024-03-01")
        );
        assert_eq!(
            layout.manifest_file(Domain::Engagement, "2024-03-01"),
            PathBuf::from("/data/raw/engagement/2024-03-01/manifest.txt")
        );
    }

    #[test]
    fn extract_date_is_the_folder_name() {
        assert_eq!(
            extract_date_of(Path::new("/data/staging/employee/2024-03-01")).as_deref(),
            Some("2024-03-01")
        );
    }
}
