use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::constants::{
    DIM_EMPLOYEE_TABLE, FACT_ATTENDANCE_TABLE, FACT_ENGAGEMENT_TABLE, FACT_PERFORMANCE_TABLE,
    MASTER_TABLE, RAW_DIR,
};
use crate::domain::Domain;
use crate::error::{EtlError, Result};
use crate::pipeline::layout::DataLayout;
use crate::pipeline::locator::RecencyOrder;

pub const DEFAULT_CONFIG_FILE: &str = "pipeline.toml";
pub const CONFIG_ENV: &str = "PEOPLE_ETL_CONFIG";
pub const DATA_ROOT_ENV: &str = "PEOPLE_ETL_DATA_ROOT";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub paths: PathsConfig,
    pub raw_dirs: RawDirsConfig,
    pub locator: LocatorConfig,
    pub warehouse: WarehouseConfig,
    pub extract: ExtractConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub data_root: PathBuf,
    pub logs_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            data_root: PathBuf::from("data"),
            logs_dir: PathBuf::from("logs"),
        }
    }
}

/// Folder name under `raw/` per domain.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RawDirsConfig {
    pub attendance: String,
    pub employee: String,
    pub engagement: String,
    pub performance: String,
}

impl Default for RawDirsConfig {
    fn default() -> Self {
        Self {
            attendance: Domain::Attendance.default_raw_dir().to_string(),
            employee: Domain::Employee.default_raw_dir().to_string(),
            engagement: Domain::Engagement.default_raw_dir().to_string(),
            performance: Domain::Performance.default_raw_dir().to_string(),
        }
    }
}

impl RawDirsConfig {
    pub fn for_domain(&self, domain: Domain) -> &str {
        match domain {
            Domain::Attendance => &self.attendance,
            Domain::Employee => &self.employee,
            Domain::Engagement => &self.engagement,
            Domain::Performance => &self.performance,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LocatorConfig {
    pub order: RecencyOrder,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WarehouseConfig {
    /// SQLite file; defaults to `<data_root>/warehouse/people_analytics.db`.
    pub path: Option<PathBuf>,
    /// Schema qualifier used to build fully-qualified table names.
    pub dataset: String,
    pub tables: TableNamesConfig,
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        Self {
            path: None,
            dataset: "main".to_string(),
            tables: TableNamesConfig::default(),
        }
    }
}

/// Target table per cleaned domain plus the master dataset.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TableNamesConfig {
    pub employee: String,
    pub attendance: String,
    pub engagement: String,
    pub performance: String,
    pub master: String,
}

impl Default for TableNamesConfig {
    fn default() -> Self {
        Self {
            employee: DIM_EMPLOYEE_TABLE.to_string(),
            attendance: FACT_ATTENDANCE_TABLE.to_string(),
            engagement: FACT_ENGAGEMENT_TABLE.to_string(),
            performance: FACT_PERFORMANCE_TABLE.to_string(),
            master: MASTER_TABLE.to_string(),
        }
    }
}

impl TableNamesConfig {
    pub fn for_domain(&self, domain: Domain) -> &str {
        match domain {
            Domain::Attendance => &self.attendance,
            Domain::Employee => &self.employee,
            Domain::Engagement => &self.engagement,
            Domain::Performance => &self.performance,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Source CSV; relative paths resolve against the data root.
    pub path: PathBuf,
    pub source_system: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractConfig {
    pub sources: BTreeMap<Domain, SourceConfig>,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        let files = [
            (Domain::Attendance, "attendance_logs.csv"),
            (Domain::Employee, "employee_data.csv"),
            (Domain::Engagement, "engagement_surveys.csv"),
            (Domain::Performance, "performance_reviews.csv"),
        ];
        let sources = files
            .into_iter()
            .map(|(domain, file)| {
                let path = Path::new(RAW_DIR)
                    .join(domain.default_raw_dir())
                    .join(file);
                (
                    domain,
                    SourceConfig {
                        path,
                        source_system: domain.default_source_system().to_string(),
                    },
                )
            })
            .collect();
        Self { sources }
    }
}

impl PipelineConfig {
    /// Load configuration.
    ///
    /// An explicit path (argument or `PEOPLE_ETL_CONFIG`) must exist. Without one,
    /// `pipeline.toml` in the working directory is used when present, defaults otherwise.
    /// `PEOPLE_ETL_DATA_ROOT` overrides the data root in every case.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let from_env = std::env::var(CONFIG_ENV).ok().map(PathBuf::from);
        let mut config = match explicit.map(Path::to_path_buf).or(from_env) {
            Some(path) => Self::from_file(&path)?,
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    Self::from_file(default_path)?
                } else {
                    Self::default()
                }
            }
        };

        if let Ok(root) = std::env::var(DATA_ROOT_ENV) {
            if !root.trim().is_empty() {
                config.paths.data_root = PathBuf::from(root);
            }
        }
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            EtlError::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: PipelineConfig = toml::from_str(content)?;
        Ok(config)
    }

    /// Config rooted at `data_root` with every other setting at its default.
    pub fn with_data_root(data_root: impl Into<PathBuf>) -> Self {
        let mut config = Self::default();
        config.paths.data_root = data_root.into();
        config
    }

    pub fn layout(&self) -> DataLayout {
        DataLayout::new(&self.paths.data_root, self.raw_dirs.clone())
    }

    pub fn warehouse_path(&self) -> PathBuf {
        self.warehouse
            .path
            .clone()
            .unwrap_or_else(|| self.layout().default_warehouse_file())
    }

    pub fn source_for(&self, domain: Domain) -> Result<SourceConfig> {
        let mut source = self.extract.sources.get(&domain).cloned().ok_or_else(|| {
            EtlError::Config(format!("no extract source configured for {}", domain))
        })?;
        if source.path.is_relative() {
            source.path = self.paths.data_root.join(&source.path);
        }
        Ok(source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_yields_defaults() {
        let config = PipelineConfig::from_toml_str("").unwrap();
        assert_eq!(config.paths.data_root, PathBuf::from("data"));
        assert_eq!(config.raw_dirs.for_domain(Domain::Employee), "ibm_hr");
        assert_eq!(config.locator.order, RecencyOrder::Lexicographic);
        assert_eq!(config.warehouse.dataset, "main");
        assert_eq!(config.warehouse.tables.for_domain(Domain::Employee), "dim_employee");
        assert_eq!(config.warehouse.tables.master, "master_dataset");
        assert_eq!(config.extract.sources.len(), 4);
    }

    #[test]
    fn partial_sections_override_only_their_fields() {
        let config = PipelineConfig::from_toml_str(
            r#"
            [paths]
            data_root = "/srv/people"

            [raw_dirs]
            employee = "hr_core"

            [locator]
            order = "parsed_date"

            [extract.sources.attendance]
            path = "/exports/badge.csv"
            source_system = "badge_reader"
            "#,
        )
        .unwrap();
        assert_eq!(config.paths.data_root, PathBuf::from("/srv/people"));
        assert_eq!(config.paths.logs_dir, PathBuf::from("logs"));
        assert_eq!(config.raw_dirs.for_domain(Domain::Employee), "hr_core");
        assert_eq!(config.raw_dirs.for_domain(Domain::Attendance), "attendance");
        assert_eq!(config.locator.order, RecencyOrder::ParsedDate);

        let source = config.source_for(Domain::Attendance).unwrap();
        assert_eq!(source.path, PathBuf::from("/exports/badge.csv"));
        assert_eq!(source.source_system, "badge_reader");
        // Only the listed source survives an explicit sources table
        assert!(config.source_for(Domain::Employee).is_err());
    }

    #[test]
    fn relative_sources_resolve_against_data_root() {
        let config = PipelineConfig::with_data_root("/tmp/etl");
        let source = config.source_for(Domain::Employee).unwrap();
        assert_eq!(
            source.path,
            PathBuf::from("/tmp/etl/raw/ibm_hr/employee_data.csv")
        );
        assert_eq!(source.source_system, "hr_core_system");
    }

    #[test]
    fn missing_explicit_file_is_a_config_error() {
        let err = PipelineConfig::from_file(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, EtlError::Config(_)));
    }
}
