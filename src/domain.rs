use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The four HR subsystems feeding the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    Attendance,
    Employee,
    Engagement,
    Performance,
}

impl Domain {
    pub const ALL: [Domain; 4] = [
        Domain::Attendance,
        Domain::Employee,
        Domain::Engagement,
        Domain::Performance,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::Attendance => "attendance",
            Domain::Employee => "employee",
            Domain::Engagement => "engagement",
            Domain::Performance => "performance",
        }
    }

    /// Folder under `raw/` the extraction step deposits batches into by default.
    /// The HR-core export keeps its historical `ibm_hr` folder.
    pub fn default_raw_dir(&self) -> &'static str {
        match self {
            Domain::Employee => "ibm_hr",
            other => other.as_str(),
        }
    }

    /// Label written into batch file names and the extraction manifest.
    pub fn default_source_system(&self) -> &'static str {
        match self {
            Domain::Attendance => "attendance_system",
            Domain::Employee => "hr_core_system",
            Domain::Engagement => "engagement_system",
            Domain::Performance => "performance_system",
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Domain {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "attendance" => Ok(Domain::Attendance),
            "employee" | "ibm_hr" => Ok(Domain::Employee),
            "engagement" => Ok(Domain::Engagement),
            "performance" => Ok(Domain::Performance),
            other => Err(format!("unknown domain '{}'", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_domain_names_case_insensitively() {
        assert_eq!("Attendance".parse::<Domain>().unwrap(), Domain::Attendance);
        assert_eq!("ibm_hr".parse::<Domain>().unwrap(), Domain::Employee);
        assert!("payroll".parse::<Domain>().is_err());
    }

    #[test]
    fn employee_raw_folder_keeps_hr_core_name() {
        assert_eq!(Domain::Employee.default_raw_dir(), "ibm_hr");
        assert_eq!(Domain::Performance.default_raw_dir(), "performance");
    }
}
