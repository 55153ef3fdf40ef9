//! Run configuration: the tracked project table plus fetch/output settings.
//!
//! The built-in table is used unless `HARVEST_CONFIG` names a YAML file, so
//! tracking another project is a configuration change.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Environment variable naming an alternative YAML config file.
pub const CONFIG_ENV: &str = "HARVEST_CONFIG";

/// A tracked project in the remote store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectSpec {
    /// Stable name used as the top-level key of the output document.
    pub designation: String,
    /// Path segment of the project below the store root.
    pub root: String,
    /// Inclusive lower bound applied to major version directories.
    pub min_version: f64,
}

impl ProjectSpec {
    pub fn new(designation: impl Into<String>, root: impl Into<String>, min_version: f64) -> Self {
        Self {
            designation: designation.into(),
            root: root.into(),
            min_version,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarvestConfig {
    /// Root URL of the static-file store.
    pub base_url: String,
    /// Destination of the YAML document.
    pub output_path: PathBuf,
    /// Upper bound for a single index fetch.
    pub fetch_timeout_secs: u64,
    /// Appended to a package name to form its checksum sibling's name.
    pub checksum_suffix: String,
    pub projects: Vec<ProjectSpec>,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            base_url: "https://downloads.example.com/releases".to_string(),
            output_path: PathBuf::from("packages.yaml"),
            fetch_timeout_secs: 30,
            checksum_suffix: ".sha".to_string(),
            projects: vec![
                ProjectSpec::new("server", "server", 2.0),
                ProjectSpec::new("client", "client", 2.0),
                ProjectSpec::new("tools", "tools", 1.0),
            ],
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid config file {path}: {source}")]
    Invalid {
        path: PathBuf,
        #[source]
        source: serde_yaml_ng::Error,
    },
    #[error("Project '{designation}' has a minimum version that cannot be compared: {value}")]
    IncomparableMinimum { designation: String, value: f64 },
    #[error("Project with root '{root}' has an empty designation")]
    EmptyDesignation { root: String },
    #[error("Project designation '{0}' is listed more than once")]
    DuplicateDesignation(String),
    #[error("Checksum suffix must not be empty")]
    EmptyChecksumSuffix,
    #[error("Fetch timeout must be greater than zero")]
    ZeroTimeout,
}

impl HarvestConfig {
    /// Loads the file named by `HARVEST_CONFIG`, or the built-in defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or parsed, or the
    /// resulting configuration fails [`HarvestConfig::validate`].
    pub fn load() -> Result<Self, ConfigError> {
        match std::env::var_os(CONFIG_ENV) {
            Some(path) => Self::from_file(Path::new(&path)),
            None => {
                let config = Self::default();
                config.validate()?;
                Ok(config)
            }
        }
    }

    /// Reads and validates a YAML config file. Missing fields take defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] on I/O, parse or validation failure.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self =
            serde_yaml_ng::from_str(&content).map_err(|source| ConfigError::Invalid {
                path: path.to_path_buf(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that every project can be filtered and keyed unambiguously.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.checksum_suffix.is_empty() {
            return Err(ConfigError::EmptyChecksumSuffix);
        }
        if self.fetch_timeout_secs == 0 {
            return Err(ConfigError::ZeroTimeout);
        }
        validate_projects(&self.projects)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

/// Rejects project tables the harvester cannot process.
///
/// # Errors
///
/// Returns [`ConfigError`] for an empty or duplicate designation, or a
/// minimum version that is NaN or infinite.
pub fn validate_projects(projects: &[ProjectSpec]) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();
    for project in projects {
        if project.designation.is_empty() {
            return Err(ConfigError::EmptyDesignation {
                root: project.root.clone(),
            });
        }
        if !project.min_version.is_finite() {
            return Err(ConfigError::IncomparableMinimum {
                designation: project.designation.clone(),
                value: project.min_version,
            });
        }
        if !seen.insert(project.designation.as_str()) {
            return Err(ConfigError::DuplicateDesignation(
                project.designation.clone(),
            ));
        }
    }
    Ok(())
}
