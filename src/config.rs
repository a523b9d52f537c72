//! Static run configuration model and file-backed manager.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not determine config directory")]
    NoConfigDir,
    #[error("failed to read config {path}: {source}")]
    Read { path: PathBuf, source: io::Error },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("invalid config value `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
    #[error("failed to write config: {0}")]
    Write(#[from] io::Error),
}

fn default_boilerplate_comment() -> String {
    "Will check ASAP!".to_string()
}

fn default_filler_comment() -> String {
    "miscellaneous consultation + non-development tasks".to_string()
}

fn default_workday_hours() -> f64 {
    8.0
}

fn default_webdriver_url() -> String {
    "http://localhost:4444".to_string()
}

fn default_wait_timeout_secs() -> u64 {
    10
}

fn default_settle_delay_ms() -> u64 {
    1000
}

fn default_data_file() -> PathBuf {
    PathBuf::from("timesheet.json")
}

/// Represents the configuration shared by the dump and replay flows: tracker access, identities used for classification and timesheet UI settings.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Config {
    pub jira_server: String,
    /// Secret store service id for the Jira password.
    pub jira_instance: String,
    pub issue_jql: String,
    pub username: String,
    pub maintenance_issue_type: String,
    pub deployment_user: String,
    #[serde(default = "default_boilerplate_comment")]
    pub boilerplate_comment: String,
    #[serde(default = "default_filler_comment")]
    pub filler_comment: String,
    #[serde(default = "default_workday_hours")]
    pub workday_hours: f64,
    pub timesheet_url: String,
    /// Secret store service id for the timesheet password.
    pub timesheet_instance: String,
    pub project: String,
    /// Total cell text of a fully booked day; derived from `workday_hours` when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_day_total: Option<String>,
    #[serde(default = "default_webdriver_url")]
    pub webdriver_url: String,
    #[serde(default)]
    pub firefox_binary: Option<String>,
    #[serde(default = "default_wait_timeout_secs")]
    pub wait_timeout_secs: u64,
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,
    #[serde(default = "default_data_file")]
    pub data_file: PathBuf,
}

impl Config {
    pub fn wait_timeout(&self) -> Duration {
        Duration::from_secs(self.wait_timeout_secs)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    /// Text the timesheet UI shows in the total row once a day holds `workday_hours`.
    pub fn full_day_total(&self) -> String {
        self.full_day_total
            .clone()
            .unwrap_or_else(|| format!("{:.2}", self.workday_hours).replace('.', ","))
    }

    fn validate(self) -> Result<Self, ConfigError> {
        let required = [
            ("jira_server", &self.jira_server),
            ("jira_instance", &self.jira_instance),
            ("issue_jql", &self.issue_jql),
            ("username", &self.username),
            ("maintenance_issue_type", &self.maintenance_issue_type),
            ("deployment_user", &self.deployment_user),
            ("timesheet_url", &self.timesheet_url),
            ("timesheet_instance", &self.timesheet_instance),
            ("project", &self.project),
        ];
        for (key, value) in required {
            if value.trim().is_empty() {
                return Err(ConfigError::Invalid {
                    key,
                    reason: "must not be empty".to_string(),
                });
            }
        }
        if !(self.workday_hours > 0.0 && self.workday_hours <= 24.0) {
            return Err(ConfigError::Invalid {
                key: "workday_hours",
                reason: format!("{} is outside (0, 24]", self.workday_hours),
            });
        }
        Ok(self)
    }
}

/// Loads and saves the run configuration as JSON, by default from the platform-specific config directory.
pub struct ConfigManager {
    path: PathBuf,
}

impl ConfigManager {
    /// Creates a manager bound to the platform-specific config path.
    pub fn new() -> Result<Self, ConfigError> {
        let dirs = directories::ProjectDirs::from("ru", "sovego", "timesheet-sync")
            .ok_or(ConfigError::NoConfigDir)?;
        Ok(Self {
            path: dirs.config_dir().join("config.json"),
        })
    }

    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads and validates the config. A missing or malformed file is fatal.
    pub fn load(&self) -> Result<Config, ConfigError> {
        let content = fs::read_to_string(&self.path).map_err(|source| ConfigError::Read {
            path: self.path.clone(),
            source,
        })?;
        let config: Config = serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: self.path.clone(),
            source,
        })?;
        config.validate()
    }

    /// Persists config to disk, creating parent directories when needed.
    pub fn save(&self, config: &Config) -> Result<(), ConfigError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(config).map_err(io::Error::from)?;
        fs::write(&self.path, content)?;
        Ok(())
    }
}
