// src/config.rs
//! Configuration file parsing for cfgstore
//!
//! Supports TOML configuration files with the following sections:
//! - [storage] - Database location
//! - [import] - What to import and how hard to try
//! - [gitiles] - HTTP client settings

use crate::import::{DEFAULT_ARCHIVE_DEADLINE, DEFAULT_LOG_DEADLINE, ImportSettings};
use crate::location::Location;
use crate::validation::is_valid_service_id;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default location of the configuration file
pub const DEFAULT_CONFIG_PATH: &str = "/etc/cfgstore/cfgstore.toml";

/// TOML configuration file structure
#[derive(Debug, Default, Deserialize)]
pub struct CfgstoreConfig {
    /// Storage settings
    #[serde(default)]
    pub storage: StorageSection,

    /// Import settings
    #[serde(default)]
    pub import: ImportSection,

    /// Gitiles client settings
    #[serde(default)]
    pub gitiles: GitilesSection,
}

/// Storage configuration section
#[derive(Debug, Deserialize)]
pub struct StorageSection {
    /// SQLite database file
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("/var/lib/cfgstore/cfgstore.db")
}

/// Import configuration section
#[derive(Debug, Deserialize)]
pub struct ImportSection {
    /// Service whose config set declares projects
    #[serde(default = "default_app_id")]
    pub app_id: String,

    /// Root with one directory per service (services are skipped if unset)
    #[serde(default)]
    pub services_location: Option<String>,

    /// Treeish of each project's own config
    #[serde(default = "default_luci")]
    pub project_ref: String,

    /// Config directory of branches that don't name one
    #[serde(default = "default_luci")]
    pub branch_config_path: String,

    /// Seconds allowed for resolving a ref
    #[serde(default = "default_log_deadline")]
    pub log_deadline_secs: u64,

    /// Seconds allowed for fetching an archive
    #[serde(default = "default_archive_deadline")]
    pub archive_deadline_secs: u64,

    /// Config sets imported in parallel
    #[serde(default = "default_max_parallel")]
    pub max_parallel: usize,
}

impl Default for ImportSection {
    fn default() -> Self {
        Self {
            app_id: default_app_id(),
            services_location: None,
            project_ref: default_luci(),
            branch_config_path: default_luci(),
            log_deadline_secs: default_log_deadline(),
            archive_deadline_secs: default_archive_deadline(),
            max_parallel: default_max_parallel(),
        }
    }
}

fn default_app_id() -> String {
    "luci-config".to_string()
}

fn default_luci() -> String {
    "luci".to_string()
}

fn default_log_deadline() -> u64 {
    DEFAULT_LOG_DEADLINE.as_secs()
}

fn default_archive_deadline() -> u64 {
    DEFAULT_ARCHIVE_DEADLINE.as_secs()
}

fn default_max_parallel() -> usize {
    8
}

/// Gitiles client section
#[derive(Debug, Deserialize)]
pub struct GitilesSection {
    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Environment variable holding a bearer token
    #[serde(default)]
    pub auth_token_env: Option<String>,
}

impl Default for GitilesSection {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout(),
            auth_token_env: None,
        }
    }
}

fn default_timeout() -> u64 {
    30
}

impl GitilesSection {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Token from the configured environment variable, if set and non-empty
    pub fn auth_token(&self) -> Option<String> {
        let var = self.auth_token_env.as_deref()?;
        std::env::var(var).ok().filter(|t| !t.is_empty())
    }
}

impl CfgstoreConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: CfgstoreConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if !is_valid_service_id(&self.import.app_id) {
            anyhow::bail!("import.app_id is not a valid service id: {:?}", self.import.app_id);
        }

        if let Some(location) = &self.import.services_location {
            Location::parse(location)
                .with_context(|| format!("Invalid import.services_location: {}", location))?;
        }

        if self.import.project_ref.is_empty() {
            anyhow::bail!("import.project_ref must not be empty");
        }

        if self.import.max_parallel == 0 {
            anyhow::bail!("import.max_parallel must be at least 1");
        }

        if self.import.log_deadline_secs == 0 || self.import.archive_deadline_secs == 0 {
            anyhow::bail!("import deadlines must be greater than zero");
        }

        if self.gitiles.timeout_secs == 0 {
            anyhow::bail!("gitiles.timeout_secs must be greater than zero");
        }

        Ok(())
    }

    /// Settings for an import engine
    pub fn import_settings(&self) -> ImportSettings {
        ImportSettings {
            app_id: self.import.app_id.clone(),
            services_location: self.import.services_location.clone(),
            project_ref: self.import.project_ref.clone(),
            branch_config_path: self.import.branch_config_path.clone(),
            log_deadline: Duration::from_secs(self.import.log_deadline_secs),
            archive_deadline: Duration::from_secs(self.import.archive_deadline_secs),
            max_parallel: self.import.max_parallel,
        }
    }
}
