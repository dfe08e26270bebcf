//! Configuration management for hostsync
//!
//! Loads the TOML configuration, applies `HOSTSYNC_*` environment overrides
//! and validates the result before any component is constructed.

use crate::error::{HostsyncError, Result};
use crate::model::SourceTag;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

mod validator;

pub use validator::{ConfigValidator, MAX_STALE_AFTER_DAYS};

/// Page size used for normal paging
pub const DEFAULT_PAGE_SIZE: usize = 2;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(rename = "_meta")]
    pub meta: MetaConfig,
    pub api: ApiConfig,
    #[serde(default = "default_sources")]
    pub sources: Vec<SourceConfig>,
    pub storage: StorageConfig,
    pub report: ReportConfig,
}

/// Metadata about the configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaConfig {
    pub schema_version: String,
    #[serde(default = "current_timestamp")]
    pub created_at: String,
}

fn current_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Upstream API settings shared by every source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub base_url: String,
    /// Environment variable holding the API token
    pub token_env: String,
    /// Request header the token is sent in
    pub token_header: String,
    pub timeout_secs: u64,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

/// One upstream source. Sources differ only in these fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub tag: SourceTag,
    pub display_name: String,
    /// Endpoint path appended to `api.base_url`
    pub path: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl SourceConfig {
    pub fn new(tag: SourceTag, display_name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            tag,
            display_name: display_name.into(),
            path: path.into(),
            enabled: true,
        }
    }

    /// Full endpoint URL for this source
    pub fn endpoint(&self, base_url: &str) -> String {
        format!(
            "{}/{}",
            base_url.trim_end_matches('/'),
            self.path.trim_start_matches('/')
        )
    }
}

fn default_sources() -> Vec<SourceConfig> {
    vec![
        SourceConfig::new(SourceTag::Qualys, "Qualys", "/qualys/hosts/get"),
        SourceConfig::new(SourceTag::Crowdstrike, "CrowdStrike", "/crowdstrike/hosts/get"),
    ]
}

/// Host store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub database_path: PathBuf,
    /// Hosts written per transaction
    pub batch_size: usize,
}

/// Summary and chart output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    pub output_dir: PathBuf,
    /// Hosts not seen for longer than this are counted as old
    pub stale_after_days: i64,
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(HostsyncError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| HostsyncError::Io {
            source: e,
            context: format!("Failed to read config file: {:?}", path),
        })?;

        Self::from_toml_str(&content)
    }

    /// Parse, apply env overrides and validate a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        Self::finalize(config)
    }

    /// Built-in defaults with env overrides applied and validated
    pub fn from_defaults() -> Result<Self> {
        Self::finalize(Config::default())
    }

    fn finalize(mut config: Config) -> Result<Self> {
        config.apply_env_overrides();

        ConfigValidator::validate(&config)?;

        Ok(config)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|e| HostsyncError::Io {
            source: e,
            context: format!("Failed to write config file: {:?}", path),
        })?;
        Ok(())
    }

    /// Enabled sources, in configuration order
    pub fn enabled_sources(&self) -> impl Iterator<Item = &SourceConfig> {
        self.sources.iter().filter(|s| s.enabled)
    }

    /// Look up a source by tag regardless of whether it is enabled
    pub fn source(&self, tag: SourceTag) -> Option<&SourceConfig> {
        self.sources.iter().find(|s| s.tag == tag)
    }

    /// Apply environment variable overrides
    /// Environment variables in format: HOSTSYNC_SECTION__KEY=value
    pub fn apply_env_overrides(&mut self) {
        for (key, value) in std::env::vars() {
            if let Some(config_key) = key.strip_prefix("HOSTSYNC_") {
                if let Err(e) = self.set_value_from_env(config_key, &value) {
                    tracing::warn!("Failed to apply env override {}: {}", key, e);
                }
            }
        }
    }

    fn set_value_from_env(&mut self, path: &str, value: &str) -> Result<()> {
        match path {
            "API__BASE_URL" => {
                self.api.base_url = value.to_string();
            }
            "API__TOKEN_ENV" => {
                self.api.token_env = value.to_string();
            }
            "API__TIMEOUT_SECS" => {
                self.api.timeout_secs =
                    value.parse().map_err(|_| HostsyncError::InvalidConfigValue {
                        path: path.to_string(),
                        message: format!("Cannot parse '{}' as seconds", value),
                    })?;
            }
            "STORAGE__DATABASE_PATH" => {
                self.storage.database_path = PathBuf::from(value);
            }
            "REPORT__OUTPUT_DIR" => {
                self.report.output_dir = PathBuf::from(value);
            }
            _ => {
                tracing::debug!("Unknown env config key: {}", path);
            }
        }
        Ok(())
    }

    /// Get the default configuration file path
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().ok_or_else(|| {
            HostsyncError::Config("Cannot determine config directory".to_string())
        })?;

        Ok(config_dir.join("hostsync").join("config.toml"))
    }
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = PathBuf::from("~/.hostsync");

        Self {
            meta: MetaConfig {
                schema_version: "1.0.0".to_string(),
                created_at: current_timestamp(),
            },
            api: ApiConfig {
                base_url: "https://api.recruiting.app.silk.security/api".to_string(),
                token_env: "API_TOKEN".to_string(),
                token_header: "token".to_string(),
                timeout_secs: 30,
                page_size: DEFAULT_PAGE_SIZE,
            },
            sources: default_sources(),
            storage: StorageConfig {
                database_path: data_dir.join("hosts.sqlite"),
                batch_size: 100,
            },
            report: ReportConfig {
                output_dir: data_dir.join("charts"),
                stale_after_days: 30,
            },
        }
    }
}

/// Expand a leading `~/` to the user's home directory
pub fn expand_path(path: &Path) -> Result<PathBuf> {
    let path_str = path
        .to_str()
        .ok_or_else(|| HostsyncError::Config("Invalid path encoding".to_string()))?;

    if let Some(stripped) = path_str.strip_prefix("~/") {
        let home = dirs::home_dir()
            .ok_or_else(|| HostsyncError::Config("Cannot determine home directory".to_string()))?;
        Ok(home.join(stripped))
    } else {
        Ok(path.to_path_buf())
    }
}
