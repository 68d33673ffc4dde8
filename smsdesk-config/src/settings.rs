//! Typed settings read from the same YAML document as [`crate::Configurable`].
//!
//! Every section has defaults except `api.base_url`, so a minimal config is
//! just:
//!
//! ```yaml
//! api:
//!   base_url: https://api.example.com
//! ```
use std::{path::Path, time::Duration};

use serde::{Deserialize, Serialize};

use crate::ConfigError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Settings {
    pub api: ApiSettings,
    #[serde(default)]
    pub cache: CacheSettings,
    #[serde(default)]
    pub poller: PollerSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

/// Backend connection parameters. Timeouts are in seconds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApiSettings {
    pub base_url: String,
    /// Whole-request timeout; requests are aborted after this.
    #[serde(default = "default_timeout")]
    pub timeout: u64,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Retry budget for transport failures on idempotent reads.
    #[serde(default = "default_retry_max_elapsed")]
    pub retry_max_elapsed: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CacheSettings {
    #[serde(default = "default_cache_ttl")]
    pub ttl: u64,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PollerSettings {
    #[serde(default = "default_poll_interval")]
    pub interval: u64,
    #[serde(default = "default_poll_max_duration")]
    pub max_duration: u64,
    /// Activation statuses meaning "cancelled/expired" on the backend.
    #[serde(default = "default_terminal_statuses")]
    pub terminal_statuses: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingSettings {
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

impl Settings {
    /// Build settings out of an already parsed YAML document.
    pub fn from_value(value: &serde_yaml::Value) -> Result<Self, ConfigError> {
        let settings: Settings = serde_yaml::from_value(value.clone())?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let value: serde_yaml::Value = serde_yaml::from_str(&content)?;
        Self::from_value(&value)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let base_url = self.api.base_url.trim();
        if base_url.is_empty() {
            return Err(ConfigError::Invalid("api.base_url is empty".into()));
        }
        if !(base_url.starts_with("http://") || base_url.starts_with("https://"))
        {
            return Err(ConfigError::Invalid(format!(
                "api.base_url must be an http(s) url, got {base_url}"
            )));
        }
        if self.cache.page_size == 0 {
            return Err(ConfigError::Invalid("cache.page_size must be > 0".into()));
        }
        if self.poller.interval == 0 {
            return Err(ConfigError::Invalid("poller.interval must be > 0".into()));
        }
        Ok(())
    }
}

impl ApiSettings {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: default_timeout(),
            connect_timeout: default_connect_timeout(),
            user_agent: default_user_agent(),
            retry_max_elapsed: default_retry_max_elapsed(),
        }
    }

    pub fn retry_max_elapsed(&self) -> Duration {
        Duration::from_secs(self.retry_max_elapsed)
    }
}

impl CacheSettings {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl)
    }
}

impl PollerSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval)
    }

    pub fn max_duration(&self) -> Duration {
        Duration::from_secs(self.max_duration)
    }
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            ttl: default_cache_ttl(),
            page_size: default_page_size(),
        }
    }
}

impl Default for PollerSettings {
    fn default() -> Self {
        Self {
            interval: default_poll_interval(),
            max_duration: default_poll_max_duration(),
            terminal_statuses: default_terminal_statuses(),
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
        }
    }
}

// ── Defaults ──────────────────────────────────────────────────────────

fn default_timeout() -> u64 {
    10
}
fn default_connect_timeout() -> u64 {
    5
}
fn default_user_agent() -> String {
    concat!("smsdesk/", env!("CARGO_PKG_VERSION")).to_string()
}
fn default_retry_max_elapsed() -> u64 {
    10
}

fn default_cache_ttl() -> u64 {
    300
}
fn default_page_size() -> u32 {
    50
}

fn default_poll_interval() -> u64 {
    30
}
fn default_poll_max_duration() -> u64 {
    1200
}
fn default_terminal_statuses() -> Vec<String> {
    vec!["6".to_string()]
}

fn default_log_filter() -> String {
    "info".to_string()
}
