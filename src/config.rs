//! Configuration types for crmscript-fetcher

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{path::Path, path::PathBuf, time::Duration};

/// What to do with a fetch request for a tenant that already has a fetch in flight
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BusyPolicy {
    /// Refuse the second fetch immediately (default)
    #[default]
    Reject,
    /// Wait until the running fetch has finished, then proceed
    Queue,
}

/// Fetch behavior configuration (concurrency, timeouts, HTTP client)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Maximum categories fetched at the same time for one tenant (default: 3)
    ///
    /// Bounds the number of simultaneous outbound connections per fetch.
    #[serde(default = "default_max_concurrent_categories")]
    pub max_concurrent_categories: usize,

    /// Timeout for a single category, including retries (default: 60 seconds)
    #[serde(default = "default_category_timeout", with = "duration_serde")]
    pub category_timeout: Duration,

    /// Timeout for establishing a connection to the remote endpoint (default: 10 seconds)
    #[serde(default = "default_connect_timeout", with = "duration_serde")]
    pub connect_timeout: Duration,

    /// Handling of a second fetch for a tenant that is already being fetched
    #[serde(default)]
    pub busy_policy: BusyPolicy,

    /// User agent sent to the remote endpoint
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_concurrent_categories: default_max_concurrent_categories(),
            category_timeout: default_category_timeout(),
            connect_timeout: default_connect_timeout(),
            busy_policy: BusyPolicy::default(),
            user_agent: default_user_agent(),
        }
    }
}

/// Retry configuration for transient failures
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (default: 2)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Initial delay before first retry (default: 1 second)
    #[serde(default = "default_initial_delay", with = "duration_serde")]
    pub initial_delay: Duration,

    /// Maximum delay between retries (default: 10 seconds)
    #[serde(default = "default_max_delay", with = "duration_serde")]
    pub max_delay: Duration,

    /// Multiplier for exponential backoff (default: 2.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to delays (default: true)
    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: true,
        }
    }
}

/// Main configuration for [`CrmscriptFetcher`](crate::CrmscriptFetcher)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Path of the SQLite tenant registry (default: "./crmscript_fetcher.db")
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    /// Directory holding the fetcher script template (default: ".")
    #[serde(default = "default_script_dir")]
    pub script_dir: PathBuf,

    /// Legacy `tenant_settings.json` imported on initial load when the registry is empty
    #[serde(default)]
    pub legacy_settings_path: Option<PathBuf>,

    /// Fetch behavior settings
    #[serde(default)]
    pub fetch: FetchConfig,

    /// Retry behavior for transient network failures
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            script_dir: default_script_dir(),
            legacy_settings_path: None,
            fetch: FetchConfig::default(),
            retry: RetryConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a JSON file and validate it
    ///
    /// Missing fields take their defaults, so `{}` is a valid configuration.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::Config {
            message: format!("failed to read {}: {}", path.display(), e),
            key: None,
        })?;
        let config: Config = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the orchestrator cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.fetch.max_concurrent_categories == 0 {
            return Err(Error::Config {
                message: "max_concurrent_categories must be at least 1".to_string(),
                key: Some("max_concurrent_categories".to_string()),
            });
        }
        if self.fetch.category_timeout.is_zero() {
            return Err(Error::Config {
                message: "category_timeout must be greater than zero".to_string(),
                key: Some("category_timeout".to_string()),
            });
        }
        let multiplier = self.retry.backoff_multiplier;
        if !multiplier.is_finite() || multiplier < 1.0 {
            return Err(Error::Config {
                message: "backoff_multiplier must be a finite number of at least 1.0".to_string(),
                key: Some("backoff_multiplier".to_string()),
            });
        }
        Ok(())
    }
}

fn default_database_path() -> PathBuf {
    PathBuf::from("./crmscript_fetcher.db")
}

fn default_script_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_max_concurrent_categories() -> usize {
    3
}

fn default_category_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_user_agent() -> String {
    format!("crmscript-fetcher/{}", env!("CARGO_PKG_VERSION"))
}

fn default_true() -> bool {
    true
}

fn default_max_attempts() -> u32 {
    2
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(10)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

// Duration serialization helper
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
