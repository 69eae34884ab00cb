//! WolfSync Configuration
//!
//! This module provides configuration structures for the WolfSync
//! directory synchronization engine.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main WolfSync configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WolfSyncConfig {
    /// Sync engine configuration
    #[serde(default)]
    pub sync: SyncConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Sync engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Directories to keep in sync (one peer per directory)
    #[serde(default)]
    pub directories: Vec<PathBuf>,

    /// Interval between directory polls in milliseconds
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Maximum time an idle applier waits before re-checking its mailbox
    #[serde(default = "default_idle_timeout_ms")]
    pub idle_timeout_ms: u64,

    /// Upper bound on concurrent worker threads
    #[serde(default = "default_worker_limit")]
    pub worker_limit: usize,

    /// Run detached until the process is terminated
    #[serde(default = "default_true")]
    pub daemon: bool,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (pretty, compact)
    #[serde(default = "default_log_format")]
    pub format: String,
}

// Default value functions
fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_idle_timeout_ms() -> u64 {
    1000
}

fn default_worker_limit() -> usize {
    1000
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            directories: Vec::new(),
            poll_interval_ms: default_poll_interval_ms(),
            idle_timeout_ms: default_idle_timeout_ms(),
            worker_limit: default_worker_limit(),
            daemon: true,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl WolfSyncConfig {
    /// Build a configuration for the given directories with default settings
    pub fn with_directories<I, P>(directories: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let mut config = Self::default();
        config.sync.directories = directories.into_iter().map(Into::into).collect();
        config
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: &std::path::Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Load configuration from a TOML string
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> crate::Result<Self> {
        let config: WolfSyncConfig = toml::from_str(content)?;
        config.validate_settings()?;
        Ok(config)
    }

    /// Render the configuration as TOML
    pub fn to_toml(&self) -> crate::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Validate everything except the directory list
    ///
    /// A config file may legitimately omit directories when they are
    /// supplied on the command line.
    pub fn validate_settings(&self) -> crate::Result<()> {
        if self.sync.worker_limit == 0 {
            return Err(crate::Error::InvalidWorkerLimit(self.sync.worker_limit));
        }

        if self.sync.poll_interval_ms == 0 {
            return Err(crate::Error::Config("sync.poll_interval_ms must be positive".into()));
        }

        if self.sync.idle_timeout_ms == 0 {
            return Err(crate::Error::Config("sync.idle_timeout_ms must be positive".into()));
        }

        match self.logging.format.as_str() {
            "pretty" | "compact" => {}
            other => {
                return Err(crate::Error::Config(format!(
                    "logging.format must be 'pretty' or 'compact', got '{}'",
                    other
                )))
            }
        }

        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> crate::Result<()> {
        self.validate_settings()?;

        if self.sync.directories.is_empty() {
            return Err(crate::Error::NoDirectories);
        }

        Ok(())
    }

    /// Get poll interval as Duration
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.sync.poll_interval_ms)
    }

    /// Get applier idle timeout as Duration
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.sync.idle_timeout_ms)
    }
}
