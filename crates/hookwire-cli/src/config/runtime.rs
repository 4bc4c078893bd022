//! Process-level configuration.

use std::time::Duration;

use anyhow::{Result as AnyhowResult, anyhow};
use clap::{Args, ValueEnum};
use serde::{Deserialize, Serialize};

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable text.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

/// Logging, migration and shutdown options.
#[derive(Debug, Clone, Args, Serialize, Deserialize)]
#[must_use = "config does nothing unless you use it"]
pub struct RuntimeConfig {
    /// Log output format.
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value = "text")]
    #[serde(default)]
    pub log_format: LogFormat,

    /// Do not apply pending database migrations on startup.
    #[arg(long, env = "SKIP_MIGRATIONS")]
    #[serde(default)]
    pub skip_migrations: bool,

    /// Seconds to wait for in-flight deliveries on shutdown.
    #[arg(long, env = "SHUTDOWN_TIMEOUT", default_value_t = 30)]
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout: u64,
}

fn default_shutdown_timeout() -> u64 {
    30
}

impl RuntimeConfig {
    /// Validates the configuration.
    pub fn validate(&self) -> AnyhowResult<()> {
        if !(1..=300).contains(&self.shutdown_timeout) {
            return Err(anyhow!("shutdown timeout must be within 1..=300 seconds"));
        }
        Ok(())
    }

    /// Returns the shutdown timeout.
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout)
    }
}
