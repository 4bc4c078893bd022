//! Delivery and retry worker configuration.

use std::time::Duration;

#[cfg(feature = "config")]
use clap::Args;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Default interval between retry sweeps: 5 seconds.
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 5;

/// Default number of due rows fetched per sweep.
pub const DEFAULT_BATCH_SIZE: i64 = 100;

/// Default number of deliveries a sweep runs concurrently.
pub const DEFAULT_DELIVERY_CONCURRENCY: usize = 16;

/// Default number of concurrent deliveries to one host.
pub const DEFAULT_DESTINATION_CONCURRENCY: usize = 4;

/// Configuration for the dispatcher and the retry worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "config", derive(Args))]
#[must_use = "config does nothing unless you use it"]
pub struct WorkerConfig {
    /// Seconds between retry sweeps
    #[cfg_attr(
        feature = "config",
        arg(
            long = "retry-sweep-interval-secs",
            env = "RETRY_SWEEP_INTERVAL_SECS",
            default_value = "5"
        )
    )]
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,

    /// Maximum number of due rows handled per sweep
    #[cfg_attr(
        feature = "config",
        arg(
            long = "retry-sweep-batch-size",
            env = "RETRY_SWEEP_BATCH_SIZE",
            default_value = "100"
        )
    )]
    #[serde(default = "default_batch_size")]
    pub batch_size: i64,

    /// Maximum number of concurrent deliveries per sweep
    #[cfg_attr(
        feature = "config",
        arg(
            long = "delivery-concurrency",
            env = "DELIVERY_CONCURRENCY",
            default_value = "16"
        )
    )]
    #[serde(default = "default_delivery_concurrency")]
    pub delivery_concurrency: usize,

    /// Maximum number of concurrent deliveries to one host (0 = unlimited)
    #[cfg_attr(
        feature = "config",
        arg(
            long = "destination-concurrency",
            env = "DESTINATION_CONCURRENCY",
            default_value = "4"
        )
    )]
    #[serde(default = "default_destination_concurrency")]
    pub destination_concurrency: usize,
}

fn default_sweep_interval_secs() -> u64 {
    DEFAULT_SWEEP_INTERVAL_SECS
}

fn default_batch_size() -> i64 {
    DEFAULT_BATCH_SIZE
}

fn default_delivery_concurrency() -> usize {
    DEFAULT_DELIVERY_CONCURRENCY
}

fn default_destination_concurrency() -> usize {
    DEFAULT_DESTINATION_CONCURRENCY
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            sweep_interval_secs: DEFAULT_SWEEP_INTERVAL_SECS,
            batch_size: DEFAULT_BATCH_SIZE,
            delivery_concurrency: DEFAULT_DELIVERY_CONCURRENCY,
            destination_concurrency: DEFAULT_DESTINATION_CONCURRENCY,
        }
    }
}

impl WorkerConfig {
    /// Validates the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.sweep_interval_secs == 0 {
            return Err(Error::config("retry sweep interval must be at least 1 second"));
        }

        if !(1..=1000).contains(&self.batch_size) {
            return Err(Error::config("retry sweep batch size must be within 1..=1000"));
        }

        if self.delivery_concurrency == 0 {
            return Err(Error::config("delivery concurrency must be at least 1"));
        }

        Ok(())
    }

    /// Returns the interval between sweeps.
    #[inline]
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    /// Sets the sweep interval in seconds.
    pub fn with_sweep_interval(mut self, secs: u64) -> Self {
        self.sweep_interval_secs = secs;
        self
    }

    /// Sets the sweep batch size.
    pub fn with_batch_size(mut self, batch_size: i64) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Sets the number of concurrent deliveries per sweep.
    pub fn with_delivery_concurrency(mut self, concurrency: usize) -> Self {
        self.delivery_concurrency = concurrency;
        self
    }

    /// Sets the per-host concurrency limit.
    pub fn with_destination_concurrency(mut self, concurrency: usize) -> Self {
        self.destination_concurrency = concurrency;
        self
    }
}
