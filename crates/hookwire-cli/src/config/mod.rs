//! CLI configuration management.
//!
//! ```text
//! Cli
//! ├── postgres: PgConfig        # Connection pool
//! ├── http: ReqwestConfig       # Delivery client
//! ├── worker: WorkerConfig      # Retry sweep and concurrency
//! └── runtime: RuntimeConfig    # Logging, migrations, shutdown
//! ```
//!
//! Every option can be given as an argument or an environment variable:
//!
//! ```bash
//! hookwire-cli --postgres-url "postgresql://..." --retry-sweep-interval-secs 10
//! POSTGRES_URL="postgresql://..." RETRY_SWEEP_INTERVAL_SECS=10 hookwire-cli
//! ```

mod runtime;

use std::process;

use anyhow::Context;
use clap::Parser;
use hookwire_postgres::PgConfig;
use hookwire_server::WorkerConfig;
use hookwire_webhook::reqwest::ReqwestConfig;
pub use runtime::{LogFormat, RuntimeConfig};
use serde::{Deserialize, Serialize};

use crate::{TRACING_TARGET_CONFIG, TRACING_TARGET_STARTUP};

/// Complete CLI configuration.
#[derive(Debug, Clone, Parser, Serialize, Deserialize)]
#[command(name = "hookwire")]
#[command(about = "Webhook delivery retry worker")]
#[command(version)]
pub struct Cli {
    /// PostgreSQL connection pool configuration.
    #[clap(flatten)]
    pub postgres: PgConfig,

    /// HTTP delivery client configuration.
    #[clap(flatten)]
    pub http: ReqwestConfig,

    /// Retry sweep and delivery concurrency configuration.
    #[clap(flatten)]
    pub worker: WorkerConfig,

    /// Process-level configuration.
    #[clap(flatten)]
    pub runtime: RuntimeConfig,
}

impl Cli {
    /// Loads environment variables from .env file (if enabled) and parses CLI arguments.
    ///
    /// The .env file is loaded first so clap can use its values as defaults.
    pub fn init() -> Self {
        Self::load_dotenv();
        Self::parse()
    }

    #[cfg(feature = "dotenv")]
    fn load_dotenv() {
        if let Err(err) = dotenvy::dotenv()
            && !err.not_found()
        {
            eprintln!("Warning: failed to load .env file: {err}");
        }
    }

    #[cfg(not(feature = "dotenv"))]
    fn load_dotenv() {}

    /// Validates all configuration values.
    pub fn validate(&self) -> anyhow::Result<()> {
        self.postgres
            .validate()
            .context("invalid postgres configuration")?;
        self.worker
            .validate()
            .context("invalid worker configuration")?;
        self.runtime
            .validate()
            .context("invalid runtime configuration")?;
        Ok(())
    }

    /// Logs configuration (no sensitive information).
    pub fn log(&self) {
        tracing::info!(
            target: TRACING_TARGET_STARTUP,
            version = env!("CARGO_PKG_VERSION"),
            "starting hookwire"
        );

        tracing::debug!(
            target: TRACING_TARGET_STARTUP,
            pid = process::id(),
            arch = std::env::consts::ARCH,
            os = std::env::consts::OS,
            features = ?Self::enabled_features(),
            "Build information"
        );

        tracing::info!(
            target: TRACING_TARGET_CONFIG,
            postgres_url = %self.postgres.database_url_masked(),
            postgres_max_connections = self.postgres.postgres_max_connections,
            postgres_connection_timeout_secs = ?self.postgres.postgres_connection_timeout_secs,
            postgres_idle_timeout_secs = ?self.postgres.postgres_idle_timeout_secs,
            "Database configuration"
        );

        tracing::info!(
            target: TRACING_TARGET_CONFIG,
            http_timeout_secs = self.http.effective_timeout().as_secs(),
            max_response_bytes = self.http.max_response_bytes,
            sweep_interval_secs = self.worker.sweep_interval_secs,
            batch_size = self.worker.batch_size,
            delivery_concurrency = self.worker.delivery_concurrency,
            destination_concurrency = self.worker.destination_concurrency,
            "Delivery configuration"
        );
    }

    /// Returns a list of enabled compile-time features.
    fn enabled_features() -> Vec<&'static str> {
        [cfg!(feature = "dotenv").then_some("dotenv")]
            .into_iter()
            .flatten()
            .collect()
    }
}
