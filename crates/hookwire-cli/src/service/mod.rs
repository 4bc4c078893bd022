//! Wiring and lifecycle of the retry worker process.

mod shutdown;

use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, anyhow};
use hookwire_postgres::{PgClient, PgClientMigrationExt};
use hookwire_server::store::PgStore;
use hookwire_server::{DestinationLimiter, RetryWorker, WebhookDispatcher};
use hookwire_webhook::reqwest::ReqwestClient;
use shutdown::shutdown_signal;
use tokio_util::sync::CancellationToken;

use crate::config::Cli;
use crate::{TRACING_TARGET_SHUTDOWN, TRACING_TARGET_STARTUP};

/// Connects to the database, applies migrations and runs the retry worker
/// until a shutdown signal arrives.
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let start_time = Instant::now();

    let pg_client = PgClient::connect(cli.postgres.clone())
        .await
        .context("failed to connect to postgres")?;

    if cli.runtime.skip_migrations {
        tracing::warn!(
            target: TRACING_TARGET_STARTUP,
            "Skipping database migrations"
        );
    } else {
        let applied = pg_client
            .run_pending_migrations()
            .await
            .context("failed to apply database migrations")?;
        tracing::info!(
            target: TRACING_TARGET_STARTUP,
            applied = applied.len(),
            "Database migrations up to date"
        );
    }

    let service = ReqwestClient::new(cli.http.clone())
        .context("failed to create http client")?
        .into_service();

    let store = Arc::new(PgStore::new(pg_client));
    let limiter = DestinationLimiter::new(cli.worker.destination_concurrency);
    let dispatcher = WebhookDispatcher::from_store(store, service).with_limiter(limiter);
    let worker = RetryWorker::new(dispatcher, cli.worker.clone());

    let cancel = CancellationToken::new();
    let handle = tokio::spawn({
        let cancel = cancel.clone();
        async move { worker.run(cancel).await }
    });

    shutdown_signal().await;
    cancel.cancel();

    let shutdown_timeout = cli.runtime.shutdown_timeout();
    tracing::info!(
        target: TRACING_TARGET_SHUTDOWN,
        timeout_secs = shutdown_timeout.as_secs(),
        "Graceful shutdown initiated"
    );

    let result = match tokio::time::timeout(shutdown_timeout, handle).await {
        Ok(Ok(result)) => result.context("retry worker failed"),
        Ok(Err(err)) => Err(anyhow!("retry worker panicked: {err}")),
        Err(_) => {
            tracing::warn!(
                target: TRACING_TARGET_SHUTDOWN,
                "Shutdown timeout elapsed with deliveries in flight"
            );
            Ok(())
        }
    };

    tracing::info!(
        target: TRACING_TARGET_SHUTDOWN,
        uptime_secs = start_time.elapsed().as_secs(),
        "Shutdown completed"
    );

    result
}
