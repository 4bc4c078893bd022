//! Retry sweep worker.
//!
//! Periodically picks up event log rows whose `next_retry` has passed and
//! makes their next attempt through the dispatcher. A batch is awaited in
//! full before the next tick, so within one process a row is never
//! attempted twice at the same time.

use futures::{StreamExt, stream};
use hookwire_postgres::model::WebhookEvent;
use jiff::Timestamp;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::{Result, TRACING_TARGET_WORKER, WebhookDispatcher, WorkerConfig};

/// Counts of what one sweep did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepSummary {
    /// Rows that were due.
    pub due: usize,
    /// Rows delivered by this sweep.
    pub delivered: usize,
    /// Rows that failed again and have another attempt scheduled.
    pub rescheduled: usize,
    /// Rows that became terminal without delivery, exhausted or cancelled.
    pub exhausted: usize,
    /// Rows whose attempt could not be recorded.
    pub errors: usize,
}

impl SweepSummary {
    fn record(&mut self, row: &WebhookEvent) {
        if row.is_delivered() {
            self.delivered += 1;
        } else if row.is_pending_retry() {
            self.rescheduled += 1;
        } else {
            self.exhausted += 1;
        }
    }
}

/// Retry sweep worker.
#[derive(Debug, Clone)]
pub struct RetryWorker {
    dispatcher: WebhookDispatcher,
    config: WorkerConfig,
}

impl RetryWorker {
    /// Creates a new retry worker.
    pub fn new(dispatcher: WebhookDispatcher, config: WorkerConfig) -> Self {
        Self { dispatcher, config }
    }

    /// Returns the worker configuration.
    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Runs the worker until cancelled.
    ///
    /// A failed sweep is logged and the next tick tries again.
    pub async fn run(&self, cancel: CancellationToken) -> Result<()> {
        tracing::info!(
            target: TRACING_TARGET_WORKER,
            interval_secs = self.config.sweep_interval_secs,
            batch_size = self.config.batch_size,
            concurrency = self.config.delivery_concurrency,
            "Starting retry worker"
        );

        let mut interval = tokio::time::interval(self.config.sweep_interval());
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!(
                        target: TRACING_TARGET_WORKER,
                        "Retry worker shutdown requested"
                    );
                    break;
                }
                _ = interval.tick() => {
                    match self.sweep_once().await {
                        Ok(summary) if summary.due > 0 => {
                            tracing::debug!(
                                target: TRACING_TARGET_WORKER,
                                due = summary.due,
                                delivered = summary.delivered,
                                rescheduled = summary.rescheduled,
                                exhausted = summary.exhausted,
                                errors = summary.errors,
                                "Retry sweep finished"
                            );
                        }
                        Ok(_) => {}
                        Err(err) => {
                            tracing::error!(
                                target: TRACING_TARGET_WORKER,
                                error = %err,
                                "Retry sweep failed"
                            );
                        }
                    }
                }
            }
        }

        tracing::info!(
            target: TRACING_TARGET_WORKER,
            "Retry worker stopped"
        );

        Ok(())
    }

    /// Sweeps the rows due now.
    pub async fn sweep_once(&self) -> Result<SweepSummary> {
        self.sweep_once_at(Timestamp::now()).await
    }

    /// Sweeps the rows due at `now`.
    pub async fn sweep_once_at(&self, now: Timestamp) -> Result<SweepSummary> {
        let rows = self
            .dispatcher
            .event_store()
            .find_due_webhook_events(now, self.config.batch_size)
            .await?;

        let mut summary = SweepSummary {
            due: rows.len(),
            ..SweepSummary::default()
        };

        if rows.is_empty() {
            return Ok(summary);
        }

        let dispatcher = &self.dispatcher;
        let results: Vec<_> = stream::iter(rows)
            .map(|row| async move {
                let event_id = row.id;
                (event_id, dispatcher.redeliver_at(event_id, now).await)
            })
            .buffer_unordered(self.config.delivery_concurrency.max(1))
            .collect()
            .await;

        for (event_id, result) in results {
            match result {
                Ok(row) => summary.record(&row),
                Err(err) => {
                    summary.errors += 1;
                    tracing::error!(
                        target: TRACING_TARGET_WORKER,
                        event_id,
                        error = %err,
                        "Failed to redeliver event"
                    );
                }
            }
        }

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use hookwire_webhook::RetryPolicy;
    use hookwire_webhook::reqwest::{ReqwestClient, ReqwestConfig};
    use jiff::SignedDuration;
    use serde_json::json;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::registry::{CreateWebhook, WebhookRegistry};
    use crate::store::MemoryStore;

    struct Harness {
        registry: WebhookRegistry,
        dispatcher: WebhookDispatcher,
        worker: RetryWorker,
    }

    fn harness(config: WorkerConfig) -> Harness {
        let service = ReqwestClient::new(ReqwestConfig::default())
            .unwrap()
            .into_service();
        let store = Arc::new(MemoryStore::new());
        let dispatcher = WebhookDispatcher::from_store(store, service);
        Harness {
            registry: WebhookRegistry::new(dispatcher.clone()),
            worker: RetryWorker::new(dispatcher.clone(), config),
            dispatcher,
        }
    }

    fn later() -> Timestamp {
        Timestamp::now() + SignedDuration::from_hours(1)
    }

    async fn register(harness: &Harness, url: String, policy: RetryPolicy) -> i64 {
        let request = CreateWebhook::new(url, ["user.created"]).with_retry_policy(policy);
        harness.registry.create(1, request).await.unwrap().webhook.id
    }

    #[tokio::test]
    async fn test_sweep_retries_until_delivered() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let harness = harness(WorkerConfig::default());
        let webhook_id = register(&harness, server.uri(), RetryPolicy::new(5, 2.0, 1000)).await;
        harness
            .dispatcher
            .send_webhook(webhook_id, "user.created", json!({}))
            .await
            .unwrap();

        let summary = harness.worker.sweep_once().await.unwrap();
        assert_eq!(summary.due, 0);

        let summary = harness.worker.sweep_once_at(later()).await.unwrap();
        assert_eq!(summary.due, 1);
        assert_eq!(summary.rescheduled, 1);

        let summary = harness.worker.sweep_once_at(later()).await.unwrap();
        assert_eq!(summary.delivered, 1);

        let summary = harness.worker.sweep_once_at(later()).await.unwrap();
        assert_eq!(summary, SweepSummary::default());

        let events = harness.registry.events(webhook_id, None).await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].attempt, 3);
        assert_eq!(events[0].status_code, Some(200));
        assert!(events[0].next_retry.is_none());
    }

    #[tokio::test]
    async fn test_sweep_stops_at_max_attempts() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(3)
            .mount(&server)
            .await;

        let harness = harness(WorkerConfig::default());
        let webhook_id = register(&harness, server.uri(), RetryPolicy::new(3, 2.0, 1000)).await;
        harness
            .dispatcher
            .send_webhook(webhook_id, "user.created", json!({}))
            .await
            .unwrap();

        for _ in 0..4 {
            harness.worker.sweep_once_at(later()).await.unwrap();
        }

        let events = harness.registry.events(webhook_id, None).await.unwrap();
        assert_eq!(events[0].attempt, 3);
        assert_eq!(events[0].status_code, Some(500));
        assert!(events[0].next_retry.is_none());
    }

    #[tokio::test]
    async fn test_sweep_respects_batch_size() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let harness = harness(WorkerConfig::default().with_batch_size(2));
        let webhook_id = register(&harness, server.uri(), RetryPolicy::default()).await;
        for _ in 0..3 {
            harness
                .dispatcher
                .send_webhook(webhook_id, "user.created", json!({}))
                .await
                .unwrap();
        }

        let summary = harness.worker.sweep_once_at(later()).await.unwrap();
        assert_eq!(summary.due, 2);
        assert_eq!(summary.rescheduled, 2);
    }

    #[tokio::test]
    async fn test_run_delivers_and_stops_on_cancel() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let harness = harness(WorkerConfig::default().with_sweep_interval(1));
        let webhook_id = register(&harness, server.uri(), RetryPolicy::new(3, 1.0, 0)).await;
        harness
            .dispatcher
            .send_webhook(webhook_id, "user.created", json!({}))
            .await
            .unwrap();

        let cancel = CancellationToken::new();
        let worker = harness.worker.clone();
        let handle = tokio::spawn({
            let cancel = cancel.clone();
            async move { worker.run(cancel).await }
        });

        let delivered = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let events = harness.registry.events(webhook_id, None).await.unwrap();
                if events[0].status_code == Some(200) {
                    break events[0].attempt;
                }
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        })
        .await
        .unwrap();
        assert_eq!(delivered, 2);

        cancel.cancel();
        let result = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
        assert!(result.is_ok());
    }
}
