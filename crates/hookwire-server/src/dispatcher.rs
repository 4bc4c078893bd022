//! Event dispatch: envelope, event log row, signed delivery, outcome.
//!
//! Every logical event gets exactly one row in the event log. The first
//! attempt happens inline; later attempts are driven by the retry worker
//! through [`WebhookDispatcher::redeliver`]. Each attempt ends with exactly
//! one update of the row.
//!
//! A new row is inserted already due at the end of the inline lease, so a
//! first attempt whose outcome cannot be recorded is still picked up by the
//! sweep.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use hookwire_postgres::model::{NewWebhookEvent, UpdateWebhookEvent, Webhook, WebhookEvent};
use hookwire_webhook::{
    DeliveryOutcome, DeliveryState, DeliveryUpdate, RetryPolicy, SignedPayload,
    TransportErrorKind, WebhookEnvelope, WebhookRequest, WebhookService,
};
use jiff::{SignedDuration, Timestamp};
use serde_json::Value;
use url::Url;

use crate::store::{EventLogStore, WebhookStore};
use crate::{DestinationLimiter, Error, Result, TRACING_TARGET_DISPATCH};

/// Response recorded when a pending retry is dropped because the webhook
/// was deactivated.
pub const CANCELLED_RESPONSE: &str = "delivery cancelled: webhook inactive";

/// Default time the inline first attempt holds a new row before the sweep
/// may pick it up.
pub const DEFAULT_INLINE_LEASE: SignedDuration = SignedDuration::from_secs(300);

/// Sends events to webhooks and records every attempt in the event log.
///
/// Cheap to clone; clones share stores, client and limiter.
#[derive(Clone)]
pub struct WebhookDispatcher {
    webhooks: Arc<dyn WebhookStore>,
    events: Arc<dyn EventLogStore>,
    service: WebhookService,
    limiter: DestinationLimiter,
    request_timeout: Option<Duration>,
    inline_lease: SignedDuration,
}

impl std::fmt::Debug for WebhookDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookDispatcher")
            .field("limiter", &self.limiter)
            .field("request_timeout", &self.request_timeout)
            .field("inline_lease", &self.inline_lease)
            .finish_non_exhaustive()
    }
}

impl WebhookDispatcher {
    /// Creates a dispatcher over separate registry and event log stores.
    pub fn new(
        webhooks: Arc<dyn WebhookStore>,
        events: Arc<dyn EventLogStore>,
        service: WebhookService,
    ) -> Self {
        Self {
            webhooks,
            events,
            service,
            limiter: DestinationLimiter::default(),
            request_timeout: None,
            inline_lease: DEFAULT_INLINE_LEASE,
        }
    }

    /// Creates a dispatcher over a store that holds both tables.
    pub fn from_store<S>(store: Arc<S>, service: WebhookService) -> Self
    where
        S: WebhookStore + EventLogStore + 'static,
    {
        Self::new(store.clone(), store, service)
    }

    /// Sets the per-destination limiter.
    pub fn with_limiter(mut self, limiter: DestinationLimiter) -> Self {
        self.limiter = limiter;
        self
    }

    /// Overrides the client timeout for every attempt.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Sets how long a new row is reserved for its inline first attempt.
    ///
    /// Must exceed the longest time an attempt can take, including the wait
    /// for a destination permit, or the sweep may attempt the row again
    /// while the first attempt is still in flight.
    pub fn with_inline_lease(mut self, lease: SignedDuration) -> Self {
        self.inline_lease = lease;
        self
    }

    /// Returns the registry store.
    pub fn webhook_store(&self) -> &Arc<dyn WebhookStore> {
        &self.webhooks
    }

    /// Returns the event log store.
    pub fn event_store(&self) -> &Arc<dyn EventLogStore> {
        &self.events
    }

    /// Sends `event` with `data` to one webhook.
    ///
    /// Returns `None` without touching the event log when the webhook does
    /// not exist or is inactive. Otherwise the row is created, the first
    /// attempt is made and the row as recorded after that attempt is
    /// returned. Delivery failures are recorded, never returned; only
    /// envelope and store errors are. If the outcome cannot be recorded the
    /// error is returned and the row stays due for the sweep.
    #[tracing::instrument(skip(self, data))]
    pub async fn send_webhook(
        &self,
        webhook_id: i64,
        event: &str,
        data: Value,
    ) -> Result<Option<WebhookEvent>> {
        let Some(webhook) = self.webhooks.find_webhook_by_id(webhook_id).await? else {
            tracing::debug!(
                target: TRACING_TARGET_DISPATCH,
                webhook_id,
                "Webhook not found, event dropped"
            );
            return Ok(None);
        };

        if !webhook.active {
            tracing::debug!(
                target: TRACING_TARGET_DISPATCH,
                webhook_id,
                "Webhook inactive, event dropped"
            );
            return Ok(None);
        }

        self.send_to(&webhook, event, data).await.map(Some)
    }

    /// Sends `event` to every active webhook of a workspace subscribed to it.
    ///
    /// Each webhook gets its own envelope and row. A failure for one webhook
    /// is logged and does not affect the others.
    #[tracing::instrument(skip(self, data))]
    pub async fn emit(
        &self,
        workspace_id: i64,
        event: &str,
        data: Value,
    ) -> Result<Vec<WebhookEvent>> {
        if event.trim().is_empty() {
            return Err(Error::validation("event name cannot be empty"));
        }

        let webhooks = self
            .webhooks
            .find_webhooks_for_event(workspace_id, event)
            .await?;

        if webhooks.is_empty() {
            tracing::debug!(
                target: TRACING_TARGET_DISPATCH,
                "No webhooks subscribed to event"
            );
            return Ok(Vec::new());
        }

        tracing::debug!(
            target: TRACING_TARGET_DISPATCH,
            webhook_count = webhooks.len(),
            "Found webhooks subscribed to event"
        );

        let sends = webhooks
            .iter()
            .map(|webhook| self.send_to(webhook, event, data.clone()));

        let mut rows = Vec::with_capacity(webhooks.len());
        for (webhook, result) in webhooks.iter().zip(join_all(sends).await) {
            match result {
                Ok(row) => rows.push(row),
                Err(err) => {
                    tracing::error!(
                        target: TRACING_TARGET_DISPATCH,
                        webhook_id = webhook.id,
                        error = %err,
                        "Failed to send event to webhook"
                    );
                }
            }
        }

        Ok(rows)
    }

    /// Makes the next attempt for an event log row if its retry is due now.
    ///
    /// See [`WebhookDispatcher::redeliver_at`].
    pub async fn redeliver(&self, event_id: i64) -> Result<WebhookEvent> {
        self.redeliver_at(event_id, Timestamp::now()).await
    }

    /// Makes the next attempt for an event log row if its retry is due at
    /// `now`.
    ///
    /// The row is reloaded and returned unchanged when it is terminal or not
    /// yet due. The webhook is reloaded next. If it was deactivated the retry
    /// is cancelled: the row keeps its last status and attempt count and is
    /// made terminal. The stored payload is re-signed with the current
    /// secret, so the receiver sees the same body with a valid signature.
    pub async fn redeliver_at(&self, event_id: i64, now: Timestamp) -> Result<WebhookEvent> {
        let row = self
            .events
            .find_webhook_event_by_id(event_id)
            .await?
            .ok_or_else(|| Error::not_found("webhook event", event_id))?;

        if !row.is_due(now) {
            tracing::debug!(
                target: TRACING_TARGET_DISPATCH,
                event_id,
                attempt = row.attempt,
                "Event not due, redelivery skipped"
            );
            return Ok(row);
        }

        let webhook = self
            .webhooks
            .find_webhook_by_id(row.webhook_id)
            .await?
            .ok_or_else(|| Error::not_found("webhook", row.webhook_id))?;

        if !webhook.active {
            return self.cancel(row).await;
        }

        let payload = SignedPayload::new(row.payload.clone(), &webhook.secret);
        self.attempt(&webhook, row, payload).await
    }

    async fn send_to(&self, webhook: &Webhook, event: &str, data: Value) -> Result<WebhookEvent> {
        let envelope = WebhookEnvelope::new(event, data)?;
        let payload = envelope.sign(&webhook.secret)?;

        let now = Timestamp::now();
        let lease_end = now.checked_add(self.inline_lease).unwrap_or(now);
        let new_event = NewWebhookEvent::new(webhook.id, event, payload.body.clone())
            .with_next_retry(lease_end);
        let row = self.events.create_webhook_event(new_event).await?;

        tracing::debug!(
            target: TRACING_TARGET_DISPATCH,
            webhook_id = webhook.id,
            event_id = row.id,
            envelope_id = %envelope.id,
            "Event queued"
        );

        let event_id = row.id;
        self.attempt(webhook, row, payload).await.inspect_err(|err| {
            tracing::error!(
                target: TRACING_TARGET_DISPATCH,
                webhook_id = webhook.id,
                event_id,
                error = %err,
                "Failed to record delivery outcome, left for the retry sweep"
            );
        })
    }

    async fn attempt(
        &self,
        webhook: &Webhook,
        row: WebhookEvent,
        payload: SignedPayload,
    ) -> Result<WebhookEvent> {
        let policy = retry_policy_of(webhook);
        let attempt = u32::try_from(row.attempt).unwrap_or(0);

        let outcome = match Url::parse(&webhook.url) {
            Ok(url) => {
                let mut request = WebhookRequest::new(url, row.id, payload);
                if let Some(timeout) = self.request_timeout {
                    request = request.with_timeout(timeout);
                }

                let _permit = match request.destination() {
                    Some(host) => self.limiter.acquire(host).await,
                    None => None,
                };

                self.service.deliver(&request).await
            }
            Err(err) => DeliveryOutcome::transport(
                TransportErrorKind::Request,
                format!("invalid webhook url: {err}"),
            ),
        };

        let update = policy.schedule(attempt, &outcome, Timestamp::now());
        self.record(webhook, row.id, &update).await
    }

    async fn record(
        &self,
        webhook: &Webhook,
        event_id: i64,
        update: &DeliveryUpdate,
    ) -> Result<WebhookEvent> {
        let changes = UpdateWebhookEvent {
            status_code: update.status_code.map(i32::from),
            response: Some(update.response.clone()),
            attempt: i32::try_from(update.attempt).unwrap_or(i32::MAX),
            next_retry: update.next_retry.map(Into::into),
        };

        let row = self
            .events
            .update_webhook_event_status(event_id, changes)
            .await?
            .ok_or_else(|| Error::not_found("webhook event", event_id))?;

        match update.state() {
            DeliveryState::Delivered => {
                tracing::info!(
                    target: TRACING_TARGET_DISPATCH,
                    webhook_id = webhook.id,
                    event_id,
                    attempt = update.attempt,
                    "Event delivered"
                );
            }
            DeliveryState::RetryScheduled => {
                tracing::debug!(
                    target: TRACING_TARGET_DISPATCH,
                    webhook_id = webhook.id,
                    event_id,
                    attempt = update.attempt,
                    next_retry = ?update.next_retry,
                    "Retry scheduled"
                );
            }
            DeliveryState::Exhausted => {
                tracing::warn!(
                    target: TRACING_TARGET_DISPATCH,
                    webhook_id = webhook.id,
                    event_id,
                    attempt = update.attempt,
                    status_code = ?update.status_code,
                    "Delivery attempts exhausted"
                );
            }
        }

        Ok(row)
    }

    async fn cancel(&self, row: WebhookEvent) -> Result<WebhookEvent> {
        tracing::info!(
            target: TRACING_TARGET_DISPATCH,
            webhook_id = row.webhook_id,
            event_id = row.id,
            attempt = row.attempt,
            "Webhook inactive, pending retry cancelled"
        );

        let changes = UpdateWebhookEvent {
            status_code: row.status_code,
            response: Some(CANCELLED_RESPONSE.to_owned()),
            attempt: row.attempt,
            next_retry: None,
        };

        self.events
            .update_webhook_event_status(row.id, changes)
            .await?
            .ok_or_else(|| Error::not_found("webhook event", row.id))
    }
}

/// Returns the webhook's retry policy, or the default when none is stored.
///
/// A stored policy that no longer parses falls back to the default.
pub(crate) fn retry_policy_of(webhook: &Webhook) -> RetryPolicy {
    let Some(value) = &webhook.retry_policy else {
        return RetryPolicy::default();
    };

    match serde_json::from_value::<RetryPolicy>(value.clone()) {
        Ok(policy) if policy.validate().is_ok() => policy,
        Ok(_) | Err(_) => {
            tracing::warn!(
                target: TRACING_TARGET_DISPATCH,
                webhook_id = webhook.id,
                "Stored retry policy is invalid, using default"
            );
            RetryPolicy::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use hookwire_postgres::model::NewWebhook;
    use hookwire_webhook::reqwest::{ReqwestClient, ReqwestConfig};
    use hookwire_webhook::{EVENT_ID_HEADER, SIGNATURE_HEADER, verify};
    use jiff::SignedDuration;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::store::MemoryStore;

    struct Harness {
        store: Arc<MemoryStore>,
        dispatcher: WebhookDispatcher,
    }

    impl Harness {
        fn new() -> Self {
            let service = ReqwestClient::new(ReqwestConfig::default())
                .unwrap()
                .into_service();
            let store = Arc::new(MemoryStore::new());
            let dispatcher = WebhookDispatcher::from_store(store.clone(), service)
                .with_request_timeout(Duration::from_millis(500));
            Self { store, dispatcher }
        }

        async fn webhook(&self, url: String, policy: Option<RetryPolicy>) -> Webhook {
            let new_webhook = NewWebhook {
                workspace_id: 1,
                url,
                events: vec![Some("user.created".to_owned())],
                secret: "test_secret".to_owned(),
                active: true,
                retry_policy: policy.map(|p| serde_json::to_value(p).unwrap()),
            };
            self.store.create_webhook(new_webhook).await.unwrap()
        }

        async fn due(&self) -> Vec<WebhookEvent> {
            self.store.find_due_webhook_events(later(), 100).await.unwrap()
        }
    }

    fn later() -> Timestamp {
        Timestamp::now() + SignedDuration::from_hours(1)
    }

    /// Event log that fails every status update.
    struct UnrecordableLog {
        inner: Arc<MemoryStore>,
    }

    #[async_trait::async_trait]
    impl EventLogStore for UnrecordableLog {
        async fn create_webhook_event(&self, new_event: NewWebhookEvent) -> Result<WebhookEvent> {
            self.inner.create_webhook_event(new_event).await
        }

        async fn find_webhook_event_by_id(&self, event_id: i64) -> Result<Option<WebhookEvent>> {
            self.inner.find_webhook_event_by_id(event_id).await
        }

        async fn list_webhook_events(
            &self,
            webhook_id: i64,
            pagination: hookwire_postgres::query::Pagination,
        ) -> Result<Vec<WebhookEvent>> {
            self.inner.list_webhook_events(webhook_id, pagination).await
        }

        async fn update_webhook_event_status(
            &self,
            _event_id: i64,
            _changes: UpdateWebhookEvent,
        ) -> Result<Option<WebhookEvent>> {
            Err(Error::store("connection reset"))
        }

        async fn find_due_webhook_events(
            &self,
            now: Timestamp,
            limit: i64,
        ) -> Result<Vec<WebhookEvent>> {
            self.inner.find_due_webhook_events(now, limit).await
        }
    }

    #[tokio::test]
    async fn test_successful_delivery() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hook"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .expect(1)
            .mount(&server)
            .await;

        let harness = Harness::new();
        let webhook = harness.webhook(format!("{}/hook", server.uri()), None).await;

        let row = harness
            .dispatcher
            .send_webhook(webhook.id, "user.created", json!({"userId": 7}))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(row.status_code, Some(200));
        assert_eq!(row.response.as_deref(), Some("ok"));
        assert_eq!(row.attempt, 1);
        assert!(row.next_retry.is_none());
        assert!(row.is_delivered());

        let received = &server.received_requests().await.unwrap()[0];
        let body = String::from_utf8(received.body.clone()).unwrap();
        assert_eq!(body, row.payload);

        let signature = received.headers[SIGNATURE_HEADER].to_str().unwrap();
        assert!(verify(body.as_bytes(), signature, "test_secret"));
        assert_eq!(
            received.headers[EVENT_ID_HEADER].to_str().unwrap(),
            row.id.to_string()
        );

        let envelope: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(envelope["event"], "user.created");
        assert_eq!(envelope["data"]["userId"], 7);
    }

    #[tokio::test]
    async fn test_retries_until_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let harness = Harness::new();
        let policy = RetryPolicy::new(5, 2.0, 1000);
        let webhook = harness.webhook(server.uri(), Some(policy)).await;

        let started = Timestamp::now();
        let row = harness
            .dispatcher
            .send_webhook(webhook.id, "user.created", json!({}))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row.status_code, Some(500));
        assert_eq!(row.response.as_deref(), Some("boom"));
        assert_eq!(row.attempt, 1);

        let next_retry = Timestamp::from(row.next_retry.unwrap());
        assert!(next_retry >= started + SignedDuration::from_millis(1000));
        assert!(next_retry <= Timestamp::now() + SignedDuration::from_millis(1000));

        let started = Timestamp::now();
        let row = harness.dispatcher.redeliver_at(row.id, later()).await.unwrap();
        assert_eq!(row.status_code, Some(500));
        assert_eq!(row.attempt, 2);

        let next_retry = Timestamp::from(row.next_retry.unwrap());
        assert!(next_retry >= started + SignedDuration::from_millis(2000));
        assert!(next_retry <= Timestamp::now() + SignedDuration::from_millis(2000));

        let row = harness.dispatcher.redeliver_at(row.id, later()).await.unwrap();
        assert_eq!(row.status_code, Some(200));
        assert_eq!(row.attempt, 3);
        assert!(row.next_retry.is_none());

        let rows = harness
            .store
            .list_webhook_events(webhook.id, Default::default())
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(server.received_requests().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_exhausts_after_max_attempts() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(3)
            .mount(&server)
            .await;

        let harness = Harness::new();
        let webhook = harness
            .webhook(server.uri(), Some(RetryPolicy::new(3, 2.0, 10)))
            .await;

        let mut row = harness
            .dispatcher
            .send_webhook(webhook.id, "user.created", json!({}))
            .await
            .unwrap()
            .unwrap();

        while row.next_retry.is_some() {
            row = harness.dispatcher.redeliver_at(row.id, later()).await.unwrap();
        }

        assert_eq!(row.attempt, 3);
        assert_eq!(row.status_code, Some(500));
        assert!(harness.due().await.is_empty());

        let row = harness.dispatcher.redeliver_at(row.id, later()).await.unwrap();
        assert_eq!(row.attempt, 3);
    }

    #[tokio::test]
    async fn test_timeout_records_transport_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
            .mount(&server)
            .await;

        let harness = Harness::new();
        let webhook = harness.webhook(server.uri(), None).await;

        let row = harness
            .dispatcher
            .send_webhook(webhook.id, "user.created", json!({}))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(row.status_code, None);
        assert!(row.response.is_some_and(|r| !r.is_empty()));
        assert_eq!(row.attempt, 1);
        assert!(row.next_retry.is_some());
    }

    #[tokio::test]
    async fn test_inactive_webhook_is_skipped() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let harness = Harness::new();
        let webhook = harness.webhook(server.uri(), None).await;
        let changes = hookwire_postgres::model::UpdateWebhook {
            active: Some(false),
            ..Default::default()
        };
        harness.store.update_webhook(webhook.id, changes).await.unwrap();

        let sent = harness
            .dispatcher
            .send_webhook(webhook.id, "user.created", json!({}))
            .await
            .unwrap();
        assert!(sent.is_none());

        let missing = harness
            .dispatcher
            .send_webhook(404, "user.created", json!({}))
            .await
            .unwrap();
        assert!(missing.is_none());

        let rows = harness
            .store
            .list_webhook_events(webhook.id, Default::default())
            .await
            .unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn test_deactivation_cancels_pending_retry() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .expect(1)
            .mount(&server)
            .await;

        let harness = Harness::new();
        let webhook = harness.webhook(server.uri(), None).await;
        let row = harness
            .dispatcher
            .send_webhook(webhook.id, "user.created", json!({}))
            .await
            .unwrap()
            .unwrap();
        assert!(row.next_retry.is_some());

        let changes = hookwire_postgres::model::UpdateWebhook {
            active: Some(false),
            ..Default::default()
        };
        harness.store.update_webhook(webhook.id, changes).await.unwrap();

        let row = harness.dispatcher.redeliver_at(row.id, later()).await.unwrap();
        assert!(row.next_retry.is_none());
        assert_eq!(row.attempt, 1);
        assert_eq!(row.status_code, Some(503));
        assert_eq!(row.response.as_deref(), Some(CANCELLED_RESPONSE));
    }

    #[tokio::test]
    async fn test_redelivery_uses_current_secret() {
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

        let harness = Harness::new();
        let webhook = harness.webhook(server.uri(), None).await;
        let row = harness
            .dispatcher
            .send_webhook(webhook.id, "user.created", json!({}))
            .await
            .unwrap()
            .unwrap();

        let row = harness.dispatcher.redeliver_at(row.id, later()).await.unwrap();
        assert!(row.is_delivered());

        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].body, requests[1].body);
        for request in &requests {
            let signature = request.headers[SIGNATURE_HEADER].to_str().unwrap();
            assert!(verify(&request.body, signature, "test_secret"));
        }
    }

    #[tokio::test]
    async fn test_redeliver_leaves_settled_rows_alone() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let harness = Harness::new();
        let webhook = harness.webhook(server.uri(), None).await;
        let row = harness
            .dispatcher
            .send_webhook(webhook.id, "user.created", json!({}))
            .await
            .unwrap()
            .unwrap();
        assert!(row.is_delivered());

        let again = harness.dispatcher.redeliver(row.id).await.unwrap();
        assert_eq!(again, row);
        let again = harness.dispatcher.redeliver_at(row.id, later()).await.unwrap();
        assert_eq!(again, row);

        let missing = harness.dispatcher.redeliver(404).await.unwrap_err();
        assert_eq!(missing.kind(), crate::ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_redeliver_waits_until_due() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;

        let harness = Harness::new();
        let webhook = harness
            .webhook(server.uri(), Some(RetryPolicy::new(5, 2.0, 60_000)))
            .await;
        let row = harness
            .dispatcher
            .send_webhook(webhook.id, "user.created", json!({}))
            .await
            .unwrap()
            .unwrap();

        let again = harness.dispatcher.redeliver(row.id).await.unwrap();
        assert_eq!(again, row);
        assert_eq!(again.attempt, 1);
    }

    #[tokio::test]
    async fn test_unrecorded_outcome_stays_due() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let harness = Harness::new();
        let webhook = harness.webhook(server.uri(), None).await;

        let service = ReqwestClient::new(ReqwestConfig::default())
            .unwrap()
            .into_service();
        let log = Arc::new(UnrecordableLog {
            inner: harness.store.clone(),
        });
        let dispatcher = WebhookDispatcher::new(harness.store.clone(), log, service);

        let error = dispatcher
            .send_webhook(webhook.id, "user.created", json!({}))
            .await
            .unwrap_err();
        assert_eq!(error.kind(), crate::ErrorKind::Store);

        let rows = harness
            .store
            .list_webhook_events(webhook.id, Default::default())
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].attempt, 0);
        assert_eq!(rows[0].status_code, None);
        assert!(rows[0].next_retry.is_some());
        assert!(!rows[0].is_due(Timestamp::now()));

        let after_lease = Timestamp::now() + DEFAULT_INLINE_LEASE + SignedDuration::from_secs(1);
        let due = harness
            .store
            .find_due_webhook_events(after_lease, 100)
            .await
            .unwrap();
        assert_eq!(due.len(), 1);

        let row = harness
            .dispatcher
            .redeliver_at(due[0].id, after_lease)
            .await
            .unwrap();
        assert_eq!(row.attempt, 1);
        assert_eq!(row.status_code, Some(500));
    }

    #[tokio::test]
    async fn test_invalid_url_is_recorded() {
        let harness = Harness::new();
        let webhook = harness.webhook("not a url".to_owned(), None).await;

        let row = harness
            .dispatcher
            .send_webhook(webhook.id, "user.created", json!({}))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(row.status_code, None);
        assert!(row.response.unwrap().starts_with("invalid webhook url"));
        assert!(row.next_retry.is_some());
    }

    #[tokio::test]
    async fn test_invalid_data_creates_no_row() {
        let harness = Harness::new();
        let webhook = harness.webhook("https://example.com".to_owned(), None).await;

        let error = harness
            .dispatcher
            .send_webhook(webhook.id, "user.created", json!([1, 2]))
            .await
            .unwrap_err();
        assert_eq!(error.kind(), crate::ErrorKind::Validation);

        let rows = harness
            .store
            .list_webhook_events(webhook.id, Default::default())
            .await
            .unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn test_emit_fans_out_to_subscribers() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(204))
            .expect(2)
            .mount(&server)
            .await;

        let harness = Harness::new();
        let first = harness.webhook(format!("{}/a", server.uri()), None).await;
        let second = harness.webhook(format!("{}/b", server.uri()), None).await;

        let rows = harness
            .dispatcher
            .emit(1, "user.created", json!({"userId": 1}))
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(WebhookEvent::is_delivered));

        let mut ids: Vec<_> = rows.iter().map(|r| r.webhook_id).collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![first.id, second.id]);

        let none = harness
            .dispatcher
            .emit(1, "user.deleted", json!({}))
            .await
            .unwrap();
        assert!(none.is_empty());
        assert!(harness.dispatcher.emit(1, " ", json!({})).await.is_err());
    }

    #[tokio::test]
    async fn test_retry_policy_fallback() {
        let harness = Harness::new();
        let mut webhook = harness.webhook("https://example.com".to_owned(), None).await;
        assert_eq!(retry_policy_of(&webhook), RetryPolicy::default());

        webhook.retry_policy =
            Some(json!({"maxAttempts": 3, "backoffMultiplier": 1.5, "initialDelay": 10}));
        assert_eq!(retry_policy_of(&webhook), RetryPolicy::new(3, 1.5, 10));

        webhook.retry_policy =
            Some(json!({"maxAttempts": 0, "backoffMultiplier": 2, "initialDelay": 10}));
        assert_eq!(retry_policy_of(&webhook), RetryPolicy::default());

        webhook.retry_policy = Some(json!("garbage"));
        assert_eq!(retry_policy_of(&webhook), RetryPolicy::default());
    }
}
