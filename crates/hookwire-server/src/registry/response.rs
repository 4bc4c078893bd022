//! Registry response types.

use hookwire_postgres::model::{Webhook, WebhookEvent};
use hookwire_webhook::RetryPolicy;
use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display};

use crate::dispatcher::retry_policy_of;

/// Webhook as returned after creation: the only time the secret is shown.
#[must_use]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedWebhook {
    /// The registered webhook.
    #[serde(flatten)]
    pub webhook: WebhookView,
    /// Signing secret receivers use to verify signatures.
    pub secret: String,
}

impl CreatedWebhook {
    /// Creates the response from a freshly inserted model.
    pub fn from_model(webhook: Webhook) -> Self {
        let secret = webhook.secret.clone();
        Self {
            webhook: WebhookView::from_model(webhook),
            secret,
        }
    }
}

/// Webhook with its secret redacted.
#[must_use]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookView {
    /// Unique webhook identifier.
    pub id: i64,
    /// Workspace that owns this webhook.
    pub workspace_id: i64,
    /// Endpoint URL.
    pub url: String,
    /// Subscribed event names.
    pub events: Vec<String>,
    /// Whether events are sent.
    pub active: bool,
    /// Effective retry policy.
    pub retry_policy: RetryPolicy,
    /// Timestamp when this webhook was created.
    pub created_at: Timestamp,
    /// Timestamp when this webhook was last modified.
    pub updated_at: Timestamp,
}

impl WebhookView {
    /// Creates a view from a database model, dropping the secret.
    pub fn from_model(webhook: Webhook) -> Self {
        Self {
            retry_policy: retry_policy_of(&webhook),
            events: webhook.subscribed_events(),
            id: webhook.id,
            workspace_id: webhook.workspace_id,
            url: webhook.url,
            active: webhook.active,
            created_at: webhook.created_at.into(),
            updated_at: webhook.updated_at.into(),
        }
    }

    /// Creates views from database models.
    pub fn from_models(models: Vec<Webhook>) -> Vec<Self> {
        models.into_iter().map(Self::from_model).collect()
    }
}

/// Delivery status of an event log row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[derive(AsRefStr, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EventStatus {
    /// No attempt has been recorded yet and the first is still expected.
    Pending,
    /// The latest attempt got a 2xx response.
    Delivered,
    /// The latest attempt failed and another one is scheduled.
    RetryScheduled,
    /// No delivery and no more attempts will be made.
    Failed,
}

impl EventStatus {
    /// Derives the status from a row.
    pub fn of(event: &WebhookEvent) -> Self {
        if event.is_delivered() {
            Self::Delivered
        } else if !event.is_pending_retry() {
            Self::Failed
        } else if event.attempt == 0 {
            Self::Pending
        } else {
            Self::RetryScheduled
        }
    }
}

/// One event log row.
#[must_use]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookEventView {
    /// Event log identifier, sent as `X-Webhook-ID`.
    pub id: i64,
    /// Webhook the event was sent to.
    pub webhook_id: i64,
    /// Event name.
    pub event: String,
    /// Exact request body.
    pub payload: String,
    /// Status code of the latest attempt.
    pub status_code: Option<i32>,
    /// Response body or transport error of the latest attempt.
    pub response: Option<String>,
    /// Attempts made so far.
    pub attempt: i32,
    /// When the next attempt is due.
    pub next_retry: Option<Timestamp>,
    /// Derived delivery status.
    pub status: EventStatus,
    /// Timestamp when the event was created.
    pub created_at: Timestamp,
}

impl WebhookEventView {
    /// Creates a view from a database model.
    pub fn from_model(event: WebhookEvent) -> Self {
        Self {
            status: EventStatus::of(&event),
            id: event.id,
            webhook_id: event.webhook_id,
            event: event.event,
            payload: event.payload,
            status_code: event.status_code,
            response: event.response,
            attempt: event.attempt,
            next_retry: event.next_retry.map(Into::into),
            created_at: event.created_at.into(),
        }
    }

    /// Creates views from database models.
    pub fn from_models(models: Vec<WebhookEvent>) -> Vec<Self> {
        models.into_iter().map(Self::from_model).collect()
    }
}
