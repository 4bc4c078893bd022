//! Storage seams for webhook registrations and the event log.
//!
//! The dispatcher and registry only talk to the [`WebhookStore`] and
//! [`EventLogStore`] traits. [`PgStore`] backs them with PostgreSQL and
//! [`MemoryStore`] keeps everything in process.

mod memory;
mod postgres;

use hookwire_postgres::model::{
    NewWebhook, NewWebhookEvent, UpdateWebhook, UpdateWebhookEvent, Webhook, WebhookEvent,
};
use hookwire_postgres::query::Pagination;
use jiff::Timestamp;
pub use memory::MemoryStore;
pub use postgres::PgStore;

use crate::Result;

/// Persistence for webhook registrations.
#[async_trait::async_trait]
pub trait WebhookStore: Send + Sync {
    /// Inserts a new webhook.
    async fn create_webhook(&self, new_webhook: NewWebhook) -> Result<Webhook>;

    /// Finds a webhook by ID.
    async fn find_webhook_by_id(&self, webhook_id: i64) -> Result<Option<Webhook>>;

    /// Lists the webhooks of a workspace, newest first.
    async fn list_workspace_webhooks(
        &self,
        workspace_id: i64,
        pagination: Pagination,
    ) -> Result<Vec<Webhook>>;

    /// Finds the active webhooks of a workspace subscribed to `event`.
    async fn find_webhooks_for_event(&self, workspace_id: i64, event: &str)
    -> Result<Vec<Webhook>>;

    /// Applies changes to a webhook, returning `None` if it does not exist.
    async fn update_webhook(
        &self,
        webhook_id: i64,
        changes: UpdateWebhook,
    ) -> Result<Option<Webhook>>;

    /// Deletes a webhook together with its event log.
    async fn delete_webhook(&self, webhook_id: i64) -> Result<bool>;
}

/// Persistence for the per-event delivery log.
#[async_trait::async_trait]
pub trait EventLogStore: Send + Sync {
    /// Inserts a new row with no attempts made.
    async fn create_webhook_event(&self, new_event: NewWebhookEvent) -> Result<WebhookEvent>;

    /// Finds a row by ID.
    async fn find_webhook_event_by_id(&self, event_id: i64) -> Result<Option<WebhookEvent>>;

    /// Lists the rows of a webhook, newest first.
    async fn list_webhook_events(
        &self,
        webhook_id: i64,
        pagination: Pagination,
    ) -> Result<Vec<WebhookEvent>>;

    /// Records the result of an attempt. Last write wins.
    async fn update_webhook_event_status(
        &self,
        event_id: i64,
        changes: UpdateWebhookEvent,
    ) -> Result<Option<WebhookEvent>>;

    /// Finds rows whose retry is due at `now`, oldest due first.
    async fn find_due_webhook_events(
        &self,
        now: Timestamp,
        limit: i64,
    ) -> Result<Vec<WebhookEvent>>;
}
