//! Webhook registry: validated CRUD over the webhook store, the event log
//! listing and test deliveries.

mod request;
mod response;

use std::sync::Arc;

use hookwire_postgres::query::Pagination;
use hookwire_webhook::generate_secret;
use jiff::Timestamp;
pub use request::{CreateWebhook, UpdateWebhook};
pub use response::{CreatedWebhook, EventStatus, WebhookEventView, WebhookView};
use serde_json::json;

use crate::store::{EventLogStore, WebhookStore};
use crate::{Error, Result, TRACING_TARGET_REGISTRY, WebhookDispatcher};

/// Event name used by [`WebhookRegistry::test`].
pub const TEST_EVENT: &str = "webhook.test";

/// Registry of webhook endpoints.
#[derive(Debug, Clone)]
pub struct WebhookRegistry {
    dispatcher: WebhookDispatcher,
}

impl WebhookRegistry {
    /// Creates a registry sharing the dispatcher's stores.
    pub fn new(dispatcher: WebhookDispatcher) -> Self {
        Self { dispatcher }
    }

    fn webhooks(&self) -> &Arc<dyn WebhookStore> {
        self.dispatcher.webhook_store()
    }

    fn event_log(&self) -> &Arc<dyn EventLogStore> {
        self.dispatcher.event_store()
    }

    /// Registers a webhook and returns it together with its secret.
    #[tracing::instrument(skip(self, request), fields(url = %request.url))]
    pub async fn create(
        &self,
        workspace_id: i64,
        request: CreateWebhook,
    ) -> Result<CreatedWebhook> {
        request.check()?;

        let new_webhook = request.into_model(workspace_id, generate_secret())?;
        let webhook = self.webhooks().create_webhook(new_webhook).await?;

        tracing::info!(
            target: TRACING_TARGET_REGISTRY,
            webhook_id = webhook.id,
            workspace_id,
            "Webhook created"
        );

        Ok(CreatedWebhook::from_model(webhook))
    }

    /// Returns a webhook with its secret redacted.
    pub async fn get(&self, webhook_id: i64) -> Result<WebhookView> {
        self.webhooks()
            .find_webhook_by_id(webhook_id)
            .await?
            .map(WebhookView::from_model)
            .ok_or_else(|| Error::not_found("webhook", webhook_id))
    }

    /// Lists the webhooks of a workspace, newest first.
    pub async fn list(
        &self,
        workspace_id: i64,
        pagination: Pagination,
    ) -> Result<Vec<WebhookView>> {
        let webhooks = self
            .webhooks()
            .list_workspace_webhooks(workspace_id, pagination)
            .await?;
        Ok(WebhookView::from_models(webhooks))
    }

    /// Applies changes to a webhook. The workspace and secret never change.
    #[tracing::instrument(skip(self, request))]
    pub async fn update(&self, webhook_id: i64, request: UpdateWebhook) -> Result<WebhookView> {
        request.check()?;

        let changes = request.into_model()?;
        let webhook = self
            .webhooks()
            .update_webhook(webhook_id, changes)
            .await?
            .ok_or_else(|| Error::not_found("webhook", webhook_id))?;

        tracing::info!(
            target: TRACING_TARGET_REGISTRY,
            webhook_id,
            active = webhook.active,
            "Webhook updated"
        );

        Ok(WebhookView::from_model(webhook))
    }

    /// Deletes a webhook together with its event log.
    #[tracing::instrument(skip(self))]
    pub async fn delete(&self, webhook_id: i64) -> Result<()> {
        if !self.webhooks().delete_webhook(webhook_id).await? {
            return Err(Error::not_found("webhook", webhook_id));
        }

        tracing::info!(
            target: TRACING_TARGET_REGISTRY,
            webhook_id,
            "Webhook deleted"
        );

        Ok(())
    }

    /// Lists the event log of a webhook, newest first.
    pub async fn events(
        &self,
        webhook_id: i64,
        pagination: Option<Pagination>,
    ) -> Result<Vec<WebhookEventView>> {
        if self.webhooks().find_webhook_by_id(webhook_id).await?.is_none() {
            return Err(Error::not_found("webhook", webhook_id));
        }

        let events = self
            .event_log()
            .list_webhook_events(webhook_id, pagination.unwrap_or_default())
            .await?;
        Ok(WebhookEventView::from_models(events))
    }

    /// Returns one event log row.
    pub async fn event(&self, event_id: i64) -> Result<WebhookEventView> {
        self.event_log()
            .find_webhook_event_by_id(event_id)
            .await?
            .map(WebhookEventView::from_model)
            .ok_or_else(|| Error::not_found("webhook event", event_id))
    }

    /// Sends a test event to a webhook.
    ///
    /// Returns whether the event was queued; inactive webhooks are skipped.
    /// The outcome is visible in the event log.
    #[tracing::instrument(skip(self))]
    pub async fn test(&self, webhook_id: i64) -> Result<bool> {
        let _webhook = self.get(webhook_id).await?;

        let data = json!({
            "message": "This is a test webhook",
            "timestamp": Timestamp::now().to_string(),
        });

        let queued = self
            .dispatcher
            .send_webhook(webhook_id, TEST_EVENT, data)
            .await?
            .is_some();

        tracing::debug!(
            target: TRACING_TARGET_REGISTRY,
            webhook_id,
            queued,
            "Test event sent"
        );

        Ok(queued)
    }
}
