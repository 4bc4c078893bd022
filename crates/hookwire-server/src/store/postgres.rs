use hookwire_postgres::model::{
    NewWebhook, NewWebhookEvent, UpdateWebhook, UpdateWebhookEvent, Webhook, WebhookEvent,
};
use hookwire_postgres::query::{Pagination, WebhookEventRepository, WebhookRepository};
use hookwire_postgres::{PgClient, PgConn};
use jiff::Timestamp;

use super::{EventLogStore, WebhookStore};
use crate::Result;

/// PostgreSQL-backed store; each call checks out one pooled connection.
#[derive(Debug, Clone)]
pub struct PgStore {
    client: PgClient,
}

impl PgStore {
    /// Creates a store on top of an existing client.
    pub fn new(client: PgClient) -> Self {
        Self { client }
    }

    async fn conn(&self) -> Result<PgConn> {
        Ok(self.client.get_connection().await?)
    }
}

#[async_trait::async_trait]
impl WebhookStore for PgStore {
    async fn create_webhook(&self, new_webhook: NewWebhook) -> Result<Webhook> {
        Ok(self.conn().await?.create_webhook(new_webhook).await?)
    }

    async fn find_webhook_by_id(&self, webhook_id: i64) -> Result<Option<Webhook>> {
        Ok(self.conn().await?.find_webhook_by_id(webhook_id).await?)
    }

    async fn list_workspace_webhooks(
        &self,
        workspace_id: i64,
        pagination: Pagination,
    ) -> Result<Vec<Webhook>> {
        let mut conn = self.conn().await?;
        Ok(conn.list_workspace_webhooks(workspace_id, pagination).await?)
    }

    async fn find_webhooks_for_event(
        &self,
        workspace_id: i64,
        event: &str,
    ) -> Result<Vec<Webhook>> {
        let mut conn = self.conn().await?;
        Ok(conn.find_webhooks_for_event(workspace_id, event).await?)
    }

    async fn update_webhook(
        &self,
        webhook_id: i64,
        changes: UpdateWebhook,
    ) -> Result<Option<Webhook>> {
        Ok(self.conn().await?.update_webhook(webhook_id, changes).await?)
    }

    async fn delete_webhook(&self, webhook_id: i64) -> Result<bool> {
        Ok(self.conn().await?.delete_webhook(webhook_id).await?)
    }
}

#[async_trait::async_trait]
impl EventLogStore for PgStore {
    async fn create_webhook_event(&self, new_event: NewWebhookEvent) -> Result<WebhookEvent> {
        Ok(self.conn().await?.create_webhook_event(new_event).await?)
    }

    async fn find_webhook_event_by_id(&self, event_id: i64) -> Result<Option<WebhookEvent>> {
        Ok(self.conn().await?.find_webhook_event_by_id(event_id).await?)
    }

    async fn list_webhook_events(
        &self,
        webhook_id: i64,
        pagination: Pagination,
    ) -> Result<Vec<WebhookEvent>> {
        let mut conn = self.conn().await?;
        Ok(conn.list_webhook_events(webhook_id, pagination).await?)
    }

    async fn update_webhook_event_status(
        &self,
        event_id: i64,
        changes: UpdateWebhookEvent,
    ) -> Result<Option<WebhookEvent>> {
        let mut conn = self.conn().await?;
        Ok(conn.update_webhook_event_status(event_id, changes).await?)
    }

    async fn find_due_webhook_events(
        &self,
        now: Timestamp,
        limit: i64,
    ) -> Result<Vec<WebhookEvent>> {
        let mut conn = self.conn().await?;
        Ok(conn.find_due_webhook_events(now, limit).await?)
    }
}
