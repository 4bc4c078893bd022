//! Webhook registration repository.

use std::future::Future;

use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use jiff::Timestamp;

use super::Pagination;
use crate::model::{NewWebhook, UpdateWebhook, Webhook};
use crate::{PgConnection, PgError, PgResult, TRACING_TARGET_QUERY, schema};

/// Repository for webhook registrations.
pub trait WebhookRepository {
    /// Inserts a new webhook.
    fn create_webhook(
        &mut self,
        new_webhook: NewWebhook,
    ) -> impl Future<Output = PgResult<Webhook>> + Send;

    /// Finds a webhook by ID.
    fn find_webhook_by_id(
        &mut self,
        webhook_id: i64,
    ) -> impl Future<Output = PgResult<Option<Webhook>>> + Send;

    /// Lists the webhooks of a workspace, newest first.
    fn list_workspace_webhooks(
        &mut self,
        workspace_id: i64,
        pagination: Pagination,
    ) -> impl Future<Output = PgResult<Vec<Webhook>>> + Send;

    /// Finds the active webhooks of a workspace subscribed to `event`.
    fn find_webhooks_for_event(
        &mut self,
        workspace_id: i64,
        event: &str,
    ) -> impl Future<Output = PgResult<Vec<Webhook>>> + Send;

    /// Applies changes to a webhook, returning `None` if it does not exist.
    fn update_webhook(
        &mut self,
        webhook_id: i64,
        changes: UpdateWebhook,
    ) -> impl Future<Output = PgResult<Option<Webhook>>> + Send;

    /// Deletes a webhook and, by cascade, its event log.
    ///
    /// Returns whether a row was deleted.
    fn delete_webhook(&mut self, webhook_id: i64) -> impl Future<Output = PgResult<bool>> + Send;
}

impl WebhookRepository for PgConnection {
    async fn create_webhook(&mut self, new_webhook: NewWebhook) -> PgResult<Webhook> {
        use schema::webhooks;

        let webhook = diesel::insert_into(webhooks::table)
            .values(&new_webhook)
            .returning(Webhook::as_returning())
            .get_result(self)
            .await
            .map_err(PgError::from)?;

        tracing::debug!(
            target: TRACING_TARGET_QUERY,
            webhook_id = webhook.id,
            workspace_id = webhook.workspace_id,
            "Webhook created"
        );

        Ok(webhook)
    }

    async fn find_webhook_by_id(&mut self, webhook_id: i64) -> PgResult<Option<Webhook>> {
        use schema::webhooks::dsl::*;

        let webhook = webhooks
            .filter(id.eq(webhook_id))
            .select(Webhook::as_select())
            .first(self)
            .await
            .optional()
            .map_err(PgError::from)?;

        Ok(webhook)
    }

    async fn list_workspace_webhooks(
        &mut self,
        ws_id: i64,
        pagination: Pagination,
    ) -> PgResult<Vec<Webhook>> {
        use schema::webhooks::dsl::*;

        let items = webhooks
            .filter(workspace_id.eq(ws_id))
            .select(Webhook::as_select())
            .order((created_at.desc(), id.desc()))
            .limit(pagination.limit)
            .offset(pagination.offset)
            .load(self)
            .await
            .map_err(PgError::from)?;

        Ok(items)
    }

    async fn find_webhooks_for_event(
        &mut self,
        ws_id: i64,
        event_name: &str,
    ) -> PgResult<Vec<Webhook>> {
        use schema::webhooks::dsl::*;

        let items = webhooks
            .filter(workspace_id.eq(ws_id))
            .filter(active.eq(true))
            .filter(events.contains(vec![Some(event_name.to_owned())]))
            .select(Webhook::as_select())
            .order(id.asc())
            .load(self)
            .await
            .map_err(PgError::from)?;

        Ok(items)
    }

    async fn update_webhook(
        &mut self,
        webhook_id: i64,
        changes: UpdateWebhook,
    ) -> PgResult<Option<Webhook>> {
        use schema::webhooks::dsl::*;

        if changes.is_empty() {
            return self.find_webhook_by_id(webhook_id).await;
        }

        let now: jiff_diesel::Timestamp = Timestamp::now().into();
        let webhook = diesel::update(webhooks.filter(id.eq(webhook_id)))
            .set((&changes, updated_at.eq(now)))
            .returning(Webhook::as_returning())
            .get_result(self)
            .await
            .optional()
            .map_err(PgError::from)?;

        Ok(webhook)
    }

    async fn delete_webhook(&mut self, webhook_id: i64) -> PgResult<bool> {
        use schema::webhooks::dsl::*;

        let deleted = diesel::delete(webhooks.filter(id.eq(webhook_id)))
            .execute(self)
            .await
            .map_err(PgError::from)?;

        tracing::debug!(target: TRACING_TARGET_QUERY, webhook_id, deleted, "Webhook deleted");
        Ok(deleted > 0)
    }
}
