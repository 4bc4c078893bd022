//! Webhook event log repository.

use std::future::Future;

use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use jiff::Timestamp;

use super::Pagination;
use crate::model::{NewWebhookEvent, UpdateWebhookEvent, WebhookEvent};
use crate::{PgConnection, PgError, PgResult, schema};

/// Repository for the webhook event log.
pub trait WebhookEventRepository {
    /// Inserts a new event log row.
    fn create_webhook_event(
        &mut self,
        new_event: NewWebhookEvent,
    ) -> impl Future<Output = PgResult<WebhookEvent>> + Send;

    /// Finds an event log row by ID.
    fn find_webhook_event_by_id(
        &mut self,
        event_id: i64,
    ) -> impl Future<Output = PgResult<Option<WebhookEvent>>> + Send;

    /// Lists the events of a webhook, newest first.
    fn list_webhook_events(
        &mut self,
        webhook_id: i64,
        pagination: Pagination,
    ) -> impl Future<Output = PgResult<Vec<WebhookEvent>>> + Send;

    /// Records the result of an attempt.
    fn update_webhook_event_status(
        &mut self,
        event_id: i64,
        changes: UpdateWebhookEvent,
    ) -> impl Future<Output = PgResult<Option<WebhookEvent>>> + Send;

    /// Finds rows whose retry is due at `now`, oldest due first.
    fn find_due_webhook_events(
        &mut self,
        now: Timestamp,
        limit: i64,
    ) -> impl Future<Output = PgResult<Vec<WebhookEvent>>> + Send;
}

impl WebhookEventRepository for PgConnection {
    async fn create_webhook_event(&mut self, new_event: NewWebhookEvent) -> PgResult<WebhookEvent> {
        use schema::webhook_events;

        let event = diesel::insert_into(webhook_events::table)
            .values(&new_event)
            .returning(WebhookEvent::as_returning())
            .get_result(self)
            .await
            .map_err(PgError::from)?;

        Ok(event)
    }

    async fn find_webhook_event_by_id(&mut self, event_id: i64) -> PgResult<Option<WebhookEvent>> {
        use schema::webhook_events::dsl::*;

        let row = webhook_events
            .filter(id.eq(event_id))
            .select(WebhookEvent::as_select())
            .first(self)
            .await
            .optional()
            .map_err(PgError::from)?;

        Ok(row)
    }

    async fn list_webhook_events(
        &mut self,
        hook_id: i64,
        pagination: Pagination,
    ) -> PgResult<Vec<WebhookEvent>> {
        use schema::webhook_events::dsl::*;

        let events = webhook_events
            .filter(webhook_id.eq(hook_id))
            .select(WebhookEvent::as_select())
            .order((created_at.desc(), id.desc()))
            .limit(pagination.limit)
            .offset(pagination.offset)
            .load(self)
            .await
            .map_err(PgError::from)?;

        Ok(events)
    }

    async fn update_webhook_event_status(
        &mut self,
        event_id: i64,
        changes: UpdateWebhookEvent,
    ) -> PgResult<Option<WebhookEvent>> {
        use schema::webhook_events::dsl::*;

        let row = diesel::update(webhook_events.filter(id.eq(event_id)))
            .set(&changes)
            .returning(WebhookEvent::as_returning())
            .get_result(self)
            .await
            .optional()
            .map_err(PgError::from)?;

        Ok(row)
    }

    async fn find_due_webhook_events(
        &mut self,
        now: Timestamp,
        limit: i64,
    ) -> PgResult<Vec<WebhookEvent>> {
        use schema::webhook_events::dsl::*;

        let now: jiff_diesel::Timestamp = now.into();
        let events = webhook_events
            .filter(next_retry.le(Some(now)))
            .select(WebhookEvent::as_select())
            .order((next_retry.asc(), id.asc()))
            .limit(limit)
            .load(self)
            .await
            .map_err(PgError::from)?;

        Ok(events)
    }
}
