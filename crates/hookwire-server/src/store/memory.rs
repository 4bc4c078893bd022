use std::collections::BTreeMap;

use hookwire_postgres::model::{
    NewWebhook, NewWebhookEvent, UpdateWebhook, UpdateWebhookEvent, Webhook, WebhookEvent,
};
use hookwire_postgres::query::Pagination;
use jiff::Timestamp;
use tokio::sync::RwLock;

use super::{EventLogStore, WebhookStore};
use crate::{Error, Result};

/// In-process store with the same semantics as the PostgreSQL schema:
/// sequential ids, cascade on webhook deletion and a foreign key from
/// events to webhooks.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

#[derive(Debug, Default)]
struct MemoryState {
    webhooks: BTreeMap<i64, Webhook>,
    events: BTreeMap<i64, WebhookEvent>,
    last_webhook_id: i64,
    last_event_id: i64,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

fn paginate<T>(items: impl Iterator<Item = T>, pagination: Pagination) -> Vec<T> {
    items
        .skip(usize::try_from(pagination.offset).unwrap_or(0))
        .take(usize::try_from(pagination.limit).unwrap_or(0))
        .collect()
}

#[async_trait::async_trait]
impl WebhookStore for MemoryStore {
    async fn create_webhook(&self, new_webhook: NewWebhook) -> Result<Webhook> {
        let mut state = self.state.write().await;
        state.last_webhook_id += 1;

        let now = Timestamp::now();
        let webhook = Webhook {
            id: state.last_webhook_id,
            workspace_id: new_webhook.workspace_id,
            url: new_webhook.url,
            events: new_webhook.events,
            secret: new_webhook.secret,
            active: new_webhook.active,
            retry_policy: new_webhook.retry_policy,
            created_at: now.into(),
            updated_at: now.into(),
        };

        state.webhooks.insert(webhook.id, webhook.clone());
        Ok(webhook)
    }

    async fn find_webhook_by_id(&self, webhook_id: i64) -> Result<Option<Webhook>> {
        Ok(self.state.read().await.webhooks.get(&webhook_id).cloned())
    }

    async fn list_workspace_webhooks(
        &self,
        workspace_id: i64,
        pagination: Pagination,
    ) -> Result<Vec<Webhook>> {
        let state = self.state.read().await;
        let items = state
            .webhooks
            .values()
            .rev()
            .filter(|w| w.workspace_id == workspace_id)
            .cloned();
        Ok(paginate(items, pagination))
    }

    async fn find_webhooks_for_event(
        &self,
        workspace_id: i64,
        event: &str,
    ) -> Result<Vec<Webhook>> {
        let state = self.state.read().await;
        Ok(state
            .webhooks
            .values()
            .filter(|w| w.workspace_id == workspace_id && w.active && w.subscribes_to(event))
            .cloned()
            .collect())
    }

    async fn update_webhook(
        &self,
        webhook_id: i64,
        changes: UpdateWebhook,
    ) -> Result<Option<Webhook>> {
        let mut state = self.state.write().await;
        let Some(webhook) = state.webhooks.get_mut(&webhook_id) else {
            return Ok(None);
        };

        if changes.is_empty() {
            return Ok(Some(webhook.clone()));
        }

        if let Some(url) = changes.url {
            webhook.url = url;
        }
        if let Some(events) = changes.events {
            webhook.events = events;
        }
        if let Some(active) = changes.active {
            webhook.active = active;
        }
        if let Some(retry_policy) = changes.retry_policy {
            webhook.retry_policy = retry_policy;
        }
        webhook.updated_at = Timestamp::now().into();

        Ok(Some(webhook.clone()))
    }

    async fn delete_webhook(&self, webhook_id: i64) -> Result<bool> {
        let mut state = self.state.write().await;
        let deleted = state.webhooks.remove(&webhook_id).is_some();
        if deleted {
            state.events.retain(|_, e| e.webhook_id != webhook_id);
        }
        Ok(deleted)
    }
}

#[async_trait::async_trait]
impl EventLogStore for MemoryStore {
    async fn create_webhook_event(&self, new_event: NewWebhookEvent) -> Result<WebhookEvent> {
        let mut state = self.state.write().await;
        if !state.webhooks.contains_key(&new_event.webhook_id) {
            return Err(Error::store(format!(
                "webhook {} does not exist",
                new_event.webhook_id
            )));
        }

        state.last_event_id += 1;
        let event = WebhookEvent {
            id: state.last_event_id,
            webhook_id: new_event.webhook_id,
            event: new_event.event,
            payload: new_event.payload,
            status_code: None,
            response: None,
            attempt: new_event.attempt,
            next_retry: new_event.next_retry,
            created_at: Timestamp::now().into(),
        };

        state.events.insert(event.id, event.clone());
        Ok(event)
    }

    async fn find_webhook_event_by_id(&self, event_id: i64) -> Result<Option<WebhookEvent>> {
        Ok(self.state.read().await.events.get(&event_id).cloned())
    }

    async fn list_webhook_events(
        &self,
        webhook_id: i64,
        pagination: Pagination,
    ) -> Result<Vec<WebhookEvent>> {
        let state = self.state.read().await;
        let items = state
            .events
            .values()
            .rev()
            .filter(|e| e.webhook_id == webhook_id)
            .cloned();
        Ok(paginate(items, pagination))
    }

    async fn update_webhook_event_status(
        &self,
        event_id: i64,
        changes: UpdateWebhookEvent,
    ) -> Result<Option<WebhookEvent>> {
        let mut state = self.state.write().await;
        let Some(event) = state.events.get_mut(&event_id) else {
            return Ok(None);
        };

        event.status_code = changes.status_code;
        event.response = changes.response;
        event.attempt = changes.attempt;
        event.next_retry = changes.next_retry;

        Ok(Some(event.clone()))
    }

    async fn find_due_webhook_events(
        &self,
        now: Timestamp,
        limit: i64,
    ) -> Result<Vec<WebhookEvent>> {
        let state = self.state.read().await;
        let mut due: Vec<_> = state
            .events
            .values()
            .filter(|e| e.is_due(now))
            .cloned()
            .collect();

        due.sort_by_key(|e| (e.next_retry.map(Timestamp::from), e.id));
        due.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(due)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_webhook(workspace_id: i64, events: &[&str], active: bool) -> NewWebhook {
        NewWebhook {
            workspace_id,
            url: "https://example.com/hook".to_owned(),
            events: events.iter().map(|e| Some((*e).to_owned())).collect(),
            secret: "secret".to_owned(),
            active,
            retry_policy: None,
        }
    }

    #[tokio::test]
    async fn test_webhook_crud() {
        let store = MemoryStore::new();
        let created = store
            .create_webhook(new_webhook(1, &["user.created"], true))
            .await
            .unwrap();
        assert_eq!(created.id, 1);

        let changes = UpdateWebhook {
            active: Some(false),
            ..Default::default()
        };
        let updated = store.update_webhook(created.id, changes).await.unwrap().unwrap();
        assert!(!updated.active);
        assert_eq!(updated.secret, created.secret);

        assert!(store.delete_webhook(created.id).await.unwrap());
        assert!(!store.delete_webhook(created.id).await.unwrap());
        assert!(store.find_webhook_by_id(created.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_newest_first_and_scoped() {
        let store = MemoryStore::new();
        for workspace_id in [1, 2, 1] {
            store
                .create_webhook(new_webhook(workspace_id, &["a"], true))
                .await
                .unwrap();
        }

        let listed = store
            .list_workspace_webhooks(1, Pagination::default())
            .await
            .unwrap();
        let ids: Vec<_> = listed.iter().map(|w| w.id).collect();
        assert_eq!(ids, vec![3, 1]);
    }

    #[tokio::test]
    async fn test_find_for_event_skips_inactive() {
        let store = MemoryStore::new();
        store.create_webhook(new_webhook(1, &["a"], true)).await.unwrap();
        store.create_webhook(new_webhook(1, &["a"], false)).await.unwrap();
        store.create_webhook(new_webhook(1, &["b"], true)).await.unwrap();

        let found = store.find_webhooks_for_event(1, "a").await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, 1);
    }

    #[tokio::test]
    async fn test_event_requires_webhook_and_cascades() {
        let store = MemoryStore::new();
        let error = store
            .create_webhook_event(NewWebhookEvent::new(9, "a", "{}"))
            .await
            .unwrap_err();
        assert_eq!(error.kind(), crate::ErrorKind::Store);

        let webhook = store.create_webhook(new_webhook(1, &["a"], true)).await.unwrap();
        let event = store
            .create_webhook_event(NewWebhookEvent::new(webhook.id, "a", "{}"))
            .await
            .unwrap();
        assert_eq!(event.attempt, 0);

        store.delete_webhook(webhook.id).await.unwrap();
        assert!(store.find_webhook_event_by_id(event.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_status_update_is_idempotent() {
        let store = MemoryStore::new();
        let webhook = store.create_webhook(new_webhook(1, &["a"], true)).await.unwrap();
        let event = store
            .create_webhook_event(NewWebhookEvent::new(webhook.id, "a", "{}"))
            .await
            .unwrap();

        let changes = UpdateWebhookEvent {
            status_code: Some(500),
            response: Some("error".to_owned()),
            attempt: 1,
            next_retry: Some(Timestamp::now().into()),
        };

        let first = store
            .update_webhook_event_status(event.id, changes.clone())
            .await
            .unwrap();
        let second = store
            .update_webhook_event_status(event.id, changes)
            .await
            .unwrap();
        assert_eq!(first, second);

        let rows = store
            .list_webhook_events(webhook.id, Pagination::default())
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[tokio::test]
    async fn test_find_due_orders_by_next_retry() {
        let store = MemoryStore::new();
        let webhook = store.create_webhook(new_webhook(1, &["a"], true)).await.unwrap();
        let now = Timestamp::now();

        let offsets = [30, 10, 20];
        for offset in offsets {
            let event = store
                .create_webhook_event(NewWebhookEvent::new(webhook.id, "a", "{}"))
                .await
                .unwrap();
            let changes = UpdateWebhookEvent {
                status_code: Some(500),
                response: None,
                attempt: 1,
                next_retry: Some((now + jiff::SignedDuration::from_secs(offset)).into()),
            };
            store
                .update_webhook_event_status(event.id, changes)
                .await
                .unwrap();
        }

        let later = now + jiff::SignedDuration::from_secs(25);
        let due = store.find_due_webhook_events(later, 10).await.unwrap();
        let ids: Vec<_> = due.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![2, 3]);

        let due = store.find_due_webhook_events(later, 1).await.unwrap();
        assert_eq!(due.len(), 1);
    }
}
