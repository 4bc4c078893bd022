//! Webhook registration model.

use diesel::prelude::*;
use jiff_diesel::Timestamp;

use crate::schema::webhooks;

/// A registered webhook endpoint.
#[derive(Debug, Clone, PartialEq, Queryable, Selectable)]
#[diesel(table_name = webhooks)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Webhook {
    /// Unique webhook identifier.
    pub id: i64,
    /// Workspace that owns this webhook.
    pub workspace_id: i64,
    /// Endpoint URL.
    pub url: String,
    /// Event names this webhook subscribes to.
    pub events: Vec<Option<String>>,
    /// HMAC-SHA256 signing secret.
    pub secret: String,
    /// Whether new events are sent to this webhook.
    pub active: bool,
    /// Retry policy as JSON, `None` for the default policy.
    pub retry_policy: Option<serde_json::Value>,
    /// Timestamp when this webhook was created.
    pub created_at: Timestamp,
    /// Timestamp when this webhook was last modified.
    pub updated_at: Timestamp,
}

/// Data for registering a new webhook.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = webhooks)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct NewWebhook {
    /// Workspace that will own the webhook.
    pub workspace_id: i64,
    /// Endpoint URL.
    pub url: String,
    /// Subscribed event names.
    pub events: Vec<Option<String>>,
    /// Signing secret.
    pub secret: String,
    /// Initial activity flag.
    pub active: bool,
    /// Retry policy as JSON.
    pub retry_policy: Option<serde_json::Value>,
}

/// Changes to an existing webhook.
///
/// The owning workspace and the secret are immutable.
#[derive(Debug, Clone, Default, PartialEq, AsChangeset)]
#[diesel(table_name = webhooks)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct UpdateWebhook {
    /// Updated endpoint URL.
    pub url: Option<String>,
    /// Updated event subscriptions.
    pub events: Option<Vec<Option<String>>>,
    /// Updated activity flag.
    pub active: Option<bool>,
    /// Updated retry policy; `Some(None)` resets it to the default.
    pub retry_policy: Option<Option<serde_json::Value>>,
}

impl Webhook {
    /// Returns the subscribed event names.
    pub fn subscribed_events(&self) -> Vec<String> {
        self.events.iter().flatten().cloned().collect()
    }

    /// Returns whether the webhook subscribes to `event`.
    pub fn subscribes_to(&self, event: &str) -> bool {
        self.events.iter().flatten().any(|e| e == event)
    }
}

impl UpdateWebhook {
    /// Returns whether no field would change.
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}
