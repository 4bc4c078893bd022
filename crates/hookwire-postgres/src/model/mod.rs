//! Database models for all tables.

mod webhook;
mod webhook_event;

pub use webhook::{NewWebhook, UpdateWebhook, Webhook};
pub use webhook_event::{NewWebhookEvent, UpdateWebhookEvent, WebhookEvent};
