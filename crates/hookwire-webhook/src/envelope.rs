//! Canonical event envelope sent to webhook receivers.

use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::signature::SignedPayload;
use crate::{Error, Result};

/// The JSON body delivered to webhook endpoints.
///
/// Field order is part of the wire contract: `event`, `data`, `timestamp`, `id`.
/// Receivers verify the signature over the serialized bytes, so the body must
/// only ever be produced once (see [`WebhookEnvelope::to_body`]) and then
/// carried around as a string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookEnvelope {
    /// Name of the event, e.g. `user.created`.
    pub event: String,
    /// Event-specific data object.
    pub data: serde_json::Value,
    /// Creation time in milliseconds since the Unix epoch.
    pub timestamp: i64,
    /// Random unique identifier of this envelope.
    pub id: Uuid,
}

impl WebhookEnvelope {
    /// Creates an envelope for `event`, stamped with the current time and a
    /// fresh random id.
    ///
    /// `data` must serialize to a JSON object; `null` is accepted and becomes
    /// an empty object.
    pub fn new(event: impl Into<String>, data: impl Serialize) -> Result<Self> {
        let event = event.into();
        if event.trim().is_empty() {
            return Err(Error::invalid_input().with_message("Event name cannot be empty"));
        }

        let data = match serde_json::to_value(data)? {
            serde_json::Value::Null => serde_json::Value::Object(serde_json::Map::new()),
            value @ serde_json::Value::Object(_) => value,
            _ => {
                return Err(Error::invalid_input()
                    .with_message("Event data must be a JSON object")
                    .with_context(event));
            }
        };

        Ok(Self {
            event,
            data,
            timestamp: Timestamp::now().as_millisecond(),
            id: Uuid::new_v4(),
        })
    }

    /// Serializes the envelope into the exact request body.
    pub fn to_body(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Serializes and signs the envelope with the webhook secret.
    pub fn sign(&self, secret: &str) -> Result<SignedPayload> {
        let body = self.to_body()?;
        Ok(SignedPayload::new(body, secret))
    }
}
