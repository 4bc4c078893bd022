//! Webhook delivery request.

use std::time::Duration;

use url::Url;

use crate::signature::SignedPayload;

/// Header carrying the hex HMAC-SHA256 signature of the body.
pub const SIGNATURE_HEADER: &str = "X-Webhook-Signature";

/// Header carrying the event log row id.
pub const EVENT_ID_HEADER: &str = "X-Webhook-ID";

/// A single delivery attempt of a signed payload.
#[derive(Debug, Clone)]
pub struct WebhookRequest {
    /// The webhook endpoint URL.
    pub url: Url,
    /// Id of the event log row this attempt belongs to.
    pub event_id: i64,
    /// Serialized body and its signature.
    pub payload: SignedPayload,
    /// Optional request timeout (uses client default if not set).
    pub timeout: Option<Duration>,
}

impl WebhookRequest {
    /// Creates a new webhook request.
    pub fn new(url: Url, event_id: i64, payload: SignedPayload) -> Self {
        Self {
            url,
            event_id,
            payload,
            timeout: None,
        }
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Returns the headers sent with this request, in order.
    pub fn headers(&self) -> [(&'static str, String); 3] {
        [
            ("Content-Type", "application/json".to_owned()),
            (SIGNATURE_HEADER, self.payload.signature.clone()),
            (EVENT_ID_HEADER, self.event_id.to_string()),
        ]
    }

    /// Returns the host this request is addressed to, if any.
    pub fn destination(&self) -> Option<&str> {
        self.url.host_str()
    }
}
