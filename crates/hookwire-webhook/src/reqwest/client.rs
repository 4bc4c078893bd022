//! Reqwest-based HTTP client for webhook delivery.

use std::sync::Arc;

use reqwest::Client;

use super::error::transport_kind;
use super::{Error, ReqwestConfig, Result, TRACING_TARGET};
use crate::{DeliveryOutcome, WebhookProvider, WebhookRequest, WebhookService};

/// Inner client that holds the HTTP client and configuration.
struct ReqwestClientInner {
    http: Client,
    config: ReqwestConfig,
}

/// Reqwest-based HTTP client for delivering signed payloads.
///
/// Each call to [`WebhookProvider::deliver`] performs a single POST with the
/// pre-serialized body. The response body is read up to
/// [`ReqwestConfig::max_response_bytes`] and kept as text.
#[derive(Clone)]
pub struct ReqwestClient {
    inner: Arc<ReqwestClientInner>,
}

impl std::fmt::Debug for ReqwestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReqwestClient")
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

impl ReqwestClient {
    /// Creates a new reqwest client with the given configuration.
    pub fn new(config: ReqwestConfig) -> Result<Self> {
        let timeout = config.effective_timeout();
        let user_agent = config.effective_user_agent();

        tracing::debug!(
            target: TRACING_TARGET,
            timeout_ms = timeout.as_millis(),
            max_response_bytes = config.max_response_bytes,
            "Creating reqwest client"
        );

        let http = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(Error::Build)?;

        let inner = ReqwestClientInner { http, config };
        Ok(Self {
            inner: Arc::new(inner),
        })
    }

    /// Gets the client configuration.
    pub fn config(&self) -> &ReqwestConfig {
        &self.inner.config
    }

    /// Converts this client into a [`WebhookService`].
    pub fn into_service(self) -> WebhookService {
        WebhookService::new(self)
    }

    async fn read_body(&self, request: &WebhookRequest, mut response: reqwest::Response) -> String {
        let limit = self.inner.config.max_response_bytes;
        let mut buffer = Vec::new();

        while buffer.len() < limit {
            match response.chunk().await {
                Ok(Some(chunk)) => buffer.extend_from_slice(&chunk),
                Ok(None) => break,
                Err(err) => {
                    tracing::warn!(
                        target: TRACING_TARGET,
                        event_id = request.event_id,
                        error = %err,
                        "Failed to read webhook response body"
                    );
                    break;
                }
            }
        }

        truncate_utf8(String::from_utf8_lossy(&buffer).into_owned(), limit)
    }
}

/// Truncates `text` to at most `max` bytes on a character boundary.
fn truncate_utf8(mut text: String, max: usize) -> String {
    if text.len() > max {
        let mut end = max;
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        text.truncate(end);
    }
    text
}

#[async_trait::async_trait]
impl WebhookProvider for ReqwestClient {
    async fn deliver(&self, request: &WebhookRequest) -> DeliveryOutcome {
        let mut http_request = self.inner.http.post(request.url.as_str());
        for (name, value) in request.headers() {
            http_request = http_request.header(name, value);
        }
        if let Some(timeout) = request.timeout {
            http_request = http_request.timeout(timeout);
        }

        let response = match http_request.body(request.payload.body.clone()).send().await {
            Ok(response) => response,
            Err(err) => {
                let kind = transport_kind(&err);
                tracing::debug!(
                    target: TRACING_TARGET,
                    event_id = request.event_id,
                    kind = %kind,
                    error = %err,
                    "Webhook request failed"
                );
                return DeliveryOutcome::transport(kind, err.to_string());
            }
        };

        let status_code = response.status().as_u16();
        let body = self.read_body(request, response).await;

        tracing::debug!(
            target: TRACING_TARGET,
            event_id = request.event_id,
            status_code,
            body_len = body.len(),
            "Webhook response received"
        );

        DeliveryOutcome::from_response(status_code, body)
    }
}
