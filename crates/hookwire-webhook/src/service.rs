//! Webhook service wrapper with observability.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use crate::{DeliveryOutcome, TRACING_TARGET, WebhookProvider, WebhookRequest};

/// Webhook service wrapper with observability.
///
/// Adds structured logging around any [`WebhookProvider`]. The provider is
/// held behind an `Arc` so the service is cheap to clone.
#[derive(Clone)]
pub struct WebhookService {
    inner: Arc<dyn WebhookProvider>,
}

impl fmt::Debug for WebhookService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebhookService").finish_non_exhaustive()
    }
}

impl WebhookService {
    /// Creates a new webhook service wrapper.
    pub fn new<P>(provider: P) -> Self
    where
        P: WebhookProvider + 'static,
    {
        Self {
            inner: Arc::new(provider),
        }
    }

    /// Performs one delivery attempt.
    pub async fn deliver(&self, request: &WebhookRequest) -> DeliveryOutcome {
        let started_at = Instant::now();

        tracing::debug!(
            target: TRACING_TARGET,
            event_id = request.event_id,
            url = %request.url,
            "Delivering webhook"
        );

        let outcome = self.inner.deliver(request).await;
        let elapsed = started_at.elapsed();

        match &outcome {
            DeliveryOutcome::Delivered { status_code, .. } => {
                tracing::debug!(
                    target: TRACING_TARGET,
                    event_id = request.event_id,
                    status_code,
                    elapsed_ms = elapsed.as_millis(),
                    "Webhook delivered successfully"
                );
            }
            DeliveryOutcome::Failed { status_code, .. } => {
                tracing::warn!(
                    target: TRACING_TARGET,
                    event_id = request.event_id,
                    status_code,
                    transient = outcome.is_transient(),
                    elapsed_ms = elapsed.as_millis(),
                    "Webhook endpoint rejected delivery"
                );
            }
            DeliveryOutcome::TransportError { kind, message } => {
                tracing::warn!(
                    target: TRACING_TARGET,
                    event_id = request.event_id,
                    kind = %kind,
                    error = %message,
                    elapsed_ms = elapsed.as_millis(),
                    "Webhook delivery error"
                );
            }
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use url::Url;

    use super::*;
    use crate::SignedPayload;

    struct Counting(AtomicUsize);

    #[async_trait::async_trait]
    impl WebhookProvider for Counting {
        async fn deliver(&self, _request: &WebhookRequest) -> DeliveryOutcome {
            self.0.fetch_add(1, Ordering::SeqCst);
            DeliveryOutcome::from_response(202, "accepted")
        }
    }

    #[tokio::test]
    async fn test_service_delegates_to_provider() {
        let service = WebhookService::new(Counting(AtomicUsize::new(0)));
        let request = WebhookRequest::new(
            Url::parse("https://example.com/hook").unwrap(),
            1,
            SignedPayload::new("{}", "secret"),
        );

        let outcome = service.clone().deliver(&request).await;
        assert!(outcome.is_success());
        assert_eq!(outcome.response_text(), "accepted");
    }
}
