#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

mod error;
mod service;

pub mod envelope;
pub mod outcome;
pub mod request;
pub mod retry;
pub mod signature;

#[cfg(feature = "reqwest")]
#[cfg_attr(docsrs, doc(cfg(feature = "reqwest")))]
pub mod reqwest;

pub use envelope::WebhookEnvelope;
pub use error::{BoxedError, Error, ErrorKind, Result};
pub use outcome::{DeliveryOutcome, TransportErrorKind};
pub use request::{EVENT_ID_HEADER, SIGNATURE_HEADER, WebhookRequest};
pub use retry::{DeliveryState, DeliveryUpdate, RetryPolicy};
pub use service::WebhookService;
pub use signature::{SignedPayload, generate_secret, sign, verify};

/// Tracing target for webhook operations.
pub const TRACING_TARGET: &str = "hookwire_webhook";

/// Core trait for webhook delivery operations.
///
/// A provider performs exactly one HTTP attempt per call and never retries.
/// Every failure, including a transport failure, is reported as a
/// [`DeliveryOutcome`] rather than an error so the caller can always record it.
#[async_trait::async_trait]
pub trait WebhookProvider: Send + Sync {
    /// Delivers a signed payload to the request's endpoint.
    async fn deliver(&self, request: &WebhookRequest) -> DeliveryOutcome;
}
