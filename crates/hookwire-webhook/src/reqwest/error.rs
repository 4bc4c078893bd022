//! Error types for reqwest-based webhook delivery.

use thiserror::Error;

use crate::TransportErrorKind;

/// Result type alias for reqwest operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for reqwest operations.
///
/// Delivery failures are never errors; they are reported as
/// [`DeliveryOutcome::TransportError`](crate::DeliveryOutcome::TransportError).
#[derive(Debug, Error)]
pub enum Error {
    /// The HTTP client could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    Build(#[source] reqwest::Error),
}

impl From<Error> for crate::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::Build(e) => crate::Error::configuration()
                .with_message(e.to_string())
                .with_source(e),
        }
    }
}

/// Classifies a failed request.
pub(crate) fn transport_kind(err: &reqwest::Error) -> TransportErrorKind {
    if err.is_timeout() {
        TransportErrorKind::Timeout
    } else if err.is_connect() {
        TransportErrorKind::Connect
    } else {
        TransportErrorKind::Request
    }
}
