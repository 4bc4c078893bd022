//! Outcome of a single webhook delivery attempt.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display};

/// Why a request failed before a response was received.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[derive(AsRefStr, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TransportErrorKind {
    /// The request did not complete within its timeout.
    Timeout,
    /// DNS resolution or TCP/TLS connection failed.
    Connect,
    /// Any other failure while sending or reading the response.
    Request,
}

/// Result of one delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DeliveryOutcome {
    /// The receiver answered with a 2xx status.
    Delivered {
        /// HTTP status code.
        status_code: u16,
        /// Response body text.
        body: String,
    },
    /// The receiver answered with a non-2xx status.
    Failed {
        /// HTTP status code.
        status_code: u16,
        /// Response body text.
        body: String,
    },
    /// No response was received.
    TransportError {
        /// Failure category.
        kind: TransportErrorKind,
        /// Human-readable description.
        message: String,
    },
}

impl DeliveryOutcome {
    /// Classifies a completed HTTP response.
    pub fn from_response(status_code: u16, body: impl Into<String>) -> Self {
        let body = body.into();
        if (200..300).contains(&status_code) {
            Self::Delivered { status_code, body }
        } else {
            Self::Failed { status_code, body }
        }
    }

    /// Creates a transport failure outcome.
    pub fn transport(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self::TransportError {
            kind,
            message: message.into(),
        }
    }

    /// Returns whether the delivery was successful (2xx status code).
    #[inline]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Delivered { .. })
    }

    /// Returns the HTTP status code, or `None` if no response was received.
    #[inline]
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Delivered { status_code, .. } | Self::Failed { status_code, .. } => {
                Some(*status_code)
            }
            Self::TransportError { .. } => None,
        }
    }

    /// Returns the text recorded in the event log: the response body, or the
    /// transport error description.
    #[inline]
    pub fn response_text(&self) -> &str {
        match self {
            Self::Delivered { body, .. } | Self::Failed { body, .. } => body,
            Self::TransportError { message, .. } => message,
        }
    }

    /// Returns whether another attempt could plausibly succeed.
    ///
    /// Every failure is retried by the scheduler; this only informs logging.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Delivered { .. } => false,
            Self::Failed { status_code, .. } => {
                *status_code >= 500 || *status_code == 408 || *status_code == 429
            }
            Self::TransportError { .. } => true,
        }
    }
}
