//! Error types for the registry, dispatcher and retry worker.

use std::borrow::Cow;
use std::error::Error as StdError;

use hookwire_postgres::PgError;
use strum::{AsRefStr, Display, IntoStaticStr};

/// Type alias for boxed errors that are Send + Sync.
pub type BoxedError = Box<dyn StdError + Send + Sync>;

/// Result type alias for server operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Error kind enumeration for categorizing server errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[derive(AsRefStr, Display, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum ErrorKind {
    /// Invalid startup configuration.
    Config,
    /// Rejected input: bad URL, empty event set, invalid retry policy.
    Validation,
    /// The addressed webhook or event does not exist.
    NotFound,
    /// The webhook or event log store failed.
    Store,
    /// Internal logic error.
    Internal,
}

/// Server error with a kind, a message and an optional source.
#[derive(Debug, thiserror::Error)]
#[error("{kind} error: {message}")]
pub struct Error {
    kind: ErrorKind,
    message: Cow<'static, str>,
    #[source]
    source: Option<BoxedError>,
}

impl Error {
    #[inline]
    fn new(kind: ErrorKind, message: impl Into<Cow<'static, str>>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    /// Attaches a source error.
    #[inline]
    pub fn with_source(mut self, source: impl StdError + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Returns the error kind.
    #[must_use]
    #[inline]
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the error message.
    #[must_use]
    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Creates a new configuration error.
    #[inline]
    pub fn config(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorKind::Config, message)
    }

    /// Creates a new validation error.
    #[inline]
    pub fn validation(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    /// Creates a new not-found error for `resource` with `id`.
    #[inline]
    pub fn not_found(resource: &'static str, id: i64) -> Self {
        Self::new(ErrorKind::NotFound, format!("{resource} {id} not found"))
    }

    /// Creates a new store error.
    #[inline]
    pub fn store(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorKind::Store, message)
    }

    /// Creates a new internal error.
    #[inline]
    pub fn internal(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }
}

impl From<PgError> for Error {
    fn from(err: PgError) -> Self {
        match err {
            PgError::Config(_) => Error::config(err.to_string()).with_source(err),
            _ => Error::store(err.to_string()).with_source(err),
        }
    }
}

impl From<validator::ValidationErrors> for Error {
    fn from(err: validator::ValidationErrors) -> Self {
        Error::validation(err.to_string()).with_source(err)
    }
}

impl From<hookwire_webhook::Error> for Error {
    fn from(err: hookwire_webhook::Error) -> Self {
        use hookwire_webhook::ErrorKind as WebhookErrorKind;

        let kind = match err.kind {
            WebhookErrorKind::InvalidInput => ErrorKind::Validation,
            WebhookErrorKind::Configuration => ErrorKind::Config,
            WebhookErrorKind::Serialization => ErrorKind::Internal,
        };

        Error::new(kind, err.to_string()).with_source(err)
    }
}
