//! Reqwest-based HTTP client for webhook delivery.
//!
//! This module provides a reqwest-based implementation of the [`WebhookProvider`] trait.
//!
//! # Example
//!
//! ```rust,ignore
//! use hookwire_webhook::reqwest::{ReqwestClient, ReqwestConfig};
//! use hookwire_webhook::WebhookService;
//!
//! let client = ReqwestClient::new(ReqwestConfig::default())?;
//! let service: WebhookService = client.into_service();
//! ```
//!
//! [`WebhookProvider`]: crate::WebhookProvider

mod client;
mod config;
mod error;

pub use client::ReqwestClient;
pub use config::{DEFAULT_MAX_RESPONSE_BYTES, DEFAULT_TIMEOUT_SECS, ReqwestConfig};
pub use error::{Error, Result};

/// Tracing target for reqwest client operations.
pub const TRACING_TARGET: &str = "hookwire_webhook::reqwest";
