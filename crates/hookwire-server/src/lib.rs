#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

mod config;
mod error;
mod limiter;

pub mod dispatcher;
pub mod registry;
pub mod store;
pub mod worker;

pub use crate::config::{
    DEFAULT_BATCH_SIZE, DEFAULT_DELIVERY_CONCURRENCY, DEFAULT_DESTINATION_CONCURRENCY,
    DEFAULT_SWEEP_INTERVAL_SECS, WorkerConfig,
};
pub use crate::dispatcher::WebhookDispatcher;
pub use crate::error::{BoxedError, Error, ErrorKind, Result};
pub use crate::limiter::DestinationLimiter;
pub use crate::registry::WebhookRegistry;
pub use crate::worker::{RetryWorker, SweepSummary};

/// Tracing target for dispatcher operations.
pub const TRACING_TARGET_DISPATCH: &str = "hookwire_server::dispatch";

/// Tracing target for registry operations.
pub const TRACING_TARGET_REGISTRY: &str = "hookwire_server::registry";

/// Tracing target for the retry worker.
pub const TRACING_TARGET_WORKER: &str = "hookwire_server::worker";
