//! Background workers.

mod retry;

pub use retry::{RetryWorker, SweepSummary};
