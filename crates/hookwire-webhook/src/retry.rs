//! Retry policy and outcome scheduling.
//!
//! After every attempt the scheduler decides, from the outcome, the number of
//! attempts already made and the webhook's [`RetryPolicy`], whether and when
//! the next attempt happens:
//!
//! ```text
//! CREATED (attempt = 0)
//!   -> DELIVERED        2xx                                  terminal
//!   -> RETRY_SCHEDULED  non-2xx or transport error, attempt + 1 < max
//!   -> EXHAUSTED        non-2xx or transport error, attempt + 1 >= max  terminal
//! ```

use std::time::Duration;

use jiff::{SignedDuration, Timestamp};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display};

use crate::{DeliveryOutcome, Error, Result};

/// Default maximum number of attempts.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Default backoff multiplier.
pub const DEFAULT_BACKOFF_MULTIPLIER: f64 = 2.0;

/// Default delay before the first retry, in milliseconds.
pub const DEFAULT_INITIAL_DELAY_MS: u64 = 1000;

/// Retry policy persisted as JSON alongside each webhook.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryPolicy {
    /// Maximum number of delivery attempts, including the first one.
    pub max_attempts: u32,
    /// Factor applied to the delay after each failed attempt.
    pub backoff_multiplier: f64,
    /// Delay before the first retry, in milliseconds.
    pub initial_delay: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff_multiplier: DEFAULT_BACKOFF_MULTIPLIER,
            initial_delay: DEFAULT_INITIAL_DELAY_MS,
        }
    }
}

impl RetryPolicy {
    /// Creates a new retry policy.
    pub fn new(max_attempts: u32, backoff_multiplier: f64, initial_delay: u64) -> Self {
        Self {
            max_attempts,
            backoff_multiplier,
            initial_delay,
        }
    }

    /// Validates the policy.
    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(Error::invalid_input().with_message("maxAttempts must be at least 1"));
        }

        if !self.backoff_multiplier.is_finite() || self.backoff_multiplier < 1.0 {
            return Err(Error::invalid_input()
                .with_message("backoffMultiplier must be a finite number >= 1"));
        }

        Ok(())
    }

    /// Returns the delay before the next attempt, given the number of attempts
    /// made before the one that just failed.
    ///
    /// `initial_delay * backoff_multiplier ^ attempt`, saturating.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let millis = self.initial_delay as f64 * self.backoff_multiplier.powi(exponent);
        // Float to int casts saturate; NaN becomes zero.
        Duration::from_millis(millis as u64)
    }

    /// Decides what to persist after an attempt.
    ///
    /// `attempt` is the number of attempts made before this one.
    pub fn schedule(
        &self,
        attempt: u32,
        outcome: &DeliveryOutcome,
        now: Timestamp,
    ) -> DeliveryUpdate {
        let attempts_made = attempt.saturating_add(1);
        let next_retry = if outcome.is_success() || attempts_made >= self.max_attempts {
            None
        } else {
            Some(add_saturating(now, self.delay_for(attempt)))
        };

        DeliveryUpdate {
            status_code: outcome.status_code(),
            response: outcome.response_text().to_owned(),
            attempt: attempts_made,
            next_retry,
        }
    }
}

fn add_saturating(now: Timestamp, delay: Duration) -> Timestamp {
    SignedDuration::try_from(delay)
        .ok()
        .and_then(|delay| now.checked_add(delay).ok())
        .unwrap_or(Timestamp::MAX)
}

/// Delivery state of an event log row after an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, AsRefStr, Display)]
#[strum(serialize_all = "snake_case")]
pub enum DeliveryState {
    /// The receiver accepted the event.
    Delivered,
    /// Another attempt is scheduled.
    RetryScheduled,
    /// No attempts remain.
    Exhausted,
}

/// Fields written to the event log row after an attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryUpdate {
    /// Status code of the attempt, `None` for transport errors.
    pub status_code: Option<u16>,
    /// Response body or transport error description.
    pub response: String,
    /// Attempts made so far, including this one.
    pub attempt: u32,
    /// Time of the next attempt, `None` once terminal.
    pub next_retry: Option<Timestamp>,
}

impl DeliveryUpdate {
    /// Returns the resulting delivery state.
    pub fn state(&self) -> DeliveryState {
        match (self.status_code, self.next_retry) {
            (Some(code), _) if (200..300).contains(&code) => DeliveryState::Delivered,
            (_, Some(_)) => DeliveryState::RetryScheduled,
            (_, None) => DeliveryState::Exhausted,
        }
    }

    /// Returns whether no further attempts will be made.
    pub fn is_terminal(&self) -> bool {
        self.next_retry.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TransportErrorKind;

    fn policy() -> RetryPolicy {
        RetryPolicy::new(3, 2.0, 1000)
    }

    fn now() -> Timestamp {
        Timestamp::from_second(1_700_000_000).unwrap()
    }

    #[test]
    fn test_default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.backoff_multiplier, 2.0);
        assert_eq!(policy.initial_delay, 1000);
        assert!(policy.validate().is_ok());
    }

    #[test]
    fn test_policy_json_shape() {
        let json = serde_json::to_value(RetryPolicy::default()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"maxAttempts": 5, "backoffMultiplier": 2.0, "initialDelay": 1000})
        );

        let parsed: RetryPolicy =
            serde_json::from_str(r#"{"maxAttempts":3,"backoffMultiplier":2,"initialDelay":500}"#)
                .unwrap();
        assert_eq!(parsed, RetryPolicy::new(3, 2.0, 500));
    }

    #[test]
    fn test_policy_validation() {
        assert!(RetryPolicy::new(0, 2.0, 1000).validate().is_err());
        assert!(RetryPolicy::new(3, 0.5, 1000).validate().is_err());
        assert!(RetryPolicy::new(3, f64::NAN, 1000).validate().is_err());
        assert!(RetryPolicy::new(1, 1.0, 0).validate().is_ok());
    }

    #[test]
    fn test_delay_grows_geometrically() {
        let policy = RetryPolicy::new(10, 2.0, 1000);
        let delays: Vec<_> = (0..5).map(|a| policy.delay_for(a).as_millis()).collect();
        assert_eq!(delays, vec![1000, 2000, 4000, 8000, 16000]);

        let policy = RetryPolicy::new(10, 1.5, 1000);
        for attempt in 0..8 {
            assert!(policy.delay_for(attempt) < policy.delay_for(attempt + 1));
        }
    }

    #[test]
    fn test_delay_saturates() {
        let policy = RetryPolicy::new(u32::MAX, 10.0, u64::MAX);
        assert_eq!(policy.delay_for(u32::MAX), Duration::from_millis(u64::MAX));

        let update = policy.schedule(1000, &DeliveryOutcome::from_response(500, ""), now());
        assert_eq!(update.next_retry, Some(Timestamp::MAX));
    }

    #[test]
    fn test_failure_schedules_backoff() {
        let outcome = DeliveryOutcome::from_response(500, "error");

        for attempt in 0..2 {
            let update = policy().schedule(attempt, &outcome, now());
            let expected = now()
                .checked_add(SignedDuration::from_millis(1000 * 2i64.pow(attempt)))
                .unwrap();

            assert_eq!(update.attempt, attempt + 1);
            assert_eq!(update.status_code, Some(500));
            assert_eq!(update.response, "error");
            assert_eq!(update.next_retry, Some(expected));
            assert_eq!(update.state(), DeliveryState::RetryScheduled);
        }
    }

    #[test]
    fn test_success_is_terminal() {
        let outcome = DeliveryOutcome::from_response(204, "");

        for attempt in 0..5 {
            let update = policy().schedule(attempt, &outcome, now());
            assert!(update.is_terminal());
            assert_eq!(update.state(), DeliveryState::Delivered);
        }
    }

    #[test]
    fn test_exhaustion_beats_backoff() {
        let outcome = DeliveryOutcome::from_response(500, "");
        let update = policy().schedule(2, &outcome, now());

        assert_eq!(update.attempt, 3);
        assert!(update.is_terminal());
        assert_eq!(update.state(), DeliveryState::Exhausted);

        let update = policy().schedule(7, &outcome, now());
        assert!(update.is_terminal());
    }

    #[test]
    fn test_transport_error_schedules_retry() {
        let outcome = DeliveryOutcome::transport(TransportErrorKind::Connect, "refused");
        let update = policy().schedule(0, &outcome, now());

        assert_eq!(update.status_code, None);
        assert_eq!(update.response, "refused");
        assert_eq!(update.attempt, 1);
        assert!(update.next_retry.is_some());
    }

    #[test]
    fn test_single_attempt_policy() {
        let policy = RetryPolicy::new(1, 2.0, 1000);
        let update = policy.schedule(0, &DeliveryOutcome::from_response(500, ""), now());
        assert!(update.is_terminal());
    }
}
