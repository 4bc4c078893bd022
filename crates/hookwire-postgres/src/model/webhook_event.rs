//! Webhook delivery log model.

use diesel::prelude::*;
use jiff_diesel::Timestamp;

use crate::schema::webhook_events;

/// One event sent to one webhook, updated in place after every attempt.
#[derive(Debug, Clone, PartialEq, Queryable, Selectable)]
#[diesel(table_name = webhook_events)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct WebhookEvent {
    /// Unique event log identifier, sent as `X-Webhook-ID`.
    pub id: i64,
    /// Webhook this event was sent to.
    pub webhook_id: i64,
    /// Event name.
    pub event: String,
    /// Exact serialized request body.
    pub payload: String,
    /// Status code of the latest attempt, `None` before the first response.
    pub status_code: Option<i32>,
    /// Response body or transport error of the latest attempt.
    pub response: Option<String>,
    /// Number of attempts made so far.
    pub attempt: i32,
    /// When the next attempt is due, `None` once terminal.
    pub next_retry: Option<Timestamp>,
    /// Timestamp when the event was created.
    pub created_at: Timestamp,
}

/// Data for a new event log row.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = webhook_events)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct NewWebhookEvent {
    /// Webhook the event is sent to.
    pub webhook_id: i64,
    /// Event name.
    pub event: String,
    /// Exact serialized request body.
    pub payload: String,
    /// Initial attempt counter, always zero.
    pub attempt: i32,
    /// When the sweep may pick the row up if no attempt is ever recorded.
    pub next_retry: Option<Timestamp>,
}

/// Result of an attempt.
///
/// Every field is written, so `None` clears the column.
#[derive(Debug, Clone, PartialEq, AsChangeset)]
#[diesel(table_name = webhook_events)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[diesel(treat_none_as_null = true)]
pub struct UpdateWebhookEvent {
    /// Status code of the attempt.
    pub status_code: Option<i32>,
    /// Response body or transport error.
    pub response: Option<String>,
    /// Attempts made so far.
    pub attempt: i32,
    /// Next attempt time.
    pub next_retry: Option<Timestamp>,
}

impl NewWebhookEvent {
    /// Creates a new event log row with no attempts made.
    pub fn new(webhook_id: i64, event: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            webhook_id,
            event: event.into(),
            payload: payload.into(),
            attempt: 0,
            next_retry: None,
        }
    }

    /// Makes the row due for the sweep at `at` until an attempt is recorded.
    pub fn with_next_retry(mut self, at: jiff::Timestamp) -> Self {
        self.next_retry = Some(at.into());
        self
    }
}

impl WebhookEvent {
    /// Returns whether the latest attempt got a 2xx response.
    pub fn is_delivered(&self) -> bool {
        self.status_code.is_some_and(|code| (200..300).contains(&code))
    }

    /// Returns whether another attempt is scheduled.
    pub fn is_pending_retry(&self) -> bool {
        self.next_retry.is_some()
    }

    /// Returns whether the row is due for a retry at `now`.
    pub fn is_due(&self, now: jiff::Timestamp) -> bool {
        self.next_retry
            .is_some_and(|next| jiff::Timestamp::from(next) <= now)
    }
}
