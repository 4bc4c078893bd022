//! Registry request types.

use hookwire_postgres::model::{NewWebhook, UpdateWebhook as UpdateWebhookModel};
use hookwire_webhook::RetryPolicy;
use serde::{Deserialize, Serialize};
use url::Url;
use validator::Validate;

use crate::{Error, Result};

/// Request payload for registering a webhook.
#[must_use]
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateWebhook {
    /// The URL to send event payloads to.
    #[validate(url, length(min = 1, max = 2048))]
    pub url: String,
    /// Event names this webhook subscribes to.
    #[validate(length(min = 1, max = 64))]
    pub events: Vec<String>,
    /// Whether events are sent right away.
    #[serde(default = "default_active")]
    pub active: bool,
    /// Retry policy, the default policy when absent.
    #[serde(default)]
    pub retry_policy: Option<RetryPolicy>,
}

fn default_active() -> bool {
    true
}

impl CreateWebhook {
    /// Creates an active webhook request with the default retry policy.
    pub fn new<E>(url: impl Into<String>, events: impl IntoIterator<Item = E>) -> Self
    where
        E: Into<String>,
    {
        Self {
            url: url.into(),
            events: events.into_iter().map(Into::into).collect(),
            active: true,
            retry_policy: None,
        }
    }

    /// Sets the initial activity flag.
    pub fn with_active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }

    /// Sets the retry policy.
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = Some(policy);
        self
    }

    /// Runs field validation and the checks derives cannot express.
    pub fn check(&self) -> Result<()> {
        self.validate()?;
        check_scheme(&self.url)?;
        check_events(&self.events)?;
        if let Some(policy) = &self.retry_policy {
            policy.validate()?;
        }
        Ok(())
    }

    /// Converts this request into a [`NewWebhook`] model.
    pub fn into_model(self, workspace_id: i64, secret: String) -> Result<NewWebhook> {
        Ok(NewWebhook {
            workspace_id,
            url: self.url,
            events: normalize_events(self.events),
            secret,
            active: self.active,
            retry_policy: self.retry_policy.map(policy_to_json).transpose()?,
        })
    }
}

/// Request payload for changing a webhook.
///
/// Absent fields are left unchanged.
#[must_use]
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateWebhook {
    /// Updated endpoint URL.
    #[validate(url, length(min = 1, max = 2048))]
    pub url: Option<String>,
    /// Updated event subscriptions.
    #[validate(length(min = 1, max = 64))]
    pub events: Option<Vec<String>>,
    /// Updated activity flag.
    pub active: Option<bool>,
    /// Updated retry policy.
    pub retry_policy: Option<RetryPolicy>,
}

impl UpdateWebhook {
    /// Runs field validation and the checks derives cannot express.
    pub fn check(&self) -> Result<()> {
        self.validate()?;
        if let Some(url) = &self.url {
            check_scheme(url)?;
        }
        if let Some(events) = &self.events {
            check_events(events)?;
        }
        if let Some(policy) = &self.retry_policy {
            policy.validate()?;
        }
        Ok(())
    }

    /// Converts this request into an [`UpdateWebhookModel`].
    pub fn into_model(self) -> Result<UpdateWebhookModel> {
        Ok(UpdateWebhookModel {
            url: self.url,
            events: self.events.map(normalize_events),
            active: self.active,
            retry_policy: self
                .retry_policy
                .map(|policy| policy_to_json(policy).map(Some))
                .transpose()?,
        })
    }
}

fn check_scheme(url: &str) -> Result<()> {
    let parsed = Url::parse(url).map_err(|err| Error::validation(format!("invalid url: {err}")))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        scheme => Err(Error::validation(format!(
            "url scheme must be http or https, got {scheme}"
        ))),
    }
}

fn check_events(events: &[String]) -> Result<()> {
    if events.iter().any(|event| event.trim().is_empty()) {
        return Err(Error::validation("event names cannot be blank"));
    }
    Ok(())
}

/// Drops duplicates, keeping the first occurrence.
fn normalize_events(events: Vec<String>) -> Vec<Option<String>> {
    let mut seen = Vec::with_capacity(events.len());
    for event in events {
        if !seen.contains(&event) {
            seen.push(event);
        }
    }
    seen.into_iter().map(Some).collect()
}

fn policy_to_json(policy: RetryPolicy) -> Result<serde_json::Value> {
    serde_json::to_value(policy)
        .map_err(|err| Error::internal(format!("failed to serialize retry policy: {err}")))
}
