//! Outbound webhook dispatch
//!
//! Fires a JSON POST at an endpoint with a bearer token. The deploy command
//! uses it to trigger a repository dispatch event.

use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::ACCEPT;
use serde_json::json;

use crate::error::{MiseryError, Result};

/// Media type the repository dispatch API answers with
pub const DISPATCH_ACCEPT: &str = "application/vnd.github+json";

/// Body of the deploy dispatch event
pub fn deploy_body() -> serde_json::Value {
    json!({ "event_type": "deploy" })
}

/// Sends webhook requests
pub trait WebhookDispatcher: Send + Sync {
    /// POST `body` to `endpoint` authenticated with `token`
    ///
    /// Returns the HTTP status on success (2xx); any other status is a
    /// `Webhook` error.
    fn dispatch(&self, endpoint: &str, token: &str, body: &serde_json::Value) -> Result<u16>;
}

/// Blocking HTTP(S) dispatcher
pub struct HttpDispatcher {
    client: Client,
}

impl HttpDispatcher {
    /// Build a client whose requests give up after `timeout`
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(format!("misery/{}", crate::VERSION))
            .build()
            .map_err(|e| MiseryError::Webhook(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

impl WebhookDispatcher for HttpDispatcher {
    fn dispatch(&self, endpoint: &str, token: &str, body: &serde_json::Value) -> Result<u16> {
        let response = self
            .client
            .post(endpoint)
            .bearer_auth(token)
            .header(ACCEPT, DISPATCH_ACCEPT)
            .json(body)
            .send()
            .map_err(|e| MiseryError::Webhook(format!("{}: {}", endpoint, e)))?;

        let status = response.status();
        tracing::debug!("Webhook POST {} returned {}", endpoint, status);

        response
            .error_for_status()
            .map_err(|_| MiseryError::Webhook(format!("{} answered {}", endpoint, status)))?;
        Ok(status.as_u16())
    }
}
