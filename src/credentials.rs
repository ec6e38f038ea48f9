//! Service-account credentials
//!
//! The document store credential arrives as url-safe base64 of the JSON key
//! file. Padding is optional.

use std::fmt;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use serde::Deserialize;

use crate::error::{MiseryError, Result};

/// A decoded service-account key
#[derive(Clone, Deserialize)]
pub struct ServiceAccount {
    #[serde(rename = "type")]
    pub account_type: String,
    pub project_id: String,
    #[serde(default)]
    pub private_key_id: String,
    pub private_key: String,
    pub client_email: String,
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub token_uri: String,
}

impl ServiceAccount {
    /// Decode from the base64 blob carried in the environment
    pub fn from_base64(blob: &str) -> Result<Self> {
        let raw = URL_SAFE_NO_PAD
            .decode(blob.trim().trim_end_matches('='))
            .map_err(|e| MiseryError::Config(format!("service account is not base64: {}", e)))?;
        let json = String::from_utf8(raw).map_err(|e| {
            MiseryError::Config(format!("service account is not utf-8: {}", e))
        })?;
        Self::from_json(&json)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let account: ServiceAccount = serde_json::from_str(json)
            .map_err(|e| MiseryError::Config(format!("service account JSON: {}", e)))?;
        if account.account_type != "service_account" {
            return Err(MiseryError::Config(format!(
                "credential type is {:?}, expected \"service_account\"",
                account.account_type
            )));
        }
        if account.project_id.is_empty() {
            return Err(MiseryError::Config(
                "service account has no project_id".to_string(),
            ));
        }
        Ok(account)
    }
}

impl fmt::Debug for ServiceAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccount")
            .field("project_id", &self.project_id)
            .field("client_email", &self.client_email)
            .field("private_key", &"<redacted>")
            .finish()
    }
}
