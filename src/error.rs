//! Error types for Misery
//!
//! Provides a unified error type for all operations.

use thiserror::Error;

/// Result type alias using MiseryError
pub type Result<T> = std::result::Result<T, MiseryError>;

/// Unified error type for Misery operations
#[derive(Debug, Error)]
pub enum MiseryError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Codec Errors
    // -------------------------------------------------------------------------
    #[error("Invalid key {key:?}: {reason}")]
    InvalidKey { key: String, reason: String },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    // -------------------------------------------------------------------------
    // Backing Service Errors
    // -------------------------------------------------------------------------
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Cache unavailable: {0}")]
    CacheUnavailable(String),

    #[error("Record corrupted: {0}")]
    Corruption(String),

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("Serialization error: {0}")]
    Serialization(String),

    // -------------------------------------------------------------------------
    // Gateway Errors
    // -------------------------------------------------------------------------
    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    // -------------------------------------------------------------------------
    // Outbound Errors
    // -------------------------------------------------------------------------
    #[error("Webhook error: {0}")]
    Webhook(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl MiseryError {
    /// Shorthand for an `InvalidKey` error
    pub fn invalid_key(key: &str, reason: impl Into<String>) -> Self {
        MiseryError::InvalidKey {
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<bincode::Error> for MiseryError {
    fn from(err: bincode::Error) -> Self {
        MiseryError::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for MiseryError {
    fn from(err: serde_json::Error) -> Self {
        MiseryError::Serialization(err.to_string())
    }
}
