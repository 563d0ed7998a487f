//! SubGenius Error Definitions
//!
//! Every failure that crosses back to a caller is one of these variants, so
//! front ends can render a specific message per kind.

use thiserror::Error;

use super::credentials::CredentialError;

/// Message the service returns when video generation needs a paid key.
const PAID_KEY_SIGNAL: &str = "Requested entity was not found";

/// Core engine error types
#[derive(Error, Debug)]
pub enum CoreError {
    // =========================================================================
    // Request Errors
    // =========================================================================
    #[error("No API key configured. Set one before making requests.")]
    MissingCredential,

    #[error("Failed to read media: {0}")]
    MediaRead(String),

    #[error("API key rejected: {0}")]
    Auth(String),

    #[error("API key rejected: {reason}; removing it from storage failed: {source}")]
    AuthKeyRetained {
        reason: String,
        source: CredentialError,
    },

    #[error("Upstream API error: {0}")]
    Upstream(String),

    #[error("Generation failed: {0}")]
    Generation(String),

    // =========================================================================
    // Polling Errors
    // =========================================================================
    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Operation cancelled")]
    Cancelled,

    // =========================================================================
    // General Errors
    // =========================================================================
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Credential store error: {0}")]
    Credential(#[from] CredentialError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Core engine result type
pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    /// Whether the service rejected the credential
    pub fn is_auth(&self) -> bool {
        matches!(
            self,
            CoreError::Auth(_) | CoreError::AuthKeyRetained { .. }
        )
    }

    /// Whether the service reported that the request needs a paid key
    pub fn requires_paid_key(&self) -> bool {
        match self {
            CoreError::Upstream(msg) => msg.contains(PAID_KEY_SIGNAL),
            _ => false,
        }
    }
}
