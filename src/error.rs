// Error handling module
// Defines the client error taxonomy and backend error-body decoding

use reqwest::{Response, StatusCode};
use thiserror::Error;

/// Errors surfaced by the client core
#[derive(Error, Debug)]
pub enum ClientError {
    /// No session is stored on this device
    #[error("Not authenticated")]
    NotAuthenticated,

    /// The session could not be refreshed and has been cleared
    #[error("Session expired, sign in again")]
    SessionExpired,

    /// Sign-in, sign-up or token exchange was rejected
    #[error("Authentication failed: {0}")]
    AuthError(String),

    /// Non-success response from the backend
    #[error("Backend error: {status} - {message}")]
    BackendError { status: u16, message: String },

    /// Input rejected before reaching the backend
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Local key-value storage failure
    #[error("Storage error: {0}")]
    StorageError(String),

    /// Transport-level failure (connect, timeout, decode)
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Anything else
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl ClientError {
    /// Build an error from a non-success backend response, consuming its body
    pub async fn from_response(response: Response) -> Self {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let message = extract_error_message(&body);

        if status == StatusCode::UNAUTHORIZED {
            return ClientError::SessionExpired;
        }

        ClientError::BackendError {
            status: status.as_u16(),
            message,
        }
    }

    /// True when the error means the caller has no usable session
    pub fn is_auth_failure(&self) -> bool {
        match self {
            ClientError::NotAuthenticated | ClientError::SessionExpired => true,
            ClientError::BackendError { status, .. } => *status == 401,
            _ => false,
        }
    }

    /// HTTP status carried by the error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::BackendError { status, .. } => Some(*status),
            ClientError::SessionExpired => Some(401),
            ClientError::Network(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// Pull a readable message out of a backend error body.
///
/// The auth service answers with `error_description` or `msg`, the REST layer
/// with `message`. Falls back to the raw body.
pub fn extract_error_message(body: &str) -> String {
    if let Ok(json) = serde_json::from_str::<serde_json::Value>(body) {
        for field in ["error_description", "msg", "message", "error"] {
            if let Some(text) = json.get(field).and_then(|v| v.as_str()) {
                if !text.is_empty() {
                    return text.to_string();
                }
            }
        }
    }

    body.trim().to_string()
}

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, ClientError>;
