//! API request and response types.

use axum::http::StatusCode;
use serde::{Deserialize, Serialize};

use crate::error::BridgeError;

/// Request to answer a message on behalf of an identity.
#[derive(Debug, Clone, Deserialize)]
pub struct RespondRequest {
    /// External identity, e.g. a phone number.
    pub identity: String,
    /// Message body from the user.
    pub message: String,
    /// Display name of the user (used in logs only).
    #[serde(default)]
    pub name: Option<String>,
}

impl RespondRequest {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("unknown")
    }
}

/// Assistant reply to a message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RespondResponse {
    pub identity: String,
    pub reply: String,
}

/// Thread recorded for an identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadResponse {
    pub identity: String,
    pub thread_id: String,
}

/// Error response body.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    /// Error code (e.g., "THREAD_NOT_FOUND").
    pub code: String,
    /// Human-readable error message.
    pub message: String,
    /// Additional details (optional).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorResponse {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn thread_not_found(identity: &str) -> Self {
        Self::new(
            "THREAD_NOT_FOUND",
            format!("No thread recorded for '{}'", identity),
        )
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new("INTERNAL_ERROR", message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new("BAD_REQUEST", message)
    }

    /// Map a bridge error to an HTTP status and body.
    pub fn from_error(err: &BridgeError) -> (StatusCode, Self) {
        match err {
            BridgeError::InvalidIdentity(_) => {
                (StatusCode::BAD_REQUEST, Self::bad_request(err.to_string()))
            }
            BridgeError::RunTimedOut { .. } => (
                StatusCode::GATEWAY_TIMEOUT,
                Self::new("RUN_TIMED_OUT", err.to_string()),
            ),
            err if err.is_remote() => (
                StatusCode::BAD_GATEWAY,
                Self::new("ASSISTANT_UNAVAILABLE", "assistant service request failed")
                    .with_details(err.to_string()),
            ),
            _ => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Self::internal_error(err.to_string()),
            ),
        }
    }
}
