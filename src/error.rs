//! Error types for assistant-bridge.

use thiserror::Error;

use crate::assistant::RunStatus;

/// Main error type for assistant-bridge operations.
#[derive(Error, Debug)]
pub enum BridgeError {
    /// Identity was empty or otherwise unusable as a store key.
    #[error("invalid identity: {0:?}")]
    InvalidIdentity(String),

    /// Session store backend failure.
    #[error("session store error: {0}")]
    Store(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Session store file could not be encoded or decoded.
    #[error("session store format error: {0}")]
    Json(#[from] serde_json::Error),

    /// Internal lock was poisoned.
    #[error("internal lock poisoned")]
    LockPoisoned,

    /// Transport-level failure talking to the assistant service.
    #[error("assistant service request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The assistant service answered with a non-success status.
    #[error("assistant service returned {status}: {message}")]
    Api { status: u16, message: String },

    /// The assistant service answered with a body we could not understand.
    #[error("unexpected assistant service response: {0}")]
    Decode(String),

    /// The run did not reach a terminal status within the poll policy.
    #[error("run {run_id} timed out after {attempts} polls (last status: {last_status})")]
    RunTimedOut {
        run_id: String,
        last_status: RunStatus,
        attempts: u32,
    },

    /// The run completed but the thread held no text reply.
    #[error("assistant produced no text reply")]
    EmptyReply,
}

impl BridgeError {
    /// Whether the error originated at the remote assistant service.
    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            Self::Http(_) | Self::Api { .. } | Self::Decode(_) | Self::EmptyReply
        )
    }
}

/// Convenience Result type for assistant-bridge operations.
pub type Result<T> = std::result::Result<T, BridgeError>;
