//! Assistant service boundary.
//!
//! The conversation driver talks to the remote assistant only through the
//! [`AssistantService`] trait. [`OpenAiAssistants`] implements it against the
//! OpenAI Assistants REST API.

mod client;
mod types;

pub use client::{AssistantService, OpenAiAssistants, DEFAULT_BASE_URL, DEFAULT_REQUEST_TIMEOUT};
pub use types::{
    Assistant, ListResponse, Message, MessageContent, MessageRole, Run, RunError, RunStatus,
    TextContent, Thread,
};
