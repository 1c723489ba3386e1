//! API layer for assistant-bridge.
//!
//! A small REST surface for whatever delivers inbound messages (a
//! messaging webhook, a test harness) to the conversation driver.
//!
//! ## Endpoints
//!
//! - `GET /health` - Health check
//! - `GET /api/v1` - API information
//! - `POST /api/v1/respond` - Answer a message for an identity
//! - `GET /api/v1/threads/{identity}` - Thread recorded for an identity

pub mod handlers;
pub mod router;
pub mod types;

// Re-export commonly used types
pub use handlers::AppState;
pub use router::{create_router, serve, ServerConfig};
pub use types::{ErrorResponse, RespondRequest, RespondResponse, ThreadResponse};
