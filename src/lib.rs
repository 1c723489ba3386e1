//! # assistant-bridge
//!
//! Maps external messaging identities to persistent assistant threads.
//!
//! Each identity (e.g. a WhatsApp phone number) gets exactly one thread on
//! the assistant service, created on first contact and recorded in a local
//! session store. Every inbound message is posted to that thread, a run is
//! started, and the run is polled until the assistant's reply is ready.
//!
//! ## Features
//!
//! - **Durable session store**: identity→thread map in a locked JSON file
//! - **Bounded polling**: runs are polled with a configurable interval,
//!   attempt cap and timeout
//! - **Pluggable service**: the driver only sees the [`AssistantService`] trait
//! - **HTTP surface**: a small axum API for message delivery
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use assistant_bridge::{
//!     ConversationDriver, DriverSettings, FileSessionStore, Identity, OpenAiAssistants,
//! };
//!
//! #[tokio::main]
//! async fn main() -> assistant_bridge::Result<()> {
//!     // Initialize logging
//!     assistant_bridge::logging::try_init().ok();
//!
//!     let service = Arc::new(OpenAiAssistants::new("sk-...")?);
//!     let store = Arc::new(FileSessionStore::open("threads_db.json")?);
//!     let driver = ConversationDriver::new(service, store, DriverSettings::new("asst_..."));
//!
//!     let who = Identity::new("15551234567")?;
//!     let reply = driver.respond("Hi! What time is check-in?", &who, "Alice").await?;
//!     println!("{reply}");
//!
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod assistant;
pub mod cli;
pub mod config;
pub mod conversation;
pub mod error;
pub mod logging;
pub mod session;

// Re-export commonly used types
pub use assistant::{AssistantService, OpenAiAssistants, Run, RunStatus};
pub use conversation::{ConversationDriver, DriverSettings, PollPolicy, RUN_FAILED_REPLY};
pub use error::{BridgeError, Result};
pub use session::{FileSessionStore, Identity, MemorySessionStore, SessionStore, ThreadId};
