//! Conversation driving.
//!
//! This module turns one inbound message into one assistant reply:
//! - Resolve or create the identity's thread
//! - Post the message and start a run
//! - Poll the run with a bounded policy
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use assistant_bridge::assistant::OpenAiAssistants;
//! use assistant_bridge::conversation::{ConversationDriver, DriverSettings};
//! use assistant_bridge::session::{FileSessionStore, Identity};
//!
//! # async fn demo() -> assistant_bridge::Result<()> {
//! let service = Arc::new(OpenAiAssistants::new("sk-...")?);
//! let store = Arc::new(FileSessionStore::open("threads_db.json")?);
//! let driver = ConversationDriver::new(service, store, DriverSettings::new("asst_..."));
//!
//! let who = Identity::new("15551234567")?;
//! let reply = driver.respond("What is the wifi password?", &who, "Alice").await?;
//! println!("{reply}");
//! # Ok(())
//! # }
//! ```

mod driver;
mod poller;

pub use driver::{ConversationDriver, DriverSettings, RUN_FAILED_REPLY};
pub use poller::{
    PollPolicy, RunOutcome, RunPoller, DEFAULT_MAX_ATTEMPTS, DEFAULT_POLL_INTERVAL,
    DEFAULT_POLL_TIMEOUT,
};
