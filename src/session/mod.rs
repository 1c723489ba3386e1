//! Session management module.
//!
//! This module maps external identities to assistant threads and persists
//! that mapping, either in memory or in a locked JSON file.

mod file;
mod id;
mod store;

pub use file::{FileSessionStore, DEFAULT_STORE_PATH};
pub use id::{Identity, ThreadId};
pub use store::{MemorySessionStore, SessionStore};
