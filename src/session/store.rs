//! Session store interface and in-memory implementation.

use std::collections::HashMap;
use std::sync::RwLock;

use super::{Identity, ThreadId};
use crate::error::BridgeError;
use crate::Result;

/// Durable mapping from an external identity to its assistant thread.
///
/// A store holds at most one thread per identity. `store` always
/// overwrites: when two writers race on the same identity the last
/// write wins.
pub trait SessionStore: Send + Sync {
    /// Look up the thread for an identity.
    ///
    /// Returns `Ok(None)` when the identity has never been seen.
    fn lookup(&self, identity: &Identity) -> Result<Option<ThreadId>>;

    /// Associate a thread with an identity, replacing any previous one.
    ///
    /// The record is durable once this returns `Ok`.
    fn store(&self, identity: &Identity, thread: &ThreadId) -> Result<()>;

    /// Number of stored records.
    fn len(&self) -> Result<usize>;

    fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

/// Thread-safe, process-local session store.
///
/// Nothing survives a restart; use [`FileSessionStore`](super::FileSessionStore)
/// for durability.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    threads: RwLock<HashMap<Identity, ThreadId>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemorySessionStore {
    fn lookup(&self, identity: &Identity) -> Result<Option<ThreadId>> {
        let threads = self
            .threads
            .read()
            .map_err(|_| BridgeError::LockPoisoned)?;
        Ok(threads.get(identity).cloned())
    }

    fn store(&self, identity: &Identity, thread: &ThreadId) -> Result<()> {
        let mut threads = self
            .threads
            .write()
            .map_err(|_| BridgeError::LockPoisoned)?;
        threads.insert(identity.clone(), thread.clone());
        Ok(())
    }

    fn len(&self) -> Result<usize> {
        let threads = self
            .threads
            .read()
            .map_err(|_| BridgeError::LockPoisoned)?;
        Ok(threads.len())
    }
}
