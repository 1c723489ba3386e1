//! File-backed session store.
//!
//! The whole identity→thread map lives in one JSON object file. Every
//! operation holds an advisory lock on a sibling `.lock` file for its
//! duration: shared for reads, exclusive for writes. Writes go to a
//! temporary file that is synced and then renamed over the original, so a
//! crash leaves either the old map or the new one on disk.

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use fs2::FileExt;
use tracing::debug;

use super::{Identity, SessionStore, ThreadId};
use crate::error::BridgeError;
use crate::Result;

/// Default location of the store file, relative to the working directory.
pub const DEFAULT_STORE_PATH: &str = "threads_db.json";

type Records = BTreeMap<String, String>;

/// Session store persisted to a local JSON file.
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    /// Open (or lazily create) the store at `path`.
    ///
    /// The file itself is only created by the first `store` call.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if path.file_name().is_none() {
            return Err(BridgeError::Store(format!(
                "store path has no file name: {}",
                path.display()
            )));
        }

        if let Some(parent) = non_empty_parent(&path) {
            fs::create_dir_all(parent)?;
        }

        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Advisory lock file guarding the store, `.<file name>.lock`.
    ///
    /// Never the store file itself, whatever its extension.
    pub fn lock_path(&self) -> PathBuf {
        self.sibling("lock")
    }

    fn temp_path(&self) -> PathBuf {
        self.sibling("tmp")
    }

    fn sibling(&self, suffix: &str) -> PathBuf {
        let file_name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.path.with_file_name(format!(".{file_name}.{suffix}"))
    }

    fn read_records(&self) -> Result<Records> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Records::new()),
            Err(e) => return Err(e.into()),
        };

        if content.trim().is_empty() {
            return Ok(Records::new());
        }

        Ok(serde_json::from_str(&content)?)
    }

    fn write_records(&self, records: &Records) -> Result<()> {
        let json = serde_json::to_vec_pretty(records)?;

        let tmp_path = self.temp_path();
        let mut tmp = File::create(&tmp_path)?;
        tmp.write_all(&json)?;
        tmp.sync_all()?;
        drop(tmp);

        fs::rename(&tmp_path, &self.path)?;
        sync_parent(&self.path)
    }
}

impl SessionStore for FileSessionStore {
    fn lookup(&self, identity: &Identity) -> Result<Option<ThreadId>> {
        let _guard = StoreLock::shared(&self.lock_path())?;
        let records = self.read_records()?;
        Ok(records.get(identity.as_str()).cloned().map(ThreadId::from))
    }

    fn store(&self, identity: &Identity, thread: &ThreadId) -> Result<()> {
        let _guard = StoreLock::exclusive(&self.lock_path())?;
        let mut records = self.read_records()?;

        if let Some(previous) = records.insert(identity.to_string(), thread.to_string()) {
            if previous != thread.as_str() {
                debug!(%identity, %previous, thread = %thread, "overwriting stored thread");
            }
        }

        self.write_records(&records)
    }

    fn len(&self) -> Result<usize> {
        let _guard = StoreLock::shared(&self.lock_path())?;
        Ok(self.read_records()?.len())
    }
}

fn non_empty_parent(path: &Path) -> Option<&Path> {
    path.parent().filter(|p| !p.as_os_str().is_empty())
}

/// Flush the directory entry written by a rename.
#[cfg(unix)]
fn sync_parent(path: &Path) -> Result<()> {
    let dir = non_empty_parent(path).unwrap_or(Path::new("."));
    File::open(dir)?.sync_all()?;
    Ok(())
}

#[cfg(not(unix))]
fn sync_parent(_path: &Path) -> Result<()> {
    Ok(())
}

/// Advisory lock held for the duration of one store operation.
///
/// Dropping the guard closes the file, which releases the lock. The lock
/// file is left in place: removing it would let a waiter holding the old
/// inode race a newcomer locking a fresh one.
struct StoreLock {
    _file: File,
}

impl StoreLock {
    fn shared(path: &Path) -> Result<Self> {
        let file = Self::open(path)?;
        file.lock_shared()
            .map_err(|e| BridgeError::Store(format!("failed to acquire shared lock: {e}")))?;
        Ok(Self { _file: file })
    }

    fn exclusive(path: &Path) -> Result<Self> {
        let file = Self::open(path)?;
        file.lock_exclusive()
            .map_err(|e| BridgeError::Store(format!("failed to acquire exclusive lock: {e}")))?;
        Ok(Self { _file: file })
    }

    fn open(path: &Path) -> Result<File> {
        Ok(OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?)
    }
}
