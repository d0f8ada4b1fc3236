//! Lock-guarded persistence of the single save record.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::lock::{LockError, SaveLock, SaveLockGuard};

/// File holding the persisted record inside the configured save directory.
const SAVE_FILE: &str = "autosync.json";
/// Lock file alongside it, shared with other processes.
const LOCK_FILE: &str = "autosync.lock";

/// The one save record per installation: an opaque blob plus the
/// client-supplied logical "last modified" timestamp.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveRecord {
    #[serde(default)]
    pub date: u64,
    #[serde(default)]
    pub data: String,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Acquiring save lock: {0}")]
    Lock(#[from] LockError),
    #[error("Reading save file: {0}")]
    Read(#[source] io::Error),
    #[error("Decoding save file: {0}")]
    Decode(#[source] serde_json::Error),
    #[error("Encoding save record: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("Writing save file: {0}")]
    Write(#[source] io::Error),
}

/// Access to the persisted save record, gated on the save lock.
///
/// `read` and `write` take a [`SaveLockGuard`] so the type system enforces
/// that the file is only touched while the lock is held.
pub struct SaveStore {
    save_file: PathBuf,
    lock: SaveLock,
}

impl SaveStore {
    pub fn new(save_dir: &Path) -> Self {
        Self {
            save_file: save_dir.join(SAVE_FILE),
            lock: SaveLock::new(save_dir.join(LOCK_FILE)),
        }
    }

    /// Acquires the save lock with a bounded wait.
    pub async fn acquire(&self) -> Result<SaveLockGuard, StoreError> {
        Ok(self.lock.acquire().await?)
    }

    /// Reads the persisted record. A missing file yields the empty record
    /// without creating anything on disk.
    pub fn read(&self, _guard: &SaveLockGuard) -> Result<SaveRecord, StoreError> {
        let bytes = match fs::read(&self.save_file) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Ok(SaveRecord::default());
            }
            Err(err) => return Err(StoreError::Read(err)),
        };
        serde_json::from_slice(&bytes).map_err(StoreError::Decode)
    }

    /// Overwrites the persisted record in full.
    pub fn write(&self, _guard: &SaveLockGuard, record: &SaveRecord) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(record).map_err(StoreError::Encode)?;
        fs::write(&self.save_file, bytes).map_err(StoreError::Write)
    }
}
