//! Durable key-value storage for the persisted session.
//!
//! | Key             | Value                                 |
//! |-----------------|---------------------------------------|
//! | `token`         | bearer token                          |
//! | `user`          | JSON-serialized [`Principal`]         |
//! | `expires_at`    | RFC 3339 expiry (provider sessions)   |
//! | `refresh_token` | refresh token (provider sessions)     |
//!
//! [`Principal`]: crate::types::Principal

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::errors::{CoreError, Result};

pub const TOKEN_KEY: &str = "token";
pub const USER_KEY: &str = "user";
pub const EXPIRES_AT_KEY: &str = "expires_at";
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";

pub type Entries = BTreeMap<String, String>;

/// Storage backing the session manager.
///
/// `replace` swaps the whole entry set in one step so a reader never observes
/// a token without its principal.
pub trait SessionStore: Send + Sync {
    /// Fails with `Validation` when the stored data cannot be parsed and with
    /// `Storage` when it cannot be read at all.
    fn load(&self) -> Result<Entries>;

    fn replace(&self, entries: Entries) -> Result<()>;

    fn clear(&self) -> Result<()>;
}

/// JSON file on local disk.
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn storage_err(e: impl std::fmt::Display) -> CoreError {
    CoreError::Storage(e.to_string())
}

impl SessionStore for FileSessionStore {
    fn load(&self) -> Result<Entries> {
        match std::fs::read_to_string(&self.path) {
            Ok(raw) => serde_json::from_str(&raw)
                .map_err(|e| CoreError::Validation(format!("malformed session file: {e}"))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Entries::new()),
            Err(e) => Err(storage_err(e)),
        }
    }

    fn replace(&self, entries: Entries) -> Result<()> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).map_err(storage_err)?;
        }
        let raw = serde_json::to_string_pretty(&entries).map_err(storage_err)?;

        // Write-then-rename keeps the previous file intact if we crash mid-write.
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, raw).map_err(storage_err)?;
        std::fs::rename(&tmp, &self.path).map_err(storage_err)
    }

    fn clear(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(storage_err(e)),
        }
    }
}

/// Process-local store, useful for tests and embedding.
#[derive(Default)]
pub struct MemorySessionStore {
    entries: Mutex<Entries>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entries(entries: Entries) -> Self {
        Self {
            entries: Mutex::new(entries),
        }
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self) -> Result<Entries> {
        Ok(self.entries.lock().clone())
    }

    fn replace(&self, entries: Entries) -> Result<()> {
        *self.entries.lock() = entries;
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        self.entries.lock().clear();
        Ok(())
    }
}
