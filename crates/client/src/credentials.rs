//! Persisted auth token.
//!
//! The token lives in a JSON file in the platform config directory:
//!   - Linux: `~/.config/surveilx/session.json`
//!   - macOS: `~/Library/Application Support/surveilx/session.json`
//!   - Windows: `%APPDATA%\surveilx\session.json`
//!
//! Every save and clear is also published on a watch channel, which a
//! [`Session`](crate::Session) can follow.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::error::StorageError;

const APP_DIR: &str = "surveilx";
const FILE_NAME: &str = "session.json";

#[derive(Serialize, Deserialize)]
struct StoredSession {
    token: String,
}

#[derive(Debug)]
pub struct TokenStore {
    path: PathBuf,
    changes: watch::Sender<Option<String>>,
}

impl TokenStore {
    /// Store backed by `dir/session.json`. The directory is created on the
    /// first save.
    pub fn open(dir: impl AsRef<Path>) -> Self {
        let path = dir.as_ref().join(FILE_NAME);
        let current = read_token(&path);
        let (changes, _) = watch::channel(current);
        Self { path, changes }
    }

    /// Store in the platform config directory.
    pub fn default_location() -> Result<Self, StorageError> {
        let config_dir = dirs::config_dir().ok_or(StorageError::NoConfigDir)?;
        Ok(Self::open(config_dir.join(APP_DIR)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Token on disk. A missing or unreadable file means no token.
    pub fn load(&self) -> Option<String> {
        read_token(&self.path)
    }

    /// Persist `token` and announce it. A blank token clears instead.
    pub fn save(&self, token: &str) -> Result<(), StorageError> {
        if token.trim().is_empty() {
            return self.clear();
        }
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let json = serde_json::to_string(&StoredSession {
            token: token.to_string(),
        })?;
        std::fs::write(&self.path, json)?;
        self.changes.send_replace(Some(token.to_string()));
        Ok(())
    }

    pub fn clear(&self) -> Result<(), StorageError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        self.changes.send_replace(None);
        Ok(())
    }

    /// Current token and every later change.
    pub fn watch(&self) -> watch::Receiver<Option<String>> {
        self.changes.subscribe()
    }
}

fn read_token(path: &Path) -> Option<String> {
    let json = match std::fs::read_to_string(path) {
        Ok(json) => json,
        Err(e) if e.kind() == ErrorKind::NotFound => return None,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "failed to read token file");
            return None;
        }
    };
    match serde_json::from_str::<StoredSession>(&json) {
        Ok(stored) if !stored.token.trim().is_empty() => Some(stored.token),
        Ok(_) => None,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "ignoring corrupt token file");
            None
        }
    }
}
