//! Persisted key/value store backing the token cache
//!
//! A JSON object file mapping keys to arbitrary JSON values. The whole file is
//! mirrored in memory; every mutation rewrites it atomically (temp file +
//! rename). A tokio Mutex serializes writers so a renewal landing mid-logout
//! cannot interleave two rewrites.

use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::{Error, Result};

pub struct PersistentStore {
    /// `None` keeps everything in memory (ephemeral sessions, tests).
    path: Option<PathBuf>,
    state: Mutex<Map<String, Value>>,
}

impl PersistentStore {
    /// Load the store from `path`.
    ///
    /// A missing file is a cold start: the file is created as `{}`.
    pub async fn load(path: PathBuf) -> Result<Self> {
        let state = if path.exists() {
            let contents = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| Error::Io(format!("reading session file: {e}")))?;
            let map: Map<String, Value> = serde_json::from_str(&contents)
                .map_err(|e| Error::CredentialParse(format!("parsing session file: {e}")))?;
            info!(path = %path.display(), keys = map.len(), "loaded session store");
            map
        } else {
            info!(path = %path.display(), "session file not found, starting with empty store");
            let map = Map::new();
            write_atomic(&path, &map).await?;
            map
        };

        Ok(Self {
            path: Some(path),
            state: Mutex::new(state),
        })
    }

    /// A store that never touches the filesystem.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            state: Mutex::new(Map::new()),
        }
    }

    pub async fn get(&self, key: &str) -> Option<Value> {
        let state = self.state.lock().await;
        state.get(key).cloned()
    }

    /// Insert or replace a key and persist.
    pub async fn set(&self, key: &str, value: Value) -> Result<()> {
        let mut state = self.state.lock().await;
        state.insert(key.to_string(), value);
        debug!(key, "stored key");
        self.persist(&state).await
    }

    /// Remove keys and persist once. Keys that are absent are ignored.
    pub async fn remove(&self, keys: &[&str]) -> Result<()> {
        let mut state = self.state.lock().await;
        let mut changed = false;
        for key in keys {
            changed |= state.remove(*key).is_some();
        }
        if changed {
            debug!(?keys, "removed keys");
            self.persist(&state).await?;
        }
        Ok(())
    }

    async fn persist(&self, state: &Map<String, Value>) -> Result<()> {
        match &self.path {
            Some(path) => write_atomic(path, state).await,
            None => Ok(()),
        }
    }
}

/// Write the store to a file atomically, mode 0600 on unix since it holds tokens.
async fn write_atomic(path: &Path, data: &Map<String, Value>) -> Result<()> {
    let json = serde_json::to_string_pretty(data)
        .map_err(|e| Error::CredentialParse(format!("serializing session store: {e}")))?;

    let dir = path
        .parent()
        .ok_or_else(|| Error::Io("session path has no parent directory".into()))?;

    let tmp_path = dir.join(format!(".session.tmp.{}", std::process::id()));

    tokio::fs::write(&tmp_path, json.as_bytes())
        .await
        .map_err(|e| Error::Io(format!("writing temp session file: {e}")))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        tokio::fs::set_permissions(&tmp_path, perms)
            .await
            .map_err(|e| Error::Io(format!("setting session file permissions: {e}")))?;
    }

    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| Error::Io(format!("renaming temp session file: {e}")))?;

    debug!(path = %path.display(), "persisted session store");
    Ok(())
}
