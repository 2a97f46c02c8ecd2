//! Access/refresh token pair and the cached token store
//!
//! `TokenStore::get()` is on the hot path of every request, so the access
//! token is cached in-process. On a cache miss the persisted store is read:
//! first the structured session blob, then the flat `accessToken` key.

use std::sync::Arc;

use common::Secret;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::constants::{ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, SESSION_BLOB_KEY};
use crate::error::Result;
use crate::persist::PersistentStore;

/// The credential pair issued by login and by every renewal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialPair {
    pub access: Secret<String>,
    pub refresh: Secret<String>,
}

impl CredentialPair {
    pub fn new(access: impl Into<String>, refresh: impl Into<String>) -> Self {
        Self {
            access: Secret::new(access.into()),
            refresh: Secret::new(refresh.into()),
        }
    }
}

/// Access token cache over a persisted store.
pub struct TokenStore {
    cache: RwLock<Option<Secret<String>>>,
    persisted: Arc<PersistentStore>,
}

impl TokenStore {
    pub fn new(persisted: Arc<PersistentStore>) -> Self {
        Self {
            cache: RwLock::new(None),
            persisted,
        }
    }

    /// Current access token, if any. Never fails: unreadable persisted
    /// values are logged and treated as absent.
    pub async fn get(&self) -> Option<Secret<String>> {
        if let Some(token) = self.cache.read().await.as_ref() {
            return Some(token.clone());
        }

        let token = match self.read_blob_field("accessToken").await {
            Some(token) => Some(token),
            None => self.read_flat(ACCESS_TOKEN_KEY).await,
        }?;
        debug!("access token cache populated from persisted store");
        let token = Secret::new(token);
        *self.cache.write().await = Some(token.clone());
        Some(token)
    }

    /// Replace the access token. `None` clears both cache and persisted key.
    /// A session blob, when present, is updated too: `get()` reads it before
    /// the flat key.
    pub async fn set(&self, token: Option<&str>) -> Result<()> {
        match token {
            Some(token) => {
                *self.cache.write().await = Some(Secret::from(token));
                self.persisted
                    .set(ACCESS_TOKEN_KEY, Value::String(token.to_string()))
                    .await?;
                self.write_blob_field("accessToken", Some(token)).await
            }
            None => self.clear().await,
        }
    }

    /// Remove the persisted access token entirely, including the copy inside
    /// the session blob, so the fallback read cannot bring it back. The
    /// refresh token is left alone.
    pub async fn clear(&self) -> Result<()> {
        *self.cache.write().await = None;
        self.persisted.remove(&[ACCESS_TOKEN_KEY]).await?;
        self.write_blob_field("accessToken", None).await
    }

    /// Stored refresh token, flat key first, then the session blob.
    pub async fn refresh_token(&self) -> Option<Secret<String>> {
        match self.read_flat(REFRESH_TOKEN_KEY).await {
            Some(token) => Some(Secret::new(token)),
            None => self.read_blob_field("refreshToken").await.map(Secret::new),
        }
    }

    pub async fn set_refresh_token(&self, token: Option<&str>) -> Result<()> {
        match token {
            Some(token) => {
                self.persisted
                    .set(REFRESH_TOKEN_KEY, Value::String(token.to_string()))
                    .await?;
                self.write_blob_field("refreshToken", Some(token)).await
            }
            None => {
                self.persisted.remove(&[REFRESH_TOKEN_KEY]).await?;
                self.write_blob_field("refreshToken", None).await
            }
        }
    }

    /// Persist a freshly issued pair.
    pub async fn store_pair(&self, pair: &CredentialPair) -> Result<()> {
        self.set(Some(pair.access.expose_str())).await?;
        self.set_refresh_token(Some(pair.refresh.expose_str())).await
    }

    async fn read_flat(&self, key: &str) -> Option<String> {
        match self.persisted.get(key).await? {
            Value::String(s) if !s.is_empty() => Some(s),
            Value::String(_) | Value::Null => None,
            other => {
                warn!(key, kind = json_kind(&other), "ignoring non-string token value");
                None
            }
        }
    }

    /// Read `state.<field>` (or top-level `<field>`) from the session blob.
    /// The blob may be stored as an object or as its JSON text.
    async fn read_blob_field(&self, field: &str) -> Option<String> {
        let blob = match self.persisted.get(SESSION_BLOB_KEY).await? {
            Value::String(text) => match serde_json::from_str::<Value>(&text) {
                Ok(parsed) => parsed,
                Err(e) => {
                    warn!(error = %e, "session blob is not valid JSON, ignoring");
                    return None;
                }
            },
            other => other,
        };
        blob.get("state")
            .and_then(|state| state.get(field))
            .or_else(|| blob.get(field))
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    }

    /// Replace or drop `field` in the session blob, keeping the rest of the
    /// blob in the form it was stored in. A new value goes under `state`
    /// when the blob has one, and at the top level only where the field
    /// already lives. Without a blob this is a no-op.
    async fn write_blob_field(&self, field: &str, token: Option<&str>) -> Result<()> {
        let Some(stored) = self.persisted.get(SESSION_BLOB_KEY).await else {
            return Ok(());
        };
        let (mut blob, as_text) = match stored {
            Value::String(text) => match serde_json::from_str::<Value>(&text) {
                Ok(parsed) => (parsed, true),
                // Never readable, nothing worth keeping.
                Err(_) => return self.persisted.remove(&[SESSION_BLOB_KEY]).await,
            },
            other => (other, false),
        };

        match token {
            Some(token) => {
                if let Some(state) = blob.get_mut("state").and_then(Value::as_object_mut) {
                    state.insert(field.to_string(), Value::String(token.to_string()));
                }
                if let Some(top) = blob.as_object_mut()
                    && top.contains_key(field)
                {
                    top.insert(field.to_string(), Value::String(token.to_string()));
                }
            }
            None => {
                if let Some(state) = blob.get_mut("state").and_then(Value::as_object_mut) {
                    state.remove(field);
                }
                if let Some(top) = blob.as_object_mut() {
                    top.remove(field);
                }
            }
        }

        let stored = if as_text {
            Value::String(blob.to_string())
        } else {
            blob
        };
        self.persisted.set(SESSION_BLOB_KEY, stored).await
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn memory_store() -> (Arc<PersistentStore>, TokenStore) {
        let persisted = Arc::new(PersistentStore::in_memory());
        (persisted.clone(), TokenStore::new(persisted))
    }

    #[tokio::test]
    async fn empty_store_returns_none() {
        let (_, store) = memory_store();
        assert!(store.get().await.is_none());
        assert!(store.refresh_token().await.is_none());
    }

    #[tokio::test]
    async fn set_then_get_roundtrips_through_cache_and_disk() {
        let (persisted, store) = memory_store();
        store.set(Some("at_1")).await.unwrap();
        assert_eq!(store.get().await.unwrap().expose_str(), "at_1");
        assert_eq!(persisted.get(ACCESS_TOKEN_KEY).await, Some(json!("at_1")));
    }

    #[tokio::test]
    async fn cache_miss_prefers_session_blob_over_flat_key() {
        let (persisted, store) = memory_store();
        persisted.set(ACCESS_TOKEN_KEY, json!("at_flat")).await.unwrap();
        persisted
            .set(SESSION_BLOB_KEY, json!({"state": {"accessToken": "at_blob"}}))
            .await
            .unwrap();
        assert_eq!(store.get().await.unwrap().expose_str(), "at_blob");
    }

    #[tokio::test]
    async fn session_blob_stored_as_json_text_is_parsed() {
        let (persisted, store) = memory_store();
        persisted
            .set(
                SESSION_BLOB_KEY,
                json!(r#"{"state":{"accessToken":"at_text","refreshToken":"rt_text"}}"#),
            )
            .await
            .unwrap();
        assert_eq!(store.get().await.unwrap().expose_str(), "at_text");
        assert_eq!(store.refresh_token().await.unwrap().expose_str(), "rt_text");
    }

    #[tokio::test]
    async fn cache_miss_falls_back_to_flat_key() {
        let (persisted, store) = memory_store();
        persisted.set(ACCESS_TOKEN_KEY, json!("at_flat")).await.unwrap();
        persisted.set(SESSION_BLOB_KEY, json!("{broken")).await.unwrap();
        assert_eq!(store.get().await.unwrap().expose_str(), "at_flat");
    }

    #[tokio::test]
    async fn non_string_token_is_ignored() {
        let (persisted, store) = memory_store();
        persisted.set(ACCESS_TOKEN_KEY, json!(42)).await.unwrap();
        assert!(store.get().await.is_none());
    }

    #[tokio::test]
    async fn cached_value_wins_over_later_disk_changes() {
        let (persisted, store) = memory_store();
        store.set(Some("at_cached")).await.unwrap();
        persisted.set(ACCESS_TOKEN_KEY, json!("at_other")).await.unwrap();
        assert_eq!(store.get().await.unwrap().expose_str(), "at_cached");
    }

    #[tokio::test]
    async fn set_none_clears_cache_and_disk() {
        let (persisted, store) = memory_store();
        store.set(Some("at_1")).await.unwrap();
        store.set(None).await.unwrap();
        assert!(store.get().await.is_none());
        assert!(persisted.get(ACCESS_TOKEN_KEY).await.is_none());
    }

    #[tokio::test]
    async fn clear_scrubs_blob_access_token_but_keeps_refresh_token() {
        let (persisted, store) = memory_store();
        persisted
            .set(
                SESSION_BLOB_KEY,
                json!({"state": {"accessToken": "at_blob", "refreshToken": "rt_blob", "user": "ann"}}),
            )
            .await
            .unwrap();
        store.set(Some("at_1")).await.unwrap();

        store.clear().await.unwrap();

        assert!(store.get().await.is_none());
        assert_eq!(
            persisted.get(SESSION_BLOB_KEY).await,
            Some(json!({"state": {"refreshToken": "rt_blob", "user": "ann"}}))
        );
        assert_eq!(store.refresh_token().await.unwrap().expose_str(), "rt_blob");
    }

    #[tokio::test]
    async fn clearing_refresh_token_scrubs_text_blob() {
        let (persisted, store) = memory_store();
        store.set_refresh_token(Some("rt_flat")).await.unwrap();
        persisted
            .set(
                SESSION_BLOB_KEY,
                json!(r#"{"state":{"accessToken":"at_text","refreshToken":"rt_text"}}"#),
            )
            .await
            .unwrap();

        store.set_refresh_token(None).await.unwrap();

        assert!(store.refresh_token().await.is_none());
        let Some(Value::String(text)) = persisted.get(SESSION_BLOB_KEY).await else {
            panic!("blob should stay JSON text");
        };
        let blob: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(blob, json!({"state": {"accessToken": "at_text"}}));
    }

    #[tokio::test]
    async fn stored_pair_shadows_stale_blob_after_restart() {
        let persisted = Arc::new(PersistentStore::in_memory());
        persisted
            .set(
                SESSION_BLOB_KEY,
                json!({"state": {"accessToken": "at_old", "refreshToken": "rt_old", "user": "ann"}}),
            )
            .await
            .unwrap();

        TokenStore::new(persisted.clone())
            .store_pair(&CredentialPair::new("at_new", "rt_new"))
            .await
            .unwrap();

        // Fresh cache over the same persisted state, as after a process restart.
        let cold = TokenStore::new(persisted.clone());
        assert_eq!(cold.get().await.unwrap().expose_str(), "at_new");
        assert_eq!(cold.refresh_token().await.unwrap().expose_str(), "rt_new");
        assert_eq!(
            persisted.get(SESSION_BLOB_KEY).await,
            Some(json!({"state": {"accessToken": "at_new", "refreshToken": "rt_new", "user": "ann"}}))
        );
    }

    #[tokio::test]
    async fn set_updates_text_blob_and_top_level_field() {
        let (persisted, store) = memory_store();
        persisted
            .set(SESSION_BLOB_KEY, json!(r#"{"accessToken":"at_old","theme":"dark"}"#))
            .await
            .unwrap();

        store.set(Some("at_new")).await.unwrap();

        let Some(Value::String(text)) = persisted.get(SESSION_BLOB_KEY).await else {
            panic!("blob should stay JSON text");
        };
        let blob: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(blob, json!({"accessToken": "at_new", "theme": "dark"}));
        assert_eq!(
            TokenStore::new(persisted).get().await.unwrap().expose_str(),
            "at_new"
        );
    }

    #[tokio::test]
    async fn set_without_blob_writes_only_flat_key() {
        let (persisted, store) = memory_store();
        store.set(Some("at_1")).await.unwrap();
        assert!(persisted.get(SESSION_BLOB_KEY).await.is_none());
    }

    #[tokio::test]
    async fn unreadable_blob_is_dropped_on_clear() {
        let (persisted, store) = memory_store();
        persisted.set(SESSION_BLOB_KEY, json!("{broken")).await.unwrap();
        store.clear().await.unwrap();
        assert!(persisted.get(SESSION_BLOB_KEY).await.is_none());
    }

    #[tokio::test]
    async fn tokens_persist_across_store_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");

        let first = TokenStore::new(Arc::new(PersistentStore::load(path.clone()).await.unwrap()));
        first
            .store_pair(&CredentialPair::new("at_disk", "rt_disk"))
            .await
            .unwrap();

        let second = TokenStore::new(Arc::new(PersistentStore::load(path).await.unwrap()));
        assert_eq!(second.get().await.unwrap().expose_str(), "at_disk");
        assert_eq!(second.refresh_token().await.unwrap().expose_str(), "rt_disk");
    }

    #[test]
    fn credential_pair_debug_is_redacted() {
        let pair = CredentialPair::new("at_secret", "rt_secret");
        let debug = format!("{pair:?}");
        assert!(!debug.contains("at_secret"));
        assert!(!debug.contains("rt_secret"));
    }
}
