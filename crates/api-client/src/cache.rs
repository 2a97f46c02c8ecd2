//! Read-through cache for GET responses
//!
//! Holds decoded (camelCase) bodies keyed by path and query. The session
//! terminator clears it so no authenticated data outlives the session.

use std::collections::HashMap;
use std::sync::Mutex;

use keycase::Value;
use tracing::debug;

#[derive(Default)]
pub struct ResponseCache {
    entries: Mutex<HashMap<String, Value>>,
}

impl ResponseCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cache key for a GET of `path` with an optional query map.
    pub fn key(path: &str, query: Option<&Value>) -> String {
        match query {
            Some(query) => format!("{path}?{}", query.clone().into_json()),
            None => path.to_string(),
        }
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.lock().get(key).cloned()
    }

    pub fn insert(&self, key: String, value: Value) {
        self.lock().insert(key, value);
    }

    pub fn clear(&self) {
        let mut entries = self.lock();
        debug!(entries = entries.len(), "clearing response cache");
        entries.clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Value>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn keys_include_query() {
        let query = Value::from(json!({"pageSize": 10}));
        assert_eq!(ResponseCache::key("/events/", None), "/events/");
        assert_eq!(
            ResponseCache::key("/events/", Some(&query)),
            r#"/events/?{"pageSize":10}"#
        );
    }

    #[test]
    fn insert_get_clear() {
        let cache = ResponseCache::new();
        cache.insert("/me/".into(), Value::from(json!({"userName": "ann"})));
        assert_eq!(cache.len(), 1);
        assert_eq!(
            cache.get("/me/"),
            Some(Value::from(json!({"userName": "ann"})))
        );

        cache.clear();
        assert!(cache.is_empty());
        assert!(cache.get("/me/").is_none());
    }
}
