// ABOUTME: Versioned shared state store for inter-task communication
// ABOUTME: Provides an audited, serializable-only key/value store shared across tasks

pub mod error;

pub use error::{ContextError, Result};

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::RwLock;

/// A single audit record: who set which key to what, and when.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextEntry {
    pub key: String,
    pub value: Value,
    pub actor: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct ContextInner {
    store: IndexMap<String, Value>,
    history: Vec<ContextEntry>,
}

/// Thread-safe, versioned key/value store restricted to serializable values.
///
/// Keys are dot-namespaced strings (`"stage.result"`). Every mutation appends
/// an audit entry before the value is published, under the same write lock, so
/// a reader observing a value always finds its corresponding history entry.
/// Cloning shares the underlying store.
#[derive(Debug, Clone, Default)]
pub struct SharedContext {
    inner: Arc<RwLock<ContextInner>>,
}

impl SharedContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `key` to `value`, recording `actor` in the audit trail.
    ///
    /// The value must serialize to JSON; anything `serde_json::to_value`
    /// rejects fails with [`ContextError::InvalidValue`] and leaves both the
    /// store and the history untouched.
    pub async fn set<V>(&self, key: impl Into<String>, value: V, actor: &str) -> Result<()>
    where
        V: Serialize,
    {
        let key = key.into();
        let value = serde_json::to_value(value).map_err(|e| ContextError::InvalidValue {
            key: key.clone(),
            reason: e.to_string(),
        })?;

        let mut inner = self.inner.write().await;
        inner.history.push(ContextEntry {
            key: key.clone(),
            value: value.clone(),
            actor: actor.to_string(),
            timestamp: Utc::now(),
        });
        inner.store.insert(key, value);

        Ok(())
    }

    /// Get the current value for `key`, if any. Never fails.
    pub async fn get(&self, key: &str) -> Option<Value> {
        let inner = self.inner.read().await;
        inner.store.get(key).cloned()
    }

    /// Get the current value for `key`, or `default` when unset.
    pub async fn get_or(&self, key: &str, default: Value) -> Value {
        self.get(key).await.unwrap_or(default)
    }

    pub async fn contains(&self, key: &str) -> bool {
        let inner = self.inner.read().await;
        inner.store.contains_key(key)
    }

    /// Number of mutations recorded so far.
    pub async fn version(&self) -> usize {
        let inner = self.inner.read().await;
        inner.history.len()
    }

    /// The ordered audit trail, optionally filtered to a single key.
    pub async fn history(&self, key: Option<&str>) -> Vec<ContextEntry> {
        let inner = self.inner.read().await;
        match key {
            Some(key) => inner
                .history
                .iter()
                .filter(|entry| entry.key == key)
                .cloned()
                .collect(),
            None => inner.history.clone(),
        }
    }

    /// Audit entries appended after the given version, in order.
    pub async fn history_since(&self, version: usize) -> Vec<ContextEntry> {
        let inner = self.inner.read().await;
        inner.history.iter().skip(version).cloned().collect()
    }

    /// Remove all current values. The only deletion path; the audit trail is
    /// preserved.
    pub async fn clear(&self) {
        let mut inner = self.inner.write().await;
        inner.store.clear();
    }

    /// Snapshot of the current store in insertion order, for export to
    /// persistence or reporting collaborators.
    pub async fn to_map(&self) -> IndexMap<String, Value> {
        let inner = self.inner.read().await;
        inner.store.clone()
    }

    pub async fn len(&self) -> usize {
        let inner = self.inner.read().await;
        inner.store.len()
    }

    pub async fn is_empty(&self) -> bool {
        let inner = self.inner.read().await;
        inner.store.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::ser::Error as SerError;
    use serde_json::json;

    struct Unserializable;

    impl Serialize for Unserializable {
        fn serialize<S>(&self, _serializer: S) -> std::result::Result<S::Ok, S::Error>
        where
            S: serde::Serializer,
        {
            Err(S::Error::custom("refuses to serialize"))
        }
    }

    #[tokio::test]
    async fn test_set_and_get() {
        let context = SharedContext::new();

        context.set("stage.result", json!(42), "stage").await.unwrap();

        assert_eq!(context.get("stage.result").await, Some(json!(42)));
        assert_eq!(context.get("missing").await, None);
        assert_eq!(context.get_or("missing", json!("fallback")).await, json!("fallback"));
    }

    #[tokio::test]
    async fn test_history_records_every_successful_set() {
        let context = SharedContext::new();

        context.set("a", json!(1), "first").await.unwrap();
        context.set("b", json!(2), "second").await.unwrap();
        context.set("a", json!(3), "third").await.unwrap();

        let history = context.history(None).await;
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].actor, "first");
        assert_eq!(history[2].key, "a");
        assert_eq!(history[2].value, json!(3));

        let filtered = context.history(Some("a")).await;
        assert_eq!(filtered.len(), 2);
        assert_eq!(context.version().await, 3);
    }

    #[tokio::test]
    async fn test_invalid_value_leaves_store_and_history_untouched() {
        let context = SharedContext::new();
        context.set("kept", json!(true), "setup").await.unwrap();

        let result = context.set("bad", Unserializable, "writer").await;
        assert!(matches!(result, Err(ContextError::InvalidValue { .. })));

        assert_eq!(context.len().await, 1);
        assert_eq!(context.version().await, 1);
        assert!(!context.contains("bad").await);
    }

    #[tokio::test]
    async fn test_clear_empties_store_but_keeps_history() {
        let context = SharedContext::new();
        context.set("a", json!(1), "writer").await.unwrap();
        context.set("b", json!(2), "writer").await.unwrap();

        context.clear().await;

        assert!(context.is_empty().await);
        assert_eq!(context.history(None).await.len(), 2);
    }

    #[tokio::test]
    async fn test_clone_shares_state() {
        let context = SharedContext::new();
        let shared = context.clone();

        context.set("seen", json!("yes"), "a").await.unwrap();

        assert_eq!(shared.get("seen").await, Some(json!("yes")));
    }

    #[tokio::test]
    async fn test_to_map_snapshot() {
        let context = SharedContext::new();
        context.set("x", json!(1), "w").await.unwrap();
        context.set("y", json!(2), "w").await.unwrap();

        let map = context.to_map().await;
        let keys: Vec<_> = map.keys().cloned().collect();
        assert_eq!(keys, vec!["x", "y"]);
    }

    #[tokio::test]
    async fn test_history_since() {
        let context = SharedContext::new();
        context.set("a", json!(1), "w").await.unwrap();
        let version = context.version().await;
        context.set("b", json!(2), "w").await.unwrap();

        let delta = context.history_since(version).await;
        assert_eq!(delta.len(), 1);
        assert_eq!(delta[0].key, "b");
    }
}
