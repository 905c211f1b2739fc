use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::models::UserPreferences;

/// Per-entry TTL; a browser-session-scoped cache, so no size bound.
pub const DEFAULT_TTL: Duration = Duration::from_secs(30 * 60);

/// Context fields that affect the model's output. Any difference here must
/// produce a different cache key.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheContext<'a> {
    pub history_last_id: Option<&'a str>,
    pub zen: bool,
    pub prefs: Option<&'a UserPreferences>,
}

/// Deterministic key: normalized prompt text plus a serialization of the
/// full context.
pub fn response_key(prompt: &str, context: &CacheContext<'_>) -> String {
    format!(
        "{}-{}",
        prompt.trim(),
        serde_json::to_string(context).unwrap_or_default()
    )
}

struct Entry<V> {
    value: V,
    expires_at: Instant,
}

/// In-memory key-value store with per-entry expiry. Stale entries are evicted
/// lazily on lookup; capacity is unbounded.
pub struct ResponseCache<V> {
    entries: RwLock<HashMap<String, Entry<V>>>,
}

impl<V: Clone> ResponseCache<V> {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn set(&self, key: &str, value: V) {
        self.set_with_ttl(key, value, DEFAULT_TTL);
    }

    pub fn set_with_ttl(&self, key: &str, value: V, ttl: Duration) {
        self.entries.write().insert(
            key.to_string(),
            Entry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
    }

    pub fn get(&self, key: &str) -> Option<V> {
        let mut entries = self.entries.write();
        match entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl<V: Clone> Default for ResponseCache<V> {
    fn default() -> Self {
        Self::new()
    }
}
