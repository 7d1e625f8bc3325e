//! TTL cache for upstream JSON responses.

use dashmap::DashMap;
use serde_json::Value;
use std::time::Duration;
use tokio::time::Instant;

struct Entry {
    stored: Instant,
    ttl: Duration,
    value: Value,
}

/// Response cache keyed by request path. Entries carry their own TTL so
/// fast-moving data (spot prices) and slow-moving data (charts, trending)
/// share one map.
#[derive(Default)]
pub struct ResponseCache {
    entries: DashMap<String, Entry>,
}

impl ResponseCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch a cached value if it is still fresh. Stale entries are evicted
    /// on access.
    pub fn get(&self, key: &str) -> Option<Value> {
        let fresh = match self.entries.get(key) {
            Some(entry) => {
                if entry.stored.elapsed() < entry.ttl {
                    return Some(entry.value.clone());
                }
                false
            }
            None => return None,
        };
        if !fresh {
            self.entries.remove(key);
        }
        None
    }

    pub fn put(&self, key: impl Into<String>, value: Value, ttl: Duration) {
        self.entries.insert(
            key.into(),
            Entry {
                stored: Instant::now(),
                ttl,
                value,
            },
        );
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }
}
