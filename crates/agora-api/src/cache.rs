use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use lru::LruCache;
use serde_json::Value;
use tracing::debug;

const DEFAULT_CAPACITY: usize = 256;
const DEFAULT_TTL: Duration = Duration::from_secs(60);

struct Entry {
    value: Value,
    inserted: Instant,
}

/// Path-keyed cache of rendered list pages. Mutating handlers invalidate
/// the paths that rendered the mutated resource, so a page is served
/// stale for at most the TTL after an external write and never after a
/// write that went through this process.
pub struct ViewCache {
    inner: Mutex<LruCache<String, Entry>>,
    ttl: Duration,
}

impl ViewCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).expect("non-zero capacity");
        Self {
            inner: Mutex::new(LruCache::new(capacity)),
            ttl,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(DEFAULT_CAPACITY, DEFAULT_TTL)
    }

    pub fn get(&self, path: &str) -> Option<Value> {
        let mut cache = self.inner.lock().ok()?;
        match cache.get(path) {
            Some(entry) if entry.inserted.elapsed() < self.ttl => Some(entry.value.clone()),
            Some(_) => {
                cache.pop(path);
                None
            }
            None => None,
        }
    }

    pub fn put(&self, path: &str, value: Value) {
        if let Ok(mut cache) = self.inner.lock() {
            cache.put(
                path.to_string(),
                Entry {
                    value,
                    inserted: Instant::now(),
                },
            );
        }
    }

    pub fn invalidate(&self, path: &str) {
        if let Ok(mut cache) = self.inner.lock() {
            cache.pop(path);
        }
    }

    /// Drop every cached page whose path starts with `prefix` — e.g. all
    /// pagination pages of a list after one of its rows changed.
    pub fn invalidate_prefix(&self, prefix: &str) {
        let Ok(mut cache) = self.inner.lock() else {
            return;
        };
        let stale: Vec<String> = cache
            .iter()
            .map(|(path, _)| path)
            .filter(|path| path.starts_with(prefix))
            .cloned()
            .collect();
        for path in &stale {
            cache.pop(path);
        }
        if !stale.is_empty() {
            debug!("invalidated {} cached view(s) under {}", stale.len(), prefix);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn get_after_put_and_invalidate() {
        let cache = ViewCache::with_defaults();
        cache.put("/posts?page=1", json!({"posts": []}));

        assert!(cache.get("/posts?page=1").is_some());
        cache.invalidate("/posts?page=1");
        assert!(cache.get("/posts?page=1").is_none());
    }

    #[test]
    fn prefix_invalidation_spares_other_paths() {
        let cache = ViewCache::with_defaults();
        cache.put("/posts?page=1", json!(1));
        cache.put("/posts?page=2", json!(2));
        cache.put("/chats?user=alice", json!(3));

        cache.invalidate_prefix("/posts");

        assert!(cache.get("/posts?page=1").is_none());
        assert!(cache.get("/posts?page=2").is_none());
        assert!(cache.get("/chats?user=alice").is_some());
    }

    #[test]
    fn entries_expire_after_ttl() {
        let cache = ViewCache::new(8, Duration::from_millis(0));
        cache.put("/posts?page=1", json!(1));
        assert!(cache.get("/posts?page=1").is_none());
    }

    #[test]
    fn capacity_evicts_least_recent() {
        let cache = ViewCache::new(1, Duration::from_secs(60));
        cache.put("/a", json!(1));
        cache.put("/b", json!(2));
        assert!(cache.get("/a").is_none());
        assert!(cache.get("/b").is_some());
    }
}
