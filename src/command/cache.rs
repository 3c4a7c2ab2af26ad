//! Command result caching.
//!
//! # Responsibilities
//! - Memoize pending or completed executions by cache key
//! - Let concurrent duplicates share one in-flight execution
//!
//! # Design Decisions
//! - Values are type-erased; the engine downcasts to `Execution<T>`
//! - In-memory entries expire a fixed time after their last access
//! - Expired entries are swept every `SWEEP_EVERY` writes, not only on shutdown

use std::any::Any;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;

/// Writes between two sweeps of expired entries.
const SWEEP_EVERY: usize = 64;

/// Type-erased cached execution.
pub type CachedExecution = Arc<dyn Any + Send + Sync>;

/// Pluggable key → execution store. Implementations must be thread-safe.
pub trait CommandCache: Send + Sync {
    fn get(&self, key: &str) -> Option<CachedExecution>;

    fn put(&self, key: String, value: CachedExecution);

    /// Release expired entries and background resources.
    fn clean_up(&self);
}

#[derive(Debug)]
struct Entry {
    value: CachedExecution,
    last_access: Instant,
}

/// Cache whose entries expire `retention` after they were last read or written.
#[derive(Debug, Clone)]
pub struct InMemoryCommandCache {
    entries: Arc<DashMap<String, Entry>>,
    writes: Arc<AtomicUsize>,
    retention: Duration,
}

impl InMemoryCommandCache {
    pub fn new(retention: Duration) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            writes: Arc::new(AtomicUsize::new(0)),
            retention,
        }
    }

    pub fn retention(&self) -> Duration {
        self.retention
    }

    /// Number of stored entries, including expired ones not yet cleaned.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Remove every entry not accessed within `retention`. Returns how many went.
    fn sweep(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries
            .retain(|_, e| now.duration_since(e.last_access) < self.retention);
        before.saturating_sub(self.entries.len())
    }
}

impl CommandCache for InMemoryCommandCache {
    fn get(&self, key: &str) -> Option<CachedExecution> {
        let now = Instant::now();
        {
            let mut entry = self.entries.get_mut(key)?;
            if now.duration_since(entry.last_access) < self.retention {
                entry.last_access = now;
                return Some(Arc::clone(&entry.value));
            }
        }
        self.entries
            .remove_if(key, |_, e| now.duration_since(e.last_access) >= self.retention);
        tracing::trace!(key = %key, "Cache entry expired");
        None
    }

    fn put(&self, key: String, value: CachedExecution) {
        self.entries.insert(
            key,
            Entry {
                value,
                last_access: Instant::now(),
            },
        );

        if self.writes.fetch_add(1, Ordering::Relaxed) % SWEEP_EVERY == SWEEP_EVERY - 1 {
            let removed = self.sweep();
            if removed > 0 {
                tracing::trace!(removed, "Expired cache entries swept");
            }
        }
    }

    fn clean_up(&self) {
        let removed = self.sweep();
        if removed > 0 {
            tracing::debug!(removed, "Expired cache entries cleaned up");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn value(v: u32) -> CachedExecution {
        Arc::new(v)
    }

    fn read(cache: &InMemoryCommandCache, key: &str) -> Option<u32> {
        cache.get(key).and_then(|v| v.downcast_ref::<u32>().copied())
    }

    #[test]
    fn test_put_and_get() {
        let cache = InMemoryCommandCache::new(Duration::from_secs(60));
        cache.put("a".into(), value(1));

        assert_eq!(read(&cache, "a"), Some(1));
        assert_eq!(read(&cache, "b"), None);
    }

    #[test]
    fn test_entries_expire_after_access() {
        let cache = InMemoryCommandCache::new(Duration::from_millis(150));
        cache.put("a".into(), value(1));

        std::thread::sleep(Duration::from_millis(90));
        // access refreshes the entry
        assert_eq!(read(&cache, "a"), Some(1));
        std::thread::sleep(Duration::from_millis(90));
        assert_eq!(read(&cache, "a"), Some(1));

        std::thread::sleep(Duration::from_millis(250));
        assert_eq!(read(&cache, "a"), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_writes_sweep_expired_entries() {
        let cache = InMemoryCommandCache::new(Duration::from_millis(40));
        for i in 0..1000 {
            cache.put(format!("old-{i}"), value(i));
        }
        assert!(!cache.is_empty());
        std::thread::sleep(Duration::from_millis(120));

        for i in 0..1000 {
            cache.put(format!("new-{i}"), value(i));
        }
        // at most the writes since the last sweep survive, none of the old keys
        assert!(cache.len() <= 1000);
        assert!(cache.entries.iter().all(|e| e.key().starts_with("new-")));
    }

    #[test]
    fn test_clean_up_drops_expired() {
        let cache = InMemoryCommandCache::new(Duration::from_millis(10));
        cache.put("a".into(), value(1));
        cache.put("b".into(), value(2));
        std::thread::sleep(Duration::from_millis(30));

        cache.clean_up();
        assert!(cache.is_empty());
    }
}
