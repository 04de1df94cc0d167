//! In-memory TTL cache with per-key request coalescing.
//!
//! When multiple concurrent requests ask for the same key, only one actually
//! calls the provider; the rest wait on the per-key lock and observe the
//! value it stored. A failed fetch never populates the cache; the error
//! propagates to the caller and the next request retries.
//!
//! Lock discipline: the store uses a parking_lot RwLock held only for map
//! access (never across an await). The per-key coalescing locks are tokio
//! mutexes because they ARE held across the fetch await.

use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::error::DataError;

// Default TTLs by data category (seconds)
pub const TTL_QUOTES: Duration = Duration::from_secs(10);
pub const TTL_OPTIONS: Duration = Duration::from_secs(30);
pub const TTL_IV_ANALYSIS: Duration = Duration::from_secs(30);
pub const TTL_SENTIMENT: Duration = Duration::from_secs(60);
pub const TTL_HISTORY: Duration = Duration::from_secs(60);

type CachedValue = Arc<dyn Any + Send + Sync>;

struct Entry {
    value: CachedValue,
    expire_at: Instant,
}

/// Cache statistics snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub total_entries: usize,
    pub active_entries: usize,
    pub expired_entries: usize,
}

#[derive(Default)]
pub struct TtlCache {
    store: RwLock<HashMap<String, Entry>>,
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl TtlCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn key_lock(&self, key: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock();
        locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    /// Return the cached value or call `fetch`, caching the result.
    ///
    /// Concurrent callers for the same key are coalesced: a lock-free fast
    /// path checks the entry, then the slow path acquires the per-key lock,
    /// re-checks, and only then fetches. Errors from `fetch` propagate and
    /// leave the entry empty.
    pub async fn get_or_fetch<T, F, Fut>(
        &self,
        key: &str,
        ttl: Duration,
        fetch: F,
    ) -> Result<T, DataError>
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, DataError>>,
    {
        // Fast path: no per-key lock
        if let Some(value) = self.get::<T>(key) {
            return Ok(value);
        }

        let lock = self.key_lock(key);
        let _guard = lock.lock().await;

        // Re-check under the lock: a coalesced peer may have populated it
        if let Some(value) = self.get::<T>(key) {
            return Ok(value);
        }

        let value = fetch().await?;
        self.store.write().insert(
            key.to_string(),
            Entry {
                value: Arc::new(value.clone()),
                expire_at: Instant::now() + ttl,
            },
        );
        Ok(value)
    }

    /// Get a cached value without fetching. Expired entries behave as a miss.
    pub fn get<T: Clone + Send + Sync + 'static>(&self, key: &str) -> Option<T> {
        let store = self.store.read();
        let entry = store.get(key)?;
        if entry.expire_at <= Instant::now() {
            return None;
        }
        entry
            .value
            .clone()
            .downcast::<T>()
            .ok()
            .map(|arc| (*arc).clone())
    }

    /// Manually set a cache entry.
    pub fn set<T: Send + Sync + 'static>(&self, key: &str, value: T, ttl: Duration) {
        self.store.write().insert(
            key.to_string(),
            Entry {
                value: Arc::new(value),
                expire_at: Instant::now() + ttl,
            },
        );
    }

    /// Remove a single key. Returns true if it existed.
    pub fn invalidate(&self, key: &str) -> bool {
        self.store.write().remove(key).is_some()
    }

    /// Remove all keys starting with `prefix`. Returns count removed.
    pub fn invalidate_prefix(&self, prefix: &str) -> usize {
        let mut store = self.store.write();
        let before = store.len();
        store.retain(|k, _| !k.starts_with(prefix));
        before - store.len()
    }

    /// Remove all cached entries.
    pub fn clear(&self) {
        self.store.write().clear();
    }

    /// Number of entries, including potentially expired ones.
    pub fn len(&self) -> usize {
        self.store.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.read().is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        let store = self.store.read();
        let now = Instant::now();
        let active = store.values().filter(|e| e.expire_at > now).count();
        CacheStats {
            total_entries: store.len(),
            active_entries: active,
            expired_entries: store.len() - active,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn get_or_fetch_stores_value() {
        let cache = TtlCache::new();
        let calls = AtomicUsize::new(0);

        let result: i64 = cache
            .get_or_fetch("quote:AAPL", TTL_QUOTES, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(100)
            })
            .await
            .unwrap();

        assert_eq!(result, 100);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn second_read_is_cached() {
        let cache = TtlCache::new();
        let calls = AtomicUsize::new(0);

        for _ in 0..2 {
            let v: i64 = cache
                .get_or_fetch("quote:AAPL", TTL_QUOTES, || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(100)
                })
                .await
                .unwrap();
            assert_eq!(v, 100);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn ttl_expiry_refetches() {
        let cache = TtlCache::new();
        let calls = AtomicUsize::new(0);

        let fetch = || async {
            Ok::<usize, DataError>(calls.fetch_add(1, Ordering::SeqCst) + 1)
        };
        let v1: usize = cache
            .get_or_fetch("key", Duration::from_millis(30), fetch)
            .await
            .unwrap();
        assert_eq!(v1, 1);

        tokio::time::sleep(Duration::from_millis(60)).await;

        let v2: usize = cache
            .get_or_fetch("key", Duration::from_millis(30), fetch)
            .await
            .unwrap();
        assert_eq!(v2, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn concurrent_requests_coalesce_to_one_fetch() {
        let cache = Arc::new(TtlCache::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..10 {
            let cache = cache.clone();
            let calls = calls.clone();
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_fetch("q:AAPL", Duration::from_secs(10), || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        Ok(42_i64)
                    })
                    .await
                    .unwrap()
            }));
        }

        for handle in handles {
            assert_eq!(handle.await.unwrap(), 42);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn different_keys_not_coalesced() {
        let cache = TtlCache::new();
        let calls = AtomicUsize::new(0);

        let a: usize = cache
            .get_or_fetch("a", TTL_QUOTES, || async {
                Ok(calls.fetch_add(1, Ordering::SeqCst) + 1)
            })
            .await
            .unwrap();
        let b: usize = cache
            .get_or_fetch("b", TTL_QUOTES, || async {
                Ok(calls.fetch_add(1, Ordering::SeqCst) + 1)
            })
            .await
            .unwrap();

        assert_eq!((a, b), (1, 2));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn fetch_error_is_not_cached() {
        let cache = TtlCache::new();

        let result: Result<i64, _> = cache
            .get_or_fetch("q:X", Duration::from_secs(10), || async {
                Err(DataError::Transport("provider down".into()))
            })
            .await;

        assert!(result.is_err());
        assert_eq!(cache.get::<i64>("q:X"), None);
        assert_eq!(cache.stats().total_entries, 0);
    }

    #[test]
    fn invalidate_and_prefix() {
        let cache = TtlCache::new();
        cache.set("quote:AAPL:US", 1_i64, Duration::from_secs(60));
        cache.set("quote:MSFT:US", 2_i64, Duration::from_secs(60));
        cache.set("iv:AAPL:US", 3_i64, Duration::from_secs(60));

        assert!(cache.invalidate("quote:AAPL:US"));
        assert!(!cache.invalidate("quote:AAPL:US"));

        assert_eq!(cache.invalidate_prefix("quote:"), 1);
        assert_eq!(cache.get::<i64>("quote:MSFT:US"), None);
        assert_eq!(cache.get::<i64>("iv:AAPL:US"), Some(3));
    }

    #[test]
    fn clear_and_stats() {
        let cache = TtlCache::new();
        cache.set("active", 1_i64, Duration::from_secs(60));
        cache.set("expired", 2_i64, Duration::from_secs(0));

        let stats = cache.stats();
        assert_eq!(stats.total_entries, 2);
        assert_eq!(stats.active_entries, 1);
        assert_eq!(stats.expired_entries, 1);

        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn expired_get_is_none() {
        let cache = TtlCache::new();
        cache.set("k", "v".to_string(), Duration::from_secs(0));
        assert_eq!(cache.get::<String>("k"), None);
    }
}
