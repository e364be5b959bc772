use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex as SyncMutex;
use tokio::sync::Mutex as AsyncMutex;

use crate::models::{ContractItem, HistoryBucket, PublicContract};

/// Generic per-key TTL cache with single-flight coalescing, backing the
/// four memory caches named in SPEC_FULL.md C4: contracts lists, contract
/// items, history, and structure names.
///
/// Coalescing is implemented with one `tokio::Mutex` per key: concurrent
/// callers for the same key serialize on that key's lock, and every caller
/// after the first observes the freshly-populated cache entry without
/// re-fetching.
pub struct TtlCache<K, V> {
    entries: SyncMutex<HashMap<K, (V, Instant)>>,
    locks: SyncMutex<HashMap<K, Arc<AsyncMutex<()>>>>,
    ttl: Duration,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: SyncMutex::new(HashMap::new()),
            locks: SyncMutex::new(HashMap::new()),
            ttl,
        }
    }

    pub fn get(&self, key: &K) -> Option<V> {
        let entries = self.entries.lock();
        let (value, stored_at) = entries.get(key)?;
        (stored_at.elapsed() < self.ttl).then(|| value.clone())
    }

    pub fn put(&self, key: K, value: V) {
        self.entries.lock().insert(key, (value, Instant::now()));
    }

    fn lock_for(&self, key: &K) -> Arc<AsyncMutex<()>> {
        self.locks.lock().entry(key.clone()).or_default().clone()
    }

    /// Fetch-or-populate with single-flight coalescing: concurrent callers
    /// for the same key share one in-flight fetch.
    pub async fn get_or_fetch<F, Fut, E>(&self, key: K, fetch: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<V, E>>,
    {
        if let Some(hit) = self.get(&key) {
            return Ok(hit);
        }

        let lock = self.lock_for(&key);
        let _guard = lock.lock().await;

        // Re-check: another caller may have populated the cache while we
        // waited for the key lock.
        if let Some(hit) = self.get(&key) {
            return Ok(hit);
        }

        let value = fetch().await?;
        self.put(key, value.clone());
        Ok(value)
    }
}

/// Structure (as opposed to catalog station) name cache: structures require
/// an authorized upstream lookup and are cached by id (SPEC_FULL.md §3).
pub type StructureNameCache = Arc<TtlCache<u64, String>>;

/// Per-(region) public contracts index cache.
pub type ContractsListCache = Arc<TtlCache<u32, Vec<PublicContract>>>;

/// Per-contract items cache, batched and single-flighted per contract id.
pub type ContractItemsCache = Arc<TtlCache<u64, Vec<ContractItem>>>;

/// Per-(region, type) history bucket cache, keyed by a composite string.
pub type HistoryCache = Arc<TtlCache<String, Vec<HistoryBucket>>>;

pub fn history_key(region_id: u32, type_id: u32) -> String {
    format!("{region_id}:{type_id}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn concurrent_get_or_fetch_coalesces() {
        let cache: TtlCache<u32, String> = TtlCache::new(Duration::from_secs(60));
        let cache = Arc::new(cache);
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..6 {
            let cache = cache.clone();
            let calls = calls.clone();
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_fetch(1, || {
                        let calls = calls.clone();
                        async move {
                            calls.fetch_add(1, Ordering::SeqCst);
                            tokio::time::sleep(Duration::from_millis(10)).await;
                            Ok::<_, std::convert::Infallible>("value".to_string())
                        }
                    })
                    .await
            }));
        }

        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), "value");
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn expired_entries_are_not_returned() {
        let cache: TtlCache<u32, u32> = TtlCache::new(Duration::from_millis(1));
        cache.put(1, 42);
        std::thread::sleep(Duration::from_millis(10));
        assert_eq!(cache.get(&1), None);
    }
}
