use std::time::{Duration, Instant};

use parking_lot::Mutex;
use std::collections::HashMap;

/// Conditional-request cache keyed by canonical URL (SPEC_FULL.md §4.2,
/// "Conditional caching"). A cached body survives until its `Expires`
/// value; after that it is only reused as a fallback when a refetch fails
/// transiently, never served as a fresh hit.
#[derive(Debug, Default)]
pub struct EtagCache {
    entries: Mutex<HashMap<String, Entry>>,
}

#[derive(Debug, Clone)]
struct Entry {
    etag: Option<String>,
    body: Vec<u8>,
    expires_at: Instant,
}

#[derive(Debug, Clone)]
pub struct CachedBody {
    pub body: Vec<u8>,
    pub stale: bool,
}

impl EtagCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The `If-None-Match` value to send for this URL, if any is cached.
    pub fn etag_for(&self, url: &str) -> Option<String> {
        self.entries.lock().get(url).and_then(|e| e.etag.clone())
    }

    /// A fresh (non-expired) cached body for `url`, if present.
    pub fn fresh(&self, url: &str) -> Option<Vec<u8>> {
        let entries = self.entries.lock();
        let entry = entries.get(url)?;
        (Instant::now() < entry.expires_at).then(|| entry.body.clone())
    }

    /// Any cached body for `url`, marking staleness — used only as a
    /// fallback when a refetch fails transiently, per §4.2.
    pub fn any(&self, url: &str) -> Option<CachedBody> {
        let entries = self.entries.lock();
        let entry = entries.get(url)?;
        Some(CachedBody {
            body: entry.body.clone(),
            stale: Instant::now() >= entry.expires_at,
        })
    }

    pub fn store(&self, url: String, etag: Option<String>, body: Vec<u8>, ttl: Duration) {
        self.entries.lock().insert(
            url,
            Entry {
                etag,
                body,
                expires_at: Instant::now() + ttl,
            },
        );
    }

    /// Refresh only the `Expires` horizon on a `304 Not Modified` — the body
    /// is reused as-is.
    pub fn extend(&self, url: &str, ttl: Duration) {
        if let Some(entry) = self.entries.lock().get_mut(url) {
            entry.expires_at = Instant::now() + ttl;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_returns_none_after_expiry() {
        let cache = EtagCache::new();
        cache.store(
            "https://x/orders".into(),
            Some("abc".into()),
            b"[]".to_vec(),
            Duration::from_millis(1),
        );
        std::thread::sleep(Duration::from_millis(20));
        assert!(cache.fresh("https://x/orders").is_none());
        let stale = cache.any("https://x/orders").unwrap();
        assert!(stale.stale);
    }

    #[test]
    fn etag_round_trips() {
        let cache = EtagCache::new();
        cache.store(
            "https://x/orders".into(),
            Some("W/\"abc\"".into()),
            b"[]".to_vec(),
            Duration::from_secs(60),
        );
        assert_eq!(cache.etag_for("https://x/orders"), Some("W/\"abc\"".into()));
    }
}
