use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info};

pub const DEFAULT_TTL: Duration = Duration::from_secs(14_400); // 4 hours
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(600);

#[derive(Clone)]
struct Entry<V> {
    value: V,
    expires_at: Instant,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub keys: usize,
}

/// In-memory TTL cache, an explicit instance owned by the composition root
/// rather than a process-wide singleton. Expired entries are never served;
/// a background sweep additionally purges them so the map stays bounded.
///
/// Concurrent misses on the same key each run their own producer and the
/// last writer wins. The producer is a fresh fetch either way, so the race
/// costs duplicate work, never a stale read.
pub struct Cache<V> {
    entries: RwLock<HashMap<String, Entry<V>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<V: Clone + Send + Sync + 'static> Cache<V> {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Colon-joined cache key. The parts are taken verbatim; any case or
    /// whitespace canonicalization is the caller's job.
    pub fn key(parts: &[&str]) -> String {
        parts.join(":")
    }

    /// Return the cached value for `key` if present and unexpired, otherwise
    /// run `producer` once and store its result for `ttl`.
    pub async fn get_or_fetch<F, Fut>(&self, key: &str, ttl: Duration, producer: F) -> V
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = V>,
    {
        let now = Instant::now();
        {
            let entries = self.entries.read().await;
            if let Some(entry) = entries.get(key) {
                if entry.expires_at > now {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    debug!(key, "cache hit");
                    return entry.value.clone();
                }
            }
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        debug!(key, "cache miss");

        // The lock is not held across the producer so a slow fetch cannot
        // block unrelated keys; see the type-level note on the miss race.
        let value = producer().await;
        let entry = Entry {
            value: value.clone(),
            expires_at: Instant::now() + ttl,
        };
        self.entries.write().await.insert(key.to_string(), entry);
        value
    }

    pub async fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            keys: self.entries.read().await.len(),
        }
    }

    pub async fn clear(&self) {
        self.entries.write().await.clear();
        info!("cache cleared");
    }

    async fn sweep(&self) {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.expires_at > now);
        let purged = before - entries.len();
        if purged > 0 {
            debug!(purged, remaining = entries.len(), "cache sweep");
        }
    }

    /// Periodic purge of expired entries, independent of lookup traffic.
    /// Runs for the life of the process; dropped with the runtime.
    pub fn spawn_sweeper(self: &Arc<Self>) -> JoinHandle<()> {
        let cache = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
            ticker.tick().await; // immediate first tick
            loop {
                ticker.tick().await;
                cache.sweep().await;
            }
        })
    }
}

impl<V: Clone + Send + Sync + 'static> Default for Cache<V> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counted_producer(
        counter: &Arc<AtomicUsize>,
        value: &'static str,
    ) -> impl FnOnce() -> std::future::Ready<String> {
        let counter = Arc::clone(counter);
        move || {
            counter.fetch_add(1, Ordering::SeqCst);
            std::future::ready(value.to_string())
        }
    }

    #[tokio::test]
    async fn second_lookup_within_ttl_skips_the_producer() {
        let cache: Cache<String> = Cache::new();
        let runs = Arc::new(AtomicUsize::new(0));

        let first = cache
            .get_or_fetch("k", DEFAULT_TTL, counted_producer(&runs, "v1"))
            .await;
        let second = cache
            .get_or_fetch("k", DEFAULT_TTL, counted_producer(&runs, "v2"))
            .await;

        assert_eq!(first, "v1");
        assert_eq!(second, "v1");
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn expired_entry_triggers_a_fresh_fetch() {
        let cache: Cache<String> = Cache::new();
        let runs = Arc::new(AtomicUsize::new(0));
        let ttl = Duration::from_secs(60);

        cache.get_or_fetch("k", ttl, counted_producer(&runs, "v1")).await;
        tokio::time::advance(Duration::from_secs(61)).await;
        let refreshed = cache
            .get_or_fetch("k", ttl, counted_producer(&runs, "v2"))
            .await;

        assert_eq!(refreshed, "v2");
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn expired_entries_are_never_served_even_before_a_sweep() {
        let cache: Cache<String> = Cache::new();
        let runs = Arc::new(AtomicUsize::new(0));
        let ttl = Duration::from_secs(60);

        cache.get_or_fetch("k", ttl, counted_producer(&runs, "v1")).await;
        tokio::time::advance(Duration::from_secs(120)).await;

        // no sweeper running; the entry is still in the map but expired
        assert_eq!(cache.stats().await.keys, 1);
        let value = cache
            .get_or_fetch("k", ttl, counted_producer(&runs, "v2"))
            .await;
        assert_eq!(value, "v2");
    }

    #[tokio::test(start_paused = true)]
    async fn sweeper_purges_expired_entries() {
        let cache: Arc<Cache<String>> = Arc::new(Cache::new());
        let runs = Arc::new(AtomicUsize::new(0));

        cache
            .get_or_fetch("short", Duration::from_secs(30), counted_producer(&runs, "a"))
            .await;
        cache
            .get_or_fetch("long", Duration::from_secs(3600), counted_producer(&runs, "b"))
            .await;

        let sweeper = cache.spawn_sweeper();
        tokio::task::yield_now().await; // let the sweeper arm its interval
        tokio::time::advance(SWEEP_INTERVAL + Duration::from_secs(1)).await;
        tokio::task::yield_now().await;

        assert_eq!(cache.stats().await.keys, 1);
        sweeper.abort();
    }

    #[tokio::test]
    async fn stats_count_hits_and_misses() {
        let cache: Cache<String> = Cache::new();
        let runs = Arc::new(AtomicUsize::new(0));

        cache
            .get_or_fetch("k", DEFAULT_TTL, counted_producer(&runs, "v"))
            .await;
        cache
            .get_or_fetch("k", DEFAULT_TTL, counted_producer(&runs, "v"))
            .await;
        cache
            .get_or_fetch("other", DEFAULT_TTL, counted_producer(&runs, "v"))
            .await;

        let stats = cache.stats().await;
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 2);
        assert_eq!(stats.keys, 2);
    }

    #[tokio::test]
    async fn clear_drops_everything() {
        let cache: Cache<String> = Cache::new();
        let runs = Arc::new(AtomicUsize::new(0));

        cache
            .get_or_fetch("k", DEFAULT_TTL, counted_producer(&runs, "v1"))
            .await;
        cache.clear().await;
        assert_eq!(cache.stats().await.keys, 0);

        cache
            .get_or_fetch("k", DEFAULT_TTL, counted_producer(&runs, "v2"))
            .await;
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn keys_are_colon_joined_verbatim() {
        assert_eq!(Cache::<String>::key(&["search", "Jazz ", "London"]), "search:Jazz :London");
    }
}
