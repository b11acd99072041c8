//! Chunk cache engine
//!
//! Sits between the query layer and the slow backing store. Query paths
//! call [`ChunkCache::search`] to collect whatever contiguous chunks are
//! cached around a time range; ingestion and post-fetch paths call
//! [`ChunkCache::add`]. The cache is never authoritative: a search result
//! that is not complete tells the caller which sub-range still has to be
//! fetched from the store.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                         ChunkCache                           │
//! ├──────────────────────────────────────────────────────────────┤
//! │  RwLock<HashMap<MetricKey, MetricEntry>>   (hot lookup path) │
//! │        │                                                     │
//! │        │ add / search hits                                   │
//! │        ▼                                                     │
//! │  Accountant (sizes, LRU recency, byte ceiling)               │
//! │        │                                                     │
//! │        │ evict stream (ordered victims)                      │
//! │        ▼                                                     │
//! │  eviction worker (single task, short write locks)            │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use chunk_cache::{CacheConfig, ChunkCache, ChunkRef};
//!
//! # async fn example() {
//! let cache = ChunkCache::new(CacheConfig::default());
//!
//! cache.add(1, 0, ChunkRef::new(1000, 600, vec![0u8; 512].into()));
//!
//! let res = cache.search(1, 1000, 1300);
//! if !res.complete {
//!     // fetch the uncovered sub-range from the backing store,
//!     // then insert the fetched chunks via add()
//! }
//!
//! cache.stop().await;
//! # }
//! ```

mod metric;

use crate::accounting::{Accountant, CacheStats, EvictTarget, StatsSnapshot};
use crate::config::CacheConfig;
use crate::metrics;
use crate::types::{ChunkRef, MetricKey, Ts};
use metric::MetricEntry;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Outcome of a range search
///
/// `start` is the cached contiguous prefix of the window in chronological
/// order; `end` is the cached contiguous suffix in reverse-chronological
/// order (closest to `until` first). When `complete` is true the two runs
/// meet or overlap and the whole `[from, until)` window is covered.
/// `from` and `until` echo the request so the caller can compute what is
/// left to fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchResult {
    /// Requested window start, echoed
    pub from: Ts,

    /// Requested window end, echoed
    pub until: Ts,

    /// Whether `start` and `end` together cover the whole window
    pub complete: bool,

    /// Cached prefix, chronological
    pub start: Vec<ChunkRef>,

    /// Cached suffix, reverse-chronological
    pub end: Vec<ChunkRef>,
}

impl SearchResult {
    pub(crate) fn new(from: Ts, until: Ts) -> Self {
        Self {
            from,
            until,
            complete: false,
            start: Vec::new(),
            end: Vec::new(),
        }
    }
}

/// Concurrent chunk cache with a global byte budget
///
/// Any number of concurrent searchers and adders are supported; one
/// background task applies the accountant's eviction decisions. All
/// entry state is mutated under the write side of a single
/// readers-writer lock, so a search works on a consistent snapshot of a
/// metric's chunks for as long as it holds the read guard.
pub struct ChunkCache {
    /// One entry per metric with at least one resident chunk
    entries: Arc<RwLock<HashMap<MetricKey, MetricEntry>>>,

    /// Size and recency accounting, source of eviction targets
    accnt: Arc<Accountant>,

    /// Eviction worker handle, taken by `stop`
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl ChunkCache {
    /// Create a cache and spawn its eviction worker
    ///
    /// Must be called within a Tokio runtime.
    pub fn new(config: CacheConfig) -> Self {
        let (accnt, evict_rx) = Accountant::new(config.max_size);
        let entries = Arc::new(RwLock::new(HashMap::new()));
        let worker = tokio::spawn(evict_loop(Arc::clone(&entries), evict_rx));

        info!(max_size = config.max_size, "chunk cache started");

        Self {
            entries,
            accnt: Arc::new(accnt),
            worker: Mutex::new(Some(worker)),
        }
    }

    /// Insert a chunk for a metric
    ///
    /// `prev` is the start timestamp of the chunk's real-time predecessor,
    /// or 0 when the caller knows of none; it is what later lets a search
    /// treat the two chunks as gap-free. Inserting an already-resident
    /// `(metric, ts)` keeps the existing chunk and only refreshes its
    /// recency. Never fails.
    pub fn add(&self, metric: MetricKey, prev: Ts, chunk: ChunkRef) -> bool {
        let ts = chunk.ts();
        let size = chunk.size();

        let mut entries = self.entries.write();
        match entries.get_mut(&metric) {
            Some(entry) => {
                entry.add(prev, chunk);
            }
            None => {
                entries.insert(metric, MetricEntry::new(prev, chunk));
            }
        }
        metrics::update_metric_entries(entries.len());
        self.accnt.add_chunk(metric, ts, size);

        true
    }

    /// Collect the cached parts of `[from, until)` for a metric
    ///
    /// Hits promote the returned chunks' recency; the outcome is counted
    /// as a complete hit, partial hit, or miss. An unknown metric or an
    /// empty window (`from >= until`) yields an empty result and counts
    /// as a miss.
    pub fn search(&self, metric: MetricKey, from: Ts, until: Ts) -> SearchResult {
        let mut res = SearchResult::new(from, until);

        let entries = self.entries.read();
        let entry = match entries.get(&metric) {
            Some(entry) => entry,
            None => {
                self.accnt.miss_metric();
                return res;
            }
        };

        entry.search(&mut res, from, until);

        if res.start.is_empty() && res.end.is_empty() {
            self.accnt.miss_metric();
        } else {
            for hit in res.start.iter().chain(res.end.iter()) {
                self.accnt.hit_chunk(metric, hit.ts());
            }
            if res.complete {
                self.accnt.complete_metric();
            } else {
                self.accnt.partial_metric();
            }
        }

        res
    }

    /// Number of metrics with at least one resident chunk
    pub fn entry_count(&self) -> usize {
        self.entries.read().len()
    }

    /// Accountant counters
    pub fn stats(&self) -> &CacheStats {
        self.accnt.stats()
    }

    /// Point-in-time view of counters and residency
    pub fn snapshot(&self) -> StatsSnapshot {
        self.accnt.snapshot()
    }

    /// Shut the cache down
    ///
    /// Closes the evict stream; the worker drains already-selected
    /// victims and exits. Callers are responsible for quiescing `add`
    /// and `search` traffic first.
    pub async fn stop(&self) {
        self.accnt.close();
        let worker = self.worker.lock().take();
        if let Some(handle) = worker {
            let _ = handle.await;
        }
        info!("chunk cache stopped");
    }
}

/// Apply eviction targets to the cache map until the stream closes
///
/// A target whose chunk is already gone is a no-op. The write lock is
/// taken per target; many short holds disturb search latency less than
/// few long ones.
async fn evict_loop(
    entries: Arc<RwLock<HashMap<MetricKey, MetricEntry>>>,
    mut evict_rx: mpsc::UnboundedReceiver<EvictTarget>,
) {
    while let Some(target) = evict_rx.recv().await {
        {
            let mut entries = entries.write();
            if let Some(entry) = entries.get_mut(&target.metric) {
                if entry.del(target.ts) == 0 {
                    entries.remove(&target.metric);
                }
            }
            metrics::update_metric_entries(entries.len());
        }
        debug!(metric = target.metric, ts = target.ts, "evicted chunk");
    }
    debug!("evict stream closed, eviction worker exiting");
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use std::sync::atomic::Ordering;

    fn chunk(ts: Ts, span: Ts, size: usize) -> ChunkRef {
        ChunkRef::new(ts, span, Bytes::from(vec![0u8; size]))
    }

    fn cache() -> ChunkCache {
        ChunkCache::new(CacheConfig::default())
    }

    fn ts_of(chunks: &[ChunkRef]) -> Vec<Ts> {
        chunks.iter().map(|c| c.ts()).collect()
    }

    #[tokio::test]
    async fn test_cold_miss() {
        let cache = cache();

        let res = cache.search(1, 100, 200);
        assert_eq!(res.from, 100);
        assert_eq!(res.until, 200);
        assert!(!res.complete);
        assert!(res.start.is_empty());
        assert!(res.end.is_empty());
        assert_eq!(cache.stats().misses.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_full_hit_single_chunk() {
        let cache = cache();
        cache.add(1, 0, chunk(100, 60, 64));

        let res = cache.search(1, 100, 150);
        assert!(res.complete);
        assert_eq!(ts_of(&res.start), vec![100]);
        assert!(res.end.is_empty());
        assert_eq!(cache.stats().complete_hits.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_full_hit_chained() {
        let cache = cache();
        cache.add(1, 0, chunk(100, 100, 64));
        cache.add(1, 100, chunk(200, 100, 64));

        let res = cache.search(1, 150, 250);
        assert!(res.complete);
        assert_eq!(ts_of(&res.start), vec![100, 200]);
        assert!(res.end.is_empty());
    }

    #[tokio::test]
    async fn test_partial_prefix() {
        let cache = cache();
        cache.add(1, 0, chunk(100, 60, 64));

        let res = cache.search(1, 100, 400);
        assert!(!res.complete);
        assert_eq!(ts_of(&res.start), vec![100]);
        assert!(res.end.is_empty());
        assert_eq!(cache.stats().partial_hits.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_partial_suffix() {
        let cache = cache();
        cache.add(1, 300, chunk(400, 100, 64));

        let res = cache.search(1, 100, 500);
        assert!(!res.complete);
        assert!(res.start.is_empty());
        assert_eq!(ts_of(&res.end), vec![400]);
        assert_eq!(cache.stats().partial_hits.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_eviction_under_pressure() {
        let cache = ChunkCache::new(CacheConfig::default().with_max_size(2048));

        cache.add(1, 0, chunk(100, 100, 1024));
        cache.add(1, 100, chunk(200, 100, 1024));
        cache.add(1, 200, chunk(300, 100, 1024));

        // victim selection is synchronous; only the map removal is async
        let snap = cache.snapshot();
        assert!(snap.total_bytes <= 2048);
        assert_eq!(snap.evictions, 1);

        // draining the worker makes the removal observable
        cache.stop().await;

        let res = cache.search(1, 100, 101);
        assert!(res.start.is_empty() && res.end.is_empty());

        let res = cache.search(1, 200, 301);
        assert!(res.complete);
        assert_eq!(ts_of(&res.start), vec![200, 300]);
    }

    #[tokio::test]
    async fn test_lru_respects_hits() {
        let cache = ChunkCache::new(CacheConfig::default().with_max_size(2048));

        cache.add(1, 0, chunk(100, 100, 1024));
        cache.add(1, 100, chunk(200, 100, 1024));

        // touch the older chunk so the newer one becomes the victim
        cache.search(1, 100, 150);

        cache.add(1, 200, chunk(300, 100, 1024));
        cache.stop().await;

        assert!(cache.search(1, 100, 101).complete);
        assert!(!cache.search(1, 200, 201).complete);
    }

    #[tokio::test]
    async fn test_duplicate_add_is_idempotent() {
        let cache = cache();
        cache.add(1, 0, chunk(100, 60, 64));
        cache.add(1, 0, chunk(100, 60, 64));

        let snap = cache.snapshot();
        assert_eq!(snap.total_bytes, 64);
        assert_eq!(snap.tracked_chunks, 1);

        let res = cache.search(1, 100, 150);
        assert_eq!(res.start.len(), 1);
    }

    #[tokio::test]
    async fn test_search_is_read_only() {
        let cache = cache();
        cache.add(1, 0, chunk(100, 100, 64));
        cache.add(1, 100, chunk(200, 100, 64));

        let first = cache.search(1, 100, 300);
        let second = cache.search(1, 100, 300);
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_readd_after_eviction_restores_chunk() {
        let cache = ChunkCache::new(CacheConfig::default().with_max_size(1024));

        cache.add(1, 0, chunk(100, 100, 1024));
        cache.add(1, 100, chunk(200, 100, 1024));
        cache.stop().await;
        assert!(!cache.search(1, 100, 101).complete);

        // the worker is gone but re-adding still restores lookup behavior
        cache.add(1, 0, chunk(100, 100, 64));
        let res = cache.search(1, 100, 150);
        assert!(res.complete);
        assert_eq!(ts_of(&res.start), vec![100]);
    }

    #[tokio::test]
    async fn test_empty_entry_removed_with_last_chunk() {
        let cache = ChunkCache::new(CacheConfig::default().with_max_size(64));

        cache.add(1, 0, chunk(100, 60, 64));
        assert_eq!(cache.entry_count(), 1);

        // over the ceiling as soon as the second metric arrives
        cache.add(2, 0, chunk(100, 60, 64));
        cache.stop().await;

        assert_eq!(cache.entry_count(), 1);
        assert!(cache.search(1, 100, 101).start.is_empty());
        assert!(cache.search(2, 100, 101).complete);
    }

    #[tokio::test]
    async fn test_total_matches_resident_sizes() {
        let cache = cache();

        cache.add(1, 0, chunk(100, 60, 100));
        cache.add(1, 100, chunk(200, 60, 200));
        cache.add(2, 0, chunk(100, 60, 300));

        assert_eq!(cache.snapshot().total_bytes, 600);
        assert_eq!(cache.snapshot().tracked_chunks, 3);
        assert_eq!(cache.entry_count(), 2);
    }

    #[tokio::test]
    async fn test_empty_window_counts_as_miss() {
        let cache = cache();
        cache.add(1, 0, chunk(100, 60, 64));

        let res = cache.search(1, 100, 100);
        assert!(!res.complete);
        assert!(res.start.is_empty() && res.end.is_empty());

        let res = cache.search(1, 200, 100);
        assert!(!res.complete);
        assert!(res.start.is_empty() && res.end.is_empty());

        assert_eq!(cache.stats().misses.load(Ordering::Relaxed), 2);
    }

    #[tokio::test]
    async fn test_stop_is_reentrant() {
        let cache = cache();
        cache.stop().await;
        cache.stop().await;
    }

    #[tokio::test]
    async fn test_concurrent_add_and_search() {
        let cache = Arc::new(ChunkCache::new(
            CacheConfig::default().with_max_size(1024 * 1024),
        ));

        let writer = {
            let cache = Arc::clone(&cache);
            tokio::task::spawn_blocking(move || {
                for i in 0u32..100 {
                    let ts = 100 + i * 60;
                    let prev = if i == 0 { 0 } else { ts - 60 };
                    cache.add(1, prev, ChunkRef::new(ts, 60, vec![0u8; 32].into()));
                }
            })
        };
        let reader = {
            let cache = Arc::clone(&cache);
            tokio::task::spawn_blocking(move || {
                for _ in 0..100 {
                    let res = cache.search(1, 100, 6100);
                    assert!(res.start.len() <= 100);
                }
            })
        };

        writer.await.unwrap();
        reader.await.unwrap();

        let res = cache.search(1, 100, 6100);
        assert!(res.complete);
        assert_eq!(res.start.len(), 100);
        cache.stop().await;
    }
}
