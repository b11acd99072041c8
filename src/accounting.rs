//! Cache accounting and eviction planning
//!
//! The accountant tracks every resident chunk by `(metric, ts)` coordinate:
//! its byte size for the global total, and a recency token for LRU victim
//! selection. Whenever the total rises above the configured ceiling it pops
//! least-recently-used coordinates, deducts their sizes, and emits them as
//! eviction targets. The eviction worker consumes the targets in selection
//! order and removes the chunks from the cache map.
//!
//! Victim selection runs synchronously inside [`Accountant::add_chunk`]
//! under a single mutex; the critical sections are short and the hot
//! lookup path never takes this lock while blocking on anything else.

use crate::metrics;
use crate::types::{MetricKey, Ts};
use lru::LruCache;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;

/// Coordinate of a chunk selected for eviction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvictTarget {
    /// Metric the chunk belongs to
    pub metric: MetricKey,

    /// Start timestamp of the chunk
    pub ts: Ts,
}

/// Accountant counters
///
/// Kept as atomics so the request path can bump them without taking the
/// ledger mutex and tests can assert exact values.
#[derive(Debug, Default)]
pub struct CacheStats {
    /// Searches that found nothing cached
    pub misses: AtomicU64,

    /// Searches whose whole range was covered
    pub complete_hits: AtomicU64,

    /// Searches that returned a prefix or suffix only
    pub partial_hits: AtomicU64,

    /// Chunks selected for eviction
    pub evictions: AtomicU64,
}

/// Point-in-time view of the accountant
#[derive(Debug, Clone, Serialize)]
pub struct StatsSnapshot {
    /// Searches that found nothing cached
    pub misses: u64,

    /// Searches whose whole range was covered
    pub complete_hits: u64,

    /// Searches that returned a prefix or suffix only
    pub partial_hits: u64,

    /// Chunks selected for eviction
    pub evictions: u64,

    /// Aggregate size of tracked chunks in bytes
    pub total_bytes: u64,

    /// Number of tracked chunks
    pub tracked_chunks: usize,
}

/// Size and recency state, guarded by one mutex
struct Ledger {
    /// Byte size per tracked coordinate
    sizes: HashMap<(MetricKey, Ts), u32>,

    /// Recency order; front of the LRU is the next victim
    recency: LruCache<(MetricKey, Ts), ()>,

    /// Sum of tracked sizes
    total: u64,

    /// Evict stream; dropped on close so the consumer observes stream end
    evict_tx: Option<mpsc::UnboundedSender<EvictTarget>>,
}

/// Tracks resident chunk sizes and recency, enforces the byte ceiling
///
/// Consumed by [`ChunkCache`](crate::ChunkCache): every `add` reports the
/// new chunk, every search hit promotes recency, and the miss/complete/
/// partial sinks feed the stats counters.
pub struct Accountant {
    limit: u64,
    ledger: Mutex<Ledger>,
    stats: CacheStats,
}

impl Accountant {
    /// Create an accountant with the given byte ceiling
    ///
    /// Returns the accountant and the receiving end of its evict stream.
    /// The stream has a single consumer and lives until [`close`] drops
    /// the sender.
    ///
    /// [`close`]: Accountant::close
    pub fn new(limit: u64) -> (Self, mpsc::UnboundedReceiver<EvictTarget>) {
        let (evict_tx, evict_rx) = mpsc::unbounded_channel();

        let accnt = Self {
            limit,
            ledger: Mutex::new(Ledger {
                sizes: HashMap::new(),
                recency: LruCache::unbounded(),
                total: 0,
                evict_tx: Some(evict_tx),
            }),
            stats: CacheStats::default(),
        };
        (accnt, evict_rx)
    }

    /// Record a newly resident chunk
    ///
    /// An already-tracked coordinate only has its recency refreshed; the
    /// size is never counted twice. Selecting and emitting victims happens
    /// here, before returning, whenever the total exceeds the ceiling.
    pub fn add_chunk(&self, metric: MetricKey, ts: Ts, size: u32) {
        let mut ledger = self.ledger.lock();
        let key = (metric, ts);

        if ledger.recency.get(&key).is_some() {
            return;
        }

        ledger.sizes.insert(key, size);
        ledger.recency.put(key, ());
        ledger.total += u64::from(size);

        self.evict_to_limit(&mut ledger);
        metrics::update_residency(ledger.total, ledger.sizes.len());
    }

    /// Promote a chunk's recency after a cache hit
    ///
    /// Coordinates that are no longer tracked (a concurrent eviction won
    /// the race) are ignored.
    pub fn hit_chunk(&self, metric: MetricKey, ts: Ts) {
        let mut ledger = self.ledger.lock();
        let _ = ledger.recency.get(&(metric, ts));
    }

    /// Record a search that found nothing cached
    pub fn miss_metric(&self) {
        self.stats.misses.fetch_add(1, Ordering::Relaxed);
        metrics::record_miss();
    }

    /// Record a search served completely from cache
    pub fn complete_metric(&self) {
        self.stats.complete_hits.fetch_add(1, Ordering::Relaxed);
        metrics::record_complete_hit();
    }

    /// Record a search that found part of the range
    pub fn partial_metric(&self) {
        self.stats.partial_hits.fetch_add(1, Ordering::Relaxed);
        metrics::record_partial_hit();
    }

    /// Aggregate size of tracked chunks in bytes
    pub fn total(&self) -> u64 {
        self.ledger.lock().total
    }

    /// Number of tracked chunks
    pub fn tracked(&self) -> usize {
        self.ledger.lock().sizes.len()
    }

    /// Configured byte ceiling
    pub fn limit(&self) -> u64 {
        self.limit
    }

    /// Accountant counters
    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    /// Point-in-time view of counters and residency
    pub fn snapshot(&self) -> StatsSnapshot {
        let ledger = self.ledger.lock();
        StatsSnapshot {
            misses: self.stats.misses.load(Ordering::Relaxed),
            complete_hits: self.stats.complete_hits.load(Ordering::Relaxed),
            partial_hits: self.stats.partial_hits.load(Ordering::Relaxed),
            evictions: self.stats.evictions.load(Ordering::Relaxed),
            total_bytes: ledger.total,
            tracked_chunks: ledger.sizes.len(),
        }
    }

    /// Close the evict stream
    ///
    /// Already-emitted targets stay queued for the consumer to drain;
    /// afterwards the consumer observes the end of the stream and exits.
    pub fn close(&self) {
        self.ledger.lock().evict_tx.take();
    }

    /// Pop LRU victims until the total is back at or under the ceiling
    ///
    /// Victims are deducted from the total before they are emitted, so the
    /// accountant's view never waits on the eviction worker.
    fn evict_to_limit(&self, ledger: &mut Ledger) {
        while ledger.total > self.limit {
            let (metric, ts) = match ledger.recency.pop_lru() {
                Some((key, ())) => key,
                None => break,
            };

            let size = ledger.sizes.remove(&(metric, ts)).unwrap_or(0);
            ledger.total = ledger.total.saturating_sub(u64::from(size));

            self.stats.evictions.fetch_add(1, Ordering::Relaxed);
            metrics::record_eviction();

            if let Some(tx) = &ledger.evict_tx {
                // receiver gone means the worker already shut down; the
                // ledger deduction above is still correct
                let _ = tx.send(EvictTarget { metric, ts });
            }
        }
    }
}
