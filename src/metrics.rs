//! Prometheus metrics for the chunk cache
//!
//! Exposes the cache's hit/miss/eviction counters and residency gauges.
//! The accountant also keeps its own atomic counters (see
//! [`CacheStats`](crate::accounting::CacheStats)) for programmatic access;
//! the statics here are the scrape surface.

use lazy_static::lazy_static;
use prometheus::{
    register_int_counter, register_int_gauge, Encoder, IntCounter, IntGauge, TextEncoder,
};

lazy_static! {
    // === Search outcome counters ===

    /// Searches that found nothing cached
    pub static ref CACHE_MISSES_TOTAL: IntCounter = register_int_counter!(
        "chunk_cache_misses_total",
        "Searches served entirely from the backing store"
    ).unwrap();

    /// Searches served completely from cache
    pub static ref CACHE_COMPLETE_HITS_TOTAL: IntCounter = register_int_counter!(
        "chunk_cache_complete_hits_total",
        "Searches whose whole range was covered by cached chunks"
    ).unwrap();

    /// Searches that found some but not all of the range
    pub static ref CACHE_PARTIAL_HITS_TOTAL: IntCounter = register_int_counter!(
        "chunk_cache_partial_hits_total",
        "Searches that returned a cached prefix or suffix but not the whole range"
    ).unwrap();

    /// Chunks selected for eviction
    pub static ref CACHE_EVICTIONS_TOTAL: IntCounter = register_int_counter!(
        "chunk_cache_evictions_total",
        "Chunks evicted to keep the cache under its byte ceiling"
    ).unwrap();

    // === Residency gauges ===

    /// Aggregate size of resident chunks
    pub static ref CACHE_SIZE_BYTES: IntGauge = register_int_gauge!(
        "chunk_cache_size_bytes",
        "Total bytes of chunks tracked by the accountant"
    ).unwrap();

    /// Number of resident chunks
    pub static ref CACHE_TRACKED_CHUNKS: IntGauge = register_int_gauge!(
        "chunk_cache_tracked_chunks",
        "Number of chunks tracked by the accountant"
    ).unwrap();

    /// Number of metrics with at least one resident chunk
    pub static ref CACHE_METRIC_ENTRIES: IntGauge = register_int_gauge!(
        "chunk_cache_metric_entries",
        "Number of per-metric entries in the cache map"
    ).unwrap();
}

/// Record a complete miss
#[inline]
pub fn record_miss() {
    CACHE_MISSES_TOTAL.inc();
}

/// Record a search fully served from cache
#[inline]
pub fn record_complete_hit() {
    CACHE_COMPLETE_HITS_TOTAL.inc();
}

/// Record a search partially served from cache
#[inline]
pub fn record_partial_hit() {
    CACHE_PARTIAL_HITS_TOTAL.inc();
}

/// Record an eviction
#[inline]
pub fn record_eviction() {
    CACHE_EVICTIONS_TOTAL.inc();
}

/// Update the residency gauges
#[inline]
pub fn update_residency(total_bytes: u64, tracked_chunks: usize) {
    CACHE_SIZE_BYTES.set(total_bytes as i64);
    CACHE_TRACKED_CHUNKS.set(tracked_chunks as i64);
}

/// Update the metric entry gauge
#[inline]
pub fn update_metric_entries(count: usize) {
    CACHE_METRIC_ENTRIES.set(count as i64);
}

/// Get metrics in Prometheus text format
pub fn gather_metrics() -> Result<String, String> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = vec![];

    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| format!("Failed to encode metrics: {}", e))?;

    String::from_utf8(buffer).map_err(|e| format!("Metrics contain invalid UTF-8: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_outcomes() {
        record_miss();
        record_complete_hit();
        record_partial_hit();
        record_eviction();

        let metrics = gather_metrics().expect("Failed to gather metrics");
        assert!(metrics.contains("chunk_cache_misses_total"));
        assert!(metrics.contains("chunk_cache_complete_hits_total"));
        assert!(metrics.contains("chunk_cache_partial_hits_total"));
        assert!(metrics.contains("chunk_cache_evictions_total"));
    }

    #[test]
    fn test_gauges() {
        update_residency(4096, 4);
        update_metric_entries(2);

        let metrics = gather_metrics().expect("Failed to gather metrics");
        assert!(metrics.contains("chunk_cache_size_bytes"));
        assert!(metrics.contains("chunk_cache_tracked_chunks"));
        assert!(metrics.contains("chunk_cache_metric_entries"));
    }
}
