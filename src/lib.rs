//! chunk-cache - In-memory chunk cache for time-series range queries
//!
//! This library caches the compressed, immutable chunks a time-series
//! store serves range queries from, so that hot ranges never touch the
//! slow backing store. It provides:
//!
//! - Range search returning the cached contiguous prefix and suffix of a
//!   window, and whether the whole window is covered
//! - Real-time adjacency tracking, so two cached chunks are only chained
//!   when the inserter asserted there is no gap between them
//! - A global byte budget enforced by LRU eviction off the hot path
//! - Prometheus counters and gauges for hit rates and residency

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod accounting;
pub mod cache;
pub mod config;
pub mod error;
pub mod metrics;
pub mod types;

// Re-export main types
pub use accounting::{Accountant, CacheStats, EvictTarget, StatsSnapshot};
pub use cache::{ChunkCache, SearchResult};
pub use config::CacheConfig;
pub use error::ConfigError;
pub use types::{ChunkRef, MetricKey, Ts};
