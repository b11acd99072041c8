//! Core data types used throughout the chunk cache
//!
//! # Key Types
//!
//! - **`MetricKey`**: Opaque identifier of a metric (128-bit integer)
//! - **`Ts`**: Timestamp in seconds since epoch (unsigned 32-bit)
//! - **`ChunkRef`**: Immutable handle to one compressed, time-bounded chunk
//!
//! # Example
//!
//! ```rust
//! use chunk_cache::types::ChunkRef;
//!
//! let chunk = ChunkRef::new(1000, 600, vec![0u8; 512].into());
//! assert_eq!(chunk.ts(), 1000);
//! assert_eq!(chunk.end_ts(), 1600);
//! assert_eq!(chunk.size(), 512);
//! ```

use bytes::Bytes;
use std::fmt;

/// Timestamp in seconds since epoch
///
/// Chunk start timestamps are strictly monotonic within a metric.
pub type Ts = u32;

/// Opaque identifier of a metric
///
/// A 128-bit unsigned integer assigned by the metric metadata index. The
/// cache never inspects it beyond hashing and equality.
pub type MetricKey = u128;

/// Immutable handle to a compressed chunk of samples
///
/// A chunk covers the half-open interval `[ts, ts + span)`. The payload is
/// an opaque compressed block; decoding it into a sample iterator is the
/// job of the chunk codec in the query layer, not of the cache. Cloning a
/// `ChunkRef` is cheap (the payload is refcounted), so search results hand
/// out copies rather than references into the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkRef {
    /// Start of the covered interval
    ts: Ts,

    /// Length of the covered interval in seconds
    span: Ts,

    /// Compressed samples, never inspected by the cache
    payload: Bytes,
}

impl ChunkRef {
    /// Create a new chunk handle
    ///
    /// # Arguments
    ///
    /// * `ts` - Start timestamp of the interval the chunk covers
    /// * `span` - Interval length in seconds
    /// * `payload` - Compressed sample data
    pub fn new(ts: Ts, span: Ts, payload: Bytes) -> Self {
        Self { ts, span, payload }
    }

    /// Start timestamp of the covered interval
    pub fn ts(&self) -> Ts {
        self.ts
    }

    /// Length of the covered interval in seconds
    pub fn span(&self) -> Ts {
        self.span
    }

    /// First timestamp past the covered interval
    pub fn end_ts(&self) -> Ts {
        self.ts.saturating_add(self.span)
    }

    /// Resident byte footprint of the chunk
    pub fn size(&self) -> u32 {
        self.payload.len() as u32
    }

    /// The compressed payload
    ///
    /// Handed to the chunk codec to produce a sample iterator on demand.
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }
}

impl fmt::Display for ChunkRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "chunk [{}, {}) {}B",
            self.ts,
            self.end_ts(),
            self.payload.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_ref_accessors() {
        let chunk = ChunkRef::new(100, 60, Bytes::from_static(&[1, 2, 3, 4]));

        assert_eq!(chunk.ts(), 100);
        assert_eq!(chunk.span(), 60);
        assert_eq!(chunk.end_ts(), 160);
        assert_eq!(chunk.size(), 4);
        assert_eq!(chunk.payload().as_ref(), &[1, 2, 3, 4]);
    }

    #[test]
    fn test_chunk_ref_end_ts_saturates() {
        let chunk = ChunkRef::new(Ts::MAX - 10, 60, Bytes::new());
        assert_eq!(chunk.end_ts(), Ts::MAX);
    }

    #[test]
    fn test_chunk_ref_clone_shares_payload() {
        let chunk = ChunkRef::new(100, 60, Bytes::from(vec![0u8; 1024]));
        let copy = chunk.clone();

        assert_eq!(copy, chunk);
        assert_eq!(copy.size(), 1024);
    }

    #[test]
    fn test_chunk_ref_display() {
        let chunk = ChunkRef::new(100, 60, Bytes::from_static(&[0; 8]));
        assert_eq!(format!("{}", chunk), "chunk [100, 160) 8B");
    }
}
