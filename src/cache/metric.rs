//! Per-metric chunk index and range search
//!
//! One `MetricEntry` holds the resident chunks of a single metric, ordered
//! by start timestamp, plus the real-time predecessor link recorded for
//! each chunk at insertion time. Two chunks that sit next to each other in
//! the ordered set are not necessarily adjacent in real time; only the
//! `prev_ts` link asserts that there is no gap between them, so every scan
//! that extends a run checks it.

use super::SearchResult;
use crate::types::{ChunkRef, Ts};
use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;

/// Resident chunks of one metric
///
/// The `BTreeMap` provides both the direct lookup and the ordered view the
/// search needs; `prev_ts` maps a chunk's start to the start of its
/// real-time predecessor as supplied by the caller of `add`. A missing or
/// non-resident predecessor stops any backward walk.
pub(crate) struct MetricEntry {
    chunks: BTreeMap<Ts, ChunkRef>,
    prev_ts: HashMap<Ts, Ts>,
}

impl MetricEntry {
    pub(crate) fn new(prev: Ts, chunk: ChunkRef) -> Self {
        let mut entry = Self {
            chunks: BTreeMap::new(),
            prev_ts: HashMap::new(),
        };
        entry.add(prev, chunk);
        entry
    }

    /// Insert a chunk; duplicates keep the existing chunk and its link.
    ///
    /// Returns whether the chunk was newly inserted. `prev == 0` means the
    /// caller knows of no predecessor.
    pub(crate) fn add(&mut self, prev: Ts, chunk: ChunkRef) -> bool {
        let ts = chunk.ts();
        if self.chunks.contains_key(&ts) {
            return false;
        }
        if prev > 0 && prev < ts {
            self.prev_ts.insert(ts, prev);
        }
        self.chunks.insert(ts, chunk);
        true
    }

    /// Remove the chunk at `ts`, returning how many chunks remain.
    ///
    /// Links of other chunks pointing at `ts` stay behind; they now name a
    /// non-resident predecessor, which backward walks treat as a stop.
    pub(crate) fn del(&mut self, ts: Ts) -> usize {
        if self.chunks.remove(&ts).is_some() {
            self.prev_ts.remove(&ts);
        }
        self.chunks.len()
    }

    pub(crate) fn len(&self) -> usize {
        self.chunks.len()
    }

    /// Collect the cached prefix and suffix of `[from, until)` into `res`.
    pub(crate) fn search(&self, res: &mut SearchResult, from: Ts, until: Ts) {
        if from >= until || self.chunks.is_empty() {
            return;
        }
        let last = until - 1;

        self.search_forward(from, last, res);
        if !res.complete {
            self.search_backward(from, last, res);
        }
    }

    /// Walk forward from the chunk at or before `from`, following asserted
    /// adjacency, into `res.start`.
    fn search_forward(&self, from: Ts, last: Ts, res: &mut SearchResult) {
        // a chunk starting after `from` cannot anchor the prefix
        let (mut cur, first) = match self.chunks.range(..=from).next_back() {
            Some((&ts, chunk)) => (ts, chunk),
            None => return,
        };
        let mut end = first.end_ts();
        res.start.push(first.clone());

        loop {
            if end > last {
                // the run reaches past the window
                res.complete = true;
                return;
            }
            match self
                .chunks
                .range((Bound::Excluded(cur), Bound::Unbounded))
                .next()
            {
                Some((&next, chunk))
                    if next <= last && self.prev_ts.get(&next) == Some(&cur) =>
                {
                    end = chunk.end_ts();
                    res.start.push(chunk.clone());
                    cur = next;
                }
                _ => return,
            }
        }
    }

    /// Walk backward from the chunk at or before `until - 1`, following
    /// predecessor links, into `res.end` (reverse-chronological).
    fn search_backward(&self, from: Ts, last: Ts, res: &mut SearchResult) {
        let tail = res.start.last().map(|c| c.ts());

        let (mut cur, chunk) = match self.chunks.range(..=last).next_back() {
            Some((&ts, chunk)) => (ts, chunk),
            None => return,
        };
        if tail == Some(cur) {
            // the forward scan already ended on this chunk; the window tail
            // past its end is simply not cached
            return;
        }
        res.end.push(chunk.clone());

        while cur > from {
            let prev = match self.prev_ts.get(&cur) {
                Some(&p) if p < cur => p,
                _ => return,
            };
            if tail == Some(prev) {
                // suffix run joins the prefix run with no gap between them
                res.complete = true;
                return;
            }
            match self.chunks.get(&prev) {
                Some(chunk) => {
                    res.end.push(chunk.clone());
                    cur = prev;
                }
                None => return,
            }
        }
    }
}
