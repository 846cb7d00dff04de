//! Bounded top-k accumulator
//!
//! Keeps the k best `(docno, score)` pairs in a heap whose top is the current
//! worst entry, giving O(1) threshold lookup and O(log k) eviction. Ordering is
//! total: scores compare with `f32::total_cmp`, and equal scores rank the lower
//! docno first, so results do not depend on insertion order.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use serde::{Deserialize, Serialize};

use crate::{DocId, Score};

/// A ranked document
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoredDoc {
    pub doc: DocId,
    pub score: Score,
}

impl ScoredDoc {
    pub fn new(doc: DocId, score: Score) -> Self {
        Self { doc, score }
    }

    /// Ranking order: score descending, then docno ascending
    #[inline]
    pub fn rank_cmp(&self, other: &Self) -> Ordering {
        other
            .score
            .total_cmp(&self.score)
            .then_with(|| self.doc.cmp(&other.doc))
    }
}

/// Heap entry ordered so that the worst-ranked document is the greatest
#[derive(Clone, Copy)]
struct HeapEntry(ScoredDoc);

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for HeapEntry {}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.rank_cmp(&other.0)
    }
}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Best-k collector for one query
///
/// No deduplication: the caller inserts each docno at most once.
pub struct Accumulator {
    heap: BinaryHeap<HeapEntry>,
    k: usize,
}

impl Accumulator {
    pub fn new(k: usize) -> Self {
        // Cap capacity to avoid allocation overflow for very large k
        let capacity = k.saturating_add(1).min(1_000_000);
        Self {
            heap: BinaryHeap::with_capacity(capacity),
            k,
        }
    }

    pub fn capacity(&self) -> usize {
        self.k
    }

    /// Worst entry currently retained, once the accumulator is full
    #[inline]
    pub fn threshold(&self) -> Option<ScoredDoc> {
        if self.heap.len() >= self.k {
            self.heap.peek().map(|e| e.0)
        } else {
            None
        }
    }

    /// Insert a document score. Returns true if it is among the best k so far.
    #[inline]
    pub fn insert(&mut self, doc: DocId, score: Score) -> bool {
        if self.k == 0 {
            return false;
        }
        let entry = HeapEntry(ScoredDoc::new(doc, score));
        if self.heap.len() < self.k {
            self.heap.push(entry);
            return true;
        }
        match self.heap.peek() {
            // Strictly better score, or equal score with a lower docno
            Some(worst) if entry < *worst => {
                self.heap.pop();
                self.heap.push(entry);
                true
            }
            _ => false,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Consume into results sorted by score descending, docno ascending
    pub fn extract_sorted(self) -> Vec<ScoredDoc> {
        self.heap
            .into_sorted_vec()
            .into_iter()
            .map(|e| e.0)
            .collect()
    }
}
