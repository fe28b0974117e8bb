//! Shared bounded top-k accumulator for the inverted-index query processors.
//!
//! Distinct from [`crate::knn::result::BoundedResultSet`]: scores here are
//! "bigger is better" (accumulated weighted dot products), whereas KNN
//! distances are "smaller is better". Kept separate rather than bolting a
//! sign flip onto the KNN type, since DAAT/WAND/BMW need to report the raw
//! score, not a distance.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

#[derive(Debug, Clone, Copy)]
struct Entry {
    score: f32,
    doc_id: u32,
}

impl Entry {
    fn key(self) -> f32 {
        if self.score.is_nan() {
            f32::NEG_INFINITY
        } else {
            self.score
        }
    }
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.key().to_bits() == other.key().to_bits() && self.doc_id == other.doc_id
    }
}
impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entry {
    /// Smallest-score-first, ties broken by largest doc id first, so the
    /// worst entry (by score, then by doc id) is always the heap's top —
    /// exactly what a bounded min-heap needs to evict on overflow.
    fn cmp(&self, other: &Self) -> Ordering {
        self.key()
            .total_cmp(&other.key())
            .then(other.doc_id.cmp(&self.doc_id))
    }
}

/// Bounded accumulator for the `k` highest-scoring documents.
#[derive(Debug)]
pub struct TopK {
    k: usize,
    heap: BinaryHeap<std::cmp::Reverse<Entry>>,
}

impl TopK {
    /// Creates an accumulator bounded to the `k` highest scores.
    #[must_use]
    pub fn new(k: usize) -> Self {
        Self {
            k,
            heap: BinaryHeap::with_capacity(k.saturating_add(1)),
        }
    }

    /// Current minimum score a new candidate must beat to be admitted, or
    /// `-inf` while the set is not yet full.
    #[must_use]
    pub fn threshold(&self) -> f32 {
        if self.heap.len() < self.k {
            f32::NEG_INFINITY
        } else {
            self.heap.peek().map_or(f32::NEG_INFINITY, |e| e.0.key())
        }
    }

    /// Offers `(doc_id, score)`. Returns `true` if admitted.
    pub fn offer(&mut self, doc_id: u32, score: f32) -> bool {
        if self.k == 0 {
            return false;
        }
        if self.heap.len() >= self.k {
            let worst = self.heap.peek().expect("heap non-empty when full").0;
            if Entry { score, doc_id } <= worst {
                return false;
            }
            self.heap.pop();
        }
        self.heap.push(std::cmp::Reverse(Entry { score, doc_id }));
        true
    }

    /// Number of candidates currently held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// Whether no candidates have been admitted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Drains into `(doc_id, score)` pairs sorted descending by score, ties
    /// broken by ascending doc id.
    #[must_use]
    pub fn into_sorted(self) -> Vec<(u32, f32)> {
        let mut items: Vec<(u32, f32)> = self
            .heap
            .into_iter()
            .map(|std::cmp::Reverse(e)| (e.doc_id, e.score))
            .collect();
        items.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        items
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_k_highest_scores() {
        let mut topk = TopK::new(2);
        topk.offer(1, 0.5);
        topk.offer(2, 0.9);
        topk.offer(3, 0.1);
        let result = topk.into_sorted();
        assert_eq!(result, vec![(2, 0.9), (1, 0.5)]);
    }

    #[test]
    fn ties_broken_by_ascending_doc_id() {
        let mut topk = TopK::new(3);
        topk.offer(5, 1.0);
        topk.offer(2, 1.0);
        topk.offer(9, 1.0);
        let ids: Vec<u32> = topk.into_sorted().into_iter().map(|(id, _)| id).collect();
        assert_eq!(ids, vec![2, 5, 9]);
    }
}
