//! Block-Max WAND top-k (spec §4.6).
//!
//! Same pivoting scheme as [`crate::inverted::wand`], with an extra check
//! before a pivot document is ever scored: the cumulative upper bound
//! restricted to each term's *current block* is compared against the
//! threshold first. When that tighter bound still can't beat the
//! threshold, the term with the nearest block boundary is skipped straight
//! to the next block rather than being advanced one posting at a time.
//! Produces the same top-k set as [`crate::inverted::daat`] and
//! [`crate::inverted::wand`].

use crate::inverted::posting::{InvertedIndex, TermCursor};
use crate::inverted::topk::TopK;
use crate::space::sparse::SparseVector;

/// Evaluates `query` against `index`, returning the `k` highest-scoring
/// documents as `(doc_id, score)`, descending by score then ascending by
/// doc id.
#[must_use]
pub fn top_k(index: &InvertedIndex, query: &SparseVector, k: usize) -> Vec<(u32, f32)> {
    let mut cursors: Vec<TermCursor<'_>> = query
        .iter()
        .filter_map(|(term, weight)| index.get(term).map(|list| TermCursor::new(list, weight)))
        .collect();

    let mut topk = TopK::new(k);
    loop {
        cursors.retain(|c| c.current_doc_id().is_some());
        if cursors.is_empty() {
            break;
        }
        cursors.sort_by_key(|c| c.current_doc_id().expect("retained cursors are live"));

        let threshold = topk.threshold();
        let mut cumulative = 0.0f32;
        let mut pivot = None;
        for (i, cursor) in cursors.iter().enumerate() {
            cumulative += cursor.upper_bound();
            if cumulative > threshold {
                pivot = Some(i);
                break;
            }
        }
        let Some(pivot_idx) = pivot else {
            break;
        };
        let pivot_doc = cursors[pivot_idx]
            .current_doc_id()
            .expect("retained cursors are live");

        let block_bound: f32 = cursors[..=pivot_idx]
            .iter()
            .map(TermCursor::current_block_upper_bound)
            .sum();
        if block_bound <= threshold {
            // The tighter block-level bound rules out every remaining doc
            // in the narrowest of these terms' current blocks — skip past
            // that block entirely instead of visiting posting by posting.
            let skip_idx = (0..=pivot_idx)
                .min_by_key(|&i| cursors[i].current_block_last_doc_id().unwrap_or(u32::MAX))
                .unwrap_or(0);
            let boundary = cursors[skip_idx]
                .current_block_last_doc_id()
                .unwrap_or(pivot_doc);
            cursors[skip_idx].advance_to(boundary.saturating_add(1));
            continue;
        }

        if cursors[0].current_doc_id() == Some(pivot_doc) {
            let mut score = 0.0f32;
            for cursor in &mut cursors {
                if cursor.current_doc_id() == Some(pivot_doc) {
                    score += cursor.weight * cursor.current_value();
                    cursor.advance_to(pivot_doc + 1);
                }
            }
            topk.offer(pivot_doc, score);
        } else {
            // See wand.rs: the pivot cursor is excluded here too, since it
            // already sits at `pivot_doc` and advancing it would be a
            // no-op that stalls the loop.
            let advance_idx = (0..pivot_idx)
                .max_by_key(|&i| cursors[i].remaining_len())
                .unwrap_or(0);
            cursors[advance_idx].advance_to(pivot_doc);
        }
    }
    topk.into_sorted()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inverted::daat;
    use crate::inverted::posting::InvertedIndex;

    fn build_corpus(block_size: usize) -> InvertedIndex {
        let records: Vec<(u32, SparseVector)> = (0u32..40)
            .map(|doc_id| {
                let pairs = match doc_id % 4 {
                    0 => vec![(1, 1.0 + doc_id as f32 * 0.01), (2, 0.2)],
                    1 => vec![(2, 2.0 + doc_id as f32 * 0.01)],
                    2 => vec![(1, 0.1), (3, 5.0 - doc_id as f32 * 0.01)],
                    _ => vec![(3, 0.05)],
                };
                (doc_id, SparseVector::from_pairs(&pairs))
            })
            .collect();
        InvertedIndex::build(&records, block_size)
    }

    #[test]
    fn agrees_with_daat_with_small_blocks() {
        let index = build_corpus(4);
        let query = SparseVector::from_pairs(&[(1, 1.0), (2, 1.0), (3, 1.0)]);
        for k in [1, 3, 5, 20] {
            assert_eq!(top_k(&index, &query, k), daat::top_k(&index, &query, k), "k={k}");
        }
    }

    #[test]
    fn agrees_with_daat_with_default_block_size() {
        let index = build_corpus(crate::inverted::posting::DEFAULT_BLOCK_SIZE);
        let query = SparseVector::from_pairs(&[(2, 1.0), (3, 1.0)]);
        assert_eq!(top_k(&index, &query, 5), daat::top_k(&index, &query, 5));
    }
}
