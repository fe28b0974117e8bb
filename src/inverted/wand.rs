//! WAND (Weak AND) top-k via term upper-bound pruning (spec §4.5).
//!
//! Classic Broder et al. pivoting: cursors are kept sorted by current doc
//! id, and a document is only fully scored once the cumulative upper bound
//! of the terms up to some "pivot" term exceeds the current top-k
//! threshold. Produces the same top-k set as [`crate::inverted::daat`],
//! just by touching fewer postings.

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
            break; // no suffix of terms can ever beat the threshold again
        };
        let pivot_doc = cursors[pivot_idx]
            .current_doc_id()
            .expect("retained cursors are live");

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
            // Advance whichever term strictly before the pivot has the most
            // postings left — the standard WAND heuristic for which cursor
            // to move, since that's the one most likely to skip the most
            // work. The pivot cursor itself is excluded: it already sits at
            // `pivot_doc`, so including it here can pick a cursor that
            // can't actually move, stalling the loop.
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

    fn build_corpus() -> InvertedIndex {
        let records = vec![
            (0u32, SparseVector::from_pairs(&[(1, 2.0), (2, 1.0), (3, 0.5)])),
            (1u32, SparseVector::from_pairs(&[(1, 1.0), (3, 4.0)])),
            (2u32, SparseVector::from_pairs(&[(2, 5.0)])),
            (3u32, SparseVector::from_pairs(&[(1, 0.2), (2, 0.3), (3, 0.1)])),
            (4u32, SparseVector::from_pairs(&[(3, 9.0)])),
        ];
        InvertedIndex::build(&records, 64)
    }

    #[test]
    fn agrees_with_daat_on_sample_corpus() {
        let index = build_corpus();
        let query = SparseVector::from_pairs(&[(1, 1.0), (2, 1.0), (3, 1.0)]);
        for k in [1, 2, 3, 10] {
            assert_eq!(top_k(&index, &query, k), daat::top_k(&index, &query, k), "k={k}");
        }
    }

    #[test]
    fn single_term_query_matches_postings_of_that_term() {
        let index = build_corpus();
        let query = SparseVector::from_pairs(&[(3, 1.0)]);
        let results = top_k(&index, &query, 2);
        assert_eq!(results[0].0, 4); // doc 4 has the largest weight for term 3
    }
}
