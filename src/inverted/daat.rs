//! Simple document-at-a-time top-k (spec §4.4).
//!
//! Visits every document that contains at least one query term (OR
//! semantics), evaluates its full score, and keeps the `k` best — no
//! pruning, so this is the reference the pruned processors (WAND, BMW) are
//! checked against.

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
        let Some(min_doc) = cursors.iter().filter_map(TermCursor::current_doc_id).min() else {
            break;
        };
        let mut score = 0.0f32;
        for cursor in &mut cursors {
            if cursor.current_doc_id() == Some(min_doc) {
                score += cursor.weight * cursor.current_value();
                cursor.advance_to(min_doc + 1);
            }
        }
        topk.offer(min_doc, score);
    }
    topk.into_sorted()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inverted::posting::InvertedIndex;

    #[test]
    fn scores_sum_contributions_across_terms() {
        let records = vec![
            (0u32, SparseVector::from_pairs(&[(1, 2.0), (2, 1.0)])),
            (1u32, SparseVector::from_pairs(&[(1, 1.0)])),
            (2u32, SparseVector::from_pairs(&[(2, 5.0)])),
        ];
        let index = InvertedIndex::build(&records, 64);
        let query = SparseVector::from_pairs(&[(1, 1.0), (2, 1.0)]);
        let results = top_k(&index, &query, 3);
        assert_eq!(results[0], (2, 5.0));
        assert_eq!(results[1], (0, 3.0));
        assert_eq!(results[2], (1, 1.0));
    }

    #[test]
    fn empty_query_yields_no_results() {
        let records = vec![(0u32, SparseVector::from_pairs(&[(1, 1.0)]))];
        let index = InvertedIndex::build(&records, 64);
        let query = SparseVector::from_pairs(&[]);
        assert!(top_k(&index, &query, 5).is_empty());
    }
}
