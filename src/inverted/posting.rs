//! Scored posting lists and the inverted index they're grouped into.
//!
//! Grounded in the teacher's `Bm25Index`/`PostingList` (an `FxHashMap<term,
//! _>` of per-term lists behind a `RwLock`, `rustc_hash` throughout) but
//! generalized from existence-only postings to `(doc_id, value)` pairs, since
//! DAAT/WAND/BMW top-k scoring (spec §4.4-§4.6) needs the weight, not just
//! membership. Each list additionally carries the bookkeeping WAND/BMW prune
//! on: a term-wide max value, and per-block `(last_doc_id, max_value)`
//! summaries.

use crate::space::sparse::SparseVector;
use rustc_hash::FxHashMap;

/// Default block size for block-max summaries (spec §4.6).
pub const DEFAULT_BLOCK_SIZE: usize = 64;

/// One `(doc_id, value)` entry in a posting list.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Posting {
    /// Document id.
    pub doc_id: u32,
    /// Term weight within that document.
    pub value: f32,
}

/// Per-block bound used by Block-Max WAND to skip whole blocks without
/// touching their postings.
#[derive(Debug, Clone, Copy)]
pub struct BlockSummary {
    /// Last (largest) doc id covered by this block.
    pub last_doc_id: u32,
    /// Largest value among this block's postings.
    pub max_value: f32,
}

/// A single term's postings, sorted ascending by doc id, plus the summaries
/// WAND/BMW need.
#[derive(Debug, Clone)]
pub struct ScoredPostingList {
    postings: Vec<Posting>,
    max_value: f32,
    blocks: Vec<BlockSummary>,
    block_size: usize,
}

impl ScoredPostingList {
    fn build(mut postings: Vec<Posting>, block_size: usize) -> Self {
        postings.sort_by_key(|p| p.doc_id);
        let max_value = postings.iter().fold(0.0f32, |acc, p| acc.max(p.value));
        let blocks = postings
            .chunks(block_size.max(1))
            .map(|chunk| BlockSummary {
                last_doc_id: chunk.last().map_or(0, |p| p.doc_id),
                max_value: chunk.iter().fold(0.0f32, |acc, p| acc.max(p.value)),
            })
            .collect();
        Self {
            postings,
            max_value,
            blocks,
            block_size: block_size.max(1),
        }
    }

    /// All postings, ascending by doc id.
    #[must_use]
    pub fn postings(&self) -> &[Posting] {
        &self.postings
    }

    /// The largest value across this term's entire posting list — the WAND
    /// upper bound before any query-weight scaling.
    #[must_use]
    pub const fn max_value(&self) -> f32 {
        self.max_value
    }

    /// Per-block `(last_doc_id, max_value)` summaries.
    #[must_use]
    pub fn blocks(&self) -> &[BlockSummary] {
        &self.blocks
    }

    /// The configured block size.
    #[must_use]
    pub const fn block_size(&self) -> usize {
        self.block_size
    }

    /// Number of postings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.postings.len()
    }

    /// Whether this list holds no postings.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.postings.is_empty()
    }

    /// Index of the first posting with `doc_id >= target`, via binary
    /// search — the `skipTo` primitive DAAT/WAND/BMW all build on.
    #[must_use]
    pub fn advance_to(&self, target: u32) -> usize {
        self.postings.partition_point(|p| p.doc_id < target)
    }

    /// Index of the block containing posting index `pos` (or the last
    /// block if `pos` is past the end).
    #[must_use]
    pub fn block_of(&self, pos: usize) -> usize {
        (pos / self.block_size).min(self.blocks.len().saturating_sub(1))
    }
}

/// An inverted index over scored postings, one list per term.
#[derive(Debug, Clone, Default)]
pub struct InvertedIndex {
    lists: FxHashMap<u32, ScoredPostingList>,
}

impl InvertedIndex {
    /// Builds an inverted index from `(doc_id, sparse vector)` records,
    /// using `block_size` for each list's block-max summaries.
    #[must_use]
    pub fn build(records: &[(u32, SparseVector)], block_size: usize) -> Self {
        let mut by_term: FxHashMap<u32, Vec<Posting>> = FxHashMap::default();
        for (doc_id, vector) in records {
            for (term, value) in vector.iter() {
                by_term.entry(term).or_default().push(Posting {
                    doc_id: *doc_id,
                    value,
                });
            }
        }
        let lists = by_term
            .into_iter()
            .map(|(term, postings)| (term, ScoredPostingList::build(postings, block_size)))
            .collect();
        Self { lists }
    }

    /// The posting list for `term`, if any document contains it.
    #[must_use]
    pub fn get(&self, term: u32) -> Option<&ScoredPostingList> {
        self.lists.get(&term)
    }

    /// Number of distinct terms indexed.
    #[must_use]
    pub fn term_count(&self) -> usize {
        self.lists.len()
    }

    /// Every term id this index holds a posting list for, in no particular
    /// order.
    pub fn term_ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.lists.keys().copied()
    }
}

/// A cursor over one query term's posting list: the current position plus
/// the query-side weight for that term, shared by the DAAT/WAND/BMW
/// processors.
#[derive(Debug, Clone, Copy)]
pub struct TermCursor<'a> {
    list: &'a ScoredPostingList,
    pos: usize,
    /// This term's weight in the query vector.
    pub weight: f32,
}

impl<'a> TermCursor<'a> {
    /// Starts a cursor at the head of `list`.
    #[must_use]
    pub const fn new(list: &'a ScoredPostingList, weight: f32) -> Self {
        Self { list, pos: 0, weight }
    }

    /// The doc id this cursor currently points at, or `None` if exhausted.
    #[must_use]
    pub fn current_doc_id(&self) -> Option<u32> {
        self.list.postings().get(self.pos).map(|p| p.doc_id)
    }

    /// The term weight of the document this cursor currently points at.
    /// Panics if the cursor is exhausted; callers must check
    /// [`Self::current_doc_id`] first.
    #[must_use]
    pub fn current_value(&self) -> f32 {
        self.list.postings()[self.pos].value
    }

    /// This term's contribution upper bound: `weight * term-wide max value`.
    #[must_use]
    pub fn upper_bound(&self) -> f32 {
        self.weight * self.list.max_value()
    }

    /// This term's contribution upper bound restricted to the block the
    /// cursor is currently inside — the tighter bound Block-Max WAND uses
    /// to skip without even reaching a pivot candidate.
    #[must_use]
    pub fn current_block_upper_bound(&self) -> f32 {
        self.current_block()
            .map_or(0.0, |b| self.weight * b.max_value)
    }

    /// The last doc id covered by the cursor's current block — advancing
    /// past this id guarantees leaving the block.
    #[must_use]
    pub fn current_block_last_doc_id(&self) -> Option<u32> {
        self.current_block().map(|b| b.last_doc_id)
    }

    fn current_block(&self) -> Option<&BlockSummary> {
        if self.pos >= self.list.len() {
            return None;
        }
        self.list.blocks().get(self.list.block_of(self.pos))
    }

    /// Advances this cursor to the first posting with `doc_id >= target`.
    pub fn advance_to(&mut self, target: u32) {
        let from = self.list.postings()[self.pos..].partition_point(|p| p.doc_id < target);
        self.pos += from;
    }

    /// Postings left unvisited by this cursor, used as a cheap heuristic
    /// for which cursor to advance when a pivot candidate needs one of
    /// several terms nudged forward.
    #[must_use]
    pub fn remaining_len(&self) -> usize {
        self.list.len().saturating_sub(self.pos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_index() -> InvertedIndex {
        let records = vec![
            (0u32, SparseVector::from_pairs(&[(1, 1.0), (2, 2.0)])),
            (1u32, SparseVector::from_pairs(&[(1, 3.0)])),
            (2u32, SparseVector::from_pairs(&[(2, 1.0)])),
        ];
        InvertedIndex::build(&records, 2)
    }

    #[test]
    fn postings_sorted_ascending_and_max_value_correct() {
        let index = sample_index();
        let list = index.get(1).unwrap();
        assert_eq!(
            list.postings().iter().map(|p| p.doc_id).collect::<Vec<_>>(),
            vec![0, 1]
        );
        assert_eq!(list.max_value(), 3.0);
    }

    #[test]
    fn advance_to_finds_first_geq() {
        let index = sample_index();
        let list = index.get(2).unwrap();
        assert_eq!(list.advance_to(0), 0);
        assert_eq!(list.advance_to(1), 1); // doc 0 (term 2's first posting) is skipped
        assert_eq!(list.advance_to(3), list.len());
    }

    #[test]
    fn missing_term_returns_none() {
        let index = sample_index();
        assert!(index.get(99).is_none());
    }
}
