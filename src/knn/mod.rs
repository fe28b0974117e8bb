//! KNN and range query evaluation against a [`Space`].
//!
//! An index drives a query by repeatedly calling
//! [`KnnQuery::distance_object_left`] (or
//! [`RangeQuery::distance_object_left`]) as it visits candidates; the query
//! object keeps its own bounded result set and distance-computation counter
//! so indexes never touch `Space::distance` directly and lose track of
//! orientation or bookkeeping.

pub mod result;

use crate::object::{Object, ObjectId};
use crate::space::{Dist, Space};
use result::BoundedResultSet;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

/// A bounded-k nearest-neighbor query against a single query object.
pub struct KnnQuery<'s, 'q, S: Space + ?Sized> {
    space: &'s S,
    query: Object<'q>,
    results: BoundedResultSet,
    dist_computations: AtomicU64,
    eps: f32,
}

impl<'s, 'q, S: Space + ?Sized> KnnQuery<'s, 'q, S> {
    /// Builds a query for the `k` nearest neighbors of `query`. `eps` widens
    /// the *pruning* bound exposed via [`Self::pruning_radius`] by a
    /// relative factor (`1.0 + eps`): an index may keep exploring a subtree
    /// whose lower bound is within that widened bound instead of stopping
    /// as soon as it's beaten by the current worst kept distance, trading
    /// extra distance computations for recall. `eps = 0.0` means exact
    /// pruning. This never loosens admission into the bounded result set
    /// itself — [`Self::check_and_add`] always keeps only the true `k`
    /// closest.
    #[must_use]
    pub fn new(space: &'s S, query: Object<'q>, k: usize, eps: f32) -> Self {
        Self {
            space,
            query,
            results: BoundedResultSet::new(k),
            dist_computations: AtomicU64::new(0),
            eps,
        }
    }

    /// The query object.
    #[must_use]
    pub const fn query_object(&self) -> &Object<'q> {
        &self.query
    }

    /// Computes the distance from `candidate` (the left/data-side argument,
    /// per [`Space`]'s orientation convention) to this query's object,
    /// bumping the distance-computation counter.
    pub fn distance_object_left(&self, candidate: &Object<'_>) -> Dist {
        self.dist_computations.fetch_add(1, AtomicOrdering::Relaxed);
        self.space.distance(candidate, &self.query)
    }

    /// Offers `(id, dist)` into the bounded result set, where `dist` was
    /// already computed (e.g. via [`Self::distance_object_left`]).
    pub fn check_and_add(&mut self, id: ObjectId, dist: Dist) -> bool {
        self.results.check_and_add(id, dist)
    }

    /// Computes the distance to `candidate` and offers it in one step.
    pub fn check_and_add_object(&mut self, candidate: &Object<'_>) -> bool {
        let dist = self.distance_object_left(candidate);
        self.check_and_add(candidate.id(), dist)
    }

    /// Current admission radius: `+inf` until the set is full, then the
    /// worst admitted distance.
    #[must_use]
    pub fn radius(&self) -> Dist {
        self.results.worst_distance()
    }

    /// `(1 + eps) * radius()` — the relaxed bound a beam search may use to
    /// decide whether a candidate's lower bound still justifies exploring
    /// it further (spec §4.2's `eps`-pruning rule), rather than the exact
    /// [`Self::radius`] used for actual result-set admission.
    #[must_use]
    pub fn pruning_radius(&self) -> Dist {
        self.radius() * (1.0 + self.eps)
    }

    /// Total number of [`Space::distance`] calls made on behalf of this
    /// query so far.
    #[must_use]
    pub fn dist_computations(&self) -> u64 {
        self.dist_computations.load(AtomicOrdering::Relaxed)
    }

    /// Drains the accumulated results, sorted ascending by distance (ties
    /// broken by ascending object id), consuming this query.
    #[must_use]
    pub fn results_sorted(self) -> Vec<(ObjectId, Dist)> {
        self.results.into_sorted()
    }

    /// Resets accumulated results and the distance counter, reusing this
    /// query for a fresh search against the same query object (e.g. a
    /// second index in a composite search).
    pub fn reset(&mut self, k: usize) {
        self.results = BoundedResultSet::new(k);
        self.dist_computations.store(0, AtomicOrdering::Relaxed);
    }
}

/// A range query: every candidate within `radius` of the query object is
/// admitted, unbounded in count.
pub struct RangeQuery<'s, 'q, S: Space + ?Sized> {
    space: &'s S,
    query: Object<'q>,
    radius: Dist,
    matches: Vec<(ObjectId, Dist)>,
    dist_computations: AtomicU64,
}

impl<'s, 'q, S: Space + ?Sized> RangeQuery<'s, 'q, S> {
    /// Builds a range query admitting any object within `radius` of `query`.
    #[must_use]
    pub fn new(space: &'s S, query: Object<'q>, radius: Dist) -> Self {
        Self {
            space,
            query,
            radius,
            matches: Vec::new(),
            dist_computations: AtomicU64::new(0),
        }
    }

    /// The query object.
    #[must_use]
    pub const fn query_object(&self) -> &Object<'q> {
        &self.query
    }

    /// The admission radius.
    #[must_use]
    pub const fn radius(&self) -> Dist {
        self.radius
    }

    /// Computes the distance from `candidate` to this query's object,
    /// bumping the distance-computation counter.
    pub fn distance_object_left(&self, candidate: &Object<'_>) -> Dist {
        self.dist_computations.fetch_add(1, AtomicOrdering::Relaxed);
        self.space.distance(candidate, &self.query)
    }

    /// Offers `(id, dist)`; admitted iff `dist <= radius`.
    pub fn check_and_add(&mut self, id: ObjectId, dist: Dist) -> bool {
        if dist.is_nan() || dist > self.radius {
            return false;
        }
        self.matches.push((id, dist));
        true
    }

    /// Computes the distance to `candidate` and offers it in one step.
    pub fn check_and_add_object(&mut self, candidate: &Object<'_>) -> bool {
        let dist = self.distance_object_left(candidate);
        self.check_and_add(candidate.id(), dist)
    }

    /// Total number of [`Space::distance`] calls made on behalf of this
    /// query so far.
    #[must_use]
    pub fn dist_computations(&self) -> u64 {
        self.dist_computations.load(AtomicOrdering::Relaxed)
    }

    /// Drains accumulated matches, sorted ascending by distance (ties
    /// broken by ascending object id).
    #[must_use]
    pub fn results_sorted(mut self) -> Vec<(ObjectId, Dist)> {
        self.matches.sort_by(|a, b| {
            a.1.partial_cmp(&b.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });
        self.matches
    }

    /// Clears accumulated matches and the distance counter, reusing this
    /// query for a fresh search against the same query object.
    pub fn reset(&mut self) {
        self.matches.clear();
        self.dist_computations.store(0, AtomicOrdering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::space::builtin::DenseL2Space;

    fn vec_obj(id: ObjectId, values: &[f32]) -> Object<'static> {
        Object::new_owned(id, -1, values.iter().flat_map(|f| f.to_le_bytes()).collect())
    }

    #[test]
    fn knn_query_returns_k_closest_sorted() {
        let space = DenseL2Space;
        let query = vec_obj(100, &[0.0, 0.0]);
        let mut q = KnnQuery::new(&space, query, 2, 0.0);
        for (id, values) in [(1, [0.0, 5.0]), (2, [0.0, 1.0]), (3, [0.0, 2.0]), (4, [0.0, 9.0])] {
            q.check_and_add_object(&vec_obj(id, &values));
        }
        let results = q.results_sorted();
        assert_eq!(results.iter().map(|(id, _)| *id).collect::<Vec<_>>(), vec![2, 3]);
    }

    #[test]
    fn knn_query_result_size_is_min_k_and_dataset_size() {
        let space = DenseL2Space;
        let query = vec_obj(0, &[0.0]);
        let mut q = KnnQuery::new(&space, query, 10, 0.0);
        for id in 1..4 {
            q.check_and_add_object(&vec_obj(id, &[id as f32]));
        }
        assert_eq!(q.results_sorted().len(), 3);
    }

    #[test]
    fn range_query_admits_within_radius_only() {
        let space = DenseL2Space;
        let query = vec_obj(0, &[0.0]);
        let mut q = RangeQuery::new(&space, query, 2.0);
        for id in 0..5 {
            q.check_and_add_object(&vec_obj(id, &[id as f32]));
        }
        let results = q.results_sorted();
        assert_eq!(results.iter().map(|(id, _)| *id).collect::<Vec<_>>(), vec![0, 1, 2]);
    }

    #[test]
    fn pruning_radius_widens_by_one_plus_eps() {
        let space = DenseL2Space;
        let query = vec_obj(0, &[0.0]);
        let mut q = KnnQuery::new(&space, query, 1, 0.5);
        q.check_and_add_object(&vec_obj(1, &[2.0]));
        assert!((q.pruning_radius() - 3.0).abs() < 1e-6, "got {}", q.pruning_radius());
    }

    #[test]
    fn pruning_radius_matches_radius_when_eps_is_zero() {
        let space = DenseL2Space;
        let query = vec_obj(0, &[0.0]);
        let mut q = KnnQuery::new(&space, query, 1, 0.0);
        q.check_and_add_object(&vec_obj(1, &[2.0]));
        assert_eq!(q.pruning_radius(), q.radius());
    }

    #[test]
    fn reset_clears_counters_and_results() {
        let space = DenseL2Space;
        let query = vec_obj(0, &[0.0]);
        let mut q = KnnQuery::new(&space, query, 1, 0.0);
        q.check_and_add_object(&vec_obj(1, &[1.0]));
        assert_eq!(q.dist_computations(), 1);
        q.reset(1);
        assert_eq!(q.dist_computations(), 0);
        assert!(q.results_sorted().is_empty());
    }
}
