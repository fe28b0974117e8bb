//! The HNSW graph: insertion, greedy descent, and beam search.
//!
//! Structurally this is the teacher's `NativeHnsw` (index-based adjacency,
//! one `RwLock` per node-per-layer, atomics for the entry point/level/RNG
//! state, xorshift64 level sampling) generalized from a fixed
//! `DistanceEngine` over `Vec<f32>` to an arbitrary [`Space`] over
//! [`Object`]. Neighbor pruning additionally supports all four
//! `delaunay_type` variants from the original HNSW paper rather than only
//! the VAMANA-alpha heuristic.

use crate::error::{Error, Result};
use crate::hnsw::layer::{Layer, NodeId};
use crate::hnsw::params::HnswParams;
use crate::knn::result::Distance;
use crate::knn::{KnnQuery, RangeQuery};
use crate::object::{Object, ObjectId};
use crate::space::{Dist, Space};
use parking_lot::RwLock;
use rayon::prelude::*;
use rustc_hash::{FxHashMap, FxHashSet};
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// An HNSW approximate nearest-neighbor index over objects from a single
/// [`Space`].
pub struct HnswIndex<S: Space> {
    space: S,
    params: HnswParams,
    objects: RwLock<Vec<Object<'static>>>,
    id_index: RwLock<FxHashMap<ObjectId, NodeId>>,
    layers: RwLock<Vec<Layer>>,
    entry_point: RwLock<Option<NodeId>>,
    max_layer: AtomicUsize,
    count: AtomicUsize,
    rng_state: AtomicU64,
}

impl<S: Space> HnswIndex<S> {
    /// Builds an empty index over `space` with the given construction
    /// parameters.
    #[must_use]
    pub fn new(space: S, params: HnswParams) -> Self {
        Self {
            space,
            params,
            objects: RwLock::new(Vec::new()),
            id_index: RwLock::new(FxHashMap::default()),
            layers: RwLock::new(vec![Layer::new(0)]),
            entry_point: RwLock::new(None),
            max_layer: AtomicUsize::new(0),
            count: AtomicUsize::new(0),
            rng_state: AtomicU64::new(0x5DEE_CE66_D1A4_B5B5),
        }
    }

    /// The space this index was built over.
    #[must_use]
    pub const fn space(&self) -> &S {
        &self.space
    }

    /// The construction parameters this index was built with.
    #[must_use]
    pub const fn params(&self) -> &HnswParams {
        &self.params
    }

    /// Number of objects currently indexed.
    #[must_use]
    pub fn len(&self) -> usize {
        self.count.load(Ordering::Relaxed)
    }

    /// Whether the index holds no objects.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Inserts `object` into the index.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvariantViolation`] if `object`'s id is already
    /// present (ids must be unique within one index, spec §3).
    pub fn insert(&self, object: Object<'_>) -> Result<ObjectId> {
        let external_id = object.id();
        {
            let mut index = self.id_index.write();
            if index.contains_key(&external_id) {
                return Err(Error::InvariantViolation(format!(
                    "object id {external_id} already present in index"
                )));
            }
            let node_id = {
                let mut objects = self.objects.write();
                let node_id = objects.len();
                objects.push(object.to_owned_object());
                node_id
            };
            index.insert(external_id, node_id);
            self.insert_node(node_id, self.random_level());
            tracing::trace!(external_id, node_id, "hnsw insert");
        }
        self.count.fetch_add(1, Ordering::Relaxed);
        Ok(external_id)
    }

    /// Inserts every object in `objects` in order, precomputing each node's
    /// level in parallel via `rayon` before wiring any of them into the
    /// graph. Level assignment depends only on each object's position
    /// within the batch, not on thread scheduling, so the resulting graph
    /// is identical to a sequential build regardless of worker count.
    ///
    /// The graph-mutating portion of the insert is unavoidably sequential
    /// (each node's neighbors depend on the graph as left by the previous
    /// insert), matching the teacher's own "parallel batch insert" which
    /// likewise reduces to a sequential loop once the embarrassingly
    /// parallel precomputation is done.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvariantViolation`] on the first duplicate object
    /// id encountered; objects before it in the batch remain inserted.
    pub fn insert_batch(&self, objects: Vec<Object<'_>>) -> Result<Vec<ObjectId>> {
        let level_mult = self.params.level_mult();
        let cap = self.params.max_level_cap;
        let levels: Vec<usize> = objects
            .par_iter()
            .enumerate()
            .map(|(i, _)| Self::level_for_index(i as u64, level_mult, cap))
            .collect();

        let mut ids = Vec::with_capacity(objects.len());
        for (object, node_level) in objects.into_iter().zip(levels) {
            let external_id = object.id();
            {
                let mut index = self.id_index.write();
                if index.contains_key(&external_id) {
                    return Err(Error::InvariantViolation(format!(
                        "object id {external_id} already present in index"
                    )));
                }
                let node_id = {
                    let mut objs = self.objects.write();
                    let node_id = objs.len();
                    objs.push(object.to_owned_object());
                    node_id
                };
                index.insert(external_id, node_id);
                self.insert_node(node_id, node_level);
                tracing::trace!(external_id, node_id, "hnsw batch insert");
            }
            self.count.fetch_add(1, Ordering::Relaxed);
            ids.push(external_id);
        }
        tracing::debug!(count = ids.len(), "hnsw batch insert complete");
        Ok(ids)
    }

    /// Deterministic level draw for the `index`-th object of a batch
    /// (splitmix64-style mix over the index, independent of any shared
    /// mutable RNG state), so [`Self::insert_batch`]'s precomputation stage
    /// can run out of order across threads.
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    fn level_for_index(index: u64, level_mult: f64, cap: usize) -> usize {
        let mut state = index ^ 0x5DEE_CE66_D1A4_B5B5;
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        state = state.wrapping_mul(0x9E37_79B9_7F4A_7C15);
        let uniform = ((state >> 11) as f64) / (1u64 << 53) as f64;
        let level = (-(uniform.max(f64::MIN_POSITIVE)).ln() * level_mult).floor() as usize;
        level.min(cap)
    }

    fn insert_node(&self, node_id: NodeId, node_level: usize) {
        {
            let mut layers = self.layers.write();
            while layers.len() <= node_level {
                layers.push(Layer::new(node_id + 1));
            }
            for layer in layers.iter_mut() {
                layer.ensure_capacity(node_id);
            }
        }

        let entry_point = *self.entry_point.read();
        let Some(ep) = entry_point else {
            *self.entry_point.write() = Some(node_id);
            self.max_layer.store(node_level, Ordering::Relaxed);
            return;
        };

        let max_layer = self.max_layer.load(Ordering::Relaxed);
        let mut current_ep = ep;
        for layer_idx in (node_level + 1..=max_layer).rev() {
            current_ep = self.search_layer_single(node_id, current_ep, layer_idx);
        }

        // Layers above the old max_layer were just created empty, so the
        // search at those layers trivially returns `current_ep` (still
        // `ep`) as the sole candidate — this is what wires the new node to
        // the rest of the graph when it becomes the new top layer.
        for layer_idx in (0..=node_level).rev() {
            let candidates = self.search_layer_by_node(node_id, vec![current_ep], self.params.ef_construction, layer_idx);
            let max_conn = if layer_idx == 0 { self.params.m0 } else { self.params.m };
            let selected = self.select_neighbors(node_id, candidates.clone(), max_conn, layer_idx);

            self.layers.read()[layer_idx].set_neighbors(node_id, selected.clone());
            for &neighbor in &selected {
                self.add_bidirectional_connection(node_id, neighbor, layer_idx, max_conn);
            }

            if let Some(&(nearest, _)) = candidates.first() {
                current_ep = nearest;
            }
        }

        if node_level > max_layer {
            self.max_layer.store(node_level, Ordering::Relaxed);
            *self.entry_point.write() = Some(node_id);
        }
    }

    /// Finds the `k` approximate nearest objects to `query`.
    ///
    /// `ef_search` overrides [`HnswParams::ef_search`] for this call only;
    /// pass `None` to use the configured default. Routes the layer-0 beam
    /// through a [`KnnQuery`] (spec's query data-flow contract), using
    /// [`HnswParams::eps`] to relax the beam's stopping bound — see
    /// [`KnnQuery::pruning_radius`].
    #[must_use]
    pub fn knn(&self, query: &Object<'_>, k: usize, ef_search: Option<usize>) -> Vec<(ObjectId, Dist)> {
        let Some(ep) = *self.entry_point.read() else {
            return Vec::new();
        };
        let ef = ef_search.unwrap_or(self.params.ef_search).max(k);
        let max_layer = self.max_layer.load(Ordering::Relaxed);
        tracing::debug!(k, ef, max_layer, "hnsw knn search");

        let mut current_ep = ep;
        for layer_idx in (1..=max_layer).rev() {
            current_ep = self.search_layer_single_query(query, current_ep, layer_idx);
        }

        let mut query_result = KnnQuery::new(&self.space, query.to_owned_object(), k, self.params.eps);
        let candidates = self.search_layer_by_query(&query_result, vec![current_ep], ef, 0, self.params.eps);
        let objects = self.objects.read();
        for (node_id, dist) in candidates {
            query_result.check_and_add(objects[node_id].id(), dist);
        }
        drop(objects);
        query_result.results_sorted()
    }

    /// Runs [`Self::knn`] for every query in `queries` concurrently via
    /// `rayon`, mirroring the teacher's `search_batch_parallel`. Each query
    /// is independent read-only traversal, so this is embarrassingly
    /// parallel unlike [`Self::insert_batch`].
    #[must_use]
    pub fn knn_batch(&self, queries: &[Object<'_>], k: usize, ef_search: Option<usize>) -> Vec<Vec<(ObjectId, Dist)>> {
        queries.par_iter().map(|q| self.knn(q, k, ef_search)).collect()
    }

    /// Finds every object within `radius` of `query`, sorted ascending by
    /// distance (ties broken by ascending object id).
    ///
    /// Unlike [`Self::knn`] there is no `k` to size the beam by, so this
    /// widens the layer-0 search to the whole population reachable from the
    /// descended entry point before filtering by radius — exact for a
    /// connected layer-0 graph, same caveat as [`Self::knn`] otherwise.
    /// Routes admission through a [`RangeQuery`], consistent with
    /// [`Self::knn`].
    #[must_use]
    pub fn range(&self, query: &Object<'_>, radius: Dist) -> Vec<(ObjectId, Dist)> {
        let Some(ep) = *self.entry_point.read() else {
            return Vec::new();
        };
        let max_layer = self.max_layer.load(Ordering::Relaxed);
        let mut current_ep = ep;
        for layer_idx in (1..=max_layer).rev() {
            current_ep = self.search_layer_single_query(query, current_ep, layer_idx);
        }

        let ef = self.objects.read().len().max(1);
        let mut query_result = RangeQuery::new(&self.space, query.to_owned_object(), radius);
        let candidates = self.search_layer_by_range_query(&query_result, vec![current_ep], ef);
        let objects = self.objects.read();
        for (node_id, dist) in candidates {
            query_result.check_and_add(objects[node_id].id(), dist);
        }
        drop(objects);
        query_result.results_sorted()
    }

    /// Applies the configured [`PostProcessing`] level: re-runs neighbor
    /// selection for every node against its current layer-0 neighbors'
    /// neighbors, repairing links left asymmetric by build-time pruning.
    pub fn optimize(&self) {
        for _ in 0..self.params.post.passes() {
            let node_count = self.objects.read().len();
            for node_id in 0..node_count {
                let layers_len = self.layers.read().len();
                for layer_idx in 0..layers_len {
                    let current = self.layers.read()[layer_idx].get_neighbors(node_id);
                    if current.is_empty() {
                        continue;
                    }
                    let with_dist: Vec<(NodeId, Dist)> = current
                        .iter()
                        .map(|&n| (n, self.distance_nodes(node_id, n)))
                        .collect();
                    let max_conn = if layer_idx == 0 { self.params.m0 } else { self.params.m };
                    let selected = self.select_neighbors(node_id, with_dist, max_conn, layer_idx);
                    self.layers.read()[layer_idx].set_neighbors(node_id, selected);
                }
            }
        }
    }

    /// Rebuilds an index from parts written out by [`crate::persistence`]:
    /// every object in insertion order, each layer's adjacency lists, the
    /// entry point, and the max layer reached.
    #[must_use]
    pub fn from_parts(
        space: S,
        params: HnswParams,
        objects: Vec<Object<'static>>,
        layers_raw: Vec<Vec<Vec<NodeId>>>,
        entry_point: Option<NodeId>,
        max_layer: usize,
    ) -> Self {
        let mut id_index = FxHashMap::default();
        for (node_id, object) in objects.iter().enumerate() {
            id_index.insert(object.id(), node_id);
        }
        let layers = layers_raw
            .into_iter()
            .map(|raw| {
                let layer = Layer::new(raw.len());
                for (node_id, neighbors) in raw.into_iter().enumerate() {
                    layer.set_neighbors(node_id, neighbors);
                }
                layer
            })
            .collect();
        Self {
            space,
            params,
            count: AtomicUsize::new(objects.len()),
            objects: RwLock::new(objects),
            id_index: RwLock::new(id_index),
            layers: RwLock::new(layers),
            entry_point: RwLock::new(entry_point),
            max_layer: AtomicUsize::new(max_layer),
            rng_state: AtomicU64::new(0x5DEE_CE66_D1A4_B5B5),
        }
    }

    /// A clone of every object currently indexed, in insertion order.
    #[must_use]
    pub fn objects_snapshot(&self) -> Vec<Object<'static>> {
        self.objects.read().clone()
    }

    /// A clone of every layer's adjacency lists, indexed by node id.
    #[must_use]
    pub fn layers_snapshot(&self) -> Vec<Vec<Vec<NodeId>>> {
        self.layers
            .read()
            .iter()
            .map(|layer| (0..layer.len()).map(|node_id| layer.get_neighbors(node_id)).collect())
            .collect()
    }

    /// The current entry point node, if the index is non-empty.
    #[must_use]
    pub fn entry_point_snapshot(&self) -> Option<NodeId> {
        *self.entry_point.read()
    }

    /// The highest layer currently reached by any node.
    #[must_use]
    pub fn max_layer_snapshot(&self) -> usize {
        self.max_layer.load(Ordering::Relaxed)
    }

    /// A snapshot of this index's size for logging/diagnostics.
    #[must_use]
    pub fn stats(&self) -> crate::stats::HnswStats {
        crate::stats::HnswStats {
            object_count: self.len(),
            layer_count: self.layers.read().len(),
            max_layer: self.max_layer_snapshot(),
        }
    }

    fn distance_nodes(&self, a: NodeId, b: NodeId) -> Dist {
        let objects = self.objects.read();
        self.space.distance(&objects[a], &objects[b])
    }

    fn distance_node_query(&self, node: NodeId, query: &Object<'_>) -> Dist {
        let objects = self.objects.read();
        self.space.distance(&objects[node], query)
    }

    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    fn random_level(&self) -> usize {
        let mut state = self.rng_state.load(Ordering::Relaxed);
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        self.rng_state.store(state, Ordering::Relaxed);

        let uniform = (state as f64) / (u64::MAX as f64);
        let level = (-uniform.ln() * self.params.level_mult()).floor() as usize;
        level.min(self.params.max_level_cap)
    }

    fn search_layer_single(&self, node: NodeId, entry: NodeId, layer: usize) -> NodeId {
        let mut best = entry;
        let mut best_dist = self.distance_nodes(node, entry);
        loop {
            let neighbors = self.layers.read()[layer].get_neighbors(best);
            let mut improved = false;
            for neighbor in neighbors {
                let dist = self.distance_nodes(node, neighbor);
                if dist < best_dist {
                    best = neighbor;
                    best_dist = dist;
                    improved = true;
                }
            }
            if !improved {
                break;
            }
        }
        best
    }

    fn search_layer_single_query(&self, query: &Object<'_>, entry: NodeId, layer: usize) -> NodeId {
        let mut best = entry;
        let mut best_dist = self.distance_node_query(entry, query);
        loop {
            let neighbors = self.layers.read()[layer].get_neighbors(best);
            let mut improved = false;
            for neighbor in neighbors {
                let dist = self.distance_node_query(neighbor, query);
                if dist < best_dist {
                    best = neighbor;
                    best_dist = dist;
                    improved = true;
                }
            }
            if !improved {
                break;
            }
        }
        best
    }

    fn search_layer_by_node(
        &self,
        node: NodeId,
        entry_points: Vec<NodeId>,
        ef: usize,
        layer: usize,
    ) -> Vec<(NodeId, Dist)> {
        self.search_layer_generic(entry_points, ef, layer, 0.0, |candidate| {
            self.distance_nodes(node, candidate)
        })
    }

    /// Like [`Self::search_layer_generic`], but drives distance evaluation
    /// through `query_result` (spec's query data-flow contract) so its
    /// `dist_computations` counter reflects this search, and relaxes the
    /// beam's stopping bound by `eps` (see [`KnnQuery::pruning_radius`]).
    fn search_layer_by_query(
        &self,
        query_result: &KnnQuery<'_, '_, S>,
        entry_points: Vec<NodeId>,
        ef: usize,
        layer: usize,
        eps: f32,
    ) -> Vec<(NodeId, Dist)> {
        self.search_layer_generic(entry_points, ef, layer, eps, |candidate| {
            query_result.distance_object_left(&self.objects.read()[candidate])
        })
    }

    /// Like [`Self::search_layer_by_query`], but drives distance evaluation
    /// through a [`RangeQuery`] instead, with no stopping-bound relaxation
    /// (a range query's admission is a fixed radius, not a beam to prune).
    fn search_layer_by_range_query(
        &self,
        query_result: &RangeQuery<'_, '_, S>,
        entry_points: Vec<NodeId>,
        ef: usize,
    ) -> Vec<(NodeId, Dist)> {
        self.search_layer_generic(entry_points, ef, 0, 0.0, |candidate| {
            query_result.distance_object_left(&self.objects.read()[candidate])
        })
    }

    /// Best-first beam search at one layer: a visited-set-guarded expansion
    /// from `entry_points`, admitting up to `ef` candidates into a
    /// max-heap result set, same structure as the teacher's `search_layer`.
    /// `eps` relaxes the stopping bound: a candidate whose lower bound is
    /// within `(1 + eps)` of the current worst kept distance is still
    /// explored rather than pruned outright (spec §4.2).
    fn search_layer_generic(
        &self,
        entry_points: Vec<NodeId>,
        ef: usize,
        layer: usize,
        eps: f32,
        dist_fn: impl Fn(NodeId) -> Dist,
    ) -> Vec<(NodeId, Dist)> {
        let mut visited: FxHashSet<NodeId> = FxHashSet::default();
        let mut candidates: BinaryHeap<Reverse<(Distance, NodeId)>> = BinaryHeap::new();
        let mut results: BinaryHeap<(Distance, NodeId)> = BinaryHeap::new();

        for ep in entry_points {
            if !visited.insert(ep) {
                continue;
            }
            let dist = dist_fn(ep);
            candidates.push(Reverse((Distance(dist), ep)));
            results.push((Distance(dist), ep));
        }

        while let Some(Reverse((c_dist, c_node))) = candidates.pop() {
            let furthest = results.peek().map_or(Distance(f32::INFINITY), |r| r.0);
            let stop_bound = Distance(furthest.0 * (1.0 + eps));
            if c_dist > stop_bound && results.len() >= ef {
                break;
            }

            let neighbors = self.layers.read()[layer].get_neighbors(c_node);
            for neighbor in neighbors {
                if !visited.insert(neighbor) {
                    continue;
                }
                let dist = dist_fn(neighbor);
                let furthest = results.peek().map_or(Distance(f32::INFINITY), |r| r.0);
                if Distance(dist) < furthest || results.len() < ef {
                    candidates.push(Reverse((Distance(dist), neighbor)));
                    results.push((Distance(dist), neighbor));
                    if results.len() > ef {
                        results.pop();
                    }
                }
            }
        }

        let mut out: Vec<(NodeId, Dist)> = results.into_iter().map(|(d, n)| (n, d.0)).collect();
        out.sort_by(|a, b| Distance(a.1).cmp(&Distance(b.1)));
        out
    }

    /// Selects up to `max_conn` neighbors for `new_node` from `candidates`
    /// (each already carrying its distance to `new_node`), applying the
    /// configured [`DelaunayType`].
    fn select_neighbors(
        &self,
        new_node: NodeId,
        candidates: Vec<(NodeId, Dist)>,
        max_conn: usize,
        layer_idx: usize,
    ) -> Vec<NodeId> {
        if !self.params.delaunay_type.is_heuristic() {
            let mut sorted = candidates;
            sorted.sort_by(|a, b| Distance(a.1).cmp(&Distance(b.1)));
            sorted.truncate(max_conn);
            return sorted.into_iter().map(|(id, _)| id).collect();
        }

        let mut working = candidates;
        if self.params.delaunay_type.extends_candidates() {
            let mut seen: FxHashSet<NodeId> = working.iter().map(|(id, _)| *id).collect();
            seen.insert(new_node);
            let extra: Vec<NodeId> = working
                .iter()
                .flat_map(|(id, _)| self.layers.read()[layer_idx].get_neighbors(*id))
                .collect();
            for e in extra {
                if seen.insert(e) {
                    working.push((e, self.distance_nodes(new_node, e)));
                }
            }
        }
        working.sort_by(|a, b| Distance(a.1).cmp(&Distance(b.1)));

        let mut selected: Vec<NodeId> = Vec::with_capacity(max_conn);
        let mut discarded: Vec<NodeId> = Vec::new();
        for (cand_id, cand_dist) in working {
            if selected.len() >= max_conn {
                break;
            }
            let is_diverse = selected
                .iter()
                .all(|&s| cand_dist < self.distance_nodes(cand_id, s));
            if is_diverse {
                selected.push(cand_id);
            } else {
                discarded.push(cand_id);
            }
        }
        if self.params.delaunay_type.keeps_pruned() {
            for cand_id in discarded {
                if selected.len() >= max_conn {
                    break;
                }
                selected.push(cand_id);
            }
        }
        selected
    }

    /// Mirrors the teacher's `add_bidirectional_connection`: wires `new_node`
    /// into `neighbor`'s adjacency, pruning `neighbor`'s list back down to
    /// `max_conn` via [`Self::select_neighbors`] if it would overflow.
    ///
    /// Pruning here is one-directional — it does not repair `new_node`'s own
    /// list if `neighbor` happens to get dropped by a later insert's
    /// pruning. See Design Notes on bidirectionality.
    fn add_bidirectional_connection(&self, new_node: NodeId, neighbor: NodeId, layer: usize, max_conn: usize) {
        let current = self.layers.read()[layer].get_neighbors(neighbor);
        if current.len() < max_conn {
            let layers = self.layers.read();
            let mut updated = layers[layer].get_neighbors(neighbor);
            updated.push(new_node);
            layers[layer].set_neighbors(neighbor, updated);
            return;
        }

        let mut all_with_dist: Vec<(NodeId, Dist)> = current
            .iter()
            .map(|&n| (n, self.distance_nodes(neighbor, n)))
            .collect();
        all_with_dist.push((new_node, self.distance_nodes(neighbor, new_node)));

        let pruned = self.select_neighbors(neighbor, all_with_dist, max_conn, layer);
        self.layers.read()[layer].set_neighbors(neighbor, pruned);
    }
}
