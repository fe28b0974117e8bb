//! NAPP: a pivot-neighborhood inverted index for approximate search under
//! arbitrary (including non-metric) dissimilarities (spec §4.7), grounded in
//! nmslib's `PivotNeighbInvertedIndex` (Tellez, Chavez & Navarro, SISAP
//! 2011): sample a set of reference objects ("pivots"), assign each dataset
//! object the `num_prefix` pivots it's closest to, and at query time treat a
//! shared-pivot-count threshold as a cheap proxy for "probably close to the
//! query" before falling back to the space's real distance.
//!
//! Unlike HNSW this index is built in one batch rather than incrementally —
//! nmslib's implementation is batch-only too — so there's no per-node
//! locking: the structure is read-only once [`NappIndex::build`] returns.

pub mod params;
pub mod scan_count;

use crate::config::ParamManager;
use crate::error::{Error, Result};
use crate::knn::KnnQuery;
use crate::object::{Object, ObjectId, ObjectVector};
use crate::space::pivot::{DummyPivotIndex, PivotIndex};
use crate::space::{Dist, Space};
use params::NappParams;
use rayon::prelude::*;
use rustc_hash::FxHashMap;
use scan_count::process;
use std::cmp::Ordering;

struct Chunk {
    len: usize,
    /// pivot id -> ascending-sorted local object ids (0..len) assigned to
    /// that pivot's neighborhood within this chunk.
    posting_lists: FxHashMap<u32, Vec<u32>>,
}

/// A built NAPP index over a fixed dataset and pivot set.
pub struct NappIndex<S: Space> {
    space: S,
    params: NappParams,
    pivots: ObjectVector<'static>,
    objects: Vec<Object<'static>>,
    chunks: Vec<Chunk>,
}

impl<S: Space> NappIndex<S> {
    /// Builds a NAPP index over `objects` using `pivots` as the reference
    /// set (`pivots.len()` must equal `params.num_pivot`).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the pivot count or prefix sizes are
    /// inconsistent with `params`.
    pub fn build(
        space: S,
        params: NappParams,
        pivots: ObjectVector<'static>,
        objects: Vec<Object<'static>>,
    ) -> Result<Self> {
        if pivots.len() != params.num_pivot {
            return Err(Error::config(
                "numPivot",
                format!("expected {} pivots, got {}", params.num_pivot, pivots.len()),
            ));
        }

        let chunk_size = params.chunk_index_size.max(1);
        tracing::debug!(
            num_pivot = params.num_pivot,
            num_prefix = params.num_prefix,
            object_count = objects.len(),
            "napp build starting"
        );
        let chunks = {
            let pivot_index = build_pivot_index(&space, &pivots, &params);
            // Each chunk's pivot-neighborhood assignment only reads from
            // `pivot_index`/`pivots` and writes its own posting lists, so
            // chunks build independently in parallel.
            objects
                .par_chunks(chunk_size)
                .map(|chunk_objs| {
                    let mut dists = vec![0.0f32; params.num_pivot];
                    let mut posting_lists: FxHashMap<u32, Vec<u32>> = FxHashMap::default();
                    for (local_id, object) in chunk_objs.iter().enumerate() {
                        pivot_index.compute_pivot_distances_index_time(object, &mut dists);
                        for pivot_id in closest_pivots(&dists, params.num_prefix) {
                            posting_lists.entry(pivot_id).or_default().push(local_id as u32);
                        }
                    }
                    for list in posting_lists.values_mut() {
                        list.sort_unstable();
                    }
                    Chunk {
                        len: chunk_objs.len(),
                        posting_lists,
                    }
                })
                .collect::<Vec<_>>()
        };

        Ok(Self {
            space,
            params,
            pivots,
            objects,
            chunks,
        })
    }

    /// Number of objects indexed.
    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Whether the index holds no objects.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// The parameters this index was built with.
    #[must_use]
    pub const fn params(&self) -> &NappParams {
        &self.params
    }

    /// The sampled pivot set, in build order.
    #[must_use]
    pub fn pivots_snapshot(&self) -> &[Object<'static>] {
        &self.pivots
    }

    /// Every indexed object, in build order.
    #[must_use]
    pub fn objects_snapshot(&self) -> &[Object<'static>] {
        &self.objects
    }

    /// Each chunk's `(len, posting_lists)`, in build order — used by
    /// [`crate::persistence`] to serialize the already-assigned
    /// pivot-neighborhoods rather than recomputing them on load.
    #[must_use]
    pub fn chunks_snapshot(&self) -> Vec<(usize, Vec<(u32, Vec<u32>)>)> {
        self.chunks
            .iter()
            .map(|chunk| {
                let mut lists: Vec<(u32, Vec<u32>)> = chunk
                    .posting_lists
                    .iter()
                    .map(|(&pivot_id, ids)| (pivot_id, ids.clone()))
                    .collect();
                lists.sort_by_key(|(pivot_id, _)| *pivot_id);
                (chunk.len, lists)
            })
            .collect()
    }

    /// Rebuilds an index from parts written out by [`crate::persistence`],
    /// trusting that `chunks` already reflects `params`/`pivots`/`objects`
    /// (skips recomputing pivot-neighborhood assignment).
    #[must_use]
    pub fn from_parts(
        space: S,
        params: NappParams,
        pivots: ObjectVector<'static>,
        objects: Vec<Object<'static>>,
        chunks: Vec<(usize, Vec<(u32, Vec<u32>)>)>,
    ) -> Self {
        let chunks = chunks
            .into_iter()
            .map(|(len, lists)| Chunk {
                len,
                posting_lists: lists.into_iter().collect(),
            })
            .collect();
        Self {
            space,
            params,
            pivots,
            objects,
            chunks,
        }
    }

    /// Finds the approximate `k` nearest neighbors of `query`.
    ///
    /// Computes the query's `num_prefix_search` closest pivots, counts
    /// shared pivots per dataset object via the configured
    /// [`scan_count::InvProcAlg`], keeps objects meeting `min_times` (up to
    /// the `db_scan_frac`/`knn_amp` budget), and re-ranks that candidate set
    /// by the space's real distance. If fewer than `k` candidates clear
    /// `min_times` and `skip_checking` is unset, `min_times` is relaxed one
    /// step at a time until enough are found (bottoming out at 1).
    #[must_use]
    pub fn knn(&self, query: &Object<'_>, k: usize) -> Vec<(ObjectId, Dist)> {
        if k == 0 || self.objects.is_empty() {
            return Vec::new();
        }

        let pivot_index = self.pivot_index();
        let mut dists = vec![0.0f32; self.params.num_pivot];
        pivot_index.compute_pivot_distances_query_time(query, &mut dists);
        let query_pivots = closest_pivots(&dists, self.params.num_prefix_search);

        let mut min_times = self.params.min_times;
        let candidates = loop {
            let found = self.collect_candidates(&query_pivots, min_times, k);
            if found.len() >= k || min_times <= 1 || self.params.skip_checking {
                tracing::trace!(min_times, found = found.len(), "napp candidate scan");
                break found;
            }
            min_times -= 1;
        };

        let mut query_result = KnnQuery::new(&self.space, query.to_owned_object(), k, 0.0);
        for (global_id, _shared_pivots) in candidates {
            query_result.check_and_add_object(&self.objects[global_id]);
        }
        query_result.results_sorted()
    }

    /// Finds every object within `radius` of `query`, sorted ascending by
    /// distance (ties broken by ascending object id).
    ///
    /// There is no `k` to size the candidate-scan budget by, and no `k` for
    /// `min_times` relaxation to fall short of, so this scans the whole
    /// dataset as candidates at the configured `min_times` and filters the
    /// re-ranked set by radius.
    #[must_use]
    pub fn range(&self, query: &Object<'_>, radius: Dist) -> Vec<(ObjectId, Dist)> {
        if self.objects.is_empty() {
            return Vec::new();
        }

        let pivot_index = self.pivot_index();
        let mut dists = vec![0.0f32; self.params.num_pivot];
        pivot_index.compute_pivot_distances_query_time(query, &mut dists);
        let query_pivots = closest_pivots(&dists, self.params.num_prefix_search);

        let candidates = self.collect_candidates(&query_pivots, self.params.min_times, self.objects.len());

        let mut query_result = crate::knn::RangeQuery::new(&self.space, query.to_owned_object(), radius);
        for (global_id, _shared_pivots) in candidates {
            query_result.check_and_add_object(&self.objects[global_id]);
        }
        query_result.results_sorted()
    }

    fn collect_candidates(
        &self,
        query_pivots: &[u32],
        min_times: usize,
        k: usize,
    ) -> Vec<(usize, u32)> {
        let chunk_qty = self.chunks.len().max(1);
        let per_chunk_budget = self.compute_db_scan(k, chunk_qty);

        let mut candidates = Vec::new();
        let mut base = 0usize;
        for chunk in &self.chunks {
            let mut hits = process(
                self.params.inv_proc_alg,
                &chunk.posting_lists,
                query_pivots,
                chunk.len,
                min_times,
            );
            hits.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
            hits.truncate(per_chunk_budget);
            candidates.extend(hits.into_iter().map(|(local_id, count)| (base + local_id as usize, count)));
            base += chunk.len;
        }
        candidates
    }

    /// Per-chunk candidate budget, mirroring nmslib's `computeDbScan`: scan
    /// either a fraction of the dataset or `k * knn_amp` candidates total
    /// (whichever is configured), clipped to the dataset size and to at
    /// least `k`, then spread evenly across chunks.
    fn compute_db_scan(&self, k: usize, chunk_qty: usize) -> usize {
        let n = self.objects.len();
        let raw = if self.params.knn_amp > 0 {
            k.saturating_mul(self.params.knn_amp)
        } else {
            (self.params.db_scan_frac * n as f32).ceil() as usize
        };
        raw.min(n).max(k).div_ceil(chunk_qty)
    }

    fn pivot_index(&self) -> Box<dyn PivotIndex + '_> {
        build_pivot_index(&self.space, &self.pivots, &self.params)
    }

    /// A snapshot of this index's size for logging/diagnostics.
    #[must_use]
    pub fn stats(&self) -> crate::stats::NappStats {
        crate::stats::NappStats {
            object_count: self.objects.len(),
            pivot_count: self.pivots.len(),
            chunk_count: self.chunks.len(),
        }
    }
}

fn build_pivot_index<'p, S: Space>(
    space: &'p S,
    pivots: &'p [Object<'p>],
    params: &NappParams,
) -> Box<dyn PivotIndex + 'p> {
    if params.disable_pivot_index {
        Box::new(DummyPivotIndex::new(space, pivots))
    } else {
        space.create_pivot_index(pivots, params.hash_trick_dim)
    }
}

/// Indices of the `count` smallest values in `dists`, ascending by
/// `(distance, pivot id)`.
fn closest_pivots(dists: &[f32], count: usize) -> Vec<u32> {
    let mut idx: Vec<u32> = (0..dists.len() as u32).collect();
    idx.sort_by(|&a, &b| {
        dists[a as usize]
            .partial_cmp(&dists[b as usize])
            .unwrap_or(Ordering::Equal)
            .then(a.cmp(&b))
    });
    idx.truncate(count);
    idx
}

/// Convenience: parses [`NappParams`] from `key=value` pairs and builds.
///
/// # Errors
///
/// Returns [`Error::Config`] on bad parameters, as [`NappParams::from_params`].
pub fn build_from_pairs<S, I, P>(
    space: S,
    param_pairs: I,
    pivots: ObjectVector<'static>,
    objects: Vec<Object<'static>>,
) -> Result<NappIndex<S>>
where
    S: Space,
    I: IntoIterator<Item = P>,
    P: AsRef<str>,
{
    let params = ParamManager::from_pairs(param_pairs)?;
    let napp_params = NappParams::from_params(&params)?;
    params.check_unused()?;
    NappIndex::build(space, napp_params, pivots, objects)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::space::builtin::DenseL2Space;

    fn vec_obj(id: ObjectId, values: &[f32]) -> Object<'static> {
        Object::new_owned(id, -1, values.iter().flat_map(|f| f.to_le_bytes()).collect())
    }

    /// A 10x10 integer grid, ids 0..100, object `y*10+x` at `(x, y)`.
    fn grid_dataset() -> Vec<Object<'static>> {
        (0..100)
            .map(|id| {
                let x = (id % 10) as f32;
                let y = (id / 10) as f32;
                vec_obj(id, &[x, y])
            })
            .collect()
    }

    fn full_scan_params(num_pivot: usize) -> NappParams {
        // num_prefix == num_prefix_search == num_pivot and min_times = 1
        // degenerates NAPP into brute force: every object shares every
        // pivot with every query, so the shared-pivot filter admits all.
        NappParams {
            num_pivot,
            num_prefix: num_pivot,
            num_prefix_search: num_pivot,
            min_times: 1,
            chunk_index_size: 1024,
            db_scan_frac: 1.0,
            knn_amp: 0,
            skip_checking: false,
            disable_pivot_index: false,
            hash_trick_dim: None,
            inv_proc_alg: scan_count::InvProcAlg::Scan,
        }
    }

    #[test]
    fn degenerate_full_scan_matches_brute_force() {
        let objects = grid_dataset();
        let pivots: ObjectVector<'static> = objects.iter().take(8).map(Object::to_owned_object).collect();
        let params = full_scan_params(8);
        let index = NappIndex::build(DenseL2Space, params, pivots, objects).unwrap();

        let query = vec_obj(999, &[7.0, 4.0]);
        let results = index.knn(&query, 5);
        assert_eq!(results.len(), 5);
        // Exact nearest neighbor of (7,4) on this grid is id 47 (x=7, y=4).
        assert_eq!(results[0].0, 47);
        assert!(results.windows(2).all(|w| w[0].1 <= w[1].1));
    }

    #[test]
    fn range_on_full_scan_admits_only_objects_within_radius() {
        let objects = grid_dataset();
        let pivots: ObjectVector<'static> = objects.iter().take(8).map(Object::to_owned_object).collect();
        let params = full_scan_params(8);
        let index = NappIndex::build(DenseL2Space, params, pivots, objects).unwrap();

        let query = vec_obj(999, &[7.0, 4.0]);
        let results = index.range(&query, 1.0);
        assert!(results.iter().all(|(_, dist)| *dist <= 1.0));
        assert!(results.iter().any(|(id, _)| *id == 47));
        assert!(results.windows(2).all(|w| w[0].1 <= w[1].1));
    }

    #[test]
    fn result_count_is_min_k_and_dataset_size() {
        let objects = grid_dataset();
        let pivots: ObjectVector<'static> = objects.iter().take(8).map(Object::to_owned_object).collect();
        let params = full_scan_params(8);
        let index = NappIndex::build(DenseL2Space, params, pivots, objects).unwrap();

        let query = vec_obj(999, &[0.0, 0.0]);
        assert_eq!(index.knn(&query, 500).len(), 100);
    }

    #[test]
    fn rejects_pivot_count_mismatch() {
        let objects = grid_dataset();
        let pivots: ObjectVector<'static> = objects.iter().take(4).map(Object::to_owned_object).collect();
        let params = full_scan_params(8);
        assert!(NappIndex::build(DenseL2Space, params, pivots, objects).is_err());
    }

    #[test]
    fn tighter_min_times_still_finds_neighbors_via_relaxation() {
        let objects = grid_dataset();
        let pivots: ObjectVector<'static> = objects.iter().step_by(5).map(Object::to_owned_object).collect();
        let num_pivot = pivots.len();
        let params = NappParams {
            num_pivot,
            num_prefix: 4,
            num_prefix_search: 4,
            min_times: num_pivot, // deliberately unreachable, forces relaxation
            chunk_index_size: 1024,
            db_scan_frac: 0.5,
            knn_amp: 0,
            skip_checking: false,
            disable_pivot_index: false,
            hash_trick_dim: None,
            inv_proc_alg: scan_count::InvProcAlg::Scan,
        };
        let index = NappIndex::build(DenseL2Space, params, pivots, objects).unwrap();
        let query = vec_obj(999, &[3.0, 3.0]);
        let results = index.knn(&query, 3);
        assert_eq!(results.len(), 3);
    }

    #[test]
    fn skip_checking_can_return_fewer_than_k() {
        let objects = grid_dataset();
        let pivots: ObjectVector<'static> = objects.iter().step_by(5).map(Object::to_owned_object).collect();
        let num_pivot = pivots.len();
        let params = NappParams {
            num_pivot,
            num_prefix: 4,
            num_prefix_search: 4,
            min_times: num_pivot, // unreachable given num_prefix=4 < num_pivot
            chunk_index_size: 1024,
            db_scan_frac: 0.5,
            knn_amp: 0,
            skip_checking: true,
            disable_pivot_index: false,
            hash_trick_dim: None,
            inv_proc_alg: scan_count::InvProcAlg::Scan,
        };
        let index = NappIndex::build(DenseL2Space, params, pivots, objects).unwrap();
        let query = vec_obj(999, &[3.0, 3.0]);
        let results = index.knn(&query, 5);
        assert!(results.len() <= 5);
    }
}
