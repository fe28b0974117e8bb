//! A common interface over this crate's object/space-based indexes, mirrored
//! after the teacher's `VectorIndex` trait (`index/hnsw.rs`,
//! `index/hnsw/native_index.rs`): one `insert`/`knn`/`range`/`len` surface
//! that callers can hold as `&dyn Index<S>` without caring whether the backing
//! structure is an exact/approximate graph or a pivot-neighborhood index.
//!
//! The sparse-term query processors in [`crate::inverted`] are deliberately
//! left out of this trait — they're keyed by term id over `SparseVector`,
//! not by `Object`/`Space`, and don't share this shape.

use crate::error::Result;
use crate::hnsw::HnswIndex;
use crate::napp::NappIndex;
use crate::object::{Object, ObjectId};
use crate::space::{Dist, Space};

/// Common surface for `Object`/`Space`-based nearest-neighbor indexes.
pub trait Index<S: Space> {
    /// Adds `object` to the index, assigning it by its own id.
    ///
    /// # Errors
    ///
    /// Returns an error if the object's id is already present, or if this
    /// index does not support incremental insertion (NAPP is batch-built
    /// only — spec's "no dynamic deletions" Non-goal extends to NAPP not
    /// supporting post-build insertion either).
    fn insert(&self, object: Object<'_>) -> Result<ObjectId>;

    /// Finds the `k` nearest neighbors of `query`.
    fn knn(&self, query: &Object<'_>, k: usize) -> Vec<(ObjectId, Dist)>;

    /// Finds every object within `radius` of `query`.
    fn range(&self, query: &Object<'_>, radius: Dist) -> Vec<(ObjectId, Dist)>;

    /// Number of objects currently indexed.
    fn len(&self) -> usize;

    /// Whether the index holds no objects.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<S: Space> Index<S> for HnswIndex<S> {
    fn insert(&self, object: Object<'_>) -> Result<ObjectId> {
        HnswIndex::insert(self, object)
    }

    fn knn(&self, query: &Object<'_>, k: usize) -> Vec<(ObjectId, Dist)> {
        HnswIndex::knn(self, query, k, None)
    }

    fn range(&self, query: &Object<'_>, radius: Dist) -> Vec<(ObjectId, Dist)> {
        HnswIndex::range(self, query, radius)
    }

    fn len(&self) -> usize {
        HnswIndex::len(self)
    }
}

impl<S: Space> Index<S> for NappIndex<S> {
    fn insert(&self, _object: Object<'_>) -> Result<ObjectId> {
        Err(crate::error::Error::config(
            "insert",
            "NAPP is built in one batch (see NappIndex::build); incremental insertion is not supported",
        ))
    }

    fn knn(&self, query: &Object<'_>, k: usize) -> Vec<(ObjectId, Dist)> {
        NappIndex::knn(self, query, k)
    }

    fn range(&self, query: &Object<'_>, radius: Dist) -> Vec<(ObjectId, Dist)> {
        NappIndex::range(self, query, radius)
    }

    fn len(&self) -> usize {
        NappIndex::len(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hnsw::HnswParams;
    use crate::space::builtin::DenseL2Space;

    fn vec_obj(id: ObjectId, values: &[f32]) -> Object<'static> {
        Object::new_owned(id, -1, values.iter().flat_map(|f| f.to_le_bytes()).collect())
    }

    #[test]
    fn hnsw_satisfies_index_trait() {
        let index = HnswIndex::new(DenseL2Space, HnswParams::default());
        fn use_as_trait_object<S: Space>(idx: &dyn Index<S>, object: Object<'_>) {
            idx.insert(object).unwrap();
        }
        use_as_trait_object(&index, vec_obj(0, &[1.0, 2.0]));
        assert_eq!(Index::<DenseL2Space>::len(&index), 1);
    }

    #[test]
    fn hnsw_range_through_trait_matches_inherent_method() {
        let index = HnswIndex::new(DenseL2Space, HnswParams::default());
        Index::<DenseL2Space>::insert(&index, vec_obj(0, &[0.0, 0.0])).unwrap();
        Index::<DenseL2Space>::insert(&index, vec_obj(1, &[5.0, 0.0])).unwrap();
        let query = vec_obj(99, &[0.0, 0.0]);
        let via_trait = Index::<DenseL2Space>::range(&index, &query, 1.0);
        assert_eq!(via_trait, index.range(&query, 1.0));
        assert_eq!(via_trait.iter().map(|(id, _)| *id).collect::<Vec<_>>(), vec![0]);
    }

    #[test]
    fn napp_insert_is_rejected() {
        let pivots = vec![vec_obj(0, &[0.0, 0.0])];
        let objects = vec![vec_obj(0, &[0.0, 0.0])];
        let params = crate::napp::params::NappParams {
            num_pivot: 1,
            num_prefix: 1,
            num_prefix_search: 1,
            min_times: 1,
            chunk_index_size: 16,
            db_scan_frac: 1.0,
            knn_amp: 0,
            skip_checking: false,
            disable_pivot_index: false,
            hash_trick_dim: None,
            inv_proc_alg: crate::napp::scan_count::InvProcAlg::Scan,
        };
        let index = NappIndex::build(DenseL2Space, params, pivots, objects).unwrap();
        let result = Index::<DenseL2Space>::insert(&index, vec_obj(1, &[1.0, 1.0]));
        assert!(result.is_err());
    }
}
