//! The `Space` abstraction: the contract between distance/representation
//! code and indexes.
//!
//! A `Space` owns three responsibilities: computing distances between
//! objects it produced, parsing/emitting objects from/to text, and (for
//! sparse scalar spaces) building a [`PivotIndex`] that evaluates distances
//! from one query to many pivots in bulk.

pub mod builtin;
pub mod dataset;
pub mod pivot;
pub mod sparse;

use crate::error::Result;
use crate::object::Object;
pub use pivot::PivotIndex;

/// A distance value. Metric spaces use `f32`; edit/Hamming distance over
/// discrete alphabets could use `u32`, but this crate standardizes on `f32`
/// throughout (NaN orders as `+inf`, see [`crate::knn::result::Distance`]).
pub type Dist = f32;

/// Direction convention: the left argument is the data/pivot object, the
/// right argument is the query object. Asymmetric spaces must document
/// which side the asymmetry applies to; callers should route through
/// [`crate::knn::KnnQuery::distance_object_left`] to keep orientation
/// consistent rather than calling `Space::distance` directly.
pub trait Space: Send + Sync {
    /// Parses a textual record into an `Object`, optionally updating
    /// `stream_state` with observed dimensionality/vocabulary.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::Error::Format`] on inconsistency (wrong
    /// arity, non-ascending ids, dimensionality mismatch).
    fn parse_object(
        &self,
        id: crate::object::ObjectId,
        label: crate::object::Label,
        text: &str,
        stream_state: &mut dataset::StreamState,
    ) -> Result<Object<'static>>;

    /// Emits an object as text, using `external_id` as the printed
    /// identifier (which may differ from the object's internal id).
    fn emit_object(&self, object: &Object<'_>, external_id: i64) -> String;

    /// Computes the distance between two objects this space produced.
    /// May be asymmetric; see the trait-level documentation for direction
    /// convention.
    fn distance(&self, a: &Object<'_>, b: &Object<'_>) -> Dist;

    /// Approximate equality, used by round-trip tests only.
    fn approx_equal(&self, a: &Object<'_>, b: &Object<'_>) -> bool {
        (self.distance(a, b)).abs() < 1e-10
    }

    /// Builds a bulk pivot-distance evaluator over `pivots`.
    ///
    /// The default implementation returns a [`pivot::DummyPivotIndex`] that
    /// simply loops over pivots calling [`Space::distance`]. Sparse
    /// dot-product-like spaces should override this to return an
    /// inverted-index-backed evaluator (see
    /// [`pivot::SparseScalarPivotIndex`]).
    fn create_pivot_index<'p>(
        &self,
        pivots: &'p [Object<'p>],
        _hash_trick_dim: Option<usize>,
    ) -> Box<dyn PivotIndex + 'p>
    where
        Self: Sized + 'p,
    {
        Box::new(pivot::DummyPivotIndex::new(self, pivots))
    }

    /// Projects a sparse object into a dense buffer via the hashing trick
    /// (`hash(dim) mod out.len()`, summing collisions). Returns `false` if
    /// this space has no dense-vector representation.
    fn create_dense_vector_from_object(&self, _object: &Object<'_>, _out: &mut [f32]) -> bool {
        false
    }
}

/// Erased space handle used at API boundaries (factories, index
/// constructors that don't need to be monomorphic). Inner loops should hold
/// a concrete `&impl Space` instead.
pub type BoxedSpace = Box<dyn Space>;

#[cfg(test)]
mod tests {
    use super::*;
    use builtin::DenseL2Space;

    #[test]
    fn default_pivot_index_matches_direct_distance() {
        let space = DenseL2Space;
        let pivots = vec![
            Object::new_owned(0, -1, f32_bytes(&[0.0, 0.0])),
            Object::new_owned(1, -1, f32_bytes(&[3.0, 4.0])),
        ];
        let query = Object::new_owned(2, -1, f32_bytes(&[0.0, 0.0]));
        let pivot_index = space.create_pivot_index(&pivots, None);
        let mut out = vec![0.0f32; pivots.len()];
        pivot_index.compute_pivot_distances_index_time(&query, &mut out);
        assert!((out[0] - 0.0).abs() < 1e-6);
        assert!((out[1] - 5.0).abs() < 1e-6);
    }

    fn f32_bytes(v: &[f32]) -> Vec<u8> {
        v.iter().flat_map(|f| f.to_le_bytes()).collect()
    }
}
