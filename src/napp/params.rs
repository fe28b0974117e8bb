//! NAPP (pivot-neighborhood inverted index) construction/search parameters
//! (spec §4.7), grounded in nmslib's `PivotNeighbInvertedIndex` parameter
//! surface (`original_source/.../pivot_neighb_invindx.h`).

use crate::config::{check_range, ParamManager};
use crate::error::Result;
use crate::napp::scan_count::InvProcAlg;

/// Construction- and search-time parameters for a [`crate::napp::NappIndex`].
#[derive(Debug, Clone, Copy)]
pub struct NappParams {
    /// Total number of pivots sampled from the dataset at build time.
    pub num_pivot: usize,
    /// Pivot-neighborhood size assigned to each object at index time ("K"
    /// in the original paper).
    pub num_prefix: usize,
    /// Pivot-neighborhood size computed for the query at search time; may
    /// differ from `num_prefix`.
    pub num_prefix_search: usize,
    /// Minimum number of shared pivots an object must have with the query
    /// to be considered a candidate ("t" in the original paper).
    pub min_times: usize,
    /// Number of objects grouped into one posting-list chunk, bounding the
    /// size of the dense counter array `ScanCount` allocates per chunk.
    pub chunk_index_size: usize,
    /// Fraction of the dataset to scan as candidates, used when `knn_amp`
    /// is zero.
    pub db_scan_frac: f32,
    /// When nonzero, overrides `db_scan_frac`: scan `k * knn_amp`
    /// candidates instead of a dataset fraction.
    pub knn_amp: usize,
    /// When the shared-pivot filter returns fewer than `k` candidates,
    /// skip widening the search (lowering `min_times`) and just return
    /// what was found.
    pub skip_checking: bool,
    /// Use a linear-scan [`crate::space::pivot::DummyPivotIndex`] instead
    /// of the space's (possibly faster) bulk pivot-distance evaluator.
    pub disable_pivot_index: bool,
    /// Dimensionality for the hashing-trick dense projection passed through
    /// to `Space::create_pivot_index`, if the space uses it.
    pub hash_trick_dim: Option<usize>,
    /// Which posting-processing strategy counts shared pivots per chunk.
    pub inv_proc_alg: InvProcAlg,
}

impl NappParams {
    /// Parses parameters from a [`ParamManager`]. `num_pivot` has no
    /// sensible default (it depends on dataset size) and must be supplied.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::Error::Config`] if a value is missing,
    /// fails to parse, or is out of range.
    pub fn from_params(params: &ParamManager) -> Result<Self> {
        let num_pivot: usize = params.get_required("numPivot")?;
        check_range("numPivot", num_pivot, 1, usize::MAX)?;
        let num_prefix: usize = params.get_or("numPrefix", num_pivot.min(32))?;
        check_range("numPrefix", num_prefix, 1, num_pivot)?;
        let num_prefix_search: usize = params.get_or("numPrefixSearch", num_prefix)?;
        check_range("numPrefixSearch", num_prefix_search, 1, num_pivot)?;
        let min_times: usize = params.get_or("minTimes", 2)?;
        check_range("minTimes", min_times, 1, num_prefix.max(num_prefix_search))?;
        let chunk_index_size: usize = params.get_or("chunkIndexSize", 65536)?;
        check_range("chunkIndexSize", chunk_index_size, 1, usize::MAX)?;
        let db_scan_frac: f32 = params.get_or("dbScanFrac", 0.1)?;
        check_range("dbScanFrac", db_scan_frac, 0.0, 1.0)?;
        let knn_amp: usize = params.get_or("knnAmp", 0)?;
        let skip_checking: bool = params.get_or("skipChecking", false)?;
        let disable_pivot_index: bool = params.get_or("disablePivotIndex", false)?;
        let hash_trick_dim: usize = params.get_or("hashTrickDim", 0)?;
        let inv_proc_alg: InvProcAlg = params.get_or("invProcAlg", InvProcAlg::Scan)?;

        Ok(Self {
            num_pivot,
            num_prefix,
            num_prefix_search,
            min_times,
            chunk_index_size,
            db_scan_frac,
            knn_amp,
            skip_checking,
            disable_pivot_index,
            hash_trick_dim: if hash_trick_dim == 0 { None } else { Some(hash_trick_dim) },
            inv_proc_alg,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_derive_from_num_pivot() {
        let params = ParamManager::from_pairs(["numPivot=100"]).unwrap();
        let p = NappParams::from_params(&params).unwrap();
        assert_eq!(p.num_pivot, 100);
        assert_eq!(p.num_prefix, 32);
        assert_eq!(p.num_prefix_search, 32);
        assert_eq!(p.min_times, 2);
    }

    #[test]
    fn rejects_num_prefix_above_num_pivot() {
        let params = ParamManager::from_pairs(["numPivot=10", "numPrefix=20"]).unwrap();
        assert!(NappParams::from_params(&params).is_err());
    }

    #[test]
    fn rejects_missing_num_pivot() {
        let params = ParamManager::from_pairs(["numPrefix=5"]).unwrap();
        assert!(NappParams::from_params(&params).is_err());
    }
}
