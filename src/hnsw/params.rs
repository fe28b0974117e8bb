//! HNSW construction/search parameters (spec §4.2, §4.3).

use crate::config::{check_range, ParamManager};
use crate::error::Result;

/// Neighbor-pruning heuristic applied when a node (or the node being
/// inserted) has more than `max_conn` candidate neighbors.
///
/// Mirrors the four variants from Malkov & Yashunin's original HNSW paper,
/// selectable via the `delaunay_type` parameter:
///
/// - `0` ([`Naive`](DelaunayType::Naive)): keep the `max_conn` closest
///   candidates, no diversity pruning.
/// - `1` ([`Heuristic`](DelaunayType::Heuristic)): classic heuristic — admit
///   a candidate only if it is closer to the query than to every neighbor
///   already selected.
/// - `2` ([`HeuristicExtended`](DelaunayType::HeuristicExtended)): heuristic
///   plus `extendCandidates` — the candidate set is first closed over one
///   hop of its members' own neighbors.
/// - `3` ([`HeuristicKeepPruned`](DelaunayType::HeuristicKeepPruned)):
///   heuristic, and candidates rejected by the diversity test are used to
///   top up the result if it would otherwise be under-full.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DelaunayType {
    /// Variant 0.
    Naive,
    /// Variant 1.
    Heuristic,
    /// Variant 2.
    HeuristicExtended,
    /// Variant 3.
    HeuristicKeepPruned,
}

impl DelaunayType {
    /// Inverse of [`Self::from_code`], used when serializing an index.
    #[must_use]
    pub const fn to_code(self) -> u8 {
        match self {
            Self::Naive => 0,
            Self::Heuristic => 1,
            Self::HeuristicExtended => 2,
            Self::HeuristicKeepPruned => 3,
        }
    }

    fn from_code(code: u8) -> Result<Self> {
        match code {
            0 => Ok(Self::Naive),
            1 => Ok(Self::Heuristic),
            2 => Ok(Self::HeuristicExtended),
            3 => Ok(Self::HeuristicKeepPruned),
            other => Err(crate::error::Error::config(
                "delaunay_type",
                format!("expected 0-3, got {other}"),
            )),
        }
    }

    /// Whether this variant applies the diversity condition at all (variant
    /// 0 does not).
    #[must_use]
    pub const fn is_heuristic(self) -> bool {
        !matches!(self, Self::Naive)
    }

    /// Whether this variant extends the candidate set over one hop before
    /// pruning (variant 2 and above... no, only variant 2 extends; kept as
    /// its own flag since 3 builds on 1, not 2).
    #[must_use]
    pub const fn extends_candidates(self) -> bool {
        matches!(self, Self::HeuristicExtended)
    }

    /// Whether candidates rejected by the diversity test are still eligible
    /// to fill out an under-full result (variant 3).
    #[must_use]
    pub const fn keeps_pruned(self) -> bool {
        matches!(self, Self::HeuristicKeepPruned)
    }
}

/// Post-construction optimization pass applied once the graph is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostProcessing {
    /// No post-processing.
    None,
    /// One pass re-running neighbor selection for every node against its
    /// current neighbors-of-neighbors, fixing up asymmetric links left over
    /// from build-time pruning.
    Light,
    /// Two passes of the above.
    Exhaustive,
}

impl PostProcessing {
    /// Inverse of [`Self::from_code`], used when serializing an index.
    #[must_use]
    pub const fn to_code(self) -> u8 {
        match self {
            Self::None => 0,
            Self::Light => 1,
            Self::Exhaustive => 2,
        }
    }

    fn from_code(code: u8) -> Result<Self> {
        match code {
            0 => Ok(Self::None),
            1 => Ok(Self::Light),
            2 => Ok(Self::Exhaustive),
            other => Err(crate::error::Error::config(
                "post",
                format!("expected 0-2, got {other}"),
            )),
        }
    }

    /// Number of repair passes this level implies.
    #[must_use]
    pub const fn passes(self) -> usize {
        match self {
            Self::None => 0,
            Self::Light => 1,
            Self::Exhaustive => 2,
        }
    }
}

/// Construction-time parameters for an HNSW index.
#[derive(Debug, Clone, Copy)]
pub struct HnswParams {
    /// Max bidirectional links per node at layers above 0 (default 16).
    pub m: usize,
    /// Max links at layer 0, conventionally `2*m` (default 32).
    pub m0: usize,
    /// Beam width used during construction (default 200).
    pub ef_construction: usize,
    /// Beam width used during search, absent a per-query override (default
    /// 50).
    pub ef_search: usize,
    /// Neighbor-pruning heuristic.
    pub delaunay_type: DelaunayType,
    /// Post-construction optimization level.
    pub post: PostProcessing,
    /// Skips building the optimized (flattened, read-only) index
    /// representation after construction, trading query latency for a
    /// cheaper build (spec §4.3 Non-goals carve-out: kept as a flag even
    /// though this crate has only one in-memory representation).
    pub skip_optimized_index: bool,
    /// Layer count is capped at this value regardless of the level
    /// distribution's tail (mirrors the teacher's `level.min(15)`).
    pub max_level_cap: usize,
    /// Relative slack applied to the beam's stopping bound during search
    /// (default 0.0, exact beam termination). A layer-0 search keeps
    /// expanding a candidate whose lower bound is within `(1 + eps)` of the
    /// current worst kept distance instead of stopping as soon as it's
    /// beaten, trading more distance computations for recall.
    pub eps: f32,
}

impl Default for HnswParams {
    fn default() -> Self {
        Self {
            m: 16,
            m0: 32,
            ef_construction: 200,
            ef_search: 50,
            delaunay_type: DelaunayType::Heuristic,
            post: PostProcessing::None,
            skip_optimized_index: false,
            max_level_cap: 15,
            eps: 0.0,
        }
    }
}

impl HnswParams {
    /// Parses construction parameters from a [`ParamManager`], applying
    /// this struct's defaults for any key left unset.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::Error::Config`] if a value is out of range
    /// or fails to parse.
    pub fn from_params(params: &ParamManager) -> Result<Self> {
        let defaults = Self::default();
        let m: usize = params.get_or("M", defaults.m)?;
        check_range("M", m, 2, 200)?;
        let m0: usize = params.get_or("M0", m * 2)?;
        check_range("M0", m0, 2, 400)?;
        let ef_construction: usize = params.get_or("efConstruction", defaults.ef_construction)?;
        check_range("efConstruction", ef_construction, 1, 100_000)?;
        let ef_search: usize = params.get_or("ef", defaults.ef_search)?;
        check_range("ef", ef_search, 1, 100_000)?;
        let delaunay_code: u8 = params.get_or("delaunay_type", 1)?;
        let post_code: u8 = params.get_or("post", 0)?;
        let skip_optimized_index: bool = params.get_or("skip_optimized_index", false)?;
        let eps: f32 = params.get_or("eps", defaults.eps)?;
        check_range("eps", eps, 0.0, 10.0)?;

        Ok(Self {
            m,
            m0,
            ef_construction,
            ef_search,
            delaunay_type: DelaunayType::from_code(delaunay_code)?,
            post: PostProcessing::from_code(post_code)?,
            skip_optimized_index,
            max_level_cap: defaults.max_level_cap,
            eps,
        })
    }

    /// `1 / ln(M)`, the level-selection multiplier used by
    /// [`crate::hnsw::graph::HnswIndex::random_level`].
    #[must_use]
    pub fn level_mult(&self) -> f64 {
        1.0 / (self.m as f64).ln()
    }
}
