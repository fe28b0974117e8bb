//! Index diagnostics, serializable for external reporting.
//!
//! Grounded in the teacher's `collection::stats` module — a small
//! `Serialize`/`Deserialize` summary struct a caller can log or expose, not
//! a query-planning cost model (this crate has no planner to feed).

use serde::{Deserialize, Serialize};

/// A point-in-time summary of an [`crate::hnsw::HnswIndex`].
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct HnswStats {
    /// Number of objects indexed.
    pub object_count: usize,
    /// Number of layers currently in use (0-indexed, so `layer_count - 1`
    /// is the highest layer any node reached).
    pub layer_count: usize,
    /// The highest layer any node has reached.
    pub max_layer: usize,
}

impl HnswStats {
    /// Serializes this summary as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns a [`serde_json::Error`] if serialization somehow fails (it
    /// cannot for this struct's field types, but the signature stays
    /// fallible to match `serde_json`'s API).
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// A point-in-time summary of a [`crate::napp::NappIndex`].
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct NappStats {
    /// Number of objects indexed.
    pub object_count: usize,
    /// Number of pivots sampled at build time.
    pub pivot_count: usize,
    /// Number of posting-list chunks the dataset was split into.
    pub chunk_count: usize,
}

impl NappStats {
    /// Serializes this summary as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns a [`serde_json::Error`] if serialization somehow fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hnsw_stats_roundtrip_through_json() {
        let stats = HnswStats {
            object_count: 10,
            layer_count: 3,
            max_layer: 2,
        };
        let json = stats.to_json().unwrap();
        let parsed: HnswStats = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.object_count, 10);
        assert_eq!(parsed.max_layer, 2);
    }
}
