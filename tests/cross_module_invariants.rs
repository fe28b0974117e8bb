//! Integration coverage of the invariants every index/query processor in
//! this crate is expected to hold, exercised through the public API only.

use simspace::hnsw::{HnswIndex, HnswParams};
use simspace::inverted::{bmw, daat, wand, InvertedIndex};
use simspace::napp::params::NappParams;
use simspace::napp::scan_count::InvProcAlg;
use simspace::napp::NappIndex;
use simspace::space::builtin::DenseL2Space;
use simspace::space::sparse::SparseVector;
use simspace::{persistence, Index, Object, ObjectId};

fn dense(id: ObjectId, values: &[f32]) -> Object<'static> {
    Object::new_owned(id, -1, values.iter().flat_map(|f| f.to_le_bytes()).collect())
}

fn grid_dataset() -> Vec<Object<'static>> {
    (0..60)
        .map(|id| {
            let x = (id % 10) as f32;
            let y = (id / 10) as f32;
            dense(id, &[x, y])
        })
        .collect()
}

fn assert_sorted_with_id_tiebreak(results: &[(ObjectId, f32)]) {
    for pair in results.windows(2) {
        let (id_a, dist_a) = pair[0];
        let (id_b, dist_b) = pair[1];
        assert!(
            dist_a < dist_b || (dist_a == dist_b && id_a < id_b),
            "results not sorted by distance with ascending id tiebreak: {pair:?}"
        );
    }
}

#[test]
fn hnsw_knn_results_are_subset_sorted_and_bounded() {
    let dataset = grid_dataset();
    let dataset_ids: std::collections::HashSet<ObjectId> = dataset.iter().map(Object::id).collect();
    let index = HnswIndex::new(DenseL2Space, HnswParams::default());
    for object in dataset {
        index.insert(object).unwrap();
    }

    let query = dense(9999, &[4.0, 3.0]);
    for k in [0usize, 1, 5, 1000] {
        let results = index.knn(&query, k, Some(64));
        assert_eq!(results.len(), k.min(index.len()));
        assert!(results.iter().all(|(id, _)| dataset_ids.contains(id)));
        assert_sorted_with_id_tiebreak(&results);
    }
}

#[test]
fn napp_knn_results_are_subset_sorted_and_bounded() {
    let dataset = grid_dataset();
    let dataset_ids: std::collections::HashSet<ObjectId> = dataset.iter().map(Object::id).collect();
    let pivots: Vec<_> = dataset.iter().step_by(6).map(Object::to_owned_object).collect();
    let num_pivot = pivots.len();
    let params = NappParams {
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
        inv_proc_alg: InvProcAlg::Scan,
    };
    let index = NappIndex::build(DenseL2Space, params, pivots, dataset).unwrap();

    let query = dense(9999, &[4.0, 3.0]);
    for k in [0usize, 1, 5, 1000] {
        let results = index.knn(&query, k);
        assert_eq!(results.len(), k.min(index.len()));
        assert!(results.iter().all(|(id, _)| dataset_ids.contains(id)));
        assert_sorted_with_id_tiebreak(&results);
    }

    // With a full-coverage pivot set every object shares every pivot with
    // the query, so NAPP degenerates to a brute-force scan: its top-5
    // must match the space's exact nearest neighbors.
    let nearest = index.knn(&query, 5);
    assert_eq!(nearest[0].0, 34); // x=4 (34%10), y=3 (34/10)
}

#[test]
fn hnsw_range_results_all_within_radius_and_sorted() {
    let dataset = grid_dataset();
    let index = HnswIndex::new(DenseL2Space, HnswParams::default());
    for object in dataset {
        index.insert(object).unwrap();
    }
    let query = dense(9999, &[4.0, 3.0]);
    let results = index.range(&query, 1.5);
    assert!(results.iter().all(|(_, dist)| *dist <= 1.5));
    assert_sorted_with_id_tiebreak(&results);
    assert!(results.iter().any(|(id, _)| *id == 34));
}

#[test]
fn wand_and_block_max_wand_agree_with_daat_on_shared_corpus() {
    let records: Vec<(u32, SparseVector)> = (0..200u32)
        .map(|doc| {
            let pairs: Vec<(u32, f32)> = (0..30u32)
                .filter(|term| (doc + term) % 7 == 0)
                .map(|term| (term, 1.0 + (doc % 5) as f32 * 0.1))
                .collect();
            (doc, SparseVector::from_pairs(&pairs))
        })
        .collect();
    let index = InvertedIndex::build(&records, 16);

    let query_pairs: Vec<(u32, f32)> = vec![(0, 1.0), (7, 0.5), (14, 2.0), (21, 1.0)];
    let query = SparseVector::from_pairs(&query_pairs);

    for k in [1usize, 5, 20] {
        let daat_top = daat::top_k(&index, &query, k);
        let wand_top = wand::top_k(&index, &query, k);
        let bmw_top = bmw::top_k(&index, &query, k);
        assert_eq!(daat_top, wand_top, "WAND diverged from DAAT at k={k}");
        assert_eq!(daat_top, bmw_top, "Block-Max WAND diverged from DAAT at k={k}");
    }
}

#[test]
fn hnsw_persistence_round_trip_preserves_knn_and_range() {
    let dataset = grid_dataset();
    let index = HnswIndex::new(DenseL2Space, HnswParams::default());
    for object in dataset {
        index.insert(object).unwrap();
    }
    let query = dense(9999, &[4.0, 3.0]);
    let knn_before = index.knn(&query, 5, Some(64));
    let range_before = index.range(&query, 1.5);

    let bytes = persistence::save_hnsw(&index);
    let reloaded = persistence::load_hnsw(DenseL2Space, &bytes).unwrap();

    assert_eq!(knn_before, reloaded.knn(&query, 5, Some(64)));
    assert_eq!(range_before, reloaded.range(&query, 1.5));
}

#[test]
fn napp_persistence_round_trip_preserves_knn_and_range() {
    let dataset = grid_dataset();
    let pivots: Vec<_> = dataset.iter().step_by(6).map(Object::to_owned_object).collect();
    let num_pivot = pivots.len();
    let params = NappParams {
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
        inv_proc_alg: InvProcAlg::Scan,
    };
    let index = NappIndex::build(DenseL2Space, params, pivots, dataset).unwrap();

    let query = dense(9999, &[4.0, 3.0]);
    let knn_before = index.knn(&query, 5);
    let range_before = index.range(&query, 1.5);

    let bytes = persistence::save_napp(&index);
    let reloaded = persistence::load_napp(DenseL2Space, &bytes).unwrap();

    assert_eq!(knn_before, reloaded.knn(&query, 5));
    assert_eq!(range_before, reloaded.range(&query, 1.5));
}
