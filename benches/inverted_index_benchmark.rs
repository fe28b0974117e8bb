//! Benchmark comparing DAAT, WAND, and Block-Max WAND top-k scoring.
//!
//! Run with: cargo bench --bench inverted_index_benchmark

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use simspace::inverted::{bmw, daat, wand, InvertedIndex};
use simspace::space::sparse::SparseVector;

const N_DOCS: usize = 2000;
const VOCAB: u32 = 5000;
const NNZ_PER_DOC: usize = 40;
const K: usize = 10;
const BLOCK_SIZE: usize = 64;

fn generate_records(n_docs: usize, vocab: u32, nnz: usize) -> Vec<(u32, SparseVector)> {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    (0..n_docs)
        .map(|doc| {
            let mut pairs: Vec<(u32, f32)> = (0..nnz)
                .map(|j| {
                    let mut hasher = DefaultHasher::new();
                    (doc * 131 + j).hash(&mut hasher);
                    let term = (hasher.finish() % u64::from(vocab)) as u32;
                    let value = (hasher.finish() % 1000) as f32 / 1000.0 + 0.01;
                    (term, value)
                })
                .collect();
            pairs.sort_unstable_by_key(|(term, _)| *term);
            pairs.dedup_by_key(|(term, _)| *term);
            (doc as u32, SparseVector::from_pairs(&pairs))
        })
        .collect()
}

fn bench_top_k(c: &mut Criterion) {
    let records = generate_records(N_DOCS, VOCAB, NNZ_PER_DOC);
    let index = InvertedIndex::build(&records, BLOCK_SIZE);
    let queries = generate_records(50, VOCAB, NNZ_PER_DOC / 2);

    let mut group = c.benchmark_group("inverted_index_top_k");

    group.bench_function("daat", |b| {
        b.iter(|| {
            for (_, q) in &queries {
                black_box(daat::top_k(&index, q, K));
            }
        });
    });

    group.bench_function("wand", |b| {
        b.iter(|| {
            for (_, q) in &queries {
                black_box(wand::top_k(&index, q, K));
            }
        });
    });

    group.bench_function("block_max_wand", |b| {
        b.iter(|| {
            for (_, q) in &queries {
                black_box(bmw::top_k(&index, q, K));
            }
        });
    });

    group.finish();
}

criterion_group!(benches, bench_top_k);
criterion_main!(benches);
