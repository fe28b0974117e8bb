//! Index save/load: a convenience on top of the in-memory structures, not a
//! primary storage mode (spec §6 Non-goals — no WAL, no mmap-backed store).
//!
//! File layout: an 8-byte magic/version header, a `u32`-prefixed block of
//! newline-delimited `key=value` parameters (round-tripping through
//! [`ParamManager`]), then a component-specific body. Bodies use explicit
//! little-endian encode/decode rather than `bincode`, since the wire format
//! is specified byte-for-byte — `bincode` is reserved (per the teacher's own
//! split) for the parameter blob's in-memory counterpart and any future
//! opaque payloads, not the spec-mandated bytes.

use crate::config::ParamManager;
use crate::error::{Error, Result};
use crate::hnsw::{HnswIndex, HnswParams};
use crate::inverted::posting::{InvertedIndex, Posting};
use crate::napp::NappIndex;
use crate::object::{Object, ObjectId};
use crate::space::Space;
use rustc_hash::FxHashMap;
use std::collections::HashMap;

const MAGIC: &[u8; 4] = b"SIMS";
const FORMAT_VERSION: u32 = 1;

struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    fn new() -> Self {
        Self { buf: Vec::new() }
    }

    fn u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn i32(&mut self, v: i32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn i64(&mut self, v: i64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn f32(&mut self, v: f32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn bytes(&mut self, v: &[u8]) {
        self.u64(v.len() as u64);
        self.buf.extend_from_slice(v);
    }

    fn object(&mut self, object: &Object<'_>) {
        self.i32(object.id());
        self.i32(object.label());
        self.bytes(object.data());
    }
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.pos + n > self.buf.len() {
            return Err(Error::Serialization("truncated index file".to_string()));
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn u32(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.take(4)?.try_into().unwrap()))
    }

    fn u64(&mut self) -> Result<u64> {
        Ok(u64::from_le_bytes(self.take(8)?.try_into().unwrap()))
    }

    fn i32(&mut self) -> Result<i32> {
        Ok(i32::from_le_bytes(self.take(4)?.try_into().unwrap()))
    }

    fn i64(&mut self) -> Result<i64> {
        Ok(i64::from_le_bytes(self.take(8)?.try_into().unwrap()))
    }

    fn f32(&mut self) -> Result<f32> {
        Ok(f32::from_le_bytes(self.take(4)?.try_into().unwrap()))
    }

    fn bytes(&mut self) -> Result<Vec<u8>> {
        let len = self.u64()? as usize;
        Ok(self.take(len)?.to_vec())
    }

    fn object(&mut self) -> Result<Object<'static>> {
        let id = self.i32()?;
        let label = self.i32()?;
        let data = self.bytes()?;
        Ok(Object::new_owned(id, label, data))
    }
}

fn param_blob(pairs: &[(String, String)]) -> Vec<u8> {
    pairs
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("\n")
        .into_bytes()
}

fn parse_param_blob(blob: &[u8]) -> Result<ParamManager> {
    let text = std::str::from_utf8(blob)
        .map_err(|e| Error::Serialization(format!("parameter block is not utf-8: {e}")))?;
    ParamManager::from_pairs(text.lines().filter(|l| !l.trim().is_empty()))
}

fn write_header(out: &mut Writer, params: &[(String, String)]) {
    out.buf.extend_from_slice(MAGIC);
    out.u32(FORMAT_VERSION);
    let blob = param_blob(params);
    out.u32(blob.len() as u32);
    out.buf.extend_from_slice(&blob);
}

fn read_header(r: &mut Reader<'_>) -> Result<ParamManager> {
    let magic = r.take(4)?;
    if magic != MAGIC {
        return Err(Error::Serialization("bad magic, not a simspace index file".to_string()));
    }
    let version = r.u32()?;
    if version != FORMAT_VERSION {
        return Err(Error::Serialization(format!(
            "unsupported index file version {version}, expected {FORMAT_VERSION}"
        )));
    }
    let blob_len = r.u32()? as usize;
    let blob = r.take(blob_len)?;
    parse_param_blob(blob)
}

/// Serializes an [`HnswIndex`] to bytes: header, construction parameters,
/// then every object followed by each layer's adjacency lists.
#[must_use]
pub fn save_hnsw<S: Space>(index: &HnswIndex<S>) -> Vec<u8> {
    let p = index.params();
    let params = vec![
        ("M".to_string(), p.m.to_string()),
        ("M0".to_string(), p.m0.to_string()),
        ("efConstruction".to_string(), p.ef_construction.to_string()),
        ("ef".to_string(), p.ef_search.to_string()),
        ("delaunay_type".to_string(), p.delaunay_type.to_code().to_string()),
        ("post".to_string(), p.post.to_code().to_string()),
        ("skip_optimized_index".to_string(), p.skip_optimized_index.to_string()),
        ("eps".to_string(), p.eps.to_string()),
    ];
    let mut out = Writer::new();
    write_header(&mut out, &params);

    let objects = index.objects_snapshot();
    out.u32(objects.len() as u32);
    for object in &objects {
        out.object(object);
    }

    let layers = index.layers_snapshot();
    out.u32(layers.len() as u32);
    out.i64(index.entry_point_snapshot().map_or(-1, |v| v as i64));
    out.u32(index.max_layer_snapshot() as u32);
    for layer in &layers {
        out.u32(layer.len() as u32);
        for neighbors in layer {
            out.u32(neighbors.len() as u32);
            for &n in neighbors {
                out.u32(n as u32);
            }
        }
    }

    tracing::debug!(object_count = objects.len(), layer_count = layers.len(), "hnsw index saved");
    out.buf
}

/// Reconstructs an [`HnswIndex`] from bytes written by [`save_hnsw`].
///
/// # Errors
///
/// Returns [`Error::Serialization`] on a bad magic/version or truncated
/// buffer.
pub fn load_hnsw<S: Space>(space: S, buf: &[u8]) -> Result<HnswIndex<S>> {
    let mut r = Reader::new(buf);
    let params_mgr = read_header(&mut r)?;
    let params = HnswParams::from_params(&params_mgr).map_err(|e| Error::Serialization(e.to_string()))?;

    let object_count = r.u32()? as usize;
    let mut objects = Vec::with_capacity(object_count);
    for _ in 0..object_count {
        objects.push(r.object()?);
    }

    let layer_count = r.u32()? as usize;
    let entry_point_raw = r.i64()?;
    let entry_point = if entry_point_raw < 0 { None } else { Some(entry_point_raw as usize) };
    let max_layer = r.u32()? as usize;

    let mut layers = Vec::with_capacity(layer_count);
    for _ in 0..layer_count {
        let node_count = r.u32()? as usize;
        let mut layer = Vec::with_capacity(node_count);
        for _ in 0..node_count {
            let neighbor_count = r.u32()? as usize;
            let mut neighbors = Vec::with_capacity(neighbor_count);
            for _ in 0..neighbor_count {
                neighbors.push(r.u32()? as usize);
            }
            layer.push(neighbors);
        }
        layers.push(layer);
    }

    tracing::debug!(object_count, layer_count, "hnsw index loaded");
    Ok(HnswIndex::from_parts(space, params, objects, layers, entry_point, max_layer))
}

/// Serializes a [`NappIndex`] to bytes: header, construction parameters,
/// the sampled pivot set, every indexed object, then each chunk's already-
/// assigned pivot-neighborhood posting lists (load skips recomputing them).
#[must_use]
pub fn save_napp<S: Space>(index: &NappIndex<S>) -> Vec<u8> {
    let p = index.params();
    let params = vec![
        ("numPivot".to_string(), p.num_pivot.to_string()),
        ("numPrefix".to_string(), p.num_prefix.to_string()),
        ("numPrefixSearch".to_string(), p.num_prefix_search.to_string()),
        ("minTimes".to_string(), p.min_times.to_string()),
        ("chunkIndexSize".to_string(), p.chunk_index_size.to_string()),
        ("dbScanFrac".to_string(), p.db_scan_frac.to_string()),
        ("knnAmp".to_string(), p.knn_amp.to_string()),
        ("skipChecking".to_string(), p.skip_checking.to_string()),
        ("disablePivotIndex".to_string(), p.disable_pivot_index.to_string()),
        ("hashTrickDim".to_string(), p.hash_trick_dim.unwrap_or(0).to_string()),
        ("invProcAlg".to_string(), p.inv_proc_alg.as_str().to_string()),
    ];
    let mut out = Writer::new();
    write_header(&mut out, &params);

    let pivots = index.pivots_snapshot();
    out.u32(pivots.len() as u32);
    for pivot in pivots {
        out.object(pivot);
    }

    let objects = index.objects_snapshot();
    out.u32(objects.len() as u32);
    for object in objects {
        out.object(object);
    }

    let chunks = index.chunks_snapshot();
    out.u32(chunks.len() as u32);
    for (len, lists) in &chunks {
        out.u32(*len as u32);
        out.u32(lists.len() as u32);
        for (pivot_id, ids) in lists {
            out.u32(*pivot_id);
            out.u32(ids.len() as u32);
            for &id in ids {
                out.u32(id);
            }
        }
    }

    tracing::debug!(pivot_count = pivots.len(), object_count = objects.len(), "napp index saved");
    out.buf
}

/// Reconstructs a [`NappIndex`] from bytes written by [`save_napp`].
///
/// # Errors
///
/// Returns [`Error::Serialization`] on a bad magic/version or truncated
/// buffer, or a config error if the stored parameters no longer validate.
pub fn load_napp<S: Space>(space: S, buf: &[u8]) -> Result<NappIndex<S>> {
    let mut r = Reader::new(buf);
    let params_mgr = read_header(&mut r)?;
    let params = crate::napp::params::NappParams::from_params(&params_mgr)
        .map_err(|e| Error::Serialization(e.to_string()))?;

    let pivot_count = r.u32()? as usize;
    let mut pivots = Vec::with_capacity(pivot_count);
    for _ in 0..pivot_count {
        pivots.push(r.object()?);
    }

    let object_count = r.u32()? as usize;
    let mut objects = Vec::with_capacity(object_count);
    for _ in 0..object_count {
        objects.push(r.object()?);
    }

    let chunk_count = r.u32()? as usize;
    let mut chunks = Vec::with_capacity(chunk_count);
    for _ in 0..chunk_count {
        let len = r.u32()? as usize;
        let list_count = r.u32()? as usize;
        let mut lists = Vec::with_capacity(list_count);
        for _ in 0..list_count {
            let pivot_id = r.u32()?;
            let id_count = r.u32()? as usize;
            let mut ids = Vec::with_capacity(id_count);
            for _ in 0..id_count {
                ids.push(r.u32()?);
            }
            lists.push((pivot_id, ids));
        }
        chunks.push((len, lists));
    }

    tracing::debug!(pivot_count, object_count, "napp index loaded");
    Ok(NappIndex::from_parts(space, params, pivots, objects, chunks))
}

/// Serializes an [`InvertedIndex`] to bytes: header (empty parameter block),
/// then every term's postings.
#[must_use]
pub fn save_inverted_index(index: &InvertedIndex, block_size: usize) -> Vec<u8> {
    let params = vec![("blockSize".to_string(), block_size.to_string())];
    let mut out = Writer::new();
    write_header(&mut out, &params);

    let terms = index.terms_snapshot();
    out.u32(terms.len() as u32);
    for (term, postings) in &terms {
        out.u32(*term);
        out.u32(postings.len() as u32);
        for posting in postings {
            out.u32(posting.doc_id);
            out.f32(posting.value);
        }
    }
    out.buf
}

/// Reconstructs an [`InvertedIndex`] from bytes written by
/// [`save_inverted_index`].
///
/// # Errors
///
/// Returns [`Error::Serialization`] on a bad magic/version or truncated
/// buffer.
pub fn load_inverted_index(buf: &[u8]) -> Result<InvertedIndex> {
    let mut r = Reader::new(buf);
    let params_mgr = read_header(&mut r)?;
    let block_size: usize = params_mgr
        .get_or("blockSize", crate::inverted::posting::DEFAULT_BLOCK_SIZE)
        .map_err(|e| Error::Serialization(e.to_string()))?;

    let term_count = r.u32()? as usize;
    let mut by_term: FxHashMap<u32, Vec<(u32, f32)>> = FxHashMap::default();
    for _ in 0..term_count {
        let term = r.u32()?;
        let posting_count = r.u32()? as usize;
        let mut postings = Vec::with_capacity(posting_count);
        for _ in 0..posting_count {
            let doc_id = r.u32()?;
            let value = r.f32()?;
            postings.push((doc_id, value));
        }
        by_term.insert(term, postings);
    }

    // Reassemble per-document sparse vectors so InvertedIndex::build can
    // recompute max/block summaries exactly as it would from a fresh build.
    let mut per_doc: HashMap<u32, Vec<(u32, f32)>> = HashMap::new();
    for (term, postings) in by_term {
        for (doc_id, value) in postings {
            per_doc.entry(doc_id).or_default().push((term, value));
        }
    }
    let records: Vec<(u32, crate::space::sparse::SparseVector)> = per_doc
        .into_iter()
        .map(|(doc_id, mut pairs)| {
            pairs.sort_by_key(|(term, _)| *term);
            (doc_id, crate::space::sparse::SparseVector::from_pairs(&pairs))
        })
        .collect();
    Ok(InvertedIndex::build(&records, block_size))
}

/// Needed by [`save_inverted_index`]/[`load_inverted_index`]: a flat view of
/// every term's raw postings, ungrouped by block.
impl InvertedIndex {
    #[must_use]
    fn terms_snapshot(&self) -> Vec<(u32, Vec<Posting>)> {
        let mut out: Vec<(u32, Vec<Posting>)> = Vec::new();
        for term in self.term_ids() {
            if let Some(list) = self.get(term) {
                out.push((term, list.postings().to_vec()));
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::ObjectId;
    use crate::space::builtin::DenseL2Space;

    fn obj(id: ObjectId, values: &[f32]) -> Object<'static> {
        Object::new_owned(id, -1, values.iter().flat_map(|f| f.to_le_bytes()).collect())
    }

    #[test]
    fn hnsw_roundtrip_preserves_search_results() {
        let index = HnswIndex::new(DenseL2Space, HnswParams::default());
        for i in 0..20i32 {
            index.insert(obj(i, &[i as f32, (i * 2) as f32])).unwrap();
        }
        let bytes = save_hnsw(&index);
        let loaded = load_hnsw(DenseL2Space, &bytes).unwrap();

        let query = obj(999, &[5.0, 10.0]);
        assert_eq!(index.knn(&query, 5, None), loaded.knn(&query, 5, None));
    }

    #[test]
    fn hnsw_load_rejects_bad_magic() {
        let bytes = vec![0u8; 20];
        assert!(load_hnsw(DenseL2Space, &bytes).is_err());
    }

    #[test]
    fn napp_roundtrip_preserves_search_results() {
        let objects: Vec<Object<'static>> = (0..60i32)
            .map(|id| obj(id, &[(id % 10) as f32, (id / 10) as f32]))
            .collect();
        let pivots: Vec<Object<'static>> = objects.iter().step_by(6).map(Object::to_owned_object).collect();
        let num_pivot = pivots.len();
        let params = crate::napp::params::NappParams {
            num_pivot,
            num_prefix: num_pivot,
            num_prefix_search: num_pivot,
            min_times: 1,
            chunk_index_size: 32,
            db_scan_frac: 1.0,
            knn_amp: 0,
            skip_checking: false,
            disable_pivot_index: false,
            hash_trick_dim: None,
            inv_proc_alg: crate::napp::scan_count::InvProcAlg::Scan,
        };
        let index = NappIndex::build(DenseL2Space, params, pivots, objects).unwrap();
        let bytes = save_napp(&index);
        let loaded = load_napp(DenseL2Space, &bytes).unwrap();

        let query = obj(999, &[4.0, 3.0]);
        assert_eq!(index.knn(&query, 5), loaded.knn(&query, 5));
    }

    #[test]
    fn inverted_index_roundtrip_preserves_postings() {
        let records = vec![
            (0u32, crate::space::sparse::SparseVector::from_pairs(&[(1, 2.0), (2, 1.0)])),
            (1u32, crate::space::sparse::SparseVector::from_pairs(&[(1, 0.5)])),
        ];
        let index = InvertedIndex::build(&records, 64);
        let bytes = save_inverted_index(&index, 64);
        let loaded = load_inverted_index(&bytes).unwrap();

        let query = crate::space::sparse::SparseVector::from_pairs(&[(1, 1.0), (2, 1.0)]);
        assert_eq!(
            crate::inverted::daat::top_k(&index, &query, 5),
            crate::inverted::daat::top_k(&loaded, &query, 5)
        );
    }
}
