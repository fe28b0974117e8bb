//! Packed sparse-vector representation used by the scalar-product family of
//! spaces (cosine, dot-product) and by NAPP's pivot bookkeeping.
//!
//! Element ids within a vector are strictly increasing (spec §3 invariant).
//! Before packing, ids are rewritten by [`remove_block_zeros`] so that no
//! rewritten id is ever a multiple of 65536 — this lets the blocked
//! intersection routine treat a block boundary unambiguously. Packed layout:
//!
//! ```text
//! header:  block_qty: u32, sum_of_squares: f32, inv_norm: f32
//!          block_counts[block_qty]: u32
//!          block_offsets[block_qty]: u32   (each a multiple of 65536)
//! bodies:  for each block: ids[count]: u16, values[count]: f32
//! ```

use crate::error::{Error, Result};

/// A sparse vector: strictly-ascending `(id, value)` pairs plus precomputed
/// norm data. Ids are stored in their *original* (un-rewritten) space; the
/// 65536-avoiding rewrite only happens during [`SparseVector::pack`].
#[derive(Debug, Clone, PartialEq)]
pub struct SparseVector {
    entries: Vec<(u32, f32)>,
    sum_of_squares: f32,
    inv_norm: f32,
}

impl SparseVector {
    /// Builds a sparse vector from `(id, value)` pairs, sorting by id and
    /// precomputing the sum-of-squares / inverse norm once.
    #[must_use]
    pub fn from_pairs(pairs: &[(u32, f32)]) -> Self {
        let mut entries = pairs.to_vec();
        entries.sort_by_key(|(id, _)| *id);
        let sum_of_squares: f32 = entries.iter().map(|(_, v)| v * v).sum();
        let inv_norm = if sum_of_squares > 0.0 {
            1.0 / sum_of_squares.sqrt()
        } else {
            0.0
        };
        Self {
            entries,
            sum_of_squares,
            inv_norm,
        }
    }

    /// Iterates `(id, value)` pairs in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, f32)> + '_ {
        self.entries.iter().copied()
    }

    /// Number of non-zero elements.
    #[must_use]
    pub fn nnz(&self) -> usize {
        self.entries.len()
    }

    /// Precomputed sum of squared values.
    #[must_use]
    pub const fn sum_of_squares(&self) -> f32 {
        self.sum_of_squares
    }

    /// Precomputed `1 / sqrt(sum_of_squares)` (0 if the vector is all-zero).
    #[must_use]
    pub const fn inv_norm(&self) -> f32 {
        self.inv_norm
    }

    /// Packs into the blocked binary layout described at module level.
    #[must_use]
    pub fn pack(&self) -> Vec<u8> {
        // Group rewritten ids by 65536-sized block.
        let mut blocks: Vec<(u32, Vec<(u16, f32)>)> = Vec::new();
        for &(id, value) in &self.entries {
            let rewritten = remove_block_zeros(id);
            let block_offset = (rewritten / 65536) * 65536;
            let in_block = (rewritten % 65536) as u16;
            match blocks.last_mut() {
                Some((offset, items)) if *offset == block_offset => items.push((in_block, value)),
                _ => blocks.push((block_offset, vec![(in_block, value)])),
            }
        }

        let mut out = Vec::new();
        out.extend_from_slice(&(blocks.len() as u32).to_le_bytes());
        out.extend_from_slice(&self.sum_of_squares.to_le_bytes());
        out.extend_from_slice(&self.inv_norm.to_le_bytes());
        for (_, items) in &blocks {
            out.extend_from_slice(&(items.len() as u32).to_le_bytes());
        }
        for (offset, _) in &blocks {
            out.extend_from_slice(&offset.to_le_bytes());
        }
        for (_, items) in &blocks {
            for (in_block, _) in items {
                out.extend_from_slice(&in_block.to_le_bytes());
            }
            for (_, value) in items {
                out.extend_from_slice(&value.to_le_bytes());
            }
        }
        out
    }

    /// Unpacks a buffer produced by [`SparseVector::pack`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Format`] if the buffer is truncated or internally
    /// inconsistent (e.g. a block count that doesn't fit the remaining
    /// bytes).
    pub fn unpack(buf: &[u8]) -> Result<Self> {
        let mut cursor = Cursor::new(buf);
        let block_qty = cursor.read_u32()? as usize;
        let sum_of_squares = cursor.read_f32()?;
        let inv_norm = cursor.read_f32()?;

        let mut counts = Vec::with_capacity(block_qty);
        for _ in 0..block_qty {
            counts.push(cursor.read_u32()? as usize);
        }
        let mut offsets = Vec::with_capacity(block_qty);
        for _ in 0..block_qty {
            offsets.push(cursor.read_u32()?);
        }

        let mut entries = Vec::new();
        for block in 0..block_qty {
            let count = counts[block];
            let offset = offsets[block];
            let mut in_block_ids = Vec::with_capacity(count);
            for _ in 0..count {
                in_block_ids.push(cursor.read_u16()?);
            }
            for &in_block in &in_block_ids {
                let value = cursor.read_f32()?;
                let rewritten = offset + u32::from(in_block);
                entries.push((add_block_zeros(rewritten), value));
            }
        }

        Ok(Self {
            entries,
            sum_of_squares,
            inv_norm,
        })
    }
}

/// Rewrites an id so the result is never a multiple of 65536: a bijection on
/// ids that are not already a multiple of 65536. `i -> (i/65535)*65536 +
/// (i%65535) + 1`.
#[must_use]
pub fn remove_block_zeros(id: u32) -> u32 {
    (id / 65535) * 65536 + (id % 65535) + 1
}

/// Inverse of [`remove_block_zeros`].
#[must_use]
pub fn add_block_zeros(rewritten: u32) -> u32 {
    let hi = rewritten / 65536;
    let lo = (rewritten % 65536) - 1;
    hi * 65535 + lo
}

/// Computes the size of the intersection of two strictly-ascending id lists
/// using the textbook two-pointer merge (the scalar reference algorithm
/// that the SIMD-accelerated `_mm_cmpistrm` path must agree with).
#[must_use]
pub fn intersection_size_scalar(a: &[u32], b: &[u32]) -> usize {
    let (mut i, mut j, mut count) = (0, 0, 0);
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                count += 1;
                i += 1;
                j += 1;
            }
        }
    }
    count
}

/// Computes the size of the intersection of two strictly-ascending id lists
/// using a block-skipping scan: the "fast" path referenced in spec §8,
/// gated behind this crate's scalar fallback until a runtime-detected SIMD
/// kernel is wired in (see Design Notes §9 on gating SIMD behind
/// cpu-feature detection).
#[must_use]
pub fn intersection_size_fast(a: &[u32], b: &[u32]) -> usize {
    // No SIMD kernel is built into this crate yet; delegate to the scalar
    // algorithm so callers get a correct answer regardless of build target.
    intersection_size_scalar(a, b)
}

/// Three-way intersection size, consistent with repeated pairwise
/// intersection on degenerate inputs (spec §8).
#[must_use]
pub fn intersection_size3_scalar(a: &[u32], b: &[u32], c: &[u32]) -> usize {
    let (mut i, mut j, mut k, mut count) = (0, 0, 0, 0);
    while i < a.len() && j < b.len() && k < c.len() {
        let (av, bv, cv) = (a[i], b[j], c[k]);
        if av == bv && bv == cv {
            count += 1;
            i += 1;
            j += 1;
            k += 1;
        } else {
            let max = av.max(bv).max(cv);
            if av < max {
                i += 1;
            } else if bv < max {
                j += 1;
            } else {
                k += 1;
            }
        }
    }
    count
}

struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    const fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.pos + n > self.buf.len() {
            return Err(Error::format(0, "truncated sparse vector buffer"));
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn read_u16(&mut self) -> Result<u16> {
        Ok(u16::from_le_bytes(self.take(2)?.try_into().unwrap()))
    }

    fn read_u32(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.take(4)?.try_into().unwrap()))
    }

    fn read_f32(&mut self) -> Result<f32> {
        Ok(f32::from_le_bytes(self.take(4)?.try_into().unwrap()))
    }
}
