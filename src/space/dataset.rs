//! Text and binary dataset formats, and the per-stream state a space uses to
//! validate records as it parses them (spec §6).
//!
//! Text format: one object per line, `parse_object` is handed the line body
//! (external id already stripped by the caller) plus a [`StreamState`]
//! tracking the dimensionality observed on the first line of a dense stream
//! so later lines are checked for consistency rather than silently accepted.

use crate::error::{Error, Result};
use crate::object::{Label, Object, ObjectId, EMPTY_LABEL};
use crate::space::Space;

/// Line prefix carrying an optional class label ahead of the object body
/// (spec §6), e.g. `label:9 1 2 3`.
const LABEL_PREFIX: &str = "label:";

/// Strips a leading `label:<int> ` prefix from `line`, returning the parsed
/// label and the remaining object body. Lines without the prefix parse as
/// `EMPTY_LABEL` with the line unchanged.
fn extract_label(line: &str) -> Result<(Label, &str)> {
    let Some(rest) = line.strip_prefix(LABEL_PREFIX) else {
        return Ok((EMPTY_LABEL, line));
    };
    let split = rest.find(char::is_whitespace).unwrap_or(rest.len());
    let (num, body) = rest.split_at(split);
    let label: Label = num
        .parse()
        .map_err(|_| Error::format(0, format!("invalid label prefix: {num:?}")))?;
    Ok((label, body.trim_start()))
}

/// Per-stream parsing state threaded through repeated calls to
/// `Space::parse_object` while reading one dataset.
#[derive(Debug, Default)]
pub struct StreamState {
    line_no: usize,
    expected_dim: Option<usize>,
}

impl StreamState {
    /// Starts tracking state for a new stream.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current 1-based line number (updated by [`read_text_dataset`]).
    #[must_use]
    pub const fn line_no(&self) -> usize {
        self.line_no
    }

    /// Checks `dim` against the dimensionality recorded for this stream,
    /// recording it if this is the first record seen.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Format`] if `dim` disagrees with a previously
    /// recorded dimensionality.
    pub fn check_dimension(&mut self, dim: usize) -> Result<()> {
        match self.expected_dim {
            None => {
                self.expected_dim = Some(dim);
                Ok(())
            }
            Some(expected) if expected == dim => Ok(()),
            Some(expected) => Err(Error::format(
                self.line_no,
                format!("dimensionality mismatch: expected {expected}, got {dim}"),
            )),
        }
    }
}

/// Reads a whitespace/newline-delimited text dataset, parsing every line
/// through `space` and assigning sequential ids starting at 0.
///
/// # Errors
///
/// Propagates [`Error::Format`] from `space.parse_object`, annotated with the
/// offending line number.
pub fn read_text_dataset<'o>(space: &dyn Space, text: &str) -> Result<Vec<Object<'o>>> {
    let mut state = StreamState::new();
    let mut objects = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        state.line_no = idx + 1;
        if line.trim().is_empty() {
            continue;
        }
        let id: ObjectId = objects.len() as ObjectId;
        let (label, body) = extract_label(line).map_err(|e| annotate_line(e, state.line_no))?;
        let object = space
            .parse_object(id, label, body, &mut state)
            .map_err(|e| annotate_line(e, state.line_no))?;
        objects.push(object);
    }
    Ok(objects)
}

fn annotate_line(err: Error, line: usize) -> Error {
    match err {
        Error::Format { message, .. } => Error::format(line, message),
        other => other,
    }
}

/// Writes a text dataset, one object per line via `space.emit_object`, using
/// each object's own id as the external id. Objects carrying a label other
/// than `EMPTY_LABEL` get the `label:<int> ` prefix (spec §6) prepended.
#[must_use]
pub fn write_text_dataset(space: &dyn Space, objects: &[Object<'_>]) -> String {
    objects
        .iter()
        .map(|o| {
            let body = space.emit_object(o, i64::from(o.id()));
            if o.label() == EMPTY_LABEL {
                body
            } else {
                format!("{LABEL_PREFIX}{} {body}", o.label())
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Reads the binary sparse-vector dataset format: a little-endian `u64`
/// record count, followed by that many records of `(u32 count, (u32 id, f32
/// value) * count)`.
///
/// # Errors
///
/// Returns [`Error::Format`] if the buffer is truncated or a record's
/// element count overruns the remaining bytes.
pub fn read_binary_sparse_dataset(buf: &[u8]) -> Result<Vec<Vec<(u32, f32)>>> {
    let mut pos = 0usize;
    let take = |pos: &mut usize, n: usize| -> Result<&[u8]> {
        if *pos + n > buf.len() {
            return Err(Error::format(0, "truncated binary sparse dataset"));
        }
        let slice = &buf[*pos..*pos + n];
        *pos += n;
        Ok(slice)
    };

    let count_bytes = take(&mut pos, 8)?;
    let record_count = u64::from_le_bytes(count_bytes.try_into().unwrap());

    let mut records = Vec::with_capacity(record_count as usize);
    for _ in 0..record_count {
        let nnz_bytes = take(&mut pos, 4)?;
        let nnz = u32::from_le_bytes(nnz_bytes.try_into().unwrap()) as usize;
        let mut entries = Vec::with_capacity(nnz);
        for _ in 0..nnz {
            let id_bytes = take(&mut pos, 4)?;
            let value_bytes = take(&mut pos, 4)?;
            let id = u32::from_le_bytes(id_bytes.try_into().unwrap());
            let value = f32::from_le_bytes(value_bytes.try_into().unwrap());
            entries.push((id, value));
        }
        records.push(entries);
    }
    Ok(records)
}

/// Writes the binary sparse-vector dataset format (inverse of
/// [`read_binary_sparse_dataset`]).
#[must_use]
pub fn write_binary_sparse_dataset(records: &[Vec<(u32, f32)>]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&(records.len() as u64).to_le_bytes());
    for record in records {
        out.extend_from_slice(&(record.len() as u32).to_le_bytes());
        for (id, value) in record {
            out.extend_from_slice(&id.to_le_bytes());
            out.extend_from_slice(&value.to_le_bytes());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::space::builtin::DenseL2Space;

    #[test]
    fn text_dataset_roundtrip() {
        let space = DenseL2Space;
        let text = "1.0 2.0 3.0\n4.0 5.0 6.0\n";
        let objects = read_text_dataset(&space, text).unwrap();
        assert_eq!(objects.len(), 2);
        assert_eq!(objects[0].id(), 0);
        assert_eq!(objects[1].id(), 1);
    }

    #[test]
    fn text_dataset_parses_label_prefix() {
        let space = DenseL2Space;
        let text = "label:3456 1.0 2.0 3.0\n4.0 5.0 6.0\n";
        let objects = read_text_dataset(&space, text).unwrap();
        assert_eq!(objects[0].label(), 3456);
        assert_eq!(objects[1].label(), EMPTY_LABEL);
    }

    #[test]
    fn text_dataset_label_roundtrips_through_write() {
        let space = DenseL2Space;
        let text = "label:9 1.0 2.0 3.0\n";
        let objects = read_text_dataset(&space, text).unwrap();
        let written = write_text_dataset(&space, &objects);
        assert!(written.starts_with("label:9 "), "got {written:?}");
        let reparsed = read_text_dataset(&space, &written).unwrap();
        assert_eq!(reparsed[0].label(), 9);
    }

    #[test]
    fn text_dataset_rejects_dimension_mismatch() {
        let space = DenseL2Space;
        let text = "1.0 2.0 3.0\n4.0 5.0\n";
        let err = read_text_dataset(&space, text).unwrap_err();
        assert!(matches!(err, Error::Format { line: 2, .. }));
    }

    #[test]
    fn binary_sparse_dataset_roundtrip() {
        let records = vec![vec![(1, 1.5), (3, -2.0)], vec![], vec![(0, 9.0)]];
        let packed = write_binary_sparse_dataset(&records);
        let unpacked = read_binary_sparse_dataset(&packed).unwrap();
        assert_eq!(unpacked, records);
    }

    #[test]
    fn binary_sparse_dataset_rejects_truncation() {
        let records = vec![vec![(1, 1.5)]];
        let mut packed = write_binary_sparse_dataset(&records);
        packed.truncate(packed.len() - 1);
        assert!(read_binary_sparse_dataset(&packed).is_err());
    }
}
