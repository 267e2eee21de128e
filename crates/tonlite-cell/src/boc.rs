//! Bag-of-cells framing.
//!
//! The serialized form lists every distinct cell once, parents before
//! children, so reference indices always point forward. Serialization
//! therefore emits a reverse post-order walk of the root DAG, and
//! deserialization builds cells back to front.

use std::collections::HashMap;
use std::sync::Arc;

use base64::Engine;
use tonlite_crypto::crc32c;

use crate::{Cell, CellError, CellResult, CellType, BOC_MAGIC};

/// A parsed or to-be-serialized collection of root cells.
#[derive(Debug, Clone)]
pub struct BagOfCells {
    roots: Vec<Arc<Cell>>,
}

impl BagOfCells {
    pub fn new(roots: Vec<Arc<Cell>>) -> Self {
        Self { roots }
    }

    pub fn from_root(root: Cell) -> Self {
        Self {
            roots: vec![Arc::new(root)],
        }
    }

    pub fn roots(&self) -> &[Arc<Cell>] {
        &self.roots
    }

    pub fn single_root(&self) -> CellResult<&Arc<Cell>> {
        match self.roots.as_slice() {
            [root] => Ok(root),
            other => Err(CellError::RootCount(other.len())),
        }
    }

    /// Serializes with a trailing CRC-32C and no index table.
    pub fn serialize(&self) -> CellResult<Vec<u8>> {
        self.serialize_with_crc(true)
    }

    pub fn serialize_with_crc(&self, with_crc: bool) -> CellResult<Vec<u8>> {
        if self.roots.is_empty() {
            return Err(CellError::InvalidBoc("no root cells".into()));
        }

        let (cells, index_of) = self.collect_cells();

        let size_width = width_for(cells.len());
        let mut bodies = Vec::with_capacity(cells.len());
        let mut total_size = 0usize;
        for cell in &cells {
            let body = serialize_cell(cell, &index_of, size_width)?;
            total_size += body.len();
            bodies.push(body);
        }

        let offset_width = width_for(total_size);

        let mut out = Vec::with_capacity(16 + total_size);
        out.extend_from_slice(&BOC_MAGIC.to_be_bytes());
        let flags = if with_crc { 0x40 } else { 0 } | size_width as u8;
        out.push(flags);
        out.push(offset_width as u8);
        write_be(&mut out, cells.len() as u64, size_width);
        write_be(&mut out, self.roots.len() as u64, size_width);
        write_be(&mut out, 0, size_width); // absent cells
        write_be(&mut out, total_size as u64, offset_width);
        for root in &self.roots {
            write_be(&mut out, index_of[&root.own_hash()] as u64, size_width);
        }
        for body in bodies {
            out.extend_from_slice(&body);
        }
        if with_crc {
            let crc = crc32c(&out);
            out.extend_from_slice(&crc.to_le_bytes());
        }
        Ok(out)
    }

    pub fn serialize_to_base64(&self) -> CellResult<String> {
        Ok(base64::engine::general_purpose::STANDARD.encode(self.serialize()?))
    }

    pub fn deserialize(data: &[u8]) -> CellResult<Self> {
        let mut reader = ByteReader::new(data);

        let magic = reader.read_be(4)? as u32;
        if magic != BOC_MAGIC {
            return Err(CellError::InvalidBoc(format!(
                "unexpected magic {magic:08x}"
            )));
        }

        let flags = reader.read_be(1)? as u8;
        let has_index = flags & 0x80 != 0;
        let has_crc = flags & 0x40 != 0;
        let size_width = (flags & 0x07) as usize;
        let offset_width = reader.read_be(1)? as usize;
        if size_width == 0 || size_width > 8 || offset_width == 0 || offset_width > 8 {
            return Err(CellError::InvalidBoc("bad size descriptors".into()));
        }

        let cell_count = reader.read_be(size_width)? as usize;
        let root_count = reader.read_be(size_width)? as usize;
        let absent_count = reader.read_be(size_width)? as usize;
        let total_size = reader.read_be(offset_width)? as usize;
        if absent_count != 0 {
            return Err(CellError::InvalidBoc("absent cells not supported".into()));
        }
        if root_count == 0 {
            return Err(CellError::InvalidBoc("no root cells".into()));
        }

        let mut root_indices = Vec::with_capacity(root_count);
        for _ in 0..root_count {
            root_indices.push(reader.read_be(size_width)? as usize);
        }

        if has_index {
            reader.skip(cell_count * offset_width)?;
        }

        if has_crc {
            if data.len() < 4 {
                return Err(CellError::InvalidBoc("truncated checksum".into()));
            }
            let body_end = data.len() - 4;
            let expected = u32::from_le_bytes([
                data[body_end],
                data[body_end + 1],
                data[body_end + 2],
                data[body_end + 3],
            ]);
            let actual = crc32c(&data[..body_end]);
            if expected != actual {
                return Err(CellError::ChecksumMismatch { expected, actual });
            }
        }

        let cells = parse_cells(reader.take(total_size)?, cell_count, size_width)?;

        let roots = root_indices
            .into_iter()
            .map(|idx| {
                cells
                    .get(idx)
                    .cloned()
                    .ok_or_else(|| CellError::InvalidBoc(format!("root index {idx} out of range")))
            })
            .collect::<CellResult<Vec<_>>>()?;

        Ok(Self { roots })
    }

    pub fn deserialize_base64(encoded: &str) -> CellResult<Self> {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(encoded.trim())
            .map_err(|e| CellError::InvalidBoc(format!("base64: {e}")))?;
        Self::deserialize(&bytes)
    }

    /// Distinct cells in reverse post-order, so every parent precedes
    /// its children. Dedup keys on [`Cell::own_hash`]: a pruned branch
    /// and the subtree it prunes share a level-0 hash but must stay
    /// separate cells.
    fn collect_cells(&self) -> (Vec<Arc<Cell>>, HashMap<[u8; 32], usize>) {
        let mut post_order: Vec<Arc<Cell>> = Vec::new();
        let mut seen: HashMap<[u8; 32], usize> = HashMap::new();

        fn walk(
            cell: &Arc<Cell>,
            post_order: &mut Vec<Arc<Cell>>,
            seen: &mut HashMap<[u8; 32], usize>,
        ) {
            if seen.contains_key(&cell.own_hash()) {
                return;
            }
            for child in cell.references() {
                walk(child, post_order, seen);
            }
            seen.insert(cell.own_hash(), post_order.len());
            post_order.push(cell.clone());
        }

        for root in &self.roots {
            walk(root, &mut post_order, &mut seen);
        }

        post_order.reverse();
        let last = post_order.len() - 1;
        for index in seen.values_mut() {
            *index = last - *index;
        }
        (post_order, seen)
    }
}

fn serialize_cell(
    cell: &Cell,
    index_of: &HashMap<[u8; 32], usize>,
    ref_width: usize,
) -> CellResult<Vec<u8>> {
    let (d1, d2) = cell.descriptors();
    let mut out = vec![d1, d2];
    out.extend_from_slice(&cell.data_with_tag());
    for child in cell.references() {
        let idx = index_of
            .get(&child.own_hash())
            .ok_or_else(|| CellError::InvalidBoc("dangling reference".into()))?;
        write_be(&mut out, *idx as u64, ref_width);
    }
    Ok(out)
}

fn parse_cells(data: &[u8], cell_count: usize, ref_width: usize) -> CellResult<Vec<Arc<Cell>>> {
    struct RawCell {
        data: Vec<u8>,
        bit_len: usize,
        cell_type: CellType,
        refs: Vec<usize>,
    }

    let mut reader = ByteReader::new(data);
    let mut raw = Vec::with_capacity(cell_count);

    for index in 0..cell_count {
        let d1 = reader.read_be(1)? as u8;
        let d2 = reader.read_be(1)? as u8;

        let ref_count = (d1 & 0x07) as usize;
        let is_exotic = d1 & 0x08 != 0;
        if ref_count > 4 {
            return Err(CellError::InvalidBoc(format!(
                "cell {index} claims {ref_count} references"
            )));
        }

        let byte_len = (d2 as usize).div_ceil(2);
        let body = reader.take(byte_len)?;

        let cell_type = if is_exotic {
            CellType::from_exotic_tag(*body.first().ok_or_else(|| {
                CellError::InvalidBoc("exotic cell without a tag byte".into())
            })?)?
        } else {
            CellType::Ordinary
        };

        let (data, bit_len) = if d2 % 2 == 0 {
            (body.to_vec(), byte_len * 8)
        } else {
            strip_completion_tag(body)?
        };

        let mut refs = Vec::with_capacity(ref_count);
        for _ in 0..ref_count {
            let child = reader.read_be(ref_width)? as usize;
            // Parents precede children, so references must point forward.
            if child <= index || child >= cell_count {
                return Err(CellError::InvalidBoc(format!(
                    "cell {index} references {child}"
                )));
            }
            refs.push(child);
        }

        raw.push(RawCell {
            data,
            bit_len,
            cell_type,
            refs,
        });
    }

    // Children first.
    let mut cells: Vec<Option<Arc<Cell>>> = vec![None; cell_count];
    for (index, raw_cell) in raw.into_iter().enumerate().rev() {
        let references = raw_cell
            .refs
            .iter()
            .map(|&child| {
                cells[child]
                    .clone()
                    .ok_or_else(|| CellError::InvalidBoc(format!("unresolved reference {child}")))
            })
            .collect::<CellResult<Vec<_>>>()?;
        let cell = Cell::finalize(raw_cell.data, raw_cell.bit_len, references, raw_cell.cell_type)?;
        cells[index] = Some(Arc::new(cell));
    }

    cells
        .into_iter()
        .enumerate()
        .map(|(i, c)| c.ok_or_else(|| CellError::InvalidBoc(format!("cell {i} missing"))))
        .collect()
}

/// Splits a padded body into payload bytes and its exact bit length.
fn strip_completion_tag(body: &[u8]) -> CellResult<(Vec<u8>, usize)> {
    let last = *body
        .last()
        .ok_or_else(|| CellError::InvalidBoc("padded cell with empty body".into()))?;
    if last == 0 {
        return Err(CellError::InvalidBoc("missing completion tag".into()));
    }
    let bit_len = body.len() * 8 - last.trailing_zeros() as usize - 1;
    let mut data = body.to_vec();
    // Clear the tag bit.
    let tail = data.len() - 1;
    data[tail] &= !(last & last.wrapping_neg());
    data.truncate(bit_len.div_ceil(8));
    Ok((data, bit_len))
}

fn width_for(value: usize) -> usize {
    ((usize::BITS - value.leading_zeros()) as usize).div_ceil(8).max(1)
}

fn write_be(out: &mut Vec<u8>, value: u64, width: usize) {
    for i in (0..width).rev() {
        out.push((value >> (i * 8)) as u8);
    }
}

struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn take(&mut self, len: usize) -> CellResult<&'a [u8]> {
        if self.pos + len > self.data.len() {
            return Err(CellError::InvalidBoc("unexpected end of input".into()));
        }
        let slice = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    fn skip(&mut self, len: usize) -> CellResult<()> {
        self.take(len).map(|_| ())
    }

    fn read_be(&mut self, width: usize) -> CellResult<u64> {
        let bytes = self.take(width)?;
        Ok(bytes.iter().fold(0u64, |acc, &b| acc << 8 | b as u64))
    }
}
