//! TVM stack serialization for get-method calls.
//!
//! The wire form is a bag-of-cells: the root carries a 24-bit depth and
//! an inline cons list, each cons holding the rest of the stack as a
//! reference and the top value inline. Entries are ordered bottom to
//! top in the decoded `Vec`.

use std::sync::Arc;

use num_bigint::BigInt;
use num_traits::ToPrimitive;
use tonlite_cell::{BagOfCells, Cell, CellBuilder, CellSlice};

use crate::{LiteError, LiteResult};

/// A slice value: a cell with bit and reference windows.
#[derive(Debug, Clone)]
pub struct VmSlice {
    pub cell: Arc<Cell>,
    pub st_bits: usize,
    pub end_bits: usize,
    pub st_ref: usize,
    pub end_ref: usize,
}

#[derive(Debug, Clone)]
pub enum StackEntry {
    Null,
    Nan,
    /// `vm_stk_tinyint` and `vm_stk_int` both land here; the encoder
    /// picks the short form when the value fits 64 bits.
    Int(BigInt),
    Cell(Arc<Cell>),
    Slice(VmSlice),
    Builder(Arc<Cell>),
    Tuple(Vec<StackEntry>),
}

impl StackEntry {
    pub fn int(value: impl Into<BigInt>) -> Self {
        Self::Int(value.into())
    }

    pub fn as_int(&self) -> Option<&BigInt> {
        match self {
            Self::Int(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        self.as_int().and_then(|n| n.to_i64())
    }

    pub fn as_cell(&self) -> Option<&Arc<Cell>> {
        match self {
            Self::Cell(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_tuple(&self) -> Option<&[StackEntry]> {
        match self {
            Self::Tuple(t) => Some(t),
            _ => None,
        }
    }
}

fn int257_bound() -> BigInt {
    BigInt::from(1) << 256
}

fn store_entry(b: &mut CellBuilder, entry: &StackEntry) -> LiteResult<()> {
    match entry {
        StackEntry::Null => {
            b.store_uint(0x00, 8)?;
        }
        StackEntry::Nan => {
            b.store_uint(0x02ff, 16)?;
        }
        StackEntry::Int(n) => {
            if let Some(v) = n.to_i64() {
                b.store_uint(0x01, 8)?;
                b.store_int(v, 64)?;
            } else {
                if n >= &int257_bound() || n <= &(-int257_bound()) {
                    return Err(LiteError::Proof(format!("integer {n} exceeds 257 bits")));
                }
                // 15-bit vm_stk_int tag, then sign bit and 256 magnitude
                // bits in two's complement.
                b.store_uint(0x0100, 15)?;
                let negative = n.sign() == num_bigint::Sign::Minus;
                b.store_bit(negative)?;
                let wrapped = if negative { n + int257_bound() } else { n.clone() };
                let (_, bytes) = wrapped.to_bytes_be();
                let mut padded = [0u8; 32];
                padded[32 - bytes.len()..].copy_from_slice(&bytes);
                b.store_bytes(&padded)?;
            }
        }
        StackEntry::Cell(cell) => {
            b.store_uint(0x03, 8)?;
            b.store_ref(Arc::clone(cell))?;
        }
        StackEntry::Slice(slice) => {
            b.store_uint(0x04, 8)?;
            b.store_ref(Arc::clone(&slice.cell))?;
            b.store_uint(slice.st_bits as u64, 10)?;
            b.store_uint(slice.end_bits as u64, 10)?;
            b.store_uint(slice.st_ref as u64, 3)?;
            b.store_uint(slice.end_ref as u64, 3)?;
        }
        StackEntry::Builder(cell) => {
            b.store_uint(0x05, 8)?;
            b.store_ref(Arc::clone(cell))?;
        }
        StackEntry::Tuple(_) => {
            return Err(LiteError::Proof("tuple arguments are not supported".into()));
        }
    }
    Ok(())
}

/// Serializes a stack, bottom first, into its bag-of-cells form.
pub fn serialize_stack(entries: &[StackEntry]) -> LiteResult<Vec<u8>> {
    let mut rest = Arc::new(CellBuilder::new().build()?);
    for entry in entries.iter().take(entries.len().saturating_sub(1)) {
        let mut b = CellBuilder::new();
        b.store_ref(Arc::clone(&rest))?;
        store_entry(&mut b, entry)?;
        rest = Arc::new(b.build()?);
    }

    let mut root = CellBuilder::new();
    root.store_uint(entries.len() as u64, 24)?;
    if let Some(top) = entries.last() {
        root.store_ref(rest)?;
        store_entry(&mut root, top)?;
    }
    Ok(BagOfCells::from_root(root.build()?).serialize()?)
}

fn load_int257(slice: &mut CellSlice<'_>) -> LiteResult<BigInt> {
    let negative = slice.load_bit()?;
    let bytes = slice.load_bytes(32)?;
    let magnitude = BigInt::from_bytes_be(num_bigint::Sign::Plus, &bytes);
    Ok(if negative {
        magnitude - int257_bound()
    } else {
        magnitude
    })
}

fn read_entry(slice: &mut CellSlice<'_>) -> LiteResult<StackEntry> {
    let tag = slice.load_uint(8)?;
    match tag {
        0x00 => Ok(StackEntry::Null),
        0x01 => Ok(StackEntry::Int(BigInt::from(slice.load_int(64)?))),
        0x02 => {
            // Either vm_stk_int (15-bit tag 0x0100) or vm_stk_nan (0x02ff).
            match slice.load_uint(7)? {
                0x00 => Ok(StackEntry::Int(load_int257(slice)?)),
                0x7f if slice.load_bit()? => Ok(StackEntry::Nan),
                other => Err(LiteError::Proof(format!(
                    "unknown stack tag 0x02/{other:02x}"
                ))),
            }
        }
        0x03 => Ok(StackEntry::Cell(Arc::clone(slice.load_ref()?))),
        0x04 => {
            let cell = Arc::clone(slice.load_ref()?);
            Ok(StackEntry::Slice(VmSlice {
                cell,
                st_bits: slice.load_uint(10)? as usize,
                end_bits: slice.load_uint(10)? as usize,
                st_ref: slice.load_uint(3)? as usize,
                end_ref: slice.load_uint(3)? as usize,
            }))
        }
        0x05 => Ok(StackEntry::Builder(Arc::clone(slice.load_ref()?))),
        0x07 => {
            let len = slice.load_uint(16)? as usize;
            read_tuple(slice, len)
        }
        other => Err(LiteError::Proof(format!("unknown stack tag 0x{other:02x}"))),
    }
}

fn read_tuple(slice: &mut CellSlice<'_>, len: usize) -> LiteResult<StackEntry> {
    if len == 0 {
        return Ok(StackEntry::Tuple(Vec::new()));
    }
    let mut entries = read_tuple_head(slice, len - 1)?;
    let tail = slice.load_ref()?;
    entries.push(read_entry(&mut CellSlice::new(tail))?);
    Ok(StackEntry::Tuple(entries))
}

fn read_tuple_head(slice: &mut CellSlice<'_>, len: usize) -> LiteResult<Vec<StackEntry>> {
    match len {
        0 => Ok(Vec::new()),
        1 => {
            let entry = slice.load_ref()?;
            Ok(vec![read_entry(&mut CellSlice::new(entry))?])
        }
        _ => {
            let inner = slice.load_ref()?;
            match read_tuple(&mut CellSlice::new(inner), len)? {
                StackEntry::Tuple(entries) => Ok(entries),
                _ => unreachable!(),
            }
        }
    }
}

/// Parses a stack from its bag-of-cells form, bottom first.
pub fn parse_stack(data: &[u8]) -> LiteResult<Vec<StackEntry>> {
    let boc = BagOfCells::deserialize(data)?;
    let root = boc.single_root()?;
    let mut slice = CellSlice::new(root);

    let depth = slice.load_uint(24)? as usize;
    let mut reversed = Vec::with_capacity(depth);
    for level in 0..depth {
        let rest = slice.load_ref()?;
        reversed.push(read_entry(&mut slice)?);
        if level + 1 < depth {
            slice = CellSlice::new(rest);
        }
    }
    reversed.reverse();
    Ok(reversed)
}
