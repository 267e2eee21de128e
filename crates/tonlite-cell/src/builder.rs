//! Cell construction.

use std::sync::Arc;

use crate::{
    Address, Cell, CellError, CellResult, CellSlice, CellType, MAX_CELL_BITS, MAX_CELL_REFS,
};

/// Accumulates bits and references, then finalizes them into a [`Cell`].
///
/// Store methods return the builder so writes can be chained; `build`
/// borrows, so a builder can emit a cell and keep accumulating (useful
/// when assembling dictionary edges).
#[derive(Debug, Clone, Default)]
pub struct CellBuilder {
    data: Vec<u8>,
    bit_len: usize,
    references: Vec<Arc<Cell>>,
    cell_type: Option<CellType>,
}

impl CellBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks the cell as exotic. The first data byte must carry the
    /// matching tag.
    pub fn exotic(cell_type: CellType) -> Self {
        Self {
            cell_type: Some(cell_type),
            ..Self::default()
        }
    }

    pub fn store_bit(&mut self, bit: bool) -> CellResult<&mut Self> {
        if self.bit_len >= MAX_CELL_BITS {
            return Err(CellError::Overflow {
                bits: self.bit_len + 1,
            });
        }
        if self.bit_len % 8 == 0 {
            self.data.push(0);
        }
        if bit {
            self.data[self.bit_len / 8] |= 1 << (7 - self.bit_len % 8);
        }
        self.bit_len += 1;
        Ok(self)
    }

    pub fn store_bits(&mut self, bits: &[bool]) -> CellResult<&mut Self> {
        for &bit in bits {
            self.store_bit(bit)?;
        }
        Ok(self)
    }

    /// Stores `bits` bits of `value`, big-endian.
    pub fn store_uint(&mut self, value: u64, bits: usize) -> CellResult<&mut Self> {
        if bits > 64 {
            return Err(CellError::UnsupportedWidth(bits));
        }
        if self.bit_len + bits > MAX_CELL_BITS {
            return Err(CellError::Overflow {
                bits: self.bit_len + bits,
            });
        }
        for i in (0..bits).rev() {
            self.store_bit(value >> i & 1 == 1)?;
        }
        Ok(self)
    }

    /// Stores a two's complement signed integer, big-endian.
    pub fn store_int(&mut self, value: i64, bits: usize) -> CellResult<&mut Self> {
        self.store_uint(value as u64, bits)
    }

    pub fn store_u8(&mut self, value: u8) -> CellResult<&mut Self> {
        self.store_uint(value as u64, 8)
    }

    pub fn store_u16(&mut self, value: u16) -> CellResult<&mut Self> {
        self.store_uint(value as u64, 16)
    }

    pub fn store_u32(&mut self, value: u32) -> CellResult<&mut Self> {
        self.store_uint(value as u64, 32)
    }

    pub fn store_u64(&mut self, value: u64) -> CellResult<&mut Self> {
        self.store_uint(value, 64)
    }

    pub fn store_bytes(&mut self, bytes: &[u8]) -> CellResult<&mut Self> {
        if self.bit_len % 8 == 0 {
            // Fast path: byte-aligned append.
            if self.bit_len + bytes.len() * 8 > MAX_CELL_BITS {
                return Err(CellError::Overflow {
                    bits: self.bit_len + bytes.len() * 8,
                });
            }
            self.data.extend_from_slice(bytes);
            self.bit_len += bytes.len() * 8;
            return Ok(self);
        }
        for &byte in bytes {
            self.store_u8(byte)?;
        }
        Ok(self)
    }

    /// Stores a `VarUInteger 16` amount (coin values).
    pub fn store_coins(&mut self, amount: u128) -> CellResult<&mut Self> {
        let len = 16 - amount.leading_zeros() as usize / 8;
        if len > 15 {
            return Err(CellError::UnsupportedWidth(len * 8));
        }
        self.store_uint(len as u64, 4)?;
        for i in (0..len).rev() {
            self.store_u8((amount >> (i * 8)) as u8)?;
        }
        Ok(self)
    }

    /// Stores an internal address in its 267-bit `addr_std` form.
    pub fn store_address(&mut self, address: &Address) -> CellResult<&mut Self> {
        self.store_uint(0b10, 2)?;
        self.store_bit(false)?; // no anycast
        self.store_int(address.workchain as i64, 8)?;
        self.store_bytes(&address.hash)
    }

    /// Stores `addr_none$00`.
    pub fn store_empty_address(&mut self) -> CellResult<&mut Self> {
        self.store_uint(0b00, 2)
    }

    /// Appends the remainder of a slice, bits and references.
    pub fn store_slice(&mut self, slice: &CellSlice<'_>) -> CellResult<&mut Self> {
        let mut slice = slice.clone();
        while slice.bits_left() >= 8 {
            let byte = slice.load_uint(8)? as u8;
            self.store_u8(byte)?;
        }
        while slice.bits_left() > 0 {
            let bit = slice.load_bit()?;
            self.store_bit(bit)?;
        }
        while slice.refs_left() > 0 {
            self.store_ref(slice.load_ref()?.clone())?;
        }
        Ok(self)
    }

    pub fn store_ref(&mut self, cell: Arc<Cell>) -> CellResult<&mut Self> {
        if self.references.len() >= MAX_CELL_REFS {
            return Err(CellError::RefOverflow);
        }
        self.references.push(cell);
        Ok(self)
    }

    pub fn bit_len(&self) -> usize {
        self.bit_len
    }

    pub fn bits_left(&self) -> usize {
        MAX_CELL_BITS - self.bit_len
    }

    pub fn build(&self) -> CellResult<Cell> {
        Cell::finalize(
            self.data.clone(),
            self.bit_len,
            self.references.clone(),
            self.cell_type.unwrap_or(CellType::Ordinary),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bits_pack_msb_first() {
        let cell = CellBuilder::new()
            .store_bit(true)
            .unwrap()
            .store_bit(false)
            .unwrap()
            .store_bit(true)
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(cell.bit_len(), 3);
        assert_eq!(cell.data(), &[0b1010_0000]);
    }

    #[test]
    fn uint_is_big_endian() {
        let cell = CellBuilder::new().store_u32(0x1234_5678).unwrap().build().unwrap();
        assert_eq!(cell.data(), &[0x12, 0x34, 0x56, 0x78]);
    }

    #[test]
    fn unaligned_bytes() {
        let mut b = CellBuilder::new();
        b.store_bit(true).unwrap();
        b.store_bytes(&[0xff, 0x00]).unwrap();
        let cell = b.build().unwrap();
        assert_eq!(cell.bit_len(), 17);
        assert_eq!(cell.data(), &[0b1111_1111, 0b1000_0000, 0b0000_0000]);
    }

    #[test]
    fn coins_zero_is_four_zero_bits() {
        let cell = CellBuilder::new().store_coins(0).unwrap().build().unwrap();
        assert_eq!(cell.bit_len(), 4);
        assert_eq!(cell.data(), &[0x00]);
    }

    #[test]
    fn capacity_enforced() {
        let mut b = CellBuilder::new();
        b.store_bytes(&[0u8; 127]).unwrap();
        b.store_uint(0, 7).unwrap(); // exactly 1023 bits
        assert!(b.store_bit(false).is_err());
    }

    #[test]
    fn ref_capacity_enforced() {
        let child = Arc::new(Cell::empty());
        let mut b = CellBuilder::new();
        for _ in 0..4 {
            b.store_ref(child.clone()).unwrap();
        }
        assert!(b.store_ref(child).is_err());
    }
}
