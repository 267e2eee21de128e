//! Sequential cell readers.

use std::sync::Arc;

use crate::{Address, Cell, CellError, CellResult};

/// A cursor over a cell's bits and references.
#[derive(Debug, Clone)]
pub struct CellSlice<'a> {
    cell: &'a Cell,
    bit_pos: usize,
    ref_pos: usize,
}

impl<'a> CellSlice<'a> {
    pub fn new(cell: &'a Cell) -> Self {
        Self {
            cell,
            bit_pos: 0,
            ref_pos: 0,
        }
    }

    pub fn bits_left(&self) -> usize {
        self.cell.bit_len() - self.bit_pos
    }

    pub fn refs_left(&self) -> usize {
        self.cell.reference_count() - self.ref_pos
    }

    pub fn is_empty(&self) -> bool {
        self.bits_left() == 0 && self.refs_left() == 0
    }

    pub fn cell(&self) -> &'a Cell {
        self.cell
    }

    fn require(&self, bits: usize) -> CellResult<()> {
        if bits > self.bits_left() {
            return Err(CellError::Underflow {
                need: bits,
                have: self.bits_left(),
            });
        }
        Ok(())
    }

    pub fn load_bit(&mut self) -> CellResult<bool> {
        self.require(1)?;
        let bit = self.cell.data()[self.bit_pos / 8] >> (7 - self.bit_pos % 8) & 1 == 1;
        self.bit_pos += 1;
        Ok(bit)
    }

    pub fn load_bits(&mut self, count: usize) -> CellResult<Vec<bool>> {
        self.require(count)?;
        let mut bits = Vec::with_capacity(count);
        for _ in 0..count {
            bits.push(self.load_bit()?);
        }
        Ok(bits)
    }

    /// Reads `bits` bits as a big-endian unsigned integer.
    pub fn load_uint(&mut self, bits: usize) -> CellResult<u64> {
        if bits > 64 {
            return Err(CellError::UnsupportedWidth(bits));
        }
        self.require(bits)?;
        let mut value = 0u64;
        for _ in 0..bits {
            value = value << 1 | self.load_bit()? as u64;
        }
        Ok(value)
    }

    /// Reads `bits` bits as a two's complement signed integer.
    pub fn load_int(&mut self, bits: usize) -> CellResult<i64> {
        let raw = self.load_uint(bits)?;
        if bits == 0 || bits == 64 {
            return Ok(raw as i64);
        }
        // Sign-extend.
        let shift = 64 - bits;
        Ok((raw as i64) << shift >> shift)
    }

    pub fn load_u8(&mut self) -> CellResult<u8> {
        self.load_uint(8).map(|v| v as u8)
    }

    pub fn load_u16(&mut self) -> CellResult<u16> {
        self.load_uint(16).map(|v| v as u16)
    }

    pub fn load_u32(&mut self) -> CellResult<u32> {
        self.load_uint(32).map(|v| v as u32)
    }

    pub fn load_u64(&mut self) -> CellResult<u64> {
        self.load_uint(64)
    }

    pub fn load_bytes(&mut self, count: usize) -> CellResult<Vec<u8>> {
        self.require(count * 8)?;
        let mut out = Vec::with_capacity(count);
        for _ in 0..count {
            out.push(self.load_u8()?);
        }
        Ok(out)
    }

    /// Reads a 256-bit hash.
    pub fn load_hash(&mut self) -> CellResult<[u8; 32]> {
        self.require(256)?;
        let mut hash = [0u8; 32];
        for byte in hash.iter_mut() {
            *byte = self.load_u8()?;
        }
        Ok(hash)
    }

    /// Reads a `VarUInteger 16` amount.
    pub fn load_coins(&mut self) -> CellResult<u128> {
        let len = self.load_uint(4)? as usize;
        let mut value = 0u128;
        for _ in 0..len {
            value = value << 8 | self.load_u8()? as u128;
        }
        Ok(value)
    }

    pub fn load_ref(&mut self) -> CellResult<&'a Arc<Cell>> {
        let cell = self.cell.reference(self.ref_pos)?;
        self.ref_pos += 1;
        Ok(cell)
    }

    /// Reads a `Maybe ^Cell`.
    pub fn load_maybe_ref(&mut self) -> CellResult<Option<&'a Arc<Cell>>> {
        if self.load_bit()? {
            Ok(Some(self.load_ref()?))
        } else {
            Ok(None)
        }
    }

    /// Reads a `MsgAddress`, accepting `addr_none`, `addr_std` and
    /// `addr_var`. Anycast prefixes are skipped.
    pub fn load_address(&mut self) -> CellResult<Option<Address>> {
        match self.load_uint(2)? {
            0b00 => Ok(None),
            0b01 => {
                // addr_extern: len:(## 9) address:(bits len)
                let len = self.load_uint(9)? as usize;
                self.skip_bits(len)?;
                Ok(None)
            }
            0b10 => {
                self.skip_anycast()?;
                let workchain = self.load_int(8)? as i32;
                let hash = self.load_hash()?;
                Ok(Some(Address { workchain, hash }))
            }
            0b11 => {
                self.skip_anycast()?;
                let len = self.load_uint(9)? as usize;
                let workchain = self.load_int(32)? as i32;
                if len != 256 {
                    return Err(CellError::InvalidAddress(format!(
                        "addr_var with {len} address bits"
                    )));
                }
                let hash = self.load_hash()?;
                Ok(Some(Address { workchain, hash }))
            }
            _ => unreachable!(),
        }
    }

    fn skip_anycast(&mut self) -> CellResult<()> {
        if self.load_bit()? {
            let depth = self.load_uint(5)? as usize;
            self.skip_bits(depth)?;
        }
        Ok(())
    }

    pub fn skip_bits(&mut self, count: usize) -> CellResult<()> {
        self.require(count)?;
        self.bit_pos += count;
        Ok(())
    }

    pub fn skip_refs(&mut self, count: usize) -> CellResult<()> {
        if count > self.refs_left() {
            return Err(CellError::RefUnderflow);
        }
        self.ref_pos += count;
        Ok(())
    }
}
