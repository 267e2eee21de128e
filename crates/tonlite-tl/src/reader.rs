//! Primitive TL decoding.

use crate::{TlError, TlResult, TL_BOOL_FALSE, TL_BOOL_TRUE};

/// A cursor over TL-encoded bytes. Everything is little-endian.
#[derive(Debug, Clone)]
pub struct TlReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> TlReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// The unread tail.
    pub fn rest(&self) -> &'a [u8] {
        &self.data[self.pos..]
    }

    pub fn read_raw(&mut self, len: usize) -> TlResult<&'a [u8]> {
        if len > self.remaining() {
            return Err(TlError::UnexpectedEof {
                needed: len,
                available: self.remaining(),
            });
        }
        let slice = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    pub fn skip(&mut self, len: usize) -> TlResult<()> {
        self.read_raw(len).map(|_| ())
    }

    fn read_array<const N: usize>(&mut self) -> TlResult<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_raw(N)?);
        Ok(out)
    }

    pub fn read_i32(&mut self) -> TlResult<i32> {
        Ok(i32::from_le_bytes(self.read_array()?))
    }

    pub fn read_u32(&mut self) -> TlResult<u32> {
        Ok(u32::from_le_bytes(self.read_array()?))
    }

    pub fn read_i64(&mut self) -> TlResult<i64> {
        Ok(i64::from_le_bytes(self.read_array()?))
    }

    pub fn read_u64(&mut self) -> TlResult<u64> {
        Ok(u64::from_le_bytes(self.read_array()?))
    }

    /// TL `int128`, returned as raw bytes in wire order.
    pub fn read_int128(&mut self) -> TlResult<[u8; 16]> {
        self.read_array()
    }

    /// TL `int256`, returned as raw bytes in wire order.
    pub fn read_int256(&mut self) -> TlResult<[u8; 32]> {
        self.read_array()
    }

    /// Boxed `Bool`.
    pub fn read_bool(&mut self) -> TlResult<bool> {
        match self.read_id()? {
            TL_BOOL_TRUE => Ok(true),
            TL_BOOL_FALSE => Ok(false),
            other => Err(TlError::InvalidBool(other)),
        }
    }

    /// A constructor id. Ids are quoted in wire byte order, so they read
    /// big-endian unlike every other integer.
    pub fn read_id(&mut self) -> TlResult<u32> {
        Ok(u32::from_be_bytes(self.read_array()?))
    }

    /// The next constructor id, without consuming it.
    pub fn peek_id(&self) -> TlResult<u32> {
        if self.remaining() < 4 {
            return Err(TlError::UnexpectedEof {
                needed: 4,
                available: self.remaining(),
            });
        }
        Ok(u32::from_be_bytes([
            self.data[self.pos],
            self.data[self.pos + 1],
            self.data[self.pos + 2],
            self.data[self.pos + 3],
        ]))
    }

    /// TL `bytes`: a one-byte length (or 0xfe plus three length bytes for
    /// longer strings), the payload, then zero padding to a 4-byte
    /// boundary.
    pub fn read_bytes(&mut self) -> TlResult<Vec<u8>> {
        let first = self.read_raw(1)?[0];
        let (len, header) = match first {
            0xff => return Err(TlError::UnsupportedLength(0xff)),
            0xfe => {
                let b = self.read_raw(3)?;
                (u32::from_le_bytes([b[0], b[1], b[2], 0]) as usize, 4)
            }
            short => (short as usize, 1),
        };
        let payload = self.read_raw(len)?.to_vec();
        self.skip((4 - (header + len) % 4) % 4)?;
        Ok(payload)
    }

    pub fn read_string(&mut self) -> TlResult<String> {
        String::from_utf8(self.read_bytes()?).map_err(|_| TlError::InvalidUtf8)
    }

    /// Bare `vector`: a u32 count, then the items.
    pub fn read_vector<T>(
        &mut self,
        mut read_item: impl FnMut(&mut Self) -> TlResult<T>,
    ) -> TlResult<Vec<T>> {
        let count = self.read_u32()? as usize;
        let mut items = Vec::with_capacity(count.min(1024));
        for _ in 0..count {
            items.push(read_item(self)?);
        }
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn little_endian_ints() {
        let mut reader = TlReader::new(&[0x78, 0x56, 0x34, 0x12, 0xff, 0xff, 0xff, 0xff]);
        assert_eq!(reader.read_u32().unwrap(), 0x1234_5678);
        assert_eq!(reader.read_i32().unwrap(), -1);
        assert!(reader.is_empty());
    }

    #[test]
    fn bytes_short_and_padded() {
        let mut reader = TlReader::new(&[3, b'a', b'b', b'c']);
        assert_eq!(reader.read_bytes().unwrap(), b"abc");
        assert!(reader.is_empty());

        let mut reader = TlReader::new(&[1, b'x', 0, 0]);
        assert_eq!(reader.read_bytes().unwrap(), b"x");
        assert!(reader.is_empty());
    }

    #[test]
    fn bytes_medium_form() {
        // 0xfe marker, 254 little-endian in 3 bytes, payload, pad to 4.
        let mut wire = vec![0xfe, 254, 0, 0];
        wire.extend_from_slice(&[0x7u8; 254]);
        wire.extend_from_slice(&[0, 0]);
        let mut reader = TlReader::new(&wire);
        assert_eq!(reader.read_bytes().unwrap(), vec![0x7u8; 254]);
        assert!(reader.is_empty());
    }

    #[test]
    fn bool_constructors() {
        // boolTrue appears on the wire as b5 75 72 99.
        let mut wire = TL_BOOL_TRUE.to_be_bytes().to_vec();
        wire.extend_from_slice(&TL_BOOL_FALSE.to_be_bytes());
        let mut reader = TlReader::new(&wire);
        assert!(reader.read_bool().unwrap());
        assert!(!reader.read_bool().unwrap());

        let mut reader = TlReader::new(&[0, 0, 0, 0]);
        assert!(matches!(reader.read_bool(), Err(TlError::InvalidBool(0))));
    }

    #[test]
    fn vector_of_ints() {
        let mut wire = 2u32.to_le_bytes().to_vec();
        wire.extend_from_slice(&7i32.to_le_bytes());
        wire.extend_from_slice(&9i32.to_le_bytes());
        let mut reader = TlReader::new(&wire);
        assert_eq!(reader.read_vector(|r| r.read_i32()).unwrap(), vec![7, 9]);
    }

    #[test]
    fn eof_reported() {
        let mut reader = TlReader::new(&[1, 2]);
        assert!(matches!(
            reader.read_u32(),
            Err(TlError::UnexpectedEof {
                needed: 4,
                available: 2
            })
        ));
    }
}
