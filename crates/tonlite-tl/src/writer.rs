//! Primitive TL encoding.

use crate::{TL_BOOL_FALSE, TL_BOOL_TRUE};

/// Append-only TL encoder. Everything is little-endian.
#[derive(Debug, Clone, Default)]
pub struct TlWriter {
    buf: Vec<u8>,
}

impl TlWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    pub fn write_i32(&mut self, value: i32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_u32(&mut self, value: u32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_i64(&mut self, value: i64) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_u64(&mut self, value: u64) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_int128(&mut self, value: &[u8; 16]) {
        self.buf.extend_from_slice(value);
    }

    pub fn write_int256(&mut self, value: &[u8; 32]) {
        self.buf.extend_from_slice(value);
    }

    /// Boxed `Bool`.
    pub fn write_bool(&mut self, value: bool) {
        self.write_id(if value { TL_BOOL_TRUE } else { TL_BOOL_FALSE });
    }

    /// A constructor id. Ids are quoted in wire byte order and therefore
    /// written big-endian, unlike every other integer.
    pub fn write_id(&mut self, id: u32) {
        self.buf.extend_from_slice(&id.to_be_bytes());
    }

    /// TL `bytes` with the length header and 4-byte padding.
    pub fn write_bytes(&mut self, data: &[u8]) {
        let header = if data.len() < 0xfe {
            self.buf.push(data.len() as u8);
            1
        } else {
            // Lengths at or beyond 2^24 never occur on this protocol.
            debug_assert!(data.len() < 1 << 24);
            self.buf.push(0xfe);
            self.buf
                .extend_from_slice(&(data.len() as u32).to_le_bytes()[..3]);
            4
        };
        self.buf.extend_from_slice(data);
        let pad = (4 - (header + data.len()) % 4) % 4;
        self.buf.extend_from_slice(&[0u8; 3][..pad]);
    }

    pub fn write_string(&mut self, value: &str) {
        self.write_bytes(value.as_bytes());
    }

    pub fn write_raw(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Bare `vector`: a u32 count, then the items.
    pub fn write_vector<T>(&mut self, items: &[T], mut write_item: impl FnMut(&mut Self, &T)) {
        self.write_u32(items.len() as u32);
        for item in items {
            write_item(self, item);
        }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}
