//! TL wire codec.
//!
//! TL serializes integers little-endian with 4-byte alignment. A boxed
//! value is prefixed by its 32-bit constructor id, the CRC-32 of the
//! declaration text; `tonlite_crypto::tl_id` computes it, quoted in wire
//! byte order, so ids go on the wire big-endian while everything else is
//! little-endian. [`TlReader`] and [`TlWriter`] cover the primitives, and
//! [`schema`] layers a runtime registry on top for callers that work from
//! schema text instead of hand-written codecs.

use thiserror::Error;

mod reader;
pub mod schema;
mod writer;

pub use reader::TlReader;
pub use writer::TlWriter;

pub use tonlite_crypto::tl_id;

/// `boolTrue = Bool`
pub const TL_BOOL_TRUE: u32 = 0xb5757299;
/// `boolFalse = Bool`
pub const TL_BOOL_FALSE: u32 = 0x379779bc;

#[derive(Debug, Error)]
pub enum TlError {
    #[error("unexpected end of input: needed {needed} bytes, {available} available")]
    UnexpectedEof { needed: usize, available: usize },

    #[error("constructor {0:08x} is not a Bool")]
    InvalidBool(u32),

    #[error("unexpected constructor {0:08x}")]
    UnexpectedConstructor(u32),

    #[error("unsupported byte-string length {0}")]
    UnsupportedLength(usize),

    #[error("string is not valid utf-8")]
    InvalidUtf8,

    #[error("schema error: {0}")]
    Schema(String),
}

pub type TlResult<T> = Result<T, TlError>;
