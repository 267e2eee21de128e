//! Cell trees and the bag-of-cells codec.
//!
//! Everything a liteserver returns is a cell tree: at most 1023 data bits
//! and four references per cell, hashed bottom-up into a representation
//! hash that identifies the whole subtree. Exotic cells (pruned branches,
//! merkle proofs and updates, library references) carry extra hash levels
//! so that partial trees can still be checked against a full-tree hash.
//!
//! The crate also ships the slice/builder pair for reading and writing
//! cell payloads, the standard address forms, and the dictionary walkers
//! needed to pull accounts and shard descriptors out of proofs.

use thiserror::Error;

mod address;
mod boc;
mod builder;
mod cell;
pub mod dict;
mod level_mask;
mod slice;

pub use address::Address;
pub use boc::BagOfCells;
pub use builder::CellBuilder;
pub use cell::{Cell, HASH_BYTES};
pub use level_mask::{LevelMask, MAX_LEVEL};
pub use slice::CellSlice;

/// Maximum number of data bits in a single cell.
pub const MAX_CELL_BITS: usize = 1023;

/// Maximum number of references a cell can hold.
pub const MAX_CELL_REFS: usize = 4;

/// Magic of the generic `serialized_boc` framing.
pub const BOC_MAGIC: u32 = 0xb5ee9c72;

#[derive(Debug, Error)]
pub enum CellError {
    #[error("cell capacity exceeded: {bits} bits (max {MAX_CELL_BITS})")]
    Overflow { bits: usize },

    #[error("cell reference capacity exceeded")]
    RefOverflow,

    #[error("slice underflow: need {need} bits, {have} left")]
    Underflow { need: usize, have: usize },

    #[error("slice reference underflow")]
    RefUnderflow,

    #[error("unsupported integer width: {0} bits")]
    UnsupportedWidth(usize),

    #[error("malformed bag of cells: {0}")]
    InvalidBoc(String),

    #[error("bag of cells checksum mismatch: expected {expected:08x}, computed {actual:08x}")]
    ChecksumMismatch { expected: u32, actual: u32 },

    #[error("expected a single root cell, found {0}")]
    RootCount(usize),

    #[error("malformed exotic cell: {0}")]
    InvalidExoticCell(String),

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("malformed dictionary: {0}")]
    InvalidDict(String),
}

pub type CellResult<T> = Result<T, CellError>;

/// Cell kind. Exotic kinds are tagged by their first data byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellType {
    Ordinary,
    PrunedBranch,
    Library,
    MerkleProof,
    MerkleUpdate,
}

impl CellType {
    /// Resolves an exotic tag byte.
    pub fn from_exotic_tag(tag: u8) -> CellResult<Self> {
        match tag {
            1 => Ok(CellType::PrunedBranch),
            2 => Ok(CellType::Library),
            3 => Ok(CellType::MerkleProof),
            4 => Ok(CellType::MerkleUpdate),
            other => Err(CellError::InvalidExoticCell(format!(
                "unknown exotic tag {other}"
            ))),
        }
    }

    pub fn is_exotic(self) -> bool {
        self != CellType::Ordinary
    }
}
