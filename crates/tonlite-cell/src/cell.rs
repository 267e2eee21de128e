//! The cell itself and its multi-level representation hashes.
//!
//! Hashes are finalized eagerly when a cell is built, bottom-up: every
//! significant level gets its own hash over the level's descriptors, the
//! payload (the raw data for the first computed hash, the previous level's
//! hash after that) and the child depths and hashes one level up through
//! merkle cells. Pruned branches are the exception: all levels below their
//! own are read back from the stored hash table in the cell data.

use std::sync::Arc;

use tonlite_crypto::sha256;

use crate::{CellError, CellResult, CellType, LevelMask, MAX_CELL_BITS, MAX_CELL_REFS, MAX_LEVEL};

/// Representation hash size.
pub const HASH_BYTES: usize = 32;

/// An immutable cell: up to 1023 data bits and four child references.
#[derive(Debug, Clone)]
pub struct Cell {
    data: Vec<u8>,
    bit_len: usize,
    references: Vec<Arc<Cell>>,
    cell_type: CellType,
    level_mask: LevelMask,
    // Computed hashes and depths, one entry per significant level
    // (a single entry for pruned branches).
    hashes: Vec<[u8; HASH_BYTES]>,
    depths: Vec<u16>,
}

impl Cell {
    /// Finalizes a cell, computing its level mask, hashes and depths.
    pub(crate) fn finalize(
        data: Vec<u8>,
        bit_len: usize,
        references: Vec<Arc<Cell>>,
        cell_type: CellType,
    ) -> CellResult<Self> {
        if bit_len > MAX_CELL_BITS {
            return Err(CellError::Overflow { bits: bit_len });
        }
        if references.len() > MAX_CELL_REFS {
            return Err(CellError::RefOverflow);
        }

        let mut cell = Cell {
            data,
            bit_len,
            references,
            cell_type,
            level_mask: LevelMask::EMPTY,
            hashes: Vec::new(),
            depths: Vec::new(),
        };
        cell.level_mask = cell.compute_level_mask()?;
        cell.compute_hashes();
        Ok(cell)
    }

    pub fn empty() -> Self {
        // An empty ordinary cell cannot fail to finalize.
        match Self::finalize(Vec::new(), 0, Vec::new(), CellType::Ordinary) {
            Ok(cell) => cell,
            Err(_) => unreachable!(),
        }
    }

    fn compute_level_mask(&self) -> CellResult<LevelMask> {
        Ok(match self.cell_type {
            CellType::Ordinary => self
                .references
                .iter()
                .fold(LevelMask::EMPTY, |acc, r| acc.union(r.level_mask)),
            CellType::PrunedBranch => {
                // data = tag, mask, then the stored hash and depth tables
                let mask = LevelMask::new(*self.data.get(1).ok_or_else(|| {
                    CellError::InvalidExoticCell("pruned branch too short".into())
                })?);
                let stored = mask.mask().count_ones() as usize;
                if mask == LevelMask::EMPTY || self.data.len() < 2 + stored * (HASH_BYTES + 2) {
                    return Err(CellError::InvalidExoticCell(
                        "pruned branch hash table truncated".into(),
                    ));
                }
                mask
            }
            CellType::MerkleProof => match self.references.first() {
                Some(child) => child.level_mask.virtualize(),
                None => {
                    return Err(CellError::InvalidExoticCell(
                        "merkle proof without a child".into(),
                    ))
                }
            },
            CellType::MerkleUpdate => self
                .references
                .iter()
                .fold(LevelMask::EMPTY, |acc, r| acc.union(r.level_mask))
                .virtualize(),
            CellType::Library => LevelMask::EMPTY,
        })
    }

    fn compute_hashes(&mut self) {
        let is_merkle = matches!(
            self.cell_type,
            CellType::MerkleProof | CellType::MerkleUpdate
        );

        if self.cell_type == CellType::PrunedBranch {
            // Only the cell's own level is hashed; the rest is stored data.
            let level = self.level_mask.level();
            self.hashes.push(sha256(&self.repr_at_level(level, None)));
            self.depths.push(0);
            return;
        }

        for level in 0..=MAX_LEVEL {
            if !self.level_mask.is_significant(level) {
                continue;
            }
            let child_level = if is_merkle { level + 1 } else { level };

            let depth = self
                .references
                .iter()
                .map(|r| r.depth_at(child_level).saturating_add(1))
                .max()
                .unwrap_or(0);

            let payload = self.hashes.last().copied();
            let hash = sha256(&self.repr_at_level(level, payload));

            self.hashes.push(hash);
            self.depths.push(depth);
        }
    }

    /// Builds the representation that gets hashed at `level`. When
    /// `prev_hash` is set it replaces the raw payload.
    fn repr_at_level(&self, level: u8, prev_hash: Option<[u8; HASH_BYTES]>) -> Vec<u8> {
        let mut repr =
            Vec::with_capacity(2 + HASH_BYTES.max(self.data.len() + 1) + self.references.len() * 34);

        let (d1, d2) = self.descriptors_at_level(level);
        repr.push(d1);
        repr.push(d2);

        match prev_hash {
            Some(hash) => repr.extend_from_slice(&hash),
            None => repr.extend_from_slice(&self.data_with_tag()),
        }

        let is_merkle = matches!(
            self.cell_type,
            CellType::MerkleProof | CellType::MerkleUpdate
        );
        let child_level = if is_merkle { level + 1 } else { level };

        for child in &self.references {
            repr.extend_from_slice(&child.depth_at(child_level).to_be_bytes());
        }
        for child in &self.references {
            repr.extend_from_slice(&child.hash_at(child_level));
        }

        repr
    }

    /// The representation hash at level 0, identifying the subtree.
    ///
    /// For a pruned branch this is the hash of the subtree the branch
    /// stands in for, not of the branch cell itself; identity checks
    /// use [`own_hash`](Self::own_hash).
    pub fn repr_hash(&self) -> [u8; HASH_BYTES] {
        self.hash_at(0)
    }

    /// The hash at the cell's own level, unique per cell. Equal to
    /// [`repr_hash`](Self::repr_hash) for everything but pruned
    /// branches and their ancestors.
    pub fn own_hash(&self) -> [u8; HASH_BYTES] {
        self.hash_at(MAX_LEVEL)
    }

    /// The hash visible at `level`.
    ///
    /// For a pruned branch every level below its own resolves to a stored
    /// hash; querying an insignificant level yields the nearest significant
    /// level below it.
    pub fn hash_at(&self, level: u8) -> [u8; HASH_BYTES] {
        let level = level.min(MAX_LEVEL);
        if self.cell_type == CellType::PrunedBranch {
            if self.level_mask.apply(level) == self.level_mask {
                return self.hashes[0];
            }
            return self.stored_hash(self.level_mask.hash_index(level));
        }
        let index = self.level_mask.hash_index(level);
        self.hashes[index.min(self.hashes.len() - 1)]
    }

    /// The subtree depth visible at `level`.
    pub fn depth_at(&self, level: u8) -> u16 {
        let level = level.min(MAX_LEVEL);
        if self.cell_type == CellType::PrunedBranch {
            if self.level_mask.apply(level) == self.level_mask {
                return self.depths[0];
            }
            return self.stored_depth(self.level_mask.hash_index(level));
        }
        let index = self.level_mask.hash_index(level);
        self.depths[index.min(self.depths.len() - 1)]
    }

    fn stored_hash(&self, index: usize) -> [u8; HASH_BYTES] {
        let offset = 2 + index * HASH_BYTES;
        let mut hash = [0u8; HASH_BYTES];
        hash.copy_from_slice(&self.data[offset..offset + HASH_BYTES]);
        hash
    }

    fn stored_depth(&self, index: usize) -> u16 {
        let stored = self.level_mask.mask().count_ones() as usize;
        let offset = 2 + stored * HASH_BYTES + index * 2;
        u16::from_be_bytes([self.data[offset], self.data[offset + 1]])
    }

    /// Refs/exotic/level descriptor and the data length descriptor.
    pub fn descriptors(&self) -> (u8, u8) {
        self.descriptors_at_level(0)
    }

    fn descriptors_at_level(&self, level: u8) -> (u8, u8) {
        let d1 = self.references.len() as u8
            + if self.cell_type.is_exotic() { 8 } else { 0 }
            + (self.level_mask.apply(level).mask() << 5);
        let d2 = (self.bit_len / 8 + self.bit_len.div_ceil(8)) as u8;
        (d1, d2)
    }

    /// Data padded to a byte boundary with the completion tag: a single
    /// one bit after the payload, then zeroes.
    pub fn data_with_tag(&self) -> Vec<u8> {
        let mut out = self.data[..self.bit_len.div_ceil(8)].to_vec();
        if self.bit_len % 8 != 0 {
            if let Some(last) = out.last_mut() {
                *last |= 1 << (7 - self.bit_len % 8);
            }
        }
        out
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn bit_len(&self) -> usize {
        self.bit_len
    }

    pub fn references(&self) -> &[Arc<Cell>] {
        &self.references
    }

    pub fn reference(&self, index: usize) -> CellResult<&Arc<Cell>> {
        self.references.get(index).ok_or(CellError::RefUnderflow)
    }

    pub fn reference_count(&self) -> usize {
        self.references.len()
    }

    pub fn cell_type(&self) -> CellType {
        self.cell_type
    }

    pub fn is_exotic(&self) -> bool {
        self.cell_type.is_exotic()
    }

    pub fn level_mask(&self) -> LevelMask {
        self.level_mask
    }

    pub fn level(&self) -> u8 {
        self.level_mask.level()
    }

    pub fn depth(&self) -> u16 {
        self.depth_at(0)
    }
}

impl PartialEq for Cell {
    fn eq(&self, other: &Self) -> bool {
        self.own_hash() == other.own_hash()
    }
}

impl Eq for Cell {}

impl std::hash::Hash for Cell {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        state.write(&self.own_hash());
    }
}
