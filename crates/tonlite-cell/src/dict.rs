//! Hashmap (dictionary) and binary-tree walkers.
//!
//! These cover the read side only: looking up a key, enumerating entries,
//! and walking `BinTree` leaves. Labels come in the three standard
//! encodings (`hml_short`, `hml_long`, `hml_same`).
//!
//! Augmented hashmaps interleave an extra payload whose layout the walker
//! cannot know, so lookups take a caller-supplied `skip_extra` that
//! advances the slice past it.

use crate::{Cell, CellError, CellResult, CellSlice};

/// Bits needed to encode a length in `0..=max`.
fn len_bits(max: usize) -> usize {
    (usize::BITS - max.leading_zeros()) as usize
}

/// Reads an edge label. `max_len` is the number of key bits left below
/// this node.
pub fn read_label(slice: &mut CellSlice<'_>, max_len: usize) -> CellResult<Vec<bool>> {
    if !slice.load_bit()? {
        // hml_short$0 len:(Unary ~n) s:(n * Bit)
        let mut len = 0;
        while slice.load_bit()? {
            len += 1;
            if len > max_len {
                return Err(CellError::InvalidDict("unary label length overflow".into()));
            }
        }
        return slice.load_bits(len);
    }
    if !slice.load_bit()? {
        // hml_long$10 n:(#<= m) s:(n * Bit)
        let len = slice.load_uint(len_bits(max_len))? as usize;
        if len > max_len {
            return Err(CellError::InvalidDict("label longer than key".into()));
        }
        return slice.load_bits(len);
    }
    // hml_same$11 v:Bit n:(#<= m)
    let bit = slice.load_bit()?;
    let len = slice.load_uint(len_bits(max_len))? as usize;
    if len > max_len {
        return Err(CellError::InvalidDict("label longer than key".into()));
    }
    Ok(vec![bit; len])
}

/// Looks up `key` in a `Hashmap` rooted at `root`. Returns the slice
/// positioned at the start of the value.
pub fn hashmap_get<'a>(root: &'a Cell, key: &[bool]) -> CellResult<Option<CellSlice<'a>>> {
    let mut node = root;
    let mut rest = key;
    loop {
        let mut slice = CellSlice::new(node);
        let label = read_label(&mut slice, rest.len())?;
        if !rest.starts_with(&label) {
            return Ok(None);
        }
        rest = &rest[label.len()..];
        let Some((&branch, tail)) = rest.split_first() else {
            return Ok(Some(slice));
        };
        rest = tail;
        node = node.reference(branch as usize)?;
    }
}

/// Looks up `key` in a `HashmapAug`. On the matching leaf, `skip_extra`
/// is invoked to step over the augmentation before the value.
pub fn hashmap_aug_get<'a>(
    root: &'a Cell,
    key: &[bool],
    skip_extra: &dyn Fn(&mut CellSlice<'a>) -> CellResult<()>,
) -> CellResult<Option<CellSlice<'a>>> {
    let mut node = root;
    let mut rest = key;
    loop {
        let mut slice = CellSlice::new(node);
        let label = read_label(&mut slice, rest.len())?;
        if !rest.starts_with(&label) {
            return Ok(None);
        }
        rest = &rest[label.len()..];
        let Some((&branch, tail)) = rest.split_first() else {
            skip_extra(&mut slice)?;
            return Ok(Some(slice));
        };
        rest = tail;
        node = node.reference(branch as usize)?;
    }
}

/// Enumerates every `(key, value)` pair of a `Hashmap` with `key_len`-bit
/// keys, in key order.
pub fn hashmap_entries<'a>(
    root: &'a Cell,
    key_len: usize,
) -> CellResult<Vec<(Vec<bool>, CellSlice<'a>)>> {
    let mut entries = Vec::new();
    walk_hashmap(root, key_len, Vec::new(), &mut entries)?;
    Ok(entries)
}

fn walk_hashmap<'a>(
    node: &'a Cell,
    bits_left: usize,
    prefix: Vec<bool>,
    entries: &mut Vec<(Vec<bool>, CellSlice<'a>)>,
) -> CellResult<()> {
    let mut slice = CellSlice::new(node);
    let label = read_label(&mut slice, bits_left)?;
    let mut key = prefix;
    key.extend_from_slice(&label);

    let remaining = bits_left - label.len();
    if remaining == 0 {
        entries.push((key, slice));
        return Ok(());
    }

    for branch in 0..2 {
        let mut child_key = key.clone();
        child_key.push(branch == 1);
        walk_hashmap(node.reference(branch)?, remaining - 1, child_key, entries)?;
    }
    Ok(())
}

/// Enumerates the leaves of a `BinTree`, left to right, each with the
/// branch prefix that leads to it.
pub fn bintree_leaves(root: &Cell) -> CellResult<Vec<(Vec<bool>, CellSlice<'_>)>> {
    let mut leaves = Vec::new();
    walk_bintree(root, Vec::new(), &mut leaves)?;
    Ok(leaves)
}

fn walk_bintree<'a>(
    node: &'a Cell,
    prefix: Vec<bool>,
    leaves: &mut Vec<(Vec<bool>, CellSlice<'a>)>,
) -> CellResult<()> {
    let mut slice = CellSlice::new(node);
    if !slice.load_bit()? {
        // bt_leaf$0
        leaves.push((prefix, slice));
        return Ok(());
    }
    for branch in 0..2 {
        let mut child_prefix = prefix.clone();
        child_prefix.push(branch == 1);
        walk_bintree(node.reference(branch)?, child_prefix, leaves)?;
    }
    Ok(())
}

/// Expands the first `len` bits of `bytes` into a key.
pub fn key_bits(bytes: &[u8], len: usize) -> Vec<bool> {
    (0..len)
        .map(|i| bytes[i / 8] >> (7 - i % 8) & 1 == 1)
        .collect()
}

/// Packs a u64 into a `len`-bit key, big-endian.
pub fn key_bits_from_u64(value: u64, len: usize) -> Vec<bool> {
    (0..len).rev().map(|i| value >> i & 1 == 1).collect()
}
