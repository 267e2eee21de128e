//! Hash level masks.
//!
//! A cell may carry up to four hashes (levels 0..=3). The mask records
//! which non-zero levels are significant: bit `n-1` set means level `n`
//! has its own hash. Level 0 is always present.

/// Highest hash level.
pub const MAX_LEVEL: u8 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LevelMask(u8);

impl LevelMask {
    pub const EMPTY: LevelMask = LevelMask(0);

    pub fn new(mask: u8) -> Self {
        Self(mask & 0b111)
    }

    pub fn mask(self) -> u8 {
        self.0
    }

    /// Highest significant level.
    pub fn level(self) -> u8 {
        (8 - self.0.leading_zeros()) as u8
    }

    /// Number of hashes stored for this mask.
    pub fn hash_count(self) -> usize {
        self.0.count_ones() as usize + 1
    }

    /// Index of the hash that answers a query at `level`.
    pub fn hash_index(self, level: u8) -> usize {
        (self.0 & ((1u16 << level) - 1) as u8).count_ones() as usize
    }

    /// Keeps only the levels below or at `level`.
    pub fn apply(self, level: u8) -> Self {
        Self(self.0 & ((1u16 << level) - 1) as u8)
    }

    /// Mask of a parent ordinary cell.
    pub fn union(self, other: LevelMask) -> Self {
        Self(self.0 | other.0)
    }

    /// Mask seen through a merkle cell: every level shifts down by one.
    pub fn virtualize(self) -> Self {
        Self(self.0 >> 1)
    }

    pub fn is_significant(self, level: u8) -> bool {
        level == 0 || self.0 >> (level - 1) & 1 != 0
    }
}

impl From<u8> for LevelMask {
    fn from(mask: u8) -> Self {
        Self::new(mask)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_is_highest_set_bit() {
        assert_eq!(LevelMask::new(0b000).level(), 0);
        assert_eq!(LevelMask::new(0b001).level(), 1);
        assert_eq!(LevelMask::new(0b011).level(), 2);
        assert_eq!(LevelMask::new(0b100).level(), 3);
    }

    #[test]
    fn hash_count_and_index() {
        let mask = LevelMask::new(0b101);
        assert_eq!(mask.hash_count(), 3);
        assert_eq!(mask.hash_index(0), 0);
        assert_eq!(mask.hash_index(1), 1);
        assert_eq!(mask.hash_index(2), 1);
        assert_eq!(mask.hash_index(3), 2);
    }

    #[test]
    fn apply_truncates() {
        let mask = LevelMask::new(0b111);
        assert_eq!(mask.apply(0).mask(), 0b000);
        assert_eq!(mask.apply(2).mask(), 0b011);
        assert_eq!(mask.apply(3).mask(), 0b111);
    }

    #[test]
    fn virtualize_shifts_down() {
        assert_eq!(LevelMask::new(0b110).virtualize().mask(), 0b011);
        assert_eq!(LevelMask::new(0b001).virtualize().mask(), 0b000);
    }

    #[test]
    fn significance() {
        let mask = LevelMask::new(0b010);
        assert!(mask.is_significant(0));
        assert!(!mask.is_significant(1));
        assert!(mask.is_significant(2));
        assert!(!mask.is_significant(3));
    }
}
