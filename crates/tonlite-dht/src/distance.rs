//! XOR metric over 256-bit key ids.

use std::cmp::Ordering;

/// A 256-bit XOR distance, compared big-endian so smaller means closer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Distance([u8; 32]);

impl Distance {
    pub fn zero() -> Self {
        Self([0u8; 32])
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }

    /// Leading zero bits. 256 for identical ids.
    pub fn leading_zeroes(&self) -> usize {
        for (i, &byte) in self.0.iter().enumerate() {
            if byte != 0 {
                return i * 8 + byte.leading_zeros() as usize;
            }
        }
        256
    }
}

pub fn xor_distance(a: &[u8; 32], b: &[u8; 32]) -> Distance {
    let mut out = [0u8; 32];
    for i in 0..32 {
        out[i] = a[i] ^ b[i];
    }
    Distance(out)
}

/// Orders two ids by their distance to a target.
pub fn compare_to_target(target: &[u8; 32], a: &[u8; 32], b: &[u8; 32]) -> Ordering {
    xor_distance(target, a).cmp(&xor_distance(target, b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_ids_are_zero_distance() {
        let d = xor_distance(&[0x5au8; 32], &[0x5au8; 32]);
        assert!(d.is_zero());
        assert_eq!(d.leading_zeroes(), 256);
    }

    #[test]
    fn ordering_is_big_endian() {
        let target = [0u8; 32];
        let mut near = [0u8; 32];
        near[31] = 1;
        let mut far = [0u8; 32];
        far[0] = 1;
        assert!(xor_distance(&target, &near) < xor_distance(&target, &far));
        assert_eq!(
            compare_to_target(&target, &near, &far),
            Ordering::Less
        );
    }

    #[test]
    fn symmetric() {
        let a = [0x13u8; 32];
        let b = [0xc8u8; 32];
        assert_eq!(xor_distance(&a, &b), xor_distance(&b, &a));
    }

    #[test]
    fn leading_zeroes_counts_bits() {
        let mut d = [0u8; 32];
        d[2] = 0x10;
        assert_eq!(xor_distance(&[0u8; 32], &d).leading_zeroes(), 19);
    }
}
