//! Key identifiers.
//!
//! Peers and channels are addressed by a short id: the SHA-256 of the key's
//! boxed TL representation, i.e. `sha256(magic || key_bytes)` where the
//! magic is the 4-byte TL constructor id of the key type in wire order.

use crate::sha256::sha256_multi;

/// Wire-order TL magic of `pub.ed25519 key:int256 = PublicKey`.
pub const ED25519_KEY_MAGIC: [u8; 4] = [0xc6, 0xb4, 0x13, 0x48];

/// Wire-order TL magic of `pub.aes key:int256 = PublicKey`.
pub const AES_KEY_MAGIC: [u8; 4] = [0xd4, 0xad, 0xbc, 0x2d];

/// Computes the key id of an Ed25519 public key.
pub fn key_id_ed25519(public_key: &[u8; 32]) -> [u8; 32] {
    sha256_multi(&[&ED25519_KEY_MAGIC, public_key])
}

/// Computes the key id of a symmetric (channel) key.
pub fn key_id_aes(key: &[u8; 32]) -> [u8; 32] {
    sha256_multi(&[&AES_KEY_MAGIC, key])
}
