//! Cryptographic primitives used across the tonlite stack.
//!
//! Everything the transport and proof layers need lives here:
//!
//! - **SHA-256** for packet checksums, cell hashes and key ids
//! - **Ed25519** for packet/node signatures and block signatures
//! - **X25519** Diffie-Hellman for ADNL session and channel keys
//! - **AES-256-CTR** stream ciphers for the encrypted transports
//! - **CRC-16/XMODEM** (address checksums, get-method selectors),
//!   **CRC-32** (TL constructor ids) and **CRC-32C** (BOC checksums)

pub mod aes_ctr;
pub mod checksum;
pub mod ed25519;
pub mod keys;
pub mod sha256;
pub mod x25519;

pub use aes_ctr::AesCtrCipher;
pub use checksum::{crc16, crc32, crc32c, method_id, tl_id};
pub use ed25519::{verify_signature, Ed25519Keypair};
pub use keys::{key_id_aes, key_id_ed25519, AES_KEY_MAGIC, ED25519_KEY_MAGIC};
pub use sha256::{sha256, sha256_multi};
pub use x25519::{ecdh_ed25519, X25519Keypair};

use rand::RngCore;

/// Fills a buffer with cryptographically secure random bytes.
pub fn fill_random(dest: &mut [u8]) {
    rand::rngs::OsRng.fill_bytes(dest);
}

/// Returns 32 random bytes (query ids, nonces).
pub fn random_bytes_32() -> [u8; 32] {
    let mut out = [0u8; 32];
    fill_random(&mut out);
    out
}
