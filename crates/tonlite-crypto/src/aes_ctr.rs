//! AES-256-CTR stream ciphers for the ADNL transports.
//!
//! Every ADNL session direction owns one stateful cipher; the key stream is
//! continuous across packets, so packets must be encrypted and decrypted in
//! wire order.

use aes::cipher::{KeyIvInit, StreamCipher};
use aes::Aes256;
use ctr::Ctr128BE;

use crate::sha256::sha256;

type Aes256Ctr = Ctr128BE<Aes256>;

/// A stateful AES-256-CTR cipher over a session direction.
pub struct AesCtrCipher {
    cipher: Aes256Ctr,
    key: [u8; 32],
    iv: [u8; 16],
}

impl AesCtrCipher {
    pub fn new(key: [u8; 32], iv: [u8; 16]) -> Self {
        Self {
            cipher: Aes256Ctr::new(&key.into(), &iv.into()),
            key,
            iv,
        }
    }

    /// Applies the key stream in place. Encryption and decryption are the
    /// same operation in CTR mode.
    pub fn apply_in_place(&mut self, data: &mut [u8]) {
        self.cipher.apply_keystream(data);
    }

    /// Applies the key stream to a copy of the input.
    pub fn apply(&mut self, data: &[u8]) -> Vec<u8> {
        let mut out = data.to_vec();
        self.cipher.apply_keystream(&mut out);
        out
    }

    /// Rewinds the cipher to its initial counter.
    pub fn reset(&mut self) {
        self.cipher = Aes256Ctr::new(&self.key.into(), &self.iv.into());
    }

    pub fn key(&self) -> &[u8; 32] {
        &self.key
    }

    pub fn iv(&self) -> &[u8; 16] {
        &self.iv
    }
}

impl std::fmt::Debug for AesCtrCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AesCtrCipher").finish_non_exhaustive()
    }
}

/// Derives the ADNL session cipher parameters from a DH shared secret and a
/// payload checksum:
///
/// ```text
/// key = shared[0..16] || checksum[16..32]
/// iv  = checksum[0..4] || shared[20..32]
/// ```
pub fn derive_session_params(shared: &[u8; 32], checksum: &[u8; 32]) -> ([u8; 32], [u8; 16]) {
    let mut key = [0u8; 32];
    key[..16].copy_from_slice(&shared[..16]);
    key[16..].copy_from_slice(&checksum[16..]);

    let mut iv = [0u8; 16];
    iv[..4].copy_from_slice(&checksum[..4]);
    iv[4..].copy_from_slice(&shared[20..]);

    (key, iv)
}

/// Builds the session cipher for a DH shared secret and checksum pair.
pub fn session_cipher(shared: &[u8; 32], checksum: &[u8; 32]) -> AesCtrCipher {
    let (key, iv) = derive_session_params(shared, checksum);
    AesCtrCipher::new(key, iv)
}

/// Builds the cipher used to decrypt a UDP packet addressed by a raw public
/// key, where the checksum is `sha256(plaintext)`.
pub fn packet_cipher(shared: &[u8; 32], plaintext_hash: &[u8; 32]) -> AesCtrCipher {
    session_cipher(shared, plaintext_hash)
}

/// One-shot AES-256-CTR helper.
pub fn aes_ctr_apply(key: &[u8; 32], iv: &[u8; 16], data: &[u8]) -> Vec<u8> {
    AesCtrCipher::new(*key, *iv).apply(data)
}

/// Verifies that a decrypted payload matches its declared checksum.
pub fn checksum_matches(payload: &[u8], checksum: &[u8; 32]) -> bool {
    sha256(payload) == *checksum
}
