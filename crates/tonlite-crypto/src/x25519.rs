//! X25519 Diffie-Hellman, including the Ed25519-to-X25519 bridge.
//!
//! ADNL identities are Ed25519 keys, but session secrets are agreed over
//! Curve25519 in its Montgomery form. The initiator converts its Ed25519
//! private key into an X25519 scalar (SHA-512 of the seed, clamped) and
//! converts the peer's Ed25519 public key via the birational map before
//! the scalar multiplication.

use curve25519_dalek::edwards::CompressedEdwardsY;
use rand::rngs::OsRng;
use sha2::{Digest, Sha512};
use thiserror::Error;
use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::{Zeroize, ZeroizeOnDrop};

#[derive(Debug, Error)]
pub enum X25519Error {
    #[error("Public key is not a valid curve point")]
    InvalidPublicKey,
}

/// An X25519 keypair used for channel key agreement.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct X25519Keypair {
    private: [u8; 32],
    #[zeroize(skip)]
    public: [u8; 32],
}

impl X25519Keypair {
    pub fn generate() -> Self {
        let secret = StaticSecret::random_from_rng(OsRng);
        let public = PublicKey::from(&secret);
        Self {
            private: secret.to_bytes(),
            public: public.to_bytes(),
        }
    }

    pub fn from_private_key(private: [u8; 32]) -> Self {
        let secret = StaticSecret::from(private);
        let public = PublicKey::from(&secret);
        Self {
            private: secret.to_bytes(),
            public: public.to_bytes(),
        }
    }

    /// Computes the shared secret with a raw X25519 public key.
    pub fn ecdh(&self, their_public: &[u8; 32]) -> [u8; 32] {
        let secret = StaticSecret::from(self.private);
        secret.diffie_hellman(&PublicKey::from(*their_public)).to_bytes()
    }

    pub fn public_key(&self) -> &[u8; 32] {
        &self.public
    }
}

impl std::fmt::Debug for X25519Keypair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("X25519Keypair")
            .field("public", &hex::encode(self.public))
            .finish_non_exhaustive()
    }
}

/// Converts an Ed25519 private key (seed) into an X25519 scalar.
pub fn ed25519_private_to_x25519(ed_private: &[u8; 32]) -> [u8; 32] {
    let digest = Sha512::digest(ed_private);
    let mut scalar = [0u8; 32];
    scalar.copy_from_slice(&digest[..32]);
    scalar[0] &= 248;
    scalar[31] &= 127;
    scalar[31] |= 64;
    scalar
}

/// Converts an Ed25519 public key (compressed Edwards point) into the
/// corresponding X25519 (Montgomery) public key.
pub fn ed25519_public_to_x25519(ed_public: &[u8; 32]) -> Result<[u8; 32], X25519Error> {
    let point = CompressedEdwardsY(*ed_public)
        .decompress()
        .ok_or(X25519Error::InvalidPublicKey)?;
    Ok(point.to_montgomery().to_bytes())
}

/// Computes the ADNL shared secret between a local Ed25519 private key and
/// a peer's Ed25519 public key.
pub fn ecdh_ed25519(
    local_ed_private: &[u8; 32],
    peer_ed_public: &[u8; 32],
) -> Result<[u8; 32], X25519Error> {
    let scalar = ed25519_private_to_x25519(local_ed_private);
    let mont = ed25519_public_to_x25519(peer_ed_public)?;
    let secret = StaticSecret::from(scalar);
    Ok(secret.diffie_hellman(&PublicKey::from(mont)).to_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ed25519::Ed25519Keypair;

    #[test]
    fn x25519_shared_secret_agrees() {
        let a = X25519Keypair::generate();
        let b = X25519Keypair::generate();
        assert_eq!(a.ecdh(b.public_key()), b.ecdh(a.public_key()));
    }

    #[test]
    fn ed25519_bridge_agrees() {
        // Both sides hold Ed25519 identities; the derived secret must match.
        let a = Ed25519Keypair::generate();
        let b = Ed25519Keypair::generate();
        let ab = ecdh_ed25519(a.private_key(), b.public_key()).unwrap();
        let ba = ecdh_ed25519(b.private_key(), a.public_key()).unwrap();
        assert_eq!(ab, ba);
    }

    #[test]
    fn invalid_point_rejected() {
        // y = 2: (y^2 - 1)/(d*y^2 + 1) is not a square mod 2^255 - 19,
        // so no x coordinate exists and decompression must fail.
        let mut bad = [0u8; 32];
        bad[0] = 2;
        assert!(ed25519_public_to_x25519(&bad).is_err());
    }
}
