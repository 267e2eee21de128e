//! Ed25519 signing and verification.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

#[derive(Debug, Error)]
pub enum Ed25519Error {
    #[error("Invalid public key")]
    InvalidPublicKey,

    #[error("Invalid signature length: {0} (expected 64)")]
    InvalidSignatureLength(usize),

    #[error("Signature verification failed")]
    VerificationFailed,
}

/// An Ed25519 keypair.
///
/// The private half is zeroized on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct Ed25519Keypair {
    private: [u8; 32],
    #[zeroize(skip)]
    public: [u8; 32],
}

impl Ed25519Keypair {
    /// Generates a fresh keypair from the OS entropy source.
    pub fn generate() -> Self {
        let signing = SigningKey::generate(&mut OsRng);
        Self {
            private: signing.to_bytes(),
            public: signing.verifying_key().to_bytes(),
        }
    }

    /// Builds a keypair from a 32-byte private key seed.
    pub fn from_private_key(private: [u8; 32]) -> Self {
        let signing = SigningKey::from_bytes(&private);
        Self {
            private,
            public: signing.verifying_key().to_bytes(),
        }
    }

    /// Signs a message, returning the 64-byte signature.
    pub fn sign(&self, message: &[u8]) -> [u8; 64] {
        let signing = SigningKey::from_bytes(&self.private);
        signing.sign(message).to_bytes()
    }

    pub fn public_key(&self) -> &[u8; 32] {
        &self.public
    }

    pub fn private_key(&self) -> &[u8; 32] {
        &self.private
    }
}

impl std::fmt::Debug for Ed25519Keypair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ed25519Keypair")
            .field("public", &hex::encode(self.public))
            .finish_non_exhaustive()
    }
}

/// Verifies an Ed25519 signature against a raw public key.
pub fn verify_signature(
    public_key: &[u8; 32],
    message: &[u8],
    signature: &[u8],
) -> Result<(), Ed25519Error> {
    if signature.len() != 64 {
        return Err(Ed25519Error::InvalidSignatureLength(signature.len()));
    }
    let verifying =
        VerifyingKey::from_bytes(public_key).map_err(|_| Ed25519Error::InvalidPublicKey)?;
    let mut sig = [0u8; 64];
    sig.copy_from_slice(signature);
    verifying
        .verify(message, &Signature::from_bytes(&sig))
        .map_err(|_| Ed25519Error::VerificationFailed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_verify_roundtrip() {
        let keypair = Ed25519Keypair::generate();
        let msg = b"tonlite signature test";
        let sig = keypair.sign(msg);
        verify_signature(keypair.public_key(), msg, &sig).unwrap();
    }

    #[test]
    fn tampered_message_rejected() {
        let keypair = Ed25519Keypair::generate();
        let sig = keypair.sign(b"original");
        assert!(verify_signature(keypair.public_key(), b"tampered", &sig).is_err());
    }

    #[test]
    fn deterministic_from_seed() {
        let a = Ed25519Keypair::from_private_key([3u8; 32]);
        let b = Ed25519Keypair::from_private_key([3u8; 32]);
        assert_eq!(a.public_key(), b.public_key());
        assert_eq!(a.sign(b"x"), b.sign(b"x"));
    }

    #[test]
    fn bad_signature_length() {
        let keypair = Ed25519Keypair::generate();
        let err = verify_signature(keypair.public_key(), b"m", &[0u8; 63]).unwrap_err();
        assert!(matches!(err, Ed25519Error::InvalidSignatureLength(63)));
    }
}
