//! TCP session handshake.
//!
//! The client invents 160 bytes of session parameters, derives its two
//! AES-CTR stream ciphers from them, and sends the parameters to the server
//! encrypted under a DH secret with an ephemeral key:
//!
//! ```text
//! rand[0..32]    receive key   (server -> client)
//! rand[32..64]   send key      (client -> server)
//! rand[64..80]   receive iv
//! rand[80..96]   send iv
//! rand[96..160]  padding
//! ```
//!
//! The 256-byte handshake packet is
//! `key_id(server_pub) || ephemeral_pub || sha256(rand) || encrypt(rand)`.
//! The server answers with an empty frame on the new session ciphers.

use tonlite_crypto::aes_ctr::session_cipher;
use tonlite_crypto::{
    ecdh_ed25519, fill_random, key_id_ed25519, sha256, AesCtrCipher, Ed25519Keypair,
};

use crate::AdnlResult;

pub const HANDSHAKE_LEN: usize = 256;
pub const SESSION_PARAMS_LEN: usize = 160;

/// The two directions of an established TCP session.
pub struct SessionCiphers {
    /// Client to server.
    pub send: AesCtrCipher,
    /// Server to client.
    pub recv: AesCtrCipher,
}

/// Builds the 256-byte handshake packet for a server identified by its
/// Ed25519 public key and returns it together with the session ciphers.
pub fn build_handshake(server_public: &[u8; 32]) -> AdnlResult<([u8; HANDSHAKE_LEN], SessionCiphers)> {
    let mut rand = [0u8; SESSION_PARAMS_LEN];
    fill_random(&mut rand);

    let ciphers = ciphers_from_params(&rand, Role::Client);

    let ephemeral = Ed25519Keypair::generate();
    let checksum = sha256(&rand);
    let shared = ecdh_ed25519(ephemeral.private_key(), server_public)?;
    let encrypted = session_cipher(&shared, &checksum).apply(&rand);

    let mut packet = [0u8; HANDSHAKE_LEN];
    packet[..32].copy_from_slice(&key_id_ed25519(server_public));
    packet[32..64].copy_from_slice(ephemeral.public_key());
    packet[64..96].copy_from_slice(&checksum);
    packet[96..].copy_from_slice(&encrypted);
    Ok((packet, ciphers))
}

/// Which side of the session the parameter block is read from. The key and
/// iv slots swap between client and server.
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Client,
    Server,
}

/// Splits the 160-byte parameter block into the two directional ciphers.
pub fn ciphers_from_params(params: &[u8; SESSION_PARAMS_LEN], role: Role) -> SessionCiphers {
    let mut key_a = [0u8; 32];
    let mut key_b = [0u8; 32];
    let mut iv_a = [0u8; 16];
    let mut iv_b = [0u8; 16];
    key_a.copy_from_slice(&params[..32]);
    key_b.copy_from_slice(&params[32..64]);
    iv_a.copy_from_slice(&params[64..80]);
    iv_b.copy_from_slice(&params[80..96]);

    // Slot A is the server-to-client stream.
    let a = AesCtrCipher::new(key_a, iv_a);
    let b = AesCtrCipher::new(key_b, iv_b);
    match role {
        Role::Client => SessionCiphers { send: b, recv: a },
        Role::Server => SessionCiphers { send: a, recv: b },
    }
}

/// Server-side decryption of a handshake packet. Used by tests and by
/// embedded mock servers; a liteserver performs the same steps.
pub fn accept_handshake(
    packet: &[u8; HANDSHAKE_LEN],
    server: &Ed25519Keypair,
) -> AdnlResult<SessionCiphers> {
    use crate::AdnlError;

    if packet[..32] != key_id_ed25519(server.public_key()) {
        return Err(AdnlError::UnknownKeyId);
    }
    let mut client_public = [0u8; 32];
    client_public.copy_from_slice(&packet[32..64]);
    let mut checksum = [0u8; 32];
    checksum.copy_from_slice(&packet[64..96]);

    let shared = ecdh_ed25519(server.private_key(), &client_public)?;
    let decrypted = session_cipher(&shared, &checksum).apply(&packet[96..]);
    if sha256(&decrypted) != checksum {
        return Err(AdnlError::HandshakeFailed(
            "session parameter checksum mismatch".into(),
        ));
    }
    let mut params = [0u8; SESSION_PARAMS_LEN];
    params.copy_from_slice(&decrypted);
    Ok(ciphers_from_params(&params, Role::Server))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AdnlError;

    #[test]
    fn server_recovers_mirrored_ciphers() {
        let server = Ed25519Keypair::generate();
        let (packet, mut client) = build_handshake(server.public_key()).unwrap();
        let mut srv = accept_handshake(&packet, &server).unwrap();

        // What the client sends, the server's receive cipher must undo.
        let ct = client.send.apply(b"client to server");
        assert_eq!(srv.recv.apply(&ct), b"client to server");
        let ct = srv.send.apply(b"server to client");
        assert_eq!(client.recv.apply(&ct), b"server to client");
    }

    #[test]
    fn wrong_server_key_rejected() {
        let server = Ed25519Keypair::generate();
        let other = Ed25519Keypair::generate();
        let (packet, _) = build_handshake(server.public_key()).unwrap();
        assert!(matches!(
            accept_handshake(&packet, &other),
            Err(AdnlError::UnknownKeyId)
        ));
    }

    #[test]
    fn tampered_parameters_rejected() {
        let server = Ed25519Keypair::generate();
        let (mut packet, _) = build_handshake(server.public_key()).unwrap();
        packet[100] ^= 0xff;
        assert!(matches!(
            accept_handshake(&packet, &server),
            Err(AdnlError::HandshakeFailed(_))
        ));
    }
}
