//! Symmetric UDP channels.
//!
//! Both peers contribute an X25519 keypair through `createChannel` /
//! `confirmChannel`. The shared secret becomes one direction's key and its
//! byte-reverse the other's; which side gets which is decided by comparing
//! the peers' node key ids so both ends agree without negotiation.

use tonlite_crypto::aes_ctr::{checksum_matches, session_cipher};
use tonlite_crypto::{key_id_aes, sha256, X25519Keypair};

use crate::{AdnlError, AdnlResult};

/// Channel packet envelope: recipient channel id, then the checksum of the
/// plaintext, then the ciphertext.
const ENVELOPE_LEN: usize = 64;

/// An established channel with a peer.
pub struct AdnlChannel {
    send_key: [u8; 32],
    recv_key: [u8; 32],
    send_id: [u8; 32],
    recv_id: [u8; 32],
    date: i32,
}

impl AdnlChannel {
    /// Derives the channel from our X25519 private half and the peer's
    /// channel public key. Node key ids break the direction tie.
    pub fn derive(
        our_keypair: &X25519Keypair,
        peer_channel_public: &[u8; 32],
        our_node_id: &[u8; 32],
        peer_node_id: &[u8; 32],
        date: i32,
    ) -> Self {
        let shared = our_keypair.ecdh(peer_channel_public);
        let mut reversed = shared;
        reversed.reverse();

        let (recv_key, send_key) = if peer_node_id < our_node_id {
            (reversed, shared)
        } else {
            (shared, reversed)
        };
        Self {
            send_id: key_id_aes(&send_key),
            recv_id: key_id_aes(&recv_key),
            send_key,
            recv_key,
            date,
        }
    }

    /// The id the peer addresses us by. Incoming channel packets start
    /// with this value.
    pub fn recv_id(&self) -> &[u8; 32] {
        &self.recv_id
    }

    /// The id we address the peer by.
    pub fn send_id(&self) -> &[u8; 32] {
        &self.send_id
    }

    pub fn date(&self) -> i32 {
        self.date
    }

    /// Wraps serialized packet contents into a channel datagram.
    pub fn encrypt_packet(&self, plaintext: &[u8]) -> Vec<u8> {
        let checksum = sha256(plaintext);
        let ciphertext = session_cipher(&self.send_key, &checksum).apply(plaintext);
        let mut packet = Vec::with_capacity(ENVELOPE_LEN + ciphertext.len());
        packet.extend_from_slice(&self.send_id);
        packet.extend_from_slice(&checksum);
        packet.extend_from_slice(&ciphertext);
        packet
    }

    /// Opens a channel datagram addressed to us. The caller has already
    /// matched the leading 32 bytes against `recv_id`.
    pub fn decrypt_packet(&self, data: &[u8]) -> AdnlResult<Vec<u8>> {
        if data.len() < ENVELOPE_LEN {
            return Err(AdnlError::InvalidPacket(format!(
                "channel datagram of {} bytes is shorter than the envelope",
                data.len()
            )));
        }
        let mut checksum = [0u8; 32];
        checksum.copy_from_slice(&data[32..64]);
        let plaintext = session_cipher(&self.recv_key, &checksum).apply(&data[64..]);
        if !checksum_matches(&plaintext, &checksum) {
            return Err(AdnlError::ChecksumMismatch);
        }
        Ok(plaintext)
    }
}

impl std::fmt::Debug for AdnlChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdnlChannel")
            .field("send_id", &hex::encode(self.send_id))
            .field("recv_id", &hex::encode(self.recv_id))
            .field("date", &self.date)
            .finish()
    }
}

/// Our half of a channel that the peer has not confirmed yet.
pub struct PendingChannel {
    keypair: X25519Keypair,
    date: i32,
}

impl PendingChannel {
    pub fn new(date: i32) -> Self {
        Self {
            keypair: X25519Keypair::generate(),
            date,
        }
    }

    /// The public half to advertise in `createChannel` or `confirmChannel`.
    pub fn public_key(&self) -> &[u8; 32] {
        self.keypair.public_key()
    }

    pub fn date(&self) -> i32 {
        self.date
    }

    /// Completes the channel once the peer's channel key is known.
    pub fn confirm(
        &self,
        peer_channel_public: &[u8; 32],
        our_node_id: &[u8; 32],
        peer_node_id: &[u8; 32],
    ) -> AdnlChannel {
        AdnlChannel::derive(
            &self.keypair,
            peer_channel_public,
            our_node_id,
            peer_node_id,
            self.date,
        )
    }
}

impl std::fmt::Debug for PendingChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingChannel")
            .field("date", &self.date)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel_pair() -> (AdnlChannel, AdnlChannel) {
        let a = X25519Keypair::generate();
        let b = X25519Keypair::generate();
        let id_a = [1u8; 32];
        let id_b = [2u8; 32];
        let ab = AdnlChannel::derive(&a, b.public_key(), &id_a, &id_b, 0);
        let ba = AdnlChannel::derive(&b, a.public_key(), &id_b, &id_a, 0);
        (ab, ba)
    }

    #[test]
    fn directions_cross_match() {
        let (ab, ba) = channel_pair();
        assert_eq!(ab.send_id(), ba.recv_id());
        assert_eq!(ab.recv_id(), ba.send_id());
        assert_ne!(ab.send_id(), ab.recv_id());
    }

    #[test]
    fn packet_roundtrip() {
        let (ab, ba) = channel_pair();
        let wire = ab.encrypt_packet(b"through the channel");
        assert_eq!(&wire[..32], ba.recv_id());
        assert_eq!(ba.decrypt_packet(&wire).unwrap(), b"through the channel");
    }

    #[test]
    fn tampered_packet_rejected() {
        let (ab, ba) = channel_pair();
        let mut wire = ab.encrypt_packet(b"payload");
        let last = wire.len() - 1;
        wire[last] ^= 0x80;
        assert!(matches!(
            ba.decrypt_packet(&wire),
            Err(AdnlError::ChecksumMismatch)
        ));
    }

    #[test]
    fn pending_confirm_matches_derive() {
        let pending = PendingChannel::new(42);
        let responder = X25519Keypair::generate();
        let id_a = [3u8; 32];
        let id_b = [4u8; 32];
        let ours = pending.confirm(responder.public_key(), &id_a, &id_b);
        let theirs = AdnlChannel::derive(&responder, pending.public_key(), &id_b, &id_a, 42);
        let wire = ours.encrypt_packet(b"confirmed");
        assert_eq!(theirs.decrypt_packet(&wire).unwrap(), b"confirmed");
        assert_eq!(ours.date(), 42);
    }
}
