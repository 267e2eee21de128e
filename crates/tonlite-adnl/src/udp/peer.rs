//! Per-peer state.

use std::net::SocketAddr;

use tonlite_crypto::key_id_ed25519;

use crate::udp::channel::{AdnlChannel, PendingChannel};

/// Everything the node tracks about one remote peer.
pub struct AdnlPeer {
    pub addr: SocketAddr,
    pub public_key: [u8; 32],
    pub key_id: [u8; 32],
    pub channel: Option<AdnlChannel>,
    /// A derived channel is only used for sending once the peer has proved
    /// it knows the keys: the initiator waits for `confirmChannel`, the
    /// responder for the first decryptable channel packet.
    pub channel_ready: bool,
    pub pending_channel: Option<PendingChannel>,
    /// Next outgoing sequence number.
    pub seqno: i64,
    /// Highest sequence number observed from the peer.
    pub confirm_seqno: i64,
    /// The peer's reinit date, echoed back as `dst_reinit_date`.
    pub reinit_date: i32,
}

impl AdnlPeer {
    pub fn new(addr: SocketAddr, public_key: [u8; 32]) -> Self {
        Self {
            addr,
            public_key,
            key_id: key_id_ed25519(&public_key),
            channel: None,
            channel_ready: false,
            pending_channel: None,
            seqno: 1,
            confirm_seqno: 0,
            reinit_date: 0,
        }
    }

    /// The sequence number for the next outgoing packet.
    pub fn take_seqno(&mut self) -> i64 {
        let seqno = self.seqno;
        self.seqno += 1;
        seqno
    }

    pub fn observe_seqno(&mut self, seqno: i64) {
        if seqno > self.confirm_seqno {
            self.confirm_seqno = seqno;
        }
    }
}

impl std::fmt::Debug for AdnlPeer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdnlPeer")
            .field("addr", &self.addr)
            .field("key_id", &hex::encode(self.key_id))
            .field("channel_ready", &self.channel_ready)
            .field("seqno", &self.seqno)
            .finish_non_exhaustive()
    }
}
