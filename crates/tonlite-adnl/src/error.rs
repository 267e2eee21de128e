//! Error types for the ADNL transports.

use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AdnlError {
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    #[error("connection closed")]
    ConnectionClosed,

    #[error("handshake failed: {0}")]
    HandshakeFailed(String),

    #[error("invalid packet: {0}")]
    InvalidPacket(String),

    #[error("packet checksum mismatch")]
    ChecksumMismatch,

    #[error("packet too large: {size} bytes (max {max})")]
    PacketTooLarge { size: usize, max: usize },

    #[error("unexpected message 0x{0:08x}")]
    UnexpectedMessage(u32),

    #[error("tl error: {0}")]
    Tl(#[from] tonlite_tl::TlError),

    #[error("key exchange failed: {0}")]
    KeyExchange(#[from] tonlite_crypto::x25519::X25519Error),

    #[error("packet signature rejected")]
    SignatureRejected,

    #[error("query timed out")]
    QueryTimeout,

    #[error("unknown peer")]
    UnknownPeer,

    #[error("unknown key id")]
    UnknownKeyId,

    #[error("channel not established")]
    ChannelNotEstablished,
}

pub type AdnlResult<T> = Result<T, AdnlError>;
