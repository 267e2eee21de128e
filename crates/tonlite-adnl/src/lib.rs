//! ADNL (Abstract Datagram Network Layer) transports.
//!
//! Two transports share the crypto but not the framing:
//!
//! - **TCP** ([`AdnlTcpClient`]): client-server sessions with liteservers.
//!   A 256-byte handshake seeds one AES-CTR stream per direction; every
//!   frame is `len_le(4) || nonce(32) || payload || sha256(nonce||payload)`.
//!   A listener task demultiplexes `adnl.message.answer` payloads back to
//!   the futures that sent the matching `adnl.message.query`.
//! - **UDP** ([`udp::AdnlUdpNode`]): peer-to-peer datagrams. The first
//!   exchange travels out-of-channel (addressed by the recipient's key id,
//!   encrypted with a DH-derived cipher and signed); `createChannel` /
//!   `confirmChannel` then establish a symmetric channel addressed by
//!   derived key ids.

mod error;

pub mod frame;
pub mod handshake;
pub mod query;
pub mod tcp;
pub mod udp;

pub use error::{AdnlError, AdnlResult};
pub use tcp::{AdnlTcpClient, TcpClientConfig};
pub use udp::{AdnlUdpNode, UdpNodeConfig};

// Constructor ids, quoted in wire byte order.

/// `tcp.ping random_id:long = tcp.Pong`
pub const TCP_PING: u32 = 0x9a2b084d;
/// `tcp.pong random_id:long = tcp.Pong`
pub const TCP_PONG: u32 = 0x03fb69dc;
/// `adnl.message.query query_id:int256 query:bytes = adnl.Message`
pub const ADNL_MESSAGE_QUERY: u32 = 0x7af98bb4;
/// `adnl.message.answer query_id:int256 answer:bytes = adnl.Message`
pub const ADNL_MESSAGE_ANSWER: u32 = 0x1684ac0f;
/// `adnl.message.createChannel key:int256 date:int = adnl.Message`
pub const ADNL_MESSAGE_CREATE_CHANNEL: u32 = 0xbbc373e6;
/// `adnl.message.confirmChannel key:int256 peer_key:int256 date:int = adnl.Message`
pub const ADNL_MESSAGE_CONFIRM_CHANNEL: u32 = 0x691ddd60;
/// `adnl.message.custom data:bytes = adnl.Message`
pub const ADNL_MESSAGE_CUSTOM: u32 = 0xf5184820;
/// `adnl.message.part hash:int256 total_size:int offset:int data:bytes = adnl.Message`
pub const ADNL_MESSAGE_PART: u32 = 0x392d45fd;
/// `adnl.packetContents ... = adnl.PacketContents`
pub const ADNL_PACKET_CONTENTS: u32 = 0x89cd42d1;
/// `adnl.address.udp ip:int port:int = adnl.Address`
pub const ADNL_ADDRESS_UDP: u32 = 0xe7a60d67;
/// `pub.ed25519 key:int256 = PublicKey`
pub const PUB_ED25519: u32 = 0xc6b41348;
