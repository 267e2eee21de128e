//! Kademlia-like DHT client.
//!
//! The DHT resolves 256-bit keys to signed values, most importantly
//! `address` keys mapping a peer's identity to its current socket
//! addresses. Lookups are iterative: query the closest known nodes by XOR
//! distance, grow the candidate set from `dht.valueNotFound` answers, and
//! stop at the first verifiable `dht.valueFound`.

mod error;

pub mod client;
pub mod distance;
pub mod key;
pub mod node;
pub mod value;

pub use client::{DhtClient, DhtClientConfig};
pub use distance::{xor_distance, Distance};
pub use error::{DhtError, DhtResult};
pub use key::DhtKey;
pub use node::DhtNode;
pub use value::{DhtKeyDescription, DhtValue, UpdateRule};

// Constructor ids, quoted in wire byte order.

/// `dht.ping random_id:long = dht.Pong`
pub const DHT_PING: u32 = 0x183febcb;
/// `dht.pong random_id:long = dht.Pong`
pub const DHT_PONG: u32 = 0x81ef8a5a;
/// `dht.findValue key:int256 k:int = dht.ValueResult`
pub const DHT_FIND_VALUE: u32 = 0x11604bae;
/// `dht.findNode key:int256 k:int = dht.Nodes`
pub const DHT_FIND_NODE: u32 = 0x6bcee26c;
/// `dht.valueNotFound nodes:dht.nodes = dht.ValueResult`
pub const DHT_VALUE_NOT_FOUND: u32 = 0x680562a2;
/// `dht.valueFound value:dht.Value = dht.ValueResult`
pub const DHT_VALUE_FOUND: u32 = 0x74f70ce4;
/// `dht.value key:dht.keyDescription value:bytes ttl:int signature:bytes = dht.Value`
pub const DHT_VALUE: u32 = 0xcb27ad90;
/// `dht.key id:int256 name:bytes idx:int = dht.Key`
pub const DHT_KEY: u32 = 0x8fde67f6;
/// `dht.keyDescription key:dht.key id:PublicKey update_rule:dht.UpdateRule signature:bytes = dht.KeyDescription`
pub const DHT_KEY_DESCRIPTION: u32 = 0x054e1d28;
/// `dht.node id:PublicKey addr_list:adnl.addressList version:int signature:bytes = dht.Node`
pub const DHT_NODE: u32 = 0x48325384;
/// `dht.nodes nodes:(vector dht.node) = dht.Nodes`
pub const DHT_NODES: u32 = 0xbea07479;
/// `dht.updateRule.signature = dht.UpdateRule`
pub const DHT_UPDATE_RULE_SIGNATURE: u32 = 0xf7319fcc;
/// `dht.updateRule.anybody = dht.UpdateRule`
pub const DHT_UPDATE_RULE_ANYBODY: u32 = 0x148e5761;
/// `dht.updateRule.overlayNodes = dht.UpdateRule`
pub const DHT_UPDATE_RULE_OVERLAY_NODES: u32 = 0x83937726;
