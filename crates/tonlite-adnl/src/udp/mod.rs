//! UDP peer-to-peer transport with encrypted channels.

pub mod channel;
pub mod node;
pub mod packet;
pub mod peer;

pub use channel::{AdnlChannel, PendingChannel};
pub use node::{AdnlUdpNode, UdpNodeConfig};
pub use packet::{AddressList, PacketContents, UdpAddress};
pub use peer::AdnlPeer;

use tonlite_tl::{TlReader, TlWriter};

use crate::{
    AdnlError, AdnlResult, ADNL_MESSAGE_ANSWER, ADNL_MESSAGE_CONFIRM_CHANNEL,
    ADNL_MESSAGE_CREATE_CHANNEL, ADNL_MESSAGE_CUSTOM, ADNL_MESSAGE_PART, ADNL_MESSAGE_QUERY,
};

/// A boxed `adnl.Message`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdnlMessage {
    CreateChannel {
        key: [u8; 32],
        date: i32,
    },
    ConfirmChannel {
        key: [u8; 32],
        peer_key: [u8; 32],
        date: i32,
    },
    Query {
        query_id: [u8; 32],
        query: Vec<u8>,
    },
    Answer {
        query_id: [u8; 32],
        answer: Vec<u8>,
    },
    Custom {
        data: Vec<u8>,
    },
    Part {
        hash: [u8; 32],
        total_size: i32,
        offset: i32,
        data: Vec<u8>,
    },
}

impl AdnlMessage {
    pub fn write(&self, w: &mut TlWriter) {
        match self {
            Self::CreateChannel { key, date } => {
                w.write_id(ADNL_MESSAGE_CREATE_CHANNEL);
                w.write_int256(key);
                w.write_i32(*date);
            }
            Self::ConfirmChannel {
                key,
                peer_key,
                date,
            } => {
                w.write_id(ADNL_MESSAGE_CONFIRM_CHANNEL);
                w.write_int256(key);
                w.write_int256(peer_key);
                w.write_i32(*date);
            }
            Self::Query { query_id, query } => {
                w.write_id(ADNL_MESSAGE_QUERY);
                w.write_int256(query_id);
                w.write_bytes(query);
            }
            Self::Answer { query_id, answer } => {
                w.write_id(ADNL_MESSAGE_ANSWER);
                w.write_int256(query_id);
                w.write_bytes(answer);
            }
            Self::Custom { data } => {
                w.write_id(ADNL_MESSAGE_CUSTOM);
                w.write_bytes(data);
            }
            Self::Part {
                hash,
                total_size,
                offset,
                data,
            } => {
                w.write_id(ADNL_MESSAGE_PART);
                w.write_int256(hash);
                w.write_i32(*total_size);
                w.write_i32(*offset);
                w.write_bytes(data);
            }
        }
    }

    pub fn read(r: &mut TlReader<'_>) -> AdnlResult<Self> {
        match r.read_id()? {
            ADNL_MESSAGE_CREATE_CHANNEL => Ok(Self::CreateChannel {
                key: r.read_int256()?,
                date: r.read_i32()?,
            }),
            ADNL_MESSAGE_CONFIRM_CHANNEL => Ok(Self::ConfirmChannel {
                key: r.read_int256()?,
                peer_key: r.read_int256()?,
                date: r.read_i32()?,
            }),
            ADNL_MESSAGE_QUERY => Ok(Self::Query {
                query_id: r.read_int256()?,
                query: r.read_bytes()?,
            }),
            ADNL_MESSAGE_ANSWER => Ok(Self::Answer {
                query_id: r.read_int256()?,
                answer: r.read_bytes()?,
            }),
            ADNL_MESSAGE_CUSTOM => Ok(Self::Custom {
                data: r.read_bytes()?,
            }),
            ADNL_MESSAGE_PART => Ok(Self::Part {
                hash: r.read_int256()?,
                total_size: r.read_i32()?,
                offset: r.read_i32()?,
                data: r.read_bytes()?,
            }),
            other => Err(AdnlError::UnexpectedMessage(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_roundtrip() {
        let messages = [
            AdnlMessage::CreateChannel {
                key: [1u8; 32],
                date: 1_700_000_000,
            },
            AdnlMessage::ConfirmChannel {
                key: [2u8; 32],
                peer_key: [3u8; 32],
                date: 1_700_000_001,
            },
            AdnlMessage::Query {
                query_id: [4u8; 32],
                query: b"query body".to_vec(),
            },
            AdnlMessage::Answer {
                query_id: [4u8; 32],
                answer: b"answer body".to_vec(),
            },
            AdnlMessage::Custom {
                data: b"custom".to_vec(),
            },
            AdnlMessage::Part {
                hash: [5u8; 32],
                total_size: 2048,
                offset: 1024,
                data: vec![0u8; 16],
            },
        ];
        for message in &messages {
            let mut w = TlWriter::new();
            message.write(&mut w);
            let mut r = TlReader::new(w.as_bytes());
            assert_eq!(&AdnlMessage::read(&mut r).unwrap(), message);
            assert!(r.is_empty());
        }
    }

    #[test]
    fn unknown_constructor_rejected() {
        let mut r = TlReader::new(&[0xde, 0xad, 0xbe, 0xef]);
        assert!(matches!(
            AdnlMessage::read(&mut r),
            Err(AdnlError::UnexpectedMessage(0xdeadbeef))
        ));
    }
}
