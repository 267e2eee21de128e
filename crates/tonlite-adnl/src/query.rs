//! Query and ping message construction for the TCP transport.

use tonlite_crypto::random_bytes_32;
use tonlite_tl::{TlReader, TlWriter};

use crate::{AdnlError, AdnlResult, ADNL_MESSAGE_QUERY, TCP_PING, TCP_PONG};

pub fn new_query_id() -> [u8; 32] {
    random_bytes_32()
}

/// Wraps a payload into `adnl.message.query`.
pub fn wrap_query(query_id: &[u8; 32], query: &[u8]) -> Vec<u8> {
    let mut w = TlWriter::with_capacity(40 + query.len());
    w.write_id(ADNL_MESSAGE_QUERY);
    w.write_int256(query_id);
    w.write_bytes(query);
    w.into_bytes()
}

/// Parses an `adnl.message.answer` whose constructor id has already been
/// consumed by the caller.
pub fn parse_answer(reader: &mut TlReader<'_>) -> AdnlResult<([u8; 32], Vec<u8>)> {
    let query_id = reader.read_int256()?;
    let answer = reader.read_bytes()?;
    Ok((query_id, answer))
}

pub fn build_ping(random_id: u64) -> Vec<u8> {
    let mut w = TlWriter::with_capacity(12);
    w.write_id(TCP_PING);
    w.write_u64(random_id);
    w.into_bytes()
}

/// Parses a full `tcp.pong` payload.
pub fn parse_pong(payload: &[u8]) -> AdnlResult<u64> {
    let mut reader = TlReader::new(payload);
    match reader.read_id()? {
        TCP_PONG => Ok(reader.read_u64()?),
        other => Err(AdnlError::UnexpectedMessage(other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ADNL_MESSAGE_ANSWER;

    #[test]
    fn query_wire_layout() {
        let id = [0x11u8; 32];
        let wire = wrap_query(&id, b"abc");
        assert_eq!(&wire[..4], &crate::ADNL_MESSAGE_QUERY.to_be_bytes());
        assert_eq!(&wire[4..36], &id);
        // bytes: 1-byte length, payload, padded to 4.
        assert_eq!(&wire[36..40], &[3, b'a', b'b', b'c']);
        assert_eq!(wire.len(), 40);
    }

    #[test]
    fn answer_roundtrip() {
        let id = [0x42u8; 32];
        let mut w = TlWriter::new();
        w.write_id(ADNL_MESSAGE_ANSWER);
        w.write_int256(&id);
        w.write_bytes(b"result");
        let wire = w.into_bytes();

        let mut reader = TlReader::new(&wire);
        assert_eq!(reader.read_id().unwrap(), ADNL_MESSAGE_ANSWER);
        let (query_id, answer) = parse_answer(&mut reader).unwrap();
        assert_eq!(query_id, id);
        assert_eq!(answer, b"result");
    }

    #[test]
    fn ping_pong() {
        let ping = build_ping(0xdead_beef_cafe_f00d);
        assert_eq!(&ping[..4], &TCP_PING.to_be_bytes());

        let mut pong = TCP_PONG.to_be_bytes().to_vec();
        pong.extend_from_slice(&0xdead_beef_cafe_f00du64.to_le_bytes());
        assert_eq!(parse_pong(&pong).unwrap(), 0xdead_beef_cafe_f00d);
    }

    #[test]
    fn unexpected_pong_constructor() {
        let mut wire = TCP_PING.to_be_bytes().to_vec();
        wire.extend_from_slice(&[0u8; 8]);
        assert!(matches!(
            parse_pong(&wire),
            Err(AdnlError::UnexpectedMessage(_))
        ));
    }
}
