//! CRC checksums used by the wire formats.
//!
//! Three distinct polynomials show up in the protocol:
//!
//! - CRC-16/XMODEM for address checksums and get-method selectors
//! - CRC-32 (ISO HDLC) for TL constructor ids
//! - CRC-32C (Castagnoli) for BOC payload checksums

use crc::Crc;

const CRC16_XMODEM: Crc<u16> = Crc::<u16>::new(&crc::CRC_16_XMODEM);
const CRC32_ISO: Crc<u32> = Crc::<u32>::new(&crc::CRC_32_ISO_HDLC);
const CRC32_CASTAGNOLI: Crc<u32> = Crc::<u32>::new(&crc::CRC_32_ISCSI);

/// CRC-16/XMODEM, big-endian within the protocol.
pub fn crc16(data: &[u8]) -> u16 {
    CRC16_XMODEM.checksum(data)
}

/// Plain CRC-32 used for TL constructor ids.
pub fn crc32(data: &[u8]) -> u32 {
    CRC32_ISO.checksum(data)
}

/// CRC-32C used as the optional BOC trailing checksum.
pub fn crc32c(data: &[u8]) -> u32 {
    CRC32_CASTAGNOLI.checksum(data)
}

/// Computes a TL constructor id: CRC-32 of the canonical schema text with
/// the characters `;`, `(` and `)` stripped.
///
/// Ids are conventionally quoted in wire byte order, so the returned value
/// is the byte-swapped CRC and serializers write it big-endian: `tcp.ping`
/// has id `0x9a2b084d` and appears on the wire as `9a 2b 08 4d`.
pub fn tl_id(schema: &str) -> u32 {
    let canonical: String = schema.chars().filter(|c| !matches!(c, ';' | '(' | ')')).collect();
    crc32(canonical.as_bytes()).swap_bytes()
}

/// Computes a smart-contract get-method selector:
/// `(crc16(name) & 0xffff) | 0x10000`.
pub fn method_id(name: &str) -> u32 {
    (crc16(name.as_bytes()) as u32) | 0x10000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tcp_ping_id() {
        // Reference value shared by every TON implementation.
        assert_eq!(tl_id("tcp.ping random_id:long = tcp.Pong"), 0x9a2b084d);
    }

    #[test]
    fn tcp_pong_id() {
        assert_eq!(tl_id("tcp.pong random_id:long = tcp.Pong"), 0x03fb69dc);
    }

    #[test]
    fn adnl_message_ids() {
        assert_eq!(
            tl_id("adnl.message.query query_id:int256 query:bytes = adnl.Message"),
            0x7af98bb4
        );
        assert_eq!(
            tl_id("adnl.message.answer query_id:int256 answer:bytes = adnl.Message"),
            0x1684ac0f
        );
    }

    #[test]
    fn seqno_method_id() {
        assert_eq!(method_id("seqno"), 85143);
    }

    #[test]
    fn crc16_xmodem_vector() {
        assert_eq!(crc16(b"123456789"), 0x31c3);
    }

    #[test]
    fn crc32c_vector() {
        assert_eq!(crc32c(b"123456789"), 0xe3069283);
    }
}
