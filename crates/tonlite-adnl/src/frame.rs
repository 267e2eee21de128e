//! TCP frame layout.
//!
//! Every frame on an ADNL TCP session is
//!
//! ```text
//! length:u32le || nonce[32] || payload || sha256(nonce || payload)[32]
//! ```
//!
//! where `length` counts everything after itself. The whole byte stream is
//! additionally run through the session's AES-CTR cipher; that happens in
//! the transport, not here.

use tonlite_crypto::{fill_random, sha256_multi};

use crate::{AdnlError, AdnlResult};

pub const NONCE_LEN: usize = 32;
pub const CHECKSUM_LEN: usize = 32;

/// Nonce plus checksum: the smallest valid frame body is an empty payload.
pub const FRAME_OVERHEAD: usize = NONCE_LEN + CHECKSUM_LEN;

/// Upper bound on the declared frame length.
pub const MAX_FRAME_LEN: usize = 10 << 20;

/// Builds a plaintext frame around a payload with a random nonce.
pub fn encode_frame(payload: &[u8]) -> Vec<u8> {
    let mut nonce = [0u8; NONCE_LEN];
    fill_random(&mut nonce);
    encode_frame_with_nonce(payload, &nonce)
}

pub fn encode_frame_with_nonce(payload: &[u8], nonce: &[u8; NONCE_LEN]) -> Vec<u8> {
    let body_len = FRAME_OVERHEAD + payload.len();
    let mut frame = Vec::with_capacity(4 + body_len);
    frame.extend_from_slice(&(body_len as u32).to_le_bytes());
    frame.extend_from_slice(nonce);
    frame.extend_from_slice(payload);
    frame.extend_from_slice(&sha256_multi(&[nonce, payload]));
    frame
}

/// Validates a decrypted length prefix and returns the body length.
pub fn frame_len(prefix: [u8; 4]) -> AdnlResult<usize> {
    let len = u32::from_le_bytes(prefix) as usize;
    if len < FRAME_OVERHEAD {
        return Err(AdnlError::InvalidPacket(format!(
            "frame length {len} below minimum {FRAME_OVERHEAD}"
        )));
    }
    if len > MAX_FRAME_LEN {
        return Err(AdnlError::PacketTooLarge {
            size: len,
            max: MAX_FRAME_LEN,
        });
    }
    Ok(len)
}

/// Checks the trailing checksum of a decrypted frame body and returns the
/// payload between nonce and checksum.
pub fn decode_frame_body(body: &[u8]) -> AdnlResult<Vec<u8>> {
    if body.len() < FRAME_OVERHEAD {
        return Err(AdnlError::InvalidPacket(format!(
            "frame body of {} bytes is shorter than nonce plus checksum",
            body.len()
        )));
    }
    let (nonce, rest) = body.split_at(NONCE_LEN);
    let (payload, checksum) = rest.split_at(rest.len() - CHECKSUM_LEN);
    if sha256_multi(&[nonce, payload]).as_slice() != checksum {
        return Err(AdnlError::ChecksumMismatch);
    }
    Ok(payload.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        let frame = encode_frame(b"payload bytes");
        let mut prefix = [0u8; 4];
        prefix.copy_from_slice(&frame[..4]);
        let len = frame_len(prefix).unwrap();
        assert_eq!(len, frame.len() - 4);
        assert_eq!(decode_frame_body(&frame[4..]).unwrap(), b"payload bytes");
    }

    #[test]
    fn empty_payload_is_minimum_frame() {
        let frame = encode_frame(&[]);
        assert_eq!(frame.len(), 4 + FRAME_OVERHEAD);
        assert_eq!(decode_frame_body(&frame[4..]).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn corrupted_payload_rejected() {
        let mut frame = encode_frame(b"important");
        frame[4 + NONCE_LEN] ^= 0x01;
        assert!(matches!(
            decode_frame_body(&frame[4..]),
            Err(AdnlError::ChecksumMismatch)
        ));
    }

    #[test]
    fn length_bounds() {
        assert!(frame_len((FRAME_OVERHEAD as u32).to_le_bytes()).is_ok());
        assert!(matches!(
            frame_len(((FRAME_OVERHEAD - 1) as u32).to_le_bytes()),
            Err(AdnlError::InvalidPacket(_))
        ));
        assert!(matches!(
            frame_len(((MAX_FRAME_LEN + 1) as u32).to_le_bytes()),
            Err(AdnlError::PacketTooLarge { .. })
        ));
    }
}
