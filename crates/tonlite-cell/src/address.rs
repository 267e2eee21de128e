//! Account addresses.
//!
//! An account is addressed by a workchain and a 256-bit hash. Two textual
//! forms circulate: the raw `workchain:hex` form and the user-friendly
//! base64 form, 36 bytes of tag, workchain, hash and a big-endian CRC-16
//! over the first 34. The tag byte is `0x11` for bounceable addresses,
//! `0x51` for non-bounceable, with `0x80` or-ed in for testnet-only.

use base64::Engine;
use tonlite_crypto::crc16;

use crate::{CellError, CellResult};

const TAG_BOUNCEABLE: u8 = 0x11;
const TAG_NON_BOUNCEABLE: u8 = 0x51;
const TAG_TEST_ONLY: u8 = 0x80;

/// An internal (`addr_std`) account address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Address {
    /// Workchain: `-1` for the masterchain, `0` for the base workchain.
    pub workchain: i32,
    pub hash: [u8; 32],
}

impl Address {
    pub fn new(workchain: i32, hash: [u8; 32]) -> Self {
        Self { workchain, hash }
    }

    /// Parses either textual form.
    pub fn parse(s: &str) -> CellResult<Self> {
        let s = s.trim();
        if s.contains(':') {
            Self::from_raw(s)
        } else {
            Self::from_friendly(s).map(|(addr, _, _)| addr)
        }
    }

    /// Parses the raw `workchain:hex` form.
    pub fn from_raw(s: &str) -> CellResult<Self> {
        let (wc, hash_hex) = s
            .split_once(':')
            .ok_or_else(|| CellError::InvalidAddress(format!("no workchain separator in {s:?}")))?;
        let workchain: i32 = wc
            .parse()
            .map_err(|_| CellError::InvalidAddress(format!("bad workchain {wc:?}")))?;
        let bytes = hex::decode(hash_hex)
            .map_err(|e| CellError::InvalidAddress(format!("bad hash hex: {e}")))?;
        let hash: [u8; 32] = bytes
            .try_into()
            .map_err(|_| CellError::InvalidAddress("hash must be 32 bytes".into()))?;
        Ok(Self { workchain, hash })
    }

    /// Parses the user-friendly form, returning the address together with
    /// its `(bounceable, test_only)` flags.
    pub fn from_friendly(s: &str) -> CellResult<(Self, bool, bool)> {
        // Both the URL-safe and the standard alphabet occur in the wild.
        let normalized: String = s
            .chars()
            .map(|c| match c {
                '-' => '+',
                '_' => '/',
                c => c,
            })
            .collect();
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(&normalized)
            .map_err(|e| CellError::InvalidAddress(format!("base64: {e}")))?;
        if bytes.len() != 36 {
            return Err(CellError::InvalidAddress(format!(
                "friendly address must decode to 36 bytes, got {}",
                bytes.len()
            )));
        }

        let expected = u16::from_be_bytes([bytes[34], bytes[35]]);
        let actual = crc16(&bytes[..34]);
        if expected != actual {
            return Err(CellError::InvalidAddress(format!(
                "address checksum mismatch: expected {expected:04x}, computed {actual:04x}"
            )));
        }

        let tag = bytes[0];
        let test_only = tag & TAG_TEST_ONLY != 0;
        let bounceable = match tag & !TAG_TEST_ONLY {
            TAG_BOUNCEABLE => true,
            TAG_NON_BOUNCEABLE => false,
            other => {
                return Err(CellError::InvalidAddress(format!(
                    "unknown address tag {other:02x}"
                )))
            }
        };

        let workchain = bytes[1] as i8 as i32;
        let mut hash = [0u8; 32];
        hash.copy_from_slice(&bytes[2..34]);
        Ok((Self { workchain, hash }, bounceable, test_only))
    }

    pub fn to_raw(&self) -> String {
        format!("{}:{}", self.workchain, hex::encode(self.hash))
    }

    /// Renders the user-friendly base64url form.
    pub fn to_friendly(&self, bounceable: bool, test_only: bool) -> String {
        let mut tag = if bounceable {
            TAG_BOUNCEABLE
        } else {
            TAG_NON_BOUNCEABLE
        };
        if test_only {
            tag |= TAG_TEST_ONLY;
        }

        let mut bytes = Vec::with_capacity(36);
        bytes.push(tag);
        bytes.push(self.workchain as i8 as u8);
        bytes.extend_from_slice(&self.hash);
        bytes.extend_from_slice(&crc16(&bytes).to_be_bytes());
        base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
    }

    pub fn is_masterchain(&self) -> bool {
        self.workchain == -1
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_raw())
    }
}

impl std::str::FromStr for Address {
    type Err = CellError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
