//! DHT keys.
//!
//! A `dht.key` names one value slot owned by a key id: the owner's short
//! key id, a name such as `address`, and a small index. The 256-bit hash
//! of its boxed serialization is the id the table is actually addressed
//! by, and the target of the XOR metric.

use tonlite_crypto::{key_id_ed25519, sha256};
use tonlite_tl::{TlReader, TlWriter};

use crate::{DhtError, DhtResult, DHT_KEY};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DhtKey {
    /// The owner's short key id.
    pub id: [u8; 32],
    pub name: Vec<u8>,
    pub idx: u32,
}

impl DhtKey {
    pub const MAX_NAME_LEN: usize = 127;
    pub const MAX_INDEX: u32 = 15;

    pub fn new(id: [u8; 32], name: &[u8], idx: u32) -> DhtResult<Self> {
        if name.is_empty() {
            return Err(DhtError::InvalidKey("empty key name".into()));
        }
        if name.len() > Self::MAX_NAME_LEN {
            return Err(DhtError::InvalidKey(format!(
                "key name of {} bytes exceeds {}",
                name.len(),
                Self::MAX_NAME_LEN
            )));
        }
        if idx > Self::MAX_INDEX {
            return Err(DhtError::InvalidKey(format!(
                "key index {idx} exceeds {}",
                Self::MAX_INDEX
            )));
        }
        Ok(Self {
            id,
            name: name.to_vec(),
            idx,
        })
    }

    /// The `address` key of an ADNL identity.
    pub fn for_address(public_key: &[u8; 32]) -> Self {
        Self {
            id: key_id_ed25519(public_key),
            name: b"address".to_vec(),
            idx: 0,
        }
    }

    /// The id the table is addressed by: `sha256(boxed dht.key)`.
    pub fn table_id(&self) -> [u8; 32] {
        let mut w = TlWriter::new();
        self.write_boxed(&mut w);
        sha256(w.as_bytes())
    }

    pub fn write_boxed(&self, w: &mut TlWriter) {
        w.write_id(DHT_KEY);
        w.write_int256(&self.id);
        w.write_bytes(&self.name);
        w.write_u32(self.idx);
    }

    pub fn read_boxed(r: &mut TlReader<'_>) -> DhtResult<Self> {
        let id = r.read_id()?;
        if id != DHT_KEY {
            return Err(DhtError::UnexpectedAnswer(id));
        }
        Ok(Self {
            id: r.read_int256()?,
            name: r.read_bytes()?,
            idx: r.read_u32()?,
        })
    }
}
