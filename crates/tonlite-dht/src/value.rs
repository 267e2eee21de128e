//! Signed DHT values and their key descriptions.

use std::time::{SystemTime, UNIX_EPOCH};

use tonlite_crypto::{key_id_ed25519, verify_signature, Ed25519Keypair};
use tonlite_tl::{TlReader, TlWriter};

use crate::key::DhtKey;
use crate::{
    DhtError, DhtResult, DHT_KEY_DESCRIPTION, DHT_UPDATE_RULE_ANYBODY,
    DHT_UPDATE_RULE_OVERLAY_NODES, DHT_UPDATE_RULE_SIGNATURE, DHT_VALUE,
};
use tonlite_adnl::PUB_ED25519;

/// Who may overwrite a stored value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateRule {
    Signature,
    Anybody,
    OverlayNodes,
}

impl UpdateRule {
    pub fn constructor_id(self) -> u32 {
        match self {
            Self::Signature => DHT_UPDATE_RULE_SIGNATURE,
            Self::Anybody => DHT_UPDATE_RULE_ANYBODY,
            Self::OverlayNodes => DHT_UPDATE_RULE_OVERLAY_NODES,
        }
    }

    pub fn from_constructor_id(id: u32) -> DhtResult<Self> {
        match id {
            DHT_UPDATE_RULE_SIGNATURE => Ok(Self::Signature),
            DHT_UPDATE_RULE_ANYBODY => Ok(Self::Anybody),
            DHT_UPDATE_RULE_OVERLAY_NODES => Ok(Self::OverlayNodes),
            other => Err(DhtError::UnexpectedAnswer(other)),
        }
    }
}

/// `dht.keyDescription`: a key, its owner and the owner's signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DhtKeyDescription {
    pub key: DhtKey,
    pub public_key: [u8; 32],
    pub update_rule: UpdateRule,
    pub signature: Vec<u8>,
}

impl DhtKeyDescription {
    pub fn new(key: DhtKey, public_key: [u8; 32], update_rule: UpdateRule) -> Self {
        Self {
            key,
            public_key,
            update_rule,
            signature: Vec::new(),
        }
    }

    pub fn write_boxed(&self, w: &mut TlWriter) {
        w.write_id(DHT_KEY_DESCRIPTION);
        self.key.write_boxed(w);
        w.write_id(PUB_ED25519);
        w.write_int256(&self.public_key);
        w.write_id(self.update_rule.constructor_id());
        w.write_bytes(&self.signature);
    }

    pub fn read_boxed(r: &mut TlReader<'_>) -> DhtResult<Self> {
        let id = r.read_id()?;
        if id != DHT_KEY_DESCRIPTION {
            return Err(DhtError::UnexpectedAnswer(id));
        }
        let key = DhtKey::read_boxed(r)?;
        let key_type = r.read_id()?;
        if key_type != PUB_ED25519 {
            return Err(DhtError::InvalidKey(format!(
                "unsupported owner key type 0x{key_type:08x}"
            )));
        }
        let public_key = r.read_int256()?;
        let update_rule = UpdateRule::from_constructor_id(r.read_id()?)?;
        let signature = r.read_bytes()?;
        Ok(Self {
            key,
            public_key,
            update_rule,
            signature,
        })
    }

    fn unsigned_bytes(&self) -> Vec<u8> {
        let mut unsigned = self.clone();
        unsigned.signature = Vec::new();
        let mut w = TlWriter::new();
        unsigned.write_boxed(&mut w);
        w.into_bytes()
    }

    pub fn sign(&mut self, keypair: &Ed25519Keypair) {
        self.signature = keypair.sign(&self.unsigned_bytes()).to_vec();
    }

    /// Checks that the key belongs to its claimed owner and that the
    /// owner signed the description.
    pub fn verify(&self) -> DhtResult<()> {
        if self.key.id != key_id_ed25519(&self.public_key) {
            return Err(DhtError::InvalidKey(
                "key owner id does not match owner key".into(),
            ));
        }
        verify_signature(&self.public_key, &self.unsigned_bytes(), &self.signature)
            .map_err(|_| DhtError::SignatureRejected)
    }
}

/// `dht.value`: the payload, its expiry and the owner's signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DhtValue {
    pub key: DhtKeyDescription,
    pub value: Vec<u8>,
    pub ttl: i32,
    pub signature: Vec<u8>,
}

fn unix_now() -> i32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i32)
        .unwrap_or(0)
}

impl DhtValue {
    pub fn new(key: DhtKeyDescription, value: Vec<u8>, ttl: i32) -> Self {
        Self {
            key,
            value,
            ttl,
            signature: Vec::new(),
        }
    }

    pub fn write_boxed(&self, w: &mut TlWriter) {
        w.write_id(DHT_VALUE);
        self.key.write_boxed(w);
        w.write_bytes(&self.value);
        w.write_i32(self.ttl);
        w.write_bytes(&self.signature);
    }

    pub fn read_boxed(r: &mut TlReader<'_>) -> DhtResult<Self> {
        let id = r.read_id()?;
        if id != DHT_VALUE {
            return Err(DhtError::UnexpectedAnswer(id));
        }
        Ok(Self {
            key: DhtKeyDescription::read_boxed(r)?,
            value: r.read_bytes()?,
            ttl: r.read_i32()?,
            signature: r.read_bytes()?,
        })
    }

    fn unsigned_bytes(&self) -> Vec<u8> {
        let mut unsigned = self.clone();
        unsigned.signature = Vec::new();
        let mut w = TlWriter::new();
        unsigned.write_boxed(&mut w);
        w.into_bytes()
    }

    pub fn sign(&mut self, keypair: &Ed25519Keypair) {
        self.signature = keypair.sign(&self.unsigned_bytes()).to_vec();
    }

    pub fn is_expired(&self) -> bool {
        self.ttl < unix_now()
    }

    /// Full validation: key description, update rule, expiry.
    pub fn verify(&self) -> DhtResult<()> {
        self.key.verify()?;
        if self.is_expired() {
            return Err(DhtError::ValueExpired(self.ttl));
        }
        match self.key.update_rule {
            UpdateRule::Signature => {
                verify_signature(&self.key.public_key, &self.unsigned_bytes(), &self.signature)
                    .map_err(|_| DhtError::SignatureRejected)
            }
            UpdateRule::Anybody => Ok(()),
            // Per-node signatures inside the payload are an overlay
            // concern; the value itself carries no owner signature.
            UpdateRule::OverlayNodes => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signed_value(keypair: &Ed25519Keypair, ttl: i32) -> DhtValue {
        let key = DhtKey::for_address(keypair.public_key());
        let mut description =
            DhtKeyDescription::new(key, *keypair.public_key(), UpdateRule::Signature);
        description.sign(keypair);
        let mut value = DhtValue::new(description, b"addr payload".to_vec(), ttl);
        value.sign(keypair);
        value
    }

    #[test]
    fn sign_verify_and_roundtrip() {
        let keypair = Ed25519Keypair::generate();
        let value = signed_value(&keypair, unix_now() + 3600);
        value.verify().unwrap();

        let mut w = TlWriter::new();
        value.write_boxed(&mut w);
        let mut r = TlReader::new(w.as_bytes());
        let parsed = DhtValue::read_boxed(&mut r).unwrap();
        assert_eq!(parsed, value);
        parsed.verify().unwrap();
    }

    #[test]
    fn expired_value_rejected() {
        let keypair = Ed25519Keypair::generate();
        let value = signed_value(&keypair, unix_now() - 1);
        assert!(matches!(value.verify(), Err(DhtError::ValueExpired(_))));
    }

    #[test]
    fn tampered_payload_rejected() {
        let keypair = Ed25519Keypair::generate();
        let mut value = signed_value(&keypair, unix_now() + 3600);
        value.value = b"forged".to_vec();
        assert!(matches!(value.verify(), Err(DhtError::SignatureRejected)));
    }

    #[test]
    fn foreign_owner_rejected() {
        let keypair = Ed25519Keypair::generate();
        let other = Ed25519Keypair::generate();
        let mut value = signed_value(&keypair, unix_now() + 3600);
        // Claim another owner without recomputing the key id.
        value.key.public_key = *other.public_key();
        assert!(matches!(value.verify(), Err(DhtError::InvalidKey(_))));
    }

    #[test]
    fn anybody_rule_needs_no_signature() {
        let keypair = Ed25519Keypair::generate();
        let key = DhtKey::for_address(keypair.public_key());
        let mut description =
            DhtKeyDescription::new(key, *keypair.public_key(), UpdateRule::Anybody);
        description.sign(&keypair);
        let value = DhtValue::new(description, b"open".to_vec(), unix_now() + 60);
        value.verify().unwrap();
    }
}
