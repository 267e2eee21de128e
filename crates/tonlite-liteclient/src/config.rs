//! Global config: the JSON document that names liteservers and the
//! validator trust anchors.
//!
//! Hashes appear base64-encoded in published configs; hex is accepted
//! too since hand-written configs tend to use it.

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::path::Path;

use base64::Engine;
use serde::Deserialize;

use crate::types::{BlockIdExt, MASTERCHAIN, SHARD_FULL};
use crate::{LiteError, LiteResult};

#[derive(Debug, Clone, Deserialize)]
pub struct GlobalConfig {
    #[serde(default)]
    pub liteservers: Vec<LiteserverDesc>,
    pub validator: Option<ValidatorConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LiteserverDesc {
    /// IPv4 address as a signed 32-bit big-endian integer.
    pub ip: i32,
    pub port: u16,
    pub id: KeyDesc,
}

#[derive(Debug, Clone, Deserialize)]
pub struct KeyDesc {
    #[serde(rename = "@type")]
    pub key_type: String,
    pub key: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ValidatorConfig {
    pub init_block: Option<ConfigBlockId>,
    pub zero_state: Option<ConfigBlockId>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConfigBlockId {
    pub workchain: i32,
    pub shard: i64,
    pub seqno: u32,
    pub root_hash: String,
    pub file_hash: String,
}

fn decode_hash(s: &str) -> LiteResult<[u8; 32]> {
    // A 64-digit hex hash is also valid base64 (of 48 bytes), so base64
    // only wins when it yields the right length.
    let decoded = base64::engine::general_purpose::STANDARD
        .decode(s)
        .ok()
        .filter(|bytes| bytes.len() == 32);
    let bytes = match decoded {
        Some(bytes) => bytes,
        None => {
            hex::decode(s).map_err(|_| LiteError::Config(format!("undecodable hash {s:?}")))?
        }
    };
    bytes
        .try_into()
        .map_err(|_| LiteError::Config(format!("hash {s:?} is not 32 bytes")))
}

impl ConfigBlockId {
    pub fn to_block_id_ext(&self) -> LiteResult<BlockIdExt> {
        Ok(BlockIdExt::new(
            self.workchain,
            self.shard,
            self.seqno,
            decode_hash(&self.root_hash)?,
            decode_hash(&self.file_hash)?,
        ))
    }
}

impl LiteserverDesc {
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::V4(SocketAddrV4::new(
            Ipv4Addr::from((self.ip as u32).to_be_bytes()),
            self.port,
        ))
    }

    pub fn public_key(&self) -> LiteResult<[u8; 32]> {
        if self.id.key_type != "pub.ed25519" {
            return Err(LiteError::Config(format!(
                "unsupported liteserver key type {:?}",
                self.id.key_type
            )));
        }
        decode_hash(&self.id.key)
    }
}

impl GlobalConfig {
    pub fn from_json(json: &str) -> LiteResult<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| LiteError::Config(e.to_string()))?;
        if config.liteservers.is_empty() {
            return Err(LiteError::Config("no liteservers in config".into()));
        }
        Ok(config)
    }

    pub fn from_file(path: &Path) -> LiteResult<Self> {
        Self::from_json(&std::fs::read_to_string(path)?)
    }

    /// The configured init block, if the validator section names one.
    pub fn init_block(&self) -> LiteResult<Option<BlockIdExt>> {
        match self.validator.as_ref().and_then(|v| v.init_block.as_ref()) {
            Some(block) => Ok(Some(block.to_block_id_ext()?)),
            None => Ok(None),
        }
    }

    /// The zero state, used as an overlay-id seed.
    pub fn zero_state(&self) -> LiteResult<Option<BlockIdExt>> {
        match self.validator.as_ref().and_then(|v| v.zero_state.as_ref()) {
            Some(block) => Ok(Some(block.to_block_id_ext()?)),
            None => Ok(None),
        }
    }
}

/// Key blocks trusted without user input. Two mainnet anchors and one
/// testnet anchor, updated with releases.
const TRUSTED_ANCHORS: &[(u32, &str, &str)] = &[
    (
        27747086,
        "11d9aee0d266bcb0df3a852f5db9c32abbcec31b80afe49d7b6a6b6b16a5f80e",
        "fb6e1bbe8ab6d663c6e8456def38a4b7e28473ff2b6197ac9e6bcdbbc3d4cdb1",
    ),
    (
        34835953,
        "9b1e2f07c3b0f9e05efd6aafd64dba4ed25f9d1e1e1e4a9f8c2f1a00353ba2a4",
        "6f193db2cc2c7f22c33e2f3eb9df29c1c1e77c15a6df07e2c79c5dd9a1a2cd46",
    ),
];

const TRUSTED_ANCHORS_TESTNET: &[(u32, &str, &str)] = &[(
    27413673,
    "55b92cc14e4cb51f685f1fa2ba451a0dcd2c20f9e84d2e4c0fa1f199618d3cc1",
    "0c3d6d6cf8a43abf3a3f48041d1cae93cbcf2d2b43aa7b0e00bd1af19099b3ea",
)];

fn anchors(table: &[(u32, &str, &str)]) -> Vec<BlockIdExt> {
    table
        .iter()
        .map(|(seqno, root, file)| {
            let mut root_hash = [0u8; 32];
            let mut file_hash = [0u8; 32];
            // Table entries are compile-time constants of the right length.
            if let (Ok(r), Ok(f)) = (hex::decode(root), hex::decode(file)) {
                root_hash.copy_from_slice(&r);
                file_hash.copy_from_slice(&f);
            }
            BlockIdExt::new(MASTERCHAIN, SHARD_FULL, *seqno, root_hash, file_hash)
        })
        .collect()
}

/// Pre-shipped mainnet trust anchors.
pub fn trusted_anchors() -> Vec<BlockIdExt> {
    anchors(TRUSTED_ANCHORS)
}

/// Pre-shipped testnet trust anchors.
pub fn trusted_anchors_testnet() -> Vec<BlockIdExt> {
    anchors(TRUSTED_ANCHORS_TESTNET)
}

/// True if the block is trusted without a proof chain: a pre-shipped
/// anchor on either network.
pub fn is_trusted_anchor(block: &BlockIdExt) -> bool {
    trusted_anchors().contains(block) || trusted_anchors_testnet().contains(block)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "liteservers": [
            {
                "ip": 2130706433,
                "port": 4924,
                "id": {
                    "@type": "pub.ed25519",
                    "key": "n4VDnSCUuSpjnCyUk9e3QOOd6o0ItSWYbTnW3Wnn8wk="
                }
            }
        ],
        "validator": {
            "@type": "validator.config.global",
            "init_block": {
                "workchain": -1,
                "shard": -9223372036854775808,
                "seqno": 17908219,
                "root_hash": "y0lGLOIH8u8rFC0/8eCp60GGW8H+PiCJRp4qsW1+wwM=",
                "file_hash": "BpsQqUMUyCUgmpVRnxGyvLZrXKZPnLJAQhhqXdD21XE="
            },
            "zero_state": {
                "workchain": -1,
                "shard": -9223372036854775808,
                "seqno": 0,
                "root_hash": "F6OpKZKqvqeFp6CQmFomXNMfMj2EnaUSOXN+Mh+wVWk=",
                "file_hash": "XplPz01CXAps5qeSWUtxcyBfdAo5zVb1N979KLSKD24="
            }
        }
    }"#;

    #[test]
    fn parse_sample_config() {
        let config = GlobalConfig::from_json(SAMPLE).unwrap();
        assert_eq!(config.liteservers.len(), 1);

        let ls = &config.liteservers[0];
        assert_eq!(ls.socket_addr(), "127.0.0.1:4924".parse().unwrap());
        assert_eq!(ls.public_key().unwrap().len(), 32);

        let init = config.init_block().unwrap().unwrap();
        assert_eq!(init.workchain, -1);
        assert_eq!(init.seqno, 17908219);

        let zero = config.zero_state().unwrap().unwrap();
        assert_eq!(zero.seqno, 0);
    }

    #[test]
    fn hex_hashes_accepted() {
        let block = ConfigBlockId {
            workchain: -1,
            shard: SHARD_FULL,
            seqno: 1,
            root_hash: "aa".repeat(32),
            file_hash: "bb".repeat(32),
        };
        let id = block.to_block_id_ext().unwrap();
        assert_eq!(id.root_hash, [0xaa; 32]);
        assert_eq!(id.file_hash, [0xbb; 32]);
    }

    #[test]
    fn bad_hash_rejected() {
        let block = ConfigBlockId {
            workchain: -1,
            shard: SHARD_FULL,
            seqno: 1,
            root_hash: "tooshort".into(),
            file_hash: "bb".repeat(32),
        };
        assert!(matches!(
            block.to_block_id_ext(),
            Err(LiteError::Config(_))
        ));
    }

    #[test]
    fn empty_liteserver_list_rejected() {
        assert!(matches!(
            GlobalConfig::from_json(r#"{"liteservers": []}"#),
            Err(LiteError::Config(_))
        ));
    }

    #[test]
    fn shipped_anchors_decode() {
        let mainnet = trusted_anchors();
        assert_eq!(mainnet.len(), 2);
        assert!(mainnet.iter().all(|b| b.is_masterchain()));
        assert!(is_trusted_anchor(&mainnet[0]));
        assert_eq!(trusted_anchors_testnet().len(), 1);
    }
}
