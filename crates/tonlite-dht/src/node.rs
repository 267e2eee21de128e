//! Signed DHT node descriptors.

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

use tonlite_adnl::udp::{AddressList, UdpAddress};
use tonlite_adnl::{ADNL_ADDRESS_UDP, PUB_ED25519};
use tonlite_crypto::{key_id_ed25519, verify_signature, Ed25519Keypair};
use tonlite_tl::{TlReader, TlWriter};

use crate::{DhtError, DhtResult, DHT_NODE};

/// `dht.node`: an identity, its advertised addresses and a self-signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DhtNode {
    pub public_key: [u8; 32],
    pub addr_list: AddressList,
    pub version: i32,
    pub signature: Vec<u8>,
}

impl DhtNode {
    pub fn new(public_key: [u8; 32], addr_list: AddressList, version: i32) -> Self {
        Self {
            public_key,
            addr_list,
            version,
            signature: Vec::new(),
        }
    }

    pub fn key_id(&self) -> [u8; 32] {
        key_id_ed25519(&self.public_key)
    }

    /// The first usable UDP address, if any.
    pub fn socket_addr(&self) -> Option<SocketAddr> {
        self.addr_list.addrs.first().map(|addr| {
            SocketAddr::V4(SocketAddrV4::new(
                Ipv4Addr::from((addr.ip as u32).to_be_bytes()),
                addr.port as u16,
            ))
        })
    }

    pub fn write_boxed(&self, w: &mut TlWriter) {
        w.write_id(DHT_NODE);
        w.write_id(PUB_ED25519);
        w.write_int256(&self.public_key);
        write_address_list(w, &self.addr_list);
        w.write_i32(self.version);
        w.write_bytes(&self.signature);
    }

    pub fn read_boxed(r: &mut TlReader<'_>) -> DhtResult<Self> {
        let id = r.read_id()?;
        if id != DHT_NODE {
            return Err(DhtError::UnexpectedAnswer(id));
        }
        let key_type = r.read_id()?;
        if key_type != PUB_ED25519 {
            return Err(DhtError::InvalidNode(format!(
                "unsupported node key type 0x{key_type:08x}"
            )));
        }
        Ok(Self {
            public_key: r.read_int256()?,
            addr_list: read_address_list(r)?,
            version: r.read_i32()?,
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

    /// Signs the descriptor with its own identity key.
    pub fn sign(&mut self, keypair: &Ed25519Keypair) {
        self.signature = keypair.sign(&self.unsigned_bytes()).to_vec();
    }

    /// Checks the self-signature. Unsigned descriptors are rejected.
    pub fn verify(&self) -> DhtResult<()> {
        verify_signature(&self.public_key, &self.unsigned_bytes(), &self.signature)
            .map_err(|_| DhtError::SignatureRejected)
    }
}

pub(crate) fn write_address_list(w: &mut TlWriter, list: &AddressList) {
    w.write_vector(&list.addrs, |w, addr| {
        w.write_id(ADNL_ADDRESS_UDP);
        w.write_i32(addr.ip);
        w.write_i32(addr.port);
    });
    w.write_i32(list.version);
    w.write_i32(list.reinit_date);
    w.write_i32(list.priority);
    w.write_i32(list.expire_at);
}

pub(crate) fn read_address_list(r: &mut TlReader<'_>) -> DhtResult<AddressList> {
    let addrs = r.read_vector(|r| {
        let id = r.read_id()?;
        if id != ADNL_ADDRESS_UDP {
            return Err(tonlite_tl::TlError::UnexpectedConstructor(id));
        }
        Ok(UdpAddress {
            ip: r.read_i32()?,
            port: r.read_i32()?,
        })
    })?;
    Ok(AddressList {
        addrs,
        version: r.read_i32()?,
        reinit_date: r.read_i32()?,
        priority: r.read_i32()?,
        expire_at: r.read_i32()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_node(keypair: &Ed25519Keypair) -> DhtNode {
        let mut node = DhtNode::new(
            *keypair.public_key(),
            AddressList {
                addrs: vec![UdpAddress {
                    ip: 0x7f00_0001,
                    port: 30310,
                }],
                version: 1_700_000_000,
                reinit_date: 1_700_000_000,
                priority: 0,
                expire_at: 0,
            },
            1_700_000_000,
        );
        node.sign(keypair);
        node
    }

    #[test]
    fn sign_verify_and_roundtrip() {
        let keypair = Ed25519Keypair::generate();
        let node = sample_node(&keypair);
        node.verify().unwrap();

        let mut w = TlWriter::new();
        node.write_boxed(&mut w);
        let mut r = TlReader::new(w.as_bytes());
        let parsed = DhtNode::read_boxed(&mut r).unwrap();
        assert_eq!(parsed, node);
        parsed.verify().unwrap();
    }

    #[test]
    fn tampered_node_rejected() {
        let keypair = Ed25519Keypair::generate();
        let mut node = sample_node(&keypair);
        node.version += 1;
        assert!(matches!(node.verify(), Err(DhtError::SignatureRejected)));
    }

    #[test]
    fn socket_addr_from_be_ip() {
        let keypair = Ed25519Keypair::generate();
        let node = sample_node(&keypair);
        assert_eq!(
            node.socket_addr().unwrap(),
            "127.0.0.1:30310".parse::<SocketAddr>().unwrap()
        );
    }
}
