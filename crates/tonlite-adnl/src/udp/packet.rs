//! `adnl.packetContents` and the out-of-channel packet envelope.

use tonlite_crypto::aes_ctr::{checksum_matches, session_cipher};
use tonlite_crypto::{
    ecdh_ed25519, fill_random, key_id_ed25519, sha256, verify_signature, Ed25519Keypair,
};
use tonlite_tl::{TlReader, TlWriter};

use crate::udp::AdnlMessage;
use crate::{AdnlError, AdnlResult, ADNL_ADDRESS_UDP, ADNL_PACKET_CONTENTS, PUB_ED25519};

const FLAG_FROM: u32 = 1 << 0;
const FLAG_FROM_SHORT: u32 = 1 << 1;
const FLAG_MESSAGE: u32 = 1 << 2;
const FLAG_MESSAGES: u32 = 1 << 3;
const FLAG_ADDRESS: u32 = 1 << 4;
const FLAG_PRIORITY_ADDRESS: u32 = 1 << 5;
const FLAG_SEQNO: u32 = 1 << 6;
const FLAG_CONFIRM_SEQNO: u32 = 1 << 7;
const FLAG_RECV_ADDR_VERSION: u32 = 1 << 8;
const FLAG_RECV_PRIORITY_VERSION: u32 = 1 << 9;
// Covers both reinit_date and dst_reinit_date.
const FLAG_REINIT_DATES: u32 = 1 << 10;
const FLAG_SIGNATURE: u32 = 1 << 11;

/// `adnl.address.udp ip:int port:int = adnl.Address`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UdpAddress {
    pub ip: i32,
    pub port: i32,
}

impl UdpAddress {
    pub fn from_socket_addr(addr: std::net::SocketAddrV4) -> Self {
        Self {
            ip: i32::from_be_bytes(addr.ip().octets()),
            port: addr.port() as i32,
        }
    }
}

/// Bare `adnl.addressList`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddressList {
    pub addrs: Vec<UdpAddress>,
    pub version: i32,
    pub reinit_date: i32,
    pub priority: i32,
    pub expire_at: i32,
}

impl AddressList {
    fn write(&self, w: &mut TlWriter) {
        w.write_vector(&self.addrs, |w, addr| {
            w.write_id(ADNL_ADDRESS_UDP);
            w.write_i32(addr.ip);
            w.write_i32(addr.port);
        });
        w.write_i32(self.version);
        w.write_i32(self.reinit_date);
        w.write_i32(self.priority);
        w.write_i32(self.expire_at);
    }

    fn read(r: &mut TlReader<'_>) -> AdnlResult<Self> {
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
        Ok(Self {
            addrs,
            version: r.read_i32()?,
            reinit_date: r.read_i32()?,
            priority: r.read_i32()?,
            expire_at: r.read_i32()?,
        })
    }
}

/// `adnl.packetContents`. Field presence drives the flags word; the
/// reinit dates always travel together.
#[derive(Debug, Clone, Default)]
pub struct PacketContents {
    pub rand1: Vec<u8>,
    /// Sender's Ed25519 public key, boxed as `pub.ed25519` on the wire.
    pub from: Option<[u8; 32]>,
    pub from_short: Option<[u8; 32]>,
    pub message: Option<AdnlMessage>,
    pub messages: Option<Vec<AdnlMessage>>,
    pub address: Option<AddressList>,
    pub priority_address: Option<AddressList>,
    pub seqno: Option<i64>,
    pub confirm_seqno: Option<i64>,
    pub recv_addr_list_version: Option<i32>,
    pub recv_priority_addr_list_version: Option<i32>,
    pub reinit_date: Option<i32>,
    pub dst_reinit_date: Option<i32>,
    pub signature: Option<Vec<u8>>,
    pub rand2: Vec<u8>,
}

fn random_pad() -> Vec<u8> {
    // 7 or 15 bytes, as the reference node does.
    let mut buf = vec![0u8; if rand::random::<bool>() { 7 } else { 15 }];
    fill_random(&mut buf);
    buf
}

impl PacketContents {
    /// A packet skeleton with fresh padding.
    pub fn new() -> Self {
        Self {
            rand1: random_pad(),
            rand2: random_pad(),
            ..Self::default()
        }
    }

    /// All carried messages regardless of which slot they travelled in.
    pub fn into_messages(self) -> Vec<AdnlMessage> {
        match (self.message, self.messages) {
            (Some(single), None) => vec![single],
            (None, Some(many)) => many,
            (Some(single), Some(mut many)) => {
                many.insert(0, single);
                many
            }
            (None, None) => Vec::new(),
        }
    }

    fn flags(&self) -> u32 {
        let mut flags = 0;
        let mut set = |condition: bool, bit: u32| {
            if condition {
                flags |= bit;
            }
        };
        set(self.from.is_some(), FLAG_FROM);
        set(self.from_short.is_some(), FLAG_FROM_SHORT);
        set(self.message.is_some(), FLAG_MESSAGE);
        set(self.messages.is_some(), FLAG_MESSAGES);
        set(self.address.is_some(), FLAG_ADDRESS);
        set(self.priority_address.is_some(), FLAG_PRIORITY_ADDRESS);
        set(self.seqno.is_some(), FLAG_SEQNO);
        set(self.confirm_seqno.is_some(), FLAG_CONFIRM_SEQNO);
        set(self.recv_addr_list_version.is_some(), FLAG_RECV_ADDR_VERSION);
        set(
            self.recv_priority_addr_list_version.is_some(),
            FLAG_RECV_PRIORITY_VERSION,
        );
        set(self.reinit_date.is_some(), FLAG_REINIT_DATES);
        set(self.signature.is_some(), FLAG_SIGNATURE);
        flags
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut w = TlWriter::with_capacity(128);
        w.write_id(ADNL_PACKET_CONTENTS);
        w.write_bytes(&self.rand1);
        w.write_u32(self.flags());
        if let Some(from) = &self.from {
            w.write_id(PUB_ED25519);
            w.write_int256(from);
        }
        if let Some(short) = &self.from_short {
            w.write_int256(short);
        }
        if let Some(message) = &self.message {
            message.write(&mut w);
        }
        if let Some(messages) = &self.messages {
            w.write_vector(messages, |w, m| m.write(w));
        }
        if let Some(address) = &self.address {
            address.write(&mut w);
        }
        if let Some(address) = &self.priority_address {
            address.write(&mut w);
        }
        if let Some(seqno) = self.seqno {
            w.write_i64(seqno);
        }
        if let Some(confirm) = self.confirm_seqno {
            w.write_i64(confirm);
        }
        if let Some(version) = self.recv_addr_list_version {
            w.write_i32(version);
        }
        if let Some(version) = self.recv_priority_addr_list_version {
            w.write_i32(version);
        }
        if let Some(date) = self.reinit_date {
            w.write_i32(date);
            w.write_i32(self.dst_reinit_date.unwrap_or(0));
        }
        if let Some(signature) = &self.signature {
            w.write_bytes(signature);
        }
        w.write_bytes(&self.rand2);
        w.into_bytes()
    }

    pub fn parse(data: &[u8]) -> AdnlResult<Self> {
        let mut r = TlReader::new(data);
        let id = r.read_id()?;
        if id != ADNL_PACKET_CONTENTS {
            return Err(AdnlError::UnexpectedMessage(id));
        }
        let rand1 = r.read_bytes()?;
        let flags = r.read_u32()?;

        let from = if flags & FLAG_FROM != 0 {
            let key_id = r.read_id()?;
            if key_id != PUB_ED25519 {
                return Err(AdnlError::InvalidPacket(format!(
                    "unsupported sender key type 0x{key_id:08x}"
                )));
            }
            Some(r.read_int256()?)
        } else {
            None
        };
        let from_short = (flags & FLAG_FROM_SHORT != 0)
            .then(|| r.read_int256())
            .transpose()?;
        let message = if flags & FLAG_MESSAGE != 0 {
            Some(AdnlMessage::read(&mut r)?)
        } else {
            None
        };
        let messages = if flags & FLAG_MESSAGES != 0 {
            let count = r.read_u32()? as usize;
            let mut items = Vec::with_capacity(count.min(64));
            for _ in 0..count {
                items.push(AdnlMessage::read(&mut r)?);
            }
            Some(items)
        } else {
            None
        };
        let address = if flags & FLAG_ADDRESS != 0 {
            Some(AddressList::read(&mut r)?)
        } else {
            None
        };
        let priority_address = if flags & FLAG_PRIORITY_ADDRESS != 0 {
            Some(AddressList::read(&mut r)?)
        } else {
            None
        };
        let seqno = (flags & FLAG_SEQNO != 0).then(|| r.read_i64()).transpose()?;
        let confirm_seqno = (flags & FLAG_CONFIRM_SEQNO != 0)
            .then(|| r.read_i64())
            .transpose()?;
        let recv_addr_list_version = (flags & FLAG_RECV_ADDR_VERSION != 0)
            .then(|| r.read_i32())
            .transpose()?;
        let recv_priority_addr_list_version = (flags & FLAG_RECV_PRIORITY_VERSION != 0)
            .then(|| r.read_i32())
            .transpose()?;
        let (reinit_date, dst_reinit_date) = if flags & FLAG_REINIT_DATES != 0 {
            (Some(r.read_i32()?), Some(r.read_i32()?))
        } else {
            (None, None)
        };
        let signature = (flags & FLAG_SIGNATURE != 0)
            .then(|| r.read_bytes())
            .transpose()?;
        let rand2 = r.read_bytes()?;

        Ok(Self {
            rand1,
            from,
            from_short,
            message,
            messages,
            address,
            priority_address,
            seqno,
            confirm_seqno,
            recv_addr_list_version,
            recv_priority_addr_list_version,
            reinit_date,
            dst_reinit_date,
            signature,
            rand2,
        })
    }

    /// Signs the packet. The signature covers the serialization with the
    /// signature field absent and its flag bit clear.
    pub fn sign(&mut self, keypair: &Ed25519Keypair) {
        self.signature = None;
        let unsigned = self.serialize();
        self.signature = Some(keypair.sign(&unsigned).to_vec());
    }

    /// Verifies the signature against the sender's public key.
    pub fn verify(&self, public_key: &[u8; 32]) -> AdnlResult<()> {
        let signature = self.signature.as_ref().ok_or(AdnlError::SignatureRejected)?;
        let mut unsigned = self.clone();
        unsigned.signature = None;
        verify_signature(public_key, &unsigned.serialize(), signature)
            .map_err(|_| AdnlError::SignatureRejected)
    }
}

/// Wraps serialized packet contents into an out-of-channel datagram:
///
/// ```text
/// key_id(peer_pub)[32] || local_pub[32] || sha256(plaintext)[32] || ciphertext
/// ```
pub fn build_initial_packet(
    contents: &PacketContents,
    peer_public: &[u8; 32],
    local: &Ed25519Keypair,
) -> AdnlResult<Vec<u8>> {
    let plaintext = contents.serialize();
    let checksum = sha256(&plaintext);
    let shared = ecdh_ed25519(local.private_key(), peer_public)?;
    let ciphertext = session_cipher(&shared, &checksum).apply(&plaintext);

    let mut packet = Vec::with_capacity(96 + ciphertext.len());
    packet.extend_from_slice(&key_id_ed25519(peer_public));
    packet.extend_from_slice(local.public_key());
    packet.extend_from_slice(&checksum);
    packet.extend_from_slice(&ciphertext);
    Ok(packet)
}

/// Opens an out-of-channel datagram addressed to `local`. Returns the
/// sender's public key and the decoded contents.
pub fn parse_initial_packet(
    data: &[u8],
    local: &Ed25519Keypair,
) -> AdnlResult<([u8; 32], PacketContents)> {
    if data.len() < 96 {
        return Err(AdnlError::InvalidPacket(format!(
            "datagram of {} bytes is shorter than the envelope",
            data.len()
        )));
    }
    if data[..32] != key_id_ed25519(local.public_key()) {
        return Err(AdnlError::UnknownKeyId);
    }
    let mut sender_public = [0u8; 32];
    sender_public.copy_from_slice(&data[32..64]);
    let mut checksum = [0u8; 32];
    checksum.copy_from_slice(&data[64..96]);

    let shared = ecdh_ed25519(local.private_key(), &sender_public)?;
    let plaintext = session_cipher(&shared, &checksum).apply(&data[96..]);
    if !checksum_matches(&plaintext, &checksum) {
        return Err(AdnlError::ChecksumMismatch);
    }
    Ok((sender_public, PacketContents::parse(&plaintext)?))
}
