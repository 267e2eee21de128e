//! Typed liteserver messages.
//!
//! Everything here is the bare TL form: the constructor id of the
//! enclosing message is read and written by the caller (`client.rs`),
//! fields follow in declaration order. The only boxed values are the
//! proof-link steps, whose variant is picked by id.

use std::fmt;

use tonlite_tl::{TlReader, TlWriter};

use crate::{
    LiteError, LiteResult, BLOCK_LINK_BACK, BLOCK_LINK_FORWARD, SIGNATURE, SIGNATURE_SET,
};

/// `tonNode.blockId`: a block position without hashes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockId {
    pub workchain: i32,
    pub shard: i64,
    pub seqno: u32,
}

/// The full masterchain shard prefix.
pub const SHARD_FULL: i64 = i64::MIN;

/// The masterchain workchain id.
pub const MASTERCHAIN: i32 = -1;

impl BlockId {
    pub fn new(workchain: i32, shard: i64, seqno: u32) -> Self {
        Self {
            workchain,
            shard,
            seqno,
        }
    }

    pub fn masterchain(seqno: u32) -> Self {
        Self::new(MASTERCHAIN, SHARD_FULL, seqno)
    }

    pub fn write(&self, w: &mut TlWriter) {
        w.write_i32(self.workchain);
        w.write_i64(self.shard);
        w.write_u32(self.seqno);
    }

    pub fn read(r: &mut TlReader<'_>) -> LiteResult<Self> {
        Ok(Self {
            workchain: r.read_i32()?,
            shard: r.read_i64()?,
            seqno: r.read_u32()?,
        })
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{:016x},{})", self.workchain, self.shard as u64, self.seqno)
    }
}

/// `tonNode.blockIdExt`: a block position plus both identifying hashes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockIdExt {
    pub workchain: i32,
    pub shard: i64,
    pub seqno: u32,
    pub root_hash: [u8; 32],
    pub file_hash: [u8; 32],
}

impl BlockIdExt {
    pub fn new(
        workchain: i32,
        shard: i64,
        seqno: u32,
        root_hash: [u8; 32],
        file_hash: [u8; 32],
    ) -> Self {
        Self {
            workchain,
            shard,
            seqno,
            root_hash,
            file_hash,
        }
    }

    pub fn to_block_id(&self) -> BlockId {
        BlockId::new(self.workchain, self.shard, self.seqno)
    }

    pub fn is_masterchain(&self) -> bool {
        self.workchain == MASTERCHAIN
    }

    pub fn write(&self, w: &mut TlWriter) {
        w.write_i32(self.workchain);
        w.write_i64(self.shard);
        w.write_u32(self.seqno);
        w.write_int256(&self.root_hash);
        w.write_int256(&self.file_hash);
    }

    pub fn read(r: &mut TlReader<'_>) -> LiteResult<Self> {
        Ok(Self {
            workchain: r.read_i32()?,
            shard: r.read_i64()?,
            seqno: r.read_u32()?,
            root_hash: r.read_int256()?,
            file_hash: r.read_int256()?,
        })
    }
}

impl fmt::Display for BlockIdExt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({},{:016x},{}):{}",
            self.workchain,
            self.shard as u64,
            self.seqno,
            hex::encode(self.root_hash)
        )
    }
}

/// `tonNode.zeroStateIdExt`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZeroStateIdExt {
    pub workchain: i32,
    pub root_hash: [u8; 32],
    pub file_hash: [u8; 32],
}

impl ZeroStateIdExt {
    pub fn read(r: &mut TlReader<'_>) -> LiteResult<Self> {
        Ok(Self {
            workchain: r.read_i32()?,
            root_hash: r.read_int256()?,
            file_hash: r.read_int256()?,
        })
    }
}

/// `liteServer.accountId`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccountId {
    pub workchain: i32,
    pub id: [u8; 32],
}

impl AccountId {
    pub fn new(workchain: i32, id: [u8; 32]) -> Self {
        Self { workchain, id }
    }

    pub fn write(&self, w: &mut TlWriter) {
        w.write_i32(self.workchain);
        w.write_int256(&self.id);
    }
}

impl From<&tonlite_cell::Address> for AccountId {
    fn from(addr: &tonlite_cell::Address) -> Self {
        Self::new(addr.workchain, addr.hash)
    }
}

/// `liteServer.masterchainInfo`.
#[derive(Debug, Clone)]
pub struct MasterchainInfo {
    pub last: BlockIdExt,
    pub state_root_hash: [u8; 32],
    pub init: ZeroStateIdExt,
}

impl MasterchainInfo {
    pub fn read(r: &mut TlReader<'_>) -> LiteResult<Self> {
        Ok(Self {
            last: BlockIdExt::read(r)?,
            state_root_hash: r.read_int256()?,
            init: ZeroStateIdExt::read(r)?,
        })
    }
}

/// `liteServer.masterchainInfoExt`.
#[derive(Debug, Clone)]
pub struct MasterchainInfoExt {
    pub mode: u32,
    pub version: i32,
    pub capabilities: i64,
    pub last: BlockIdExt,
    pub last_utime: i32,
    pub now: i32,
    pub state_root_hash: [u8; 32],
    pub init: ZeroStateIdExt,
}

impl MasterchainInfoExt {
    pub fn read(r: &mut TlReader<'_>) -> LiteResult<Self> {
        Ok(Self {
            mode: r.read_u32()?,
            version: r.read_i32()?,
            capabilities: r.read_i64()?,
            last: BlockIdExt::read(r)?,
            last_utime: r.read_i32()?,
            now: r.read_i32()?,
            state_root_hash: r.read_int256()?,
            init: ZeroStateIdExt::read(r)?,
        })
    }
}

/// `liteServer.version`.
#[derive(Debug, Clone, Copy)]
pub struct ServerVersion {
    pub mode: u32,
    pub version: i32,
    pub capabilities: i64,
    pub now: i32,
}

impl ServerVersion {
    pub fn read(r: &mut TlReader<'_>) -> LiteResult<Self> {
        Ok(Self {
            mode: r.read_u32()?,
            version: r.read_i32()?,
            capabilities: r.read_i64()?,
            now: r.read_i32()?,
        })
    }
}

/// `liteServer.blockData`.
#[derive(Debug, Clone)]
pub struct BlockData {
    pub id: BlockIdExt,
    pub data: Vec<u8>,
}

impl BlockData {
    pub fn read(r: &mut TlReader<'_>) -> LiteResult<Self> {
        Ok(Self {
            id: BlockIdExt::read(r)?,
            data: r.read_bytes()?,
        })
    }
}

/// `liteServer.blockHeader`.
#[derive(Debug, Clone)]
pub struct BlockHeader {
    pub id: BlockIdExt,
    pub mode: u32,
    pub header_proof: Vec<u8>,
}

impl BlockHeader {
    pub fn read(r: &mut TlReader<'_>) -> LiteResult<Self> {
        Ok(Self {
            id: BlockIdExt::read(r)?,
            mode: r.read_u32()?,
            header_proof: r.read_bytes()?,
        })
    }
}

/// `liteServer.sendMsgStatus`.
#[derive(Debug, Clone, Copy)]
pub struct SendMsgStatus {
    pub status: i32,
}

impl SendMsgStatus {
    pub fn read(r: &mut TlReader<'_>) -> LiteResult<Self> {
        Ok(Self {
            status: r.read_i32()?,
        })
    }

    pub fn is_success(&self) -> bool {
        self.status == 1
    }
}

/// `liteServer.accountState`.
#[derive(Debug, Clone)]
pub struct AccountState {
    pub id: BlockIdExt,
    pub shardblk: BlockIdExt,
    pub shard_proof: Vec<u8>,
    pub proof: Vec<u8>,
    pub state: Vec<u8>,
}

impl AccountState {
    pub fn read(r: &mut TlReader<'_>) -> LiteResult<Self> {
        Ok(Self {
            id: BlockIdExt::read(r)?,
            shardblk: BlockIdExt::read(r)?,
            shard_proof: r.read_bytes()?,
            proof: r.read_bytes()?,
            state: r.read_bytes()?,
        })
    }

    /// An empty `state` means the account does not exist at that block.
    pub fn exists(&self) -> bool {
        !self.state.is_empty()
    }
}

fn read_mode_bytes(r: &mut TlReader<'_>, mode: u32, bit: u32) -> LiteResult<Option<Vec<u8>>> {
    if mode & 1 << bit != 0 {
        Ok(Some(r.read_bytes()?))
    } else {
        Ok(None)
    }
}

/// `liteServer.runMethodResult`.
#[derive(Debug, Clone)]
pub struct RunMethodResult {
    pub mode: u32,
    pub id: BlockIdExt,
    pub shardblk: BlockIdExt,
    pub shard_proof: Option<Vec<u8>>,
    pub proof: Option<Vec<u8>>,
    pub state_proof: Option<Vec<u8>>,
    pub init_c7: Option<Vec<u8>>,
    pub lib_extras: Option<Vec<u8>>,
    pub exit_code: i32,
    pub result: Option<Vec<u8>>,
}

impl RunMethodResult {
    pub fn read(r: &mut TlReader<'_>) -> LiteResult<Self> {
        let mode = r.read_u32()?;
        let id = BlockIdExt::read(r)?;
        let shardblk = BlockIdExt::read(r)?;
        let shard_proof = read_mode_bytes(r, mode, 0)?;
        let proof = read_mode_bytes(r, mode, 0)?;
        let state_proof = read_mode_bytes(r, mode, 1)?;
        let init_c7 = read_mode_bytes(r, mode, 3)?;
        let lib_extras = read_mode_bytes(r, mode, 4)?;
        let exit_code = r.read_i32()?;
        let result = read_mode_bytes(r, mode, 2)?;
        Ok(Self {
            mode,
            id,
            shardblk,
            shard_proof,
            proof,
            state_proof,
            init_c7,
            lib_extras,
            exit_code,
            result,
        })
    }

    pub fn is_success(&self) -> bool {
        self.exit_code == 0
    }
}

/// `liteServer.shardInfo`.
#[derive(Debug, Clone)]
pub struct ShardInfo {
    pub id: BlockIdExt,
    pub shardblk: BlockIdExt,
    pub shard_proof: Vec<u8>,
    pub shard_descr: Vec<u8>,
}

impl ShardInfo {
    pub fn read(r: &mut TlReader<'_>) -> LiteResult<Self> {
        Ok(Self {
            id: BlockIdExt::read(r)?,
            shardblk: BlockIdExt::read(r)?,
            shard_proof: r.read_bytes()?,
            shard_descr: r.read_bytes()?,
        })
    }
}

/// `liteServer.allShardsInfo`.
#[derive(Debug, Clone)]
pub struct AllShardsInfo {
    pub id: BlockIdExt,
    pub proof: Vec<u8>,
    pub data: Vec<u8>,
}

impl AllShardsInfo {
    pub fn read(r: &mut TlReader<'_>) -> LiteResult<Self> {
        Ok(Self {
            id: BlockIdExt::read(r)?,
            proof: r.read_bytes()?,
            data: r.read_bytes()?,
        })
    }
}

/// `liteServer.transactionInfo`.
#[derive(Debug, Clone)]
pub struct TransactionInfo {
    pub id: BlockIdExt,
    pub proof: Vec<u8>,
    pub transaction: Vec<u8>,
}

impl TransactionInfo {
    pub fn read(r: &mut TlReader<'_>) -> LiteResult<Self> {
        Ok(Self {
            id: BlockIdExt::read(r)?,
            proof: r.read_bytes()?,
            transaction: r.read_bytes()?,
        })
    }
}

/// `liteServer.transactionList`.
#[derive(Debug, Clone)]
pub struct TransactionList {
    pub ids: Vec<BlockIdExt>,
    pub transactions: Vec<u8>,
}

impl TransactionList {
    pub fn read(r: &mut TlReader<'_>) -> LiteResult<Self> {
        let count = r.read_u32()? as usize;
        let mut ids = Vec::with_capacity(count.min(1024));
        for _ in 0..count {
            ids.push(BlockIdExt::read(r)?);
        }
        Ok(Self {
            ids,
            transactions: r.read_bytes()?,
        })
    }
}

/// `liteServer.transactionId`: a partially filled transaction reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransactionId {
    pub mode: u32,
    pub account: Option<[u8; 32]>,
    pub lt: Option<i64>,
    pub hash: Option<[u8; 32]>,
}

impl TransactionId {
    pub fn read(r: &mut TlReader<'_>) -> LiteResult<Self> {
        let mode = r.read_u32()?;
        let account = if mode & 1 != 0 {
            Some(r.read_int256()?)
        } else {
            None
        };
        let lt = if mode & 2 != 0 { Some(r.read_i64()?) } else { None };
        let hash = if mode & 4 != 0 {
            Some(r.read_int256()?)
        } else {
            None
        };
        Ok(Self {
            mode,
            account,
            lt,
            hash,
        })
    }
}

/// `liteServer.transactionId3`: the cursor form used by list queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransactionId3 {
    pub account: [u8; 32],
    pub lt: i64,
}

impl TransactionId3 {
    pub fn write(&self, w: &mut TlWriter) {
        w.write_int256(&self.account);
        w.write_i64(self.lt);
    }
}

/// `liteServer.blockTransactions`.
#[derive(Debug, Clone)]
pub struct BlockTransactions {
    pub id: BlockIdExt,
    pub req_count: u32,
    pub incomplete: bool,
    pub ids: Vec<TransactionId>,
    pub proof: Vec<u8>,
}

impl BlockTransactions {
    pub fn read(r: &mut TlReader<'_>) -> LiteResult<Self> {
        let id = BlockIdExt::read(r)?;
        let req_count = r.read_u32()?;
        let incomplete = r.read_bool()?;
        let count = r.read_u32()? as usize;
        let mut ids = Vec::with_capacity(count.min(1024));
        for _ in 0..count {
            ids.push(TransactionId::read(r)?);
        }
        Ok(Self {
            id,
            req_count,
            incomplete,
            ids,
            proof: r.read_bytes()?,
        })
    }
}

/// `liteServer.blockTransactionsExt`: same listing but with full
/// transaction bodies instead of ids.
#[derive(Debug, Clone)]
pub struct BlockTransactionsExt {
    pub id: BlockIdExt,
    pub req_count: u32,
    pub incomplete: bool,
    pub transactions: Vec<u8>,
    pub proof: Vec<u8>,
}

impl BlockTransactionsExt {
    pub fn read(r: &mut TlReader<'_>) -> LiteResult<Self> {
        Ok(Self {
            id: BlockIdExt::read(r)?,
            req_count: r.read_u32()?,
            incomplete: r.read_bool()?,
            transactions: r.read_bytes()?,
            proof: r.read_bytes()?,
        })
    }
}

/// `liteServer.signature`: one validator's signature over a block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockSignature {
    pub node_id_short: [u8; 32],
    pub signature: Vec<u8>,
}

impl BlockSignature {
    pub fn read(r: &mut TlReader<'_>) -> LiteResult<Self> {
        let id = r.read_id()?;
        if id != SIGNATURE {
            return Err(LiteError::UnexpectedAnswer(id));
        }
        Ok(Self {
            node_id_short: r.read_int256()?,
            signature: r.read_bytes()?,
        })
    }
}

/// `liteServer.signatureSet`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureSet {
    pub validator_set_hash: i32,
    pub catchain_seqno: i32,
    pub signatures: Vec<BlockSignature>,
}

impl SignatureSet {
    pub fn read(r: &mut TlReader<'_>) -> LiteResult<Self> {
        let id = r.read_id()?;
        if id != SIGNATURE_SET {
            return Err(LiteError::UnexpectedAnswer(id));
        }
        let validator_set_hash = r.read_i32()?;
        let catchain_seqno = r.read_i32()?;
        let count = r.read_u32()? as usize;
        let mut signatures = Vec::with_capacity(count.min(1024));
        for _ in 0..count {
            signatures.push(BlockSignature::read(r)?);
        }
        Ok(Self {
            validator_set_hash,
            catchain_seqno,
            signatures,
        })
    }
}

/// One step of a masterchain proof chain.
#[derive(Debug, Clone)]
pub enum BlockLink {
    /// `liteServer.blockLinkBack`: walks to an earlier block through the
    /// source block's state.
    Back {
        to_key_block: bool,
        from: BlockIdExt,
        to: BlockIdExt,
        dest_proof: Vec<u8>,
        proof: Vec<u8>,
        state_proof: Vec<u8>,
    },
    /// `liteServer.blockLinkForward`: walks to a later block, justified
    /// by validator signatures under the source block's config.
    Forward {
        to_key_block: bool,
        from: BlockIdExt,
        to: BlockIdExt,
        dest_proof: Vec<u8>,
        config_proof: Vec<u8>,
        signatures: SignatureSet,
    },
}

impl BlockLink {
    pub fn read(r: &mut TlReader<'_>) -> LiteResult<Self> {
        let id = r.read_id()?;
        match id {
            BLOCK_LINK_BACK => Ok(Self::Back {
                to_key_block: r.read_bool()?,
                from: BlockIdExt::read(r)?,
                to: BlockIdExt::read(r)?,
                dest_proof: r.read_bytes()?,
                proof: r.read_bytes()?,
                state_proof: r.read_bytes()?,
            }),
            BLOCK_LINK_FORWARD => Ok(Self::Forward {
                to_key_block: r.read_bool()?,
                from: BlockIdExt::read(r)?,
                to: BlockIdExt::read(r)?,
                dest_proof: r.read_bytes()?,
                config_proof: r.read_bytes()?,
                signatures: SignatureSet::read(r)?,
            }),
            other => Err(LiteError::UnexpectedAnswer(other)),
        }
    }

    pub fn from_id(&self) -> &BlockIdExt {
        match self {
            Self::Back { from, .. } | Self::Forward { from, .. } => from,
        }
    }

    pub fn to_id(&self) -> &BlockIdExt {
        match self {
            Self::Back { to, .. } | Self::Forward { to, .. } => to,
        }
    }

    pub fn to_key_block(&self) -> bool {
        match self {
            Self::Back { to_key_block, .. } | Self::Forward { to_key_block, .. } => *to_key_block,
        }
    }
}

/// `liteServer.partialBlockProof`.
#[derive(Debug, Clone)]
pub struct PartialBlockProof {
    pub complete: bool,
    pub from: BlockIdExt,
    pub to: BlockIdExt,
    pub steps: Vec<BlockLink>,
}

impl PartialBlockProof {
    pub fn read(r: &mut TlReader<'_>) -> LiteResult<Self> {
        let complete = r.read_bool()?;
        let from = BlockIdExt::read(r)?;
        let to = BlockIdExt::read(r)?;
        let count = r.read_u32()? as usize;
        let mut steps = Vec::with_capacity(count.min(1024));
        for _ in 0..count {
            steps.push(BlockLink::read(r)?);
        }
        Ok(Self {
            complete,
            from,
            to,
            steps,
        })
    }
}

/// `liteServer.configInfo`.
#[derive(Debug, Clone)]
pub struct ConfigInfo {
    pub mode: u32,
    pub id: BlockIdExt,
    pub state_proof: Vec<u8>,
    pub config_proof: Vec<u8>,
}

impl ConfigInfo {
    pub fn read(r: &mut TlReader<'_>) -> LiteResult<Self> {
        Ok(Self {
            mode: r.read_u32()?,
            id: BlockIdExt::read(r)?,
            state_proof: r.read_bytes()?,
            config_proof: r.read_bytes()?,
        })
    }
}

/// `liteServer.libraryEntry`.
#[derive(Debug, Clone)]
pub struct LibraryEntry {
    pub hash: [u8; 32],
    pub data: Vec<u8>,
}

/// `liteServer.libraryResult`.
#[derive(Debug, Clone)]
pub struct LibraryResult {
    pub result: Vec<LibraryEntry>,
}

impl LibraryResult {
    pub fn read(r: &mut TlReader<'_>) -> LiteResult<Self> {
        let count = r.read_u32()? as usize;
        let mut result = Vec::with_capacity(count.min(1024));
        for _ in 0..count {
            let id = r.read_id()?;
            if id != crate::LIBRARY_ENTRY {
                return Err(LiteError::UnexpectedAnswer(id));
            }
            result.push(LibraryEntry {
                hash: r.read_int256()?,
                data: r.read_bytes()?,
            });
        }
        Ok(Self { result })
    }
}
