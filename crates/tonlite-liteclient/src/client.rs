//! The typed liteserver client.
//!
//! One [`LiteClient`] owns one ADNL TCP session. Every operation writes
//! its TL request, wraps it in `liteServer.query`, and decodes the
//! typed answer; when the trust level asks for it, the answer's Merkle
//! proofs are checked before anything is returned. A background task
//! follows the masterchain head with `waitMasterchainSeqno`.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, trace};

use tonlite_adnl::{AdnlError, AdnlTcpClient, TcpClientConfig};
use tonlite_cell::{BagOfCells, Cell, CellType};
use tonlite_crypto::method_id;
use tonlite_tl::{TlReader, TlWriter};

use crate::proof;
use crate::tlb::{self, ShardDescr};
use crate::types::*;
use crate::vm::{self, StackEntry};
use crate::{
    LiteError, LiteResult, ACCOUNT_STATE, ALL_SHARDS_INFO, BLOCK_DATA, BLOCK_HEADER,
    BLOCK_TRANSACTIONS, BLOCK_TRANSACTIONS_EXT, CONFIG_INFO, CURRENT_TIME, GET_ACCOUNT_STATE,
    GET_ALL_SHARDS_INFO, GET_BLOCK, GET_BLOCK_HEADER, GET_BLOCK_PROOF, GET_CONFIG_ALL,
    GET_CONFIG_PARAMS, GET_LIBRARIES, GET_MASTERCHAIN_INFO, GET_MASTERCHAIN_INFO_EXT,
    GET_ONE_TRANSACTION, GET_SHARD_INFO, GET_TIME, GET_TRANSACTIONS, GET_VERSION,
    LIBRARY_RESULT, LIST_BLOCK_TRANSACTIONS, LIST_BLOCK_TRANSACTIONS_EXT, LITE_ERROR,
    LITE_QUERY, LOOKUP_BLOCK, MASTERCHAIN_INFO, MASTERCHAIN_INFO_EXT, PARTIAL_BLOCK_PROOF,
    RUN_METHOD_RESULT, RUN_SMC_METHOD, SEND_MESSAGE, SEND_MSG_STATUS, SHARD_INFO,
    TRANSACTION_INFO, TRANSACTION_LIST, VERSION, WAIT_MASTERCHAIN_SEQNO,
};

/// Server-side wait used by the head updater, and the spacing between
/// its retries after an unexpected error.
const HEAD_WAIT_MS: u32 = 10_000;
const HEAD_RETRY_DELAY: Duration = Duration::from_secs(1);

/// How much of each answer is checked before it is handed out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrustLevel {
    /// Verify every proof, anchored at the stored or init key block.
    #[default]
    Full,
    /// Verify header, shard and account proofs, but accept the
    /// masterchain head without walking the key-block chain.
    ProofsOnly,
    /// Take the server's word for everything.
    TrustServer,
}

impl TrustLevel {
    pub fn verify_responses(self) -> bool {
        !matches!(self, Self::TrustServer)
    }

    pub fn verify_key_chain(self) -> bool {
        matches!(self, Self::Full)
    }
}

#[derive(Debug, Clone, Default)]
pub struct LiteClientConfig {
    pub tcp: TcpClientConfig,
    pub trust_level: TrustLevel,
}

type HeadCache = Arc<Mutex<Option<BlockIdExt>>>;

fn lock_head(cache: &HeadCache) -> std::sync::MutexGuard<'_, Option<BlockIdExt>> {
    cache.lock().unwrap_or_else(PoisonError::into_inner)
}

fn wrap_lite_query(payload: &[u8]) -> Vec<u8> {
    let mut w = TlWriter::new();
    w.write_id(LITE_QUERY);
    w.write_bytes(payload);
    w.into_bytes()
}

/// Checks the answer envelope: a `liteServer.error` becomes
/// [`LiteError::Server`], anything but the expected constructor is
/// rejected, and the reader is left at the first field.
fn open_answer(answer: &[u8], expect: u32) -> LiteResult<TlReader<'_>> {
    let mut r = TlReader::new(answer);
    match r.read_id()? {
        LITE_ERROR => {
            let code = r.read_i32()?;
            let message = r.read_string()?;
            Err(LiteError::Server { code, message })
        }
        id if id == expect => Ok(r),
        other => Err(LiteError::UnexpectedAnswer(other)),
    }
}

fn read_masterchain_info(answer: &[u8]) -> LiteResult<MasterchainInfo> {
    let mut r = open_answer(answer, MASTERCHAIN_INFO)?;
    MasterchainInfo::read(&mut r)
}

fn block_txs_mode(verify: bool, reverse: bool, after: bool) -> u32 {
    // Bits 0..2 ask for account, lt and hash in every entry.
    let mut mode = 0b111;
    if verify {
        mode |= 1 << 5;
    }
    if reverse {
        mode |= 1 << 6;
    }
    if after {
        mode |= 1 << 7;
    }
    mode
}

/// A verified, typed view of one liteserver.
#[derive(Debug)]
pub struct LiteClient {
    adnl: Arc<AdnlTcpClient>,
    trust: TrustLevel,
    query_timeout: Duration,
    last_mc: HeadCache,
    updater: JoinHandle<()>,
}

impl Drop for LiteClient {
    fn drop(&mut self) {
        self.updater.abort();
    }
}

impl LiteClient {
    pub async fn connect(
        addr: SocketAddr,
        server_public: &[u8; 32],
        config: LiteClientConfig,
    ) -> LiteResult<Self> {
        let query_timeout = config.tcp.query_timeout;
        let adnl = Arc::new(AdnlTcpClient::connect(addr, server_public, config.tcp).await?);
        let last_mc: HeadCache = Arc::new(Mutex::new(None));
        let updater = tokio::spawn(run_head_updater(
            Arc::clone(&adnl),
            Arc::clone(&last_mc),
            query_timeout,
        ));
        Ok(Self {
            adnl,
            trust: config.trust_level,
            query_timeout,
            last_mc,
            updater,
        })
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.adnl.peer_addr()
    }

    pub fn trust_level(&self) -> TrustLevel {
        self.trust
    }

    /// The masterchain head last seen by this client, from queries or
    /// the background updater.
    pub fn last_masterchain(&self) -> Option<BlockIdExt> {
        *lock_head(&self.last_mc)
    }

    /// True once the session is gone. The head updater only exits when
    /// the connection closes, so its handle doubles as a health flag.
    pub fn is_closed(&self) -> bool {
        self.updater.is_finished()
    }

    pub async fn ping(&self) -> LiteResult<()> {
        Ok(self.adnl.ping().await?)
    }

    async fn lite_query(&self, payload: &[u8], timeout: Option<Duration>) -> LiteResult<Vec<u8>> {
        let wire = wrap_lite_query(payload);
        let answer = match timeout {
            Some(t) => self.adnl.query_with_timeout(&wire, t).await?,
            None => self.adnl.query(&wire).await?,
        };
        Ok(answer)
    }

    fn record_head(&self, last: &BlockIdExt) {
        let mut head = lock_head(&self.last_mc);
        if head.map_or(true, |h| h.seqno < last.seqno) {
            *head = Some(*last);
        }
    }

    pub async fn get_masterchain_info(&self) -> LiteResult<MasterchainInfo> {
        let mut w = TlWriter::new();
        w.write_id(GET_MASTERCHAIN_INFO);
        let answer = self.lite_query(w.as_bytes(), None).await?;
        let info = read_masterchain_info(&answer)?;
        self.record_head(&info.last);
        Ok(info)
    }

    pub async fn get_masterchain_info_ext(&self) -> LiteResult<MasterchainInfoExt> {
        let mut w = TlWriter::new();
        w.write_id(GET_MASTERCHAIN_INFO_EXT);
        w.write_u32(0);
        let answer = self.lite_query(w.as_bytes(), None).await?;
        let mut r = open_answer(&answer, MASTERCHAIN_INFO_EXT)?;
        let info = MasterchainInfoExt::read(&mut r)?;
        self.record_head(&info.last);
        Ok(info)
    }

    pub async fn get_time(&self) -> LiteResult<i32> {
        let mut w = TlWriter::new();
        w.write_id(GET_TIME);
        let answer = self.lite_query(w.as_bytes(), None).await?;
        let mut r = open_answer(&answer, CURRENT_TIME)?;
        Ok(r.read_i32()?)
    }

    pub async fn get_version(&self) -> LiteResult<ServerVersion> {
        let mut w = TlWriter::new();
        w.write_id(GET_VERSION);
        let answer = self.lite_query(w.as_bytes(), None).await?;
        let mut r = open_answer(&answer, VERSION)?;
        ServerVersion::read(&mut r)
    }

    /// Waits server-side until the masterchain reaches `seqno`, then
    /// returns the (possibly newer) head.
    pub async fn wait_masterchain_seqno(
        &self,
        seqno: u32,
        timeout_ms: u32,
    ) -> LiteResult<MasterchainInfo> {
        let mut w = TlWriter::new();
        w.write_id(WAIT_MASTERCHAIN_SEQNO);
        w.write_i32(seqno as i32);
        w.write_i32(timeout_ms as i32);
        w.write_id(GET_MASTERCHAIN_INFO);
        // The wait prefix adds its server-side budget on top of the
        // transport timeout.
        let timeout = self.query_timeout + Duration::from_millis(u64::from(timeout_ms));
        let answer = self.lite_query(w.as_bytes(), Some(timeout)).await?;
        let info = read_masterchain_info(&answer)?;
        self.record_head(&info.last);
        Ok(info)
    }

    /// Fetches a full block and checks both identifying hashes.
    pub async fn get_block(&self, id: &BlockIdExt) -> LiteResult<BlockData> {
        let mut w = TlWriter::new();
        w.write_id(GET_BLOCK);
        id.write(&mut w);
        let answer = self.lite_query(w.as_bytes(), None).await?;
        let mut r = open_answer(&answer, BLOCK_DATA)?;
        let block = BlockData::read(&mut r)?;

        if self.trust.verify_responses() {
            if block.id != *id {
                return Err(LiteError::Proof("server returned a different block".into()));
            }
            if tonlite_crypto::sha256(&block.data) != id.file_hash {
                return Err(LiteError::Proof("block data file hash mismatch".into()));
            }
            let boc = BagOfCells::deserialize(&block.data)?;
            if boc.single_root()?.repr_hash() != id.root_hash {
                return Err(LiteError::Proof("block root hash mismatch".into()));
            }
        }
        Ok(block)
    }

    pub async fn get_block_header(&self, id: &BlockIdExt) -> LiteResult<BlockHeader> {
        let mut w = TlWriter::new();
        w.write_id(GET_BLOCK_HEADER);
        id.write(&mut w);
        w.write_u32(1);
        let answer = self.lite_query(w.as_bytes(), None).await?;
        let mut r = open_answer(&answer, BLOCK_HEADER)?;
        let header = BlockHeader::read(&mut r)?;

        if self.trust.verify_responses() {
            if header.id != *id {
                return Err(LiteError::Proof("header is for a different block".into()));
            }
            proof::check_header_proof_boc(&header.header_proof, &header.id)?;
        }
        Ok(header)
    }

    /// Resolves a block by seqno, logical time or unixtime within one
    /// shard. Exactly one selector applies: `lt`, then `utime`, then
    /// `id.seqno`.
    pub async fn lookup_block(
        &self,
        id: BlockId,
        lt: Option<u64>,
        utime: Option<u32>,
    ) -> LiteResult<BlockHeader> {
        let mode = match (lt, utime) {
            (Some(_), _) => 1 << 1,
            (None, Some(_)) => 1 << 2,
            (None, None) => 1 << 0,
        };
        let mut w = TlWriter::new();
        w.write_id(LOOKUP_BLOCK);
        w.write_u32(mode);
        id.write(&mut w);
        if let Some(lt) = lt {
            w.write_i64(lt as i64);
        } else if let Some(utime) = utime {
            w.write_i32(utime as i32);
        }
        let answer = self.lite_query(w.as_bytes(), None).await?;
        let mut r = open_answer(&answer, BLOCK_HEADER)?;
        let header = BlockHeader::read(&mut r)?;

        if self.trust.verify_responses() {
            if header.id.workchain != id.workchain {
                return Err(LiteError::Proof("lookup crossed workchains".into()));
            }
            if mode == 1 && header.id.seqno != id.seqno {
                return Err(LiteError::Proof("lookup returned a different seqno".into()));
            }
            proof::check_header_proof_boc(&header.header_proof, &header.id)?;
        }
        Ok(header)
    }

    pub async fn send_message(&self, body: &[u8]) -> LiteResult<SendMsgStatus> {
        let mut w = TlWriter::new();
        w.write_id(SEND_MESSAGE);
        w.write_bytes(body);
        let answer = self.lite_query(w.as_bytes(), None).await?;
        let mut r = open_answer(&answer, SEND_MSG_STATUS)?;
        SendMsgStatus::read(&mut r)
    }

    /// Fetches an account state at `block`, verifying shard membership
    /// and the account's place in the shard state.
    pub async fn get_account_state(
        &self,
        block: &BlockIdExt,
        account: &AccountId,
    ) -> LiteResult<AccountState> {
        let mut w = TlWriter::new();
        w.write_id(GET_ACCOUNT_STATE);
        block.write(&mut w);
        account.write(&mut w);
        let answer = self.lite_query(w.as_bytes(), None).await?;
        let mut r = open_answer(&answer, ACCOUNT_STATE)?;
        let state = AccountState::read(&mut r)?;

        if self.trust.verify_responses() {
            if state.id != *block {
                return Err(LiteError::Proof("state is for a different block".into()));
            }
            // Masterchain accounts live in the reference block itself;
            // the server leaves shardblk zeroed or equal in that case.
            let shard_block = if state.shardblk.root_hash != [0u8; 32] {
                state.shardblk
            } else {
                state.id
            };
            if shard_block != state.id {
                proof::check_shard_proof(&state.shard_proof, &state.id, &shard_block)?;
            }
            if state.exists() {
                let boc = BagOfCells::deserialize(&state.state)?;
                proof::check_account_proof(
                    &state.proof,
                    &shard_block,
                    &account.id,
                    boc.single_root()?,
                )?;
            } else {
                proof::check_account_absent(&state.proof, &shard_block, &account.id)?;
            }
        }
        Ok(state)
    }

    /// Runs a get method by name; the selector is derived from it.
    pub async fn run_get_method(
        &self,
        block: &BlockIdExt,
        account: &AccountId,
        method: &str,
        stack: &[StackEntry],
    ) -> LiteResult<Vec<StackEntry>> {
        self.run_smc_method(block, account, i64::from(method_id(method)), stack)
            .await
    }

    /// Runs a get method by raw selector. A non-zero exit code is
    /// surfaced as [`LiteError::ExitCode`] without decoding the stack.
    pub async fn run_smc_method(
        &self,
        block: &BlockIdExt,
        account: &AccountId,
        method: i64,
        stack: &[StackEntry],
    ) -> LiteResult<Vec<StackEntry>> {
        let params = vm::serialize_stack(stack)?;
        let verify = self.trust.verify_responses();
        // Bit 2 asks for the result stack, bit 0 for the proofs.
        let mode = if verify { 0b101 } else { 0b100 };

        let mut w = TlWriter::new();
        w.write_id(RUN_SMC_METHOD);
        w.write_u32(mode);
        block.write(&mut w);
        account.write(&mut w);
        w.write_i64(method);
        w.write_bytes(&params);
        let answer = self.lite_query(w.as_bytes(), None).await?;
        let mut r = open_answer(&answer, RUN_METHOD_RESULT)?;
        let result = RunMethodResult::read(&mut r)?;

        if verify {
            if let Some(shard_proof) = &result.shard_proof {
                if result.shardblk != result.id && !shard_proof.is_empty() {
                    proof::check_shard_proof(shard_proof, &result.id, &result.shardblk)?;
                }
            }
        }
        if result.exit_code != 0 {
            return Err(LiteError::ExitCode(result.exit_code));
        }
        let stack = result
            .result
            .ok_or_else(|| LiteError::Proof("run method answer carries no stack".into()))?;
        vm::parse_stack(&stack)
    }

    pub async fn get_shard_info(
        &self,
        block: &BlockIdExt,
        workchain: i32,
        shard: i64,
        exact: bool,
    ) -> LiteResult<ShardInfo> {
        let mut w = TlWriter::new();
        w.write_id(GET_SHARD_INFO);
        block.write(&mut w);
        w.write_i32(workchain);
        w.write_i64(shard);
        w.write_bool(exact);
        let answer = self.lite_query(w.as_bytes(), None).await?;
        let mut r = open_answer(&answer, SHARD_INFO)?;
        let info = ShardInfo::read(&mut r)?;

        if self.trust.verify_responses() {
            proof::check_shard_proof(&info.shard_proof, &info.id, &info.shardblk)?;
            if !info.shard_descr.is_empty() {
                let boc = BagOfCells::deserialize(&info.shard_descr)?;
                let root = boc.single_root()?;
                let descr = ShardDescr::read(&mut tonlite_cell::CellSlice::new(root))?;
                if descr.root_hash != info.shardblk.root_hash
                    || descr.seqno != info.shardblk.seqno
                {
                    return Err(LiteError::Proof(
                        "shard descriptor does not match proved block".into(),
                    ));
                }
            }
        }
        Ok(info)
    }

    /// The full shard configuration at a masterchain block, as
    /// `(workchain, descriptor)` pairs.
    pub async fn get_all_shards_info(
        &self,
        block: &BlockIdExt,
    ) -> LiteResult<Vec<(i32, ShardDescr)>> {
        let mut w = TlWriter::new();
        w.write_id(GET_ALL_SHARDS_INFO);
        block.write(&mut w);
        let answer = self.lite_query(w.as_bytes(), None).await?;
        let mut r = open_answer(&answer, ALL_SHARDS_INFO)?;
        let info = AllShardsInfo::read(&mut r)?;

        let boc = BagOfCells::deserialize(&info.data)?;
        let tree = boc.single_root()?;
        if self.trust.verify_responses() {
            let state_root = proof::proven_state(&info.proof, &info.id)?;
            let state = tlb::read_shard_state(&state_root)?;
            let custom = state
                .custom
                .ok_or_else(|| LiteError::Proof("state carries no masterchain extra".into()))?;
            let extra = tlb::read_mc_state_extra(custom)?;
            let hashes = extra
                .shard_hashes
                .ok_or_else(|| LiteError::Proof("state has no shard_hashes".into()))?;
            if hashes.repr_hash() != tree.repr_hash() {
                return Err(LiteError::Proof(
                    "shard tree does not match proved state".into(),
                ));
            }
        }
        tlb::all_shard_descrs(tree)
    }

    pub async fn get_one_transaction(
        &self,
        block: &BlockIdExt,
        account: &AccountId,
        lt: u64,
    ) -> LiteResult<TransactionInfo> {
        let mut w = TlWriter::new();
        w.write_id(GET_ONE_TRANSACTION);
        block.write(&mut w);
        account.write(&mut w);
        w.write_i64(lt as i64);
        let answer = self.lite_query(w.as_bytes(), None).await?;
        let mut r = open_answer(&answer, TRANSACTION_INFO)?;
        let info = TransactionInfo::read(&mut r)?;

        if self.trust.verify_responses() && !info.transaction.is_empty() {
            if info.id != *block {
                return Err(LiteError::Proof("answer names a different block".into()));
            }
            let boc = BagOfCells::deserialize(&info.transaction)?;
            proof::check_transaction_proof(
                &info.proof,
                block,
                &account.id,
                lt,
                boc.single_root()?,
            )?;
        }
        Ok(info)
    }

    /// Walks the account's transaction chain backwards from
    /// `(lt, hash)`. Every returned transaction is tied to the previous
    /// one through `prev_trans_hash`, so the caller-supplied hash
    /// anchors the whole list.
    pub async fn get_transactions(
        &self,
        account: &AccountId,
        count: u32,
        lt: u64,
        hash: &[u8; 32],
    ) -> LiteResult<TransactionList> {
        let mut w = TlWriter::new();
        w.write_id(GET_TRANSACTIONS);
        w.write_u32(count);
        account.write(&mut w);
        w.write_i64(lt as i64);
        w.write_int256(hash);
        let answer = self.lite_query(w.as_bytes(), None).await?;
        let mut r = open_answer(&answer, TRANSACTION_LIST)?;
        let list = TransactionList::read(&mut r)?;

        if self.trust.verify_responses() {
            let boc = BagOfCells::deserialize(&list.transactions)?;
            let roots = boc.roots();
            if roots.len() != list.ids.len() {
                return Err(LiteError::Proof("transaction list length mismatch".into()));
            }
            let mut expect = (*hash, lt);
            for root in roots {
                let tx = tlb::read_transaction_summary(root)?;
                if tx.hash != expect.0 || tx.lt != expect.1 || tx.account != account.id {
                    return Err(LiteError::Proof("transaction chain broken".into()));
                }
                expect = (tx.prev_trans_hash, tx.prev_trans_lt);
            }
        }
        Ok(list)
    }

    /// Lists transaction ids of one block, each checked against the
    /// block's account-block dictionary.
    pub async fn list_block_transactions(
        &self,
        block: &BlockIdExt,
        count: u32,
        after: Option<&TransactionId3>,
        reverse: bool,
    ) -> LiteResult<BlockTransactions> {
        let verify = self.trust.verify_responses();
        let mut w = TlWriter::new();
        w.write_id(LIST_BLOCK_TRANSACTIONS);
        block.write(&mut w);
        w.write_u32(block_txs_mode(verify, reverse, after.is_some()));
        w.write_u32(count);
        if let Some(after) = after {
            after.write(&mut w);
        }
        let answer = self.lite_query(w.as_bytes(), None).await?;
        let mut r = open_answer(&answer, BLOCK_TRANSACTIONS)?;
        let txs = BlockTransactions::read(&mut r)?;

        if verify && !txs.ids.is_empty() {
            let virt = proof::parse_proof(&txs.proof, &block.root_hash)?;
            for id in &txs.ids {
                let (Some(account), Some(lt), Some(hash)) = (id.account, id.lt, id.hash) else {
                    return Err(LiteError::Proof("transaction id misses fields".into()));
                };
                match tlb::block_transaction_hash(&virt, &account, lt as u64)? {
                    Some(recorded) if recorded == hash => {}
                    _ => return Err(LiteError::Proof("transaction not in block".into())),
                }
            }
        }
        Ok(txs)
    }

    /// Like [`list_block_transactions`](Self::list_block_transactions)
    /// but returns the transactions themselves.
    pub async fn list_block_transactions_ext(
        &self,
        block: &BlockIdExt,
        count: u32,
        after: Option<&TransactionId3>,
        reverse: bool,
    ) -> LiteResult<BlockTransactionsExt> {
        let verify = self.trust.verify_responses();
        let mut w = TlWriter::new();
        w.write_id(LIST_BLOCK_TRANSACTIONS_EXT);
        block.write(&mut w);
        w.write_u32(block_txs_mode(verify, reverse, after.is_some()));
        w.write_u32(count);
        if let Some(after) = after {
            after.write(&mut w);
        }
        let answer = self.lite_query(w.as_bytes(), None).await?;
        let mut r = open_answer(&answer, BLOCK_TRANSACTIONS_EXT)?;
        let txs = BlockTransactionsExt::read(&mut r)?;

        if verify && !txs.transactions.is_empty() {
            let virt = proof::parse_proof(&txs.proof, &block.root_hash)?;
            let boc = BagOfCells::deserialize(&txs.transactions)?;
            for root in boc.roots() {
                let tx = tlb::read_transaction_summary(root)?;
                match tlb::block_transaction_hash(&virt, &tx.account, tx.lt)? {
                    Some(recorded) if recorded == tx.hash => {}
                    _ => return Err(LiteError::Proof("transaction not in block".into())),
                }
            }
        }
        Ok(txs)
    }

    /// Fetches proof links from `known` towards `target` (or the head).
    /// Link verification is the caller's business; [`crate::sync`]
    /// walks these.
    pub async fn get_block_proof(
        &self,
        known: &BlockIdExt,
        target: Option<&BlockIdExt>,
    ) -> LiteResult<PartialBlockProof> {
        let mut w = TlWriter::new();
        w.write_id(GET_BLOCK_PROOF);
        w.write_u32(u32::from(target.is_some()));
        known.write(&mut w);
        if let Some(target) = target {
            target.write(&mut w);
        }
        let answer = self.lite_query(w.as_bytes(), None).await?;
        let mut r = open_answer(&answer, PARTIAL_BLOCK_PROOF)?;
        PartialBlockProof::read(&mut r)
    }

    /// The full config dictionary at a masterchain block.
    pub async fn get_config_all(&self, block: &BlockIdExt) -> LiteResult<Arc<Cell>> {
        let mut w = TlWriter::new();
        w.write_id(GET_CONFIG_ALL);
        w.write_u32(0);
        block.write(&mut w);
        let answer = self.lite_query(w.as_bytes(), None).await?;
        let mut r = open_answer(&answer, CONFIG_INFO)?;
        self.extract_config(ConfigInfo::read(&mut r)?)
    }

    /// A subset of config params at a masterchain block. The returned
    /// dictionary holds just the requested indices.
    pub async fn get_config_params(
        &self,
        block: &BlockIdExt,
        params: &[i32],
    ) -> LiteResult<Arc<Cell>> {
        let mut w = TlWriter::new();
        w.write_id(GET_CONFIG_PARAMS);
        w.write_u32(0);
        block.write(&mut w);
        w.write_u32(params.len() as u32);
        for param in params {
            w.write_i32(*param);
        }
        let answer = self.lite_query(w.as_bytes(), None).await?;
        let mut r = open_answer(&answer, CONFIG_INFO)?;
        self.extract_config(ConfigInfo::read(&mut r)?)
    }

    fn extract_config(&self, info: ConfigInfo) -> LiteResult<Arc<Cell>> {
        let state_root = if self.trust.verify_responses() {
            let (_, state_hash) = proof::check_header_proof_boc(&info.state_proof, &info.id)?;
            proof::parse_proof(&info.config_proof, &state_hash)?
        } else {
            let boc = BagOfCells::deserialize(&info.config_proof)?;
            let root = boc.single_root()?;
            if root.cell_type() == CellType::MerkleProof {
                Arc::clone(root.reference(0)?)
            } else {
                Arc::clone(root)
            }
        };
        let state = tlb::read_shard_state(&state_root)?;
        let custom = state
            .custom
            .ok_or_else(|| LiteError::Proof("state carries no masterchain extra".into()))?;
        let extra = tlb::read_mc_state_extra(custom)?;
        Ok(Arc::clone(extra.config_root))
    }

    pub async fn get_libraries(&self, hashes: &[[u8; 32]]) -> LiteResult<LibraryResult> {
        let mut w = TlWriter::new();
        w.write_id(GET_LIBRARIES);
        w.write_u32(hashes.len() as u32);
        for hash in hashes {
            w.write_int256(hash);
        }
        let answer = self.lite_query(w.as_bytes(), None).await?;
        let mut r = open_answer(&answer, LIBRARY_RESULT)?;
        LibraryResult::read(&mut r)
    }
}

/// Follows the masterchain head: one `waitMasterchainSeqno`-prefixed
/// `getMasterchainInfo` per new block, looping until the session dies.
async fn run_head_updater(adnl: Arc<AdnlTcpClient>, cache: HeadCache, query_timeout: Duration) {
    loop {
        let known = lock_head(&cache).map(|b| b.seqno);
        let mut w = TlWriter::new();
        if let Some(seqno) = known {
            w.write_id(WAIT_MASTERCHAIN_SEQNO);
            w.write_i32((seqno + 1) as i32);
            w.write_i32(HEAD_WAIT_MS as i32);
        }
        w.write_id(GET_MASTERCHAIN_INFO);
        let wire = wrap_lite_query(w.as_bytes());
        let timeout = query_timeout + Duration::from_millis(u64::from(HEAD_WAIT_MS));

        match adnl.query_with_timeout(&wire, timeout).await {
            Ok(answer) => match read_masterchain_info(&answer) {
                Ok(info) => {
                    let mut head = lock_head(&cache);
                    if head.map_or(true, |h| h.seqno < info.last.seqno) {
                        trace!(seqno = info.last.seqno, "masterchain head advanced");
                        *head = Some(info.last);
                    }
                }
                // The server answers with its timeout error when no new
                // block arrived inside the wait window.
                Err(LiteError::Server { code, message }) => {
                    trace!(code, %message, "head wait returned without a block");
                }
                Err(err) => {
                    debug!(%err, "undecodable head update");
                    tokio::time::sleep(HEAD_RETRY_DELAY).await;
                }
            },
            Err(AdnlError::QueryTimeout) => {}
            Err(AdnlError::ConnectionClosed) => return,
            Err(err) => {
                debug!(%err, "head update failed");
                tokio::time::sleep(HEAD_RETRY_DELAY).await;
            }
        }
    }
}
