//! TL-B readers for the block structures proofs walk through.
//!
//! Only the read side, and only the fields verification needs: block
//! headers, state roots, the shard-hash tree, validator and catchain
//! config params, and the transaction dictionaries. Pruned subtrees are
//! fine anywhere we only compare hashes.

use std::sync::Arc;

use tonlite_cell::dict::{self, read_label};
use tonlite_cell::{Cell, CellSlice};

use crate::{LiteError, LiteResult};

const BLOCK_TAG: u64 = 0x11ef55aa;
const BLOCK_INFO_TAG: u64 = 0x9bc7a987;
const SHARD_STATE_TAG: u64 = 0x9023afe2;
const MC_STATE_EXTRA_TAG: u64 = 0xcc26;
const BLOCK_EXTRA_TAG: u64 = 0x4a33f6fd;
const SIG_PUBKEY_TAG: u64 = 0x8e81278a;

fn proof_err(what: &str) -> LiteError {
    LiteError::Proof(what.to_string())
}

fn expect_tag(slice: &mut CellSlice<'_>, bits: usize, tag: u64, what: &str) -> LiteResult<()> {
    let got = slice.load_uint(bits)?;
    if got != tag {
        return Err(LiteError::Proof(format!(
            "{what}: tag {got:#x}, expected {tag:#x}"
        )));
    }
    Ok(())
}

/// `ShardIdent`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShardIdent {
    pub workchain: i32,
    pub prefix: u64,
}

impl ShardIdent {
    fn read(slice: &mut CellSlice<'_>) -> LiteResult<Self> {
        expect_tag(slice, 2, 0, "shard_ident")?;
        let _pfx_bits = slice.load_uint(6)?;
        Ok(Self {
            workchain: slice.load_int(32)? as i32,
            prefix: slice.load_u64()?,
        })
    }
}

/// The header fields proofs care about, from `^BlockInfo`.
#[derive(Debug, Clone)]
pub struct BlockInfo {
    pub version: u32,
    pub not_master: bool,
    pub key_block: bool,
    pub seqno: u32,
    pub shard: ShardIdent,
    pub gen_utime: u32,
    pub start_lt: u64,
    pub end_lt: u64,
    pub gen_catchain_seqno: u32,
    pub min_ref_mc_seqno: u32,
    pub prev_key_block_seqno: u32,
}

/// Reads `BlockInfo` out of a block root (reference 0).
pub fn read_block_info(root: &Cell) -> LiteResult<BlockInfo> {
    let mut slice = CellSlice::new(root);
    expect_tag(&mut slice, 32, BLOCK_TAG, "block")?;
    let _global_id = slice.load_int(32)?;

    let info = root.reference(0)?;
    let mut s = CellSlice::new(info);
    expect_tag(&mut s, 32, BLOCK_INFO_TAG, "block_info")?;
    let version = s.load_u32()?;
    let not_master = s.load_bit()?;
    let _after_merge = s.load_bit()?;
    let _before_split = s.load_bit()?;
    let _after_split = s.load_bit()?;
    let _want_split = s.load_bit()?;
    let _want_merge = s.load_bit()?;
    let key_block = s.load_bit()?;
    let _vert_seqno_incr = s.load_bit()?;
    let _flags = s.load_uint(8)?;
    let seqno = s.load_u32()?;
    let _vert_seqno = s.load_u32()?;
    let shard = ShardIdent::read(&mut s)?;
    let gen_utime = s.load_u32()?;
    let start_lt = s.load_u64()?;
    let end_lt = s.load_u64()?;
    let _gen_validator_list_hash_short = s.load_u32()?;
    let gen_catchain_seqno = s.load_u32()?;
    let min_ref_mc_seqno = s.load_u32()?;
    let prev_key_block_seqno = s.load_u32()?;

    Ok(BlockInfo {
        version,
        not_master,
        key_block,
        seqno,
        shard,
        gen_utime,
        start_lt,
        end_lt,
        gen_catchain_seqno,
        min_ref_mc_seqno,
        prev_key_block_seqno,
    })
}

/// The hash of the post-state, from the block's Merkle-update cell
/// (reference 2, second child).
pub fn block_new_state_hash(root: &Cell) -> LiteResult<[u8; 32]> {
    let update = root.reference(2)?;
    let new_root = update.reference(1)?;
    Ok(new_root.hash_at(0))
}

/// `ShardStateUnsplit`, down to the accounts dictionary and the
/// masterchain extra.
#[derive(Debug)]
pub struct ShardState<'a> {
    pub global_id: i32,
    pub shard: ShardIdent,
    pub seqno: u32,
    pub gen_utime: u32,
    pub accounts: &'a Arc<Cell>,
    pub custom: Option<&'a Arc<Cell>>,
}

pub fn read_shard_state(root: &Cell) -> LiteResult<ShardState<'_>> {
    let mut s = CellSlice::new(root);
    expect_tag(&mut s, 32, SHARD_STATE_TAG, "shard_state")?;
    let global_id = s.load_int(32)? as i32;
    let shard = ShardIdent::read(&mut s)?;
    let seqno = s.load_u32()?;
    let _vert_seqno = s.load_u32()?;
    let gen_utime = s.load_u32()?;
    let _gen_lt = s.load_u64()?;
    let _min_ref_mc_seqno = s.load_u32()?;
    let _out_msg_queue_info = s.load_ref()?;
    let _before_split = s.load_bit()?;
    let accounts = s.load_ref()?;
    let _group = s.load_ref()?;
    let custom = s.load_maybe_ref()?;

    Ok(ShardState {
        global_id,
        shard,
        seqno,
        gen_utime,
        accounts,
        custom,
    })
}

/// `ExtBlkRef`: a reference to an earlier block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtBlkRef {
    pub end_lt: u64,
    pub seqno: u32,
    pub root_hash: [u8; 32],
    pub file_hash: [u8; 32],
}

impl ExtBlkRef {
    fn read(slice: &mut CellSlice<'_>) -> LiteResult<Self> {
        Ok(Self {
            end_lt: slice.load_u64()?,
            seqno: slice.load_u32()?,
            root_hash: slice.load_hash()?,
            file_hash: slice.load_hash()?,
        })
    }
}

/// `McStateExtra`: the masterchain-only tail of a shard state.
#[derive(Debug)]
pub struct McStateExtra<'a> {
    pub shard_hashes: Option<&'a Arc<Cell>>,
    pub config_addr: [u8; 32],
    pub config_root: &'a Arc<Cell>,
    info_group: &'a Arc<Cell>,
}

pub fn read_mc_state_extra(custom: &Cell) -> LiteResult<McStateExtra<'_>> {
    let mut s = CellSlice::new(custom);
    expect_tag(&mut s, 16, MC_STATE_EXTRA_TAG, "mc_state_extra")?;
    let shard_hashes = s.load_maybe_ref()?;
    let config_addr = s.load_hash()?;
    let config_root = s.load_ref()?;
    let info_group = s.load_ref()?;
    Ok(McStateExtra {
        shard_hashes,
        config_addr,
        config_root,
        info_group,
    })
}

impl<'a> McStateExtra<'a> {
    /// Looks up one config param cell by index.
    pub fn config_param(&self, index: u32) -> LiteResult<Option<&'a Arc<Cell>>> {
        let key = dict::key_bits_from_u64(index as u64, 32);
        match dict::hashmap_get(self.config_root, &key)? {
            Some(mut value) => Ok(Some(value.load_ref()?)),
            None => Ok(None),
        }
    }

    fn info_slice(&self) -> LiteResult<(CellSlice<'a>, Option<&'a Arc<Cell>>)> {
        let mut s = CellSlice::new(self.info_group);
        let _flags = s.load_uint(16)?;
        // validator_info: list hash, catchain seqno, nx_cc_updated
        let _ = s.load_u32()?;
        let _ = s.load_u32()?;
        let _ = s.load_bit()?;
        // prev_blocks: HashmapAugE 32 KeyExtBlkRef KeyMaxLt
        let prev_blocks = s.load_maybe_ref()?;
        // root-level extra: KeyMaxLt
        let _key = s.load_bit()?;
        let _max_end_lt = s.load_u64()?;
        Ok((s, prev_blocks))
    }

    /// The state's `last_key_block`, if recorded.
    pub fn last_key_block(&self) -> LiteResult<Option<ExtBlkRef>> {
        let (mut s, _) = self.info_slice()?;
        let _after_key_block = s.load_bit()?;
        if s.load_bit()? {
            Ok(Some(ExtBlkRef::read(&mut s)?))
        } else {
            Ok(None)
        }
    }

    /// Looks up a previous masterchain block by seqno in
    /// `OldMcBlocksInfo`.
    pub fn prev_block(&self, seqno: u32) -> LiteResult<Option<ExtBlkRef>> {
        let (_, prev_blocks) = self.info_slice()?;
        let Some(root) = prev_blocks else {
            return Ok(None);
        };
        let key = dict::key_bits_from_u64(seqno as u64, 32);
        let skip_key_max_lt = |s: &mut CellSlice<'_>| {
            s.load_bit()?;
            s.load_u64()?;
            Ok(())
        };
        match aug_get(root, &key, &skip_key_max_lt)? {
            Some(mut value) => {
                // KeyExtBlkRef: key:Bool blk_ref:ExtBlkRef
                let _key_block = value.load_bit()?;
                Ok(Some(ExtBlkRef::read(&mut value)?))
            }
            None => Ok(None),
        }
    }
}

/// `ShardDescr`, current (`#a`) or legacy (`#b`) form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShardDescr {
    pub seqno: u32,
    pub reg_mc_seqno: u32,
    pub start_lt: u64,
    pub end_lt: u64,
    pub root_hash: [u8; 32],
    pub file_hash: [u8; 32],
}

impl ShardDescr {
    pub fn read(slice: &mut CellSlice<'_>) -> LiteResult<Self> {
        let tag = slice.load_uint(4)?;
        if tag != 0xa && tag != 0xb {
            return Err(LiteError::Proof(format!("shard_descr: tag {tag:#x}")));
        }
        Ok(Self {
            seqno: slice.load_u32()?,
            reg_mc_seqno: slice.load_u32()?,
            start_lt: slice.load_u64()?,
            end_lt: slice.load_u64()?,
            root_hash: slice.load_hash()?,
            file_hash: slice.load_hash()?,
        })
    }
}

/// The first (leftmost) shard descriptor of a workchain in the
/// `shard_hashes` tree.
pub fn shard_descr_for(shard_hashes: &Cell, workchain: i32) -> LiteResult<Option<ShardDescr>> {
    let key = dict::key_bits_from_u64(workchain as u32 as u64, 32);
    let Some(mut value) = dict::hashmap_get(shard_hashes, &key)? else {
        return Ok(None);
    };
    let tree = value.load_ref()?;
    let leaves = dict::bintree_leaves(tree)?;
    match leaves.into_iter().next() {
        Some((_, mut leaf)) => Ok(Some(ShardDescr::read(&mut leaf)?)),
        None => Ok(None),
    }
}

/// Every `(workchain, descriptor)` pair of the tree, in key order.
pub fn all_shard_descrs(shard_hashes: &Cell) -> LiteResult<Vec<(i32, ShardDescr)>> {
    let mut out = Vec::new();
    for (key, mut value) in dict::hashmap_entries(shard_hashes, 32)? {
        let workchain = key
            .iter()
            .fold(0u32, |acc, &bit| acc << 1 | bit as u32) as i32;
        let tree = value.load_ref()?;
        for (_, mut leaf) in dict::bintree_leaves(tree)? {
            out.push((workchain, ShardDescr::read(&mut leaf)?));
        }
    }
    Ok(out)
}

/// ConfigParam 28, the catchain config. Only the shuffle flag matters
/// for verification.
#[derive(Debug, Clone, Copy)]
pub struct CatchainConfig {
    pub shuffle_mc_validators: bool,
}

pub fn read_catchain_config(cell: &Cell) -> LiteResult<CatchainConfig> {
    let mut s = CellSlice::new(cell);
    let tag = s.load_uint(8)?;
    let shuffle_mc_validators = match tag {
        0xc1 => false,
        0xc2 => {
            let _flags = s.load_uint(7)?;
            s.load_bit()?
        }
        other => return Err(LiteError::Proof(format!("catchain_config: tag {other:#x}"))),
    };
    Ok(CatchainConfig {
        shuffle_mc_validators,
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatorDescr {
    pub public_key: [u8; 32],
    pub weight: u64,
    pub adnl_addr: Option<[u8; 32]>,
}

/// ConfigParam 34, the current validator set (`validators_ext` form).
#[derive(Debug, Clone)]
pub struct ValidatorSet {
    pub utime_since: u32,
    pub utime_until: u32,
    pub total: u16,
    pub main: u16,
    pub total_weight: u64,
    /// In dictionary key order, which is the set's canonical order.
    pub validators: Vec<ValidatorDescr>,
}

pub fn read_validator_set(cell: &Cell) -> LiteResult<ValidatorSet> {
    let mut s = CellSlice::new(cell);
    let tag = s.load_uint(8)?;
    if tag != 0x12 {
        return Err(LiteError::Proof(format!(
            "validator set: unsupported tag {tag:#x}"
        )));
    }
    let utime_since = s.load_u32()?;
    let utime_until = s.load_u32()?;
    let total = s.load_u16()?;
    let main = s.load_u16()?;
    let total_weight = s.load_u64()?;
    let list = s
        .load_maybe_ref()?
        .ok_or_else(|| proof_err("validator set: empty list"))?;

    let mut validators = Vec::with_capacity(total as usize);
    for (_, mut value) in dict::hashmap_entries(list, 16)? {
        let tag = value.load_uint(8)?;
        if tag != 0x53 && tag != 0x73 {
            return Err(LiteError::Proof(format!("validator_descr: tag {tag:#x}")));
        }
        expect_tag(&mut value, 32, SIG_PUBKEY_TAG, "sig_pubkey")?;
        let public_key = value.load_hash()?;
        let weight = value.load_u64()?;
        let adnl_addr = if tag == 0x73 {
            Some(value.load_hash()?)
        } else {
            None
        };
        validators.push(ValidatorDescr {
            public_key,
            weight,
            adnl_addr,
        });
    }
    Ok(ValidatorSet {
        utime_since,
        utime_until,
        total,
        main,
        total_weight,
        validators,
    })
}

impl ValidatorSet {
    /// The masterchain subset: the first `main` validators in set order.
    /// Only valid while shuffling is off, which the proof layer enforces.
    pub fn mc_validators(&self) -> &[ValidatorDescr] {
        let n = (self.main as usize).min(self.validators.len());
        &self.validators[..n]
    }
}

/// The fields of a `Transaction` cell needed for chain checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransactionSummary {
    pub hash: [u8; 32],
    pub account: [u8; 32],
    pub lt: u64,
    pub prev_trans_hash: [u8; 32],
    pub prev_trans_lt: u64,
}

pub fn read_transaction_summary(cell: &Cell) -> LiteResult<TransactionSummary> {
    let mut s = CellSlice::new(cell);
    expect_tag(&mut s, 4, 0x7, "transaction")?;
    Ok(TransactionSummary {
        hash: cell.repr_hash(),
        account: s.load_hash()?,
        lt: s.load_u64()?,
        prev_trans_hash: s.load_hash()?,
        prev_trans_lt: s.load_u64()?,
    })
}

fn skip_currency_collection(s: &mut CellSlice<'_>) -> tonlite_cell::CellResult<()> {
    s.load_coins()?;
    // ExtraCurrencyCollection: HashmapE 32 VarUInteger32
    if s.load_bit()? {
        s.skip_refs(1)?;
    }
    Ok(())
}

/// Augmented-hashmap lookup where forks and leaves live inline in their
/// parent's slice rather than behind a dedicated root cell.
fn aug_get<'a>(
    root: &'a Cell,
    key: &[bool],
    skip_extra: &dyn Fn(&mut CellSlice<'a>) -> tonlite_cell::CellResult<()>,
) -> LiteResult<Option<CellSlice<'a>>> {
    let mut slice = CellSlice::new(root);
    let mut rest = key;
    loop {
        let label = read_label(&mut slice, rest.len())?;
        if !rest.starts_with(&label) {
            return Ok(None);
        }
        rest = &rest[label.len()..];
        let Some((&branch, tail)) = rest.split_first() else {
            skip_extra(&mut slice)?;
            return Ok(Some(slice));
        };
        rest = tail;
        let left = slice.load_ref()?;
        let right = slice.load_ref()?;
        slice = CellSlice::new(if branch { right } else { left });
    }
}

/// Finds the account leaf in a shard state's `ShardAccounts` and
/// returns the hash of its `^Account` cell.
pub fn shard_account_hash(accounts: &Cell, addr: &[u8; 32]) -> LiteResult<Option<[u8; 32]>> {
    let mut s = CellSlice::new(accounts);
    if !s.load_bit()? {
        return Ok(None);
    }
    let root = s.load_ref()?;
    let key = dict::key_bits(addr, 256);
    // Augmentation is DepthBalanceInfo: split depth then a balance.
    let skip = |s: &mut CellSlice<'_>| {
        s.load_uint(5)?;
        skip_currency_collection(s)
    };
    match aug_get(root, &key, &skip)? {
        Some(mut value) => {
            // ShardAccount: account:^Account last_trans_hash last_trans_lt
            let account = value.load_ref()?;
            Ok(Some(account.hash_at(0)))
        }
        None => Ok(None),
    }
}

/// Finds a transaction in a block's account-block dictionary and
/// returns the hash of its `^Transaction` cell.
pub fn block_transaction_hash(
    block_root: &Cell,
    addr: &[u8; 32],
    lt: u64,
) -> LiteResult<Option<[u8; 32]>> {
    let extra = block_root.reference(3)?;
    let mut s = CellSlice::new(extra);
    expect_tag(&mut s, 32, BLOCK_EXTRA_TAG, "block_extra")?;

    let account_blocks = extra.reference(2)?;
    let mut s = CellSlice::new(account_blocks);
    if !s.load_bit()? {
        return Ok(None);
    }
    let root = s.load_ref()?;

    let key = dict::key_bits(addr, 256);
    let Some(mut leaf) = aug_get(root, &key, &skip_currency_collection)? else {
        return Ok(None);
    };

    // AccountBlock: acc_trans#5 account_addr then an inline
    // HashmapAug 64 ^Transaction CurrencyCollection.
    expect_tag(&mut leaf, 4, 0x5, "acc_trans")?;
    let _account_addr = leaf.load_hash()?;

    let tx_key = dict::key_bits_from_u64(lt, 64);
    let mut rest = tx_key.as_slice();
    loop {
        let label = read_label(&mut leaf, rest.len())?;
        if !rest.starts_with(&label) {
            return Ok(None);
        }
        rest = &rest[label.len()..];
        let Some((&branch, tail)) = rest.split_first() else {
            skip_currency_collection(&mut leaf)?;
            let tx = leaf.load_ref()?;
            return Ok(Some(tx.hash_at(0)));
        };
        rest = tail;
        let left = leaf.load_ref()?;
        let right = leaf.load_ref()?;
        leaf = CellSlice::new(if branch { right } else { left });
    }
}


#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tonlite_cell::CellBuilder;

    use super::test_fixtures::*;
    use super::*;

    #[test]
    fn block_info_fields() {
        let block = block_with_state(42, [5u8; 32], false);
        let info = read_block_info(&block).unwrap();
        assert_eq!(info.seqno, 42);
        assert!(!info.not_master);
        assert!(!info.key_block);
        assert_eq!(info.shard.workchain, -1);
        assert_eq!(info.gen_catchain_seqno, 9);
    }

    #[test]
    fn state_hash_from_merkle_update() {
        let block = block_with_state(1, [0xab; 32], false);
        assert_eq!(block_new_state_hash(&block).unwrap(), [0xab; 32]);
    }

    #[test]
    fn shard_state_accounts_lookup() {
        let account = Arc::new(CellBuilder::new().store_u32(777).unwrap().build().unwrap());
        let addr = [0x42u8; 32];
        let accounts = shard_accounts_with(&addr, &account);
        let state = shard_state_with(3, Arc::clone(&accounts));

        let parsed = read_shard_state(&state).unwrap();
        assert_eq!(parsed.seqno, 3);
        assert!(parsed.custom.is_none());

        let found = shard_account_hash(parsed.accounts, &addr).unwrap();
        assert_eq!(found, Some(account.repr_hash()));
        assert_eq!(
            shard_account_hash(parsed.accounts, &[0u8; 32]).unwrap(),
            None
        );
    }

    #[test]
    fn shard_descr_first_leaf() {
        // shard_hashes: one workchain (0) whose BinTree is a single leaf.
        let mut leaf = CellBuilder::new();
        leaf.store_bit(false).unwrap(); // bt_leaf
        leaf.store_uint(0xa, 4).unwrap();
        leaf.store_u32(17).unwrap(); // seqno
        leaf.store_u32(16).unwrap(); // reg_mc_seqno
        leaf.store_u64(100).unwrap();
        leaf.store_u64(200).unwrap();
        leaf.store_bytes(&[0xcd; 32]).unwrap();
        leaf.store_bytes(&[0xef; 32]).unwrap();

        let mut entry = CellBuilder::new();
        store_long_label(&mut entry, &dict::key_bits_from_u64(0, 32), 32);
        entry.store_ref(Arc::new(leaf.build().unwrap())).unwrap();
        let dict_root = entry.build().unwrap();

        let descr = shard_descr_for(&dict_root, 0).unwrap().unwrap();
        assert_eq!(descr.seqno, 17);
        assert_eq!(descr.root_hash, [0xcd; 32]);
        assert!(shard_descr_for(&dict_root, 7).unwrap().is_none());

        let all = all_shard_descrs(&dict_root).unwrap();
        assert_eq!(all, vec![(0, descr)]);
    }

    #[test]
    fn catchain_config_forms() {
        let old = CellBuilder::new().store_u8(0xc1).unwrap().store_u64(0).unwrap().build().unwrap();
        assert!(!read_catchain_config(&old).unwrap().shuffle_mc_validators);

        let mut b = CellBuilder::new();
        b.store_u8(0xc2).unwrap();
        b.store_uint(0, 7).unwrap();
        b.store_bit(true).unwrap();
        let new = b.build().unwrap();
        assert!(read_catchain_config(&new).unwrap().shuffle_mc_validators);
    }

    #[test]
    fn validator_set_parsing() {
        // Two validators in a 16-bit-keyed dictionary.
        let mut v0 = CellBuilder::new();
        store_long_label(&mut v0, &dict::key_bits_from_u64(0, 15), 15);
        v0.store_u8(0x53).unwrap();
        v0.store_u32(0x8e81278a).unwrap();
        v0.store_bytes(&[0x11; 32]).unwrap();
        v0.store_u64(60).unwrap();

        let mut v1 = CellBuilder::new();
        store_long_label(&mut v1, &dict::key_bits_from_u64(0, 15), 15);
        v1.store_u8(0x53).unwrap();
        v1.store_u32(0x8e81278a).unwrap();
        v1.store_bytes(&[0x22; 32]).unwrap();
        v1.store_u64(40).unwrap();

        let mut root = CellBuilder::new();
        store_long_label(&mut root, &[], 16);
        root.store_ref(Arc::new(v0.build().unwrap())).unwrap();
        root.store_ref(Arc::new(v1.build().unwrap())).unwrap();

        let mut b = CellBuilder::new();
        b.store_u8(0x12).unwrap();
        b.store_u32(1000).unwrap(); // utime_since
        b.store_u32(2000).unwrap(); // utime_until
        b.store_u16(2).unwrap(); // total
        b.store_u16(1).unwrap(); // main
        b.store_u64(100).unwrap(); // total_weight
        b.store_bit(true).unwrap();
        b.store_ref(Arc::new(root.build().unwrap())).unwrap();
        let cell = b.build().unwrap();

        let set = read_validator_set(&cell).unwrap();
        assert_eq!(set.total, 2);
        assert_eq!(set.total_weight, 100);
        assert_eq!(set.validators.len(), 2);
        assert_eq!(set.validators[0].public_key, [0x11; 32]);
        assert_eq!(set.mc_validators().len(), 1);
    }

    #[test]
    fn transaction_summary_fields() {
        let mut b = CellBuilder::new();
        b.store_uint(0x7, 4).unwrap();
        b.store_bytes(&[0x33; 32]).unwrap();
        b.store_u64(900).unwrap();
        b.store_bytes(&[0x44; 32]).unwrap();
        b.store_u64(800).unwrap();
        let cell = b.build().unwrap();

        let tx = read_transaction_summary(&cell).unwrap();
        assert_eq!(tx.hash, cell.repr_hash());
        assert_eq!(tx.account, [0x33; 32]);
        assert_eq!(tx.lt, 900);
        assert_eq!(tx.prev_trans_hash, [0x44; 32]);
        assert_eq!(tx.prev_trans_lt, 800);
    }
}
