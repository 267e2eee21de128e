//! Merkle proof verification.
//!
//! Every liteserver answer that claims something about the chain ships
//! one or more proof cells. The checks here tie those cells back to a
//! block id the caller already trusts; nothing is accepted on the
//! server's word alone.

use std::sync::Arc;

use tonlite_cell::{BagOfCells, Cell, CellSlice, CellType};
use tonlite_crypto::{key_id_ed25519, verify_signature};

use crate::tlb::{
    self, read_block_info, read_mc_state_extra, read_shard_state, BlockInfo, ExtBlkRef,
    ValidatorDescr,
};
use crate::types::{BlockIdExt, BlockLink, SignatureSet};
use crate::{LiteError, LiteResult};

/// `ton.blockId root_cell_hash:int256 file_hash:int256 = ton.BlockId`,
/// the constructor prefix validators sign blocks under.
const BLOCK_SIGNATURE_MAGIC: [u8; 4] = [0x70, 0x6e, 0x0b, 0xc5];

/// Checks the shape of a Merkle proof cell against the hash it claims
/// to prove, and returns the virtualized root.
pub fn check_proof<'a>(proof: &'a Cell, expected: &[u8; 32]) -> LiteResult<&'a Arc<Cell>> {
    if proof.cell_type() != CellType::MerkleProof {
        return Err(LiteError::Proof(format!(
            "expected a merkle_proof cell, got {:?}",
            proof.cell_type()
        )));
    }
    let data = proof.data();
    if data.len() < 33 || data[1..33] != expected[..] {
        return Err(LiteError::Proof("merkle proof names a different hash".into()));
    }
    let child = proof.reference(0)?;
    if child.hash_at(0) != *expected {
        return Err(LiteError::Proof("merkle proof child hash mismatch".into()));
    }
    Ok(child)
}

/// Deserializes a single-root proof BOC and verifies it against
/// `expected`, returning the virtualized root.
pub fn parse_proof(data: &[u8], expected: &[u8; 32]) -> LiteResult<Arc<Cell>> {
    let boc = BagOfCells::deserialize(data)?;
    let root = boc.single_root()?;
    Ok(Arc::clone(check_proof(root, expected)?))
}

/// Verifies a header proof for `block` and returns the header fields
/// plus the post-state hash committed by the block's Merkle update.
pub fn check_block_header_proof(
    proof_root: &Cell,
    block: &BlockIdExt,
) -> LiteResult<(BlockInfo, [u8; 32])> {
    let virt = check_proof(proof_root, &block.root_hash)?;
    let info = read_block_info(virt)?;
    if info.seqno != block.seqno || info.shard.workchain != block.workchain {
        return Err(LiteError::Proof(format!(
            "header proof is for ({},{}), wanted ({},{})",
            info.shard.workchain, info.seqno, block.workchain, block.seqno
        )));
    }
    let state_hash = tlb::block_new_state_hash(virt)?;
    Ok((info, state_hash))
}

/// Convenience form taking the serialized proof.
pub fn check_header_proof_boc(
    data: &[u8],
    block: &BlockIdExt,
) -> LiteResult<(BlockInfo, [u8; 32])> {
    let boc = BagOfCells::deserialize(data)?;
    let root = boc.single_root()?;
    check_block_header_proof(root, block)
}

fn two_roots(data: &[u8]) -> LiteResult<(Arc<Cell>, Arc<Cell>)> {
    let boc = BagOfCells::deserialize(data)?;
    match boc.roots() {
        [a, b] => Ok((Arc::clone(a), Arc::clone(b))),
        other => Err(LiteError::Proof(format!(
            "expected 2 proof roots, got {}",
            other.len()
        ))),
    }
}

/// Virtualizes the masterchain state a two-root proof commits to:
/// root 0 proves the block header, root 1 the state under it.
pub(crate) fn proven_state(data: &[u8], block: &BlockIdExt) -> LiteResult<Arc<Cell>> {
    let (header_proof, state_proof) = two_roots(data)?;
    let (_, state_hash) = check_block_header_proof(&header_proof, block)?;
    Ok(Arc::clone(check_proof(&state_proof, &state_hash)?))
}

/// Verifies that `shard_block` is the current top block of its
/// workchain in the masterchain state proved relative to `mc_block`.
pub fn check_shard_proof(
    data: &[u8],
    mc_block: &BlockIdExt,
    shard_block: &BlockIdExt,
) -> LiteResult<()> {
    let state_root = proven_state(data, mc_block)?;
    let state = read_shard_state(&state_root)?;
    let custom = state
        .custom
        .ok_or_else(|| LiteError::Proof("masterchain state carries no extra".into()))?;
    let extra = read_mc_state_extra(custom)?;
    let shard_hashes = extra
        .shard_hashes
        .ok_or_else(|| LiteError::Proof("state has no shard_hashes".into()))?;

    let descr = tlb::shard_descr_for(shard_hashes, shard_block.workchain)?
        .ok_or_else(|| {
            LiteError::Proof(format!(
                "no shard tree for workchain {}",
                shard_block.workchain
            ))
        })?;
    if descr.root_hash != shard_block.root_hash || descr.seqno != shard_block.seqno {
        return Err(LiteError::Proof("shard descriptor mismatch".into()));
    }
    Ok(())
}

/// Verifies that `account_root` is the account state recorded for
/// `addr` in the shard state proved relative to `shard_block`.
pub fn check_account_proof(
    data: &[u8],
    shard_block: &BlockIdExt,
    addr: &[u8; 32],
    account_root: &Cell,
) -> LiteResult<()> {
    let state_root = proven_state(data, shard_block)?;
    let state = read_shard_state(&state_root)?;
    let recorded = tlb::shard_account_hash(state.accounts, addr)?
        .ok_or_else(|| LiteError::Proof("account not present in shard state".into()))?;
    if recorded != account_root.repr_hash() {
        return Err(LiteError::Proof("account state hash mismatch".into()));
    }
    Ok(())
}

/// Verifies that the shard state proved relative to `shard_block`
/// records no account at `addr`.
pub fn check_account_absent(
    data: &[u8],
    shard_block: &BlockIdExt,
    addr: &[u8; 32],
) -> LiteResult<()> {
    let state_root = proven_state(data, shard_block)?;
    let state = read_shard_state(&state_root)?;
    match tlb::shard_account_hash(state.accounts, addr)? {
        None => Ok(()),
        Some(_) => Err(LiteError::Proof(
            "account exists but no state was returned".into(),
        )),
    }
}

/// Verifies that the transaction cell is the one the block records for
/// `(addr, lt)`. The proof is a single-root Merkle proof of the block.
pub fn check_transaction_proof(
    data: &[u8],
    block: &BlockIdExt,
    addr: &[u8; 32],
    lt: u64,
    tx_root: &Cell,
) -> LiteResult<()> {
    let virt = parse_proof(data, &block.root_hash)?;
    let recorded = tlb::block_transaction_hash(&virt, addr, lt)?
        .ok_or_else(|| LiteError::Proof("transaction not present in block".into()))?;
    if recorded != tx_root.repr_hash() {
        return Err(LiteError::Proof("transaction hash mismatch".into()));
    }
    Ok(())
}

/// Checks a signature set over `block` against a validator subset.
/// Accepts when the signers carry at least two thirds of the subset's
/// weight.
pub fn check_block_signatures(
    validators: &[ValidatorDescr],
    signatures: &SignatureSet,
    block: &BlockIdExt,
) -> LiteResult<()> {
    let mut by_node_id = std::collections::HashMap::with_capacity(validators.len());
    let mut total_weight = 0u64;
    for validator in validators {
        total_weight += validator.weight;
        by_node_id.insert(key_id_ed25519(&validator.public_key), validator);
    }

    let mut message = Vec::with_capacity(4 + 64);
    message.extend_from_slice(&BLOCK_SIGNATURE_MAGIC);
    message.extend_from_slice(&block.root_hash);
    message.extend_from_slice(&block.file_hash);

    let mut signed_weight = 0u64;
    let mut seen = std::collections::HashSet::new();
    for signature in &signatures.signatures {
        let Some(validator) = by_node_id.get(&signature.node_id_short) else {
            continue;
        };
        if !seen.insert(signature.node_id_short) {
            continue;
        }
        verify_signature(&validator.public_key, &message, &signature.signature)
            .map_err(|_| LiteError::Proof("invalid block signature".into()))?;
        signed_weight += validator.weight;
    }

    if (signed_weight as u128) * 3 < (total_weight as u128) * 2 {
        return Err(LiteError::Proof(format!(
            "signed weight {signed_weight} of {total_weight} is under two thirds"
        )));
    }
    Ok(())
}

fn expect_same_block(claimed: &ExtBlkRef, target: &BlockIdExt) -> LiteResult<()> {
    if claimed.seqno != target.seqno || claimed.root_hash != target.root_hash {
        return Err(LiteError::Proof("link destination mismatch".into()));
    }
    Ok(())
}

/// Reads the config out of a key block proved by `config_proof`.
fn key_block_config(virt: &Cell) -> LiteResult<(Arc<Cell>, Arc<Cell>)> {
    let extra = virt.reference(3)?;
    let mut s = CellSlice::new(extra);
    let tag = s.load_u32()?;
    if tag != 0x4a33f6fd {
        return Err(LiteError::Proof(format!("block_extra: tag {tag:#x}")));
    }
    s.skip_refs(3)?;
    let _rand_seed = s.load_hash()?;
    let _created_by = s.load_hash()?;
    let custom = s
        .load_maybe_ref()?
        .ok_or_else(|| LiteError::Proof("block extra has no masterchain part".into()))?;

    let mut c = CellSlice::new(custom);
    let tag = c.load_uint(16)?;
    if tag != 0xcca5 {
        return Err(LiteError::Proof(format!("mc_block_extra: tag {tag:#x}")));
    }
    let key_block = c.load_bit()?;
    if !key_block {
        return Err(LiteError::Proof("link source is not a key block".into()));
    }
    // shard_hashes, then shard_fees with its inline fee augmentation
    if c.load_bit()? {
        c.skip_refs(1)?;
    }
    if c.load_bit()? {
        c.skip_refs(1)?;
    }
    skip_currency_pair(&mut c)?;
    c.skip_refs(1)?; // signature/mint group
    let _config_addr = c.load_hash()?;
    let config_root = c.load_ref()?;

    let param = |index: u32| -> LiteResult<Arc<Cell>> {
        let key = tonlite_cell::dict::key_bits_from_u64(index as u64, 32);
        let mut value = tonlite_cell::dict::hashmap_get(config_root, &key)?
            .ok_or_else(|| LiteError::Proof(format!("config param {index} missing")))?;
        Ok(Arc::clone(value.load_ref()?))
    };
    Ok((param(28)?, param(34)?))
}

fn skip_currency_pair(s: &mut CellSlice<'_>) -> LiteResult<()> {
    for _ in 0..2 {
        s.load_coins()?;
        if s.load_bit()? {
            s.skip_refs(1)?;
        }
    }
    Ok(())
}

/// The outcome of one verified proof link.
#[derive(Debug, Clone, Copy)]
pub struct AppliedLink {
    pub to: BlockIdExt,
    pub to_key_block: bool,
    /// Generation time of the destination, from its header proof.
    pub gen_utime: u32,
}

/// Applies one proof link to a trusted block and returns the newly
/// trusted destination.
pub fn apply_link(trusted: &BlockIdExt, link: &BlockLink) -> LiteResult<AppliedLink> {
    if link.from_id() != trusted {
        return Err(LiteError::Proof(format!(
            "link starts at {}, trusted block is {}",
            link.from_id(),
            trusted
        )));
    }
    match link {
        BlockLink::Forward {
            to_key_block,
            to,
            dest_proof,
            config_proof,
            signatures,
            ..
        } => {
            let (info, _) = check_header_proof_boc(dest_proof, to)?;
            let virt = parse_proof(config_proof, &trusted.root_hash)?;
            let (catchain_cell, vset_cell) = key_block_config(&virt)?;
            let catchain = tlb::read_catchain_config(&catchain_cell)?;
            if catchain.shuffle_mc_validators {
                return Err(LiteError::Proof(
                    "config requires shuffled masterchain validators".into(),
                ));
            }
            let vset = tlb::read_validator_set(&vset_cell)?;
            check_block_signatures(vset.mc_validators(), signatures, to)?;
            Ok(AppliedLink {
                to: *to,
                to_key_block: *to_key_block,
                gen_utime: info.gen_utime,
            })
        }
        BlockLink::Back {
            to_key_block,
            to,
            dest_proof,
            proof,
            state_proof,
            ..
        } => {
            let (info, _) = check_header_proof_boc(dest_proof, to)?;
            let (_, state_hash) = check_header_proof_boc(proof, trusted)?;

            let boc = BagOfCells::deserialize(state_proof)?;
            let state_root = Arc::clone(check_proof(boc.single_root()?, &state_hash)?);
            let state = read_shard_state(&state_root)?;
            let custom = state
                .custom
                .ok_or_else(|| LiteError::Proof("state carries no masterchain extra".into()))?;
            let extra = read_mc_state_extra(custom)?;

            if *to_key_block {
                let last = extra
                    .last_key_block()?
                    .ok_or_else(|| LiteError::Proof("state records no key block".into()))?;
                expect_same_block(&last, to)?;
            } else {
                let prev = extra.prev_block(to.seqno)?.ok_or_else(|| {
                    LiteError::Proof(format!("state records no block at seqno {}", to.seqno))
                })?;
                expect_same_block(&prev, to)?;
            }
            Ok(AppliedLink {
                to: *to,
                to_key_block: *to_key_block,
                gen_utime: info.gen_utime,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tonlite_cell::CellBuilder;
    use tonlite_crypto::Ed25519Keypair;

    use super::*;
    use crate::tlb::test_fixtures::{block_with_state, shard_accounts_with, shard_state_with};
    use crate::types::{BlockSignature, SHARD_FULL};

    fn merkle_proof(child: &Arc<Cell>) -> Cell {
        let mut b = CellBuilder::exotic(CellType::MerkleProof);
        b.store_u8(0x03).unwrap();
        b.store_bytes(&child.hash_at(0)).unwrap();
        b.store_u16(child.depth_at(0)).unwrap();
        b.store_ref(Arc::clone(child)).unwrap();
        b.build().unwrap()
    }

    fn block_id_for(root: &Cell, seqno: u32, workchain: i32) -> BlockIdExt {
        BlockIdExt::new(workchain, SHARD_FULL, seqno, root.repr_hash(), [0u8; 32])
    }

    #[test]
    fn merkle_proof_shape_checks() {
        let payload = Arc::new(CellBuilder::new().store_u32(1).unwrap().build().unwrap());
        let proof = merkle_proof(&payload);
        let expected = payload.repr_hash();
        assert_eq!(
            check_proof(&proof, &expected).unwrap().repr_hash(),
            expected
        );

        let mut wrong = expected;
        wrong[0] ^= 1;
        assert!(matches!(
            check_proof(&proof, &wrong),
            Err(LiteError::Proof(_))
        ));

        // An ordinary cell is not a proof, whatever it contains.
        assert!(matches!(
            check_proof(&payload, &expected),
            Err(LiteError::Proof(_))
        ));
    }

    #[test]
    fn header_proof_roundtrip() {
        let block = block_with_state(99, [0x17; 32], false);
        let id = block_id_for(&block, 99, -1);
        let proof = merkle_proof(&block);

        let (info, state_hash) = check_block_header_proof(&proof, &id).unwrap();
        assert_eq!(info.seqno, 99);
        assert_eq!(state_hash, [0x17; 32]);

        let wrong_seqno = BlockIdExt { seqno: 100, ..id };
        assert!(check_block_header_proof(&proof, &wrong_seqno).is_err());
    }

    fn account_proof_fixture() -> (Vec<u8>, BlockIdExt, [u8; 32], Arc<Cell>) {
        let account = Arc::new(
            CellBuilder::new().store_u64(0xfeed_beef).unwrap().build().unwrap(),
        );
        let addr = [0x42u8; 32];
        let accounts = shard_accounts_with(&addr, &account);
        let state = shard_state_with(7, accounts);
        let block = block_with_state(7, state.repr_hash(), true);
        let id = block_id_for(&block, 7, 0);

        let header_proof = merkle_proof(&block);
        let state_proof = merkle_proof(&state);
        let boc = BagOfCells::new(vec![Arc::new(header_proof), Arc::new(state_proof)]);
        (boc.serialize().unwrap(), id, addr, account)
    }

    #[test]
    fn account_proof_accepts_matching_root() {
        let (proof, id, addr, account) = account_proof_fixture();
        check_account_proof(&proof, &id, &addr, &account).unwrap();
    }

    #[test]
    fn account_proof_rejects_flipped_bit() {
        let (proof, id, addr, _) = account_proof_fixture();
        // Same account with one data bit flipped.
        let forged = CellBuilder::new()
            .store_u64(0xfeed_beee)
            .unwrap()
            .build()
            .unwrap();
        assert!(matches!(
            check_account_proof(&proof, &id, &addr, &forged),
            Err(LiteError::Proof(_))
        ));
    }

    #[test]
    fn account_proof_rejects_unknown_account() {
        let (proof, id, _, account) = account_proof_fixture();
        assert!(matches!(
            check_account_proof(&proof, &id, &[0u8; 32], &account),
            Err(LiteError::Proof(_))
        ));
    }

    fn signed_set(
        keys: &[Ed25519Keypair],
        signers: &[usize],
        block: &BlockIdExt,
    ) -> SignatureSet {
        let mut message = Vec::new();
        message.extend_from_slice(&BLOCK_SIGNATURE_MAGIC);
        message.extend_from_slice(&block.root_hash);
        message.extend_from_slice(&block.file_hash);
        SignatureSet {
            validator_set_hash: 0,
            catchain_seqno: 0,
            signatures: signers
                .iter()
                .map(|&i| BlockSignature {
                    node_id_short: key_id_ed25519(keys[i].public_key()),
                    signature: keys[i].sign(&message).to_vec(),
                })
                .collect(),
        }
    }

    #[test]
    fn signature_threshold() {
        let keys: Vec<_> = (0..3).map(|_| Ed25519Keypair::generate()).collect();
        let validators: Vec<_> = keys
            .iter()
            .map(|k| ValidatorDescr {
                public_key: *k.public_key(),
                weight: 1,
                adnl_addr: None,
            })
            .collect();
        let block = BlockIdExt::new(-1, SHARD_FULL, 5, [0xaa; 32], [0xbb; 32]);

        // 3 of 3 and 1 of 3: only the former clears two thirds.
        check_block_signatures(&validators, &signed_set(&keys, &[0, 1, 2], &block), &block)
            .unwrap();
        assert!(check_block_signatures(
            &validators,
            &signed_set(&keys, &[0], &block),
            &block
        )
        .is_err());

        // 2 of 3 sits exactly on the boundary and must be accepted.
        check_block_signatures(&validators, &signed_set(&keys, &[0, 1], &block), &block)
            .unwrap();

        // A duplicated signer counts once.
        let mut set = signed_set(&keys, &[0], &block);
        set.signatures.extend(signed_set(&keys, &[0], &block).signatures);
        assert!(check_block_signatures(&validators, &set, &block).is_err());
    }

    #[test]
    fn forged_signature_rejected() {
        let keys: Vec<_> = (0..2).map(|_| Ed25519Keypair::generate()).collect();
        let validators: Vec<_> = keys
            .iter()
            .map(|k| ValidatorDescr {
                public_key: *k.public_key(),
                weight: 1,
                adnl_addr: None,
            })
            .collect();
        let block = BlockIdExt::new(-1, SHARD_FULL, 5, [0xaa; 32], [0xbb; 32]);
        let other = BlockIdExt::new(-1, SHARD_FULL, 6, [0xcc; 32], [0xbb; 32]);

        // Signatures over a different block fail verification outright.
        let set = signed_set(&keys, &[0, 1], &other);
        assert!(matches!(
            check_block_signatures(&validators, &set, &block),
            Err(LiteError::Proof(_))
        ));
    }
}
