//! Liteserver access layer.
//!
//! [`LiteClient`] speaks the typed query protocol over one ADNL TCP
//! session; [`LiteBalancer`] spreads the same surface over a pool of
//! servers from a global config. Responses are verified against Merkle
//! proofs according to the configured [`TrustLevel`], anchored at a
//! trusted key block that [`sync`] advances and [`store`] persists.

mod error;

pub mod balancer;
pub mod client;
pub mod config;
pub mod proof;
pub mod store;
pub mod sync;
pub mod tlb;
pub mod types;
pub mod vm;

pub use balancer::{BalancerConfig, LiteBalancer};
pub use client::{LiteClient, LiteClientConfig, TrustLevel};
pub use config::GlobalConfig;
pub use error::{LiteError, LiteResult};
pub use store::BlockStore;
pub use types::{BlockId, BlockIdExt};

// Constructor ids, in wire byte order. Computed from the schema text with
// `;()` stripped, like every other id in the workspace.

/// `liteServer.query data:bytes = Object`
pub const LITE_QUERY: u32 = 0xdf068c79;
/// `liteServer.error code:int message:string = liteServer.Error`
pub const LITE_ERROR: u32 = 0x48e1a9bb;
/// `liteServer.getMasterchainInfo = liteServer.MasterchainInfo`
pub const GET_MASTERCHAIN_INFO: u32 = 0x2ee6b589;
/// `liteServer.masterchainInfo last:tonNode.blockIdExt state_root_hash:int256 init:tonNode.zeroStateIdExt = liteServer.MasterchainInfo`
pub const MASTERCHAIN_INFO: u32 = 0x81288385;
/// `liteServer.getMasterchainInfoExt mode:# = liteServer.MasterchainInfoExt`
pub const GET_MASTERCHAIN_INFO_EXT: u32 = 0xdf71a670;
/// `liteServer.masterchainInfoExt mode:# version:int capabilities:long last:tonNode.blockIdExt last_utime:int now:int state_root_hash:int256 init:tonNode.zeroStateIdExt = liteServer.MasterchainInfoExt`
pub const MASTERCHAIN_INFO_EXT: u32 = 0xf5e0cca8;
/// `liteServer.getTime = liteServer.CurrentTime`
pub const GET_TIME: u32 = 0x345aad16;
/// `liteServer.currentTime now:int = liteServer.CurrentTime`
pub const CURRENT_TIME: u32 = 0x0d0053e9;
/// `liteServer.getVersion = liteServer.Version`
pub const GET_VERSION: u32 = 0x0b942b23;
/// `liteServer.version mode:# version:int capabilities:long now:int = liteServer.Version`
pub const VERSION: u32 = 0xe591045a;
/// `liteServer.getBlock id:tonNode.blockIdExt = liteServer.BlockData`
pub const GET_BLOCK: u32 = 0x0dcf7763;
/// `liteServer.blockData id:tonNode.blockIdExt data:bytes = liteServer.BlockData`
pub const BLOCK_DATA: u32 = 0x6ced74a5;
/// `liteServer.getBlockHeader id:tonNode.blockIdExt mode:# = liteServer.BlockHeader`
pub const GET_BLOCK_HEADER: u32 = 0x9e06ec21;
/// `liteServer.blockHeader id:tonNode.blockIdExt mode:# header_proof:bytes = liteServer.BlockHeader`
pub const BLOCK_HEADER: u32 = 0x19822d75;
/// `liteServer.lookupBlock mode:# id:tonNode.blockId lt:mode.1?long utime:mode.2?int = liteServer.BlockHeader`
pub const LOOKUP_BLOCK: u32 = 0x1ef7c8fa;
/// `liteServer.sendMessage body:bytes = liteServer.SendMsgStatus`
pub const SEND_MESSAGE: u32 = 0x82d40a69;
/// `liteServer.sendMsgStatus status:int = liteServer.SendMsgStatus`
pub const SEND_MSG_STATUS: u32 = 0x97e55039;
/// `liteServer.getAccountState id:tonNode.blockIdExt account:liteServer.accountId = liteServer.AccountState`
pub const GET_ACCOUNT_STATE: u32 = 0x250e896b;
/// `liteServer.accountState id:tonNode.blockIdExt shardblk:tonNode.blockIdExt shard_proof:bytes proof:bytes state:bytes = liteServer.AccountState`
pub const ACCOUNT_STATE: u32 = 0x51c77970;
/// `liteServer.runSmcMethod mode:# id:tonNode.blockIdExt account:liteServer.accountId method_id:long params:bytes = liteServer.RunMethodResult`
pub const RUN_SMC_METHOD: u32 = 0xd25dc65c;
/// `liteServer.runMethodResult mode:# id:tonNode.blockIdExt shardblk:tonNode.blockIdExt shard_proof:mode.0?bytes proof:mode.0?bytes state_proof:mode.1?bytes init_c7:mode.3?bytes lib_extras:mode.4?bytes exit_code:int result:mode.2?bytes = liteServer.RunMethodResult`
pub const RUN_METHOD_RESULT: u32 = 0x6b619aa3;
/// `liteServer.getShardInfo id:tonNode.blockIdExt workchain:int shard:long exact:Bool = liteServer.ShardInfo`
pub const GET_SHARD_INFO: u32 = 0x25f4a246;
/// `liteServer.shardInfo id:tonNode.blockIdExt shardblk:tonNode.blockIdExt shard_proof:bytes shard_descr:bytes = liteServer.ShardInfo`
pub const SHARD_INFO: u32 = 0x84cde69f;
/// `liteServer.getAllShardsInfo id:tonNode.blockIdExt = liteServer.AllShardsInfo`
pub const GET_ALL_SHARDS_INFO: u32 = 0x6bfdd374;
/// `liteServer.allShardsInfo id:tonNode.blockIdExt proof:bytes data:bytes = liteServer.AllShardsInfo`
pub const ALL_SHARDS_INFO: u32 = 0x2de78f09;
/// `liteServer.getOneTransaction id:tonNode.blockIdExt account:liteServer.accountId lt:long = liteServer.TransactionInfo`
pub const GET_ONE_TRANSACTION: u32 = 0xea240fd4;
/// `liteServer.transactionInfo id:tonNode.blockIdExt proof:bytes transaction:bytes = liteServer.TransactionInfo`
pub const TRANSACTION_INFO: u32 = 0x47edde0e;
/// `liteServer.getTransactions count:# account:liteServer.accountId lt:long hash:int256 = liteServer.TransactionList`
pub const GET_TRANSACTIONS: u32 = 0xa1e7401c;
/// `liteServer.transactionList ids:(vector tonNode.blockIdExt) transactions:bytes = liteServer.TransactionList`
pub const TRANSACTION_LIST: u32 = 0x0bc6266f;
/// `liteServer.transactionId mode:# account:mode.0?int256 lt:mode.1?long hash:mode.2?int256 = liteServer.TransactionId`
pub const TRANSACTION_ID: u32 = 0xaf652fb1;
/// `liteServer.transactionId3 account:int256 lt:long = liteServer.TransactionId3`
pub const TRANSACTION_ID3: u32 = 0x77da812c;
/// `liteServer.listBlockTransactions id:tonNode.blockIdExt mode:# count:# after:mode.7?liteServer.transactionId3 reverse_order:mode.6?true want_proof:mode.5?true = liteServer.BlockTransactions`
pub const LIST_BLOCK_TRANSACTIONS: u32 = 0xdac7fcad;
/// `liteServer.blockTransactions id:tonNode.blockIdExt req_count:# incomplete:Bool ids:(vector liteServer.transactionId) proof:bytes = liteServer.BlockTransactions`
pub const BLOCK_TRANSACTIONS: u32 = 0x2bad8cbd;
/// `liteServer.listBlockTransactionsExt id:tonNode.blockIdExt mode:# count:# after:mode.7?liteServer.transactionId3 reverse_order:mode.6?true want_proof:mode.5?true = liteServer.BlockTransactionsExt`
pub const LIST_BLOCK_TRANSACTIONS_EXT: u32 = 0x5cdd7900;
/// `liteServer.blockTransactionsExt id:tonNode.blockIdExt req_count:# incomplete:Bool transactions:bytes proof:bytes = liteServer.BlockTransactionsExt`
pub const BLOCK_TRANSACTIONS_EXT: u32 = 0xe4fc8ffb;
/// `liteServer.getBlockProof mode:# known_block:tonNode.blockIdExt target_block:mode.0?tonNode.blockIdExt = liteServer.PartialBlockProof`
pub const GET_BLOCK_PROOF: u32 = 0x449cea8a;
/// `liteServer.partialBlockProof complete:Bool from:tonNode.blockIdExt to:tonNode.blockIdExt steps:(vector liteServer.BlockLink) = liteServer.PartialBlockProof`
pub const PARTIAL_BLOCK_PROOF: u32 = 0xc1d2d08e;
/// `liteServer.blockLinkBack to_key_block:Bool from:tonNode.blockIdExt to:tonNode.blockIdExt dest_proof:bytes proof:bytes state_proof:bytes = liteServer.BlockLink`
pub const BLOCK_LINK_BACK: u32 = 0xef1b7eef;
/// `liteServer.blockLinkForward to_key_block:Bool from:tonNode.blockIdExt to:tonNode.blockIdExt dest_proof:bytes config_proof:bytes signatures:liteServer.signatureSet = liteServer.BlockLink`
pub const BLOCK_LINK_FORWARD: u32 = 0x8a46fbcd;
/// `liteServer.signatureSet validator_set_hash:int catchain_seqno:int signatures:(vector liteServer.signature) = liteServer.SignatureSet`
pub const SIGNATURE_SET: u32 = 0xe6a644f6;
/// `liteServer.signature node_id_short:int256 signature:bytes = liteServer.Signature`
pub const SIGNATURE: u32 = 0x55f8dea3;
/// `liteServer.getConfigAll mode:# id:tonNode.blockIdExt = liteServer.ConfigInfo`
pub const GET_CONFIG_ALL: u32 = 0xb7261b91;
/// `liteServer.getConfigParams mode:# id:tonNode.blockIdExt param_list:(vector int) = liteServer.ConfigInfo`
pub const GET_CONFIG_PARAMS: u32 = 0x191c112a;
/// `liteServer.configInfo mode:# id:tonNode.blockIdExt state_proof:bytes config_proof:bytes = liteServer.ConfigInfo`
pub const CONFIG_INFO: u32 = 0x2f277bae;
/// `liteServer.getLibraries library_list:(vector int256) = liteServer.LibraryResult`
pub const GET_LIBRARIES: u32 = 0x62b622d1;
/// `liteServer.libraryResult result:(vector liteServer.libraryEntry) = liteServer.LibraryResult`
pub const LIBRARY_RESULT: u32 = 0x6bb97a11;
/// `liteServer.libraryEntry hash:int256 data:bytes = liteServer.LibraryEntry`
pub const LIBRARY_ENTRY: u32 = 0x4624ff8a;
/// `liteServer.waitMasterchainSeqno seqno:int timeout_ms:int = Object`
pub const WAIT_MASTERCHAIN_SEQNO: u32 = 0x92b8eaba;
/// `tonNode.blockId workchain:int shard:long seqno:int = tonNode.BlockId`
pub const BLOCK_ID: u32 = 0x67b1cdb7;
/// `tonNode.blockIdExt workchain:int shard:long seqno:int root_hash:int256 file_hash:int256 = tonNode.BlockIdExt`
pub const BLOCK_ID_EXT: u32 = 0x78eb5267;
/// `tonNode.zeroStateIdExt workchain:int root_hash:int256 file_hash:int256 = tonNode.ZeroStateIdExt`
pub const ZERO_STATE_ID_EXT: u32 = 0xae35721d;
/// `liteServer.accountId workchain:int id:int256 = liteServer.AccountId`
pub const ACCOUNT_ID: u32 = 0xc5e2a075;

#[cfg(test)]
mod tests {
    use super::*;
    use tonlite_crypto::tl_id;

    #[test]
    fn constructor_ids_match_schema_text() {
        assert_eq!(LITE_QUERY, tl_id("liteServer.query data:bytes = Object"));
        assert_eq!(
            LITE_ERROR,
            tl_id("liteServer.error code:int message:string = liteServer.Error")
        );
        assert_eq!(
            GET_MASTERCHAIN_INFO,
            tl_id("liteServer.getMasterchainInfo = liteServer.MasterchainInfo")
        );
        assert_eq!(
            MASTERCHAIN_INFO,
            tl_id("liteServer.masterchainInfo last:tonNode.blockIdExt state_root_hash:int256 init:tonNode.zeroStateIdExt = liteServer.MasterchainInfo")
        );
        assert_eq!(
            GET_MASTERCHAIN_INFO_EXT,
            tl_id("liteServer.getMasterchainInfoExt mode:# = liteServer.MasterchainInfoExt")
        );
        assert_eq!(
            MASTERCHAIN_INFO_EXT,
            tl_id("liteServer.masterchainInfoExt mode:# version:int capabilities:long last:tonNode.blockIdExt last_utime:int now:int state_root_hash:int256 init:tonNode.zeroStateIdExt = liteServer.MasterchainInfoExt")
        );
        assert_eq!(GET_TIME, tl_id("liteServer.getTime = liteServer.CurrentTime"));
        assert_eq!(
            CURRENT_TIME,
            tl_id("liteServer.currentTime now:int = liteServer.CurrentTime")
        );
        assert_eq!(GET_VERSION, tl_id("liteServer.getVersion = liteServer.Version"));
        assert_eq!(
            VERSION,
            tl_id("liteServer.version mode:# version:int capabilities:long now:int = liteServer.Version")
        );
        assert_eq!(
            GET_BLOCK,
            tl_id("liteServer.getBlock id:tonNode.blockIdExt = liteServer.BlockData")
        );
        assert_eq!(
            BLOCK_DATA,
            tl_id("liteServer.blockData id:tonNode.blockIdExt data:bytes = liteServer.BlockData")
        );
        assert_eq!(
            GET_BLOCK_HEADER,
            tl_id("liteServer.getBlockHeader id:tonNode.blockIdExt mode:# = liteServer.BlockHeader")
        );
        assert_eq!(
            BLOCK_HEADER,
            tl_id("liteServer.blockHeader id:tonNode.blockIdExt mode:# header_proof:bytes = liteServer.BlockHeader")
        );
        assert_eq!(
            LOOKUP_BLOCK,
            tl_id("liteServer.lookupBlock mode:# id:tonNode.blockId lt:mode.1?long utime:mode.2?int = liteServer.BlockHeader")
        );
        assert_eq!(
            SEND_MESSAGE,
            tl_id("liteServer.sendMessage body:bytes = liteServer.SendMsgStatus")
        );
        assert_eq!(
            SEND_MSG_STATUS,
            tl_id("liteServer.sendMsgStatus status:int = liteServer.SendMsgStatus")
        );
        assert_eq!(
            GET_ACCOUNT_STATE,
            tl_id("liteServer.getAccountState id:tonNode.blockIdExt account:liteServer.accountId = liteServer.AccountState")
        );
        assert_eq!(
            ACCOUNT_STATE,
            tl_id("liteServer.accountState id:tonNode.blockIdExt shardblk:tonNode.blockIdExt shard_proof:bytes proof:bytes state:bytes = liteServer.AccountState")
        );
        assert_eq!(
            RUN_SMC_METHOD,
            tl_id("liteServer.runSmcMethod mode:# id:tonNode.blockIdExt account:liteServer.accountId method_id:long params:bytes = liteServer.RunMethodResult")
        );
        assert_eq!(
            RUN_METHOD_RESULT,
            tl_id("liteServer.runMethodResult mode:# id:tonNode.blockIdExt shardblk:tonNode.blockIdExt shard_proof:mode.0?bytes proof:mode.0?bytes state_proof:mode.1?bytes init_c7:mode.3?bytes lib_extras:mode.4?bytes exit_code:int result:mode.2?bytes = liteServer.RunMethodResult")
        );
        assert_eq!(
            GET_SHARD_INFO,
            tl_id("liteServer.getShardInfo id:tonNode.blockIdExt workchain:int shard:long exact:Bool = liteServer.ShardInfo")
        );
        assert_eq!(
            SHARD_INFO,
            tl_id("liteServer.shardInfo id:tonNode.blockIdExt shardblk:tonNode.blockIdExt shard_proof:bytes shard_descr:bytes = liteServer.ShardInfo")
        );
        assert_eq!(
            GET_ALL_SHARDS_INFO,
            tl_id("liteServer.getAllShardsInfo id:tonNode.blockIdExt = liteServer.AllShardsInfo")
        );
        assert_eq!(
            ALL_SHARDS_INFO,
            tl_id("liteServer.allShardsInfo id:tonNode.blockIdExt proof:bytes data:bytes = liteServer.AllShardsInfo")
        );
        assert_eq!(
            GET_ONE_TRANSACTION,
            tl_id("liteServer.getOneTransaction id:tonNode.blockIdExt account:liteServer.accountId lt:long = liteServer.TransactionInfo")
        );
        assert_eq!(
            TRANSACTION_INFO,
            tl_id("liteServer.transactionInfo id:tonNode.blockIdExt proof:bytes transaction:bytes = liteServer.TransactionInfo")
        );
        assert_eq!(
            GET_TRANSACTIONS,
            tl_id("liteServer.getTransactions count:# account:liteServer.accountId lt:long hash:int256 = liteServer.TransactionList")
        );
        assert_eq!(
            TRANSACTION_LIST,
            tl_id("liteServer.transactionList ids:(vector tonNode.blockIdExt) transactions:bytes = liteServer.TransactionList")
        );
        assert_eq!(
            TRANSACTION_ID,
            tl_id("liteServer.transactionId mode:# account:mode.0?int256 lt:mode.1?long hash:mode.2?int256 = liteServer.TransactionId")
        );
        assert_eq!(
            TRANSACTION_ID3,
            tl_id("liteServer.transactionId3 account:int256 lt:long = liteServer.TransactionId3")
        );
        assert_eq!(
            LIST_BLOCK_TRANSACTIONS,
            tl_id("liteServer.listBlockTransactions id:tonNode.blockIdExt mode:# count:# after:mode.7?liteServer.transactionId3 reverse_order:mode.6?true want_proof:mode.5?true = liteServer.BlockTransactions")
        );
        assert_eq!(
            BLOCK_TRANSACTIONS,
            tl_id("liteServer.blockTransactions id:tonNode.blockIdExt req_count:# incomplete:Bool ids:(vector liteServer.transactionId) proof:bytes = liteServer.BlockTransactions")
        );
        assert_eq!(
            LIST_BLOCK_TRANSACTIONS_EXT,
            tl_id("liteServer.listBlockTransactionsExt id:tonNode.blockIdExt mode:# count:# after:mode.7?liteServer.transactionId3 reverse_order:mode.6?true want_proof:mode.5?true = liteServer.BlockTransactionsExt")
        );
        assert_eq!(
            BLOCK_TRANSACTIONS_EXT,
            tl_id("liteServer.blockTransactionsExt id:tonNode.blockIdExt req_count:# incomplete:Bool transactions:bytes proof:bytes = liteServer.BlockTransactionsExt")
        );
        assert_eq!(
            GET_BLOCK_PROOF,
            tl_id("liteServer.getBlockProof mode:# known_block:tonNode.blockIdExt target_block:mode.0?tonNode.blockIdExt = liteServer.PartialBlockProof")
        );
        assert_eq!(
            PARTIAL_BLOCK_PROOF,
            tl_id("liteServer.partialBlockProof complete:Bool from:tonNode.blockIdExt to:tonNode.blockIdExt steps:(vector liteServer.BlockLink) = liteServer.PartialBlockProof")
        );
        assert_eq!(
            BLOCK_LINK_BACK,
            tl_id("liteServer.blockLinkBack to_key_block:Bool from:tonNode.blockIdExt to:tonNode.blockIdExt dest_proof:bytes proof:bytes state_proof:bytes = liteServer.BlockLink")
        );
        assert_eq!(
            BLOCK_LINK_FORWARD,
            tl_id("liteServer.blockLinkForward to_key_block:Bool from:tonNode.blockIdExt to:tonNode.blockIdExt dest_proof:bytes config_proof:bytes signatures:liteServer.signatureSet = liteServer.BlockLink")
        );
        assert_eq!(
            SIGNATURE_SET,
            tl_id("liteServer.signatureSet validator_set_hash:int catchain_seqno:int signatures:(vector liteServer.signature) = liteServer.SignatureSet")
        );
        assert_eq!(
            SIGNATURE,
            tl_id("liteServer.signature node_id_short:int256 signature:bytes = liteServer.Signature")
        );
        assert_eq!(
            GET_CONFIG_ALL,
            tl_id("liteServer.getConfigAll mode:# id:tonNode.blockIdExt = liteServer.ConfigInfo")
        );
        assert_eq!(
            GET_CONFIG_PARAMS,
            tl_id("liteServer.getConfigParams mode:# id:tonNode.blockIdExt param_list:(vector int) = liteServer.ConfigInfo")
        );
        assert_eq!(
            CONFIG_INFO,
            tl_id("liteServer.configInfo mode:# id:tonNode.blockIdExt state_proof:bytes config_proof:bytes = liteServer.ConfigInfo")
        );
        assert_eq!(
            GET_LIBRARIES,
            tl_id("liteServer.getLibraries library_list:(vector int256) = liteServer.LibraryResult")
        );
        assert_eq!(
            LIBRARY_RESULT,
            tl_id("liteServer.libraryResult result:(vector liteServer.libraryEntry) = liteServer.LibraryResult")
        );
        assert_eq!(
            LIBRARY_ENTRY,
            tl_id("liteServer.libraryEntry hash:int256 data:bytes = liteServer.LibraryEntry")
        );
        assert_eq!(
            WAIT_MASTERCHAIN_SEQNO,
            tl_id("liteServer.waitMasterchainSeqno seqno:int timeout_ms:int = Object")
        );
        assert_eq!(
            BLOCK_ID,
            tl_id("tonNode.blockId workchain:int shard:long seqno:int = tonNode.BlockId")
        );
        assert_eq!(
            BLOCK_ID_EXT,
            tl_id("tonNode.blockIdExt workchain:int shard:long seqno:int root_hash:int256 file_hash:int256 = tonNode.BlockIdExt")
        );
        assert_eq!(
            ZERO_STATE_ID_EXT,
            tl_id("tonNode.zeroStateIdExt workchain:int root_hash:int256 file_hash:int256 = tonNode.ZeroStateIdExt")
        );
        assert_eq!(
            ACCOUNT_ID,
            tl_id("liteServer.accountId workchain:int id:int256 = liteServer.AccountId")
        );
    }
}
