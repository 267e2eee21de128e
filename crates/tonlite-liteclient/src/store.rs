//! On-disk cache of the verified key block.
//!
//! One small record per network, tagged by the init block's root hash
//! so caches for different networks can share a directory. Records are
//! written atomically and expire with the persistent state they point
//! at.

use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{debug, warn};

use crate::types::BlockIdExt;
use crate::{LiteError, LiteResult};

const RECORD_LEN: usize = 4 + 4 + 80 + 80;
const BLOCK_ID_LEN: usize = 80;
const SUFFIX: &str = ".blks";

/// What survives a restart: the latest verified key block and the
/// masterchain head it was reached from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoredRecord {
    /// Expiry of the key block's persistent state.
    pub ttl: u32,
    /// The key block's generation time.
    pub key_ts: u32,
    pub key_block: BlockIdExt,
    pub last_mc: BlockIdExt,
}

pub(crate) fn unix_now() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as u32)
        .unwrap_or(0)
}

/// Expiry of the persistent state generated at `ts`. States on coarser
/// time boundaries live longer; the zero state never expires.
pub fn persistent_state_ttl(ts: u32) -> u32 {
    let x = ts >> 17;
    if x == 0 {
        return u32::MAX;
    }
    let ttl = u64::from(ts) + ((1u64 << 18) << x.trailing_zeros());
    ttl.min(u64::from(u32::MAX)) as u32
}

fn write_block_id(out: &mut Vec<u8>, id: &BlockIdExt) {
    out.extend_from_slice(&id.workchain.to_be_bytes());
    out.extend_from_slice(&id.shard.to_be_bytes());
    out.extend_from_slice(&id.seqno.to_be_bytes());
    out.extend_from_slice(&id.root_hash);
    out.extend_from_slice(&id.file_hash);
}

fn read_block_id(data: &[u8; BLOCK_ID_LEN]) -> BlockIdExt {
    let mut root_hash = [0u8; 32];
    let mut file_hash = [0u8; 32];
    root_hash.copy_from_slice(&data[16..48]);
    file_hash.copy_from_slice(&data[48..80]);
    BlockIdExt::new(
        i32::from_be_bytes([data[0], data[1], data[2], data[3]]),
        i64::from_be_bytes([
            data[4], data[5], data[6], data[7], data[8], data[9], data[10], data[11],
        ]),
        u32::from_be_bytes([data[12], data[13], data[14], data[15]]),
        root_hash,
        file_hash,
    )
}

impl StoredRecord {
    fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(RECORD_LEN);
        out.extend_from_slice(&self.ttl.to_be_bytes());
        out.extend_from_slice(&self.key_ts.to_be_bytes());
        write_block_id(&mut out, &self.key_block);
        write_block_id(&mut out, &self.last_mc);
        out
    }

    fn decode(data: &[u8]) -> LiteResult<Self> {
        let data: &[u8; RECORD_LEN] = data
            .try_into()
            .map_err(|_| LiteError::Store(format!("record is {} bytes", data.len())))?;
        let mut key_block = [0u8; BLOCK_ID_LEN];
        let mut last_mc = [0u8; BLOCK_ID_LEN];
        key_block.copy_from_slice(&data[8..88]);
        last_mc.copy_from_slice(&data[88..168]);
        Ok(Self {
            ttl: u32::from_be_bytes([data[0], data[1], data[2], data[3]]),
            key_ts: u32::from_be_bytes([data[4], data[5], data[6], data[7]]),
            key_block: read_block_id(&key_block),
            last_mc: read_block_id(&last_mc),
        })
    }

    pub fn is_expired(&self, now: u32) -> bool {
        self.ttl <= now
    }
}

/// A directory of `.blks` records, one live record per network tag.
#[derive(Debug, Clone)]
pub struct BlockStore {
    dir: PathBuf,
    /// Hex of the init block's root hash; the per-network filename tail.
    tag: String,
}

impl BlockStore {
    pub fn new(dir: impl Into<PathBuf>, init_block: &BlockIdExt) -> Self {
        Self {
            dir: dir.into(),
            tag: hex::encode(init_block.root_hash),
        }
    }

    fn file_name(&self, record: &StoredRecord) -> String {
        // The header (ttl, key_ts, key block) doubles as the name, so
        // concurrent writers of the same record converge on one file.
        let encoded = record.encode();
        format!("{}{}{SUFFIX}", hex::encode(&encoded[..88]), self.tag)
    }

    fn matches_tag(&self, name: &str) -> bool {
        name.strip_suffix(SUFFIX)
            .is_some_and(|stem| stem.ends_with(&self.tag))
    }

    /// Loads the freshest unexpired record for this network, deleting
    /// expired ones along the way.
    pub async fn load(&self) -> LiteResult<Option<StoredRecord>> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let now = unix_now();
        let mut best: Option<StoredRecord> = None;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if !self.matches_tag(name) {
                continue;
            }
            let path = entry.path();
            let record = match tokio::fs::read(&path).await {
                Ok(data) => match StoredRecord::decode(&data) {
                    Ok(record) => record,
                    Err(e) => {
                        warn!(file = %path.display(), "discarding malformed record: {e}");
                        tokio::fs::remove_file(&path).await.ok();
                        continue;
                    }
                },
                Err(e) => {
                    warn!(file = %path.display(), "unreadable record: {e}");
                    continue;
                }
            };
            if record.is_expired(now) {
                debug!(file = %path.display(), "removing expired record");
                tokio::fs::remove_file(&path).await.ok();
                continue;
            }
            if best.map_or(true, |b| record.key_ts > b.key_ts) {
                best = Some(record);
            }
        }
        Ok(best)
    }

    /// Writes the record atomically and drops older records for the
    /// same network.
    pub async fn save(&self, record: &StoredRecord) -> LiteResult<()> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let name = self.file_name(record);
        let path = self.dir.join(&name);
        let tmp = self.dir.join(format!("{name}.tmp"));
        tokio::fs::write(&tmp, record.encode()).await?;
        tokio::fs::rename(&tmp, &path).await?;
        debug!(file = %path.display(), seqno = record.key_block.seqno, "saved key block");

        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let other = entry.file_name();
            let Some(other) = other.to_str() else { continue };
            if other != name && self.matches_tag(other) {
                tokio::fs::remove_file(entry.path()).await.ok();
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{MASTERCHAIN, SHARD_FULL};

    fn mc_block(seqno: u32, fill: u8) -> BlockIdExt {
        BlockIdExt::new(MASTERCHAIN, SHARD_FULL, seqno, [fill; 32], [fill; 32])
    }

    fn record(seqno: u32, key_ts: u32, ttl: u32) -> StoredRecord {
        StoredRecord {
            ttl,
            key_ts,
            key_block: mc_block(seqno, 1),
            last_mc: mc_block(seqno + 10, 2),
        }
    }

    #[test]
    fn ttl_follows_state_period() {
        // States on coarser boundaries live longer.
        assert_eq!(persistent_state_ttl(1 << 17), (1 << 17) + (1 << 18));
        assert_eq!(persistent_state_ttl(1 << 20), (1 << 20) + (1 << 21));
        assert_eq!(persistent_state_ttl(3 << 17), (3 << 17) + (1 << 18));
        // The zero state never expires.
        assert_eq!(persistent_state_ttl(0), u32::MAX);
    }

    #[test]
    fn record_roundtrip() {
        let r = record(5, 1_700_000_000, u32::MAX);
        assert_eq!(StoredRecord::decode(&r.encode()).unwrap(), r);
        assert!(StoredRecord::decode(&[0u8; 10]).is_err());
    }

    #[tokio::test]
    async fn save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = BlockStore::new(dir.path(), &mc_block(0, 9));

        assert_eq!(store.load().await.unwrap(), None);

        let r = record(100, 1_700_000_000, u32::MAX);
        store.save(&r).await.unwrap();
        assert_eq!(store.load().await.unwrap(), Some(r));
    }

    #[tokio::test]
    async fn newer_record_replaces_older() {
        let dir = tempfile::tempdir().unwrap();
        let store = BlockStore::new(dir.path(), &mc_block(0, 9));

        store.save(&record(100, 1000, u32::MAX)).await.unwrap();
        let newer = record(200, 2000, u32::MAX);
        store.save(&newer).await.unwrap();

        assert_eq!(store.load().await.unwrap(), Some(newer));
        // The older file is gone, not just shadowed.
        let count = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn expired_record_is_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let store = BlockStore::new(dir.path(), &mc_block(0, 9));

        store.save(&record(100, 1000, 1)).await.unwrap();
        assert_eq!(store.load().await.unwrap(), None);
        let count = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn records_are_scoped_by_network() {
        let dir = tempfile::tempdir().unwrap();
        let mainnet = BlockStore::new(dir.path(), &mc_block(0, 9));
        let testnet = BlockStore::new(dir.path(), &mc_block(0, 7));

        let r = record(100, 1000, u32::MAX);
        mainnet.save(&r).await.unwrap();
        assert_eq!(testnet.load().await.unwrap(), None);
        assert_eq!(mainnet.load().await.unwrap(), Some(r));
    }
}
