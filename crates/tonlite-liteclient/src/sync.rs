//! Key-block trust-anchor sync.
//!
//! Starting from the stored record (or the configured init block), the
//! chain of proof links is walked up to the current masterchain head.
//! Every link is verified before the trusted pointer moves; key blocks
//! encountered on the way compete for the persisted anchor slot, which
//! prefers recent blocks whose persistent state will outlive the next
//! three weeks.

use tracing::{debug, info, warn};

use crate::client::LiteClient;
use crate::proof;
use crate::store::{persistent_state_ttl, unix_now, BlockStore, StoredRecord};
use crate::types::BlockIdExt;
use crate::{LiteError, LiteResult};

/// Remaining persistent-state lifetime a key block needs to be
/// preferred over older candidates.
const KEY_BLOCK_MARGIN: u32 = 21 * 86_400;

/// Upper bound on proof rounds per sync. Heads are minutes apart and a
/// round covers many links, so hitting this means the server is cycling.
const MAX_ROUNDS: usize = 10_000;

/// The anchor state after a successful sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncState {
    pub key_block: BlockIdExt,
    pub key_ts: u32,
    pub last_mc: BlockIdExt,
}

/// Tracks the best key block seen while stepping. The seqno never goes
/// backwards; among candidates with enough remaining lifetime the
/// latest wins.
struct KeyBlockTracker {
    now: u32,
    best: Option<(BlockIdExt, u32)>,
}

impl KeyBlockTracker {
    fn new(now: u32, seed: Option<(BlockIdExt, u32)>) -> Self {
        Self { now, best: seed }
    }

    fn is_long_lived(&self, ts: u32) -> bool {
        persistent_state_ttl(ts) > self.now.saturating_add(KEY_BLOCK_MARGIN)
    }

    fn offer(&mut self, id: BlockIdExt, ts: u32) {
        let Some((cur, cur_ts)) = self.best else {
            self.best = Some((id, ts));
            return;
        };
        if id.seqno < cur.seqno {
            return;
        }
        let take = match (self.is_long_lived(ts), self.is_long_lived(cur_ts)) {
            (true, _) => id.seqno > cur.seqno || !self.is_long_lived(cur_ts),
            (false, true) => false,
            (false, false) => persistent_state_ttl(ts) > persistent_state_ttl(cur_ts),
        };
        if take {
            self.best = Some((id, ts));
        }
    }

    fn best(&self) -> Option<(BlockIdExt, u32)> {
        self.best
    }
}

/// Walks verified proof links from `trusted` until `target` is reached.
async fn step_chain(
    client: &LiteClient,
    mut trusted: BlockIdExt,
    target: &BlockIdExt,
    tracker: &mut KeyBlockTracker,
) -> LiteResult<BlockIdExt> {
    for _ in 0..MAX_ROUNDS {
        if trusted.seqno >= target.seqno {
            return Ok(trusted);
        }
        let partial = client.get_block_proof(&trusted, Some(target)).await?;
        if partial.steps.is_empty() {
            return Err(LiteError::Proof(format!(
                "no proof links from {trusted} towards {target}"
            )));
        }
        for link in &partial.steps {
            let applied = proof::apply_link(&trusted, link)?;
            if applied.to_key_block {
                tracker.offer(applied.to, applied.gen_utime);
            }
            trusted = applied.to;
        }
        debug!(seqno = trusted.seqno, target = target.seqno, "proof chain advanced");
    }
    Err(LiteError::Proof("proof chain does not converge".into()))
}

/// Syncs the trust anchor to the current masterchain head and persists
/// it. `init_block` is the hard anchor used when nothing usable is
/// stored.
pub async fn sync_to_head(
    client: &LiteClient,
    store: &BlockStore,
    init_block: &BlockIdExt,
) -> LiteResult<SyncState> {
    let stored = store.load().await?;
    let target = client.get_masterchain_info().await?.last;

    let now = unix_now();
    let mut tracker = KeyBlockTracker::new(now, stored.map(|r| (r.key_block, r.key_ts)));

    let trusted = match stored {
        Some(record) => {
            // Prefer continuing from the head we already proved; fall
            // back to the key block, then to the init anchor.
            let mut result = step_chain(client, record.last_mc, &target, &mut tracker).await;
            if let Err(err) = &result {
                warn!(%err, "resuming from stored head failed, retrying from key block");
                result = step_chain(client, record.key_block, &target, &mut tracker).await;
            }
            match result {
                Ok(trusted) => trusted,
                Err(err) => {
                    warn!(%err, "stored record is unusable, restarting from init block");
                    step_chain(client, *init_block, &target, &mut tracker).await?
                }
            }
        }
        None => step_chain(client, *init_block, &target, &mut tracker).await?,
    };

    let (key_block, key_ts) = tracker
        .best()
        .unwrap_or((*init_block, 0));
    let record = StoredRecord {
        ttl: persistent_state_ttl(key_ts),
        key_ts,
        key_block,
        last_mc: trusted,
    };
    store.save(&record).await?;
    info!(
        key_seqno = key_block.seqno,
        head_seqno = trusted.seqno,
        "trust anchor synced"
    );
    Ok(SyncState {
        key_block,
        key_ts,
        last_mc: trusted,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{MASTERCHAIN, SHARD_FULL};

    fn key(seqno: u32) -> BlockIdExt {
        BlockIdExt::new(MASTERCHAIN, SHARD_FULL, seqno, [seqno as u8; 32], [0; 32])
    }

    // Timestamps aligned so their persistent state is long lived
    // relative to `now`.
    const NOW: u32 = 1 << 20;

    #[test]
    fn later_long_lived_key_block_wins() {
        let mut t = KeyBlockTracker::new(NOW, None);
        t.offer(key(10), 1 << 20);
        t.offer(key(20), 1 << 21);
        assert_eq!(t.best().unwrap().0.seqno, 20);
    }

    #[test]
    fn seqno_never_regresses() {
        let seed = Some((key(50), 1u32 << 21));
        let mut t = KeyBlockTracker::new(NOW, seed);
        // An earlier block never displaces the anchor, whatever its ttl.
        t.offer(key(10), 1 << 22);
        assert_eq!(t.best().unwrap().0.seqno, 50);
    }

    #[test]
    fn short_lived_block_does_not_displace_live_anchor() {
        let mut t = KeyBlockTracker::new(NOW, Some((key(50), 1 << 21)));
        // Newer, but its state expires within the margin.
        let short_ts = NOW - (1 << 17);
        assert!(!t.is_long_lived(short_ts));
        t.offer(key(60), short_ts);
        assert_eq!(t.best().unwrap().0.seqno, 50);
    }

    #[test]
    fn long_lived_block_displaces_expiring_anchor() {
        let short_ts = NOW - (1 << 17);
        let mut t = KeyBlockTracker::new(NOW, Some((key(50), short_ts)));
        t.offer(key(60), 1 << 21);
        assert_eq!(t.best().unwrap().0.seqno, 60);
    }
}
