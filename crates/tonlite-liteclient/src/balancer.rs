//! Peer pool over the light-client surface.
//!
//! The balancer hides individual liteservers behind one query entry
//! point: requests go to the freshest, fastest alive peer, socket
//! timeouts trigger a retry elsewhere, and a background task keeps
//! pinging and reconnecting the pool.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::client::{LiteClient, LiteClientConfig};
use crate::config::GlobalConfig;
use crate::types::{AccountId, BlockIdExt, MasterchainInfo, SendMsgStatus, TransactionList};
use crate::vm::StackEntry;
use crate::{LiteError, LiteResult};

#[derive(Debug, Clone)]
pub struct BalancerConfig {
    pub client: LiteClientConfig,
    /// Extra attempts after a retryable failure.
    pub max_retries: usize,
    /// Concurrent requests a peer takes before the next one is
    /// preferred.
    pub max_req_per_peer: usize,
    pub ping_interval: Duration,
}

impl Default for BalancerConfig {
    fn default() -> Self {
        Self {
            client: LiteClientConfig::default(),
            max_retries: 1,
            max_req_per_peer: 10,
            ping_interval: Duration::from_secs(3),
        }
    }
}

struct Peer {
    addr: SocketAddr,
    public_key: [u8; 32],
    client: Option<Arc<LiteClient>>,
    alive: bool,
    avg_latency_ms: f64,
    in_flight: usize,
}

type SharedPeers = Arc<Mutex<Vec<Peer>>>;

fn lock_peers(peers: &SharedPeers) -> std::sync::MutexGuard<'_, Vec<Peer>> {
    peers.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A point-in-time view of one peer, for monitoring and tests.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeerStats {
    pub addr: SocketAddr,
    pub alive: bool,
    pub mc_seqno: u32,
    pub avg_latency_ms: f64,
    pub in_flight: usize,
}

struct Candidate {
    idx: usize,
    mc_seqno: u32,
    latency: f64,
    in_flight: usize,
}

/// Freshest head first, then fastest. The first candidate under the
/// in-flight cap wins; when all are saturated, the least loaded one.
fn pick(mut candidates: Vec<Candidate>, cap: usize) -> Option<usize> {
    candidates.sort_by(|a, b| {
        b.mc_seqno
            .cmp(&a.mc_seqno)
            .then(a.latency.total_cmp(&b.latency))
    });
    candidates
        .iter()
        .find(|c| c.in_flight < cap)
        .or_else(|| candidates.iter().min_by_key(|c| c.in_flight))
        .map(|c| c.idx)
}

fn update_latency(avg: &mut f64, sample_ms: f64) {
    *avg = if *avg == 0.0 {
        sample_ms
    } else {
        *avg * 0.75 + sample_ms * 0.25
    };
}

/// The light-client surface over a pool of peers.
pub struct LiteBalancer {
    peers: SharedPeers,
    max_retries: usize,
    max_req_per_peer: usize,
    pinger: JoinHandle<()>,
}

impl Drop for LiteBalancer {
    fn drop(&mut self) {
        self.pinger.abort();
    }
}

impl LiteBalancer {
    /// Connects to every liteserver in the global config. Peers that
    /// fail to connect start out dead and are retried by the liveness
    /// task.
    pub async fn connect(config: &GlobalConfig, balancer: BalancerConfig) -> LiteResult<Self> {
        let mut list = Vec::with_capacity(config.liteservers.len());
        for desc in &config.liteservers {
            list.push((desc.socket_addr(), desc.public_key()?));
        }
        Ok(Self::from_peers(list, balancer).await)
    }

    pub async fn from_peers(
        list: Vec<(SocketAddr, [u8; 32])>,
        config: BalancerConfig,
    ) -> Self {
        let mut peers = Vec::with_capacity(list.len());
        for (addr, public_key) in list {
            let client = match LiteClient::connect(addr, &public_key, config.client.clone()).await
            {
                Ok(client) => Some(Arc::new(client)),
                Err(err) => {
                    warn!(%addr, %err, "liteserver connect failed");
                    None
                }
            };
            peers.push(Peer {
                addr,
                public_key,
                alive: client.is_some(),
                client,
                avg_latency_ms: 0.0,
                in_flight: 0,
            });
        }

        let peers: SharedPeers = Arc::new(Mutex::new(peers));
        let pinger = tokio::spawn(run_liveness(
            Arc::clone(&peers),
            config.client.clone(),
            config.ping_interval,
        ));
        Self {
            peers,
            max_retries: config.max_retries,
            max_req_per_peer: config.max_req_per_peer,
            pinger,
        }
    }

    pub fn peer_stats(&self) -> Vec<PeerStats> {
        lock_peers(&self.peers)
            .iter()
            .map(|p| PeerStats {
                addr: p.addr,
                alive: p.alive,
                mc_seqno: p
                    .client
                    .as_ref()
                    .and_then(|c| c.last_masterchain())
                    .map_or(0, |b| b.seqno),
                avg_latency_ms: p.avg_latency_ms,
                in_flight: p.in_flight,
            })
            .collect()
    }

    fn acquire(&self) -> LiteResult<(usize, Arc<LiteClient>)> {
        let mut peers = lock_peers(&self.peers);
        let candidates = peers
            .iter()
            .enumerate()
            .filter(|(_, p)| p.alive)
            .filter_map(|(idx, p)| {
                let client = p.client.as_ref()?;
                Some(Candidate {
                    idx,
                    mc_seqno: client.last_masterchain().map_or(0, |b| b.seqno),
                    latency: p.avg_latency_ms,
                    in_flight: p.in_flight,
                })
            })
            .collect();
        let idx = pick(candidates, self.max_req_per_peer).ok_or(LiteError::NoPeers)?;

        let peer = &mut peers[idx];
        let Some(client) = peer.client.as_ref() else {
            return Err(LiteError::NoPeers);
        };
        peer.in_flight += 1;
        Ok((idx, Arc::clone(client)))
    }

    fn finish(&self, idx: usize, latency: Option<Duration>, mark_dead: bool) {
        let mut peers = lock_peers(&self.peers);
        let Some(peer) = peers.get_mut(idx) else {
            return;
        };
        peer.in_flight = peer.in_flight.saturating_sub(1);
        if let Some(latency) = latency {
            update_latency(&mut peer.avg_latency_ms, latency.as_secs_f64() * 1000.0);
        }
        if mark_dead {
            peer.alive = false;
        }
    }

    /// Runs one operation against the best peer, retrying socket-level
    /// failures on other peers. Server, proof and get-method errors
    /// surface unchanged; a wrong proof from another peer would be
    /// equally wrong.
    pub async fn with_client<T, F, Fut>(&self, op: F) -> LiteResult<T>
    where
        F: Fn(Arc<LiteClient>) -> Fut,
        Fut: Future<Output = LiteResult<T>>,
    {
        let mut retries_left = self.max_retries;
        loop {
            let (idx, client) = self.acquire()?;
            let addr = client.peer_addr();
            let started = Instant::now();
            match op(client).await {
                Ok(value) => {
                    self.finish(idx, Some(started.elapsed()), false);
                    return Ok(value);
                }
                Err(err) if err.is_retryable() => {
                    self.finish(idx, None, true);
                    if retries_left == 0 {
                        return Err(err);
                    }
                    retries_left -= 1;
                    debug!(%addr, %err, "peer failed, retrying elsewhere");
                }
                Err(err) => {
                    self.finish(idx, Some(started.elapsed()), false);
                    return Err(err);
                }
            }
        }
    }

    pub async fn get_masterchain_info(&self) -> LiteResult<MasterchainInfo> {
        self.with_client(|c| async move { c.get_masterchain_info().await })
            .await
    }

    pub async fn get_time(&self) -> LiteResult<i32> {
        self.with_client(|c| async move { c.get_time().await }).await
    }

    pub async fn get_account_state(
        &self,
        block: &BlockIdExt,
        account: &AccountId,
    ) -> LiteResult<crate::types::AccountState> {
        self.with_client(|c| async move { c.get_account_state(block, account).await })
            .await
    }

    pub async fn run_get_method(
        &self,
        block: &BlockIdExt,
        account: &AccountId,
        method: &str,
        stack: &[StackEntry],
    ) -> LiteResult<Vec<StackEntry>> {
        self.with_client(|c| async move { c.run_get_method(block, account, method, stack).await })
            .await
    }

    pub async fn get_transactions(
        &self,
        account: &AccountId,
        count: u32,
        lt: u64,
        hash: &[u8; 32],
    ) -> LiteResult<TransactionList> {
        self.with_client(|c| async move { c.get_transactions(account, count, lt, hash).await })
            .await
    }

    pub async fn send_message(&self, body: &[u8]) -> LiteResult<SendMsgStatus> {
        self.with_client(|c| async move { c.send_message(body).await })
            .await
    }
}

impl std::fmt::Debug for LiteBalancer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiteBalancer")
            .field("peers", &lock_peers(&self.peers).len())
            .finish_non_exhaustive()
    }
}

/// Pings every peer each tick; dead or unpingable peers are
/// reconnected in place.
async fn run_liveness(peers: SharedPeers, client_config: LiteClientConfig, interval: Duration) {
    let mut timer = tokio::time::interval(interval);
    timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    timer.tick().await;
    loop {
        timer.tick().await;
        let snapshot: Vec<(usize, Option<Arc<LiteClient>>, SocketAddr, [u8; 32], bool)> =
            lock_peers(&peers)
                .iter()
                .enumerate()
                .map(|(idx, p)| (idx, p.client.clone(), p.addr, p.public_key, p.alive))
                .collect();

        for (idx, client, addr, public_key, alive) in snapshot {
            let healthy = match (&client, alive) {
                (Some(c), true) => !c.is_closed() && c.ping().await.is_ok(),
                _ => false,
            };
            if healthy {
                continue;
            }
            match LiteClient::connect(addr, &public_key, client_config.clone()).await {
                Ok(client) => {
                    debug!(%addr, "peer reconnected");
                    let mut peers = lock_peers(&peers);
                    if let Some(peer) = peers.get_mut(idx) {
                        peer.client = Some(Arc::new(client));
                        peer.alive = true;
                        peer.avg_latency_ms = 0.0;
                    }
                }
                Err(err) => {
                    debug!(%addr, %err, "peer unreachable");
                    let mut peers = lock_peers(&peers);
                    if let Some(peer) = peers.get_mut(idx) {
                        peer.alive = false;
                    }
                }
            }
        }
    }
}
