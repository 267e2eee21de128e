//! Iterative value lookup.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, trace};

use tonlite_adnl::udp::AdnlUdpNode;
use tonlite_tl::{TlReader, TlWriter};

use crate::distance::compare_to_target;
use crate::key::DhtKey;
use crate::node::DhtNode;
use crate::value::DhtValue;
use crate::{
    DhtError, DhtResult, DHT_FIND_VALUE, DHT_PING, DHT_PONG, DHT_VALUE_FOUND,
    DHT_VALUE_NOT_FOUND,
};

#[derive(Debug, Clone)]
pub struct DhtClientConfig {
    /// `k` asked of every queried node.
    pub ask_k: i32,
    /// Nodes queried per lookup round.
    pub alpha: usize,
    /// Upper bound on lookup rounds.
    pub max_rounds: usize,
    pub ping_interval: Duration,
}

impl Default for DhtClientConfig {
    fn default() -> Self {
        Self {
            ask_k: 6,
            alpha: 3,
            max_rounds: 8,
            ping_interval: Duration::from_secs(3),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A DHT client over one ADNL UDP endpoint.
///
/// Static (bootstrap) nodes get a pinger task each; nodes learned from
/// `valueNotFound` answers join the candidate set without one.
pub struct DhtClient {
    adnl: Arc<AdnlUdpNode>,
    known: Arc<Mutex<HashMap<[u8; 32], DhtNode>>>,
    pingers: Mutex<HashMap<[u8; 32], JoinHandle<()>>>,
    config: DhtClientConfig,
}

impl DhtClient {
    pub fn new(adnl: Arc<AdnlUdpNode>, config: DhtClientConfig) -> Self {
        Self {
            adnl,
            known: Arc::new(Mutex::new(HashMap::new())),
            pingers: Mutex::new(HashMap::new()),
            config,
        }
    }

    /// Registers a static node and starts its pinger.
    pub fn add_static_node(self: &Arc<Self>, node: DhtNode) -> DhtResult<[u8; 32]> {
        let peer_id = self.add_candidate(node)?;
        let mut pingers = lock(&self.pingers);
        if !pingers.contains_key(&peer_id) {
            let client = Arc::clone(self);
            let interval = self.config.ping_interval;
            pingers.insert(
                peer_id,
                tokio::spawn(async move {
                    let mut timer = tokio::time::interval(interval);
                    timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
                    timer.tick().await;
                    loop {
                        timer.tick().await;
                        if let Err(err) = client.ping(&peer_id).await {
                            debug!(peer = %hex::encode(peer_id), %err, "dht ping failed");
                        }
                    }
                }),
            );
        }
        Ok(peer_id)
    }

    /// Verifies a node descriptor and adds it to the candidate set.
    pub fn add_candidate(&self, node: DhtNode) -> DhtResult<[u8; 32]> {
        node.verify()?;
        let addr = node
            .socket_addr()
            .ok_or_else(|| DhtError::InvalidNode("node advertises no address".into()))?;
        let peer_id = self.adnl.add_peer(addr, node.public_key);
        lock(&self.known).entry(peer_id).or_insert(node);
        Ok(peer_id)
    }

    pub fn remove_node(&self, peer_id: &[u8; 32]) {
        lock(&self.known).remove(peer_id);
        if let Some(pinger) = lock(&self.pingers).remove(peer_id) {
            pinger.abort();
        }
    }

    /// `dht.ping`: checks the echoed random id.
    pub async fn ping(&self, peer_id: &[u8; 32]) -> DhtResult<()> {
        let random_id: u64 = rand::random();
        let mut w = TlWriter::with_capacity(12);
        w.write_id(DHT_PING);
        w.write_u64(random_id);
        let answer = self.adnl.query(peer_id, w.as_bytes()).await?;

        let mut r = TlReader::new(&answer);
        match r.read_id()? {
            DHT_PONG if r.read_u64()? == random_id => Ok(()),
            DHT_PONG => Err(DhtError::InvalidNode("pong with foreign id".into())),
            other => Err(DhtError::UnexpectedAnswer(other)),
        }
    }

    /// Iterative `findValue`: walks the candidate set in XOR order,
    /// widening it from `valueNotFound` node lists, until a verifiable
    /// value appears.
    pub async fn find_value(&self, key: &DhtKey) -> DhtResult<DhtValue> {
        let target = key.table_id();
        let mut visited: HashSet<[u8; 32]> = HashSet::new();

        for round in 0..self.config.max_rounds {
            let mut candidates: Vec<[u8; 32]> = lock(&self.known)
                .keys()
                .filter(|id| !visited.contains(*id))
                .copied()
                .collect();
            if candidates.is_empty() {
                break;
            }
            candidates.sort_by(|a, b| compare_to_target(&target, a, b));
            candidates.truncate(self.config.alpha);
            trace!(round, queried = candidates.len(), "dht lookup round");

            for peer_id in candidates {
                visited.insert(peer_id);
                match self.query_find_value(&peer_id, &target).await {
                    Ok(FindValueAnswer::Found(value)) => {
                        value.verify()?;
                        if value.key.key.table_id() != target {
                            debug!("value found under a different key, ignoring");
                            continue;
                        }
                        return Ok(value);
                    }
                    Ok(FindValueAnswer::NotFound(nodes)) => {
                        for node in nodes {
                            match self.add_candidate(node) {
                                Ok(id) => trace!(peer = %hex::encode(id), "learned dht node"),
                                Err(err) => debug!(%err, "rejecting advertised node"),
                            }
                        }
                    }
                    Err(err) => debug!(peer = %hex::encode(peer_id), %err, "findValue failed"),
                }
            }
        }
        Err(DhtError::ValueNotFound)
    }

    async fn query_find_value(
        &self,
        peer_id: &[u8; 32],
        target: &[u8; 32],
    ) -> DhtResult<FindValueAnswer> {
        let mut w = TlWriter::with_capacity(40);
        w.write_id(DHT_FIND_VALUE);
        w.write_int256(target);
        w.write_i32(self.config.ask_k);
        let answer = self.adnl.query(peer_id, w.as_bytes()).await?;

        let mut r = TlReader::new(&answer);
        match r.read_id()? {
            DHT_VALUE_FOUND => Ok(FindValueAnswer::Found(DhtValue::read_boxed(&mut r)?)),
            DHT_VALUE_NOT_FOUND => {
                // Bare dht.nodes: a plain vector of boxed dht.node.
                let count = r.read_u32()? as usize;
                let mut nodes = Vec::with_capacity(count.min(64));
                for _ in 0..count {
                    nodes.push(DhtNode::read_boxed(&mut r)?);
                }
                Ok(FindValueAnswer::NotFound(nodes))
            }
            other => Err(DhtError::UnexpectedAnswer(other)),
        }
    }
}

impl Drop for DhtClient {
    fn drop(&mut self) {
        for (_, pinger) in lock(&self.pingers).drain() {
            pinger.abort();
        }
    }
}

impl std::fmt::Debug for DhtClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DhtClient")
            .field("known", &lock(&self.known).len())
            .finish_non_exhaustive()
    }
}

enum FindValueAnswer {
    Found(DhtValue),
    NotFound(Vec<DhtNode>),
}
