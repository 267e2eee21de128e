//! The UDP node: socket, peer table, channel table and query dispatch.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::net::UdpSocket;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use tonlite_crypto::{key_id_ed25519, random_bytes_32, Ed25519Keypair, X25519Keypair};

use crate::udp::channel::{AdnlChannel, PendingChannel};
use crate::udp::packet::{build_initial_packet, parse_initial_packet, AddressList, PacketContents};
use crate::udp::peer::AdnlPeer;
use crate::udp::AdnlMessage;
use crate::{AdnlError, AdnlResult};

/// Answers incoming queries. Returning `None` drops the query.
pub type QueryHandler = Arc<dyn Fn(&[u8]) -> Option<Vec<u8>> + Send + Sync>;

#[derive(Debug, Clone)]
pub struct UdpNodeConfig {
    pub query_timeout: Duration,
}

impl Default for UdpNodeConfig {
    fn default() -> Self {
        Self {
            query_timeout: Duration::from_secs(3),
        }
    }
}

#[derive(Default)]
struct NodeState {
    /// Keyed by the peer's node key id.
    peers: HashMap<[u8; 32], AdnlPeer>,
    /// Incoming channel id to peer key id.
    channels: HashMap<[u8; 32], [u8; 32]>,
    pending_queries: HashMap<[u8; 32], oneshot::Sender<Vec<u8>>>,
}

struct NodeInner {
    keypair: Ed25519Keypair,
    key_id: [u8; 32],
    socket: UdpSocket,
    state: Mutex<NodeState>,
    reinit_date: i32,
    config: UdpNodeConfig,
    query_handler: Mutex<Option<QueryHandler>>,
    custom_tx: mpsc::UnboundedSender<([u8; 32], Vec<u8>)>,
}

fn lock<'a, T>(mutex: &'a Mutex<T>) -> std::sync::MutexGuard<'a, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn unix_now() -> i32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i32)
        .unwrap_or(0)
}

/// An ADNL UDP endpoint with one local identity key.
pub struct AdnlUdpNode {
    inner: Arc<NodeInner>,
    listener: JoinHandle<()>,
    custom_rx: Mutex<Option<mpsc::UnboundedReceiver<([u8; 32], Vec<u8>)>>>,
}

impl AdnlUdpNode {
    /// Binds with a freshly generated identity.
    pub async fn bind(addr: SocketAddr, config: UdpNodeConfig) -> AdnlResult<Self> {
        Self::bind_with_keypair(addr, Ed25519Keypair::generate(), config).await
    }

    pub async fn bind_with_keypair(
        addr: SocketAddr,
        keypair: Ed25519Keypair,
        config: UdpNodeConfig,
    ) -> AdnlResult<Self> {
        let socket = UdpSocket::bind(addr).await?;
        let (custom_tx, custom_rx) = mpsc::unbounded_channel();
        let key_id = key_id_ed25519(keypair.public_key());
        let inner = Arc::new(NodeInner {
            keypair,
            key_id,
            socket,
            state: Mutex::new(NodeState::default()),
            reinit_date: unix_now(),
            config,
            query_handler: Mutex::new(None),
            custom_tx,
        });
        debug!(key_id = %hex::encode(key_id), "adnl udp node bound");
        let listener = tokio::spawn(run_listener(Arc::clone(&inner)));
        Ok(Self {
            inner,
            listener,
            custom_rx: Mutex::new(Some(custom_rx)),
        })
    }

    pub fn local_addr(&self) -> AdnlResult<SocketAddr> {
        Ok(self.inner.socket.local_addr()?)
    }

    pub fn public_key(&self) -> &[u8; 32] {
        self.inner.keypair.public_key()
    }

    pub fn key_id(&self) -> &[u8; 32] {
        &self.inner.key_id
    }

    /// Installs the callback answering incoming queries.
    pub fn set_query_handler(&self, handler: QueryHandler) {
        *lock(&self.inner.query_handler) = Some(handler);
    }

    /// The stream of incoming `adnl.message.custom` payloads, tagged with
    /// the sender's key id. Can be taken once.
    pub fn take_custom_receiver(
        &self,
    ) -> Option<mpsc::UnboundedReceiver<([u8; 32], Vec<u8>)>> {
        lock(&self.custom_rx).take()
    }

    /// Registers a peer and returns its key id.
    pub fn add_peer(&self, addr: SocketAddr, public_key: [u8; 32]) -> [u8; 32] {
        let peer = AdnlPeer::new(addr, public_key);
        let key_id = peer.key_id;
        lock(&self.inner.state)
            .peers
            .entry(key_id)
            .or_insert(peer);
        key_id
    }

    /// Sends a query to a known peer and waits for the answer. The first
    /// packet to a fresh peer also opens a channel.
    pub async fn query(&self, peer_id: &[u8; 32], query: &[u8]) -> AdnlResult<Vec<u8>> {
        let query_id = random_bytes_32();
        let (tx, rx) = oneshot::channel();
        lock(&self.inner.state).pending_queries.insert(query_id, tx);

        let message = AdnlMessage::Query {
            query_id,
            query: query.to_vec(),
        };
        if let Err(err) = send_messages(&self.inner, peer_id, vec![message]).await {
            lock(&self.inner.state).pending_queries.remove(&query_id);
            return Err(err);
        }

        match tokio::time::timeout(self.inner.config.query_timeout, rx).await {
            Ok(Ok(answer)) => Ok(answer),
            Ok(Err(_)) => Err(AdnlError::ConnectionClosed),
            Err(_) => {
                lock(&self.inner.state).pending_queries.remove(&query_id);
                Err(AdnlError::QueryTimeout)
            }
        }
    }

    /// Sends a one-way `adnl.message.custom`.
    pub async fn send_custom(&self, peer_id: &[u8; 32], data: &[u8]) -> AdnlResult<()> {
        let message = AdnlMessage::Custom {
            data: data.to_vec(),
        };
        send_messages(&self.inner, peer_id, vec![message]).await
    }
}

impl Drop for AdnlUdpNode {
    fn drop(&mut self) {
        self.listener.abort();
    }
}

impl std::fmt::Debug for AdnlUdpNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdnlUdpNode")
            .field("key_id", &hex::encode(self.inner.key_id))
            .finish_non_exhaustive()
    }
}

async fn send_messages(
    inner: &Arc<NodeInner>,
    peer_id: &[u8; 32],
    messages: Vec<AdnlMessage>,
) -> AdnlResult<()> {
    let (wire, addr) = build_datagram(inner, peer_id, messages)?;
    inner.socket.send_to(&wire, addr).await?;
    Ok(())
}

/// Builds the outgoing datagram under the state lock. Channel packets are
/// used once the channel is confirmed; everything before that travels
/// out-of-channel, signed, with a `createChannel` offer attached.
fn build_datagram(
    inner: &Arc<NodeInner>,
    peer_id: &[u8; 32],
    mut messages: Vec<AdnlMessage>,
) -> AdnlResult<(Vec<u8>, SocketAddr)> {
    let mut guard = lock(&inner.state);
    let peer = guard.peers.get_mut(peer_id).ok_or(AdnlError::UnknownPeer)?;

    let use_channel = peer.channel_ready && peer.channel.is_some();
    if !use_channel && peer.channel.is_none() {
        // Keep offering the channel on every out-of-channel packet until
        // the peer confirms.
        if peer.pending_channel.is_none() {
            peer.pending_channel = Some(PendingChannel::new(unix_now()));
        }
        if let Some(pending) = &peer.pending_channel {
            messages.insert(
                0,
                AdnlMessage::CreateChannel {
                    key: *pending.public_key(),
                    date: pending.date(),
                },
            );
        }
    }

    let mut contents = PacketContents::new();
    if messages.len() == 1 {
        contents.message = messages.pop();
    } else {
        contents.messages = Some(messages);
    }
    contents.seqno = Some(peer.take_seqno());
    contents.confirm_seqno = Some(peer.confirm_seqno);

    let wire = if use_channel {
        let channel = peer.channel.as_ref().ok_or(AdnlError::ChannelNotEstablished)?;
        channel.encrypt_packet(&contents.serialize())
    } else {
        contents.from = Some(*inner.keypair.public_key());
        contents.address = Some(AddressList {
            addrs: Vec::new(),
            version: inner.reinit_date,
            reinit_date: inner.reinit_date,
            priority: 0,
            expire_at: 0,
        });
        contents.reinit_date = Some(inner.reinit_date);
        contents.dst_reinit_date = Some(peer.reinit_date);
        contents.sign(&inner.keypair);
        build_initial_packet(&contents, &peer.public_key, &inner.keypair)?
    };
    Ok((wire, peer.addr))
}

async fn run_listener(inner: Arc<NodeInner>) {
    let mut buf = vec![0u8; 64 * 1024];
    loop {
        let (len, src) = match inner.socket.recv_from(&mut buf).await {
            Ok(received) => received,
            Err(err) => {
                debug!(%err, "udp receive failed");
                continue;
            }
        };
        if let Err(err) = handle_datagram(&inner, &buf[..len], src).await {
            debug!(%err, %src, "dropping datagram");
        }
    }
}

async fn handle_datagram(
    inner: &Arc<NodeInner>,
    data: &[u8],
    src: SocketAddr,
) -> AdnlResult<()> {
    if data.len() < 32 {
        return Err(AdnlError::InvalidPacket("datagram too short".into()));
    }

    if data[..32] == inner.key_id {
        let (sender_public, contents) = parse_initial_packet(data, &inner.keypair)?;
        // Out-of-channel packets must be signed by their sender.
        contents.verify(&sender_public)?;
        let peer_id = key_id_ed25519(&sender_public);
        lock(&inner.state)
            .peers
            .entry(peer_id)
            .or_insert_with(|| AdnlPeer::new(src, sender_public));
        return process_contents(inner, peer_id, contents, src, false).await;
    }

    let mut channel_id = [0u8; 32];
    channel_id.copy_from_slice(&data[..32]);
    let (peer_id, plaintext) = {
        let guard = lock(&inner.state);
        let peer_id = *guard
            .channels
            .get(&channel_id)
            .ok_or(AdnlError::UnknownKeyId)?;
        let peer = guard.peers.get(&peer_id).ok_or(AdnlError::UnknownPeer)?;
        let channel = peer.channel.as_ref().ok_or(AdnlError::ChannelNotEstablished)?;
        (peer_id, channel.decrypt_packet(data)?)
    };
    let contents = PacketContents::parse(&plaintext)?;
    process_contents(inner, peer_id, contents, src, true).await
}

async fn process_contents(
    inner: &Arc<NodeInner>,
    peer_id: [u8; 32],
    contents: PacketContents,
    src: SocketAddr,
    via_channel: bool,
) -> AdnlResult<()> {
    let mut replies = Vec::new();
    let mut queries = Vec::new();

    {
        let mut guard = lock(&inner.state);
        let state = &mut *guard;
        let peer = state.peers.get_mut(&peer_id).ok_or(AdnlError::UnknownPeer)?;
        peer.addr = src;
        if via_channel {
            // A decryptable channel packet proves the peer holds the keys.
            peer.channel_ready = true;
        }
        if let Some(seqno) = contents.seqno {
            peer.observe_seqno(seqno);
        }
        if let Some(date) = contents.reinit_date {
            peer.reinit_date = date;
        }

        for message in contents.into_messages() {
            match message {
                AdnlMessage::CreateChannel { key, date } => {
                    let our_half = X25519Keypair::generate();
                    let our_public = *our_half.public_key();
                    let channel =
                        AdnlChannel::derive(&our_half, &key, &inner.key_id, &peer_id, date);
                    state.channels.insert(*channel.recv_id(), peer_id);
                    peer.channel = Some(channel);
                    peer.channel_ready = false;
                    replies.push(AdnlMessage::ConfirmChannel {
                        key: our_public,
                        peer_key: key,
                        date,
                    });
                }
                AdnlMessage::ConfirmChannel { key, peer_key, .. } => {
                    let confirmed = match &peer.pending_channel {
                        Some(pending) if *pending.public_key() == peer_key => {
                            Some(pending.confirm(&key, &inner.key_id, &peer_id))
                        }
                        _ => {
                            trace!("confirmChannel for unknown channel key");
                            None
                        }
                    };
                    if let Some(channel) = confirmed {
                        state.channels.insert(*channel.recv_id(), peer_id);
                        peer.channel = Some(channel);
                        peer.channel_ready = true;
                        peer.pending_channel = None;
                    }
                }
                AdnlMessage::Query { query_id, query } => queries.push((query_id, query)),
                AdnlMessage::Answer { query_id, answer } => {
                    match state.pending_queries.remove(&query_id) {
                        Some(tx) => {
                            let _ = tx.send(answer);
                        }
                        None => trace!("answer to unknown query id"),
                    }
                }
                AdnlMessage::Custom { data } => {
                    let _ = inner.custom_tx.send((peer_id, data));
                }
                AdnlMessage::Part { .. } => {
                    debug!("dropping multipart message");
                }
            }
        }
    }

    let handler = lock(&inner.query_handler).clone();
    for (query_id, query) in queries {
        match handler.as_ref().and_then(|h| h(&query)) {
            Some(answer) => replies.push(AdnlMessage::Answer { query_id, answer }),
            None => trace!("query dropped without handler"),
        }
    }

    if !replies.is_empty() {
        send_messages(inner, &peer_id, replies).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn echo_handler() -> QueryHandler {
        Arc::new(|query: &[u8]| {
            let mut answer = query.to_vec();
            answer.reverse();
            Some(answer)
        })
    }

    #[tokio::test]
    async fn query_over_loopback_establishes_channel() {
        let alice = AdnlUdpNode::bind("127.0.0.1:0".parse().unwrap(), UdpNodeConfig::default())
            .await
            .unwrap();
        let bob = AdnlUdpNode::bind("127.0.0.1:0".parse().unwrap(), UdpNodeConfig::default())
            .await
            .unwrap();
        bob.set_query_handler(echo_handler());

        let bob_id = alice.add_peer(bob.local_addr().unwrap(), *bob.public_key());
        assert_eq!(bob_id, *bob.key_id());

        // First query travels out-of-channel and piggybacks createChannel.
        let answer = alice.query(&bob_id, b"adnl").await.unwrap();
        assert_eq!(answer, b"lnda");

        // Later queries use the established channel.
        let answer = alice.query(&bob_id, b"channel").await.unwrap();
        assert_eq!(answer, b"lennahc");
        {
            let guard = lock(&alice.inner.state);
            let peer = guard.peers.get(&bob_id).unwrap();
            assert!(peer.channel_ready, "channel not confirmed after answer");
        }
    }

    #[tokio::test]
    async fn custom_messages_are_delivered() {
        let alice = AdnlUdpNode::bind("127.0.0.1:0".parse().unwrap(), UdpNodeConfig::default())
            .await
            .unwrap();
        let bob = AdnlUdpNode::bind("127.0.0.1:0".parse().unwrap(), UdpNodeConfig::default())
            .await
            .unwrap();
        let mut custom = bob.take_custom_receiver().unwrap();

        let bob_id = alice.add_peer(bob.local_addr().unwrap(), *bob.public_key());
        alice.send_custom(&bob_id, b"out of band").await.unwrap();

        let (sender, data) = custom.recv().await.unwrap();
        assert_eq!(sender, *alice.key_id());
        assert_eq!(data, b"out of band");
    }

    #[tokio::test]
    async fn query_to_unknown_peer_fails() {
        let node = AdnlUdpNode::bind("127.0.0.1:0".parse().unwrap(), UdpNodeConfig::default())
            .await
            .unwrap();
        let err = node.query(&[0u8; 32], b"nobody home").await.unwrap_err();
        assert!(matches!(err, AdnlError::UnknownPeer));
    }

    #[tokio::test]
    async fn query_times_out_without_answer() {
        let alice = AdnlUdpNode::bind(
            "127.0.0.1:0".parse().unwrap(),
            UdpNodeConfig {
                query_timeout: Duration::from_millis(100),
            },
        )
        .await
        .unwrap();
        // Bob has no query handler installed, so the query is dropped.
        let bob = AdnlUdpNode::bind("127.0.0.1:0".parse().unwrap(), UdpNodeConfig::default())
            .await
            .unwrap();
        let bob_id = alice.add_peer(bob.local_addr().unwrap(), *bob.public_key());
        let err = alice.query(&bob_id, b"silence").await.unwrap_err();
        assert!(matches!(err, AdnlError::QueryTimeout));
    }
}
