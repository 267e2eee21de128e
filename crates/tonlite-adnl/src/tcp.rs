//! TCP client for liteserver sessions.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use tonlite_crypto::AesCtrCipher;
use tonlite_tl::TlReader;

use crate::frame::{decode_frame_body, encode_frame, frame_len};
use crate::handshake::build_handshake;
use crate::query::{build_ping, new_query_id, parse_answer, wrap_query};
use crate::{AdnlError, AdnlResult, ADNL_MESSAGE_ANSWER, TCP_PONG};

#[derive(Debug, Clone)]
pub struct TcpClientConfig {
    pub connect_timeout: Duration,
    pub query_timeout: Duration,
    pub ping_interval: Duration,
}

impl Default for TcpClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            query_timeout: Duration::from_secs(10),
            ping_interval: Duration::from_secs(3),
        }
    }
}

type PendingQueries = Arc<Mutex<HashMap<[u8; 32], oneshot::Sender<Vec<u8>>>>>;

fn lock_pending(pending: &PendingQueries) -> std::sync::MutexGuard<'_, HashMap<[u8; 32], oneshot::Sender<Vec<u8>>>> {
    pending.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Writer half of a session: frames are built, encrypted with the send
/// cipher and written as one continuous stream.
struct FrameSender {
    write: OwnedWriteHalf,
    cipher: AesCtrCipher,
}

impl FrameSender {
    async fn send(&mut self, payload: &[u8]) -> AdnlResult<()> {
        let mut frame = encode_frame(payload);
        self.cipher.apply_in_place(&mut frame);
        self.write.write_all(&frame).await?;
        self.write.flush().await?;
        Ok(())
    }
}

/// Reader half of a session.
struct FrameReceiver {
    read: OwnedReadHalf,
    cipher: AesCtrCipher,
}

impl FrameReceiver {
    async fn recv(&mut self) -> AdnlResult<Vec<u8>> {
        let mut prefix = [0u8; 4];
        self.read.read_exact(&mut prefix).await?;
        self.cipher.apply_in_place(&mut prefix);
        let len = frame_len(prefix)?;

        let mut body = vec![0u8; len];
        self.read.read_exact(&mut body).await?;
        self.cipher.apply_in_place(&mut body);
        decode_frame_body(&body)
    }
}

/// An established ADNL TCP session with a liteserver.
///
/// Share it behind an `Arc`: queries from any number of tasks are
/// multiplexed over the connection and matched to answers by query id.
pub struct AdnlTcpClient {
    sender: Arc<tokio::sync::Mutex<FrameSender>>,
    pending: PendingQueries,
    listener: JoinHandle<()>,
    pinger: JoinHandle<()>,
    config: TcpClientConfig,
    peer: SocketAddr,
}

impl AdnlTcpClient {
    /// Connects and completes the handshake with a server identified by its
    /// Ed25519 public key.
    pub async fn connect(
        addr: SocketAddr,
        server_public: &[u8; 32],
        config: TcpClientConfig,
    ) -> AdnlResult<Self> {
        let stream = tokio::time::timeout(config.connect_timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| AdnlError::QueryTimeout)??;
        stream.set_nodelay(true)?;

        let (handshake, ciphers) = build_handshake(server_public)?;
        let (read, write) = stream.into_split();
        let mut sender = FrameSender {
            write,
            cipher: ciphers.send,
        };
        let mut receiver = FrameReceiver {
            read,
            cipher: ciphers.recv,
        };

        sender.write.write_all(&handshake).await?;
        sender.write.flush().await?;

        // The server confirms the session with an empty frame.
        let confirm = tokio::time::timeout(config.connect_timeout, receiver.recv())
            .await
            .map_err(|_| AdnlError::HandshakeFailed("confirmation timed out".into()))??;
        if !confirm.is_empty() {
            return Err(AdnlError::HandshakeFailed(format!(
                "expected empty confirmation frame, got {} bytes",
                confirm.len()
            )));
        }
        debug!(%addr, "adnl tcp session established");

        let sender = Arc::new(tokio::sync::Mutex::new(sender));
        let pending: PendingQueries = Arc::new(Mutex::new(HashMap::new()));

        let listener = tokio::spawn(run_listener(receiver, Arc::clone(&pending)));
        let pinger = tokio::spawn(run_pinger(Arc::clone(&sender), config.ping_interval));

        Ok(Self {
            sender,
            pending,
            listener,
            pinger,
            config,
            peer: addr,
        })
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// Sends a query and waits for the matching answer with the configured
    /// timeout.
    pub async fn query(&self, query: &[u8]) -> AdnlResult<Vec<u8>> {
        self.query_with_timeout(query, self.config.query_timeout).await
    }

    pub async fn query_with_timeout(
        &self,
        query: &[u8],
        timeout: Duration,
    ) -> AdnlResult<Vec<u8>> {
        let query_id = new_query_id();
        let (tx, rx) = oneshot::channel();
        lock_pending(&self.pending).insert(query_id, tx);

        let wire = wrap_query(&query_id, query);
        if let Err(err) = self.sender.lock().await.send(&wire).await {
            lock_pending(&self.pending).remove(&query_id);
            return Err(err);
        }

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(answer)) => Ok(answer),
            // Sender dropped: the listener died with the connection.
            Ok(Err(_)) => Err(AdnlError::ConnectionClosed),
            Err(_) => {
                lock_pending(&self.pending).remove(&query_id);
                Err(AdnlError::QueryTimeout)
            }
        }
    }

    /// Sends a `tcp.ping` outside the query map. The pong is consumed by
    /// the listener.
    pub async fn ping(&self) -> AdnlResult<()> {
        let wire = build_ping(rand::random());
        self.sender.lock().await.send(&wire).await
    }
}

impl Drop for AdnlTcpClient {
    fn drop(&mut self) {
        self.listener.abort();
        self.pinger.abort();
    }
}

impl std::fmt::Debug for AdnlTcpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdnlTcpClient")
            .field("peer", &self.peer)
            .finish_non_exhaustive()
    }
}

async fn run_listener(mut receiver: FrameReceiver, pending: PendingQueries) {
    loop {
        match receiver.recv().await {
            Ok(payload) => {
                if let Err(err) = dispatch_payload(&pending, &payload) {
                    debug!(%err, "dropping undecodable frame");
                }
            }
            Err(err) => {
                debug!(%err, "adnl tcp session closed");
                // Dropping the senders resolves every waiter with
                // ConnectionClosed.
                lock_pending(&pending).clear();
                return;
            }
        }
    }
}

async fn run_pinger(sender: Arc<tokio::sync::Mutex<FrameSender>>, interval: Duration) {
    let mut timer = tokio::time::interval(interval);
    timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    timer.tick().await;
    loop {
        timer.tick().await;
        let wire = build_ping(rand::random());
        if let Err(err) = sender.lock().await.send(&wire).await {
            debug!(%err, "ping failed, stopping pinger");
            return;
        }
    }
}

/// Routes every message in a frame payload. A single frame may carry
/// several consecutive messages.
fn dispatch_payload(pending: &PendingQueries, payload: &[u8]) -> AdnlResult<()> {
    let mut reader = TlReader::new(payload);
    while !reader.is_empty() {
        match reader.read_id()? {
            ADNL_MESSAGE_ANSWER => {
                let (query_id, answer) = parse_answer(&mut reader)?;
                match lock_pending(pending).remove(&query_id) {
                    // The waiter may have timed out already.
                    Some(tx) => {
                        let _ = tx.send(answer);
                    }
                    None => trace!("answer to unknown query id"),
                }
            }
            TCP_PONG => {
                let id = reader.read_u64()?;
                trace!(id, "pong");
            }
            other => return Err(AdnlError::UnexpectedMessage(other)),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tonlite_tl::TlWriter;

    fn answer_message(query_id: &[u8; 32], answer: &[u8]) -> Vec<u8> {
        let mut w = TlWriter::new();
        w.write_id(ADNL_MESSAGE_ANSWER);
        w.write_int256(query_id);
        w.write_bytes(answer);
        w.into_bytes()
    }

    #[test]
    fn dispatch_resolves_out_of_order_answers() {
        let pending: PendingQueries = Arc::new(Mutex::new(HashMap::new()));
        let id1 = [1u8; 32];
        let id2 = [2u8; 32];
        let (tx1, mut rx1) = oneshot::channel();
        let (tx2, mut rx2) = oneshot::channel();
        lock_pending(&pending).insert(id1, tx1);
        lock_pending(&pending).insert(id2, tx2);

        // One frame carrying the second answer before the first.
        let mut payload = answer_message(&id2, b"second");
        payload.extend_from_slice(&answer_message(&id1, b"first"));
        dispatch_payload(&pending, &payload).unwrap();

        assert_eq!(rx1.try_recv().unwrap(), b"first");
        assert_eq!(rx2.try_recv().unwrap(), b"second");
        assert!(lock_pending(&pending).is_empty());
    }

    #[test]
    fn dispatch_skips_pong_and_unknown_query_ids() {
        let pending: PendingQueries = Arc::new(Mutex::new(HashMap::new()));
        let mut payload = TCP_PONG.to_be_bytes().to_vec();
        payload.extend_from_slice(&7u64.to_le_bytes());
        payload.extend_from_slice(&answer_message(&[9u8; 32], b"orphan"));
        dispatch_payload(&pending, &payload).unwrap();
    }

    #[test]
    fn dispatch_rejects_unknown_constructor() {
        let pending: PendingQueries = Arc::new(Mutex::new(HashMap::new()));
        assert!(matches!(
            dispatch_payload(&pending, &0xdeadbeefu32.to_be_bytes()),
            Err(AdnlError::UnexpectedMessage(0xdeadbeef))
        ));
    }

    mod loopback {
        use super::*;
        use crate::handshake::{accept_handshake, HANDSHAKE_LEN};
        use crate::ADNL_MESSAGE_QUERY;
        use tokio::net::TcpListener;
        use tonlite_crypto::Ed25519Keypair;

        /// Minimal liteserver stand-in: accepts the handshake, confirms
        /// with an empty frame and answers every query with its payload
        /// reversed.
        async fn run_echo_server(listener: TcpListener, key: Ed25519Keypair) -> AdnlResult<()> {
            let (mut stream, _) = listener.accept().await?;
            let mut handshake = [0u8; HANDSHAKE_LEN];
            stream.read_exact(&mut handshake).await?;
            let ciphers = accept_handshake(&handshake, &key)?;

            let (read, write) = stream.into_split();
            let mut sender = FrameSender {
                write,
                cipher: ciphers.send,
            };
            let mut receiver = FrameReceiver {
                read,
                cipher: ciphers.recv,
            };
            sender.send(&[]).await?;

            loop {
                let payload = receiver.recv().await?;
                let mut reader = TlReader::new(&payload);
                match reader.read_id()? {
                    ADNL_MESSAGE_QUERY => {
                        let query_id = reader.read_int256()?;
                        let mut body = reader.read_bytes()?;
                        body.reverse();
                        sender.send(&answer_message(&query_id, &body)).await?;
                    }
                    crate::TCP_PING => {
                        let id = reader.read_u64()?;
                        let mut w = TlWriter::new();
                        w.write_id(TCP_PONG);
                        w.write_u64(id);
                        sender.send(w.as_bytes()).await?;
                    }
                    other => return Err(AdnlError::UnexpectedMessage(other)),
                }
            }
        }

        #[tokio::test]
        async fn query_roundtrip_over_loopback() {
            let key = Ed25519Keypair::generate();
            let server_public = *key.public_key();
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            tokio::spawn(async move {
                let _ = run_echo_server(listener, key).await;
            });

            let client = AdnlTcpClient::connect(addr, &server_public, TcpClientConfig::default())
                .await
                .unwrap();

            let answer = client.query(b"abcdef").await.unwrap();
            assert_eq!(answer, b"fedcba");

            // Concurrent queries share the session and demultiplex.
            let (a, b) = tokio::join!(client.query(b"one"), client.query(b"two"));
            assert_eq!(a.unwrap(), b"eno");
            assert_eq!(b.unwrap(), b"owt");

            client.ping().await.unwrap();
        }

        #[tokio::test]
        async fn query_times_out_without_answer() {
            let key = Ed25519Keypair::generate();
            let server_public = *key.public_key();
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            tokio::spawn(async move {
                // Confirm the session, then swallow every query.
                let (mut stream, _) = listener.accept().await.unwrap();
                let mut handshake = [0u8; HANDSHAKE_LEN];
                stream.read_exact(&mut handshake).await.unwrap();
                let ciphers = accept_handshake(&handshake, &key).unwrap();
                let (read, write) = stream.into_split();
                let mut sender = FrameSender {
                    write,
                    cipher: ciphers.send,
                };
                let mut receiver = FrameReceiver {
                    read,
                    cipher: ciphers.recv,
                };
                sender.send(&[]).await.unwrap();
                loop {
                    if receiver.recv().await.is_err() {
                        return;
                    }
                }
            });

            let client = AdnlTcpClient::connect(addr, &server_public, TcpClientConfig::default())
                .await
                .unwrap();
            let err = client
                .query_with_timeout(b"never answered", Duration::from_millis(50))
                .await
                .unwrap_err();
            assert!(matches!(err, AdnlError::QueryTimeout));
            assert!(lock_pending(&client.pending).is_empty());
        }
    }
}
