//! End-to-end tests over in-process mock liteservers.
//!
//! The mock speaks the real wire protocol: ADNL TCP handshake, encrypted
//! frames and `liteServer.query` envelopes. Only the answers are canned.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};

use tonlite_adnl::frame::{decode_frame_body, encode_frame, frame_len};
use tonlite_adnl::handshake::{accept_handshake, HANDSHAKE_LEN};
use tonlite_adnl::{
    AdnlError, AdnlResult, TcpClientConfig, ADNL_MESSAGE_ANSWER, ADNL_MESSAGE_QUERY, TCP_PING,
    TCP_PONG,
};
use tonlite_crypto::{AesCtrCipher, Ed25519Keypair};
use tonlite_liteclient::types::{MASTERCHAIN, SHARD_FULL};
use tonlite_liteclient::{
    BalancerConfig, BlockIdExt, LiteBalancer, LiteClient, LiteClientConfig, TrustLevel,
    CURRENT_TIME, GET_MASTERCHAIN_INFO, GET_TIME, LITE_ERROR, LITE_QUERY, MASTERCHAIN_INFO,
    WAIT_MASTERCHAIN_SEQNO,
};
use tonlite_tl::{TlReader, TlWriter};

const MOCK_TIME: i32 = 1_717_171_717;

/// What the mock answers beyond seeding the masterchain head.
#[derive(Clone, Copy)]
enum Behavior {
    /// Answers every supported query.
    Normal { head: u32 },
    /// Answers masterchain-info queries but swallows everything else,
    /// so requests routed here run into the client-side timeout.
    SwallowQueries { head: u32 },
}

impl Behavior {
    fn head(self) -> u32 {
        match self {
            Behavior::Normal { head } | Behavior::SwallowQueries { head } => head,
        }
    }
}

struct Sender {
    write: OwnedWriteHalf,
    cipher: AesCtrCipher,
}

impl Sender {
    async fn send(&mut self, payload: &[u8]) -> AdnlResult<()> {
        let mut frame = encode_frame(payload);
        self.cipher.apply_in_place(&mut frame);
        self.write.write_all(&frame).await?;
        self.write.flush().await?;
        Ok(())
    }
}

// Shared so a parked waitMasterchainSeqno answer can be written from a
// spawned task while the session loop keeps reading.
type SharedSender = Arc<tokio::sync::Mutex<Sender>>;

struct Receiver {
    read: OwnedReadHalf,
    cipher: AesCtrCipher,
}

impl Receiver {
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

fn masterchain_info_answer(head: u32) -> Vec<u8> {
    let mut w = TlWriter::new();
    w.write_id(MASTERCHAIN_INFO);
    BlockIdExt::new(MASTERCHAIN, SHARD_FULL, head, [head as u8; 32], [2u8; 32]).write(&mut w);
    w.write_int256(&[0u8; 32]);
    w.write_i32(MASTERCHAIN);
    w.write_int256(&[3u8; 32]);
    w.write_int256(&[4u8; 32]);
    w.into_bytes()
}

async fn send_answer(sender: &SharedSender, query_id: &[u8; 32], answer: &[u8]) -> AdnlResult<()> {
    let mut w = TlWriter::new();
    w.write_id(ADNL_MESSAGE_ANSWER);
    w.write_int256(query_id);
    w.write_bytes(answer);
    sender.lock().await.send(w.as_bytes()).await
}

async fn handle_query(
    sender: &SharedSender,
    behavior: Behavior,
    query_id: [u8; 32],
    query: &[u8],
) -> AdnlResult<()> {
    let mut r = TlReader::new(query);
    if r.read_id()? != LITE_QUERY {
        return Ok(());
    }
    let request = r.read_bytes()?;
    let mut req = TlReader::new(&request);
    match req.read_id()? {
        GET_MASTERCHAIN_INFO => {
            send_answer(sender, &query_id, &masterchain_info_answer(behavior.head())).await
        }
        WAIT_MASTERCHAIN_SEQNO => {
            let _seqno = req.read_i32()?;
            let timeout_ms = req.read_i32()?;
            // The real server parks the query until the wait expires.
            let sender = Arc::clone(sender);
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(timeout_ms as u64)).await;
                let answer = masterchain_info_answer(behavior.head());
                let _ = send_answer(&sender, &query_id, &answer).await;
            });
            Ok(())
        }
        GET_TIME => match behavior {
            Behavior::Normal { .. } => {
                let mut w = TlWriter::new();
                w.write_id(CURRENT_TIME);
                w.write_i32(MOCK_TIME);
                send_answer(sender, &query_id, w.as_bytes()).await
            }
            Behavior::SwallowQueries { .. } => Ok(()),
        },
        _ => {
            let mut w = TlWriter::new();
            w.write_id(LITE_ERROR);
            w.write_i32(-400);
            w.write_string("not supported by mock");
            send_answer(sender, &query_id, w.as_bytes()).await
        }
    }
}

async fn serve_conn(
    mut stream: TcpStream,
    key: &Ed25519Keypair,
    behavior: Behavior,
) -> AdnlResult<()> {
    let mut handshake = [0u8; HANDSHAKE_LEN];
    stream.read_exact(&mut handshake).await?;
    let ciphers = accept_handshake(&handshake, key)?;

    let (read, write) = stream.into_split();
    let sender: SharedSender = Arc::new(tokio::sync::Mutex::new(Sender {
        write,
        cipher: ciphers.send,
    }));
    let mut receiver = Receiver {
        read,
        cipher: ciphers.recv,
    };
    sender.lock().await.send(&[]).await?;

    loop {
        let payload = receiver.recv().await?;
        let mut reader = TlReader::new(&payload);
        while !reader.is_empty() {
            match reader.read_id()? {
                ADNL_MESSAGE_QUERY => {
                    let query_id = reader.read_int256()?;
                    let query = reader.read_bytes()?;
                    handle_query(&sender, behavior, query_id, &query).await?;
                }
                TCP_PING => {
                    let id = reader.read_u64()?;
                    let mut w = TlWriter::new();
                    w.write_id(TCP_PONG);
                    w.write_u64(id);
                    sender.lock().await.send(w.as_bytes()).await?;
                }
                other => return Err(AdnlError::UnexpectedMessage(other)),
            }
        }
    }
}

/// Binds a mock liteserver on a loopback port and serves connections
/// until the test runtime drops.
async fn start_mock(behavior: Behavior) -> (SocketAddr, [u8; 32]) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let key = Arc::new(Ed25519Keypair::generate());
    let public = *key.public_key();
    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                return;
            };
            let key = Arc::clone(&key);
            tokio::spawn(async move {
                let _ = serve_conn(stream, &key, behavior).await;
            });
        }
    });
    (addr, public)
}

fn fast_client_config() -> LiteClientConfig {
    LiteClientConfig {
        tcp: TcpClientConfig {
            connect_timeout: Duration::from_secs(2),
            query_timeout: Duration::from_millis(300),
            ping_interval: Duration::from_secs(60),
        },
        trust_level: TrustLevel::TrustServer,
    }
}

#[tokio::test]
async fn client_queries_over_mock_session() {
    let (addr, key) = start_mock(Behavior::Normal { head: 100 }).await;
    let client = LiteClient::connect(addr, &key, fast_client_config())
        .await
        .unwrap();

    let info = client.get_masterchain_info().await.unwrap();
    assert_eq!(info.last.seqno, 100);
    assert_eq!(info.last.root_hash, [100u8; 32]);
    assert_eq!(client.get_time().await.unwrap(), MOCK_TIME);
    client.ping().await.unwrap();

    // The wait prefix parks the query server-side for timeout_ms.
    let info = client.wait_masterchain_seqno(101, 100).await.unwrap();
    assert_eq!(info.last.seqno, 100);

    assert!(!client.is_closed());
    assert_eq!(client.last_masterchain().unwrap().seqno, 100);
}

#[tokio::test]
async fn balancer_fails_over_from_silent_peer() {
    let (silent_addr, silent_key) = start_mock(Behavior::SwallowQueries { head: 200 }).await;
    let (good_addr, good_key) = start_mock(Behavior::Normal { head: 100 }).await;

    let config = BalancerConfig {
        client: fast_client_config(),
        max_retries: 1,
        max_req_per_peer: 10,
        // Keep the liveness task out of the way so the dead mark from
        // the failover is still observable at the end.
        ping_interval: Duration::from_secs(60),
    };
    let balancer = LiteBalancer::from_peers(
        vec![(silent_addr, silent_key), (good_addr, good_key)],
        config,
    )
    .await;

    // The background updaters feed both head caches.
    for _ in 0..500 {
        if balancer.peer_stats().iter().all(|p| p.mc_seqno > 0) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    let stats = balancer.peer_stats();
    assert!(stats.iter().all(|p| p.alive && p.mc_seqno > 0), "{stats:?}");

    // The silent peer advertises the freshest head, so it is tried
    // first; its timeout fails the request over to the healthy one.
    assert_eq!(balancer.get_time().await.unwrap(), MOCK_TIME);

    let stats = balancer.peer_stats();
    let silent = stats.iter().find(|p| p.addr == silent_addr).unwrap();
    let good = stats.iter().find(|p| p.addr == good_addr).unwrap();
    assert!(!silent.alive, "{stats:?}");
    assert_eq!(silent.in_flight, 0);
    assert!(good.alive);
    assert!(good.avg_latency_ms > 0.0);
    assert_eq!(good.in_flight, 0);
}
