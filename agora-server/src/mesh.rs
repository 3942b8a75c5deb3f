//! Peer mesh bootstrap: dial every peer with a lower id first, then fall
//! back to accepting inbound connections until the full mesh of `K-1`
//! channels is established. Deterministic without a coordinator because
//! each unordered pair of replicas always resolves to exactly one dialer
//! (the later starter) and one acceptor (the earlier starter).
//!
//! Bootstrap only establishes the raw TCP connections and resolves each
//! one to a peer id; it does not start decoding Lamport traffic. The
//! caller wires connections to the engine afterwards, once the engine
//! exists — mirroring the ordering of the system this was distilled
//! from, where connection establishment always finishes before the
//! per-peer message loops are spawned.

use std::collections::HashMap;
use std::time::Duration;

use agora_proto::wire::Message;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::error::BootstrapError;
use crate::lamport::EngineHandle;

/// How long to wait before retrying a dial that hasn't succeeded yet
/// during bootstrap. Peers that haven't started yet are expected, not
/// exceptional — this is the "recoverable at bootstrap" branch of the
/// error taxonomy.
const DIAL_RETRY_INTERVAL: Duration = Duration::from_millis(200);
const DIAL_ATTEMPTS: u32 = 25;

/// Establish a full mesh with every id in `peers`, returning one
/// connected [`TcpStream`] per peer, keyed by peer id.
pub async fn bootstrap(
    n: u32,
    self_addr: &str,
    peer_addrs: &HashMap<u32, String>,
    peers: &[u32],
) -> Result<HashMap<u32, TcpStream>, BootstrapError> {
    let listener = TcpListener::bind(self_addr)
        .await
        .map_err(|source| BootstrapError::PeerBind { addr: self_addr.to_string(), source })?;
    info!(addr = self_addr, "peer listener bound");

    let mut conns = HashMap::new();

    let mut sorted_peers: Vec<u32> = peers.to_vec();
    sorted_peers.sort_unstable();
    for peer_id in sorted_peers {
        let Some(addr) = peer_addrs.get(&peer_id) else {
            continue;
        };
        if let Some(stream) = dial_with_retry(n, addr).await {
            conns.insert(peer_id, stream);
        } else {
            warn!(peer_id, addr, "could not dial peer during bootstrap, will wait for inbound");
        }
    }

    while conns.len() < peers.len() {
        let (stream, remote) = listener
            .accept()
            .await
            .map_err(|e| BootstrapError::Handshake(e.to_string()))?;
        let (peer_id, stream) = accept_handshake(stream).await.inspect_err(|e| {
            warn!(%remote, error = %e, "peer handshake failed, aborting bootstrap");
        })?;
        info!(peer_id, %remote, "accepted peer connection");
        conns.insert(peer_id, stream);
    }

    Ok(conns)
}

async fn dial_with_retry(n: u32, addr: &str) -> Option<TcpStream> {
    for attempt in 0..DIAL_ATTEMPTS {
        match TcpStream::connect(addr).await {
            Ok(mut stream) => {
                let handshake = format!("{n}\n");
                if stream.write_all(handshake.as_bytes()).await.is_ok() {
                    return Some(stream);
                }
                return None;
            }
            Err(_) if attempt + 1 < DIAL_ATTEMPTS => {
                tokio::time::sleep(DIAL_RETRY_INTERVAL).await;
            }
            Err(_) => return None,
        }
    }
    None
}

async fn accept_handshake(stream: TcpStream) -> Result<(u32, TcpStream), BootstrapError> {
    let mut reader = BufReader::new(stream);
    let mut line = String::new();
    reader
        .read_line(&mut line)
        .await
        .map_err(|e| BootstrapError::Handshake(e.to_string()))?;
    let peer_id: u32 = line
        .trim()
        .parse()
        .map_err(|_| BootstrapError::Handshake(format!("unparseable handshake line {line:?}")))?;
    Ok((peer_id, reader.into_inner()))
}

/// An established link, split into its halves so the writer side can be
/// turned into an outbound channel immediately (needed to construct the
/// engine) while the reader side is handed to [`spawn_readers`] once an
/// [`EngineHandle`] exists to decode into.
pub struct PendingLink {
    read_half: tokio::net::tcp::OwnedReadHalf,
}

/// Spawn the writer task for every connection and return the outbound
/// sender map (what the engine needs at construction time) plus the
/// still-unspawned reader halves (what [`spawn_readers`] needs once the
/// engine exists).
pub fn spawn_writers(
    conns: HashMap<u32, TcpStream>,
) -> (HashMap<u32, mpsc::Sender<Message>>, HashMap<u32, PendingLink>) {
    let mut peer_tx = HashMap::new();
    let mut pending = HashMap::new();
    for (peer_id, stream) in conns {
        let (read_half, write_half) = stream.into_split();
        let (outbound_tx, mut outbound_rx) = mpsc::channel::<Message>(16);

        tokio::spawn(async move {
            let mut write_half = write_half;
            while let Some(msg) = outbound_rx.recv().await {
                match msg.to_line() {
                    Ok(line) => {
                        if write_half.write_all(line.as_bytes()).await.is_err() {
                            warn!(peer_id, "peer write failed, dropping link");
                            break;
                        }
                    }
                    Err(e) => warn!(peer_id, error = %e, "failed to encode outgoing message"),
                }
            }
        });

        peer_tx.insert(peer_id, outbound_tx);
        pending.insert(peer_id, PendingLink { read_half });
    }
    (peer_tx, pending)
}

/// Spawn the reader/decoder task for every pending link, feeding decoded
/// messages into `engine`.
pub fn spawn_readers(pending: HashMap<u32, PendingLink>, engine: EngineHandle) {
    for (peer_id, link) in pending {
        let decoder_engine = engine.clone();
        tokio::spawn(async move {
            let mut reader = BufReader::new(link.read_half);
            let mut line = String::new();
            loop {
                line.clear();
                match reader.read_line(&mut line).await {
                    Ok(0) => {
                        info!(peer_id, "peer closed connection");
                        break;
                    }
                    Ok(_) => match Message::from_line(&line) {
                        Ok(msg) => decoder_engine.deliver_peer_message(msg).await,
                        Err(e) => warn!(peer_id, error = %e, "dropping undecodable peer message"),
                    },
                    Err(e) => {
                        warn!(peer_id, error = %e, "peer read failed, dropping link");
                        break;
                    }
                }
            }
        });
    }
}
