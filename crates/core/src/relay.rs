//! Relay engine (C5): UDP receive loop, dedup, TTL decrement, flood,
//! discovery, and maintenance — the heart of the mesh relay.
//!
//! Two long-lived loops run on plain OS threads rather than async tasks:
//! both are blocking by nature (`recv_from`, `sleep`), so they map directly
//! onto `std::thread` with an explicit `running` flag and `JoinHandle`
//! rather than onto a task scheduler. A caller already running inside an
//! async runtime should invoke these methods from a blocking context (e.g.
//! `spawn_blocking`), the same way it would any other blocking FFI boundary.

use std::net::{SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use meshward_types::{
    DiscoveryPayload, Message, MessageKind, PeerRecord, RoutingPayload, WireEnvelope,
    BROADCAST_RECIPIENT, DISCOVERY_TTL, MAX_DATAGRAM_BYTES, ROUTING_TTL,
};
use tracing::{debug, info, warn};

use crate::codec;
use crate::config::{BroadcastMode, RelayConfig};
use crate::crypto::CryptoBackend;
use crate::dedup::DedupSet;
use crate::error::RelayError;
use crate::peer::PeerTable;

/// A `text` or `voice` message addressed to this node. Discovery and
/// routing messages are consumed internally and never reach this callback.
#[derive(Debug, Clone)]
pub struct DeliveredMessage {
    pub sender_id: String,
    pub kind: MessageKind,
    pub payload: String,
}

pub type DeliveryCallback = dyn Fn(DeliveredMessage) + Send + Sync;

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

pub struct RelayEngine {
    node_id: String,
    port: u16,
    config: RelayConfig,
    crypto: Arc<dyn CryptoBackend>,
    peers: Arc<PeerTable>,
    dedup: Arc<DedupSet>,
    socket: Arc<UdpSocket>,
    running: Arc<AtomicBool>,
    on_delivery: Arc<DeliveryCallback>,
    decrypt_failures: Arc<AtomicU64>,
    decode_failures: Arc<AtomicU64>,
    send_failures: Arc<AtomicU64>,
    receive_handle: Mutex<Option<JoinHandle<()>>>,
    maintenance_handle: Mutex<Option<JoinHandle<()>>>,
}

impl RelayEngine {
    /// Binds the UDP socket and constructs the engine. Does not start the
    /// receive/maintenance threads — call `start()` for that.
    pub fn new(
        config: RelayConfig,
        crypto: Box<dyn CryptoBackend>,
        on_delivery: Box<DeliveryCallback>,
    ) -> Result<Self, RelayError> {
        let bind_addr = format!("{}:{}", config.bind_host, config.port);
        let socket = UdpSocket::bind(&bind_addr)?;
        socket.set_read_timeout(Some(Duration::from_millis(500)))?;
        let port = socket.local_addr()?.port();

        Ok(Self {
            node_id: config.node_id.clone(),
            port,
            peers: Arc::new(PeerTable::new(
                config.node_id.clone(),
                config.inactive_threshold_secs,
            )),
            dedup: Arc::new(DedupSet::new(
                Duration::from_secs(config.dedup_retention_secs),
                config.max_dedup_entries,
            )),
            crypto: Arc::from(crypto),
            socket: Arc::new(socket),
            running: Arc::new(AtomicBool::new(false)),
            on_delivery: Arc::from(on_delivery),
            decrypt_failures: Arc::new(AtomicU64::new(0)),
            decode_failures: Arc::new(AtomicU64::new(0)),
            send_failures: Arc::new(AtomicU64::new(0)),
            receive_handle: Mutex::new(None),
            maintenance_handle: Mutex::new(None),
            config,
        })
    }

    /// Idempotent: launches the receive and maintenance threads and emits
    /// an initial discovery announcement. A second call is a no-op.
    pub fn start(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }
        info!(node_id = %self.node_id, port = self.port, "starting relay engine");
        self.emit_discovery();

        let recv_handle = {
            let socket = Arc::clone(&self.socket);
            let crypto = Arc::clone(&self.crypto);
            let peers = Arc::clone(&self.peers);
            let dedup = Arc::clone(&self.dedup);
            let running = Arc::clone(&self.running);
            let on_delivery = Arc::clone(&self.on_delivery);
            let decrypt_failures = Arc::clone(&self.decrypt_failures);
            let decode_failures = Arc::clone(&self.decode_failures);
            let send_failures = Arc::clone(&self.send_failures);
            let node_id = self.node_id.clone();
            let config = self.config.clone();
            thread::spawn(move || {
                receive_loop(
                    socket,
                    crypto,
                    peers,
                    dedup,
                    running,
                    on_delivery,
                    decrypt_failures,
                    decode_failures,
                    send_failures,
                    node_id,
                    config,
                )
            })
        };

        let maint_handle = {
            let socket = Arc::clone(&self.socket);
            let crypto = Arc::clone(&self.crypto);
            let peers = Arc::clone(&self.peers);
            let dedup = Arc::clone(&self.dedup);
            let running = Arc::clone(&self.running);
            let send_failures = Arc::clone(&self.send_failures);
            let node_id = self.node_id.clone();
            let config = self.config.clone();
            let port = self.port;
            thread::spawn(move || {
                maintenance_loop(socket, crypto, peers, dedup, running, send_failures, node_id, port, config)
            })
        };

        *self.receive_handle.lock().expect("relay mutex poisoned") = Some(recv_handle);
        *self.maintenance_handle.lock().expect("relay mutex poisoned") = Some(maint_handle);
    }

    /// Signals shutdown and joins both threads. Safe to call even if
    /// `start()` was never called.
    pub fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        info!(node_id = %self.node_id, "stopping relay engine");
        if let Some(handle) = self.receive_handle.lock().expect("relay mutex poisoned").take() {
            let _ = handle.join();
        }
        if let Some(handle) = self.maintenance_handle.lock().expect("relay mutex poisoned").take() {
            let _ = handle.join();
        }
    }

    /// Originates a `text` message, addressed to a specific peer id or the
    /// broadcast sentinel.
    pub fn send_text(&self, recipient_id: &str, content: &str) -> Result<(), RelayError> {
        let message = Message {
            id: codec::generate_id(),
            sender_id: self.node_id.clone(),
            recipient_id: recipient_id.to_string(),
            kind: MessageKind::Text,
            payload: content.to_string(),
            timestamp: now_secs(),
            ttl: self.config.default_ttl,
        };
        self.dedup.check_and_insert(&message.id);
        self.broadcast(&message);
        Ok(())
    }

    /// Originates a `voice` message carrying base64-encoded PCM or WAV
    /// audio, with the (lower) voice hop budget.
    pub fn send_voice(&self, recipient_id: &str, audio_b64: &str) -> Result<(), RelayError> {
        let message = Message {
            id: codec::generate_id(),
            sender_id: self.node_id.clone(),
            recipient_id: recipient_id.to_string(),
            kind: MessageKind::Voice,
            payload: audio_b64.to_string(),
            timestamp: now_secs(),
            ttl: self.config.voice_ttl,
        };
        self.dedup.check_and_insert(&message.id);
        self.broadcast(&message);
        Ok(())
    }

    pub fn peers_snapshot(&self) -> Vec<PeerRecord> {
        self.peers.active()
    }

    /// Registers a peer directly, out of band. Flood discovery only ever
    /// reaches peers already in the table (`relay_message` forwards to
    /// `peers.active()`), so a node with nobody seeded has no target for
    /// its own discovery announcement. An operator who has exchanged
    /// node id / address / port / public key with a peer some other way
    /// (e.g. the fingerprint this engine's `node_id()`/`public_key()`
    /// print at startup) registers it here; normal discovery/routing
    /// floods take over from that point.
    pub fn seed_peer(&self, peer_id: &str, address: &str, port: u16, public_key: &str) {
        self.peers.upsert(peer_id, address, port, public_key);
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    pub fn public_key(&self) -> &[u8] {
        self.crypto.public_key_bytes()
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn decrypt_failure_count(&self) -> u64 {
        self.decrypt_failures.load(Ordering::Relaxed)
    }

    pub fn decode_failure_count(&self) -> u64 {
        self.decode_failures.load(Ordering::Relaxed)
    }

    pub fn send_failure_count(&self) -> u64 {
        self.send_failures.load(Ordering::Relaxed)
    }

    fn broadcast(&self, message: &Message) {
        relay_message(
            &self.socket,
            self.crypto.as_ref(),
            &self.peers,
            &self.config,
            message,
            None,
            &self.send_failures,
        );
    }

    fn emit_discovery(&self) {
        let payload = DiscoveryPayload {
            port: self.port,
            public_key: BASE64.encode(self.crypto.public_key_bytes()),
        };
        let Ok(payload_json) = codec::encode_discovery_payload(&payload) else {
            return;
        };
        let message = Message {
            id: codec::generate_id(),
            sender_id: self.node_id.clone(),
            recipient_id: BROADCAST_RECIPIENT.to_string(),
            kind: MessageKind::Discovery,
            payload: payload_json,
            timestamp: now_secs(),
            ttl: DISCOVERY_TTL,
        };
        self.dedup.check_and_insert(&message.id);
        self.broadcast(&message);
    }
}

/// Sends `message`'s wire encoding to every active peer (or a pre-shared
/// cluster key target), per the configured broadcast mode.
#[allow(clippy::too_many_arguments)]
fn relay_message(
    socket: &UdpSocket,
    crypto: &dyn CryptoBackend,
    peers: &PeerTable,
    config: &RelayConfig,
    message: &Message,
    exclude_peer_id: Option<&str>,
    send_failures: &AtomicU64,
) {
    let Ok(plaintext) = codec::encode(message) else {
        warn!(message_id = %message.id, "failed to encode outbound message, dropping");
        return;
    };

    match &config.broadcast_mode {
        BroadcastMode::PerPeerUnicast => {
            for peer in peers.active() {
                if Some(peer.id.as_str()) == exclude_peer_id {
                    continue;
                }
                let Ok(recipient_pub) = BASE64.decode(&peer.public_key) else {
                    warn!(peer = %peer.id, "peer has invalid base64 public key, skipping");
                    continue;
                };
                let envelope = match crypto.encrypt(plaintext.as_bytes(), &recipient_pub) {
                    Ok(envelope) => envelope,
                    Err(error) => {
                        warn!(peer = %peer.id, %error, "encrypt failed, skipping peer");
                        continue;
                    }
                };
                send_envelope(socket, &envelope, &format!("{}:{}", peer.address, peer.port), send_failures);
            }
        }
        BroadcastMode::ClusterKey { broadcast_addr } => {
            let self_pub = crypto.public_key_bytes().to_vec();
            match crypto.encrypt(plaintext.as_bytes(), &self_pub) {
                Ok(envelope) => send_envelope(socket, &envelope, broadcast_addr, send_failures),
                Err(error) => warn!(%error, "cluster-key encrypt failed"),
            }
        }
    }
}

fn send_envelope(socket: &UdpSocket, envelope: &WireEnvelope, target: &str, send_failures: &AtomicU64) {
    let Ok(bytes) = serde_json::to_vec(envelope) else {
        return;
    };
    if bytes.len() > MAX_DATAGRAM_BYTES {
        warn!(len = bytes.len(), "outbound datagram exceeds max size, dropping");
        return;
    }
    if let Err(error) = socket.send_to(&bytes, target) {
        send_failures.fetch_add(1, Ordering::Relaxed);
        debug!(%target, %error, "send_to failed");
    }
}

fn handle_discovery(message: &Message, src_addr: SocketAddr, peers: &PeerTable, node_id: &str) -> bool {
    let Ok(payload) = codec::decode_discovery_payload(&message.payload) else {
        return false;
    };
    peers.upsert(&message.sender_id, &src_addr.ip().to_string(), payload.port, &payload.public_key);
    message.sender_id != node_id
}

fn handle_routing(message: &Message, peers: &PeerTable, node_id: &str) {
    let Ok(payload) = codec::decode_routing_payload(&message.payload) else {
        return;
    };
    for record in payload.nodes {
        if record.id == node_id {
            continue;
        }
        if peers.lookup(&record.id).is_none() {
            peers.upsert(&record.id, &record.address, record.port, &record.public_key);
        }
    }
}

fn build_routing_reply(peers: &PeerTable, node_id: &str) -> Option<Message> {
    let payload = RoutingPayload { nodes: peers.active() };
    let payload_json = codec::encode_routing_payload(&payload).ok()?;
    Some(Message {
        id: codec::generate_id(),
        sender_id: node_id.to_string(),
        recipient_id: BROADCAST_RECIPIENT.to_string(),
        kind: MessageKind::Routing,
        payload: payload_json,
        timestamp: now_secs(),
        ttl: ROUTING_TTL,
    })
}

/// Classifies and acts on a decoded, not-yet-seen message. Returns a
/// routing reply to relay when a discovery announcement warrants one.
fn dispatch(
    message: &Message,
    src_addr: SocketAddr,
    peers: &PeerTable,
    node_id: &str,
    on_delivery: &DeliveryCallback,
) -> Option<Message> {
    match message.kind {
        MessageKind::Discovery => {
            if handle_discovery(message, src_addr, peers, node_id) {
                build_routing_reply(peers, node_id)
            } else {
                None
            }
        }
        MessageKind::Routing => {
            handle_routing(message, peers, node_id);
            None
        }
        MessageKind::Text | MessageKind::Voice => {
            if message.is_addressed_to(node_id) {
                on_delivery(DeliveredMessage {
                    sender_id: message.sender_id.clone(),
                    kind: message.kind,
                    payload: message.payload.clone(),
                });
            }
            None
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn receive_loop(
    socket: Arc<UdpSocket>,
    crypto: Arc<dyn CryptoBackend>,
    peers: Arc<PeerTable>,
    dedup: Arc<DedupSet>,
    running: Arc<AtomicBool>,
    on_delivery: Arc<DeliveryCallback>,
    decrypt_failures: Arc<AtomicU64>,
    decode_failures: Arc<AtomicU64>,
    send_failures: Arc<AtomicU64>,
    node_id: String,
    config: RelayConfig,
) {
    let mut buf = vec![0u8; MAX_DATAGRAM_BYTES];
    while running.load(Ordering::SeqCst) {
        let (len, src_addr) = match socket.recv_from(&mut buf) {
            Ok(v) => v,
            Err(error)
                if error.kind() == std::io::ErrorKind::WouldBlock
                    || error.kind() == std::io::ErrorKind::TimedOut =>
            {
                continue;
            }
            Err(error) => {
                // Expected once `stop()` closes things down around us;
                // otherwise a transient per-read failure, not fatal.
                debug!(%error, "recv_from failed");
                continue;
            }
        };

        let envelope: WireEnvelope = match serde_json::from_slice(&buf[..len]) {
            Ok(envelope) => envelope,
            Err(_) => {
                decode_failures.fetch_add(1, Ordering::Relaxed);
                continue;
            }
        };

        let plaintext = match crypto.decrypt(&envelope) {
            Ok(plaintext) => plaintext,
            Err(_) => {
                decrypt_failures.fetch_add(1, Ordering::Relaxed);
                continue;
            }
        };

        let plaintext_str = match std::str::from_utf8(&plaintext) {
            Ok(s) => s,
            Err(_) => {
                decode_failures.fetch_add(1, Ordering::Relaxed);
                continue;
            }
        };

        let mut message = match codec::decode(plaintext_str) {
            Ok(message) => message,
            Err(_) => {
                decode_failures.fetch_add(1, Ordering::Relaxed);
                continue;
            }
        };

        if !dedup.check_and_insert(&message.id) {
            continue;
        }

        if let Some(reply) = dispatch(&message, src_addr, &peers, &node_id, &on_delivery) {
            dedup.check_and_insert(&reply.id);
            relay_message(&socket, crypto.as_ref(), &peers, &config, &reply, None, &send_failures);
        }

        if message.decrement_ttl() > 0 {
            relay_message(
                &socket,
                crypto.as_ref(),
                &peers,
                &config,
                &message,
                Some(&message.sender_id),
                &send_failures,
            );
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn maintenance_loop(
    socket: Arc<UdpSocket>,
    crypto: Arc<dyn CryptoBackend>,
    peers: Arc<PeerTable>,
    dedup: Arc<DedupSet>,
    running: Arc<AtomicBool>,
    send_failures: Arc<AtomicU64>,
    node_id: String,
    port: u16,
    config: RelayConfig,
) {
    let mut elapsed = 0u64;
    while running.load(Ordering::SeqCst) {
        thread::sleep(Duration::from_secs(1));
        if !running.load(Ordering::SeqCst) {
            break;
        }
        elapsed += 1;
        if elapsed < config.discovery_period_secs.max(1) {
            continue;
        }
        elapsed = 0;

        peers.mark_stale();
        dedup.gc();

        let payload = DiscoveryPayload {
            port,
            public_key: BASE64.encode(crypto.public_key_bytes()),
        };
        let Ok(payload_json) = codec::encode_discovery_payload(&payload) else {
            continue;
        };
        let message = Message {
            id: codec::generate_id(),
            sender_id: node_id.clone(),
            recipient_id: BROADCAST_RECIPIENT.to_string(),
            kind: MessageKind::Discovery,
            payload: payload_json,
            timestamp: now_secs(),
            ttl: DISCOVERY_TTL,
        };
        dedup.check_and_insert(&message.id);
        relay_message(&socket, crypto.as_ref(), &peers, &config, &message, None, &send_failures);
        info!(%node_id, "maintenance tick: mark_stale + discovery emitted + dedup gc");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::CryptoBackendFactory;
    use std::sync::Mutex as StdMutex;

    fn test_engine(node_id: &str) -> RelayEngine {
        let config = RelayConfig::for_tests(node_id, 0);
        RelayEngine::new(config, CryptoBackendFactory::create_pq(), Box::new(|_| {})).unwrap()
    }

    #[test]
    fn exposes_node_id_and_nonempty_public_key() {
        let engine = test_engine("node-a");
        assert_eq!(engine.node_id(), "node-a");
        assert!(!engine.public_key().is_empty());
    }

    #[test]
    fn binds_an_ephemeral_port_when_configured_with_zero() {
        let engine = test_engine("node-a");
        assert_ne!(engine.port(), 0);
    }

    #[test]
    fn start_is_idempotent_and_stop_joins_threads() {
        let engine = test_engine("node-a");
        engine.start();
        engine.start();
        engine.stop();
        engine.stop();
    }

    #[test]
    fn peers_snapshot_starts_empty() {
        let engine = test_engine("node-a");
        assert!(engine.peers_snapshot().is_empty());
    }

    #[test]
    fn seed_peer_makes_it_visible_in_snapshot() {
        let engine = test_engine("node-a");
        engine.seed_peer("node-b", "127.0.0.1", 9100, "cGlua2V5");
        let snapshot = engine.peers_snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].id, "node-b");
    }

    #[test]
    fn send_text_does_not_error_with_no_peers() {
        let engine = test_engine("node-a");
        assert!(engine.send_text("broadcast", "hello").is_ok());
    }

    #[test]
    fn send_voice_does_not_error_with_no_peers() {
        let engine = test_engine("node-a");
        assert!(engine.send_voice("broadcast", "AAAA").is_ok());
    }

    #[test]
    fn delivery_callback_fires_for_directly_injected_text_message() {
        let delivered: Arc<StdMutex<Vec<String>>> = Arc::new(StdMutex::new(Vec::new()));
        let delivered_clone = Arc::clone(&delivered);
        let callback: Box<DeliveryCallback> = Box::new(move |msg: DeliveredMessage| {
            delivered_clone.lock().unwrap().push(msg.payload);
        });

        let message = Message {
            id: codec::generate_id(),
            sender_id: "peer-b".into(),
            recipient_id: "node-a".into(),
            kind: MessageKind::Text,
            payload: "hi".into(),
            timestamp: 0,
            ttl: 3,
        };
        let peers = PeerTable::new("node-a", 60);
        let addr: SocketAddr = "127.0.0.1:9000".parse().unwrap();
        let reply = dispatch(&message, addr, &peers, "node-a", callback.as_ref());
        assert!(reply.is_none());
        assert_eq!(delivered.lock().unwrap().as_slice(), &["hi".to_string()]);
    }

    #[test]
    fn discovery_from_other_node_schedules_routing_reply() {
        let peers = PeerTable::new("node-a", 60);
        let payload = DiscoveryPayload {
            port: 9001,
            public_key: BASE64.encode([1u8; 32]),
        };
        let message = Message {
            id: codec::generate_id(),
            sender_id: "peer-b".into(),
            recipient_id: BROADCAST_RECIPIENT.into(),
            kind: MessageKind::Discovery,
            payload: codec::encode_discovery_payload(&payload).unwrap(),
            timestamp: 0,
            ttl: 3,
        };
        let addr: SocketAddr = "127.0.0.1:9001".parse().unwrap();
        let reply = dispatch(&message, addr, &peers, "node-a", &|_| {});
        assert!(reply.is_some());
        assert_eq!(reply.unwrap().kind, MessageKind::Routing);
        assert!(peers.lookup("peer-b").is_some());
    }

    #[test]
    fn text_not_addressed_to_self_is_not_delivered() {
        let delivered: Arc<StdMutex<bool>> = Arc::new(StdMutex::new(false));
        let delivered_clone = Arc::clone(&delivered);
        let callback: Box<DeliveryCallback> = Box::new(move |_| {
            *delivered_clone.lock().unwrap() = true;
        });
        let message = Message {
            id: codec::generate_id(),
            sender_id: "peer-b".into(),
            recipient_id: "someone-else".into(),
            kind: MessageKind::Text,
            payload: "hi".into(),
            timestamp: 0,
            ttl: 3,
        };
        let peers = PeerTable::new("node-a", 60);
        let addr: SocketAddr = "127.0.0.1:9000".parse().unwrap();
        dispatch(&message, addr, &peers, "node-a", callback.as_ref());
        assert!(!*delivered.lock().unwrap());
    }
}
