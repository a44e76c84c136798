//
// Copyright (c) 2025 TRUSTEDGE LABS LLC
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: meshward — flood relay for ad-hoc mesh networks.
//

#![cfg_attr(docsrs, feature(doc_cfg))]

//! # meshward-core
//!
//! The mesh relay core: a gossip-discovered, flood-routed UDP mesh for
//! encrypted text and voice between ad-hoc peers, with no central server.
//!
//! Five components build on each other, leaves first:
//!
//! - [`crypto`] (C1) — the hybrid post-quantum/classical envelope every
//!   datagram travels inside.
//! - [`voice`] (C2) — denoise + voice-activity admission for fixed-size
//!   PCM frames, used by producers before a frame is handed to the relay.
//! - [`codec`] (C3) — the textual wire format for [`Message`] and its
//!   per-kind payloads.
//! - [`peer`] (C4) — the mutable, concurrently-shared view of the mesh.
//! - [`relay`] (C5) — the UDP receive loop, dedup, TTL, flood, discovery,
//!   and maintenance: the heart of the system.
//!
//! ## Quick start
//!
//! ```no_run
//! use meshward_core::{CryptoBackendFactory, MeshNode, RelayConfig};
//!
//! let config = RelayConfig::from_env();
//! let node = MeshNode::new(config, CryptoBackendFactory::create_pq(), Box::new(|msg| {
//!     println!("{}: {}", msg.sender_id, msg.payload);
//! }))
//! .expect("bind relay socket");
//!
//! node.start();
//! node.relay().send_text("broadcast", "hello mesh");
//! node.stop();
//! ```

pub mod codec;
pub mod config;
pub mod crypto;
pub mod dedup;
pub mod error;
pub mod peer;
pub mod relay;
pub mod voice;

pub use config::{BroadcastMode, CryptoBackendChoice, RelayConfig};
pub use crypto::{CryptoBackend, CryptoBackendFactory, CryptoBackendKind};
pub use error::{CodecError, CryptoError, RelayError, VoiceError};
pub use peer::PeerTable;
pub use relay::{DeliveredMessage, DeliveryCallback, RelayEngine};
pub use voice::{DenoiserBackend, ProcessedAudio, RollingBufferDenoiser, VoiceFrameResult, VoicePipeline};

pub use meshward_types::{Message, MessageKind, PeerRecord, WireEnvelope};

/// The single owned object a binary built on this crate constructs at
/// startup and holds for the life of the process.
///
/// The source this crate is rewritten from reaches for several module-wide
/// singletons (an audio processor, a buffer processor, a command
/// processor, a mesh relay instance). Here there is exactly one owned,
/// explicitly constructed value: `MeshNode` bundles the relay engine (C5,
/// itself composed of C1/C3/C4) with a voice pipeline (C2) that producer
/// threads call into before handing qualified audio to the relay. Neither
/// component reaches for the other through a global — a caller that needs
/// both holds one `MeshNode`.
pub struct MeshNode {
    relay: RelayEngine,
    voice: std::sync::Mutex<VoicePipeline>,
}

impl MeshNode {
    /// Binds the relay's UDP socket and constructs a voice pipeline backed
    /// by the default denoiser. Does not start any threads.
    pub fn new(
        config: RelayConfig,
        crypto: Box<dyn CryptoBackend>,
        on_delivery: Box<DeliveryCallback>,
    ) -> Result<Self, RelayError> {
        Self::with_denoiser(config, crypto, Box::new(RollingBufferDenoiser::new()), on_delivery)
    }

    /// As [`MeshNode::new`], but with an explicit denoiser backend — the
    /// same construction-time injection pattern as the crypto backend.
    pub fn with_denoiser(
        config: RelayConfig,
        crypto: Box<dyn CryptoBackend>,
        denoiser: Box<dyn DenoiserBackend>,
        on_delivery: Box<DeliveryCallback>,
    ) -> Result<Self, RelayError> {
        let relay = RelayEngine::new(config, crypto, on_delivery)?;
        Ok(Self {
            relay,
            voice: std::sync::Mutex::new(VoicePipeline::new(denoiser)),
        })
    }

    /// Starts the relay's receive and maintenance threads. Idempotent.
    pub fn start(&self) {
        self.relay.start();
    }

    /// Signals shutdown and joins the relay's threads.
    pub fn stop(&self) {
        self.relay.stop();
    }

    pub fn relay(&self) -> &RelayEngine {
        &self.relay
    }

    /// Qualifies raw audio bytes (PCM or WAV) for transmission: runs them
    /// through the denoiser and debounced VAD, returning the processed
    /// bytes and whether the caller should proceed to `send_voice`.
    pub fn process_voice(&self, raw_audio: &[u8]) -> Result<(Vec<u8>, bool), VoiceError> {
        self.voice
            .lock()
            .expect("voice pipeline mutex poisoned")
            .process_audio(raw_audio)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(node_id: &str) -> MeshNode {
        let config = RelayConfig::for_tests(node_id, 0);
        MeshNode::new(config, CryptoBackendFactory::create_pq(), Box::new(|_| {})).unwrap()
    }

    #[test]
    fn mesh_node_exposes_the_underlying_relay() {
        let node = node("node-a");
        assert_eq!(node.relay().node_id(), "node-a");
    }

    #[test]
    fn process_voice_accepts_raw_silent_pcm() {
        let node = node("node-a");
        let silence = vec![0u8; meshward_types::FRAME_BYTES];
        let (processed, is_speech) = node.process_voice(&silence).unwrap();
        assert_eq!(processed.len(), meshward_types::FRAME_BYTES);
        assert!(!is_speech);
    }

    #[test]
    fn start_and_stop_round_trip_cleanly() {
        let node = node("node-a");
        node.start();
        node.stop();
    }
}
