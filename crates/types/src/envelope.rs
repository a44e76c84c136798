//! The outer, encrypted container every datagram is wrapped in.

use serde::{Deserialize, Serialize};

/// The two-layer hybrid envelope: a KEM ciphertext plus an AEAD blob, both
/// base64 inside a small JSON container. See `meshward_core::crypto` for the
/// code that produces and consumes these.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireEnvelope {
    /// Base64-encoded KEM ciphertext (`c_kem`).
    pub kyber_ciphertext: String,
    /// Base64-encoded AEAD blob: 24-byte nonce || tag || ciphertext.
    pub encrypted_message: String,
}
