//
// Copyright (c) 2025 TRUSTEDGE LABS LLC
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: meshward — flood relay for ad-hoc mesh networks.
//

//! Unified error hierarchy for the meshward relay.
//!
//! Per-datagram and per-peer failures (bad decrypt, bad decode, a dead send
//! target) are never propagated out of the relay loops — they are counted
//! and logged at the call site. The types here exist for the boundaries
//! that *do* need to surface a `Result`: constructing a backend, starting
//! the relay, and the codec/crypto unit APIs that callers invoke directly.

use thiserror::Error;

/// Top-level unified error type for meshward operations.
#[derive(Error, Debug)]
pub enum RelayError {
    #[error("cryptographic operation failed")]
    Crypto(#[from] CryptoError),

    #[error("message codec error")]
    Codec(#[from] CodecError),

    #[error("voice pipeline error")]
    Voice(#[from] VoiceError),

    #[error("socket error: {0}")]
    Socket(#[from] std::io::Error),
}

/// Errors from the crypto envelope (C1): key encapsulation and AEAD.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    #[error("no crypto backend could be initialized: {0}")]
    Unavailable(String),

    #[error("invalid key format: {0}")]
    InvalidKeyFormat(String),

    #[error("key generation failed: {0}")]
    KeyGenerationFailed(String),

    #[error("envelope is malformed: {0}")]
    MalformedEnvelope(String),

    #[error("decryption failed")]
    DecryptFailed,
}

/// Errors from the message codec (C3).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("missing field: {0}")]
    MissingField(&'static str),

    #[error("field out of range: {0}")]
    FieldOutOfRange(&'static str),

    #[error("malformed payload for kind {kind}: {reason}")]
    MalformedPayload { kind: &'static str, reason: String },

    #[error("invalid json: {0}")]
    InvalidJson(String),
}

/// Errors from the voice pipeline (C2).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VoiceError {
    #[error("unsupported or truncated WAV container: {0}")]
    InvalidWav(String),

    #[error("invalid base64 audio payload: {0}")]
    InvalidBase64(String),
}
