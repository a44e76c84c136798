//! The symmetric half of the hybrid envelope: XChaCha20-Poly1305 under a
//! 24-byte nonce, keyed by the shared secret the KEM (or ECDH fallback)
//! layer produces.

use aead::{Aead, KeyInit};
use chacha20poly1305::{Key, XChaCha20Poly1305, XNonce};
use rand_core::{OsRng, RngCore};

use crate::error::CryptoError;

/// Poly1305 authentication tag length, in bytes.
const TAG_LEN: usize = 16;

/// Generates a fresh random 24-byte nonce. Safe to call per-message because
/// the key is fresh per message too (a new KEM/ECDH exchange every time).
pub fn generate_nonce() -> [u8; 24] {
    let mut nonce = [0u8; 24];
    OsRng.fill_bytes(&mut nonce);
    nonce
}

/// Encrypts `plaintext` under `key`, returning `nonce || tag || ciphertext`.
pub fn seal(key: &[u8; 32], plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let cipher = XChaCha20Poly1305::new(Key::from_slice(key));
    let nonce_bytes = generate_nonce();
    let nonce = XNonce::from_slice(&nonce_bytes);

    // The `aead` crate's combined encrypt returns `ciphertext || tag`; split
    // the tag off the end and move it ahead of the ciphertext to match the
    // wire layout.
    let sealed = cipher
        .encrypt(nonce, plaintext)
        .map_err(|_| CryptoError::DecryptFailed)?;
    let (ciphertext, tag) = sealed.split_at(sealed.len() - TAG_LEN);

    let mut out = Vec::with_capacity(24 + sealed.len());
    out.extend_from_slice(&nonce_bytes);
    out.extend_from_slice(tag);
    out.extend_from_slice(ciphertext);
    Ok(out)
}

/// Reverses [`seal`]: splits `nonce || tag || ciphertext` back into its
/// parts, reassembles `ciphertext || tag` for the underlying AEAD call, and
/// verifies/decrypts.
pub fn open(key: &[u8; 32], blob: &[u8]) -> Result<Vec<u8>, CryptoError> {
    if blob.len() < 24 + TAG_LEN {
        return Err(CryptoError::MalformedEnvelope(
            "AEAD blob shorter than nonce + tag".into(),
        ));
    }
    let (nonce_bytes, rest) = blob.split_at(24);
    let (tag, ciphertext) = rest.split_at(TAG_LEN);

    let mut combined = Vec::with_capacity(ciphertext.len() + TAG_LEN);
    combined.extend_from_slice(ciphertext);
    combined.extend_from_slice(tag);

    let cipher = XChaCha20Poly1305::new(Key::from_slice(key));
    let nonce = XNonce::from_slice(nonce_bytes);

    cipher
        .decrypt(nonce, combined.as_ref())
        .map_err(|_| CryptoError::DecryptFailed)
}
