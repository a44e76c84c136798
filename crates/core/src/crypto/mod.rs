//! Hybrid cryptographic envelope (C1): key encapsulation plus authenticated
//! symmetric encryption for every hop.
//!
//! Three interchangeable backends implement the same capability set
//! (`encrypt`, `decrypt`, and construction-time key generation), selected
//! once at process startup and never switched at runtime — the degradation
//! policy described in the module design is a build-time decision, not a
//! silent per-message fallback.

pub mod aead;
pub mod classical;
pub mod kem;

#[cfg(feature = "insecure-dev-crypto")]
pub mod insecure_dev;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use x25519_dalek::{PublicKey as X25519PublicKey, StaticSecret as X25519StaticSecret};

use crate::error::CryptoError;
use meshward_types::WireEnvelope;

/// Which crypto backend a node is running — surfaced for logging so two
/// peers running incompatible backends produce an observable decrypt
/// failure rather than a silent mismatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CryptoBackendKind {
    Pq,
    Classical,
    InsecureDev,
}

impl std::fmt::Display for CryptoBackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            CryptoBackendKind::Pq => "pq",
            CryptoBackendKind::Classical => "classical",
            CryptoBackendKind::InsecureDev => "insecure-dev",
        };
        f.write_str(name)
    }
}

/// The capability set every crypto backend offers: encrypt to a peer's
/// public key, decrypt with the local private key, and report the local
/// public key (generated once, at construction).
pub trait CryptoBackend: Send + Sync {
    /// This node's own public key, base64-ready bytes.
    fn public_key_bytes(&self) -> &[u8];

    /// Encrypts `payload` to `recipient_public_key`, producing a complete
    /// wire envelope. Never fails for well-formed input: KEM/ECDH output is
    /// fresh per call.
    fn encrypt(&self, payload: &[u8], recipient_public_key: &[u8]) -> Result<WireEnvelope, CryptoError>;

    /// Decrypts an envelope addressed to this node. Fails with
    /// [`CryptoError::DecryptFailed`] or [`CryptoError::MalformedEnvelope`]
    /// on any malformed field, invalid ciphertext, or failed AEAD tag check.
    fn decrypt(&self, envelope: &WireEnvelope) -> Result<Vec<u8>, CryptoError>;

    fn kind(&self) -> CryptoBackendKind;
}

fn encode_envelope(kem_part: &[u8], aead_blob: &[u8]) -> WireEnvelope {
    WireEnvelope {
        kyber_ciphertext: BASE64.encode(kem_part),
        encrypted_message: BASE64.encode(aead_blob),
    }
}

fn decode_envelope(envelope: &WireEnvelope) -> Result<(Vec<u8>, Vec<u8>), CryptoError> {
    let kem_part = BASE64
        .decode(&envelope.kyber_ciphertext)
        .map_err(|e| CryptoError::MalformedEnvelope(format!("bad base64 in kyber_ciphertext: {e}")))?;
    let aead_blob = BASE64
        .decode(&envelope.encrypted_message)
        .map_err(|e| CryptoError::MalformedEnvelope(format!("bad base64 in encrypted_message: {e}")))?;
    Ok((kem_part, aead_blob))
}

/// Post-quantum backend: ML-KEM-768 encapsulation + XChaCha20-Poly1305.
pub struct PqBackend {
    keypair: kem::PqKeypair,
}

impl PqBackend {
    pub fn generate() -> Self {
        Self {
            keypair: kem::PqKeypair::generate(),
        }
    }
}

impl CryptoBackend for PqBackend {
    fn public_key_bytes(&self) -> &[u8] {
        self.keypair.public.as_bytes()
    }

    fn encrypt(&self, payload: &[u8], recipient_public_key: &[u8]) -> Result<WireEnvelope, CryptoError> {
        let recipient = kem::PqPublicKey::from_bytes(recipient_public_key)?;
        let (ciphertext, shared_secret) = recipient.encapsulate()?;
        let blob = aead::seal(shared_secret.as_bytes(), payload)?;
        Ok(encode_envelope(ciphertext.as_bytes(), &blob))
    }

    fn decrypt(&self, envelope: &WireEnvelope) -> Result<Vec<u8>, CryptoError> {
        let (kem_bytes, aead_blob) = decode_envelope(envelope)?;
        let ciphertext = kem::PqCiphertext::from_bytes(&kem_bytes)?;
        let shared_secret = self.keypair.secret.decapsulate(&ciphertext)?;
        aead::open(shared_secret.as_bytes(), &aead_blob)
    }

    fn kind(&self) -> CryptoBackendKind {
        CryptoBackendKind::Pq
    }
}

/// Classical fallback backend: ephemeral-static X25519 ECDH + the same AEAD
/// layer, selected when the `pq` feature is unavailable or the operator
/// explicitly configures `classical`.
pub struct ClassicalBackend {
    static_secret: X25519StaticSecret,
    static_public: X25519PublicKey,
}

impl ClassicalBackend {
    pub fn generate() -> Self {
        let static_secret = X25519StaticSecret::random_from_rng(rand_core::OsRng);
        let static_public = X25519PublicKey::from(&static_secret);
        Self {
            static_secret,
            static_public,
        }
    }
}

impl CryptoBackend for ClassicalBackend {
    fn public_key_bytes(&self) -> &[u8] {
        self.static_public.as_bytes()
    }

    fn encrypt(&self, payload: &[u8], recipient_public_key: &[u8]) -> Result<WireEnvelope, CryptoError> {
        let (ephemeral_public, shared_key) = classical::encapsulate(recipient_public_key)?;
        let blob = aead::seal(&shared_key, payload)?;
        Ok(encode_envelope(&ephemeral_public, &blob))
    }

    fn decrypt(&self, envelope: &WireEnvelope) -> Result<Vec<u8>, CryptoError> {
        let (ephemeral_bytes, aead_blob) = decode_envelope(envelope)?;
        let shared_key = classical::decapsulate(&self.static_secret, &ephemeral_bytes)?;
        aead::open(&shared_key, &aead_blob)
    }

    fn kind(&self) -> CryptoBackendKind {
        CryptoBackendKind::Classical
    }
}

/// Constructs crypto backends. Mirrors the relay's transport factory: the
/// caller picks a backend once, at startup, based on configuration.
pub struct CryptoBackendFactory;

impl CryptoBackendFactory {
    pub fn create_pq() -> Box<dyn CryptoBackend> {
        Box::new(PqBackend::generate())
    }

    pub fn create_classical() -> Box<dyn CryptoBackend> {
        Box::new(ClassicalBackend::generate())
    }

    #[cfg(feature = "insecure-dev-crypto")]
    pub fn create_insecure_dev() -> Box<dyn CryptoBackend> {
        Box::new(insecure_dev::InsecureDevBackend::generate())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip<B: CryptoBackend>(make: impl Fn() -> B) {
        let sender = make();
        let receiver = make();
        let payload = b"hello mesh";

        let envelope = sender
            .encrypt(payload, receiver.public_key_bytes())
            .unwrap();
        let decrypted = receiver.decrypt(&envelope).unwrap();
        assert_eq!(decrypted, payload);
    }

    #[test]
    fn pq_backend_round_trips() {
        round_trip(PqBackend::generate);
    }

    #[test]
    fn classical_backend_round_trips() {
        round_trip(ClassicalBackend::generate);
    }

    #[test]
    fn pq_backend_rejects_tampered_envelope() {
        let sender = PqBackend::generate();
        let receiver = PqBackend::generate();
        let mut envelope = sender
            .encrypt(b"ping", receiver.public_key_bytes())
            .unwrap();

        // Flip a bit inside the base64 AEAD blob.
        let mut raw = BASE64.decode(&envelope.encrypted_message).unwrap();
        let last = raw.len() - 1;
        raw[last] ^= 0x01;
        envelope.encrypted_message = BASE64.encode(&raw);

        assert!(receiver.decrypt(&envelope).is_err());
    }

    #[test]
    fn pq_backend_fails_with_wrong_recipient_key() {
        let sender = PqBackend::generate();
        let receiver = PqBackend::generate();
        let bystander = PqBackend::generate();

        let envelope = sender
            .encrypt(b"ping", receiver.public_key_bytes())
            .unwrap();
        assert!(bystander.decrypt(&envelope).is_err());
    }
}
