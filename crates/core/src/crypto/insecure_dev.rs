//! Deterministic, unauthenticated-confidentiality stand-in for local
//! development only. Gated behind the `insecure-dev-crypto` feature *and* a
//! runtime `--insecure-dev-crypto` flag so it can never be reached by
//! configuration alone (see the relay's backend selection).
//!
//! The "shared secret" is derived purely from the recipient's public key
//! bytes, so anyone who has observed a discovery announcement can decrypt —
//! there is no real key exchange. The AEAD layer still authenticates the
//! ciphertext, so tampering is still caught; only confidentiality is given
//! up, and only in this backend.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use meshward_types::WireEnvelope;
use rand_core::{OsRng, RngCore};

use crate::error::CryptoError;

use super::{aead, CryptoBackend, CryptoBackendKind};

pub struct InsecureDevBackend {
    public_key: [u8; 32],
}

fn derive_shared_key(public_key_bytes: &[u8]) -> [u8; 32] {
    *blake3::hash(public_key_bytes).as_bytes()
}

impl InsecureDevBackend {
    pub fn generate() -> Self {
        let mut seed = [0u8; 32];
        OsRng.fill_bytes(&mut seed);
        Self {
            public_key: *blake3::hash(&seed).as_bytes(),
        }
    }
}

impl CryptoBackend for InsecureDevBackend {
    fn public_key_bytes(&self) -> &[u8] {
        &self.public_key
    }

    fn encrypt(&self, payload: &[u8], recipient_public_key: &[u8]) -> Result<WireEnvelope, CryptoError> {
        let key = derive_shared_key(recipient_public_key);
        let blob = aead::seal(&key, payload)?;
        Ok(WireEnvelope {
            kyber_ciphertext: String::new(),
            encrypted_message: BASE64.encode(&blob),
        })
    }

    fn decrypt(&self, envelope: &WireEnvelope) -> Result<Vec<u8>, CryptoError> {
        let key = derive_shared_key(&self.public_key);
        let blob = BASE64
            .decode(&envelope.encrypted_message)
            .map_err(|e| CryptoError::MalformedEnvelope(format!("bad base64: {e}")))?;
        aead::open(&key, &blob)
    }

    fn kind(&self) -> CryptoBackendKind {
        CryptoBackendKind::InsecureDev
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_and_catches_tampering() {
        let receiver = InsecureDevBackend::generate();
        let sender = InsecureDevBackend::generate();

        let mut envelope = sender
            .encrypt(b"dev only", receiver.public_key_bytes())
            .unwrap();
        let decrypted = receiver.decrypt(&envelope).unwrap();
        assert_eq!(decrypted, b"dev only");

        envelope.encrypted_message.push('A');
        assert!(receiver.decrypt(&envelope).is_err());
    }
}
