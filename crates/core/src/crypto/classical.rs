//! Classical ECDH fallback, used in place of ML-KEM when the post-quantum
//! backend is unavailable at build time. Same envelope shape: the field that
//! normally carries a KEM ciphertext instead carries an ephemeral X25519
//! public key, and the AEAD layer is unchanged.

use rand_core::OsRng;
use x25519_dalek::{EphemeralSecret, PublicKey, StaticSecret};

use crate::error::CryptoError;

pub const PUBLIC_KEY_BYTES: usize = 32;

/// Derives a 32-byte AEAD key from a raw X25519 shared secret via BLAKE3,
/// so the ECDH output (which is not uniformly random on its own) is never
/// used directly as a cipher key.
fn derive_key(shared: &x25519_dalek::SharedSecret) -> [u8; 32] {
    *blake3::hash(shared.as_bytes()).as_bytes()
}

/// Encapsulates a shared secret to `recipient_public` using an ephemeral
/// X25519 keypair, mirroring `PqPublicKey::encapsulate`'s shape: the
/// ephemeral public key stands in for the KEM ciphertext.
pub fn encapsulate(recipient_public: &[u8]) -> Result<([u8; PUBLIC_KEY_BYTES], [u8; 32]), CryptoError> {
    if recipient_public.len() != PUBLIC_KEY_BYTES {
        return Err(CryptoError::InvalidKeyFormat(format!(
            "X25519 public key must be {PUBLIC_KEY_BYTES} bytes, got {}",
            recipient_public.len()
        )));
    }
    let mut recipient_bytes = [0u8; PUBLIC_KEY_BYTES];
    recipient_bytes.copy_from_slice(recipient_public);
    let recipient = PublicKey::from(recipient_bytes);

    let ephemeral_secret = EphemeralSecret::random_from_rng(OsRng);
    let ephemeral_public = PublicKey::from(&ephemeral_secret);
    let shared = ephemeral_secret.diffie_hellman(&recipient);

    Ok((ephemeral_public.to_bytes(), derive_key(&shared)))
}

/// Recovers the shared secret from an ephemeral public key using this
/// node's long-term static secret, mirroring `PqSecretKey::decapsulate`.
pub fn decapsulate(
    static_secret: &StaticSecret,
    ephemeral_public: &[u8],
) -> Result<[u8; 32], CryptoError> {
    if ephemeral_public.len() != PUBLIC_KEY_BYTES {
        return Err(CryptoError::MalformedEnvelope(format!(
            "X25519 ephemeral key must be {PUBLIC_KEY_BYTES} bytes, got {}",
            ephemeral_public.len()
        )));
    }
    let mut bytes = [0u8; PUBLIC_KEY_BYTES];
    bytes.copy_from_slice(ephemeral_public);
    let ephemeral = PublicKey::from(bytes);
    let shared = static_secret.diffie_hellman(&ephemeral);
    Ok(derive_key(&shared))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encapsulate_decapsulate_round_trips() {
        let static_secret = StaticSecret::random_from_rng(OsRng);
        let static_public = PublicKey::from(&static_secret);

        let (ephemeral_public, key_sender) =
            encapsulate(static_public.as_bytes()).unwrap();
        let key_receiver = decapsulate(&static_secret, &ephemeral_public).unwrap();

        assert_eq!(key_sender, key_receiver);
    }

    #[test]
    fn wrong_static_secret_yields_different_key() {
        let static_secret = StaticSecret::random_from_rng(OsRng);
        let static_public = PublicKey::from(&static_secret);
        let other_secret = StaticSecret::random_from_rng(OsRng);

        let (ephemeral_public, key_sender) =
            encapsulate(static_public.as_bytes()).unwrap();
        let key_wrong = decapsulate(&other_secret, &ephemeral_public).unwrap();

        assert_ne!(key_sender, key_wrong);
    }
}
