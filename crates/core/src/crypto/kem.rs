//! ML-KEM-768 (FIPS 203) key encapsulation, wrapped in fixed-size byte types.
//!
//! This is the post-quantum half of the hybrid envelope (§4.1): encapsulation
//! produces a ciphertext and a fresh 32-byte shared secret from a recipient's
//! public key; decapsulation recovers the same shared secret from the
//! ciphertext and the matching secret key. A wrong secret key does not error
//! out of `decapsulate` — ML-KEM's implicit-rejection property means it
//! silently returns a *different* shared secret, so the actual observable
//! failure shows up one layer up, when the AEAD tag fails to verify.

use ml_kem::kem::{Decapsulate, Encapsulate};
use ml_kem::{Encoded, EncodedSizeUser, KemCore, MlKem768};
use rand_core::OsRng;
use zeroize::Zeroize;

use crate::error::CryptoError;

pub const PUBLIC_KEY_BYTES: usize = 1184;
pub const SECRET_KEY_BYTES: usize = 2400;
pub const CIPHERTEXT_BYTES: usize = 1088;
pub const SHARED_SECRET_BYTES: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PqPublicKey {
    bytes: [u8; PUBLIC_KEY_BYTES],
}

pub struct PqSecretKey {
    bytes: [u8; SECRET_KEY_BYTES],
}

impl Drop for PqSecretKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PqCiphertext {
    bytes: [u8; CIPHERTEXT_BYTES],
}

pub struct PqSharedSecret {
    bytes: [u8; SHARED_SECRET_BYTES],
}

impl Drop for PqSharedSecret {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl PqSharedSecret {
    pub fn as_bytes(&self) -> &[u8; SHARED_SECRET_BYTES] {
        &self.bytes
    }
}

impl PqPublicKey {
    pub fn as_bytes(&self) -> &[u8; PUBLIC_KEY_BYTES] {
        &self.bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        if bytes.len() != PUBLIC_KEY_BYTES {
            return Err(CryptoError::InvalidKeyFormat(format!(
                "ML-KEM-768 public key must be {PUBLIC_KEY_BYTES} bytes, got {}",
                bytes.len()
            )));
        }
        let mut out = [0u8; PUBLIC_KEY_BYTES];
        out.copy_from_slice(bytes);
        Ok(Self { bytes: out })
    }

    /// Encapsulate a fresh shared secret to this public key.
    pub fn encapsulate(&self) -> Result<(PqCiphertext, PqSharedSecret), CryptoError> {
        type EkEncoded = Encoded<<MlKem768 as KemCore>::EncapsulationKey>;
        let ek_encoded = EkEncoded::try_from(&self.bytes[..]).map_err(|_| {
            CryptoError::InvalidKeyFormat("malformed ML-KEM-768 encapsulation key".into())
        })?;
        let ek = <MlKem768 as KemCore>::EncapsulationKey::from_bytes(&ek_encoded);

        let mut rng = OsRng;
        let (ct, ss) = ek
            .encapsulate(&mut rng)
            .map_err(|_| CryptoError::KeyGenerationFailed("ML-KEM-768 encapsulation failed".into()))?;

        let mut ct_bytes = [0u8; CIPHERTEXT_BYTES];
        ct_bytes.copy_from_slice(ct.as_slice());
        let mut ss_bytes = [0u8; SHARED_SECRET_BYTES];
        ss_bytes.copy_from_slice(ss.as_slice());

        Ok((
            PqCiphertext { bytes: ct_bytes },
            PqSharedSecret { bytes: ss_bytes },
        ))
    }
}

impl PqCiphertext {
    pub fn as_bytes(&self) -> &[u8; CIPHERTEXT_BYTES] {
        &self.bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        if bytes.len() != CIPHERTEXT_BYTES {
            return Err(CryptoError::MalformedEnvelope(format!(
                "ML-KEM-768 ciphertext must be {CIPHERTEXT_BYTES} bytes, got {}",
                bytes.len()
            )));
        }
        let mut out = [0u8; CIPHERTEXT_BYTES];
        out.copy_from_slice(bytes);
        Ok(Self { bytes: out })
    }
}

impl PqSecretKey {
    /// Recover the shared secret encapsulated in `ciphertext`.
    ///
    /// Never fails on a wrong-but-well-formed secret key: ML-KEM's implicit
    /// rejection returns an unrelated shared secret in that case, and the
    /// mismatch is caught by the AEAD tag check one layer up.
    pub fn decapsulate(&self, ciphertext: &PqCiphertext) -> Result<PqSharedSecret, CryptoError> {
        type DkEncoded = Encoded<<MlKem768 as KemCore>::DecapsulationKey>;
        type CtEncoded = ml_kem::Ciphertext<MlKem768>;

        let dk_encoded = DkEncoded::try_from(&self.bytes[..]).map_err(|_| {
            CryptoError::InvalidKeyFormat("malformed ML-KEM-768 decapsulation key".into())
        })?;
        let dk = <MlKem768 as KemCore>::DecapsulationKey::from_bytes(&dk_encoded);

        let ct = CtEncoded::try_from(&ciphertext.bytes[..])
            .map_err(|_| CryptoError::MalformedEnvelope("malformed ML-KEM-768 ciphertext".into()))?;

        let ss = dk
            .decapsulate(&ct)
            .map_err(|_| CryptoError::DecryptFailed)?;

        let mut ss_bytes = [0u8; SHARED_SECRET_BYTES];
        ss_bytes.copy_from_slice(ss.as_slice());
        Ok(PqSharedSecret { bytes: ss_bytes })
    }
}

/// A generated ML-KEM-768 keypair.
pub struct PqKeypair {
    pub public: PqPublicKey,
    pub secret: PqSecretKey,
}

impl PqKeypair {
    pub fn generate() -> Self {
        let mut rng = OsRng;
        let (dk, ek) = MlKem768::generate(&mut rng);

        let mut pk_bytes = [0u8; PUBLIC_KEY_BYTES];
        pk_bytes.copy_from_slice(ek.as_bytes().as_slice());
        let mut sk_bytes = [0u8; SECRET_KEY_BYTES];
        sk_bytes.copy_from_slice(dk.as_bytes().as_slice());

        Self {
            public: PqPublicKey { bytes: pk_bytes },
            secret: PqSecretKey { bytes: sk_bytes },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encapsulate_decapsulate_round_trips() {
        let keypair = PqKeypair::generate();
        let (ct, ss_sender) = keypair.public.encapsulate().unwrap();
        let ss_receiver = keypair.secret.decapsulate(&ct).unwrap();
        assert_eq!(ss_sender.as_bytes(), ss_receiver.as_bytes());
    }

    #[test]
    fn wrong_secret_key_yields_different_shared_secret() {
        let a = PqKeypair::generate();
        let b = PqKeypair::generate();
        let (ct, ss_sender) = a.public.encapsulate().unwrap();
        let ss_wrong = b.secret.decapsulate(&ct).unwrap();
        assert_ne!(ss_sender.as_bytes(), ss_wrong.as_bytes());
    }

    #[test]
    fn rejects_wrong_length_public_key() {
        let err = PqPublicKey::from_bytes(&[0u8; 10]).unwrap_err();
        assert!(matches!(err, CryptoError::InvalidKeyFormat(_)));
    }

    #[test]
    fn rejects_wrong_length_ciphertext() {
        let err = PqCiphertext::from_bytes(&[0u8; 4]).unwrap_err();
        assert!(matches!(err, CryptoError::MalformedEnvelope(_)));
    }

    #[test]
    fn key_sizes_match_ml_kem_768() {
        let keypair = PqKeypair::generate();
        assert_eq!(keypair.public.as_bytes().len(), PUBLIC_KEY_BYTES);
    }
}
