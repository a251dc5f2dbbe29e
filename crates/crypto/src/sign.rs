//! Ed25519 signing and verification.

use crate::error::CryptoError;
use ed25519_dalek::{Signer, Verifier};
use rand::rngs::OsRng;
use zeroize::Zeroizing;

/// An Ed25519 key pair: one writer identity.
#[derive(Clone)]
pub struct Ed25519KeyPair {
    signing_key: ed25519_dalek::SigningKey,
}

/// An Ed25519 verifying key.
#[derive(Clone)]
pub struct Ed25519PublicKey(ed25519_dalek::VerifyingKey);

/// An Ed25519 signature.
#[derive(Clone)]
pub struct Ed25519Signature(ed25519_dalek::Signature);

impl Ed25519KeyPair {
    /// Generates a new key pair from the operating system RNG.
    pub fn generate() -> Self {
        let mut rng = OsRng;
        Self {
            signing_key: ed25519_dalek::SigningKey::generate(&mut rng),
        }
    }

    /// Reconstructs a key pair from a 32-byte seed.
    pub fn from_seed(seed: &[u8]) -> Result<Self, CryptoError> {
        let seed: [u8; 32] = seed
            .try_into()
            .map_err(|_| CryptoError::InvalidKey("expected a 32-byte seed".to_string()))?;
        Ok(Self {
            signing_key: ed25519_dalek::SigningKey::from_bytes(&seed),
        })
    }

    /// Exports the 32-byte seed. The caller is responsible for storing it
    /// safely; the buffer is zeroized on drop.
    pub fn seed(&self) -> Zeroizing<Vec<u8>> {
        Zeroizing::new(self.signing_key.to_bytes().to_vec())
    }

    /// Returns the verifying half of this key pair.
    pub fn public_key(&self) -> Ed25519PublicKey {
        Ed25519PublicKey(self.signing_key.verifying_key())
    }

    /// Signs a message.
    pub fn sign(&self, message: &[u8]) -> Ed25519Signature {
        Ed25519Signature(self.signing_key.sign(message))
    }
}

impl Ed25519PublicKey {
    /// Parses a verifying key from its 32-byte encoding.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        let bytes: [u8; 32] = bytes
            .try_into()
            .map_err(|_| CryptoError::InvalidKey("expected 32 bytes".to_string()))?;
        ed25519_dalek::VerifyingKey::from_bytes(&bytes)
            .map(Ed25519PublicKey)
            .map_err(|e| CryptoError::InvalidKey(format!("failed to parse public key: {e}")))
    }

    /// Returns the 32-byte encoding of this key.
    pub fn to_bytes(&self) -> [u8; 32] {
        self.0.to_bytes()
    }

    /// Verifies `signature` over `message`.
    pub fn verify(&self, message: &[u8], signature: &Ed25519Signature) -> Result<(), CryptoError> {
        self.0
            .verify(message, &signature.0)
            .map_err(|_| CryptoError::VerificationFailed)
    }
}

impl Ed25519Signature {
    /// Parses a signature from its 64-byte encoding.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        let bytes: [u8; 64] = bytes
            .try_into()
            .map_err(|_| CryptoError::InvalidSignature("expected 64 bytes".to_string()))?;
        Ok(Ed25519Signature(ed25519_dalek::Signature::from_bytes(
            &bytes,
        )))
    }

    /// Returns the 64-byte encoding of this signature.
    pub fn to_bytes(&self) -> [u8; 64] {
        self.0.to_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_and_verify_roundtrip() {
        let keypair = Ed25519KeyPair::generate();
        let message = b"attack at dawn";
        let signature = keypair.sign(message);
        keypair.public_key().verify(message, &signature).unwrap();
    }

    #[test]
    fn verification_rejects_tampered_message() {
        let keypair = Ed25519KeyPair::generate();
        let signature = keypair.sign(b"attack at dawn");
        assert!(keypair
            .public_key()
            .verify(b"attack at dusk", &signature)
            .is_err());
    }

    #[test]
    fn verification_rejects_wrong_key() {
        let keypair = Ed25519KeyPair::generate();
        let other = Ed25519KeyPair::generate();
        let signature = keypair.sign(b"message");
        assert!(other.public_key().verify(b"message", &signature).is_err());
    }

    #[test]
    fn seed_roundtrip_preserves_identity() {
        let keypair = Ed25519KeyPair::generate();
        let restored = Ed25519KeyPair::from_seed(&keypair.seed()).unwrap();
        assert_eq!(
            keypair.public_key().to_bytes(),
            restored.public_key().to_bytes()
        );
    }

    #[test]
    fn key_and_signature_byte_roundtrips() {
        let keypair = Ed25519KeyPair::generate();
        let public = keypair.public_key();
        let parsed = Ed25519PublicKey::from_bytes(&public.to_bytes()).unwrap();
        assert_eq!(public.to_bytes(), parsed.to_bytes());

        let signature = keypair.sign(b"m");
        let reparsed = Ed25519Signature::from_bytes(&signature.to_bytes()).unwrap();
        parsed.verify(b"m", &reparsed).unwrap();

        assert!(Ed25519PublicKey::from_bytes(&[0u8; 31]).is_err());
        assert!(Ed25519Signature::from_bytes(&[0u8; 63]).is_err());
    }
}
