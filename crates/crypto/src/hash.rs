//! Cryptographic hash functions.

use crate::error::CryptoError;
use sha2::{Digest, Sha256};

/// Hash function trait.
pub trait HashFunction {
    /// Hash a message and return the digest.
    fn hash(&self, message: &[u8]) -> Result<Vec<u8>, CryptoError>;

    /// Get the digest size in bytes.
    fn digest_size(&self) -> usize;

    /// Get the name of the hash function.
    fn name(&self) -> &str;
}

/// Blake3 hash function implementation.
///
/// Blake3 is the default for content addressing: CoValue identifiers are
/// blake3 digests of canonical header bytes.
#[derive(Default, Clone)]
pub struct Blake3Hash;

impl HashFunction for Blake3Hash {
    fn hash(&self, message: &[u8]) -> Result<Vec<u8>, CryptoError> {
        Ok(blake3::hash(message).as_bytes().to_vec())
    }

    fn digest_size(&self) -> usize {
        32
    }

    fn name(&self) -> &str {
        "BLAKE3"
    }
}

/// SHA-256 hash function implementation.
#[derive(Default, Clone)]
pub struct Sha256Hash;

impl HashFunction for Sha256Hash {
    fn hash(&self, message: &[u8]) -> Result<Vec<u8>, CryptoError> {
        Ok(Sha256::digest(message).to_vec())
    }

    fn digest_size(&self) -> usize {
        32
    }

    fn name(&self) -> &str {
        "SHA-256"
    }
}

/// Computes the blake3 digest of `data` as a fixed-size array.
///
/// Infallible convenience for the common content-addressing path.
pub fn blake3_digest<T: AsRef<[u8]>>(data: T) -> [u8; 32] {
    *blake3::hash(data.as_ref()).as_bytes()
}

/// Computes the blake3 digest of two concatenated inputs without an
/// intermediate allocation. Used for hash-chain links.
pub fn blake3_chain(prev: &[u8], payload: &[u8]) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new();
    hasher.update(prev);
    hasher.update(payload);
    *hasher.finalize().as_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_functions_are_deterministic() {
        let message = b"test message";

        let blake = Blake3Hash;
        let sha256 = Sha256Hash;

        let blake_digest = blake.hash(message).unwrap();
        let sha_digest = sha256.hash(message).unwrap();

        assert_eq!(blake_digest.len(), blake.digest_size());
        assert_eq!(sha_digest.len(), sha256.digest_size());
        assert_ne!(blake_digest, sha_digest);

        assert_eq!(blake.hash(message).unwrap(), blake_digest);
        assert_eq!(sha256.hash(message).unwrap(), sha_digest);
    }

    #[test]
    fn chain_digest_matches_concatenation() {
        let prev = [3u8; 32];
        let payload = b"payload";
        let mut concat = prev.to_vec();
        concat.extend_from_slice(payload);
        assert_eq!(blake3_chain(&prev, payload), blake3_digest(&concat));
    }
}
