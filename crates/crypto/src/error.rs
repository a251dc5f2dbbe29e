//! Error types for cryptographic operations.

use thiserror::Error;

/// Errors raised by hashing, key handling, and signature verification.
#[derive(Error, Debug)]
pub enum CryptoError {
    /// Key material could not be parsed.
    #[error("Invalid key: {0}")]
    InvalidKey(String),
    /// Signature bytes could not be parsed.
    #[error("Invalid signature encoding: {0}")]
    InvalidSignature(String),
    /// A signature did not verify against the message and key.
    #[error("Signature verification failed")]
    VerificationFailed,
}
