#![cfg_attr(
    not(test),
    deny(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::panic,
        clippy::unimplemented,
        clippy::todo,
        clippy::indexing_slicing
    )
)]

//! # Lattice Crypto
//!
//! Hashing and signing primitives for the Lattice engine: blake3 content
//! addressing for CoValue identifiers and Ed25519 signatures for session
//! transactions. The rest of the workspace depends on the traits and
//! wrapper types here, never on the backing crates directly.

pub mod error;
pub mod hash;
pub mod sign;

pub use error::CryptoError;
pub use hash::{blake3_digest, Blake3Hash, HashFunction, Sha256Hash};
pub use sign::{Ed25519KeyPair, Ed25519PublicKey, Ed25519Signature};
