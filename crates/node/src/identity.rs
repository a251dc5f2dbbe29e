//! On-disk identity for long-lived nodes.
//!
//! The identity file holds the raw Ed25519 seed. A missing file means a
//! fresh identity; an unreadable or malformed file is an error rather than
//! a silent regenerate, so a permissions slip cannot cost a node its
//! identity.

use lattice_crypto::sign::Ed25519KeyPair;
use std::io;
use std::path::Path;
use thiserror::Error;

/// Errors from loading or creating an on-disk identity.
#[derive(Debug, Error)]
pub enum IdentityError {
    /// The identity file could not be read or written.
    #[error("identity file io: {0}")]
    Io(#[from] io::Error),
    /// The identity file exists but does not hold a valid seed.
    #[error("identity file corrupt: {0}")]
    Corrupt(String),
}

/// Loads the identity stored at `path`, generating and storing a fresh one
/// when the file does not exist yet.
pub fn load_or_generate(path: &Path) -> Result<Ed25519KeyPair, IdentityError> {
    match std::fs::read(path) {
        Ok(seed) => {
            Ed25519KeyPair::from_seed(&seed).map_err(|e| IdentityError::Corrupt(e.to_string()))
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            let keypair = Ed25519KeyPair::generate();
            std::fs::write(path, keypair.seed().as_slice())?;
            tracing::info!(target: "node", path = %path.display(), "identity_created");
            Ok(keypair)
        }
        Err(e) => Err(IdentityError::Io(e)),
    }
}
