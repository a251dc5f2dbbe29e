//! Core error types for the Lattice engine.

use crate::covalue::CoValueId;
use crate::session::SessionId;
use thiserror::Error;

/// A trait for assigning a stable, machine-readable string code to an error.
pub trait ErrorCode {
    /// Returns the unique, stable string identifier for this error variant.
    fn code(&self) -> &'static str;
}

/// Errors raised by CoValue identity and header handling.
#[derive(Error, Debug)]
pub enum CoValueError {
    /// A provided header does not hash to the expected identifier.
    #[error("Header does not hash to the expected id. Expected {expected}, got {got}")]
    HeaderMismatch {
        /// The identifier the core was created for.
        expected: CoValueId,
        /// The identifier derived from the provided header.
        got: CoValueId,
    },
    /// Two different headers hash to one identifier. This is a fatal
    /// programmer error (or a hash collision); the current operation is
    /// aborted.
    #[error("Two distinct headers claim the id {0}")]
    RegistryCollision(CoValueId),
    /// A textual identifier could not be parsed.
    #[error("Malformed identifier: {0}")]
    MalformedId(String),
    /// A header could not be canonically encoded for hashing.
    #[error("Header encoding failed: {0}")]
    HeaderEncoding(String),
    /// The CoValue's content is not loaded locally.
    #[error("CoValue {0} is not available locally")]
    NotAvailable(CoValueId),
}

impl ErrorCode for CoValueError {
    fn code(&self) -> &'static str {
        match self {
            Self::HeaderMismatch { .. } => "COVALUE_HEADER_MISMATCH",
            Self::RegistryCollision(_) => "COVALUE_REGISTRY_COLLISION",
            Self::MalformedId(_) => "COVALUE_MALFORMED_ID",
            Self::HeaderEncoding(_) => "COVALUE_HEADER_ENCODING",
            Self::NotAvailable(_) => "COVALUE_NOT_AVAILABLE",
        }
    }
}

/// Per-transaction verification errors.
///
/// These are local to one peer and one CoValue: the offending peer is
/// marked errored for that CoValue, and the verified state is unchanged.
#[derive(Error, Debug)]
pub enum TransactionError {
    /// Transactions arrived starting past the end of the session log.
    #[error("Transaction gap in session {session}. Log has {have}, got start {got}")]
    Gap {
        /// The session the transactions were destined for.
        session: SessionId,
        /// The current length of the session log.
        have: u64,
        /// The starting index the sender claimed.
        got: u64,
    },
    /// Transactions arrived starting before the end of the session log.
    #[error("Transaction overlap in session {session}. Log has {have}, got start {got}")]
    Overlap {
        /// The session the transactions were destined for.
        session: SessionId,
        /// The current length of the session log.
        have: u64,
        /// The starting index the sender claimed.
        got: u64,
    },
    /// A transaction signature failed verification.
    #[error("Bad signature in session {session} at index {index}")]
    BadSignature {
        /// The session containing the offending transaction.
        session: SessionId,
        /// The index of the offending transaction.
        index: u64,
    },
    /// A transaction's chain link does not match the recomputed digest.
    #[error("Broken hash chain in session {session} at index {index}")]
    BadHashChain {
        /// The session containing the offending transaction.
        session: SessionId,
        /// The index of the offending transaction.
        index: u64,
    },
    /// The session's agent identifier is not a valid verifying key.
    #[error("Session {session} has an invalid agent key: {reason}")]
    InvalidAgentKey {
        /// The session whose agent key failed to parse.
        session: SessionId,
        /// A human-readable description of the failure.
        reason: String,
    },
}

impl ErrorCode for TransactionError {
    fn code(&self) -> &'static str {
        match self {
            Self::Gap { .. } => "TX_GAP",
            Self::Overlap { .. } => "TX_OVERLAP",
            Self::BadSignature { .. } => "TX_BAD_SIGNATURE",
            Self::BadHashChain { .. } => "TX_BAD_HASH_CHAIN",
            Self::InvalidAgentKey { .. } => "TX_INVALID_AGENT_KEY",
        }
    }
}

/// Errors raised by per-peer queueing and liveness.
///
/// Both variants are non-fatal for a load attempt: the affected peer simply
/// counts as not-found toward the termination rule.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerError {
    /// The peer was closed while an operation was waiting on it.
    #[error("Peer closed")]
    Closed,
    /// The per-peer load deadline elapsed without a response.
    #[error("Peer deadline elapsed")]
    Timeout,
}

impl ErrorCode for PeerError {
    fn code(&self) -> &'static str {
        match self {
            Self::Closed => "PEER_CLOSED",
            Self::Timeout => "PEER_TIMEOUT",
        }
    }
}

/// The umbrella error for sync-layer operations.
#[derive(Error, Debug)]
pub enum SyncError {
    /// A CoValue identity or header problem.
    #[error(transparent)]
    CoValue(#[from] CoValueError),
    /// A transaction verification problem, scoped to one peer.
    #[error(transparent)]
    Transaction(#[from] TransactionError),
    /// A peer queue or liveness problem.
    #[error(transparent)]
    Peer(#[from] PeerError),
    /// A wire payload could not be decoded.
    #[error("Decode error: {0}")]
    Decode(String),
}

impl ErrorCode for SyncError {
    fn code(&self) -> &'static str {
        match self {
            Self::CoValue(e) => e.code(),
            Self::Transaction(e) => e.code(),
            Self::Peer(e) => e.code(),
            Self::Decode(_) => "SYNC_DECODE_ERROR",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::AgentId;

    #[test]
    fn error_codes_are_stable_and_distinct() {
        let session = SessionId::new(AgentId([1u8; 32]), 0);
        let errors: Vec<Box<dyn ErrorCode>> = vec![
            Box::new(CoValueError::RegistryCollision(CoValueId([0u8; 32]))),
            Box::new(CoValueError::MalformedId("x".into())),
            Box::new(TransactionError::Gap {
                session,
                have: 0,
                got: 2,
            }),
            Box::new(TransactionError::Overlap {
                session,
                have: 2,
                got: 0,
            }),
            Box::new(TransactionError::BadSignature { session, index: 0 }),
            Box::new(TransactionError::BadHashChain { session, index: 0 }),
            Box::new(PeerError::Closed),
            Box::new(PeerError::Timeout),
        ];
        let codes: Vec<&'static str> = errors.iter().map(|e| e.code()).collect();
        let mut unique = codes.clone();
        unique.sort_unstable();
        unique.dedup();
        assert_eq!(unique.len(), codes.len());
    }

    #[test]
    fn sync_error_delegates_codes() {
        let err: SyncError = PeerError::Timeout.into();
        assert_eq!(err.code(), "PEER_TIMEOUT");
    }
}
