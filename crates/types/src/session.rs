//! Session identifiers and the signed transaction entries they log.
//!
//! A session is the append-only contribution stream of one writer to one
//! CoValue. Entries are hash-chained and signed by the session's agent key,
//! so a session log can be verified without trusting the peer that relayed
//! it.

use crate::error::CoValueError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The display prefix for agent identifiers.
const AGENT_ID_PREFIX: &str = "agent_z";

/// An agent identifier: the Ed25519 verifying key of one writer.
///
/// Embedding the key in the identifier means session signatures can be
/// checked from the `SessionId` alone, with no key registry round-trip.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AgentId(pub [u8; 32]);

impl AgentId {
    /// Returns the raw verifying-key bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", AGENT_ID_PREFIX, bs58::encode(&self.0).into_string())
    }
}

impl fmt::Debug for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AgentId({self})")
    }
}

impl FromStr for AgentId {
    type Err = CoValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let encoded = s
            .strip_prefix(AGENT_ID_PREFIX)
            .ok_or_else(|| CoValueError::MalformedId(s.to_string()))?;
        let bytes = bs58::decode(encoded)
            .into_vec()
            .map_err(|_| CoValueError::MalformedId(s.to_string()))?;
        let key: [u8; 32] = bytes
            .try_into()
            .map_err(|_| CoValueError::MalformedId(s.to_string()))?;
        Ok(AgentId(key))
    }
}

/// A session identifier: one writer's numbered contribution stream.
///
/// The counter distinguishes multiple concurrent sessions of the same agent
/// (one per device or process). Ordering is lexicographic on
/// `(agent, counter)`, which keeps serialized session maps deterministic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SessionId {
    /// The writer that owns this session.
    pub agent: AgentId,
    /// Distinguishes concurrent sessions of the same agent.
    pub counter: u64,
}

impl SessionId {
    /// Builds the session identifier for `agent`'s `counter`-th session.
    pub fn new(agent: AgentId, counter: u64) -> Self {
        Self { agent, counter }
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_session_z{}", self.agent, self.counter)
    }
}

/// A hash-chain link: the blake3 digest binding a transaction to its
/// predecessor within the session log.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChainLink(pub [u8; 32]);

impl ChainLink {
    /// Returns the raw digest bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Debug for ChainLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChainLink({})", hex::encode(&self.0[..8]))
    }
}

/// Raw Ed25519 signature bytes.
///
/// Kept as opaque bytes here so that this crate stays free of cryptographic
/// dependencies; `lattice-state` interprets them during verification.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureBytes(#[serde(with = "serde_bytes")] pub Vec<u8>);

impl fmt::Debug for SignatureBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SignatureBytes({})", hex::encode(&self.0))
    }
}

/// One entry in a session log.
///
/// The index of a transaction is implicit: it is the entry's position in
/// the log. `link` chains the entry to its predecessor (or to the CoValue
/// identifier for the first entry), and `signature` is the session agent's
/// signature over the link bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Opaque application payload.
    #[serde(with = "serde_bytes")]
    pub payload: Vec<u8>,
    /// Digest chaining this entry to its predecessor.
    pub link: ChainLink,
    /// The session agent's signature over `link`.
    pub signature: SignatureBytes,
}
