//! CoValue identifiers, headers, and the write-authority ruleset.

use crate::error::CoValueError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// The number of bytes in a [`CoValueId`] digest.
pub const COVALUE_ID_BYTES: usize = 32;

/// The display prefix for CoValue identifiers.
const COVALUE_ID_PREFIX: &str = "co_z";

/// A content-derived CoValue identifier.
///
/// The identifier is the blake3 digest of the canonical encoding of the
/// CoValue's header. Two peers independently producing the same header
/// therefore produce the same identifier.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CoValueId(pub [u8; COVALUE_ID_BYTES]);

impl CoValueId {
    /// Returns the raw digest bytes.
    pub fn as_bytes(&self) -> &[u8; COVALUE_ID_BYTES] {
        &self.0
    }
}

impl fmt::Display for CoValueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", COVALUE_ID_PREFIX, bs58::encode(&self.0).into_string())
    }
}

impl fmt::Debug for CoValueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CoValueId({self})")
    }
}

impl FromStr for CoValueId {
    type Err = CoValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let encoded = s
            .strip_prefix(COVALUE_ID_PREFIX)
            .ok_or_else(|| CoValueError::MalformedId(s.to_string()))?;
        let bytes = bs58::decode(encoded)
            .into_vec()
            .map_err(|_| CoValueError::MalformedId(s.to_string()))?;
        let digest: [u8; COVALUE_ID_BYTES] = bytes
            .try_into()
            .map_err(|_| CoValueError::MalformedId(s.to_string()))?;
        Ok(CoValueId(digest))
    }
}

/// The closed set of CoValue content types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CoValueKind {
    /// A last-writer-wins map of keys to values.
    CoMap,
    /// An ordered, conflict-free list.
    CoList,
    /// An append-only per-session stream.
    CoStream,
    /// Chunked binary content.
    Binary,
    /// A permission group; members may write CoValues owned by it.
    Group,
    /// An account; the root group of one identity.
    Account,
}

/// The write-authority policy embedded in a CoValue header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "type")]
pub enum Ruleset {
    /// Any session may write. Used for unowned scratch values.
    UnsafeAllowAll,
    /// Writes are authorized by membership of the named group.
    #[serde(rename_all = "camelCase")]
    OwnedByGroup {
        /// The group CoValue that governs write access.
        group: CoValueId,
    },
    /// The CoValue is itself a group and carries its own membership rules.
    Group,
}

/// The immutable header a CoValue's identifier is derived from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoValueHeader {
    /// The content type of this CoValue.
    pub kind: CoValueKind,
    /// The write-authority policy.
    pub ruleset: Ruleset,
    /// Optional application-defined metadata. Keeping this a sorted map
    /// keeps the canonical encoding deterministic.
    pub meta: Option<BTreeMap<String, String>>,
    /// Optional nonce that perturbs the derived identifier so that
    /// otherwise-identical headers produce distinct CoValues.
    pub uniqueness: Option<String>,
}

impl CoValueHeader {
    /// Convenience constructor for a header with no metadata or nonce.
    pub fn new(kind: CoValueKind, ruleset: Ruleset) -> Self {
        Self {
            kind,
            ruleset,
            meta: None,
            uniqueness: None,
        }
    }

    /// Returns a copy of this header with the given uniqueness nonce.
    pub fn with_uniqueness(mut self, nonce: impl Into<String>) -> Self {
        self.uniqueness = Some(nonce.into());
        self
    }
}
