//! The wire messages peers exchange.
//!
//! A message is a tagged record; how the bytes are framed on the wire is
//! the transport's concern. The canonical codec is provided for transports
//! without a framing of their own.

use lattice_types::codec;
use lattice_types::covalue::{CoValueHeader, CoValueId};
use lattice_types::error::SyncError;
use lattice_types::known::CoValueKnownState;
use lattice_types::session::{SessionId, Transaction};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// New transactions for one session, starting after a known prefix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionNewContent {
    /// The number of transactions the recipient already holds; the
    /// transactions below start at this index.
    pub after: u64,
    /// The transactions extending the session log.
    pub transactions: Vec<Transaction>,
}

/// A `content` message: header (when the recipient lacks it) plus new
/// transactions per session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewContentMessage {
    /// The CoValue this content belongs to.
    pub id: CoValueId,
    /// The header, included iff the recipient is not known to hold it.
    pub header: Option<CoValueHeader>,
    /// New transactions per session.
    pub new: BTreeMap<SessionId, SessionNewContent>,
}

/// One peer-to-peer sync message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncMessage {
    /// A request for content, carrying the sender's known state so the
    /// recipient can reply with exactly the delta.
    Load(CoValueKnownState),
    /// An advertisement of the sender's known state.
    Known(CoValueKnownState),
    /// Header and/or new transactions.
    Content(NewContentMessage),
    /// The sender has nothing (more) for this CoValue at this time.
    Done {
        /// The CoValue the sender was asked about.
        id: CoValueId,
    },
}

impl SyncMessage {
    /// The CoValue this message concerns.
    pub fn id(&self) -> CoValueId {
        match self {
            SyncMessage::Load(known) | SyncMessage::Known(known) => known.id,
            SyncMessage::Content(content) => content.id,
            SyncMessage::Done { id } => *id,
        }
    }

    /// The action label, used for logging and metrics.
    pub fn action(&self) -> &'static str {
        match self {
            SyncMessage::Load(_) => "load",
            SyncMessage::Known(_) => "known",
            SyncMessage::Content(_) => "content",
            SyncMessage::Done { .. } => "done",
        }
    }

    /// Encodes this message with the canonical codec.
    pub fn to_wire_bytes(&self) -> Result<Vec<u8>, SyncError> {
        codec::to_bytes_canonical(self).map_err(SyncError::Decode)
    }

    /// Decodes a message produced by [`SyncMessage::to_wire_bytes`].
    pub fn from_wire_bytes(bytes: &[u8]) -> Result<Self, SyncError> {
        codec::from_bytes_canonical(bytes).map_err(SyncError::Decode)
    }
}
