//! The known-state vector: a per-session transaction-count summary used
//! for delta negotiation between peers.

use crate::covalue::CoValueId;
use crate::session::SessionId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Per-session transaction counts for one CoValue, as seen by one peer.
///
/// `sessions[s]` is the number of transactions the peer holds for session
/// `s`; because session logs are gap-free prefixes, a count fully describes
/// the held range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoValueKnownState {
    /// The CoValue this summary describes.
    pub id: CoValueId,
    /// Whether the peer holds the CoValue's header.
    pub header: bool,
    /// Transaction count per session.
    pub sessions: BTreeMap<SessionId, u64>,
}

impl CoValueKnownState {
    /// An empty summary: no header, no sessions.
    pub fn empty(id: CoValueId) -> Self {
        Self {
            id,
            header: false,
            sessions: BTreeMap::new(),
        }
    }

    /// Combines two session maps, keeping the per-session maximum.
    ///
    /// Commutative, associative, and idempotent: combining summaries in any
    /// order or repetition yields the same result, so peers can merge
    /// advertisements as they arrive.
    pub fn combine_sessions(
        a: &BTreeMap<SessionId, u64>,
        b: &BTreeMap<SessionId, u64>,
    ) -> BTreeMap<SessionId, u64> {
        let mut combined = a.clone();
        for (session, &count) in b {
            combined
                .entry(*session)
                .and_modify(|existing| *existing = (*existing).max(count))
                .or_insert(count);
        }
        combined
    }

    /// Combines this summary with another for the same CoValue: per-session
    /// maxima, logical OR of the header flag.
    pub fn combined(&self, other: &CoValueKnownState) -> CoValueKnownState {
        CoValueKnownState {
            id: self.id,
            header: self.header || other.header,
            sessions: Self::combine_sessions(&self.sessions, &other.sessions),
        }
    }

    /// Compares this (local) summary against a remote one.
    pub fn diff(&self, remote: &CoValueKnownState) -> KnownStateDiff {
        let mut missing = BTreeMap::new();
        let mut newer = BTreeMap::new();
        for (session, &remote_count) in &remote.sessions {
            let local_count = self.sessions.get(session).copied().unwrap_or(0);
            if remote_count > local_count {
                missing.insert(*session, remote_count);
            }
        }
        for (session, &local_count) in &self.sessions {
            let remote_count = remote.sessions.get(session).copied().unwrap_or(0);
            if local_count > remote_count {
                newer.insert(*session, local_count);
            }
        }
        KnownStateDiff { missing, newer }
    }
}

/// The outcome of comparing a local known state against a remote one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KnownStateDiff {
    /// Sessions where the remote holds transactions we lack, with the
    /// remote's count.
    pub missing: BTreeMap<SessionId, u64>,
    /// Sessions where we hold transactions the remote lacks, with our count.
    pub newer: BTreeMap<SessionId, u64>,
}

impl KnownStateDiff {
    /// True when neither side holds anything the other lacks.
    pub fn is_converged(&self) -> bool {
        self.missing.is_empty() && self.newer.is_empty()
    }
}
