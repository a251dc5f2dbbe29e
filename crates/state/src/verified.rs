//! The verified state of one CoValue.

use lattice_crypto::hash::{blake3_chain, blake3_digest};
use lattice_crypto::sign::{Ed25519PublicKey, Ed25519Signature};
use lattice_types::codec;
use lattice_types::covalue::{CoValueHeader, CoValueId};
use lattice_types::error::{CoValueError, TransactionError};
use lattice_types::known::CoValueKnownState;
use lattice_types::session::{ChainLink, SessionId, Transaction};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Derives the content-addressed identifier for a header.
pub fn id_for_header(header: &CoValueHeader) -> Result<CoValueId, CoValueError> {
    let bytes =
        codec::to_bytes_canonical(header).map_err(CoValueError::HeaderEncoding)?;
    Ok(CoValueId(blake3_digest(bytes)))
}

/// One session's verified transaction log: a contiguous prefix starting at
/// index 0, every entry chain-linked and signature-checked on the way in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionLog {
    transactions: Vec<Transaction>,
}

impl SessionLog {
    /// The number of verified transactions in this log.
    pub fn len(&self) -> u64 {
        self.transactions.len() as u64
    }

    /// True when the log holds no transactions.
    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    /// The verified transactions, in index order.
    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    /// The chain link of the last transaction, if any.
    pub fn last_link(&self) -> Option<ChainLink> {
        self.transactions.last().map(|tx| tx.link)
    }
}

/// The authoritative content of one CoValue: header plus per-session logs.
///
/// The identifier is bound at construction (`id == hash(header)` always
/// holds) and every mutation goes through [`VerifiedState::try_add_transactions`],
/// which verifies before it commits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedState {
    id: CoValueId,
    header: CoValueHeader,
    sessions: BTreeMap<SessionId, SessionLog>,
}

impl VerifiedState {
    /// Constructs an empty-sessions state bound to `header`.
    pub fn from_header(header: CoValueHeader) -> Result<Self, CoValueError> {
        let id = id_for_header(&header)?;
        Ok(Self {
            id,
            header,
            sessions: BTreeMap::new(),
        })
    }

    /// The content-derived identifier.
    pub fn id(&self) -> CoValueId {
        self.id
    }

    /// The immutable header.
    pub fn header(&self) -> &CoValueHeader {
        &self.header
    }

    /// The verified session logs.
    pub fn sessions(&self) -> &BTreeMap<SessionId, SessionLog> {
        &self.sessions
    }

    /// The chain link a new transaction for `session` must follow: the last
    /// verified link, or the CoValue identifier for an empty log.
    pub fn expected_prev_link(&self, session: &SessionId) -> [u8; 32] {
        self.sessions
            .get(session)
            .and_then(SessionLog::last_link)
            .map(|link| link.0)
            .unwrap_or(self.id.0)
    }

    /// Appends `transactions` to `session`'s log.
    ///
    /// The append is atomic: the chain links (and, when `verify_signatures`
    /// is set, the Ed25519 signatures) of every incoming transaction are
    /// checked first, and the log is only extended if all of them pass. On
    /// any error the state is unchanged.
    ///
    /// `starting_at` must equal the current log length; a greater value is
    /// a `Gap`, a smaller one an `Overlap`. Re-sending already-held
    /// transactions is therefore rejected rather than deduplicated, which
    /// keeps the wire contract honest: a correct peer consults our known
    /// state before sending.
    pub fn try_add_transactions(
        &mut self,
        session: SessionId,
        starting_at: u64,
        transactions: &[Transaction],
        verify_signatures: bool,
    ) -> Result<(), TransactionError> {
        let have = self
            .sessions
            .get(&session)
            .map(SessionLog::len)
            .unwrap_or(0);
        if starting_at > have {
            return Err(TransactionError::Gap {
                session,
                have,
                got: starting_at,
            });
        }
        if starting_at < have {
            return Err(TransactionError::Overlap {
                session,
                have,
                got: starting_at,
            });
        }

        let public_key = if verify_signatures {
            Some(
                Ed25519PublicKey::from_bytes(session.agent.as_bytes()).map_err(|e| {
                    TransactionError::InvalidAgentKey {
                        session,
                        reason: e.to_string(),
                    }
                })?,
            )
        } else {
            None
        };

        // Verify the whole batch against a running link before touching the log.
        let mut prev = self.expected_prev_link(&session);
        for (offset, tx) in transactions.iter().enumerate() {
            let index = have + offset as u64;
            let expected = blake3_chain(&prev, &tx.payload);
            if expected != tx.link.0 {
                return Err(TransactionError::BadHashChain { session, index });
            }
            if let Some(key) = &public_key {
                let signature = Ed25519Signature::from_bytes(&tx.signature.0)
                    .map_err(|_| TransactionError::BadSignature { session, index })?;
                key.verify(&tx.link.0, &signature)
                    .map_err(|_| TransactionError::BadSignature { session, index })?;
            }
            prev = tx.link.0;
        }

        self.sessions
            .entry(session)
            .or_default()
            .transactions
            .extend_from_slice(transactions);
        Ok(())
    }

    /// The known-state summary of this content: header held, one count per
    /// session.
    pub fn known_state(&self) -> CoValueKnownState {
        CoValueKnownState {
            id: self.id,
            header: true,
            sessions: self
                .sessions
                .iter()
                .map(|(session, log)| (*session, log.len()))
                .collect(),
        }
    }

    /// Everything a peer with `remote` known state lacks, per session:
    /// `(after, transactions)` pairs ready to be framed as new content.
    /// Returns an empty map when the remote is fully caught up.
    pub fn sessions_after(
        &self,
        remote: &CoValueKnownState,
    ) -> BTreeMap<SessionId, (u64, Vec<Transaction>)> {
        let mut new_content = BTreeMap::new();
        for (session, log) in &self.sessions {
            let after = remote.sessions.get(session).copied().unwrap_or(0);
            if after < log.len() {
                let tail: Vec<Transaction> = log
                    .transactions
                    .iter()
                    .skip(after as usize)
                    .cloned()
                    .collect();
                new_content.insert(*session, (after, tail));
            }
        }
        new_content
    }
}
