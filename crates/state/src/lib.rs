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

//! # Lattice State
//!
//! The authoritative, cryptographically validated content of a CoValue:
//! its header plus one gap-free, hash-chained, signed transaction log per
//! session. This crate sits between `lattice-types` (plain data) and
//! `lattice-sync` (the load/sync state machine): everything here is pure
//! verification and bookkeeping with no I/O.

pub mod author;
pub mod verified;

pub use author::SessionAuthor;
pub use verified::{id_for_header, SessionLog, VerifiedState};
