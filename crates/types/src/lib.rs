#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! # Lattice Types
//!
//! This crate is the foundational library for the Lattice engine, containing
//! all core data structures, error types, and configuration objects.
//!
//! ## Architectural Role
//!
//! As the base crate, `lattice-types` has minimal dependencies and is itself
//! a dependency for almost every other crate in the workspace. This structure
//! prevents circular dependencies and provides a stable, canonical definition
//! for shared types like `CoValueHeader`, `SessionId`, `Transaction`, and the
//! known-state vector used for delta negotiation.

/// The canonical, deterministic binary codec for content addressing and wire framing.
pub mod codec;
/// Shared configuration structures (e.g. `SyncConfig`).
pub mod config;
/// CoValue identifiers, headers, and rulesets.
pub mod covalue;
/// A unified set of all error types used across the engine.
pub mod error;
/// The per-session known-state vector and its combine/diff algebra.
pub mod known;
/// Session identifiers and the transaction entry they log.
pub mod session;
