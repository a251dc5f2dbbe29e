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

//! # Lattice Node
//!
//! The process-wide coordinator: one [`LocalNode`] owns the cryptographic
//! identity, the peer set, and the CoValue registry, and wires the library
//! crates together. In-process node pairs for tests and embedded use live
//! in [`local`].

/// On-disk identity for long-lived nodes.
pub mod identity;
/// In-process duplex wiring between two nodes.
pub mod local;
/// The [`LocalNode`] coordinator.
pub mod node;

pub use local::connect_nodes;
pub use node::LocalNode;
