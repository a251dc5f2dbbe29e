//! Defines the canonical, deterministic binary codec for content addressing
//! and wire framing.
//!
//! This module provides thin wrappers around `bcs` (Binary Canonical
//! Serialization). BCS guarantees a single byte representation per value,
//! which is what makes content-derived CoValue identifiers meaningful: two
//! peers encoding the same header must produce the same bytes, and
//! therefore the same identifier. Centralizing the codec here in the base
//! `types` crate ensures every component uses the exact same format.

use serde::de::DeserializeOwned;
use serde::Serialize;

/// Encodes a value into its canonical byte representation.
///
/// Use this for all data that feeds an identifier hash or a signature, and
/// for wire messages when the transport has no framing of its own.
pub fn to_bytes_canonical<T: Serialize>(v: &T) -> Result<Vec<u8>, String> {
    bcs::to_bytes(v).map_err(|e| format!("canonical encode failed: {e}"))
}

/// Decodes a value from its canonical byte representation.
///
/// Fails fast on any trailing bytes or malformed input, returning a
/// descriptive string; malformed data from a peer must never be silently
/// truncated into a valid value.
pub fn from_bytes_canonical<T: DeserializeOwned>(b: &[u8]) -> Result<T, String> {
    bcs::from_bytes(b).map_err(|e| format!("canonical decode failed: {e}"))
}
