//! Shared configuration structures for the engine's core components.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tunables for the load/sync state machine and per-peer flow control.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Per-peer load deadline in milliseconds. Elapsing counts as
    /// not-found for the termination rule; the peer is not marked errored.
    #[serde(default = "default_load_deadline_ms")]
    pub load_deadline_ms: u64,
    /// Outbound queue depth per peer before pushers are back-pressured.
    #[serde(default = "default_outbound_queue_high_water")]
    pub outbound_queue_high_water: usize,
    /// Maximum number of concurrently running load attempts, node-wide.
    #[serde(default = "default_max_in_flight_loads")]
    pub max_in_flight_loads: usize,
    /// Whether to verify Ed25519 transaction signatures. Disable only in
    /// tests; hash-chain and gap checks always run.
    #[serde(default = "default_verify_signatures")]
    pub verify_signatures: bool,
    /// Contact storage-role peers before server-role peers when loading.
    #[serde(default = "default_storage_first")]
    pub storage_first: bool,
}

fn default_load_deadline_ms() -> u64 {
    30_000
}

fn default_outbound_queue_high_water() -> usize {
    1024
}

fn default_max_in_flight_loads() -> usize {
    100
}

fn default_verify_signatures() -> bool {
    true
}

fn default_storage_first() -> bool {
    true
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            load_deadline_ms: default_load_deadline_ms(),
            outbound_queue_high_water: default_outbound_queue_high_water(),
            max_in_flight_loads: default_max_in_flight_loads(),
            verify_signatures: default_verify_signatures(),
            storage_first: default_storage_first(),
        }
    }
}

impl SyncConfig {
    /// The per-peer load deadline as a [`Duration`].
    pub fn load_deadline(&self) -> Duration {
        Duration::from_millis(self.load_deadline_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = SyncConfig::default();
        assert_eq!(config.load_deadline_ms, 30_000);
        assert_eq!(config.outbound_queue_high_water, 1024);
        assert_eq!(config.max_in_flight_loads, 100);
        assert!(config.verify_signatures);
        assert!(config.storage_first);
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let config: SyncConfig = serde_json::from_str(r#"{"load_deadline_ms": 500}"#).unwrap();
        assert_eq!(config.load_deadline(), Duration::from_millis(500));
        assert_eq!(config.max_in_flight_loads, 100);
    }
}
