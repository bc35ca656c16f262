use serde::{Deserialize, Serialize};
use somnia_types::RegistryEvent;

/// Outcome of a committed call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    /// Hex blake3 digest of the transaction's canonical bytes.
    pub tx_hash: String,
    /// Height assigned to the call; one call per height.
    pub height: u64,
    /// Block time the call executed at.
    pub timestamp: u64,
    /// Events emitted, in emission order.
    pub events: Vec<RegistryEvent>,
}

/// Event as delivered to subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    pub height: u64,
    pub tx_hash: String,
    pub event: RegistryEvent,
}
