//! Runtime configuration
//!
//! Amounts are written as decimal token strings (`"100.5"`) because TOML
//! integers stop at 64 bits.

use crate::errors::*;
use serde::{Deserialize, Serialize};
use somnia_types::{Address, Amount};

/// Somnia testnet chain id.
pub const DEFAULT_CHAIN_ID: u64 = 50312;

/// Custody account of the voucher escrow unless configured otherwise.
pub const DEFAULT_ESCROW_ADDRESS: Address = Address([
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0xe5, 0xc0,
]);

/// Capacity of the event broadcast channel.
pub const DEFAULT_EVENT_CAPACITY: usize = 1024;

/// Initial balance handed to an account at genesis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisAllocation {
    pub address: Address,
    #[serde(with = "token_string")]
    pub balance: Amount,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub chain_id: u64,
    pub escrow_address: Address,
    pub event_capacity: usize,
    pub genesis: Vec<GenesisAllocation>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            chain_id: DEFAULT_CHAIN_ID,
            escrow_address: DEFAULT_ESCROW_ADDRESS,
            event_capacity: DEFAULT_EVENT_CAPACITY,
            genesis: Vec::new(),
        }
    }
}

impl RuntimeConfig {
    /// Parse a TOML document. Missing keys fall back to defaults.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: RuntimeConfig = toml::from_str(content)
            .map_err(|e| RuntimeError::Config(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.event_capacity == 0 {
            return Err(RuntimeError::Config(
                "event_capacity must be greater than zero".into(),
            ));
        }
        if self
            .genesis
            .iter()
            .any(|alloc| alloc.address == self.escrow_address)
        {
            return Err(RuntimeError::Config(
                "genesis may not fund the escrow custody account".into(),
            ));
        }
        Ok(())
    }
}

mod token_string {
    use serde::{Deserialize, Deserializer, Serializer};
    use somnia_types::Amount;

    pub fn serialize<S: Serializer>(amount: &Amount, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&amount.format_tokens())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Amount, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Amount::parse_tokens(&raw).map_err(serde::de::Error::custom)
    }
}
