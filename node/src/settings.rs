use anyhow::{Context, Result};
use config::{Config, Environment, File as ConfigFile};
use serde::Deserialize;
use somnia_runtime::{
    GenesisAllocation, RuntimeConfig, DEFAULT_CHAIN_ID, DEFAULT_ESCROW_ADDRESS,
    DEFAULT_EVENT_CAPACITY,
};
use somnia_types::Address;
use std::path::{Path, PathBuf};

/// Node configuration
///
/// Layered from an optional TOML file and `SOMNIA_*` environment variables,
/// in that order.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub chain_id: u64,
    pub state_path: PathBuf,
    pub escrow_address: Address,
    pub event_capacity: usize,
    pub log_level: String,
    pub log_format: String,
    pub genesis: Vec<GenesisAllocation>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            chain_id: DEFAULT_CHAIN_ID,
            state_path: default_state_path(),
            escrow_address: DEFAULT_ESCROW_ADDRESS,
            event_capacity: DEFAULT_EVENT_CAPACITY,
            log_level: "warn".to_string(),
            log_format: "pretty".to_string(),
            genesis: Vec::new(),
        }
    }
}

fn default_state_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("somnia-registry")
        .join("state.json")
}

impl AppConfig {
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();

        if let Some(path) = config_path {
            if !path.exists() {
                anyhow::bail!(
                    "Configuration file {} not found (specified via --config)",
                    path.display()
                );
            }
            builder = builder.add_source(ConfigFile::from(path));
        }

        builder = builder.add_source(Environment::with_prefix("SOMNIA"));

        let config: AppConfig = builder
            .build()?
            .try_deserialize()
            .context("invalid node configuration")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        match self.log_format.as_str() {
            "pretty" | "compact" => {}
            other => anyhow::bail!("unknown log_format {other:?} (expected pretty or compact)"),
        }
        self.runtime_config().validate()?;
        Ok(())
    }

    pub fn runtime_config(&self) -> RuntimeConfig {
        RuntimeConfig {
            chain_id: self.chain_id,
            escrow_address: self.escrow_address,
            event_capacity: self.event_capacity,
            genesis: self.genesis.clone(),
        }
    }
}
