//! Node configuration.

use crate::Args;
use anyhow::{Context, Result};
use camino_executor::{Config as ExecutorConfig, LOCAL_NETWORK_ID};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Network ID of mainnet.
pub const MAINNET_NETWORK_ID: u32 = 1000;
/// Network ID of the public testnet.
pub const TESTNET_NETWORK_ID: u32 = 1001;

/// Complete node configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Node name.
    pub node_name: String,
    /// Network (mainnet, testnet, local).
    pub network: String,
    /// Data directory.
    pub data_dir: PathBuf,
    /// Genesis file applied when the database is empty.
    #[serde(default)]
    pub genesis_file: Option<PathBuf>,
    /// Chain parameters.
    #[serde(default)]
    pub executor: ExecutorConfig,
}

impl NodeConfig {
    /// Load configuration from file and CLI args.
    pub fn load(config_path: &Path, args: &Args) -> Result<Self> {
        let mut config = if config_path.exists() {
            let content =
                std::fs::read_to_string(config_path).context("Failed to read config file")?;
            toml::from_str(&content).context("Failed to parse config file")?
        } else {
            Self::default_for_network(&args.network)
        };

        // Override with CLI args
        if let Some(ref data_dir) = args.data_dir {
            config.data_dir = data_dir.clone();
        }
        if let Some(ref genesis) = args.genesis {
            config.genesis_file = Some(genesis.clone());
        }

        Ok(config)
    }

    /// Create default config for a network.
    pub fn default_for_network(network: &str) -> Self {
        let (data_dir, network_id) = match network {
            "mainnet" => (PathBuf::from(".camino"), MAINNET_NETWORK_ID),
            "testnet" => (PathBuf::from(".camino-testnet"), TESTNET_NETWORK_ID),
            _ => (PathBuf::from(".camino-local"), LOCAL_NETWORK_ID),
        };

        Self {
            node_name: "camino-rust-node".to_string(),
            network: network.to_string(),
            data_dir,
            genesis_file: None,
            executor: ExecutorConfig {
                network_id,
                ..ExecutorConfig::default()
            },
        }
    }

    /// Save configuration to file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
