//! Executor configuration.

use camino_types::{Id, TxContext};
use serde::{Deserialize, Serialize};

/// Nano-units per whole coin.
pub const NANO_PER_COIN: u64 = 1_000_000_000;

/// Network ID of local test networks.
pub const LOCAL_NETWORK_ID: u32 = 12345;

/// Governance parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DacConfig {
    /// Amount bonded by every proposal until it finishes.
    pub proposal_bond_amount: u64,
    /// Shortest allowed voting window, in seconds.
    pub min_proposal_duration: u64,
    /// Longest allowed voting window, in seconds.
    pub max_proposal_duration: u64,
}

impl Default for DacConfig {
    fn default() -> Self {
        Self {
            proposal_bond_amount: 100 * NANO_PER_COIN,
            min_proposal_duration: 7 * 24 * 3600,
            max_proposal_duration: 60 * 24 * 3600,
        }
    }
}

/// Chain parameters shared by all executors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub network_id: u32,
    /// ID of this chain; user transactions must target it.
    pub chain_id: Id,
    /// Asset fees and bonds are paid in.
    pub fee_asset_id: Id,
    pub tx_fee: u64,
    pub create_subnet_tx_fee: u64,
    pub create_blockchain_tx_fee: u64,
    /// Exact amount a primary validator bonds.
    pub validator_bond_amount: u64,
    pub min_stake_duration: u64,
    pub max_stake_duration: u64,
    /// How far ahead of chain time a validator may be scheduled to start.
    pub max_future_start_time: u64,
    /// Per-year reward rate of primary validators, over the interest denominator.
    pub validator_reward_rate_nominator: u64,
    /// Allowed lead of proposed chain time over the local clock, in seconds.
    pub sync_bound: u64,
    pub dac: DacConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            network_id: LOCAL_NETWORK_ID,
            chain_id: Id::EMPTY,
            fee_asset_id: Id::hash_of(b"CAM"),
            tx_fee: NANO_PER_COIN / 1000,
            create_subnet_tx_fee: 100 * NANO_PER_COIN / 1000,
            create_blockchain_tx_fee: 100 * NANO_PER_COIN / 1000,
            validator_bond_amount: 100_000 * NANO_PER_COIN,
            min_stake_duration: 24 * 3600,
            max_stake_duration: 365 * 24 * 3600,
            max_future_start_time: 14 * 24 * 3600,
            validator_reward_rate_nominator: 100_000,
            sync_bound: 10,
            dac: DacConfig::default(),
        }
    }
}

impl Config {
    /// Context for syntactic verification.
    pub fn tx_context(&self) -> TxContext {
        TxContext {
            network_id: self.network_id,
            chain_id: self.chain_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_consistent() {
        let config = Config::default();
        assert_eq!(config.tx_context().network_id, LOCAL_NETWORK_ID);
        assert!(config.validator_bond_amount > config.dac.proposal_bond_amount);
        assert!(config.min_stake_duration < config.max_stake_duration);
        assert!(config.dac.min_proposal_duration < config.dac.max_proposal_duration);
    }
}
