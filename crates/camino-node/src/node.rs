//! Node implementation.

use crate::config::NodeConfig;
use anyhow::{Context, Result};
use camino_executor::{BlockManager, Clock, Executor, SystemClock};
use camino_state::queries::{
    current_validators, deferred_validators, next_chain_event_time, pending_validators,
};
use camino_state::{ChainView, Genesis, State};
use camino_storage::Database;
use camino_types::{Ed25519Verifier, PRIMARY_NETWORK_ID};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Snapshot of the chain for status reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainStatus {
    pub height: u64,
    pub timestamp: u64,
    pub current_supply: u64,
    pub base_fee: u64,
    pub current_validators: usize,
    pub pending_validators: usize,
    pub deferred_validators: usize,
    pub deposit_offers: usize,
    pub proposals_to_finish: usize,
    pub next_event: Option<u64>,
}

impl fmt::Display for ChainStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "height:              {}", self.height)?;
        writeln!(f, "timestamp:           {}", self.timestamp)?;
        writeln!(f, "current supply:      {}", self.current_supply)?;
        writeln!(f, "base fee:            {}", self.base_fee)?;
        writeln!(
            f,
            "validators:          {} current, {} pending, {} deferred",
            self.current_validators, self.pending_validators, self.deferred_validators
        )?;
        writeln!(f, "deposit offers:      {}", self.deposit_offers)?;
        writeln!(f, "proposals to finish: {}", self.proposals_to_finish)?;
        match self.next_event {
            Some(time) => write!(f, "next chain event:    {}", time),
            None => write!(f, "next chain event:    none"),
        }
    }
}

/// A node over one chain database.
pub struct Node {
    state: Arc<State>,
    blocks: BlockManager,
}

impl Node {
    /// Open the database, applying genesis if it is empty.
    pub fn open(config: NodeConfig) -> Result<Self> {
        std::fs::create_dir_all(&config.data_dir).context("Failed to create data directory")?;
        let db = Database::open(config.data_dir.join("chain")).context("Failed to open database")?;
        Self::with_storage(config, Arc::new(db), Arc::new(SystemClock))
    }

    fn with_storage(
        config: NodeConfig,
        storage: Arc<Database>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let state = Arc::new(State::open(storage).context("Failed to open chain state")?);

        if state.timestamp() == 0 {
            let genesis = match &config.genesis_file {
                Some(path) => load_genesis(path)?,
                None => Genesis {
                    timestamp: clock.unix_time(),
                    base_fee: config.executor.tx_fee,
                    fee_asset_id: config.executor.fee_asset_id,
                    ..Genesis::default()
                },
            };
            let genesis_id = genesis.apply(&state).context("Failed to apply genesis")?;
            info!(genesis = %genesis_id, "Initialized empty database");
        }

        let executor = Executor::new(config.executor, clock, Arc::new(Ed25519Verifier));
        Ok(Self {
            blocks: BlockManager::new(state.clone(), executor),
            state,
        })
    }

    /// Accept due system transactions, taking the commit outcome of
    /// proposal blocks. Returns the number of blocks accepted.
    pub fn tick(&self, max_blocks: usize) -> Result<usize> {
        let mut accepted = 0;
        while accepted < max_blocks {
            let Some(tx) = self.blocks.next_system_tx()? else {
                break;
            };
            debug!(kind = tx.unsigned.kind(), "Issuing system transaction");
            if tx.unsigned.is_proposal_style() {
                let outcome = self.blocks.verify_proposal(&tx)?;
                self.blocks.accept(&outcome.on_commit)?;
            } else {
                let diff = self.blocks.verify_standard(std::slice::from_ref(&tx))?;
                self.blocks.accept(&diff)?;
            }
            accepted += 1;
        }
        Ok(accepted)
    }

    pub fn status(&self) -> Result<ChainStatus> {
        let view: &dyn ChainView = self.state.as_ref();
        Ok(ChainStatus {
            height: self.state.height(),
            timestamp: view.timestamp(),
            current_supply: view.current_supply(),
            base_fee: view.base_fee(),
            current_validators: current_validators(view, &PRIMARY_NETWORK_ID)?.len(),
            pending_validators: pending_validators(view, &PRIMARY_NETWORK_ID)?.len(),
            deferred_validators: deferred_validators(view, &PRIMARY_NETWORK_ID)?.len(),
            deposit_offers: view.deposit_offers()?.len(),
            proposals_to_finish: view.proposal_ids_to_finish()?.len(),
            next_event: next_chain_event_time(view)?,
        })
    }
}

/// Read a TOML genesis file.
pub fn load_genesis(path: &Path) -> Result<Genesis> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read genesis file {:?}", path))?;
    toml::from_str(&content).context("Failed to parse genesis file")
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino_executor::MockClock;
    use camino_state::genesis::{Allocation, GenesisValidator};
    use camino_types::{NodeId, OutputOwners, ShortId};

    fn config(dir: &Path) -> NodeConfig {
        NodeConfig {
            data_dir: dir.to_path_buf(),
            ..NodeConfig::default_for_network("local")
        }
    }

    fn open(config: NodeConfig, clock: Arc<MockClock>) -> Node {
        let db = Database::open(config.data_dir.join("chain")).unwrap();
        Node::with_storage(config, Arc::new(db), clock).unwrap()
    }

    #[test]
    fn test_empty_database_gets_default_genesis() {
        let dir = tempfile::TempDir::new().unwrap();
        let node = open(config(dir.path()), Arc::new(MockClock::new(5_000)));

        let status = node.status().unwrap();
        assert_eq!(status.height, 0);
        assert_eq!(status.timestamp, 5_000);
        assert_eq!(status.current_supply, 0);
        assert_eq!(status.next_event, None);
    }

    #[test]
    fn test_genesis_file_and_tick() {
        let dir = tempfile::TempDir::new().unwrap();
        let member = ShortId([1u8; 20]);
        let mut config = config(dir.path());
        let genesis = Genesis {
            timestamp: 1_000,
            base_fee: config.executor.tx_fee,
            fee_asset_id: config.executor.fee_asset_id,
            allocations: vec![Allocation {
                owner: OutputOwners::single(member),
                amount: 10_000,
            }],
            validators: vec![GenesisValidator {
                node_id: NodeId([1u8; 20]),
                member,
                weight: 500,
                end_time: 2_000,
            }],
            ..Genesis::default()
        };
        let genesis_path = dir.path().join("genesis.toml");
        std::fs::write(&genesis_path, toml::to_string(&genesis).unwrap()).unwrap();
        config.genesis_file = Some(genesis_path);

        let clock = Arc::new(MockClock::new(3_000));
        let node = open(config, clock);
        let status = node.status().unwrap();
        assert_eq!(status.current_supply, 10_500);
        assert_eq!(status.next_event, Some(2_000));

        // Advance to the validator end, remove it, then advance to the clock.
        assert_eq!(node.tick(16).unwrap(), 3);
        let status = node.status().unwrap();
        assert_eq!(status.height, 3);
        assert_eq!(status.timestamp, 3_000);
        assert_eq!(status.current_validators, 0);
        assert_eq!(node.tick(16).unwrap(), 0);
    }

    #[test]
    fn test_reopen_keeps_state() {
        let dir = tempfile::TempDir::new().unwrap();
        let clock = Arc::new(MockClock::new(5_000));
        {
            let node = open(config(dir.path()), clock.clone());
            clock.set(6_000);
            assert_eq!(node.tick(1).unwrap(), 1);
        }
        clock.set(9_000);
        let node = open(config(dir.path()), clock);
        let status = node.status().unwrap();
        assert_eq!(status.height, 1);
        assert_eq!(status.timestamp, 6_000);
    }
}
