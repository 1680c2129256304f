//! Test harness for integration tests.
//!
//! Provides temporary databases and [`TestChain`], a chain with a funded
//! consortium, genesis validators and one wallet per address, driven by a
//! mock clock.

use crate::generators::{key_seed, test_node_id, ADMIN_SEED};
use camino_executor::{BlockManager, Config, DacConfig, Executor, ExecutorResult, MockClock};
use camino_state::genesis::{Allocation, GenesisValidator};
use camino_state::{get_balance, Balance, ChainView, Genesis, OptionalExt, State, StateResult};
use camino_storage::{Database, MemoryStorage, Storage};
use camino_types::{
    AddressState, Ed25519Verifier, Id, NodeId, OutputOwners, ShortId, Tx, PRIMARY_NETWORK_ID,
};
use camino_wallet::{Keychain, TxBuilder, WalletResult};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

/// Chain time of the genesis block.
pub const GENESIS_TIME: u64 = 1_000_000;
/// End time of the genesis validators.
pub const VALIDATOR_END: u64 = GENESIS_TIME + 10_000_000;
/// Genesis allocation of every funded address.
pub const FUNDS: u64 = 10_000_000_000;
/// Seed of the KYC verified member without a node.
pub const APPLICANT_SEED: u8 = 50;

/// Chain parameters sized for tests.
pub fn test_config() -> Config {
    Config {
        tx_fee: 1_000,
        create_subnet_tx_fee: 10_000,
        create_blockchain_tx_fee: 10_000,
        validator_bond_amount: 1_000_000_000,
        min_stake_duration: 100,
        max_stake_duration: 100_000_000,
        max_future_start_time: 1_000_000,
        validator_reward_rate_nominator: 1_000_000,
        dac: DacConfig {
            proposal_bond_amount: 10_000,
            min_proposal_duration: 10,
            max_proposal_duration: 1_000_000,
        },
        ..Config::default()
    }
}

/// Test database wrapper that cleans up on drop.
pub struct TestDatabase {
    db: Database,
    _temp_dir: TempDir,
}

impl TestDatabase {
    /// Create a new test database in a temporary directory.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let db = Database::open(temp_dir.path()).expect("Failed to open database");
        Self {
            db,
            _temp_dir: temp_dir,
        }
    }

    /// Get the path to the database.
    pub fn path(&self) -> PathBuf {
        self._temp_dir.path().to_path_buf()
    }

    /// Get a clone of the database (shares underlying connection).
    pub fn db_clone(&self) -> Database {
        self.db.clone()
    }
}

impl Default for TestDatabase {
    fn default() -> Self {
        Self::new()
    }
}

impl std::ops::Deref for TestDatabase {
    type Target = Database;

    fn deref(&self) -> &Self::Target {
        &self.db
    }
}

/// Genesis with an admin, `validators` members each running a genesis
/// validator, and an applicant that is a member without a node.
pub fn test_genesis(config: &Config, validators: usize) -> Genesis {
    let address = |seed: u8| Keychain::from_seeds(&[key_seed(seed)]).addresses()[0];
    let admin = address(ADMIN_SEED);
    let applicant = address(APPLICANT_SEED);
    let member_state = AddressState::CONSORTIUM.with(AddressState::KYC_VERIFIED);

    let mut genesis = Genesis {
        timestamp: GENESIS_TIME,
        base_fee: config.tx_fee,
        fee_asset_id: config.fee_asset_id,
        ..Genesis::default()
    };
    for funded in [admin, applicant] {
        genesis.allocations.push(Allocation {
            owner: OutputOwners::single(funded),
            amount: FUNDS,
        });
    }
    genesis.address_states.push((
        admin,
        AddressState::ROLE_ADMIN
            .with(AddressState::ROLE_OFFERS_ADMIN)
            .with(AddressState::ROLE_FEE_PROPOSER)
            .with(AddressState::ROLE_CONSORTIUM_ADMIN_PROPOSER),
    ));
    genesis.address_states.push((applicant, member_state));

    for index in 0..validators {
        let member = address(index as u8 + 1);
        genesis.allocations.push(Allocation {
            owner: OutputOwners::single(member),
            amount: FUNDS,
        });
        genesis.address_states.push((member, member_state));
        genesis.validators.push(GenesisValidator {
            node_id: test_node_id(index),
            member,
            weight: config.validator_bond_amount,
            end_time: VALIDATOR_END + index as u64,
        });
    }
    genesis
}

/// A chain with funded wallets, accepting one block per issued transaction.
pub struct TestChain {
    pub config: Config,
    pub genesis: Genesis,
    pub state: Arc<State>,
    pub blocks: BlockManager,
    pub clock: Arc<MockClock>,
    pub admin: ShortId,
    pub applicant: ShortId,
    /// Members running the genesis validators, in validator order.
    pub members: Vec<ShortId>,
    keychains: BTreeMap<ShortId, Keychain>,
    _temp_dir: Option<TempDir>,
}

impl TestChain {
    /// In-memory chain with `validators` genesis validators.
    pub fn new(validators: usize) -> Self {
        Self::with_storage(Arc::new(MemoryStorage::new()), validators, None)
    }

    /// RocksDB-backed chain in a temporary directory.
    pub fn on_disk(validators: usize) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let db = Database::open(temp_dir.path()).expect("Failed to open database");
        Self::with_storage(Arc::new(db), validators, Some(temp_dir))
    }

    /// Open the chain stored at `path`, applying genesis if it is empty.
    pub fn open_at(path: &Path, validators: usize) -> Self {
        let db = Database::open(path).expect("Failed to open database");
        Self::with_storage(Arc::new(db), validators, None)
    }

    fn with_storage(
        storage: Arc<dyn Storage>,
        validators: usize,
        temp_dir: Option<TempDir>,
    ) -> Self {
        let config = test_config();
        let genesis = test_genesis(&config, validators);
        let state = Arc::new(State::open(storage).expect("Failed to open state"));
        if state.timestamp() == 0 {
            genesis.apply(&state).expect("Failed to apply genesis");
        }

        let clock = Arc::new(MockClock::new(state.timestamp()));
        let executor = Executor::new(config.clone(), clock.clone(), Arc::new(Ed25519Verifier));

        let mut keychains = BTreeMap::new();
        let mut add = |seed: u8| {
            let keychain = Keychain::from_seeds(&[key_seed(seed)]);
            let address = keychain.addresses()[0];
            keychains.insert(address, keychain);
            address
        };
        let admin = add(ADMIN_SEED);
        let applicant = add(APPLICANT_SEED);
        let members = (0..validators).map(|i| add(i as u8 + 1)).collect();

        Self {
            config,
            genesis,
            blocks: BlockManager::new(state.clone(), executor),
            state,
            clock,
            admin,
            applicant,
            members,
            keychains,
            _temp_dir: temp_dir,
        }
    }

    pub fn view(&self) -> &dyn ChainView {
        self.state.as_ref()
    }

    pub fn timestamp(&self) -> u64 {
        self.state.timestamp()
    }

    pub fn keychain(&self, address: &ShortId) -> &Keychain {
        self.keychains
            .get(address)
            .expect("address has no keychain in this harness")
    }

    /// Builder paying from and returning change to `payer`.
    pub fn wallet(&self, payer: ShortId) -> TxBuilder<'_> {
        TxBuilder::new(self.view(), self.keychain(&payer), &self.config)
            .change_owner(OutputOwners::single(payer))
    }

    /// Build a transaction with `payer`'s wallet, panicking on wallet errors.
    pub fn build<F>(&self, payer: ShortId, build: F) -> Tx
    where
        F: FnOnce(&TxBuilder<'_>) -> WalletResult<Tx>,
    {
        build(&self.wallet(payer)).expect("Failed to build transaction")
    }

    /// Verify and accept a standard block holding `tx`.
    pub fn issue(&self, tx: &Tx) -> ExecutorResult<Id> {
        let block = self.blocks.verify_standard(std::slice::from_ref(tx))?;
        self.blocks.accept(&block)?;
        Ok(tx.id()?)
    }

    /// Build with `payer`'s wallet and issue.
    pub fn submit<F>(&self, payer: ShortId, build: F) -> ExecutorResult<Id>
    where
        F: FnOnce(&TxBuilder<'_>) -> WalletResult<Tx>,
    {
        let tx = self.build(payer, build);
        self.issue(&tx)
    }

    /// Accept due system transactions until none is left, taking the commit
    /// outcome of proposal blocks. Returns the number of blocks accepted.
    pub fn process_system_txs(&self) -> ExecutorResult<usize> {
        let mut accepted = 0;
        while let Some(tx) = self.blocks.next_system_tx()? {
            if tx.unsigned.is_proposal_style() {
                let outcome = self.blocks.verify_proposal(&tx)?;
                self.blocks.accept(&outcome.on_commit)?;
            } else {
                self.issue(&tx)?;
            }
            accepted += 1;
        }
        Ok(accepted)
    }

    /// Set the clock to `time` and process system transactions up to it.
    pub fn advance_to(&self, time: u64) -> ExecutorResult<usize> {
        self.clock.set(time);
        self.process_system_txs()
    }

    /// Balance of `address` in the fee asset.
    pub fn balance(&self, address: &ShortId) -> Balance {
        get_balance(self.view(), &[*address])
            .expect("Failed to read balance")
            .get(&self.config.fee_asset_id)
            .copied()
            .unwrap_or_default()
    }

    /// Rewards claimable by `owners`.
    pub fn claimable(&self, owners: &OutputOwners) -> u64 {
        let owner_id = owners.owner_id().expect("Failed to derive owner ID");
        self.view()
            .claimable(&owner_id)
            .expect("Failed to read claimable")
    }

    /// Number of staker sets (pending, current, deferred) holding `node_id`.
    pub fn staker_sets_holding(&self, subnet_id: &Id, node_id: &NodeId) -> StateResult<usize> {
        let view = self.view();
        Ok([
            view.get_pending_staker(subnet_id, node_id).optional()?,
            view.get_current_staker(subnet_id, node_id).optional()?,
            view.get_deferred_staker(subnet_id, node_id).optional()?,
        ]
        .iter()
        .filter(|s| s.is_some())
        .count())
    }

    /// Primary network staker sets holding `node_id`.
    pub fn primary_sets_holding(&self, node_id: &NodeId) -> usize {
        self.staker_sets_holding(&PRIMARY_NETWORK_ID, node_id)
            .expect("Failed to read stakers")
    }
}
