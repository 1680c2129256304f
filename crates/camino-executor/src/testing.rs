//! Shared fixtures for executor unit tests.

use crate::{Config, DacConfig, Executor, MockClock};
use camino_state::genesis::{Allocation, GenesisValidator};
use camino_state::{ChainView, Genesis, State};
use camino_storage::MemoryStorage;
use camino_types::{
    address_from_public_key, AddressState, Credential, DepositOffer, Ed25519Verifier, Id, Input,
    LockedInput, NodeId, OutputOwners, ShortId, SignatureEntry, TransferInput, TransferableInput,
    Tx, UnsignedTx, Utxo,
};
use ed25519_dalek::{Signer, SigningKey};
use std::sync::Arc;

pub const GENESIS_TIME: u64 = 1_000_000;
pub const VALIDATOR_END: u64 = GENESIS_TIME + 100_000;
pub const MEMBER_FUNDS: u64 = 100_000;
pub const ADMIN_FUNDS: u64 = 1_000_000;

#[derive(Clone)]
pub struct TestKey {
    signing: SigningKey,
}

impl TestKey {
    pub fn new(seed: u8) -> Self {
        Self {
            signing: SigningKey::from_bytes(&[seed; 32]),
        }
    }

    pub fn address(&self) -> ShortId {
        address_from_public_key(&self.signing.verifying_key().to_bytes())
    }

    pub fn owners(&self) -> OutputOwners {
        OutputOwners::single(self.address())
    }

    pub fn sign(&self, message: &[u8]) -> SignatureEntry {
        SignatureEntry {
            public_key: self.signing.verifying_key().to_bytes().to_vec(),
            signature: self.signing.sign(message).to_bytes().to_vec(),
        }
    }
}

pub fn credential_for(keys: &[&TestKey], message: &[u8]) -> Credential {
    Credential {
        sigs: keys.iter().map(|k| k.sign(message)).collect(),
    }
}

/// Sign `unsigned` with one credential per signer group.
pub fn sign(unsigned: UnsignedTx, signers: &[Vec<&TestKey>]) -> Tx {
    let tx_id = unsigned.id().unwrap();
    Tx {
        unsigned,
        creds: signers
            .iter()
            .map(|keys| credential_for(keys, tx_id.as_bytes()))
            .collect(),
    }
}

pub fn verifier() -> Ed25519Verifier {
    Ed25519Verifier
}

pub fn fee_asset() -> Id {
    test_config().fee_asset_id
}

pub fn offer_id() -> Id {
    Id::hash_of(b"genesis offer")
}

pub fn node(i: usize) -> NodeId {
    NodeId([i as u8 + 1; 20])
}

pub fn test_config() -> Config {
    Config {
        tx_fee: 10,
        create_subnet_tx_fee: 100,
        create_blockchain_tx_fee: 100,
        validator_bond_amount: 1_000,
        min_stake_duration: 100,
        max_stake_duration: 1_000_000,
        max_future_start_time: 1_000_000,
        validator_reward_rate_nominator: 100_000,
        dac: DacConfig {
            proposal_bond_amount: 50,
            min_proposal_duration: 10,
            max_proposal_duration: 10_000,
        },
        ..Config::default()
    }
}

/// Input spending all of `utxo` with the first owner's signature.
pub fn input_spending(utxo: &Utxo) -> TransferableInput {
    let plain = Input::Transfer(TransferInput {
        amount: utxo.out.amount(),
        sig_indices: vec![0],
    });
    let ids = utxo.out.lock_ids();
    TransferableInput {
        utxo_id: utxo.utxo_id,
        asset_id: utxo.asset_id,
        input: if ids.is_locked() {
            Input::Locked(LockedInput::new(ids, plain))
        } else {
            plain
        },
    }
}

/// Five consortium members each running a genesis validator, plus an admin.
pub struct Fixture {
    pub state: Arc<State>,
    pub genesis: Genesis,
    pub clock: Arc<MockClock>,
    members: Vec<TestKey>,
    admin: TestKey,
}

impl Fixture {
    pub fn new() -> Self {
        let members: Vec<TestKey> = (1..=5).map(TestKey::new).collect();
        let admin = TestKey::new(100);
        let config = test_config();

        let mut genesis = Genesis {
            timestamp: GENESIS_TIME,
            base_fee: config.tx_fee,
            fee_asset_id: config.fee_asset_id,
            ..Genesis::default()
        };
        genesis.allocations.push(Allocation {
            owner: admin.owners(),
            amount: ADMIN_FUNDS,
        });
        genesis.address_states.push((
            admin.address(),
            AddressState::ROLE_ADMIN
                .with(AddressState::ROLE_OFFERS_ADMIN)
                .with(AddressState::ROLE_FEE_PROPOSER)
                .with(AddressState::ROLE_CONSORTIUM_ADMIN_PROPOSER)
                .with(AddressState::KYC_VERIFIED),
        ));
        for (i, member) in members.iter().enumerate() {
            genesis.allocations.push(Allocation {
                owner: member.owners(),
                amount: MEMBER_FUNDS,
            });
            genesis.address_states.push((
                member.address(),
                AddressState::CONSORTIUM.with(AddressState::KYC_VERIFIED),
            ));
            genesis.validators.push(GenesisValidator {
                node_id: node(i),
                member: member.address(),
                weight: config.validator_bond_amount,
                end_time: VALIDATOR_END + i as u64,
            });
        }
        genesis.deposit_offers.push(DepositOffer {
            id: offer_id(),
            interest_rate_nominator: 1_000_000,
            start: 0,
            end: GENESIS_TIME + 1_000_000,
            min_amount: 1,
            min_duration: 10,
            max_duration: 100_000,
            no_rewards_period_duration: 0,
            total_max_amount: 0,
            deposited_amount: 0,
            memo: Vec::new(),
            flags: 0,
        });

        let state = Arc::new(State::open(Arc::new(MemoryStorage::new())).unwrap());
        genesis.apply(&state).unwrap();

        Self {
            state,
            genesis,
            clock: Arc::new(MockClock::new(GENESIS_TIME)),
            members,
            admin,
        }
    }

    pub fn view(&self) -> Arc<dyn ChainView> {
        self.state.clone()
    }

    pub fn executor(&self) -> Executor {
        Executor::new(test_config(), self.clock.clone(), Arc::new(Ed25519Verifier))
    }

    pub fn alice(&self) -> TestKey {
        self.admin.clone()
    }

    pub fn member(&self, i: usize) -> TestKey {
        self.members[i].clone()
    }

    /// First unlocked UTXO of `key` in `view`.
    pub fn unlocked_input_in(&self, view: &dyn ChainView, key: &TestKey) -> TransferableInput {
        let utxo = view
            .utxo_ids(&key.address(), None, 100)
            .unwrap()
            .into_iter()
            .map(|id| view.get_utxo(&id).unwrap())
            .find(|utxo| !utxo.out.lock_ids().is_locked())
            .unwrap();
        input_spending(&utxo)
    }

    pub fn unlocked_input(&self, key: &TestKey) -> TransferableInput {
        self.unlocked_input_in(self.state.as_ref(), key)
    }
}
