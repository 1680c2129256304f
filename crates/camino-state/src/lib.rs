//! # camino-state
//!
//! Chain state of the Camino platform chain.
//!
//! This crate provides:
//! - The [`ChainView`] (read) and [`Chain`] (write) contracts
//! - [`State`]: the durable state on top of a [`camino_storage::Storage`]
//! - [`Diff`]: a copy-on-write overlay over any [`ChainView`], used for
//!   speculative execution and for the commit / abort outcomes of proposal blocks
//! - Balance aggregation and validator queries
//!
//! ## Architecture
//!
//! Executors never touch [`State`] directly. They build a [`Diff`] over the
//! last accepted state, mutate it, and on acceptance [`Diff::apply`] replays
//! the recorded mutations onto the durable state, which then commits them in
//! one storage batch.

pub mod balance;
mod diff;
mod error;
pub mod genesis;
mod keys;
pub mod queries;
mod state;

pub use balance::{get_balance, Balance};
pub use diff::{Diff, Mutation};
pub use error::{OptionalExt, StateError, StateResult};
pub use genesis::Genesis;
pub use state::{State, WeightDiff};

use camino_types::{
    AddressState, Deposit, DepositOffer, Id, NodeId, OutputOwners, ProposalState, ShortId, Staker,
    Tx, Utxo, UtxoId,
};

/// Read access to chain state.
pub trait ChainView: Send + Sync {
    /// Height of the last accepted block this view builds on.
    fn height(&self) -> u64;

    /// Current chain time (unix seconds).
    fn timestamp(&self) -> u64;

    /// Total supply of the fee asset.
    fn current_supply(&self) -> u64;

    /// Network base transaction fee.
    fn base_fee(&self) -> u64;

    fn get_utxo(&self, utxo_id: &UtxoId) -> StateResult<Utxo>;

    /// UTXO IDs owned by `address`, ascending, strictly after `start_after`.
    fn utxo_ids(
        &self,
        address: &ShortId,
        start_after: Option<UtxoId>,
        limit: usize,
    ) -> StateResult<Vec<UtxoId>>;

    /// UTXO IDs holding a deposit or bond lock by `lock_tx_id`, ascending.
    fn locked_utxo_ids(&self, lock_tx_id: &Id) -> StateResult<Vec<UtxoId>>;

    fn get_current_staker(&self, subnet_id: &Id, node_id: &NodeId) -> StateResult<Staker>;
    fn get_pending_staker(&self, subnet_id: &Id, node_id: &NodeId) -> StateResult<Staker>;
    fn get_deferred_staker(&self, subnet_id: &Id, node_id: &NodeId) -> StateResult<Staker>;

    /// Current stakers of all subnets ordered by end time, then tx ID.
    fn current_stakers(&self) -> StateResult<Vec<Staker>>;
    /// Pending stakers of all subnets ordered by start time, then tx ID.
    fn pending_stakers(&self) -> StateResult<Vec<Staker>>;
    /// Deferred stakers of all subnets ordered by end time, then tx ID.
    fn deferred_stakers(&self) -> StateResult<Vec<Staker>>;

    fn get_subnet_owner(&self, subnet_id: &Id) -> StateResult<OutputOwners>;

    /// Subnet validating `chain_id`.
    fn get_chain_subnet(&self, chain_id: &Id) -> StateResult<Id>;

    fn get_deposit_offer(&self, offer_id: &Id) -> StateResult<DepositOffer>;
    fn deposit_offers(&self) -> StateResult<Vec<DepositOffer>>;

    fn get_deposit(&self, deposit_tx_id: &Id) -> StateResult<Deposit>;

    /// `(end time, deposit tx ID)` of every active deposit, ascending.
    fn deposit_unlock_schedule(&self) -> StateResult<Vec<(u64, Id)>>;

    fn get_proposal(&self, proposal_id: &Id) -> StateResult<ProposalState>;

    /// `(end time, proposal ID)` of every active proposal, ascending.
    fn proposal_expiry_schedule(&self) -> StateResult<Vec<(u64, Id)>>;

    /// Proposals that can finish early, ascending.
    fn proposal_ids_to_finish(&self) -> StateResult<Vec<Id>>;

    /// Flags of `address`; empty if never set.
    fn address_state(&self, address: &ShortId) -> StateResult<AddressState>;

    /// Consortium member that registered `node_id`.
    fn node_owner(&self, node_id: &NodeId) -> StateResult<Option<ShortId>>;

    /// Node registered by `member`.
    fn member_node(&self, member: &ShortId) -> StateResult<Option<NodeId>>;

    /// Rewards claimable by the owner set with this owner ID.
    fn claimable(&self, owner_id: &Id) -> StateResult<u64>;

    fn get_tx(&self, tx_id: &Id) -> StateResult<Tx>;

    /// Earliest deposit unlock time.
    fn next_to_unlock_deposit_time(&self) -> StateResult<u64> {
        self.deposit_unlock_schedule()?
            .first()
            .map(|(time, _)| *time)
            .ok_or(StateError::NothingScheduled("deposit unlock"))
    }

    /// Deposits ending at or before `time`, in end time order.
    fn deposits_unlocking_by(&self, time: u64) -> StateResult<Vec<Id>> {
        Ok(self
            .deposit_unlock_schedule()?
            .into_iter()
            .take_while(|(end, _)| *end <= time)
            .map(|(_, id)| id)
            .collect())
    }

    /// Earliest proposal expiration time.
    fn next_proposal_expiration_time(&self) -> StateResult<u64> {
        self.proposal_expiry_schedule()?
            .first()
            .map(|(time, _)| *time)
            .ok_or(StateError::NothingScheduled("proposal expiration"))
    }

    /// Active proposals ending at or before `time`, ascending by ID.
    fn proposals_expired_by(&self, time: u64) -> StateResult<Vec<Id>> {
        let mut ids: Vec<Id> = self
            .proposal_expiry_schedule()?
            .into_iter()
            .take_while(|(end, _)| *end <= time)
            .map(|(_, id)| id)
            .collect();
        ids.sort();
        Ok(ids)
    }
}

/// Write access to chain state.
///
/// [`State`] buffers writes until it is committed; a [`Diff`] records them
/// until it is applied. Neither touches its parent or storage before that.
pub trait Chain: ChainView {
    fn set_timestamp(&self, time: u64) -> StateResult<()>;
    fn set_current_supply(&self, supply: u64) -> StateResult<()>;
    fn set_base_fee(&self, fee: u64) -> StateResult<()>;

    /// Insert or replace a UTXO.
    fn add_utxo(&self, utxo: Utxo) -> StateResult<()>;
    /// Remove a UTXO; fails with [`StateError::UtxoNotFound`] if absent.
    fn delete_utxo(&self, utxo_id: &UtxoId) -> StateResult<()>;

    fn put_current_staker(&self, staker: Staker) -> StateResult<()>;
    fn delete_current_staker(&self, staker: &Staker) -> StateResult<()>;
    fn put_pending_staker(&self, staker: Staker) -> StateResult<()>;
    fn delete_pending_staker(&self, staker: &Staker) -> StateResult<()>;
    fn put_deferred_staker(&self, staker: Staker) -> StateResult<()>;
    fn delete_deferred_staker(&self, staker: &Staker) -> StateResult<()>;

    fn add_subnet(&self, subnet_id: Id, owner: OutputOwners) -> StateResult<()>;
    fn add_chain(&self, chain_id: Id, subnet_id: Id) -> StateResult<()>;

    fn set_deposit_offer(&self, offer: DepositOffer) -> StateResult<()>;

    fn add_deposit(&self, deposit_tx_id: Id, deposit: Deposit) -> StateResult<()>;
    fn remove_deposit(&self, deposit_tx_id: &Id) -> StateResult<()>;

    fn add_proposal(&self, proposal_id: Id, proposal: ProposalState) -> StateResult<()>;
    fn modify_proposal(&self, proposal_id: Id, proposal: ProposalState) -> StateResult<()>;
    fn remove_proposal(&self, proposal_id: &Id) -> StateResult<()>;
    fn add_proposal_id_to_finish(&self, proposal_id: Id) -> StateResult<()>;
    fn remove_proposal_id_to_finish(&self, proposal_id: &Id) -> StateResult<()>;

    fn set_address_state(&self, address: ShortId, state: AddressState) -> StateResult<()>;

    /// Link `node_id` and `member` in both directions.
    fn set_node_owner(&self, node_id: NodeId, member: ShortId) -> StateResult<()>;
    /// Remove both directions of the link of `node_id`.
    fn remove_node_owner(&self, node_id: &NodeId) -> StateResult<()>;

    fn set_claimable(&self, owner_id: Id, amount: u64) -> StateResult<()>;

    fn add_tx(&self, tx: Tx) -> StateResult<()>;
}
