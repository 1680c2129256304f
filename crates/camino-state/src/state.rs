//! Durable chain state.
//!
//! [`State`] reads through a write buffer into the underlying storage. Writes
//! are buffered until [`State::commit`], which flushes them together with the
//! per-height validator weight diffs in one atomic batch.

use crate::keys;
use crate::{Chain, ChainView, StateError, StateResult};
use camino_storage::{ColumnFamily, Storage, WriteBatch};
use camino_types::codec;
use camino_types::{
    AddressState, Deposit, DepositOffer, Id, NodeId, OutputOwners, ProposalState, ShortId, Staker,
    Tx, Utxo, UtxoId,
};
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Change of one validator's weight at one height.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeightDiff {
    pub decrease: bool,
    pub amount: u64,
}

#[derive(Debug, Clone, Copy, Default)]
struct Metadata {
    timestamp: u64,
    current_supply: u64,
    base_fee: u64,
    height: u64,
}

#[derive(Default)]
struct PendingWrites {
    writes: BTreeMap<(ColumnFamily, Vec<u8>), Option<Vec<u8>>>,
    weight_changes: BTreeMap<(Id, NodeId), i128>,
}

/// Durable chain state backed by a [`Storage`].
pub struct State {
    storage: Arc<dyn Storage>,
    pending: RwLock<PendingWrites>,
    metadata: RwLock<Metadata>,
}

impl State {
    /// Open the state stored in `storage`; an empty storage yields an empty state.
    pub fn open(storage: Arc<dyn Storage>) -> StateResult<Self> {
        let metadata = Self::load_metadata(storage.as_ref())?;
        info!(
            height = metadata.height,
            timestamp = metadata.timestamp,
            supply = metadata.current_supply,
            "Chain state opened"
        );
        Ok(Self {
            storage,
            pending: RwLock::new(PendingWrites::default()),
            metadata: RwLock::new(metadata),
        })
    }

    fn load_metadata(storage: &dyn Storage) -> StateResult<Metadata> {
        let read = |key: &[u8]| -> StateResult<u64> {
            match storage.get(ColumnFamily::Metadata, key)? {
                Some(bytes) => keys::u64_value(&bytes),
                None => Ok(0),
            }
        };
        Ok(Metadata {
            timestamp: read(keys::TIMESTAMP)?,
            current_supply: read(keys::CURRENT_SUPPLY)?,
            base_fee: read(keys::BASE_FEE)?,
            height: read(keys::HEIGHT)?,
        })
    }

    /// Height of the last committed block.
    pub fn height(&self) -> u64 {
        self.metadata.read().height
    }

    /// True if there are buffered writes.
    pub fn has_pending_writes(&self) -> bool {
        let pending = self.pending.read();
        !pending.writes.is_empty() || !pending.weight_changes.is_empty()
    }

    /// Atomically persist buffered writes as block `height`.
    #[instrument(skip(self))]
    pub fn commit(&self, height: u64) -> StateResult<()> {
        let mut pending = self.pending.write();
        let mut metadata = self.metadata.write();

        let mut batch = WriteBatch::new();
        for ((cf, key), value) in &pending.writes {
            match value {
                Some(value) => batch.put(*cf, key.clone(), value.clone()),
                None => batch.delete(*cf, key.clone()),
            }
        }

        let mut weight_diffs = 0usize;
        for ((subnet_id, node_id), delta) in &pending.weight_changes {
            if *delta == 0 {
                continue;
            }
            let diff = WeightDiff {
                decrease: *delta < 0,
                amount: u64::try_from(delta.unsigned_abs())
                    .map_err(|_| StateError::Corruption("weight change overflow".to_string()))?,
            };
            batch.put(
                ColumnFamily::WeightDiffs,
                keys::weight_diff(height, subnet_id, node_id),
                codec::encode(&diff)?,
            );
            weight_diffs += 1;
        }

        batch.put_u64(ColumnFamily::Metadata, keys::HEIGHT, height);
        batch.put_u64(ColumnFamily::Metadata, keys::TIMESTAMP, metadata.timestamp);
        batch.put_u64(ColumnFamily::Metadata, keys::CURRENT_SUPPLY, metadata.current_supply);
        batch.put_u64(ColumnFamily::Metadata, keys::BASE_FEE, metadata.base_fee);

        let writes = batch.len();
        self.storage.write_batch(batch)?;
        metadata.height = height;
        *pending = PendingWrites::default();

        debug!(height, writes, weight_diffs, "Committed chain state");
        Ok(())
    }

    /// Drop buffered writes.
    pub fn discard(&self) -> StateResult<()> {
        let mut pending = self.pending.write();
        let mut metadata = self.metadata.write();
        *pending = PendingWrites::default();
        *metadata = Self::load_metadata(self.storage.as_ref())?;
        Ok(())
    }

    /// Weights of current validators of `subnet_id`.
    pub fn current_validator_weights(&self, subnet_id: &Id) -> StateResult<BTreeMap<NodeId, u64>> {
        Ok(self
            .current_stakers()?
            .into_iter()
            .filter(|s| s.subnet_id == *subnet_id)
            .map(|s| (s.node_id, s.weight))
            .collect())
    }

    /// Weights of the validators of `subnet_id` as of block `height`,
    /// rebuilt by reverting the weight diffs of later blocks.
    #[instrument(skip(self), fields(subnet = %subnet_id))]
    pub fn validator_weights_at(
        &self,
        subnet_id: &Id,
        height: u64,
    ) -> StateResult<BTreeMap<NodeId, u64>> {
        let last = self.height();
        if height > last {
            return Err(StateError::HeightUnavailable {
                requested: height,
                last,
            });
        }
        let mut weights = self.current_validator_weights(subnet_id)?;
        for h in (height + 1..=last).rev() {
            let prefix = keys::weight_diff_prefix(h, subnet_id);
            for (key, value) in self.storage.prefix_iter(ColumnFamily::WeightDiffs, &prefix)? {
                let node_id = keys::weight_diff_node(&key)?;
                let diff: WeightDiff = codec::decode(&value)?;
                let weight = weights.entry(node_id).or_insert(0);
                if diff.decrease {
                    *weight = weight.saturating_add(diff.amount);
                } else {
                    *weight = weight.saturating_sub(diff.amount);
                }
                if *weight == 0 {
                    weights.remove(&node_id);
                }
            }
        }
        Ok(weights)
    }

    // ============ Raw access ============

    fn get_raw(&self, cf: ColumnFamily, key: &[u8]) -> StateResult<Option<Vec<u8>>> {
        if let Some(value) = self.pending.read().writes.get(&(cf, key.to_vec())) {
            return Ok(value.clone());
        }
        Ok(self.storage.get(cf, key)?)
    }

    fn put_raw(&self, cf: ColumnFamily, key: Vec<u8>, value: Vec<u8>) {
        self.pending.write().writes.insert((cf, key), Some(value));
    }

    fn delete_raw(&self, cf: ColumnFamily, key: Vec<u8>) {
        self.pending.write().writes.insert((cf, key), None);
    }

    /// Stored entries under `prefix` with buffered writes applied, ascending.
    fn scan(&self, cf: ColumnFamily, prefix: &[u8]) -> StateResult<Vec<(Vec<u8>, Vec<u8>)>> {
        let mut entries: BTreeMap<Vec<u8>, Vec<u8>> =
            self.storage.prefix_iter(cf, prefix)?.into_iter().collect();
        let pending = self.pending.read();
        for ((entry_cf, key), value) in pending.writes.range((cf, prefix.to_vec())..) {
            if *entry_cf != cf || !key.starts_with(prefix) {
                break;
            }
            match value {
                Some(value) => {
                    entries.insert(key.clone(), value.clone());
                }
                None => {
                    entries.remove(key);
                }
            }
        }
        Ok(entries.into_iter().collect())
    }

    fn get_value<T: DeserializeOwned>(&self, cf: ColumnFamily, key: &[u8]) -> StateResult<Option<T>> {
        match self.get_raw(cf, key)? {
            Some(bytes) => Ok(Some(codec::decode(&bytes)?)),
            None => Ok(None),
        }
    }

    fn put_value<T: Serialize>(&self, cf: ColumnFamily, key: Vec<u8>, value: &T) -> StateResult<()> {
        self.put_raw(cf, key, codec::encode(value)?);
        Ok(())
    }

    fn values<T: DeserializeOwned>(&self, cf: ColumnFamily) -> StateResult<Vec<T>> {
        self.scan(cf, &[])?
            .into_iter()
            .map(|(_, bytes)| Ok(codec::decode(&bytes)?))
            .collect()
    }

    fn get_staker(&self, cf: ColumnFamily, subnet_id: &Id, node_id: &NodeId) -> StateResult<Staker> {
        self.get_value(cf, &keys::staker(subnet_id, node_id))?
            .ok_or(StateError::StakerNotFound {
                subnet_id: *subnet_id,
                node_id: *node_id,
            })
    }

    fn track_weight(&self, staker: &Staker, delta: i128) {
        *self
            .pending
            .write()
            .weight_changes
            .entry((staker.subnet_id, staker.node_id))
            .or_insert(0) += delta;
    }

    fn index_utxo(&self, utxo: &Utxo, add: bool) {
        let mut index_keys = Vec::new();
        if let Some(owners) = utxo.out.owners() {
            for addr in &owners.addrs {
                index_keys.push((ColumnFamily::AddressUtxos, keys::address_utxo(addr, &utxo.utxo_id)));
            }
        }
        let ids = utxo.out.lock_ids();
        for lock_tx_id in [ids.deposit_tx_id, ids.bond_tx_id] {
            if !lock_tx_id.is_empty() {
                index_keys.push((ColumnFamily::LockedUtxos, keys::locked_utxo(&lock_tx_id, &utxo.utxo_id)));
            }
        }
        for (cf, key) in index_keys {
            if add {
                self.put_raw(cf, key, Vec::new());
            } else {
                self.delete_raw(cf, key);
            }
        }
    }
}

impl ChainView for State {
    fn height(&self) -> u64 {
        self.metadata.read().height
    }

    fn timestamp(&self) -> u64 {
        self.metadata.read().timestamp
    }

    fn current_supply(&self) -> u64 {
        self.metadata.read().current_supply
    }

    fn base_fee(&self) -> u64 {
        self.metadata.read().base_fee
    }

    fn get_utxo(&self, utxo_id: &UtxoId) -> StateResult<Utxo> {
        self.get_value(ColumnFamily::Utxo, &utxo_id.key())?
            .ok_or(StateError::UtxoNotFound(*utxo_id))
    }

    fn utxo_ids(
        &self,
        address: &ShortId,
        start_after: Option<UtxoId>,
        limit: usize,
    ) -> StateResult<Vec<UtxoId>> {
        let mut ids = Vec::new();
        for (key, _) in self.scan(ColumnFamily::AddressUtxos, address.as_bytes())? {
            let utxo_id = keys::utxo_suffix(&key)?;
            if start_after.map_or(true, |after| utxo_id > after) {
                ids.push(utxo_id);
                if ids.len() >= limit {
                    break;
                }
            }
        }
        Ok(ids)
    }

    fn locked_utxo_ids(&self, lock_tx_id: &Id) -> StateResult<Vec<UtxoId>> {
        self.scan(ColumnFamily::LockedUtxos, lock_tx_id.as_bytes())?
            .iter()
            .map(|(key, _)| keys::utxo_suffix(key))
            .collect()
    }

    fn get_current_staker(&self, subnet_id: &Id, node_id: &NodeId) -> StateResult<Staker> {
        self.get_staker(ColumnFamily::CurrentStakers, subnet_id, node_id)
    }

    fn get_pending_staker(&self, subnet_id: &Id, node_id: &NodeId) -> StateResult<Staker> {
        self.get_staker(ColumnFamily::PendingStakers, subnet_id, node_id)
    }

    fn get_deferred_staker(&self, subnet_id: &Id, node_id: &NodeId) -> StateResult<Staker> {
        self.get_staker(ColumnFamily::DeferredStakers, subnet_id, node_id)
    }

    fn current_stakers(&self) -> StateResult<Vec<Staker>> {
        let mut stakers: Vec<Staker> = self.values(ColumnFamily::CurrentStakers)?;
        stakers.sort_by_key(Staker::current_key);
        Ok(stakers)
    }

    fn pending_stakers(&self) -> StateResult<Vec<Staker>> {
        let mut stakers: Vec<Staker> = self.values(ColumnFamily::PendingStakers)?;
        stakers.sort_by_key(Staker::pending_key);
        Ok(stakers)
    }

    fn deferred_stakers(&self) -> StateResult<Vec<Staker>> {
        let mut stakers: Vec<Staker> = self.values(ColumnFamily::DeferredStakers)?;
        stakers.sort_by_key(Staker::current_key);
        Ok(stakers)
    }

    fn get_subnet_owner(&self, subnet_id: &Id) -> StateResult<OutputOwners> {
        self.get_value(ColumnFamily::Subnets, subnet_id.as_bytes())?
            .ok_or(StateError::SubnetNotFound(*subnet_id))
    }

    fn get_chain_subnet(&self, chain_id: &Id) -> StateResult<Id> {
        match self.get_raw(ColumnFamily::Chains, chain_id.as_bytes())? {
            Some(bytes) => Ok(Id::from_slice(&bytes)?),
            None => Err(StateError::ChainNotFound(*chain_id)),
        }
    }

    fn get_deposit_offer(&self, offer_id: &Id) -> StateResult<DepositOffer> {
        self.get_value(ColumnFamily::DepositOffers, offer_id.as_bytes())?
            .ok_or(StateError::DepositOfferNotFound(*offer_id))
    }

    fn deposit_offers(&self) -> StateResult<Vec<DepositOffer>> {
        self.values(ColumnFamily::DepositOffers)
    }

    fn get_deposit(&self, deposit_tx_id: &Id) -> StateResult<Deposit> {
        self.get_value(ColumnFamily::Deposits, deposit_tx_id.as_bytes())?
            .ok_or(StateError::DepositNotFound(*deposit_tx_id))
    }

    fn deposit_unlock_schedule(&self) -> StateResult<Vec<(u64, Id)>> {
        self.scan(ColumnFamily::DepositUnlockIndex, &[])?
            .iter()
            .map(|(key, _)| keys::parse_time_index(key))
            .collect()
    }

    fn get_proposal(&self, proposal_id: &Id) -> StateResult<ProposalState> {
        self.get_value(ColumnFamily::Proposals, proposal_id.as_bytes())?
            .ok_or(StateError::ProposalNotFound(*proposal_id))
    }

    fn proposal_expiry_schedule(&self) -> StateResult<Vec<(u64, Id)>> {
        self.scan(ColumnFamily::ProposalExpiryIndex, &[])?
            .iter()
            .map(|(key, _)| keys::parse_time_index(key))
            .collect()
    }

    fn proposal_ids_to_finish(&self) -> StateResult<Vec<Id>> {
        self.scan(ColumnFamily::ProposalsToFinish, &[])?
            .iter()
            .map(|(key, _)| Ok(Id::from_slice(key)?))
            .collect()
    }

    fn address_state(&self, address: &ShortId) -> StateResult<AddressState> {
        match self.get_raw(ColumnFamily::AddressStates, address.as_bytes())? {
            Some(bytes) => Ok(AddressState(keys::u64_value(&bytes)?)),
            None => Ok(AddressState::EMPTY),
        }
    }

    fn node_owner(&self, node_id: &NodeId) -> StateResult<Option<ShortId>> {
        self.get_raw(ColumnFamily::NodeOwners, node_id.as_bytes())?
            .map(|bytes| keys::short_id(&bytes))
            .transpose()
    }

    fn member_node(&self, member: &ShortId) -> StateResult<Option<NodeId>> {
        self.get_raw(ColumnFamily::MemberNodes, member.as_bytes())?
            .map(|bytes| keys::node_id(&bytes))
            .transpose()
    }

    fn claimable(&self, owner_id: &Id) -> StateResult<u64> {
        match self.get_raw(ColumnFamily::Claimables, owner_id.as_bytes())? {
            Some(bytes) => keys::u64_value(&bytes),
            None => Ok(0),
        }
    }

    fn get_tx(&self, tx_id: &Id) -> StateResult<Tx> {
        self.get_value(ColumnFamily::Txs, tx_id.as_bytes())?
            .ok_or(StateError::TxNotFound(*tx_id))
    }
}

impl Chain for State {
    fn set_timestamp(&self, time: u64) -> StateResult<()> {
        self.metadata.write().timestamp = time;
        Ok(())
    }

    fn set_current_supply(&self, supply: u64) -> StateResult<()> {
        self.metadata.write().current_supply = supply;
        Ok(())
    }

    fn set_base_fee(&self, fee: u64) -> StateResult<()> {
        self.metadata.write().base_fee = fee;
        Ok(())
    }

    fn add_utxo(&self, utxo: Utxo) -> StateResult<()> {
        if let Some(existing) = self.get_value::<Utxo>(ColumnFamily::Utxo, &utxo.utxo_id.key())? {
            self.index_utxo(&existing, false);
        }
        self.index_utxo(&utxo, true);
        self.put_value(ColumnFamily::Utxo, utxo.utxo_id.key().to_vec(), &utxo)
    }

    fn delete_utxo(&self, utxo_id: &UtxoId) -> StateResult<()> {
        let existing = self.get_utxo(utxo_id)?;
        self.index_utxo(&existing, false);
        self.delete_raw(ColumnFamily::Utxo, utxo_id.key().to_vec());
        Ok(())
    }

    fn put_current_staker(&self, staker: Staker) -> StateResult<()> {
        self.track_weight(&staker, i128::from(staker.weight));
        self.put_value(
            ColumnFamily::CurrentStakers,
            keys::staker(&staker.subnet_id, &staker.node_id),
            &staker,
        )
    }

    fn delete_current_staker(&self, staker: &Staker) -> StateResult<()> {
        self.track_weight(staker, -i128::from(staker.weight));
        self.delete_raw(
            ColumnFamily::CurrentStakers,
            keys::staker(&staker.subnet_id, &staker.node_id),
        );
        Ok(())
    }

    fn put_pending_staker(&self, staker: Staker) -> StateResult<()> {
        self.put_value(
            ColumnFamily::PendingStakers,
            keys::staker(&staker.subnet_id, &staker.node_id),
            &staker,
        )
    }

    fn delete_pending_staker(&self, staker: &Staker) -> StateResult<()> {
        self.delete_raw(
            ColumnFamily::PendingStakers,
            keys::staker(&staker.subnet_id, &staker.node_id),
        );
        Ok(())
    }

    fn put_deferred_staker(&self, staker: Staker) -> StateResult<()> {
        self.put_value(
            ColumnFamily::DeferredStakers,
            keys::staker(&staker.subnet_id, &staker.node_id),
            &staker,
        )
    }

    fn delete_deferred_staker(&self, staker: &Staker) -> StateResult<()> {
        self.delete_raw(
            ColumnFamily::DeferredStakers,
            keys::staker(&staker.subnet_id, &staker.node_id),
        );
        Ok(())
    }

    fn add_subnet(&self, subnet_id: Id, owner: OutputOwners) -> StateResult<()> {
        self.put_value(ColumnFamily::Subnets, subnet_id.as_bytes().to_vec(), &owner)
    }

    fn add_chain(&self, chain_id: Id, subnet_id: Id) -> StateResult<()> {
        self.put_raw(
            ColumnFamily::Chains,
            chain_id.as_bytes().to_vec(),
            subnet_id.as_bytes().to_vec(),
        );
        Ok(())
    }

    fn set_deposit_offer(&self, offer: DepositOffer) -> StateResult<()> {
        self.put_value(ColumnFamily::DepositOffers, offer.id.as_bytes().to_vec(), &offer)
    }

    fn add_deposit(&self, deposit_tx_id: Id, deposit: Deposit) -> StateResult<()> {
        self.put_raw(
            ColumnFamily::DepositUnlockIndex,
            keys::time_index(deposit.end_time(), &deposit_tx_id),
            Vec::new(),
        );
        self.put_value(ColumnFamily::Deposits, deposit_tx_id.as_bytes().to_vec(), &deposit)
    }

    fn remove_deposit(&self, deposit_tx_id: &Id) -> StateResult<()> {
        let deposit = self.get_deposit(deposit_tx_id)?;
        self.delete_raw(
            ColumnFamily::DepositUnlockIndex,
            keys::time_index(deposit.end_time(), deposit_tx_id),
        );
        self.delete_raw(ColumnFamily::Deposits, deposit_tx_id.as_bytes().to_vec());
        Ok(())
    }

    fn add_proposal(&self, proposal_id: Id, proposal: ProposalState) -> StateResult<()> {
        self.put_raw(
            ColumnFamily::ProposalExpiryIndex,
            keys::time_index(proposal.end, &proposal_id),
            Vec::new(),
        );
        self.put_value(ColumnFamily::Proposals, proposal_id.as_bytes().to_vec(), &proposal)
    }

    fn modify_proposal(&self, proposal_id: Id, proposal: ProposalState) -> StateResult<()> {
        let existing = self.get_proposal(&proposal_id)?;
        if existing.end != proposal.end {
            return Err(StateError::InvalidTransition(format!(
                "proposal {proposal_id} end time changed"
            )));
        }
        self.put_value(ColumnFamily::Proposals, proposal_id.as_bytes().to_vec(), &proposal)
    }

    fn remove_proposal(&self, proposal_id: &Id) -> StateResult<()> {
        let existing = self.get_proposal(proposal_id)?;
        self.delete_raw(
            ColumnFamily::ProposalExpiryIndex,
            keys::time_index(existing.end, proposal_id),
        );
        self.delete_raw(ColumnFamily::Proposals, proposal_id.as_bytes().to_vec());
        self.delete_raw(ColumnFamily::ProposalsToFinish, proposal_id.as_bytes().to_vec());
        Ok(())
    }

    fn add_proposal_id_to_finish(&self, proposal_id: Id) -> StateResult<()> {
        self.put_raw(ColumnFamily::ProposalsToFinish, proposal_id.as_bytes().to_vec(), Vec::new());
        Ok(())
    }

    fn remove_proposal_id_to_finish(&self, proposal_id: &Id) -> StateResult<()> {
        self.delete_raw(ColumnFamily::ProposalsToFinish, proposal_id.as_bytes().to_vec());
        Ok(())
    }

    fn set_address_state(&self, address: ShortId, state: AddressState) -> StateResult<()> {
        let key = address.as_bytes().to_vec();
        if state.is_empty() {
            self.delete_raw(ColumnFamily::AddressStates, key);
        } else {
            self.put_raw(ColumnFamily::AddressStates, key, state.0.to_be_bytes().to_vec());
        }
        Ok(())
    }

    fn set_node_owner(&self, node_id: NodeId, member: ShortId) -> StateResult<()> {
        self.put_raw(
            ColumnFamily::NodeOwners,
            node_id.as_bytes().to_vec(),
            member.as_bytes().to_vec(),
        );
        self.put_raw(
            ColumnFamily::MemberNodes,
            member.as_bytes().to_vec(),
            node_id.as_bytes().to_vec(),
        );
        Ok(())
    }

    fn remove_node_owner(&self, node_id: &NodeId) -> StateResult<()> {
        if let Some(member) = self.node_owner(node_id)? {
            self.delete_raw(ColumnFamily::MemberNodes, member.as_bytes().to_vec());
        }
        self.delete_raw(ColumnFamily::NodeOwners, node_id.as_bytes().to_vec());
        Ok(())
    }

    fn set_claimable(&self, owner_id: Id, amount: u64) -> StateResult<()> {
        let key = owner_id.as_bytes().to_vec();
        if amount == 0 {
            self.delete_raw(ColumnFamily::Claimables, key);
        } else {
            self.put_raw(ColumnFamily::Claimables, key, amount.to_be_bytes().to_vec());
        }
        Ok(())
    }

    fn add_tx(&self, tx: Tx) -> StateResult<()> {
        let tx_id = tx.id()?;
        self.put_value(ColumnFamily::Txs, tx_id.as_bytes().to_vec(), &tx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino_storage::{Database, MemoryStorage};
    use camino_types::{LockIds, LockState, Output, PRIMARY_NETWORK_ID};
    use tempfile::TempDir;

    fn memory_state() -> State {
        State::open(Arc::new(MemoryStorage::new())).unwrap()
    }

    fn addr(b: u8) -> ShortId {
        ShortId([b; 20])
    }

    fn utxo(tx: u8, index: u32, owner: u8, amount: u64) -> Utxo {
        Utxo {
            utxo_id: UtxoId::new(Id([tx; 32]), index),
            asset_id: Id([0xAA; 32]),
            out: Output::transfer(amount, OutputOwners::single(addr(owner))),
        }
    }

    fn staker(node: u8, weight: u64) -> Staker {
        Staker {
            tx_id: Id([node; 32]),
            node_id: NodeId([node; 20]),
            subnet_id: PRIMARY_NETWORK_ID,
            weight,
            start_time: 0,
            end_time: 1_000,
            potential_reward: 0,
            reward_owner: OutputOwners::single(addr(node)),
        }
    }

    // ============ UTXO Tests ============

    #[test]
    fn test_add_get_delete_utxo() {
        let state = memory_state();
        let u = utxo(1, 0, 7, 100);
        state.add_utxo(u.clone()).unwrap();
        assert_eq!(state.get_utxo(&u.utxo_id).unwrap(), u);

        state.delete_utxo(&u.utxo_id).unwrap();
        let err = state.get_utxo(&u.utxo_id).unwrap_err();
        assert!(err.is_not_found());
        assert!(state.delete_utxo(&u.utxo_id).unwrap_err().is_not_found());
    }

    #[test]
    fn test_utxo_ids_pagination() {
        let state = memory_state();
        for i in 0..5 {
            state.add_utxo(utxo(1, i, 7, 10)).unwrap();
        }
        state.add_utxo(utxo(2, 0, 8, 10)).unwrap();
        state.commit(1).unwrap();

        let first = state.utxo_ids(&addr(7), None, 3).unwrap();
        assert_eq!(first.len(), 3);
        let rest = state.utxo_ids(&addr(7), first.last().copied(), 10).unwrap();
        assert_eq!(rest.len(), 2);
        assert!(first.last().unwrap() < rest.first().unwrap());
        assert_eq!(state.utxo_ids(&addr(8), None, 10).unwrap().len(), 1);
    }

    #[test]
    fn test_locked_utxo_index() {
        let state = memory_state();
        let deposit_tx = Id([5u8; 32]);
        let mut u = utxo(1, 0, 7, 10);
        u.out = u.out.lock(LockState::DEPOSITED).fix_lock_ids(deposit_tx);
        state.add_utxo(u.clone()).unwrap();

        assert_eq!(state.locked_utxo_ids(&deposit_tx).unwrap(), vec![u.utxo_id]);
        assert_eq!(u.out.lock_ids(), LockIds::new(deposit_tx, Id::EMPTY));

        state.delete_utxo(&u.utxo_id).unwrap();
        assert!(state.locked_utxo_ids(&deposit_tx).unwrap().is_empty());
    }

    // ============ Commit Tests ============

    #[test]
    fn test_commit_persists_and_discard_drops() {
        let storage = Arc::new(MemoryStorage::new());
        let state = State::open(storage.clone()).unwrap();
        state.set_timestamp(100).unwrap();
        state.add_utxo(utxo(1, 0, 7, 10)).unwrap();
        state.commit(1).unwrap();
        assert!(!state.has_pending_writes());

        state.add_utxo(utxo(2, 0, 7, 10)).unwrap();
        state.set_timestamp(200).unwrap();
        state.discard().unwrap();
        assert_eq!(state.timestamp(), 100);
        assert!(state.get_utxo(&UtxoId::new(Id([2u8; 32]), 0)).is_err());

        let reopened = State::open(storage).unwrap();
        assert_eq!(reopened.height(), 1);
        assert_eq!(reopened.timestamp(), 100);
        assert!(reopened.get_utxo(&UtxoId::new(Id([1u8; 32]), 0)).is_ok());
    }

    #[test]
    fn test_rocksdb_backed_state() {
        let temp_dir = TempDir::new().unwrap();
        {
            let db = Database::open(temp_dir.path()).unwrap();
            let state = State::open(Arc::new(db)).unwrap();
            state.set_current_supply(1_000).unwrap();
            state.put_current_staker(staker(1, 50)).unwrap();
            state.commit(3).unwrap();
        }
        let db = Database::open(temp_dir.path()).unwrap();
        let state = State::open(Arc::new(db)).unwrap();
        assert_eq!(state.height(), 3);
        assert_eq!(state.current_supply(), 1_000);
        assert_eq!(state.current_stakers().unwrap().len(), 1);
    }

    // ============ Schedule Tests ============

    #[test]
    fn test_deposit_schedule() {
        let state = memory_state();
        assert!(state.next_to_unlock_deposit_time().unwrap_err().is_not_found());

        let deposit = |start, duration| Deposit {
            offer_id: Id([1u8; 32]),
            start,
            duration,
            amount: 10,
            reward_owner: OutputOwners::single(addr(1)),
        };
        state.add_deposit(Id([2u8; 32]), deposit(0, 50)).unwrap();
        state.add_deposit(Id([3u8; 32]), deposit(10, 20)).unwrap();
        assert_eq!(state.next_to_unlock_deposit_time().unwrap(), 30);
        assert_eq!(state.deposits_unlocking_by(30).unwrap(), vec![Id([3u8; 32])]);

        state.remove_deposit(&Id([3u8; 32])).unwrap();
        assert_eq!(state.next_to_unlock_deposit_time().unwrap(), 50);
    }

    // ============ Weight Diff Tests ============

    #[test]
    fn test_validator_weights_at() {
        let state = memory_state();
        state.put_current_staker(staker(1, 100)).unwrap();
        state.commit(1).unwrap();

        state.put_current_staker(staker(2, 40)).unwrap();
        state.commit(2).unwrap();

        state.delete_current_staker(&staker(1, 100)).unwrap();
        state.commit(3).unwrap();

        let at = |h| state.validator_weights_at(&PRIMARY_NETWORK_ID, h).unwrap();
        assert_eq!(at(3).len(), 1);
        assert_eq!(at(2).get(&NodeId([1u8; 20])), Some(&100));
        assert_eq!(at(2).get(&NodeId([2u8; 20])), Some(&40));
        assert_eq!(at(1).len(), 1);
        assert!(state.validator_weights_at(&PRIMARY_NETWORK_ID, 4).is_err());
    }

    #[test]
    fn test_node_owner_links() {
        let state = memory_state();
        state.set_node_owner(NodeId([1u8; 20]), addr(9)).unwrap();
        assert_eq!(state.member_node(&addr(9)).unwrap(), Some(NodeId([1u8; 20])));
        state.remove_node_owner(&NodeId([1u8; 20])).unwrap();
        assert_eq!(state.member_node(&addr(9)).unwrap(), None);
        assert_eq!(state.node_owner(&NodeId([1u8; 20])).unwrap(), None);
    }
}
