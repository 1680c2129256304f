//! Copy-on-write state overlay.
//!
//! A [`Diff`] answers reads from its own modifications first and falls
//! through to its parent on a miss. Every write is also appended to a
//! mutation log, and [`Diff::apply`] replays that log onto a destination in
//! recording order. Two diffs built over the same parent never observe each
//! other, which is what the commit and abort outcomes of a proposal block
//! rely on.

use crate::{Chain, ChainView, StateError, StateResult};
use camino_types::{
    AddressState, Deposit, DepositOffer, Id, NodeId, OutputOwners, ProposalState, ShortId, Staker,
    Tx, Utxo, UtxoId,
};
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{debug, instrument};

type StakerKey = (Id, NodeId);

fn staker_key(staker: &Staker) -> StakerKey {
    (staker.subnet_id, staker.node_id)
}

/// One recorded write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    SetTimestamp(u64),
    SetCurrentSupply(u64),
    SetBaseFee(u64),
    AddUtxo(Utxo),
    DeleteUtxo(UtxoId),
    PutCurrentStaker(Staker),
    DeleteCurrentStaker(Staker),
    PutPendingStaker(Staker),
    DeletePendingStaker(Staker),
    PutDeferredStaker(Staker),
    DeleteDeferredStaker(Staker),
    AddSubnet(Id, OutputOwners),
    AddChain { chain_id: Id, subnet_id: Id },
    SetDepositOffer(DepositOffer),
    AddDeposit(Id, Deposit),
    RemoveDeposit(Id),
    AddProposal(Id, ProposalState),
    ModifyProposal(Id, ProposalState),
    RemoveProposal(Id),
    AddProposalToFinish(Id),
    RemoveProposalToFinish(Id),
    SetAddressState(ShortId, AddressState),
    SetNodeOwner(NodeId, ShortId),
    RemoveNodeOwner(NodeId),
    SetClaimable(Id, u64),
    AddTx(Box<Tx>),
}

impl Mutation {
    fn apply_to(&self, dest: &dyn Chain) -> StateResult<()> {
        match self {
            Mutation::SetTimestamp(time) => dest.set_timestamp(*time),
            Mutation::SetCurrentSupply(supply) => dest.set_current_supply(*supply),
            Mutation::SetBaseFee(fee) => dest.set_base_fee(*fee),
            Mutation::AddUtxo(utxo) => dest.add_utxo(utxo.clone()),
            Mutation::DeleteUtxo(utxo_id) => dest.delete_utxo(utxo_id),
            Mutation::PutCurrentStaker(staker) => dest.put_current_staker(staker.clone()),
            Mutation::DeleteCurrentStaker(staker) => dest.delete_current_staker(staker),
            Mutation::PutPendingStaker(staker) => dest.put_pending_staker(staker.clone()),
            Mutation::DeletePendingStaker(staker) => dest.delete_pending_staker(staker),
            Mutation::PutDeferredStaker(staker) => dest.put_deferred_staker(staker.clone()),
            Mutation::DeleteDeferredStaker(staker) => dest.delete_deferred_staker(staker),
            Mutation::AddSubnet(subnet_id, owner) => dest.add_subnet(*subnet_id, owner.clone()),
            Mutation::AddChain {
                chain_id,
                subnet_id,
            } => dest.add_chain(*chain_id, *subnet_id),
            Mutation::SetDepositOffer(offer) => dest.set_deposit_offer(offer.clone()),
            Mutation::AddDeposit(id, deposit) => dest.add_deposit(*id, deposit.clone()),
            Mutation::RemoveDeposit(id) => dest.remove_deposit(id),
            Mutation::AddProposal(id, proposal) => dest.add_proposal(*id, proposal.clone()),
            Mutation::ModifyProposal(id, proposal) => dest.modify_proposal(*id, proposal.clone()),
            Mutation::RemoveProposal(id) => dest.remove_proposal(id),
            Mutation::AddProposalToFinish(id) => dest.add_proposal_id_to_finish(*id),
            Mutation::RemoveProposalToFinish(id) => dest.remove_proposal_id_to_finish(id),
            Mutation::SetAddressState(address, state) => dest.set_address_state(*address, *state),
            Mutation::SetNodeOwner(node_id, member) => dest.set_node_owner(*node_id, *member),
            Mutation::RemoveNodeOwner(node_id) => dest.remove_node_owner(node_id),
            Mutation::SetClaimable(owner_id, amount) => dest.set_claimable(*owner_id, *amount),
            Mutation::AddTx(tx) => dest.add_tx(tx.as_ref().clone()),
        }
    }
}

#[derive(Default)]
struct Overlay {
    timestamp: Option<u64>,
    current_supply: Option<u64>,
    base_fee: Option<u64>,
    utxos: HashMap<UtxoId, Option<Utxo>>,
    current: HashMap<StakerKey, Option<Staker>>,
    pending: HashMap<StakerKey, Option<Staker>>,
    deferred: HashMap<StakerKey, Option<Staker>>,
    subnets: HashMap<Id, OutputOwners>,
    chains: HashMap<Id, Id>,
    offers: HashMap<Id, DepositOffer>,
    deposits: HashMap<Id, Option<Deposit>>,
    proposals: HashMap<Id, Option<ProposalState>>,
    to_finish: HashMap<Id, bool>,
    address_states: HashMap<ShortId, AddressState>,
    node_owners: HashMap<NodeId, Option<ShortId>>,
    member_nodes: HashMap<ShortId, Option<NodeId>>,
    claimables: HashMap<Id, u64>,
    txs: HashMap<Id, Tx>,
    log: Vec<Mutation>,
}

/// Versioned state: a read-through overlay over a parent view.
pub struct Diff {
    parent: Arc<dyn ChainView>,
    /// Parent height when the overlay was created.
    height: u64,
    overlay: RwLock<Overlay>,
}

impl Diff {
    /// Empty overlay over `parent`.
    pub fn new(parent: Arc<dyn ChainView>) -> Self {
        Self {
            height: parent.height(),
            parent,
            overlay: RwLock::new(Overlay::default()),
        }
    }

    pub fn parent(&self) -> &Arc<dyn ChainView> {
        &self.parent
    }

    /// Recorded mutations in recording order.
    pub fn mutations(&self) -> Vec<Mutation> {
        self.overlay.read().log.clone()
    }

    pub fn is_empty(&self) -> bool {
        self.overlay.read().log.is_empty()
    }

    /// Replay every recorded mutation onto `dest` in recording order.
    #[instrument(skip_all)]
    pub fn apply(&self, dest: &dyn Chain) -> StateResult<()> {
        let log = self.mutations();
        for mutation in &log {
            mutation.apply_to(dest)?;
        }
        debug!(mutations = log.len(), "Applied diff");
        Ok(())
    }

    fn record(&self, mutation: Mutation, update: impl FnOnce(&mut Overlay)) {
        let mut overlay = self.overlay.write();
        update(&mut overlay);
        overlay.log.push(mutation);
    }

    fn staker_from(
        &self,
        set: impl Fn(&Overlay) -> &HashMap<StakerKey, Option<Staker>>,
        subnet_id: &Id,
        node_id: &NodeId,
        parent: impl FnOnce() -> StateResult<Staker>,
    ) -> StateResult<Staker> {
        let found = set(&self.overlay.read()).get(&(*subnet_id, *node_id)).cloned();
        match found {
            Some(Some(staker)) => Ok(staker),
            Some(None) => Err(StateError::StakerNotFound {
                subnet_id: *subnet_id,
                node_id: *node_id,
            }),
            None => parent(),
        }
    }

    fn merge_stakers(
        parent: Vec<Staker>,
        modified: &HashMap<StakerKey, Option<Staker>>,
    ) -> Vec<Staker> {
        let mut stakers: Vec<Staker> = parent
            .into_iter()
            .filter(|s| !modified.contains_key(&staker_key(s)))
            .collect();
        stakers.extend(modified.values().flatten().cloned());
        stakers
    }
}

impl ChainView for Diff {
    fn height(&self) -> u64 {
        self.height
    }

    fn timestamp(&self) -> u64 {
        let overlay = self.overlay.read().timestamp;
        overlay.unwrap_or_else(|| self.parent.timestamp())
    }

    fn current_supply(&self) -> u64 {
        let overlay = self.overlay.read().current_supply;
        overlay.unwrap_or_else(|| self.parent.current_supply())
    }

    fn base_fee(&self) -> u64 {
        let overlay = self.overlay.read().base_fee;
        overlay.unwrap_or_else(|| self.parent.base_fee())
    }

    fn get_utxo(&self, utxo_id: &UtxoId) -> StateResult<Utxo> {
        let found = self.overlay.read().utxos.get(utxo_id).cloned();
        match found {
            Some(Some(utxo)) => Ok(utxo),
            Some(None) => Err(StateError::UtxoNotFound(*utxo_id)),
            None => self.parent.get_utxo(utxo_id),
        }
    }

    fn utxo_ids(
        &self,
        address: &ShortId,
        start_after: Option<UtxoId>,
        limit: usize,
    ) -> StateResult<Vec<UtxoId>> {
        let modified: HashMap<UtxoId, Option<Utxo>> = self.overlay.read().utxos.clone();
        // Every modified UTXO may drop out of the parent page.
        let page = limit.saturating_add(modified.len());
        let mut ids: BTreeSet<UtxoId> = self
            .parent
            .utxo_ids(address, start_after, page)?
            .into_iter()
            .filter(|id| !modified.contains_key(id))
            .collect();
        for (utxo_id, utxo) in &modified {
            let Some(utxo) = utxo else { continue };
            let owned = utxo.out.owners().map_or(false, |o| o.contains(address));
            if owned && start_after.map_or(true, |after| *utxo_id > after) {
                ids.insert(*utxo_id);
            }
        }
        Ok(ids.into_iter().take(limit).collect())
    }

    fn locked_utxo_ids(&self, lock_tx_id: &Id) -> StateResult<Vec<UtxoId>> {
        let modified: HashMap<UtxoId, Option<Utxo>> = self.overlay.read().utxos.clone();
        let mut ids: BTreeSet<UtxoId> = self
            .parent
            .locked_utxo_ids(lock_tx_id)?
            .into_iter()
            .filter(|id| !modified.contains_key(id))
            .collect();
        for (utxo_id, utxo) in &modified {
            let Some(utxo) = utxo else { continue };
            let lock_ids = utxo.out.lock_ids();
            if lock_ids.deposit_tx_id == *lock_tx_id || lock_ids.bond_tx_id == *lock_tx_id {
                ids.insert(*utxo_id);
            }
        }
        Ok(ids.into_iter().collect())
    }

    fn get_current_staker(&self, subnet_id: &Id, node_id: &NodeId) -> StateResult<Staker> {
        self.staker_from(|o| &o.current, subnet_id, node_id, || {
            self.parent.get_current_staker(subnet_id, node_id)
        })
    }

    fn get_pending_staker(&self, subnet_id: &Id, node_id: &NodeId) -> StateResult<Staker> {
        self.staker_from(|o| &o.pending, subnet_id, node_id, || {
            self.parent.get_pending_staker(subnet_id, node_id)
        })
    }

    fn get_deferred_staker(&self, subnet_id: &Id, node_id: &NodeId) -> StateResult<Staker> {
        self.staker_from(|o| &o.deferred, subnet_id, node_id, || {
            self.parent.get_deferred_staker(subnet_id, node_id)
        })
    }

    fn current_stakers(&self) -> StateResult<Vec<Staker>> {
        let parent = self.parent.current_stakers()?;
        let mut stakers = Self::merge_stakers(parent, &self.overlay.read().current);
        stakers.sort_by_key(Staker::current_key);
        Ok(stakers)
    }

    fn pending_stakers(&self) -> StateResult<Vec<Staker>> {
        let parent = self.parent.pending_stakers()?;
        let mut stakers = Self::merge_stakers(parent, &self.overlay.read().pending);
        stakers.sort_by_key(Staker::pending_key);
        Ok(stakers)
    }

    fn deferred_stakers(&self) -> StateResult<Vec<Staker>> {
        let parent = self.parent.deferred_stakers()?;
        let mut stakers = Self::merge_stakers(parent, &self.overlay.read().deferred);
        stakers.sort_by_key(Staker::current_key);
        Ok(stakers)
    }

    fn get_subnet_owner(&self, subnet_id: &Id) -> StateResult<OutputOwners> {
        let found = self.overlay.read().subnets.get(subnet_id).cloned();
        match found {
            Some(owner) => Ok(owner),
            None => self.parent.get_subnet_owner(subnet_id),
        }
    }

    fn get_chain_subnet(&self, chain_id: &Id) -> StateResult<Id> {
        let found = self.overlay.read().chains.get(chain_id).copied();
        match found {
            Some(subnet_id) => Ok(subnet_id),
            None => self.parent.get_chain_subnet(chain_id),
        }
    }

    fn get_deposit_offer(&self, offer_id: &Id) -> StateResult<DepositOffer> {
        let found = self.overlay.read().offers.get(offer_id).cloned();
        match found {
            Some(offer) => Ok(offer),
            None => self.parent.get_deposit_offer(offer_id),
        }
    }

    fn deposit_offers(&self) -> StateResult<Vec<DepositOffer>> {
        let mut offers: BTreeMap<Id, DepositOffer> = self
            .parent
            .deposit_offers()?
            .into_iter()
            .map(|offer| (offer.id, offer))
            .collect();
        for (id, offer) in &self.overlay.read().offers {
            offers.insert(*id, offer.clone());
        }
        Ok(offers.into_values().collect())
    }

    fn get_deposit(&self, deposit_tx_id: &Id) -> StateResult<Deposit> {
        let found = self.overlay.read().deposits.get(deposit_tx_id).cloned();
        match found {
            Some(Some(deposit)) => Ok(deposit),
            Some(None) => Err(StateError::DepositNotFound(*deposit_tx_id)),
            None => self.parent.get_deposit(deposit_tx_id),
        }
    }

    fn deposit_unlock_schedule(&self) -> StateResult<Vec<(u64, Id)>> {
        let parent = self.parent.deposit_unlock_schedule()?;
        let overlay = self.overlay.read();
        let mut schedule: BTreeSet<(u64, Id)> = parent
            .into_iter()
            .filter(|(_, id)| !overlay.deposits.contains_key(id))
            .collect();
        for (id, deposit) in &overlay.deposits {
            if let Some(deposit) = deposit {
                schedule.insert((deposit.end_time(), *id));
            }
        }
        Ok(schedule.into_iter().collect())
    }

    fn get_proposal(&self, proposal_id: &Id) -> StateResult<ProposalState> {
        let found = self.overlay.read().proposals.get(proposal_id).cloned();
        match found {
            Some(Some(proposal)) => Ok(proposal),
            Some(None) => Err(StateError::ProposalNotFound(*proposal_id)),
            None => self.parent.get_proposal(proposal_id),
        }
    }

    fn proposal_expiry_schedule(&self) -> StateResult<Vec<(u64, Id)>> {
        let parent = self.parent.proposal_expiry_schedule()?;
        let overlay = self.overlay.read();
        let mut schedule: BTreeSet<(u64, Id)> = parent
            .into_iter()
            .filter(|(_, id)| !overlay.proposals.contains_key(id))
            .collect();
        for (id, proposal) in &overlay.proposals {
            if let Some(proposal) = proposal {
                schedule.insert((proposal.end, *id));
            }
        }
        Ok(schedule.into_iter().collect())
    }

    fn proposal_ids_to_finish(&self) -> StateResult<Vec<Id>> {
        let mut ids: BTreeSet<Id> = self.parent.proposal_ids_to_finish()?.into_iter().collect();
        for (id, to_finish) in &self.overlay.read().to_finish {
            if *to_finish {
                ids.insert(*id);
            } else {
                ids.remove(id);
            }
        }
        Ok(ids.into_iter().collect())
    }

    fn address_state(&self, address: &ShortId) -> StateResult<AddressState> {
        let found = self.overlay.read().address_states.get(address).copied();
        match found {
            Some(state) => Ok(state),
            None => self.parent.address_state(address),
        }
    }

    fn node_owner(&self, node_id: &NodeId) -> StateResult<Option<ShortId>> {
        let found = self.overlay.read().node_owners.get(node_id).copied();
        match found {
            Some(owner) => Ok(owner),
            None => self.parent.node_owner(node_id),
        }
    }

    fn member_node(&self, member: &ShortId) -> StateResult<Option<NodeId>> {
        let found = self.overlay.read().member_nodes.get(member).copied();
        match found {
            Some(node) => Ok(node),
            None => self.parent.member_node(member),
        }
    }

    fn claimable(&self, owner_id: &Id) -> StateResult<u64> {
        let found = self.overlay.read().claimables.get(owner_id).copied();
        match found {
            Some(amount) => Ok(amount),
            None => self.parent.claimable(owner_id),
        }
    }

    fn get_tx(&self, tx_id: &Id) -> StateResult<Tx> {
        let found = self.overlay.read().txs.get(tx_id).cloned();
        match found {
            Some(tx) => Ok(tx),
            None => self.parent.get_tx(tx_id),
        }
    }
}

impl Chain for Diff {
    fn set_timestamp(&self, time: u64) -> StateResult<()> {
        self.record(Mutation::SetTimestamp(time), |o| o.timestamp = Some(time));
        Ok(())
    }

    fn set_current_supply(&self, supply: u64) -> StateResult<()> {
        self.record(Mutation::SetCurrentSupply(supply), |o| {
            o.current_supply = Some(supply)
        });
        Ok(())
    }

    fn set_base_fee(&self, fee: u64) -> StateResult<()> {
        self.record(Mutation::SetBaseFee(fee), |o| o.base_fee = Some(fee));
        Ok(())
    }

    fn add_utxo(&self, utxo: Utxo) -> StateResult<()> {
        let id = utxo.utxo_id;
        let stored = utxo.clone();
        self.record(Mutation::AddUtxo(utxo), |o| {
            o.utxos.insert(id, Some(stored));
        });
        Ok(())
    }

    fn delete_utxo(&self, utxo_id: &UtxoId) -> StateResult<()> {
        self.get_utxo(utxo_id)?;
        let id = *utxo_id;
        self.record(Mutation::DeleteUtxo(id), |o| {
            o.utxos.insert(id, None);
        });
        Ok(())
    }

    fn put_current_staker(&self, staker: Staker) -> StateResult<()> {
        let stored = staker.clone();
        self.record(Mutation::PutCurrentStaker(staker), |o| {
            o.current.insert(staker_key(&stored), Some(stored));
        });
        Ok(())
    }

    fn delete_current_staker(&self, staker: &Staker) -> StateResult<()> {
        self.record(Mutation::DeleteCurrentStaker(staker.clone()), |o| {
            o.current.insert(staker_key(staker), None);
        });
        Ok(())
    }

    fn put_pending_staker(&self, staker: Staker) -> StateResult<()> {
        let stored = staker.clone();
        self.record(Mutation::PutPendingStaker(staker), |o| {
            o.pending.insert(staker_key(&stored), Some(stored));
        });
        Ok(())
    }

    fn delete_pending_staker(&self, staker: &Staker) -> StateResult<()> {
        self.record(Mutation::DeletePendingStaker(staker.clone()), |o| {
            o.pending.insert(staker_key(staker), None);
        });
        Ok(())
    }

    fn put_deferred_staker(&self, staker: Staker) -> StateResult<()> {
        let stored = staker.clone();
        self.record(Mutation::PutDeferredStaker(staker), |o| {
            o.deferred.insert(staker_key(&stored), Some(stored));
        });
        Ok(())
    }

    fn delete_deferred_staker(&self, staker: &Staker) -> StateResult<()> {
        self.record(Mutation::DeleteDeferredStaker(staker.clone()), |o| {
            o.deferred.insert(staker_key(staker), None);
        });
        Ok(())
    }

    fn add_subnet(&self, subnet_id: Id, owner: OutputOwners) -> StateResult<()> {
        let stored = owner.clone();
        self.record(Mutation::AddSubnet(subnet_id, owner), |o| {
            o.subnets.insert(subnet_id, stored);
        });
        Ok(())
    }

    fn add_chain(&self, chain_id: Id, subnet_id: Id) -> StateResult<()> {
        self.record(
            Mutation::AddChain {
                chain_id,
                subnet_id,
            },
            |o| {
                o.chains.insert(chain_id, subnet_id);
            },
        );
        Ok(())
    }

    fn set_deposit_offer(&self, offer: DepositOffer) -> StateResult<()> {
        let stored = offer.clone();
        self.record(Mutation::SetDepositOffer(offer), |o| {
            o.offers.insert(stored.id, stored);
        });
        Ok(())
    }

    fn add_deposit(&self, deposit_tx_id: Id, deposit: Deposit) -> StateResult<()> {
        let stored = deposit.clone();
        self.record(Mutation::AddDeposit(deposit_tx_id, deposit), |o| {
            o.deposits.insert(deposit_tx_id, Some(stored));
        });
        Ok(())
    }

    fn remove_deposit(&self, deposit_tx_id: &Id) -> StateResult<()> {
        self.get_deposit(deposit_tx_id)?;
        let id = *deposit_tx_id;
        self.record(Mutation::RemoveDeposit(id), |o| {
            o.deposits.insert(id, None);
        });
        Ok(())
    }

    fn add_proposal(&self, proposal_id: Id, proposal: ProposalState) -> StateResult<()> {
        let stored = proposal.clone();
        self.record(Mutation::AddProposal(proposal_id, proposal), |o| {
            o.proposals.insert(proposal_id, Some(stored));
        });
        Ok(())
    }

    fn modify_proposal(&self, proposal_id: Id, proposal: ProposalState) -> StateResult<()> {
        let existing = self.get_proposal(&proposal_id)?;
        if existing.end != proposal.end {
            return Err(StateError::InvalidTransition(format!(
                "proposal {proposal_id} end time changed"
            )));
        }
        let stored = proposal.clone();
        self.record(Mutation::ModifyProposal(proposal_id, proposal), |o| {
            o.proposals.insert(proposal_id, Some(stored));
        });
        Ok(())
    }

    fn remove_proposal(&self, proposal_id: &Id) -> StateResult<()> {
        self.get_proposal(proposal_id)?;
        let id = *proposal_id;
        self.record(Mutation::RemoveProposal(id), |o| {
            o.proposals.insert(id, None);
            o.to_finish.insert(id, false);
        });
        Ok(())
    }

    fn add_proposal_id_to_finish(&self, proposal_id: Id) -> StateResult<()> {
        self.record(Mutation::AddProposalToFinish(proposal_id), |o| {
            o.to_finish.insert(proposal_id, true);
        });
        Ok(())
    }

    fn remove_proposal_id_to_finish(&self, proposal_id: &Id) -> StateResult<()> {
        let id = *proposal_id;
        self.record(Mutation::RemoveProposalToFinish(id), |o| {
            o.to_finish.insert(id, false);
        });
        Ok(())
    }

    fn set_address_state(&self, address: ShortId, state: AddressState) -> StateResult<()> {
        self.record(Mutation::SetAddressState(address, state), |o| {
            o.address_states.insert(address, state);
        });
        Ok(())
    }

    fn set_node_owner(&self, node_id: NodeId, member: ShortId) -> StateResult<()> {
        self.record(Mutation::SetNodeOwner(node_id, member), |o| {
            o.node_owners.insert(node_id, Some(member));
            o.member_nodes.insert(member, Some(node_id));
        });
        Ok(())
    }

    fn remove_node_owner(&self, node_id: &NodeId) -> StateResult<()> {
        let member = self.node_owner(node_id)?;
        let node_id = *node_id;
        self.record(Mutation::RemoveNodeOwner(node_id), |o| {
            o.node_owners.insert(node_id, None);
            if let Some(member) = member {
                o.member_nodes.insert(member, None);
            }
        });
        Ok(())
    }

    fn set_claimable(&self, owner_id: Id, amount: u64) -> StateResult<()> {
        self.record(Mutation::SetClaimable(owner_id, amount), |o| {
            o.claimables.insert(owner_id, amount);
        });
        Ok(())
    }

    fn add_tx(&self, tx: Tx) -> StateResult<()> {
        let tx_id = tx.id()?;
        let stored = tx.clone();
        self.record(Mutation::AddTx(Box::new(tx)), |o| {
            o.txs.insert(tx_id, stored);
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::State;
    use camino_storage::MemoryStorage;
    use camino_types::{Output, PRIMARY_NETWORK_ID};

    fn addr(b: u8) -> ShortId {
        ShortId([b; 20])
    }

    fn utxo(tx: u8, index: u32, owner: u8) -> Utxo {
        Utxo {
            utxo_id: UtxoId::new(Id([tx; 32]), index),
            asset_id: Id([0xAA; 32]),
            out: Output::transfer(10, OutputOwners::single(addr(owner))),
        }
    }

    fn staker(node: u8) -> Staker {
        Staker {
            tx_id: Id([node; 32]),
            node_id: NodeId([node; 20]),
            subnet_id: PRIMARY_NETWORK_ID,
            weight: 10,
            start_time: 0,
            end_time: 100,
            potential_reward: 0,
            reward_owner: OutputOwners::single(addr(node)),
        }
    }

    fn base() -> Arc<State> {
        let state = State::open(Arc::new(MemoryStorage::new())).unwrap();
        state.set_timestamp(50).unwrap();
        state.add_utxo(utxo(1, 0, 7)).unwrap();
        state.add_utxo(utxo(1, 1, 7)).unwrap();
        state.put_current_staker(staker(1)).unwrap();
        state.commit(1).unwrap();
        Arc::new(state)
    }

    #[test]
    fn test_read_through() {
        let state = base();
        let diff = Diff::new(state.clone());
        assert_eq!(diff.timestamp(), 50);
        assert!(diff.get_utxo(&UtxoId::new(Id([1u8; 32]), 0)).is_ok());
        assert_eq!(diff.current_stakers().unwrap().len(), 1);
    }

    #[test]
    fn test_writes_do_not_touch_parent() {
        let state = base();
        let diff = Diff::new(state.clone());
        diff.delete_utxo(&UtxoId::new(Id([1u8; 32]), 0)).unwrap();
        diff.add_utxo(utxo(2, 0, 7)).unwrap();
        diff.set_timestamp(60).unwrap();

        assert!(diff.get_utxo(&UtxoId::new(Id([1u8; 32]), 0)).unwrap_err().is_not_found());
        assert!(state.get_utxo(&UtxoId::new(Id([1u8; 32]), 0)).is_ok());
        assert_eq!(state.timestamp(), 50);
        assert!(state.get_utxo(&UtxoId::new(Id([2u8; 32]), 0)).is_err());
    }

    #[test]
    fn test_sibling_isolation() {
        let state = base();
        let on_commit = Diff::new(state.clone());
        let on_abort = Diff::new(state.clone());

        on_commit.delete_current_staker(&staker(1)).unwrap();
        assert!(on_commit
            .get_current_staker(&PRIMARY_NETWORK_ID, &NodeId([1u8; 20]))
            .unwrap_err()
            .is_not_found());
        assert!(on_abort
            .get_current_staker(&PRIMARY_NETWORK_ID, &NodeId([1u8; 20]))
            .is_ok());
    }

    #[test]
    fn test_utxo_ids_merge_overlay() {
        let state = base();
        let diff = Diff::new(state.clone());
        diff.delete_utxo(&UtxoId::new(Id([1u8; 32]), 0)).unwrap();
        diff.add_utxo(utxo(0, 5, 7)).unwrap();
        diff.add_utxo(utxo(3, 0, 8)).unwrap();

        let ids = diff.utxo_ids(&addr(7), None, 10).unwrap();
        assert_eq!(
            ids,
            vec![UtxoId::new(Id([0u8; 32]), 5), UtxoId::new(Id([1u8; 32]), 1)]
        );
        let page = diff.utxo_ids(&addr(7), None, 1).unwrap();
        assert_eq!(page, vec![UtxoId::new(Id([0u8; 32]), 5)]);
    }

    #[test]
    fn test_apply_replays_in_order() {
        let state = base();
        let diff = Diff::new(state.clone());
        diff.add_utxo(utxo(2, 0, 7)).unwrap();
        diff.delete_utxo(&UtxoId::new(Id([2u8; 32]), 0)).unwrap();
        diff.put_pending_staker(staker(2)).unwrap();
        diff.delete_pending_staker(&staker(2)).unwrap();
        diff.put_current_staker(staker(2)).unwrap();
        diff.set_timestamp(70).unwrap();
        assert_eq!(diff.mutations().len(), 6);

        diff.apply(state.as_ref()).unwrap();
        state.commit(2).unwrap();

        assert_eq!(state.timestamp(), 70);
        assert!(state.get_utxo(&UtxoId::new(Id([2u8; 32]), 0)).is_err());
        assert!(state.pending_stakers().unwrap().is_empty());
        assert_eq!(state.current_stakers().unwrap().len(), 2);
    }

    #[test]
    fn test_nested_diffs() {
        let state = base();
        let outer = Arc::new(Diff::new(state.clone()));
        outer.set_base_fee(5).unwrap();
        let inner = Diff::new(outer.clone());
        inner.set_base_fee(9).unwrap();
        assert_eq!(inner.base_fee(), 9);
        assert_eq!(outer.base_fee(), 5);

        inner.apply(outer.as_ref()).unwrap();
        assert_eq!(outer.base_fee(), 9);
        assert_eq!(state.base_fee(), 0);
    }
}
