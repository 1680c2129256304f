//! Read queries shared by executors and services.

use crate::{ChainView, OptionalExt, StateError, StateResult};
use camino_types::{AddressState, Id, NodeId, ShortId, Staker, PRIMARY_NETWORK_ID};

/// Which staker set holds a validator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StakerStatus {
    Pending,
    Current,
    Deferred,
}

pub fn current_validators(view: &dyn ChainView, subnet_id: &Id) -> StateResult<Vec<Staker>> {
    Ok(view
        .current_stakers()?
        .into_iter()
        .filter(|s| s.subnet_id == *subnet_id)
        .collect())
}

pub fn pending_validators(view: &dyn ChainView, subnet_id: &Id) -> StateResult<Vec<Staker>> {
    Ok(view
        .pending_stakers()?
        .into_iter()
        .filter(|s| s.subnet_id == *subnet_id)
        .collect())
}

pub fn deferred_validators(view: &dyn ChainView, subnet_id: &Id) -> StateResult<Vec<Staker>> {
    Ok(view
        .deferred_stakers()?
        .into_iter()
        .filter(|s| s.subnet_id == *subnet_id)
        .collect())
}

/// The staker entry of `(subnet_id, node_id)` in whichever set holds it.
pub fn find_staker(
    view: &dyn ChainView,
    subnet_id: &Id,
    node_id: &NodeId,
) -> StateResult<Option<(StakerStatus, Staker)>> {
    if let Some(staker) = view.get_current_staker(subnet_id, node_id).optional()? {
        return Ok(Some((StakerStatus::Current, staker)));
    }
    if let Some(staker) = view.get_pending_staker(subnet_id, node_id).optional()? {
        return Ok(Some((StakerStatus::Pending, staker)));
    }
    if let Some(staker) = view.get_deferred_staker(subnet_id, node_id).optional()? {
        return Ok(Some((StakerStatus::Deferred, staker)));
    }
    Ok(None)
}

/// Earliest pending start or current / deferred end.
pub fn next_staker_change_time(view: &dyn ChainView) -> StateResult<u64> {
    let next_start = view.pending_stakers()?.first().map(|s| s.start_time);
    let next_current_end = view.current_stakers()?.first().map(|s| s.end_time);
    let next_deferred_end = view.deferred_stakers()?.first().map(|s| s.end_time);
    [next_start, next_current_end, next_deferred_end]
        .into_iter()
        .flatten()
        .min()
        .ok_or(StateError::NothingScheduled("staker set change"))
}

/// Earliest scheduled event of any kind: staker set change, deposit unlock or
/// proposal expiration. `None` when nothing is scheduled.
pub fn next_chain_event_time(view: &dyn ChainView) -> StateResult<Option<u64>> {
    let candidates = [
        next_staker_change_time(view).optional()?,
        view.next_to_unlock_deposit_time().optional()?,
        view.next_proposal_expiration_time().optional()?,
    ];
    Ok(candidates.into_iter().flatten().min())
}

/// Consortium members whose registered node is a current primary validator.
pub fn allowed_voters(view: &dyn ChainView) -> StateResult<Vec<ShortId>> {
    let mut voters = Vec::new();
    for staker in current_validators(view, &PRIMARY_NETWORK_ID)? {
        let Some(member) = view.node_owner(&staker.node_id)? else {
            continue;
        };
        if view.address_state(&member)?.contains(AddressState::CONSORTIUM) {
            voters.push(member);
        }
    }
    voters.sort();
    voters.dedup();
    Ok(voters)
}
