//! Deterministic construction of system transactions.
//!
//! The block builder issues these from state alone; executors rebuild them
//! and reject any system transaction that differs.

use crate::{Clock, ExecutorResult};
use camino_state::queries::{next_chain_event_time, StakerStatus};
use camino_state::ChainView;
use camino_types::{Staker, Tx, UnsignedTx};

/// The staker whose end time was reached first, current or deferred.
pub fn staker_to_remove(view: &dyn ChainView) -> ExecutorResult<Option<(StakerStatus, Staker)>> {
    let now = view.timestamp();
    let current = view
        .current_stakers()?
        .into_iter()
        .next()
        .filter(|s| s.end_time <= now)
        .map(|s| (StakerStatus::Current, s));
    let deferred = view
        .deferred_stakers()?
        .into_iter()
        .next()
        .filter(|s| s.end_time <= now)
        .map(|s| (StakerStatus::Deferred, s));

    Ok(match (current, deferred) {
        (Some(c), Some(d)) => {
            if (d.1.end_time, d.1.tx_id) < (c.1.end_time, c.1.tx_id) {
                Some(d)
            } else {
                Some(c)
            }
        }
        (c, d) => c.or(d),
    })
}

/// `RewardValidator` for the next staker to remove, if any.
pub fn build_reward_validator_tx(view: &dyn ChainView) -> ExecutorResult<Option<UnsignedTx>> {
    Ok(staker_to_remove(view)?.map(|(_, staker)| UnsignedTx::RewardValidator {
        staker_tx_id: staker.tx_id,
    }))
}

/// `FinishProposals` listing proposals that may finish early and proposals
/// whose voting window closed, if any.
pub fn build_finish_proposals_tx(view: &dyn ChainView) -> ExecutorResult<Option<UnsignedTx>> {
    let mut early = view.proposal_ids_to_finish()?;
    early.sort();
    let expired: Vec<_> = view
        .proposals_expired_by(view.timestamp())?
        .into_iter()
        .filter(|id| early.binary_search(id).is_err())
        .collect();

    if early.is_empty() && expired.is_empty() {
        return Ok(None);
    }
    Ok(Some(UnsignedTx::FinishProposals {
        early_finished_proposal_ids: early,
        expired_proposal_ids: expired,
    }))
}

/// `AdvanceTime` to the local time, capped at the next chain event, if that
/// moves time forward.
pub fn build_advance_time_tx(
    view: &dyn ChainView,
    clock: &dyn Clock,
) -> ExecutorResult<Option<UnsignedTx>> {
    let wall = clock.unix_time();
    let target = match next_chain_event_time(view)? {
        Some(bound) => wall.min(bound),
        None => wall,
    };
    if target > view.timestamp() {
        Ok(Some(UnsignedTx::AdvanceTime { time: target }))
    } else {
        Ok(None)
    }
}

/// The system transaction the builder must issue next: finishing proposals
/// first, then removing validators, then advancing time.
pub fn next_system_tx(view: &dyn ChainView, clock: &dyn Clock) -> ExecutorResult<Option<Tx>> {
    if let Some(unsigned) = build_finish_proposals_tx(view)? {
        return Ok(Some(Tx::system(unsigned)));
    }
    if let Some(unsigned) = build_reward_validator_tx(view)? {
        return Ok(Some(Tx::system(unsigned)));
    }
    Ok(build_advance_time_tx(view, clock)?.map(Tx::system))
}
