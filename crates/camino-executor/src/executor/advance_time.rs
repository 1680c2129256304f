//! Chain time advancement.
//!
//! Moving time forward promotes pending stakers whose start time was reached
//! and unlocks deposits whose end time was reached, crediting their interest
//! to the reward owner's claimable balance. Removing stakers is left to
//! `RewardValidator`; the upper bound on the new time keeps every scheduled
//! event from being skipped.

use super::{credit_claimable, Executor};
use crate::utxo::release_locks;
use crate::{ExecutorError, ExecutorResult};
use camino_state::queries::next_chain_event_time;
use camino_state::{Chain, ChainView, Diff};
use camino_types::{AddressState, DepositOffer, Id, LockState, Staker};
use tracing::{debug, info};

impl Executor {
    /// Advance chain time on the commit branch; the abort branch keeps the old time.
    pub(super) fn advance_time(&self, on_commit: &Diff, tx_id: &Id, time: u64) -> ExecutorResult<()> {
        let current = on_commit.timestamp();
        if time <= current {
            return Err(ExecutorError::TimestampTooEarly {
                proposed: time,
                current,
            });
        }
        let limit = self.clock.unix_time().saturating_add(self.config.sync_bound);
        if time > limit {
            return Err(ExecutorError::TimestampInFuture {
                proposed: time,
                limit,
            });
        }
        if let Some(bound) = next_chain_event_time(on_commit)? {
            if time > bound {
                return Err(ExecutorError::TimestampTooLate {
                    proposed: time,
                    bound,
                });
            }
        }

        on_commit.set_timestamp(time)?;

        let mut promoted = 0;
        for staker in on_commit.pending_stakers()? {
            if staker.start_time > time {
                break;
            }
            on_commit.delete_pending_staker(&staker)?;
            if owner_is_deferred(on_commit, &staker)? {
                debug!(node = %staker.node_id, "Promoted staker into deferred set");
                on_commit.put_deferred_staker(staker)?;
            } else {
                debug!(node = %staker.node_id, subnet = %staker.subnet_id, "Promoted staker");
                on_commit.put_current_staker(staker)?;
            }
            promoted += 1;
        }

        let mut next_index = 0;
        let unlocking = on_commit.deposits_unlocking_by(time)?;
        for deposit_id in &unlocking {
            unlock_deposit(on_commit, deposit_id, tx_id, &mut next_index)?;
        }

        info!(time, promoted, unlocked = unlocking.len(), "Advanced chain time");
        Ok(())
    }
}

/// A primary validator whose node owner carries `NODE_DEFERRED` starts deferred.
fn owner_is_deferred(view: &dyn ChainView, staker: &Staker) -> ExecutorResult<bool> {
    if !staker.is_primary() {
        return Ok(false);
    }
    let Some(owner) = view.node_owner(&staker.node_id)? else {
        return Ok(false);
    };
    Ok(view
        .address_state(&owner)?
        .contains(AddressState::NODE_DEFERRED))
}

/// Return a finished deposit to its owners and credit its interest.
fn unlock_deposit(
    diff: &Diff,
    deposit_id: &Id,
    tx_id: &Id,
    next_index: &mut u32,
) -> ExecutorResult<()> {
    let deposit = diff.get_deposit(deposit_id)?;
    let offer = diff.get_deposit_offer(&deposit.offer_id)?;
    let reward = deposit
        .total_reward(&offer)
        .map_err(|_| ExecutorError::Overflow)?;

    let released = release_locks(diff, deposit_id, LockState::DEPOSITED, tx_id, next_index)?;
    credit_claimable(diff, deposit.reward_owner.owner_id()?, reward)?;
    diff.set_deposit_offer(DepositOffer {
        deposited_amount: offer.deposited_amount.saturating_sub(deposit.amount),
        ..offer
    })?;
    diff.remove_deposit(deposit_id)?;

    debug!(deposit = %deposit_id, released, reward, "Unlocked deposit");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::*;
    use crate::ErrorKind;
    use camino_state::{get_balance, OptionalExt};
    use camino_types::{
        CommonFields, Deposit, Output, TransferableOutput, Tx, UnsignedTx, PRIMARY_NETWORK_ID,
    };
    use std::sync::Arc;

    fn advance(time: u64) -> Tx {
        Tx::system(UnsignedTx::AdvanceTime { time })
    }

    #[test]
    fn test_time_bounds() {
        let fixture = Fixture::new();
        let exec = fixture.executor();
        fixture.clock.set(GENESIS_TIME + 1_000);

        let err = exec
            .execute_proposal(fixture.view(), &advance(GENESIS_TIME))
            .err()
            .unwrap();
        assert!(matches!(err, ExecutorError::TimestampTooEarly { .. }));

        let err = exec
            .execute_proposal(fixture.view(), &advance(GENESIS_TIME + 1_011))
            .err()
            .unwrap();
        assert!(matches!(err, ExecutorError::TimestampInFuture { .. }));
        assert_eq!(err.kind(), ErrorKind::Scheduling);

        let outcome = exec
            .execute_proposal(fixture.view(), &advance(GENESIS_TIME + 1_010))
            .unwrap();
        assert_eq!(outcome.on_commit.timestamp(), GENESIS_TIME + 1_010);
        assert_eq!(outcome.on_abort.timestamp(), GENESIS_TIME);
    }

    #[test]
    fn test_cannot_skip_validator_end() {
        let fixture = Fixture::new();
        fixture.clock.set(VALIDATOR_END + 1_000);

        let err = fixture
            .executor()
            .execute_proposal(fixture.view(), &advance(VALIDATOR_END + 1))
            .err()
            .unwrap();
        assert!(matches!(
            err,
            ExecutorError::TimestampTooLate { bound, .. } if bound == VALIDATOR_END
        ));
    }

    #[test]
    fn test_promotes_pending_stakers() {
        let fixture = Fixture::new();
        let diff = Diff::new(fixture.view());
        let mut staker = diff
            .get_current_staker(&PRIMARY_NETWORK_ID, &node(0))
            .unwrap();
        staker.subnet_id = Id::hash_of(b"subnet");
        staker.tx_id = Id::hash_of(b"subnet validator");
        staker.start_time = GENESIS_TIME + 50;
        diff.put_pending_staker(staker.clone()).unwrap();

        fixture.clock.set(GENESIS_TIME + 50);
        let outcome = fixture
            .executor()
            .execute_proposal(Arc::new(diff), &advance(GENESIS_TIME + 50))
            .unwrap();
        assert!(outcome
            .on_commit
            .get_current_staker(&staker.subnet_id, &node(0))
            .optional()
            .unwrap()
            .is_some());
        assert!(outcome.on_commit.pending_stakers().unwrap().is_empty());
        assert_eq!(outcome.on_abort.pending_stakers().unwrap().len(), 1);
    }

    #[test]
    fn test_pending_validator_of_deferred_owner_starts_deferred() {
        let fixture = Fixture::new();
        let member = fixture.member(0);
        let diff = Diff::new(fixture.view());
        let mut staker = diff
            .get_current_staker(&PRIMARY_NETWORK_ID, &node(0))
            .unwrap();
        diff.delete_current_staker(&staker).unwrap();
        staker.start_time = GENESIS_TIME + 50;
        diff.put_pending_staker(staker).unwrap();
        let state = diff.address_state(&member.address()).unwrap();
        diff.set_address_state(member.address(), state.with(AddressState::NODE_DEFERRED))
            .unwrap();

        fixture.clock.set(GENESIS_TIME + 50);
        let outcome = fixture
            .executor()
            .execute_proposal(Arc::new(diff), &advance(GENESIS_TIME + 50))
            .unwrap();
        let after = &outcome.on_commit;
        assert!(after.pending_stakers().unwrap().is_empty());
        assert!(after
            .get_current_staker(&PRIMARY_NETWORK_ID, &node(0))
            .optional()
            .unwrap()
            .is_none());
        assert!(after
            .get_deferred_staker(&PRIMARY_NETWORK_ID, &node(0))
            .is_ok());
    }

    #[test]
    fn test_deposit_unlocks_with_reward() {
        let fixture = Fixture::new();
        let member = fixture.member(0);
        let diff = Diff::new(fixture.view());

        let input = fixture.unlocked_input_in(&diff, &member);
        let total = input.input.amount();
        let mut outs = vec![
            TransferableOutput::new(
                fee_asset(),
                Output::transfer(50_000, member.owners()).lock(LockState::DEPOSITED),
            ),
            TransferableOutput::new(
                fee_asset(),
                Output::transfer(total - 50_000 - 10, member.owners()),
            ),
        ];
        camino_types::components::sort_outputs(&mut outs).unwrap();
        let config = test_config();
        let deposit_tx = sign(
            UnsignedTx::Deposit {
                common: CommonFields {
                    network_id: config.network_id,
                    blockchain_id: config.chain_id,
                    ins: vec![input],
                    outs,
                    memo: Vec::new(),
                },
                offer_id: offer_id(),
                duration: 31_536,
                reward_owner: member.owners(),
            },
            &[vec![&member]],
        );
        let exec = fixture.executor();
        let deposit_id = exec.execute_decision(&diff, &deposit_tx).unwrap();
        let deposit: Deposit = diff.get_deposit(&deposit_id).unwrap();

        let end = deposit.end_time();
        fixture.clock.set(end);
        let outcome = exec.execute_proposal(Arc::new(diff), &advance(end)).unwrap();
        let after = &outcome.on_commit;

        assert!(after.get_deposit(&deposit_id).is_err());
        assert!(after.locked_utxo_ids(&deposit_id).unwrap().is_empty());
        // 100% a year over a thousandth of a year.
        assert_eq!(
            after.claimable(&member.owners().owner_id().unwrap()).unwrap(),
            50
        );
        assert_eq!(after.get_deposit_offer(&offer_id()).unwrap().deposited_amount, 0);

        let balance = get_balance(after, &[member.address()]).unwrap()[&fee_asset()];
        assert_eq!(balance.deposited, 0);
        assert_eq!(balance.unlocked, MEMBER_FUNDS - 10);
    }
}
