//! Removal of validators whose end time was reached.

use super::{credit_claimable, Executor, ProposalOutcome};
use crate::builder::{build_reward_validator_tx, staker_to_remove};
use crate::utxo::release_locks;
use crate::{ExecutorError, ExecutorResult};
use camino_state::queries::StakerStatus;
use camino_state::{Chain, Diff};
use camino_types::{Id, LockState, Tx};
use tracing::info;

impl Executor {
    /// Both branches remove the staker and return its bond; only the commit
    /// branch pays the reward, and deferred stakers are never paid.
    pub(super) fn reward_validator(
        &self,
        outcome: &ProposalOutcome,
        tx_id: &Id,
        tx: &Tx,
        staker_tx_id: &Id,
    ) -> ExecutorResult<()> {
        let expected = build_reward_validator_tx(&outcome.on_commit)?;
        if expected.as_ref() != Some(&tx.unsigned) {
            return Err(ExecutorError::UnexpectedSystemTx {
                expected: format!("{:?}", expected),
                actual: format!("{:?}", tx.unsigned),
            });
        }
        let Some((status, staker)) = staker_to_remove(&outcome.on_commit)? else {
            return Err(ExecutorError::UnexpectedSystemTx {
                expected: "no validator to remove".to_string(),
                actual: format!("{:?}", tx.unsigned),
            });
        };

        for (diff, pay) in [(&outcome.on_commit, true), (&outcome.on_abort, false)] {
            remove_staker(diff, status, &staker)?;
            let mut next_index = 0;
            release_locks(diff, &staker.tx_id, LockState::BONDED, tx_id, &mut next_index)?;
            if pay && status == StakerStatus::Current {
                credit_claimable(diff, staker.reward_owner.owner_id()?, staker.potential_reward)?;
            }
        }

        info!(
            staker = %staker_tx_id,
            node = %staker.node_id,
            deferred = status == StakerStatus::Deferred,
            reward = staker.potential_reward,
            "Removed validator"
        );
        Ok(())
    }
}

fn remove_staker(
    diff: &Diff,
    status: StakerStatus,
    staker: &camino_types::Staker,
) -> ExecutorResult<()> {
    match status {
        StakerStatus::Current => diff.delete_current_staker(staker)?,
        StakerStatus::Deferred => diff.delete_deferred_staker(staker)?,
        StakerStatus::Pending => diff.delete_pending_staker(staker)?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::*;
    use camino_state::ChainView;
    use camino_types::{UnsignedTx, UtxoId, PRIMARY_NETWORK_ID};
    use std::sync::Arc;

    /// State advanced to the end of the first genesis validator.
    fn at_first_end(fixture: &Fixture) -> Arc<Diff> {
        fixture.clock.set(VALIDATOR_END);
        let outcome = fixture
            .executor()
            .execute_proposal(
                fixture.view(),
                &Tx::system(UnsignedTx::AdvanceTime {
                    time: VALIDATOR_END,
                }),
            )
            .unwrap();
        Arc::new(outcome.on_commit)
    }

    #[test]
    fn test_reward_on_commit_only() {
        let fixture = Fixture::new();
        let parent = at_first_end(&fixture);
        let staker = parent
            .get_current_staker(&PRIMARY_NETWORK_ID, &node(0))
            .unwrap();
        // Genesis validators carry no potential reward; give this one some.
        let with_reward = Diff::new(parent.clone());
        with_reward.delete_current_staker(&staker).unwrap();
        let mut rewarded = staker.clone();
        rewarded.potential_reward = 77;
        with_reward.put_current_staker(rewarded.clone()).unwrap();

        let tx = Tx::system(UnsignedTx::RewardValidator {
            staker_tx_id: staker.tx_id,
        });
        let outcome = fixture
            .executor()
            .execute_proposal(Arc::new(with_reward), &tx)
            .unwrap();
        let tx_id = tx.id().unwrap();
        let owner_id = rewarded.reward_owner.owner_id().unwrap();

        for diff in [&outcome.on_commit, &outcome.on_abort] {
            assert!(diff.get_current_staker(&PRIMARY_NETWORK_ID, &node(0)).is_err());
            let returned = diff.get_utxo(&UtxoId::new(tx_id, 0)).unwrap();
            assert_eq!(returned.out.amount(), staker.weight);
            assert!(!returned.out.lock_ids().is_locked());
        }
        assert_eq!(outcome.on_commit.claimable(&owner_id).unwrap(), 77);
        assert_eq!(outcome.on_abort.claimable(&owner_id).unwrap(), 0);
    }

    #[test]
    fn test_wrong_staker_rejected() {
        let fixture = Fixture::new();
        let parent = at_first_end(&fixture);
        let other = parent
            .get_current_staker(&PRIMARY_NETWORK_ID, &node(1))
            .unwrap();
        let tx = Tx::system(UnsignedTx::RewardValidator {
            staker_tx_id: other.tx_id,
        });
        let err = fixture
            .executor()
            .execute_proposal(parent, &tx)
            .err()
            .unwrap();
        assert!(matches!(err, ExecutorError::UnexpectedSystemTx { .. }));
    }

    #[test]
    fn test_nothing_to_remove_before_end() {
        let fixture = Fixture::new();
        let staker = fixture
            .state
            .get_current_staker(&PRIMARY_NETWORK_ID, &node(0))
            .unwrap();
        let tx = Tx::system(UnsignedTx::RewardValidator {
            staker_tx_id: staker.tx_id,
        });
        assert!(fixture.executor().execute_proposal(fixture.view(), &tx).is_err());
    }
}
