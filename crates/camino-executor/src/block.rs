//! Block verification and acceptance.

use crate::builder::next_system_tx;
use crate::{Executor, ExecutorError, ExecutorResult, ProposalOutcome};
use camino_state::{ChainView, Diff, State};
use camino_types::Tx;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Verifies blocks against the last accepted state and accepts their diffs.
pub struct BlockManager {
    state: Arc<State>,
    executor: Executor,
    accept_lock: Mutex<()>,
}

impl BlockManager {
    pub fn new(state: Arc<State>, executor: Executor) -> Self {
        Self {
            state,
            executor,
            accept_lock: Mutex::new(()),
        }
    }

    pub fn state(&self) -> &Arc<State> {
        &self.state
    }

    pub fn executor(&self) -> &Executor {
        &self.executor
    }

    /// Verify a standard block on top of the last accepted state.
    pub fn verify_standard(&self, txs: &[Tx]) -> ExecutorResult<Arc<Diff>> {
        self.verify_standard_on(self.state.clone(), txs)
    }

    /// Verify a standard block on top of `parent`.
    ///
    /// Transactions execute in order, each seeing the writes of the ones
    /// before it. Any failure rejects the whole block.
    #[instrument(skip(self, parent, txs), fields(txs = txs.len()))]
    pub fn verify_standard_on(
        &self,
        parent: Arc<dyn ChainView>,
        txs: &[Tx],
    ) -> ExecutorResult<Arc<Diff>> {
        if txs.is_empty() {
            return Err(ExecutorError::WrongBlockType(
                "standard block without transactions".to_string(),
            ));
        }
        let block = Arc::new(Diff::new(parent));
        for (index, tx) in txs.iter().enumerate() {
            let scratch = Diff::new(block.clone());
            if let Err(e) = self.executor.execute_decision(&scratch, tx) {
                warn!(index, kind = tx.unsigned.kind(), error = %e, "Rejected transaction");
                return Err(e);
            }
            scratch.apply(block.as_ref())?;
        }
        Ok(block)
    }

    /// Verify a proposal block on top of the last accepted state.
    pub fn verify_proposal(&self, tx: &Tx) -> ExecutorResult<ProposalOutcome> {
        self.executor.execute_proposal(self.state.clone(), tx)
    }

    /// Make `diff` durable as the next height.
    ///
    /// `diff` must have been verified directly on the last accepted state, so
    /// once one outcome of a block is accepted its siblings are stale.
    #[instrument(skip(self, diff))]
    pub fn accept(&self, diff: &Diff) -> ExecutorResult<u64> {
        let _guard = self.accept_lock.lock();
        let current = self.state.height();
        if Arc::as_ptr(diff.parent()) as *const () != Arc::as_ptr(&self.state) as *const () {
            warn!(current, "Rejected block not built on the accepted state");
            return Err(ExecutorError::DetachedBlock);
        }
        if diff.height() != current {
            warn!(parent = diff.height(), current, "Rejected stale block");
            return Err(ExecutorError::StaleBlock {
                parent: diff.height(),
                current,
            });
        }
        let height = current + 1;
        if let Err(e) = diff.apply(self.state.as_ref()) {
            self.state.discard()?;
            return Err(e.into());
        }
        self.state.commit(height)?;
        info!(height, timestamp = self.state.timestamp(), "Accepted block");
        Ok(height)
    }

    /// The system transaction the next block must carry, if any.
    pub fn next_system_tx(&self) -> ExecutorResult<Option<Tx>> {
        next_system_tx(self.state.as_ref(), self.executor.clock())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::*;
    use camino_types::{
        CommonFields, LockState, Output, TransferableOutput, UnsignedTx, PRIMARY_NETWORK_ID,
    };

    fn manager(fixture: &Fixture) -> BlockManager {
        BlockManager::new(fixture.state.clone(), fixture.executor())
    }

    fn transfer(fixture: &Fixture, view: &dyn ChainView, key: &TestKey, amount: u64) -> Tx {
        let config = test_config();
        let input = fixture.unlocked_input_in(view, key);
        let mut outs = vec![
            TransferableOutput::new(fee_asset(), Output::transfer(amount, key.owners())),
            TransferableOutput::new(
                fee_asset(),
                Output::transfer(input.input.amount() - amount - config.tx_fee, key.owners()),
            ),
        ];
        camino_types::components::sort_outputs(&mut outs).unwrap();
        sign(
            UnsignedTx::Base {
                common: CommonFields {
                    network_id: config.network_id,
                    blockchain_id: config.chain_id,
                    ins: vec![input],
                    outs,
                    memo: Vec::new(),
                },
            },
            &[vec![key]],
        )
    }

    #[test]
    fn test_accept_standard_block() {
        let fixture = Fixture::new();
        let blocks = manager(&fixture);
        let alice = fixture.alice();

        let tx = transfer(&fixture, fixture.state.as_ref(), &alice, 1_000);
        let diff = blocks.verify_standard(&[tx.clone()]).unwrap();
        assert_eq!(fixture.state.height(), 0);

        assert_eq!(blocks.accept(&diff).unwrap(), 1);
        assert_eq!(fixture.state.height(), 1);
        assert!(fixture.state.get_tx(&tx.id().unwrap()).is_ok());
    }

    #[test]
    fn test_double_spend_in_block_rejected() {
        let fixture = Fixture::new();
        let blocks = manager(&fixture);
        let alice = fixture.alice();

        let first = transfer(&fixture, fixture.state.as_ref(), &alice, 1_000);
        let second = transfer(&fixture, fixture.state.as_ref(), &alice, 2_000);
        let err = blocks.verify_standard(&[first, second]).err().unwrap();
        assert!(err.is_not_found());
        assert!(!fixture.state.has_pending_writes());
    }

    #[test]
    fn test_failed_tx_leaves_parent_untouched() {
        let fixture = Fixture::new();
        let blocks = manager(&fixture);
        let config = test_config();
        let member = fixture.member(0);

        let good = transfer(&fixture, fixture.state.as_ref(), &fixture.alice(), 1_000);
        let parent = blocks.verify_standard(&[good]).unwrap();
        let before = parent.mutations().len();

        // Bonding is not allowed in a base transaction.
        let input = fixture.unlocked_input(&member);
        let bonded = Output::transfer(input.input.amount() - config.tx_fee, member.owners())
            .lock(LockState::BONDED);
        let bad = sign(
            UnsignedTx::Base {
                common: CommonFields {
                    network_id: config.network_id,
                    blockchain_id: config.chain_id,
                    ins: vec![input],
                    outs: vec![TransferableOutput::new(fee_asset(), bonded)],
                    memo: Vec::new(),
                },
            },
            &[vec![&member]],
        );

        let err = blocks.verify_standard_on(parent.clone(), &[bad]).err().unwrap();
        assert!(matches!(err, ExecutorError::LockNotAllowed(_)));
        assert_eq!(parent.mutations().len(), before);
    }

    #[test]
    fn test_empty_standard_block_rejected() {
        let fixture = Fixture::new();
        let err = manager(&fixture).verify_standard(&[]).err().unwrap();
        assert!(matches!(err, ExecutorError::WrongBlockType(_)));
    }

    #[test]
    fn test_proposal_block_branches() {
        let fixture = Fixture::new();
        let blocks = manager(&fixture);
        fixture.clock.set(VALIDATOR_END);

        let advance = blocks.next_system_tx().unwrap().unwrap();
        let outcome = blocks.verify_proposal(&advance).unwrap();
        blocks.accept(&outcome.on_commit).unwrap();
        assert_eq!(fixture.state.timestamp(), VALIDATOR_END);

        let reward = blocks.next_system_tx().unwrap().unwrap();
        assert!(matches!(reward.unsigned, UnsignedTx::RewardValidator { .. }));
        let outcome = blocks.verify_proposal(&reward).unwrap();
        blocks.accept(&outcome.on_abort).unwrap();
        assert!(fixture
            .state
            .get_current_staker(&PRIMARY_NETWORK_ID, &node(0))
            .is_err());
        assert_eq!(fixture.state.height(), 2);
    }

    #[test]
    fn test_sibling_outcome_rejected_after_accept() {
        let fixture = Fixture::new();
        let blocks = manager(&fixture);
        fixture.clock.set(GENESIS_TIME + 50);

        let advance = Tx::system(UnsignedTx::AdvanceTime {
            time: GENESIS_TIME + 50,
        });
        let outcome = blocks.verify_proposal(&advance).unwrap();
        assert_eq!(blocks.accept(&outcome.on_commit).unwrap(), 1);

        let err = blocks.accept(&outcome.on_abort).unwrap_err();
        assert!(matches!(
            err,
            ExecutorError::StaleBlock {
                parent: 0,
                current: 1
            }
        ));
        assert_eq!(fixture.state.height(), 1);
        assert_eq!(fixture.state.timestamp(), GENESIS_TIME + 50);
        assert!(!fixture.state.has_pending_writes());
    }

    #[test]
    fn test_stale_standard_block_rejected() {
        let fixture = Fixture::new();
        let blocks = manager(&fixture);

        let first = transfer(&fixture, fixture.state.as_ref(), &fixture.alice(), 1_000);
        let second = transfer(&fixture, fixture.state.as_ref(), &fixture.member(0), 2_000);
        let first = blocks.verify_standard(&[first]).unwrap();
        let second = blocks.verify_standard(&[second]).unwrap();

        blocks.accept(&first).unwrap();
        let err = blocks.accept(&second).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Scheduling);
        assert_eq!(fixture.state.height(), 1);
    }

    #[test]
    fn test_block_on_unaccepted_parent_rejected() {
        let fixture = Fixture::new();
        let blocks = manager(&fixture);

        let good = transfer(&fixture, fixture.state.as_ref(), &fixture.alice(), 1_000);
        let parent = blocks.verify_standard(&[good]).unwrap();
        let next = transfer(&fixture, parent.as_ref(), &fixture.member(0), 500);
        let child = blocks.verify_standard_on(parent, &[next]).unwrap();

        let err = blocks.accept(&child).unwrap_err();
        assert!(matches!(err, ExecutorError::DetachedBlock));
        assert_eq!(fixture.state.height(), 0);
    }
}
