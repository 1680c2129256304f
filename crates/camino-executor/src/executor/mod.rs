//! Transaction executors.
//!
//! Decision transactions mutate a single [`Diff`]. Proposal-style transactions
//! (`AdvanceTime`, `RewardValidator`) produce two sibling diffs over the same
//! parent, one for the commit outcome and one for the abort outcome.
//!
//! Every executor checks the transaction against the state first and only
//! then writes. Callers still execute each transaction into a scratch diff,
//! so a failure never leaves partial writes in a block.

mod advance_time;
mod dac;
mod reward;
mod standard;

use crate::utxo::{burn_fee, consume_inputs, produce_outputs, verify_auths, verify_spend, SpendSummary};
use crate::{Clock, Config, ExecutorError, ExecutorResult};
use camino_state::{Chain, ChainView, Diff};
use camino_types::{CommonFields, Id, LockState, SignatureVerifier, Tx, UnsignedTx};
use std::sync::Arc;
use tracing::{debug, instrument};

/// The two outcomes of a proposal-style transaction.
///
/// Both overlays build on the same parent; consensus accepts exactly one.
pub struct ProposalOutcome {
    /// State if the block is committed: time advanced, or validator rewarded.
    pub on_commit: Diff,
    /// State if the block is aborted: time unchanged, or validator removed
    /// without reward.
    pub on_abort: Diff,
}

/// Executes transactions against chain state.
pub struct Executor {
    config: Config,
    clock: Arc<dyn Clock>,
    verifier: Arc<dyn SignatureVerifier>,
}

impl Executor {
    pub fn new(
        config: Config,
        clock: Arc<dyn Clock>,
        verifier: Arc<dyn SignatureVerifier>,
    ) -> Self {
        Self {
            config,
            clock,
            verifier,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    /// Execute a decision transaction onto `diff`, returning its ID.
    #[instrument(skip(self, diff, tx), fields(kind = tx.unsigned.kind()))]
    pub fn execute_decision(&self, diff: &Diff, tx: &Tx) -> ExecutorResult<Id> {
        if tx.unsigned.is_proposal_style() {
            return Err(ExecutorError::WrongBlockType(format!(
                "{} belongs in a proposal block",
                tx.unsigned.kind()
            )));
        }
        tx.syntactic_verify(&self.config.tx_context())?;
        let tx_id = tx.id()?;

        match &tx.unsigned {
            UnsignedTx::Base { common } => self.base(diff, &tx_id, tx, common)?,
            UnsignedTx::CreateSubnet { common, owner } => {
                self.create_subnet(diff, &tx_id, tx, common, owner)?
            }
            UnsignedTx::CreateChain {
                common, subnet_id, ..
            } => self.create_chain(diff, &tx_id, tx, common, subnet_id)?,
            UnsignedTx::AddValidator {
                common,
                validator,
                reward_owner,
                ..
            } => self.add_validator(diff, &tx_id, tx, common, validator, reward_owner)?,
            UnsignedTx::AddSubnetValidator {
                common,
                validator,
                subnet_id,
                ..
            } => self.add_subnet_validator(diff, &tx_id, tx, common, validator, subnet_id)?,
            UnsignedTx::AddDepositOffer {
                common,
                offer,
                offer_creator,
                ..
            } => self.add_deposit_offer(diff, &tx_id, tx, common, offer, offer_creator)?,
            UnsignedTx::Deposit {
                common,
                offer_id,
                duration,
                reward_owner,
            } => self.deposit(diff, &tx_id, tx, common, offer_id, *duration, reward_owner)?,
            UnsignedTx::Claim { .. } => self.claim(diff, &tx_id, tx)?,
            UnsignedTx::RegisterNode {
                common,
                old_node_id,
                new_node_id,
                node_owner,
                ..
            } => self.register_node(diff, &tx_id, tx, common, old_node_id, new_node_id, node_owner)?,
            UnsignedTx::AddressState {
                common,
                address,
                flag_bit,
                remove,
                executor,
                ..
            } => self.address_state(
                diff, &tx_id, tx, common, address, *flag_bit, *remove, executor,
            )?,
            UnsignedTx::AddProposal {
                common,
                proposal,
                proposer,
                ..
            } => self.add_proposal(diff, &tx_id, tx, common, proposal, proposer)?,
            UnsignedTx::AddVote {
                common,
                proposal_id,
                option_index,
                voter,
                ..
            } => self.add_vote(diff, &tx_id, tx, common, proposal_id, *option_index, voter)?,
            UnsignedTx::FinishProposals {
                early_finished_proposal_ids,
                expired_proposal_ids,
            } => self.finish_proposals(
                diff,
                &tx_id,
                tx,
                early_finished_proposal_ids,
                expired_proposal_ids,
            )?,
            UnsignedTx::AdvanceTime { .. } | UnsignedTx::RewardValidator { .. } => {
                return Err(ExecutorError::WrongBlockType(tx.unsigned.kind().to_string()))
            }
        }

        diff.add_tx(tx.clone())?;
        debug!(tx_id = %tx_id, "Executed decision transaction");
        Ok(tx_id)
    }

    /// Execute a proposal-style transaction on top of `parent`.
    #[instrument(skip(self, parent, tx), fields(kind = tx.unsigned.kind()))]
    pub fn execute_proposal(
        &self,
        parent: Arc<dyn ChainView>,
        tx: &Tx,
    ) -> ExecutorResult<ProposalOutcome> {
        if !tx.unsigned.is_proposal_style() {
            return Err(ExecutorError::WrongBlockType(format!(
                "{} belongs in a standard block",
                tx.unsigned.kind()
            )));
        }
        tx.syntactic_verify(&self.config.tx_context())?;
        let tx_id = tx.id()?;

        let outcome = ProposalOutcome {
            on_commit: Diff::new(parent.clone()),
            on_abort: Diff::new(parent),
        };
        match &tx.unsigned {
            UnsignedTx::AdvanceTime { time } => {
                self.advance_time(&outcome.on_commit, &tx_id, *time)?
            }
            UnsignedTx::RewardValidator { staker_tx_id } => {
                self.reward_validator(&outcome, &tx_id, tx, staker_tx_id)?
            }
            _ => return Err(ExecutorError::WrongBlockType(tx.unsigned.kind().to_string())),
        }

        outcome.on_commit.add_tx(tx.clone())?;
        outcome.on_abort.add_tx(tx.clone())?;
        debug!(tx_id = %tx_id, "Executed proposal transaction");
        Ok(outcome)
    }

    /// Check inputs, credentials, value flow and auths of a user transaction.
    fn check_spend(
        &self,
        diff: &Diff,
        tx_id: &Id,
        tx: &Tx,
        common: &CommonFields,
        allowed_lock: LockState,
        fee: u64,
    ) -> ExecutorResult<SpendSummary> {
        let summary = verify_spend(
            diff,
            self.verifier.as_ref(),
            tx_id,
            common,
            &tx.creds,
            allowed_lock,
            fee,
            &self.config.fee_asset_id,
        )?;
        verify_auths(diff, self.verifier.as_ref(), &tx.unsigned, &tx.creds, tx_id)?;
        Ok(summary)
    }

    /// Consume the inputs, produce the outputs and burn the fee.
    fn apply_spend(
        &self,
        diff: &Diff,
        tx_id: &Id,
        common: &CommonFields,
        fee: u64,
    ) -> ExecutorResult<()> {
        consume_inputs(diff, &common.ins)?;
        produce_outputs(diff, tx_id, &common.outs)?;
        burn_fee(diff, fee)
    }
}

/// Add `amount` to the claimable rewards of `owner_id`.
fn credit_claimable(chain: &dyn Chain, owner_id: Id, amount: u64) -> ExecutorResult<()> {
    if amount == 0 {
        return Ok(());
    }
    let total = chain
        .claimable(&owner_id)?
        .checked_add(amount)
        .ok_or(ExecutorError::Overflow)?;
    chain.set_claimable(owner_id, total)?;
    Ok(())
}
