//! Governance transactions.

use super::Executor;
use crate::builder::build_finish_proposals_tx;
use crate::utxo::release_locks;
use crate::{ExecutorError, ExecutorResult};
use camino_state::queries::allowed_voters;
use camino_state::{Chain, ChainView, Diff, OptionalExt};
use camino_types::{
    AddressState, CommonFields, Id, LockState, Proposal, ProposalEffect, ProposalState, ShortId,
    Tx, PRIMARY_NETWORK_ID,
};
use tracing::info;

impl Executor {
    pub(super) fn add_proposal(
        &self,
        diff: &Diff,
        tx_id: &Id,
        tx: &Tx,
        common: &CommonFields,
        proposal: &Proposal,
        proposer: &ShortId,
    ) -> ExecutorResult<()> {
        let roles = diff.address_state(proposer)?;
        match proposal {
            Proposal::Admin { .. } => {
                if !roles.contains(AddressState::ROLE_CONSORTIUM_ADMIN_PROPOSER) {
                    return Err(ExecutorError::Unauthorized(format!(
                        "{} may not make admin proposals",
                        proposer
                    )));
                }
            }
            Proposal::BaseFee { .. } => {
                if !roles.contains(AddressState::ROLE_FEE_PROPOSER) {
                    return Err(ExecutorError::Unauthorized(format!(
                        "{} may not propose base fees",
                        proposer
                    )));
                }
            }
            Proposal::AddMember { .. } | Proposal::ExcludeMember { .. } => {
                if !roles.contains(AddressState::CONSORTIUM) {
                    return Err(ExecutorError::NotConsortiumMember(*proposer));
                }
            }
        }
        if !proposal.is_admin() {
            self.check_voting_window(diff, proposal)?;
        }
        check_target(diff, proposal.inner(), proposer)?;

        let total_allowed_voters = if proposal.is_admin() {
            0
        } else {
            let voters = allowed_voters(diff)?.len() as u32;
            if voters == 0 {
                return Err(ExecutorError::InvalidProposal(
                    "nobody is allowed to vote".to_string(),
                ));
            }
            voters
        };

        let fee = diff.base_fee();
        let spent = self.check_spend(diff, tx_id, tx, common, LockState::BONDED, fee)?;
        if spent.newly_locked != self.config.dac.proposal_bond_amount {
            return Err(ExecutorError::WrongBondAmount {
                expected: self.config.dac.proposal_bond_amount,
                actual: spent.newly_locked,
            });
        }

        self.apply_spend(diff, tx_id, common, fee)?;
        diff.add_proposal(
            *tx_id,
            ProposalState::new(proposal, *proposer, total_allowed_voters),
        )?;
        if proposal.is_admin() {
            diff.add_proposal_id_to_finish(*tx_id)?;
        }
        info!(
            proposal = %tx_id,
            %proposer,
            admin = proposal.is_admin(),
            voters = total_allowed_voters,
            "Added proposal"
        );
        Ok(())
    }

    fn check_voting_window(&self, diff: &Diff, proposal: &Proposal) -> ExecutorResult<()> {
        let (start, end) = (proposal.start_time(), proposal.end_time());
        if start < diff.timestamp() {
            return Err(ExecutorError::InvalidProposal(format!(
                "starts at {}, before chain time {}",
                start,
                diff.timestamp()
            )));
        }
        let duration = end.saturating_sub(start);
        let dac = &self.config.dac;
        if duration < dac.min_proposal_duration || duration > dac.max_proposal_duration {
            return Err(ExecutorError::InvalidProposal(format!(
                "duration {} outside [{}, {}]",
                duration, dac.min_proposal_duration, dac.max_proposal_duration
            )));
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    pub(super) fn add_vote(
        &self,
        diff: &Diff,
        tx_id: &Id,
        tx: &Tx,
        common: &CommonFields,
        proposal_id: &Id,
        option_index: u32,
        voter: &ShortId,
    ) -> ExecutorResult<()> {
        let proposal = diff.get_proposal(proposal_id)?;
        if !proposal.is_active_at(diff.timestamp())
            || diff.proposal_ids_to_finish()?.contains(proposal_id)
        {
            return Err(ExecutorError::ProposalNotActive(*proposal_id));
        }
        if !allowed_voters(diff)?.contains(voter) {
            return Err(ExecutorError::NotAllowedToVote(*voter));
        }
        let updated = proposal
            .add_vote(*voter, option_index)
            .map_err(ExecutorError::InvalidVote)?;

        let fee = diff.base_fee();
        self.check_spend(diff, tx_id, tx, common, LockState::UNLOCKED, fee)?;

        self.apply_spend(diff, tx_id, common, fee)?;
        let finish_early = updated.can_finish_early();
        diff.modify_proposal(*proposal_id, updated)?;
        if finish_early {
            diff.add_proposal_id_to_finish(*proposal_id)?;
        }
        info!(proposal = %proposal_id, %voter, option = option_index, finish_early, "Added vote");
        Ok(())
    }

    pub(super) fn finish_proposals(
        &self,
        diff: &Diff,
        tx_id: &Id,
        tx: &Tx,
        early_finished: &[Id],
        expired: &[Id],
    ) -> ExecutorResult<()> {
        let expected = build_finish_proposals_tx(diff)?;
        if expected.as_ref() != Some(&tx.unsigned) {
            return Err(ExecutorError::UnexpectedSystemTx {
                expected: format!("{:?}", expected),
                actual: format!("{:?}", tx.unsigned),
            });
        }

        let mut next_index = 0;
        for proposal_id in early_finished.iter().chain(expired) {
            let proposal = diff.get_proposal(proposal_id)?;
            release_locks(diff, proposal_id, LockState::BONDED, tx_id, &mut next_index)?;
            let effect = proposal.effect();
            apply_effect(diff, &effect)?;
            diff.remove_proposal(proposal_id)?;
            info!(proposal = %proposal_id, ?effect, "Finished proposal");
        }
        Ok(())
    }
}

/// Checks on the subject of a proposal, shared by admin and voted proposals.
fn check_target(diff: &Diff, proposal: &Proposal, proposer: &ShortId) -> ExecutorResult<()> {
    match proposal {
        Proposal::AddMember { applicant, .. } => {
            let state = diff.address_state(applicant)?;
            if state.contains(AddressState::CONSORTIUM) {
                return Err(ExecutorError::InvalidProposal(format!(
                    "{} is already a member",
                    applicant
                )));
            }
            if !state.contains(AddressState::KYC_VERIFIED) {
                return Err(ExecutorError::InvalidProposal(format!(
                    "{} is not KYC verified",
                    applicant
                )));
            }
        }
        Proposal::ExcludeMember { member, .. } => {
            if !diff
                .address_state(member)?
                .contains(AddressState::CONSORTIUM)
            {
                return Err(ExecutorError::NotConsortiumMember(*member));
            }
            if member == proposer {
                return Err(ExecutorError::InvalidProposal(
                    "members cannot propose their own exclusion".to_string(),
                ));
            }
            for (_, active_id) in diff.proposal_expiry_schedule()? {
                let active = diff.get_proposal(&active_id)?;
                if active.proposal.excluded_member() == Some(*member) {
                    return Err(ExecutorError::ExclusionAlreadyActive(*member));
                }
            }
        }
        Proposal::BaseFee { .. } | Proposal::Admin { .. } => {}
    }
    Ok(())
}

/// Apply the outcome of a finished proposal.
fn apply_effect(diff: &Diff, effect: &ProposalEffect) -> ExecutorResult<()> {
    match effect {
        ProposalEffect::SetBaseFee(fee) => diff.set_base_fee(*fee)?,
        ProposalEffect::AddMember(applicant) => {
            let state = diff.address_state(applicant)?;
            diff.set_address_state(*applicant, state.with(AddressState::CONSORTIUM))?;
        }
        ProposalEffect::ExcludeMember(member) => {
            let state = diff.address_state(member)?;
            diff.set_address_state(*member, state.without(AddressState::CONSORTIUM))?;
            if let Some(node_id) = diff.member_node(member)? {
                diff.remove_node_owner(&node_id)?;
                if let Some(staker) = diff
                    .get_current_staker(&PRIMARY_NETWORK_ID, &node_id)
                    .optional()?
                {
                    diff.delete_current_staker(&staker)?;
                    diff.put_deferred_staker(staker)?;
                }
                if let Some(staker) = diff
                    .get_pending_staker(&PRIMARY_NETWORK_ID, &node_id)
                    .optional()?
                {
                    diff.delete_pending_staker(&staker)?;
                    diff.put_deferred_staker(staker)?;
                }
            }
        }
        ProposalEffect::None => {}
    }
    Ok(())
}
