//! DAC proposals and vote tallying.
//!
//! A [`Proposal`] is what a proposer submits; a [`ProposalState`] is what the
//! chain keeps while the proposal is active. Admin proposals wrap another
//! proposal together with the chosen option and skip voting entirely.
//!
//! Tally rules:
//! - a proposal can finish early once every allowed voter has voted, or the
//!   leading option holds more than half of all allowed votes and leads the
//!   runner-up by more than the votes still outstanding;
//! - a proposal succeeds when more than half of the allowed voters took part
//!   and a single option holds more than half of the votes cast.

use crate::ids::ShortId;
use crate::{TypesError, TypesResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Maximum number of options of a base fee proposal.
pub const MAX_BASE_FEE_OPTIONS: usize = 3;

/// Option index meaning "accept" for membership proposals.
pub const OPTION_ACCEPT: u32 = 0;
/// Option index meaning "reject" for membership proposals.
pub const OPTION_REJECT: u32 = 1;

/// A governance proposal.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum Proposal {
    /// Change the network base fee to one of `options`.
    BaseFee { start: u64, end: u64, options: Vec<u64> },
    /// Admit `applicant` to the consortium.
    AddMember { start: u64, end: u64, applicant: ShortId },
    /// Remove `member` from the consortium.
    ExcludeMember { start: u64, end: u64, member: ShortId },
    /// Apply `option_index` of the wrapped proposal without voting.
    Admin { option_index: u32, proposal: Box<Proposal> },
}

/// What a finished proposal does to the chain.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum ProposalEffect {
    SetBaseFee(u64),
    AddMember(ShortId),
    ExcludeMember(ShortId),
    /// Rejected option or failed vote.
    None,
}

impl Proposal {
    pub fn start_time(&self) -> u64 {
        match self {
            Proposal::BaseFee { start, .. }
            | Proposal::AddMember { start, .. }
            | Proposal::ExcludeMember { start, .. } => *start,
            Proposal::Admin { proposal, .. } => proposal.start_time(),
        }
    }

    pub fn end_time(&self) -> u64 {
        match self {
            Proposal::BaseFee { end, .. }
            | Proposal::AddMember { end, .. }
            | Proposal::ExcludeMember { end, .. } => *end,
            Proposal::Admin { proposal, .. } => proposal.end_time(),
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Proposal::Admin { .. })
    }

    /// The proposal voted on, looking through an admin wrapper.
    pub fn inner(&self) -> &Proposal {
        match self {
            Proposal::Admin { proposal, .. } => proposal.inner(),
            other => other,
        }
    }

    /// Effects of each option, in option order.
    pub fn option_effects(&self) -> Vec<ProposalEffect> {
        match self {
            Proposal::BaseFee { options, .. } => {
                options.iter().map(|fee| ProposalEffect::SetBaseFee(*fee)).collect()
            }
            Proposal::AddMember { applicant, .. } => {
                vec![ProposalEffect::AddMember(*applicant), ProposalEffect::None]
            }
            Proposal::ExcludeMember { member, .. } => {
                vec![ProposalEffect::ExcludeMember(*member), ProposalEffect::None]
            }
            Proposal::Admin { proposal, .. } => proposal.option_effects(),
        }
    }

    /// Member targeted by an exclusion, looking through an admin wrapper.
    pub fn excluded_member(&self) -> Option<ShortId> {
        match self.inner() {
            Proposal::ExcludeMember { member, .. } => Some(*member),
            _ => None,
        }
    }

    /// Structural checks.
    pub fn verify(&self) -> TypesResult<()> {
        if self.start_time() >= self.end_time() {
            return Err(TypesError::InvalidProposal(format!(
                "start {} not before end {}",
                self.start_time(),
                self.end_time()
            )));
        }
        match self {
            Proposal::BaseFee { options, .. } => {
                if options.is_empty() || options.len() > MAX_BASE_FEE_OPTIONS {
                    return Err(TypesError::InvalidProposal(format!(
                        "base fee proposal needs 1 to {} options, got {}",
                        MAX_BASE_FEE_OPTIONS,
                        options.len()
                    )));
                }
                if options.contains(&0) {
                    return Err(TypesError::InvalidProposal("zero fee option".to_string()));
                }
                let unique: BTreeSet<_> = options.iter().collect();
                if unique.len() != options.len() {
                    return Err(TypesError::InvalidProposal(
                        "duplicate fee options".to_string(),
                    ));
                }
                Ok(())
            }
            Proposal::AddMember { applicant, .. } if applicant.is_empty() => Err(
                TypesError::InvalidProposal("empty applicant address".to_string()),
            ),
            Proposal::ExcludeMember { member, .. } if member.is_empty() => Err(
                TypesError::InvalidProposal("empty member address".to_string()),
            ),
            Proposal::AddMember { .. } | Proposal::ExcludeMember { .. } => Ok(()),
            Proposal::Admin {
                option_index,
                proposal,
            } => {
                if proposal.is_admin() {
                    return Err(TypesError::InvalidProposal(
                        "admin proposal wraps an admin proposal".to_string(),
                    ));
                }
                proposal.verify()?;
                let options = proposal.option_effects().len();
                if *option_index as usize >= options {
                    return Err(TypesError::InvalidVoteOption {
                        index: *option_index,
                        options,
                    });
                }
                Ok(())
            }
        }
    }
}

/// One option of an active proposal and the votes it collected.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct VoteOption {
    pub effect: ProposalEffect,
    pub weight: u32,
}

/// An active proposal as stored by the chain.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct ProposalState {
    /// The proposal voted on (never an admin wrapper).
    pub proposal: Proposal,
    pub proposer: ShortId,
    pub start: u64,
    pub end: u64,
    pub options: Vec<VoteOption>,
    /// Voters allowed at creation; zero for admin proposals.
    pub total_allowed_voters: u32,
    pub voters: BTreeSet<ShortId>,
    /// Option chosen by an admin proposal.
    pub admin_option: Option<u32>,
}

impl ProposalState {
    /// Fresh state for a just-added proposal.
    pub fn new(proposal: &Proposal, proposer: ShortId, total_allowed_voters: u32) -> Self {
        let options = proposal
            .option_effects()
            .into_iter()
            .map(|effect| VoteOption { effect, weight: 0 })
            .collect();
        let admin_option = match proposal {
            Proposal::Admin { option_index, .. } => Some(*option_index),
            _ => None,
        };
        Self {
            proposal: proposal.inner().clone(),
            proposer,
            start: proposal.start_time(),
            end: proposal.end_time(),
            options,
            total_allowed_voters: if admin_option.is_some() {
                0
            } else {
                total_allowed_voters
            },
            voters: BTreeSet::new(),
            admin_option,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.admin_option.is_some()
    }

    /// True if `time` lies inside the voting window.
    pub fn is_active_at(&self, time: u64) -> bool {
        self.start <= time && time < self.end
    }

    /// New state with `voter`'s vote for `option_index` counted.
    pub fn add_vote(&self, voter: ShortId, option_index: u32) -> TypesResult<ProposalState> {
        if self.is_admin() {
            return Err(TypesError::VotingNotAllowed);
        }
        if self.voters.contains(&voter) {
            return Err(TypesError::AlreadyVoted(voter));
        }
        if option_index as usize >= self.options.len() {
            return Err(TypesError::InvalidVoteOption {
                index: option_index,
                options: self.options.len(),
            });
        }
        if self.votes_cast() >= self.total_allowed_voters {
            return Err(TypesError::VotingNotAllowed);
        }
        let mut next = self.clone();
        next.options[option_index as usize].weight += 1;
        next.voters.insert(voter);
        Ok(next)
    }

    pub fn votes_cast(&self) -> u32 {
        self.voters.len() as u32
    }

    /// Index and weight of the single option with the most votes, `None` on a
    /// tie or when nobody voted.
    pub fn most_voted(&self) -> Option<(u32, u32)> {
        let mut best: Option<(u32, u32)> = None;
        let mut tied = false;
        for (index, option) in self.options.iter().enumerate() {
            match best {
                Some((_, weight)) if option.weight < weight => {}
                Some((_, weight)) if option.weight == weight => tied = true,
                _ => {
                    best = Some((index as u32, option.weight));
                    tied = false;
                }
            }
        }
        match best {
            Some((_, 0)) | None => None,
            Some(_) if tied => None,
            best => best,
        }
    }

    fn leader_and_runner_up(&self) -> (u32, u32) {
        let mut weights: Vec<u32> = self.options.iter().map(|o| o.weight).collect();
        weights.sort_unstable_by(|a, b| b.cmp(a));
        (
            weights.first().copied().unwrap_or(0),
            weights.get(1).copied().unwrap_or(0),
        )
    }

    /// True once the outcome can no longer change.
    pub fn can_finish_early(&self) -> bool {
        if self.is_admin() {
            return true;
        }
        let cast = self.votes_cast();
        if cast >= self.total_allowed_voters {
            return true;
        }
        let outstanding = self.total_allowed_voters - cast;
        let (leader, runner_up) = self.leader_and_runner_up();
        2 * u64::from(leader) > u64::from(self.total_allowed_voters)
            && u64::from(leader) > u64::from(runner_up) + u64::from(outstanding)
    }

    /// True if the proposal has a winning option.
    pub fn is_successful(&self) -> bool {
        if self.is_admin() {
            return true;
        }
        let cast = u64::from(self.votes_cast());
        match self.most_voted() {
            Some((_, weight)) => {
                2 * cast > u64::from(self.total_allowed_voters) && 2 * u64::from(weight) > cast
            }
            None => false,
        }
    }

    /// Index of the winning option, if the proposal succeeded.
    pub fn winning_option(&self) -> Option<u32> {
        if let Some(option) = self.admin_option {
            return Some(option);
        }
        if !self.is_successful() {
            return None;
        }
        self.most_voted().map(|(index, _)| index)
    }

    /// Effect to apply when the proposal finishes.
    pub fn effect(&self) -> ProposalEffect {
        self.winning_option()
            .and_then(|index| self.options.get(index as usize))
            .map(|option| option.effect)
            .unwrap_or(ProposalEffect::None)
    }
}
