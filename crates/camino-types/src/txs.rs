//! Platform chain transactions.
//!
//! Every user transaction carries [`CommonFields`]; system transactions
//! (time advancement, validator rewards, proposal finishing) are built by the
//! block builder and carry neither inputs nor credentials.
//!
//! Credentials are laid out as one per input followed by one per auth
//! requirement, in the order returned by [`UnsignedTx::auths`].

use crate::address_state::AddressState;
use crate::codec;
use crate::components::{
    inputs_sorted_and_unique, outputs_sorted, Credential, OutputOwners, TransferableInput,
    TransferableOutput, MAX_MEMO_SIZE,
};
use crate::deposit::DepositOffer;
use crate::ids::{Id, NodeId, ShortId, PRIMARY_NETWORK_ID};
use crate::proposal::Proposal;
use crate::{TypesError, TypesResult};
use serde::{Deserialize, Serialize};

/// Maximum length of a chain name.
pub const MAX_CHAIN_NAME_LENGTH: usize = 128;

/// Chain a transaction must target.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct TxContext {
    pub network_id: u32,
    pub chain_id: Id,
}

/// Fields shared by all user transactions.
#[derive(Clone, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
pub struct CommonFields {
    pub network_id: u32,
    pub blockchain_id: Id,
    /// Sorted by UTXO ID, unique.
    pub ins: Vec<TransferableInput>,
    /// Sorted by encoding.
    pub outs: Vec<TransferableOutput>,
    pub memo: Vec<u8>,
}

impl CommonFields {
    /// Structural checks.
    pub fn verify(&self, ctx: &TxContext) -> TypesResult<()> {
        if self.network_id != ctx.network_id {
            return Err(TypesError::WrongNetworkId {
                expected: ctx.network_id,
                actual: self.network_id,
            });
        }
        if self.blockchain_id != ctx.chain_id {
            return Err(TypesError::WrongChainId {
                expected: ctx.chain_id.to_string(),
                actual: self.blockchain_id.to_string(),
            });
        }
        if self.memo.len() > MAX_MEMO_SIZE {
            return Err(TypesError::MemoTooLarge {
                size: self.memo.len(),
                max: MAX_MEMO_SIZE,
            });
        }
        for input in &self.ins {
            input.input.verify()?;
        }
        for output in &self.outs {
            output.out.verify()?;
        }
        if !inputs_sorted_and_unique(&self.ins) {
            return Err(TypesError::InputsNotSortedUnique);
        }
        if !outputs_sorted(&self.outs)? {
            return Err(TypesError::OutputsNotSorted);
        }
        Ok(())
    }
}

/// Signature indices into an owner set.
#[derive(Clone, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
pub struct Auth {
    pub sig_indices: Vec<u32>,
}

impl Auth {
    /// Auth of a single-address owner.
    pub fn single() -> Self {
        Self {
            sig_indices: vec![0],
        }
    }
}

/// Whose signatures an [`Auth`] must carry.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum AuthTarget {
    /// Owners of a subnet.
    Subnet(Id),
    /// A single address.
    Address(ShortId),
    /// The address that registered a node.
    NodeOwner(NodeId),
}

/// Validation period and weight.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct Validator {
    pub node_id: NodeId,
    pub start: u64,
    pub end: u64,
    pub weight: u64,
}

impl Validator {
    pub fn verify(&self) -> TypesResult<()> {
        if self.node_id.is_empty() {
            return Err(TypesError::InvalidValidator("empty node ID".to_string()));
        }
        if self.weight == 0 {
            return Err(TypesError::InvalidValidator("zero weight".to_string()));
        }
        if self.start >= self.end {
            return Err(TypesError::InvalidValidator(format!(
                "start {} not before end {}",
                self.start, self.end
            )));
        }
        Ok(())
    }

    pub fn duration(&self) -> u64 {
        self.end - self.start
    }

    /// True if `self` lies within `other`.
    pub fn bounded_by(&self, other_start: u64, other_end: u64) -> bool {
        other_start <= self.start && self.end <= other_end
    }
}

/// Transaction payloads.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum UnsignedTx {
    /// Plain transfer.
    Base { common: CommonFields },
    /// Create a subnet owned by `owner`; its ID is the transaction ID.
    CreateSubnet {
        common: CommonFields,
        owner: OutputOwners,
    },
    /// Create a blockchain validated by `subnet_id`.
    CreateChain {
        common: CommonFields,
        subnet_id: Id,
        chain_name: String,
        vm_id: Id,
        genesis_data: Vec<u8>,
        subnet_auth: Auth,
    },
    /// Add a primary network validator, bonding `validator.weight`.
    AddValidator {
        common: CommonFields,
        validator: Validator,
        reward_owner: OutputOwners,
        node_owner_auth: Auth,
    },
    /// Add a subnet validator.
    AddSubnetValidator {
        common: CommonFields,
        validator: Validator,
        subnet_id: Id,
        subnet_auth: Auth,
    },
    /// Move chain time forward.
    AdvanceTime { time: u64 },
    /// Remove a validator whose end time was reached.
    RewardValidator { staker_tx_id: Id },
    /// Add a deposit offer; its ID is the transaction ID.
    AddDepositOffer {
        common: CommonFields,
        offer: DepositOffer,
        offer_creator: ShortId,
        creator_auth: Auth,
    },
    /// Deposit funds under an offer.
    Deposit {
        common: CommonFields,
        offer_id: Id,
        duration: u64,
        reward_owner: OutputOwners,
    },
    /// Claim accrued rewards of `owner` into a fresh output for `claim_to`.
    Claim {
        common: CommonFields,
        owner: OutputOwners,
        amount: u64,
        owner_auth: Auth,
        claim_to: OutputOwners,
    },
    /// Link a node to a consortium member, replacing `old_node_id` if set.
    RegisterNode {
        common: CommonFields,
        old_node_id: NodeId,
        new_node_id: NodeId,
        node_owner: ShortId,
        owner_auth: Auth,
    },
    /// Set or clear one flag of an address.
    AddressState {
        common: CommonFields,
        address: ShortId,
        flag_bit: u8,
        remove: bool,
        executor: ShortId,
        executor_auth: Auth,
    },
    /// Submit a proposal, bonding the proposal bond.
    AddProposal {
        common: CommonFields,
        proposal: Proposal,
        proposer: ShortId,
        proposer_auth: Auth,
    },
    /// Vote on an active proposal.
    AddVote {
        common: CommonFields,
        proposal_id: Id,
        option_index: u32,
        voter: ShortId,
        voter_auth: Auth,
    },
    /// Finish proposals that expired or can finish early.
    FinishProposals {
        early_finished_proposal_ids: Vec<Id>,
        expired_proposal_ids: Vec<Id>,
    },
}

impl UnsignedTx {
    /// Short name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            UnsignedTx::Base { .. } => "base",
            UnsignedTx::CreateSubnet { .. } => "create_subnet",
            UnsignedTx::CreateChain { .. } => "create_chain",
            UnsignedTx::AddValidator { .. } => "add_validator",
            UnsignedTx::AddSubnetValidator { .. } => "add_subnet_validator",
            UnsignedTx::AdvanceTime { .. } => "advance_time",
            UnsignedTx::RewardValidator { .. } => "reward_validator",
            UnsignedTx::AddDepositOffer { .. } => "add_deposit_offer",
            UnsignedTx::Deposit { .. } => "deposit",
            UnsignedTx::Claim { .. } => "claim",
            UnsignedTx::RegisterNode { .. } => "register_node",
            UnsignedTx::AddressState { .. } => "address_state",
            UnsignedTx::AddProposal { .. } => "add_proposal",
            UnsignedTx::AddVote { .. } => "add_vote",
            UnsignedTx::FinishProposals { .. } => "finish_proposals",
        }
    }

    /// Shared fields; `None` for system transactions.
    pub fn common(&self) -> Option<&CommonFields> {
        match self {
            UnsignedTx::Base { common }
            | UnsignedTx::CreateSubnet { common, .. }
            | UnsignedTx::CreateChain { common, .. }
            | UnsignedTx::AddValidator { common, .. }
            | UnsignedTx::AddSubnetValidator { common, .. }
            | UnsignedTx::AddDepositOffer { common, .. }
            | UnsignedTx::Deposit { common, .. }
            | UnsignedTx::Claim { common, .. }
            | UnsignedTx::RegisterNode { common, .. }
            | UnsignedTx::AddressState { common, .. }
            | UnsignedTx::AddProposal { common, .. }
            | UnsignedTx::AddVote { common, .. } => Some(common),
            UnsignedTx::AdvanceTime { .. }
            | UnsignedTx::RewardValidator { .. }
            | UnsignedTx::FinishProposals { .. } => None,
        }
    }

    /// Built by the block builder rather than submitted by users.
    pub fn is_system(&self) -> bool {
        self.common().is_none()
    }

    /// Executed with separate commit and abort outcomes.
    pub fn is_proposal_style(&self) -> bool {
        matches!(
            self,
            UnsignedTx::AdvanceTime { .. } | UnsignedTx::RewardValidator { .. }
        )
    }

    /// Auth requirements after the input credentials, in credential order.
    pub fn auths(&self) -> Vec<(AuthTarget, &Auth)> {
        match self {
            UnsignedTx::CreateChain {
                subnet_id,
                subnet_auth,
                ..
            }
            | UnsignedTx::AddSubnetValidator {
                subnet_id,
                subnet_auth,
                ..
            } => vec![(AuthTarget::Subnet(*subnet_id), subnet_auth)],
            UnsignedTx::AddValidator {
                validator,
                node_owner_auth,
                ..
            } => vec![(AuthTarget::NodeOwner(validator.node_id), node_owner_auth)],
            UnsignedTx::AddDepositOffer {
                offer_creator,
                creator_auth,
                ..
            } => vec![(AuthTarget::Address(*offer_creator), creator_auth)],
            UnsignedTx::RegisterNode {
                node_owner,
                owner_auth,
                ..
            } => vec![(AuthTarget::Address(*node_owner), owner_auth)],
            UnsignedTx::AddressState {
                executor,
                executor_auth,
                ..
            } => vec![(AuthTarget::Address(*executor), executor_auth)],
            UnsignedTx::AddProposal {
                proposer,
                proposer_auth,
                ..
            } => vec![(AuthTarget::Address(*proposer), proposer_auth)],
            UnsignedTx::AddVote {
                voter, voter_auth, ..
            } => vec![(AuthTarget::Address(*voter), voter_auth)],
            _ => Vec::new(),
        }
    }

    /// Number of credentials a signed transaction must carry.
    pub fn credential_count(&self) -> usize {
        let ins = self.common().map_or(0, |c| c.ins.len());
        // Claims carry one credential for the claimed owner set.
        let claim = usize::from(matches!(self, UnsignedTx::Claim { .. }));
        ins + self.auths().len() + claim
    }

    /// Codec bytes.
    pub fn bytes(&self) -> TypesResult<Vec<u8>> {
        codec::encode(self)
    }

    /// Transaction ID: hash of the codec bytes.
    pub fn id(&self) -> TypesResult<Id> {
        Ok(Id::hash_of(&self.bytes()?))
    }

    /// Structural checks independent of chain state.
    pub fn syntactic_verify(&self, ctx: &TxContext) -> TypesResult<()> {
        if let Some(common) = self.common() {
            common.verify(ctx)?;
        }
        match self {
            UnsignedTx::Base { common } => {
                if common.ins.is_empty() {
                    return Err(TypesError::InvalidTx("base tx without inputs".to_string()));
                }
                Ok(())
            }
            UnsignedTx::CreateSubnet { owner, .. } => owner.verify(),
            UnsignedTx::CreateChain {
                subnet_id,
                chain_name,
                vm_id,
                ..
            } => {
                if *subnet_id == PRIMARY_NETWORK_ID {
                    return Err(TypesError::InvalidTx(
                        "chains cannot be added to the primary network".to_string(),
                    ));
                }
                if chain_name.is_empty() || chain_name.len() > MAX_CHAIN_NAME_LENGTH {
                    return Err(TypesError::InvalidTx(format!(
                        "chain name length {} out of range",
                        chain_name.len()
                    )));
                }
                if !chain_name.chars().all(|c| c.is_ascii_alphanumeric() || c == ' ') {
                    return Err(TypesError::InvalidTx(
                        "chain name has illegal characters".to_string(),
                    ));
                }
                if vm_id.is_empty() {
                    return Err(TypesError::InvalidTx("empty VM ID".to_string()));
                }
                Ok(())
            }
            UnsignedTx::AddValidator {
                validator,
                reward_owner,
                ..
            } => {
                validator.verify()?;
                reward_owner.verify()
            }
            UnsignedTx::AddSubnetValidator {
                validator,
                subnet_id,
                ..
            } => {
                if *subnet_id == PRIMARY_NETWORK_ID {
                    return Err(TypesError::InvalidValidator(
                        "subnet validator of the primary network".to_string(),
                    ));
                }
                validator.verify()
            }
            UnsignedTx::AdvanceTime { .. } | UnsignedTx::RewardValidator { .. } => Ok(()),
            UnsignedTx::AddDepositOffer {
                offer,
                offer_creator,
                ..
            } => {
                if offer_creator.is_empty() {
                    return Err(TypesError::InvalidTx("empty offer creator".to_string()));
                }
                offer.verify()
            }
            UnsignedTx::Deposit {
                duration,
                reward_owner,
                ..
            } => {
                if *duration == 0 {
                    return Err(TypesError::InvalidTx("zero deposit duration".to_string()));
                }
                reward_owner.verify()
            }
            UnsignedTx::Claim {
                owner,
                amount,
                claim_to,
                ..
            } => {
                if *amount == 0 {
                    return Err(TypesError::ZeroAmount("claim"));
                }
                owner.verify()?;
                claim_to.verify()
            }
            UnsignedTx::RegisterNode {
                old_node_id,
                new_node_id,
                node_owner,
                ..
            } => {
                if old_node_id.is_empty() && new_node_id.is_empty() {
                    return Err(TypesError::InvalidTx(
                        "register node without node IDs".to_string(),
                    ));
                }
                if old_node_id == new_node_id {
                    return Err(TypesError::InvalidTx("old and new node are equal".to_string()));
                }
                if node_owner.is_empty() {
                    return Err(TypesError::InvalidTx("empty node owner".to_string()));
                }
                Ok(())
            }
            UnsignedTx::AddressState {
                address, flag_bit, ..
            } => {
                if address.is_empty() {
                    return Err(TypesError::InvalidTx("empty address".to_string()));
                }
                if AddressState::from_bit(*flag_bit).is_none() {
                    return Err(TypesError::InvalidTx(format!(
                        "unknown address state bit {flag_bit}"
                    )));
                }
                Ok(())
            }
            UnsignedTx::AddProposal { proposal, .. } => proposal.verify(),
            UnsignedTx::AddVote { proposal_id, .. } => {
                if proposal_id.is_empty() {
                    return Err(TypesError::InvalidTx("empty proposal ID".to_string()));
                }
                Ok(())
            }
            UnsignedTx::FinishProposals {
                early_finished_proposal_ids,
                expired_proposal_ids,
            } => {
                if early_finished_proposal_ids.is_empty() && expired_proposal_ids.is_empty() {
                    return Err(TypesError::InvalidTx(
                        "finish proposals tx without proposals".to_string(),
                    ));
                }
                let sorted = |ids: &[Id]| ids.windows(2).all(|w| w[0] < w[1]);
                if !sorted(early_finished_proposal_ids) || !sorted(expired_proposal_ids) {
                    return Err(TypesError::InvalidTx(
                        "proposal IDs not sorted and unique".to_string(),
                    ));
                }
                Ok(())
            }
        }
    }
}

/// A transaction with its credentials.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct Tx {
    pub unsigned: UnsignedTx,
    pub creds: Vec<Credential>,
}

impl Tx {
    /// Unsigned system transaction.
    pub fn system(unsigned: UnsignedTx) -> Self {
        Self {
            unsigned,
            creds: Vec::new(),
        }
    }

    /// ID of the unsigned payload.
    pub fn id(&self) -> TypesResult<Id> {
        self.unsigned.id()
    }

    /// Structural checks, including the credential count.
    pub fn syntactic_verify(&self, ctx: &TxContext) -> TypesResult<()> {
        self.unsigned.syntactic_verify(ctx)?;
        let expected = self.unsigned.credential_count();
        if self.creds.len() != expected {
            return Err(TypesError::WrongCredentialCount {
                expected,
                actual: self.creds.len(),
            });
        }
        Ok(())
    }
}
