//! Build-and-sign helpers for user transactions.
//!
//! Each helper selects inputs from the keychain's UTXOs, fills in the
//! payload, resolves the auth requirements of the transaction kind against
//! chain state and signs everything with keychain keys.

use crate::spend::{select, Spend, SpendRequest};
use crate::{Keychain, WalletError, WalletResult};
use camino_executor::Config;
use camino_state::ChainView;
use camino_types::{
    Auth, CommonFields, DepositOffer, Id, LockState, NodeId, OutputOwners, Proposal, ShortId,
    Tx, UnsignedTx, Validator,
};
use tracing::debug;

/// Builds signed transactions paid from keychain funds.
pub struct TxBuilder<'a> {
    view: &'a dyn ChainView,
    keychain: &'a Keychain,
    config: &'a Config,
    change: Option<OutputOwners>,
    memo: Vec<u8>,
}

impl<'a> TxBuilder<'a> {
    pub fn new(view: &'a dyn ChainView, keychain: &'a Keychain, config: &'a Config) -> Self {
        Self {
            view,
            keychain,
            config,
            change: None,
            memo: Vec::new(),
        }
    }

    /// Owners receiving change and newly locked funds; defaults to the
    /// first keychain address.
    pub fn change_owner(mut self, owners: OutputOwners) -> Self {
        self.change = Some(owners);
        self
    }

    pub fn memo(mut self, memo: Vec<u8>) -> Self {
        self.memo = memo;
        self
    }

    fn change(&self) -> WalletResult<OutputOwners> {
        if let Some(owners) = &self.change {
            return Ok(owners.clone());
        }
        self.keychain
            .addresses()
            .first()
            .map(|address| OutputOwners::single(*address))
            .ok_or(WalletError::NoKeys)
    }

    /// Select inputs paying `fee` and locking `amount` with `lock` for the
    /// change owner.
    fn spend(&self, amount: u64, lock: LockState, fee: u64) -> WalletResult<Spend> {
        let change = self.change()?;
        self.spend_to(change, amount, lock, fee)
    }

    fn spend_to(&self, to: OutputOwners, amount: u64, lock: LockState, fee: u64) -> WalletResult<Spend> {
        let request = SpendRequest {
            asset_id: self.config.fee_asset_id,
            amount,
            lock,
            fee,
            to,
            change: self.change()?,
        };
        select(self.view, self.keychain, &request)
    }

    fn common(&self, spend: &Spend) -> CommonFields {
        CommonFields {
            network_id: self.config.network_id,
            blockchain_id: self.config.chain_id,
            ins: spend.ins.clone(),
            outs: spend.outs.clone(),
            memo: self.memo.clone(),
        }
    }

    /// Auth satisfying `owners` with keychain keys, and its signers.
    fn auth_for(&self, owners: &OutputOwners) -> WalletResult<(Auth, Vec<ShortId>)> {
        let sig_indices = self
            .keychain
            .match_owners(owners, self.view.timestamp())
            .ok_or_else(|| {
                WalletError::CannotSign(format!(
                    "{} of {} owners required",
                    owners.threshold,
                    owners.addrs.len()
                ))
            })?;
        let signers = sig_indices
            .iter()
            .map(|i| owners.addrs[*i as usize])
            .collect();
        Ok((Auth { sig_indices }, signers))
    }

    /// Auth of a single address held by the keychain.
    fn address_auth(&self, address: &ShortId) -> WalletResult<(Auth, Vec<ShortId>)> {
        if !self.keychain.contains(address) {
            return Err(WalletError::KeyNotFound(*address));
        }
        Ok((Auth::single(), vec![*address]))
    }

    fn subnet_auth(&self, subnet_id: &Id) -> WalletResult<(Auth, Vec<ShortId>)> {
        let owners = self.view.get_subnet_owner(subnet_id)?;
        self.auth_for(&owners)
    }

    /// Sign with one credential per input, then one per extra signer group.
    fn sign(
        &self,
        unsigned: UnsignedTx,
        spend: Spend,
        extra: Vec<Vec<ShortId>>,
    ) -> WalletResult<Tx> {
        let tx_id = unsigned.id()?;
        let creds = spend
            .signers
            .iter()
            .chain(extra.iter())
            .map(|signers| self.keychain.credential(signers, tx_id.as_bytes()))
            .collect::<WalletResult<Vec<_>>>()?;
        debug!(tx_id = %tx_id, kind = unsigned.kind(), creds = creds.len(), "Signed transaction");
        Ok(Tx { unsigned, creds })
    }

    /// Send `amount` unlocked to `to`.
    pub fn base(&self, to: OutputOwners, amount: u64) -> WalletResult<Tx> {
        let spend = self.spend_to(to, amount, LockState::UNLOCKED, self.view.base_fee())?;
        let unsigned = UnsignedTx::Base {
            common: self.common(&spend),
        };
        self.sign(unsigned, spend, Vec::new())
    }

    pub fn create_subnet(&self, owner: OutputOwners) -> WalletResult<Tx> {
        let spend = self.spend(0, LockState::UNLOCKED, self.config.create_subnet_tx_fee)?;
        let unsigned = UnsignedTx::CreateSubnet {
            common: self.common(&spend),
            owner,
        };
        self.sign(unsigned, spend, Vec::new())
    }

    pub fn create_chain(
        &self,
        subnet_id: Id,
        chain_name: &str,
        vm_id: Id,
        genesis_data: Vec<u8>,
    ) -> WalletResult<Tx> {
        let (subnet_auth, signers) = self.subnet_auth(&subnet_id)?;
        let spend = self.spend(0, LockState::UNLOCKED, self.config.create_blockchain_tx_fee)?;
        let unsigned = UnsignedTx::CreateChain {
            common: self.common(&spend),
            subnet_id,
            chain_name: chain_name.to_string(),
            vm_id,
            genesis_data,
            subnet_auth,
        };
        self.sign(unsigned, spend, vec![signers])
    }

    /// Bond `validator.weight` and validate the primary network. The
    /// keychain must hold the key of the node's registered owner.
    pub fn add_validator(
        &self,
        validator: Validator,
        reward_owner: OutputOwners,
    ) -> WalletResult<Tx> {
        let node_owner = self.node_owner(&validator.node_id)?;
        let (node_owner_auth, signers) = self.address_auth(&node_owner)?;
        let spend = self.spend(validator.weight, LockState::BONDED, self.view.base_fee())?;
        let unsigned = UnsignedTx::AddValidator {
            common: self.common(&spend),
            validator,
            reward_owner,
            node_owner_auth,
        };
        self.sign(unsigned, spend, vec![signers])
    }

    fn node_owner(&self, node_id: &NodeId) -> WalletResult<ShortId> {
        self.view.node_owner(node_id)?.ok_or_else(|| {
            WalletError::CannotSign(format!("node {} has no registered owner", node_id))
        })
    }

    pub fn add_subnet_validator(&self, validator: Validator, subnet_id: Id) -> WalletResult<Tx> {
        let (subnet_auth, signers) = self.subnet_auth(&subnet_id)?;
        let spend = self.spend(0, LockState::UNLOCKED, self.view.base_fee())?;
        let unsigned = UnsignedTx::AddSubnetValidator {
            common: self.common(&spend),
            validator,
            subnet_id,
            subnet_auth,
        };
        self.sign(unsigned, spend, vec![signers])
    }

    pub fn add_deposit_offer(&self, offer: DepositOffer, creator: ShortId) -> WalletResult<Tx> {
        let (creator_auth, signers) = self.address_auth(&creator)?;
        let spend = self.spend(0, LockState::UNLOCKED, self.view.base_fee())?;
        let unsigned = UnsignedTx::AddDepositOffer {
            common: self.common(&spend),
            offer,
            offer_creator: creator,
            creator_auth,
        };
        self.sign(unsigned, spend, vec![signers])
    }

    /// Deposit `amount` under `offer_id` for `duration` seconds.
    pub fn deposit(
        &self,
        offer_id: Id,
        amount: u64,
        duration: u64,
        reward_owner: OutputOwners,
    ) -> WalletResult<Tx> {
        let spend = self.spend(amount, LockState::DEPOSITED, self.view.base_fee())?;
        let unsigned = UnsignedTx::Deposit {
            common: self.common(&spend),
            offer_id,
            duration,
            reward_owner,
        };
        self.sign(unsigned, spend, Vec::new())
    }

    /// Claim `amount` of the rewards accrued by `owner` into `claim_to`.
    pub fn claim(
        &self,
        owner: OutputOwners,
        amount: u64,
        claim_to: OutputOwners,
    ) -> WalletResult<Tx> {
        let (owner_auth, signers) = self.auth_for(&owner)?;
        let spend = self.spend(0, LockState::UNLOCKED, self.view.base_fee())?;
        let unsigned = UnsignedTx::Claim {
            common: self.common(&spend),
            owner,
            amount,
            owner_auth,
            claim_to,
        };
        self.sign(unsigned, spend, vec![signers])
    }

    /// Link `new_node_id` to `node_owner`, replacing `old_node_id` unless it
    /// is empty.
    pub fn register_node(
        &self,
        old_node_id: NodeId,
        new_node_id: NodeId,
        node_owner: ShortId,
    ) -> WalletResult<Tx> {
        let (owner_auth, signers) = self.address_auth(&node_owner)?;
        let spend = self.spend(0, LockState::UNLOCKED, self.view.base_fee())?;
        let unsigned = UnsignedTx::RegisterNode {
            common: self.common(&spend),
            old_node_id,
            new_node_id,
            node_owner,
            owner_auth,
        };
        self.sign(unsigned, spend, vec![signers])
    }

    pub fn address_state(
        &self,
        address: ShortId,
        flag_bit: u8,
        remove: bool,
        executor: ShortId,
    ) -> WalletResult<Tx> {
        let (executor_auth, signers) = self.address_auth(&executor)?;
        let spend = self.spend(0, LockState::UNLOCKED, self.view.base_fee())?;
        let unsigned = UnsignedTx::AddressState {
            common: self.common(&spend),
            address,
            flag_bit,
            remove,
            executor,
            executor_auth,
        };
        self.sign(unsigned, spend, vec![signers])
    }

    /// Submit `proposal`, bonding the proposal bond.
    pub fn add_proposal(&self, proposal: Proposal, proposer: ShortId) -> WalletResult<Tx> {
        let (proposer_auth, signers) = self.address_auth(&proposer)?;
        let spend = self.spend(
            self.config.dac.proposal_bond_amount,
            LockState::BONDED,
            self.view.base_fee(),
        )?;
        let unsigned = UnsignedTx::AddProposal {
            common: self.common(&spend),
            proposal,
            proposer,
            proposer_auth,
        };
        self.sign(unsigned, spend, vec![signers])
    }

    pub fn add_vote(&self, proposal_id: Id, option_index: u32, voter: ShortId) -> WalletResult<Tx> {
        let (voter_auth, signers) = self.address_auth(&voter)?;
        let spend = self.spend(0, LockState::UNLOCKED, self.view.base_fee())?;
        let unsigned = UnsignedTx::AddVote {
            common: self.common(&spend),
            proposal_id,
            option_index,
            voter,
            voter_auth,
        };
        self.sign(unsigned, spend, vec![signers])
    }
}
