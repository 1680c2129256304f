//! Decision transactions outside governance: transfers, subnets, chains,
//! validators, deposits, claims, node registration and address flags.

use super::Executor;
use crate::utxo::{credential, verify_owners};
use crate::{ExecutorError, ExecutorResult};
use camino_state::queries::find_staker;
use camino_state::{Chain, ChainView, Diff, OptionalExt};
use camino_types::staker::validator_reward;
use camino_types::{
    AddressState, CommonFields, Deposit, DepositOffer, Id, LockState, NodeId, Output,
    OutputOwners, ShortId, Staker, Tx, TypesError, UnsignedTx, Utxo, UtxoId, Validator,
    PRIMARY_NETWORK_ID,
};
use tracing::info;

impl Executor {
    pub(super) fn base(
        &self,
        diff: &Diff,
        tx_id: &Id,
        tx: &Tx,
        common: &CommonFields,
    ) -> ExecutorResult<()> {
        let fee = diff.base_fee();
        self.check_spend(diff, tx_id, tx, common, LockState::UNLOCKED, fee)?;
        self.apply_spend(diff, tx_id, common, fee)
    }

    pub(super) fn create_subnet(
        &self,
        diff: &Diff,
        tx_id: &Id,
        tx: &Tx,
        common: &CommonFields,
        owner: &OutputOwners,
    ) -> ExecutorResult<()> {
        let fee = self.config.create_subnet_tx_fee;
        self.check_spend(diff, tx_id, tx, common, LockState::UNLOCKED, fee)?;

        self.apply_spend(diff, tx_id, common, fee)?;
        diff.add_subnet(*tx_id, owner.clone())?;
        info!(subnet = %tx_id, "Created subnet");
        Ok(())
    }

    pub(super) fn create_chain(
        &self,
        diff: &Diff,
        tx_id: &Id,
        tx: &Tx,
        common: &CommonFields,
        subnet_id: &Id,
    ) -> ExecutorResult<()> {
        // Fails with SubnetNotFound before any signature work.
        diff.get_subnet_owner(subnet_id)?;
        let fee = self.config.create_blockchain_tx_fee;
        self.check_spend(diff, tx_id, tx, common, LockState::UNLOCKED, fee)?;

        self.apply_spend(diff, tx_id, common, fee)?;
        diff.add_chain(*tx_id, *subnet_id)?;
        info!(chain = %tx_id, subnet = %subnet_id, "Created chain");
        Ok(())
    }

    /// Validation window of a validator scheduled at chain time `now`.
    fn check_validator_start(&self, validator: &Validator, now: u64) -> ExecutorResult<()> {
        if validator.start <= now {
            return Err(ExecutorError::InvalidValidatorPeriod(format!(
                "start {} is not after chain time {}",
                validator.start, now
            )));
        }
        if validator.start > now.saturating_add(self.config.max_future_start_time) {
            return Err(ExecutorError::InvalidValidatorPeriod(format!(
                "start {} is too far in the future",
                validator.start
            )));
        }
        Ok(())
    }

    pub(super) fn add_validator(
        &self,
        diff: &Diff,
        tx_id: &Id,
        tx: &Tx,
        common: &CommonFields,
        validator: &Validator,
        reward_owner: &OutputOwners,
    ) -> ExecutorResult<()> {
        self.check_validator_start(validator, diff.timestamp())?;
        let duration = validator.duration();
        if duration < self.config.min_stake_duration || duration > self.config.max_stake_duration
        {
            return Err(ExecutorError::InvalidValidatorPeriod(format!(
                "duration {} outside [{}, {}]",
                duration, self.config.min_stake_duration, self.config.max_stake_duration
            )));
        }
        if validator.weight != self.config.validator_bond_amount {
            return Err(ExecutorError::WrongBondAmount {
                expected: self.config.validator_bond_amount,
                actual: validator.weight,
            });
        }

        let owner = diff
            .node_owner(&validator.node_id)?
            .ok_or(ExecutorError::NodeNotRegistered(validator.node_id))?;
        if !diff.address_state(&owner)?.contains(AddressState::CONSORTIUM) {
            return Err(ExecutorError::NotConsortiumMember(owner));
        }
        if find_staker(diff, &PRIMARY_NETWORK_ID, &validator.node_id)?.is_some() {
            return Err(ExecutorError::DuplicateValidator {
                subnet_id: PRIMARY_NETWORK_ID,
                node_id: validator.node_id,
            });
        }

        let fee = diff.base_fee();
        let spent = self.check_spend(diff, tx_id, tx, common, LockState::BONDED, fee)?;
        if spent.newly_locked != validator.weight {
            return Err(ExecutorError::WrongBondAmount {
                expected: validator.weight,
                actual: spent.newly_locked,
            });
        }

        self.apply_spend(diff, tx_id, common, fee)?;
        diff.put_pending_staker(Staker {
            tx_id: *tx_id,
            node_id: validator.node_id,
            subnet_id: PRIMARY_NETWORK_ID,
            weight: validator.weight,
            start_time: validator.start,
            end_time: validator.end,
            potential_reward: validator_reward(
                validator.weight,
                duration,
                self.config.validator_reward_rate_nominator,
            )
            .map_err(|_| ExecutorError::Overflow)?,
            reward_owner: reward_owner.clone(),
        })?;
        info!(node = %validator.node_id, start = validator.start, end = validator.end, "Added pending validator");
        Ok(())
    }

    pub(super) fn add_subnet_validator(
        &self,
        diff: &Diff,
        tx_id: &Id,
        tx: &Tx,
        common: &CommonFields,
        validator: &Validator,
        subnet_id: &Id,
    ) -> ExecutorResult<()> {
        diff.get_subnet_owner(subnet_id)?;
        self.check_validator_start(validator, diff.timestamp())?;

        if find_staker(diff, subnet_id, &validator.node_id)?.is_some() {
            return Err(ExecutorError::DuplicateValidator {
                subnet_id: *subnet_id,
                node_id: validator.node_id,
            });
        }
        let primary = diff
            .get_current_staker(&PRIMARY_NETWORK_ID, &validator.node_id)
            .optional()?
            .or(diff
                .get_pending_staker(&PRIMARY_NETWORK_ID, &validator.node_id)
                .optional()?)
            .ok_or_else(|| {
                ExecutorError::InvalidValidatorPeriod(format!(
                    "node {} does not validate the primary network",
                    validator.node_id
                ))
            })?;
        if !validator.bounded_by(primary.start_time, primary.end_time) {
            return Err(ExecutorError::InvalidValidatorPeriod(format!(
                "[{}, {}] is not within the primary network period [{}, {}]",
                validator.start, validator.end, primary.start_time, primary.end_time
            )));
        }

        let fee = diff.base_fee();
        self.check_spend(diff, tx_id, tx, common, LockState::UNLOCKED, fee)?;

        self.apply_spend(diff, tx_id, common, fee)?;
        diff.put_pending_staker(Staker {
            tx_id: *tx_id,
            node_id: validator.node_id,
            subnet_id: *subnet_id,
            weight: validator.weight,
            start_time: validator.start,
            end_time: validator.end,
            potential_reward: 0,
            reward_owner: OutputOwners::default(),
        })?;
        info!(node = %validator.node_id, subnet = %subnet_id, "Added pending subnet validator");
        Ok(())
    }

    pub(super) fn add_deposit_offer(
        &self,
        diff: &Diff,
        tx_id: &Id,
        tx: &Tx,
        common: &CommonFields,
        offer: &DepositOffer,
        offer_creator: &ShortId,
    ) -> ExecutorResult<()> {
        if !diff
            .address_state(offer_creator)?
            .contains(AddressState::ROLE_OFFERS_ADMIN)
        {
            return Err(ExecutorError::Unauthorized(format!(
                "{} may not add deposit offers",
                offer_creator
            )));
        }
        if offer.end <= diff.timestamp() {
            return Err(ExecutorError::InvalidDepositOffer(format!(
                "offer ends at {}, before chain time",
                offer.end
            )));
        }

        let fee = diff.base_fee();
        self.check_spend(diff, tx_id, tx, common, LockState::UNLOCKED, fee)?;

        self.apply_spend(diff, tx_id, common, fee)?;
        diff.set_deposit_offer(DepositOffer {
            id: *tx_id,
            deposited_amount: 0,
            ..offer.clone()
        })?;
        info!(offer = %tx_id, "Added deposit offer");
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    pub(super) fn deposit(
        &self,
        diff: &Diff,
        tx_id: &Id,
        tx: &Tx,
        common: &CommonFields,
        offer_id: &Id,
        duration: u64,
        reward_owner: &OutputOwners,
    ) -> ExecutorResult<()> {
        let now = diff.timestamp();
        let offer = diff.get_deposit_offer(offer_id)?;
        if !offer.is_enabled() {
            return Err(ExecutorError::InvalidDeposit(format!("offer {} is disabled", offer_id)));
        }
        if now < offer.start {
            return Err(ExecutorError::InvalidDeposit(format!(
                "offer {} starts at {}",
                offer_id, offer.start
            )));
        }
        if duration < offer.min_duration || duration > offer.max_duration {
            return Err(ExecutorError::InvalidDeposit(format!(
                "duration {} outside [{}, {}]",
                duration, offer.min_duration, offer.max_duration
            )));
        }
        if now.saturating_add(duration) > offer.end {
            return Err(ExecutorError::InvalidDeposit(format!(
                "deposit would end after the offer ends at {}",
                offer.end
            )));
        }

        let fee = diff.base_fee();
        let spent = self.check_spend(diff, tx_id, tx, common, LockState::DEPOSITED, fee)?;
        let amount = spent.newly_locked;
        if amount < offer.min_amount {
            return Err(ExecutorError::InvalidDeposit(format!(
                "amount {} below minimum {}",
                amount, offer.min_amount
            )));
        }
        if amount > offer.remaining_amount() {
            return Err(ExecutorError::InvalidDeposit(format!(
                "amount {} exceeds the {} left in offer {}",
                amount,
                offer.remaining_amount(),
                offer_id
            )));
        }

        let deposit = Deposit {
            offer_id: *offer_id,
            start: now,
            duration,
            amount,
            reward_owner: reward_owner.clone(),
        };
        // The full reward must be representable before the deposit is recorded.
        deposit
            .total_reward(&offer)
            .map_err(|_| ExecutorError::Overflow)?;

        self.apply_spend(diff, tx_id, common, fee)?;
        diff.add_deposit(*tx_id, deposit)?;
        let deposited_amount = offer
            .deposited_amount
            .checked_add(amount)
            .ok_or(ExecutorError::Overflow)?;
        diff.set_deposit_offer(DepositOffer {
            deposited_amount,
            ..offer
        })?;
        info!(deposit = %tx_id, offer = %offer_id, amount, duration, "Created deposit");
        Ok(())
    }

    pub(super) fn claim(&self, diff: &Diff, tx_id: &Id, tx: &Tx) -> ExecutorResult<()> {
        let UnsignedTx::Claim {
            common,
            owner,
            amount,
            owner_auth,
            claim_to,
        } = &tx.unsigned
        else {
            return Err(TypesError::InvalidTx("not a claim".to_string()).into());
        };

        let owner_id = owner.owner_id()?;
        let available = diff.claimable(&owner_id)?;
        if *amount > available {
            return Err(ExecutorError::InsufficientClaimable {
                requested: *amount,
                available,
            });
        }
        verify_owners(
            self.verifier.as_ref(),
            owner,
            &owner_auth.sig_indices,
            credential(&tx.creds, common.ins.len())?,
            tx_id.as_bytes(),
            diff.timestamp(),
        )?;
        let fee = diff.base_fee();
        self.check_spend(diff, tx_id, tx, common, LockState::UNLOCKED, fee)?;

        self.apply_spend(diff, tx_id, common, fee)?;
        diff.add_utxo(Utxo {
            utxo_id: UtxoId::new(*tx_id, common.outs.len() as u32),
            asset_id: self.config.fee_asset_id,
            out: Output::transfer(*amount, claim_to.clone()),
        })?;
        diff.set_claimable(owner_id, available - amount)?;
        let supply = diff
            .current_supply()
            .checked_add(*amount)
            .ok_or(ExecutorError::Overflow)?;
        diff.set_current_supply(supply)?;
        info!(owner = %owner_id, amount, "Claimed rewards");
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    pub(super) fn register_node(
        &self,
        diff: &Diff,
        tx_id: &Id,
        tx: &Tx,
        common: &CommonFields,
        old_node_id: &NodeId,
        new_node_id: &NodeId,
        node_owner: &ShortId,
    ) -> ExecutorResult<()> {
        if !diff
            .address_state(node_owner)?
            .contains(AddressState::CONSORTIUM)
        {
            return Err(ExecutorError::NotConsortiumMember(*node_owner));
        }

        let linked = diff.member_node(node_owner)?;
        if !old_node_id.is_empty() {
            if linked != Some(*old_node_id) {
                return Err(ExecutorError::InvalidNodeRegistration(format!(
                    "{} is not registered to {}",
                    old_node_id, node_owner
                )));
            }
            if find_staker(diff, &PRIMARY_NETWORK_ID, old_node_id)?.is_some() {
                return Err(ExecutorError::InvalidNodeRegistration(format!(
                    "{} is still a validator",
                    old_node_id
                )));
            }
        } else if linked.is_some() {
            return Err(ExecutorError::InvalidNodeRegistration(format!(
                "{} already has a registered node",
                node_owner
            )));
        }
        if !new_node_id.is_empty() && diff.node_owner(new_node_id)?.is_some() {
            return Err(ExecutorError::InvalidNodeRegistration(format!(
                "{} is already registered",
                new_node_id
            )));
        }

        let fee = diff.base_fee();
        self.check_spend(diff, tx_id, tx, common, LockState::UNLOCKED, fee)?;

        self.apply_spend(diff, tx_id, common, fee)?;
        if !old_node_id.is_empty() {
            diff.remove_node_owner(old_node_id)?;
        }
        if !new_node_id.is_empty() {
            diff.set_node_owner(*new_node_id, *node_owner)?;
        }
        info!(member = %node_owner, old = %old_node_id, new = %new_node_id, "Registered node");
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    pub(super) fn address_state(
        &self,
        diff: &Diff,
        tx_id: &Id,
        tx: &Tx,
        common: &CommonFields,
        address: &ShortId,
        flag_bit: u8,
        remove: bool,
        executor: &ShortId,
    ) -> ExecutorResult<()> {
        let flag = AddressState::from_bit(flag_bit)
            .ok_or_else(|| TypesError::InvalidTx(format!("undefined address state bit {}", flag_bit)))?;
        let roles = diff.address_state(executor)?;
        let permitted = roles.contains(AddressState::ROLE_ADMIN)
            || (roles.contains(AddressState::ROLE_KYC_ADMIN) && flag == AddressState::KYC_VERIFIED);
        if !permitted {
            return Err(ExecutorError::Unauthorized(format!(
                "{} may not change bit {}",
                executor, flag_bit
            )));
        }
        if remove && flag == AddressState::ROLE_ADMIN && address == executor {
            return Err(ExecutorError::Unauthorized(
                "admins cannot remove their own admin role".to_string(),
            ));
        }

        let fee = diff.base_fee();
        self.check_spend(diff, tx_id, tx, common, LockState::UNLOCKED, fee)?;

        self.apply_spend(diff, tx_id, common, fee)?;
        let current = diff.address_state(address)?;
        let next = if remove {
            current.without(flag)
        } else {
            current.with(flag)
        };
        diff.set_address_state(*address, next)?;
        if flag == AddressState::NODE_DEFERRED && next != current {
            set_node_deferred(diff, address, !remove)?;
        }
        info!(%address, bit = flag_bit, remove, "Changed address state");
        Ok(())
    }
}

/// Move the primary validator of `member`'s node between the current and
/// deferred sets. Resuming only happens before the validator's end time.
fn set_node_deferred(diff: &Diff, member: &ShortId, deferred: bool) -> ExecutorResult<()> {
    let Some(node_id) = diff.member_node(member)? else {
        return Ok(());
    };
    if deferred {
        if let Some(staker) = diff
            .get_current_staker(&PRIMARY_NETWORK_ID, &node_id)
            .optional()?
        {
            diff.delete_current_staker(&staker)?;
            diff.put_deferred_staker(staker)?;
            info!(node = %node_id, "Deferred validator");
        }
    } else if let Some(staker) = diff
        .get_deferred_staker(&PRIMARY_NETWORK_ID, &node_id)
        .optional()?
    {
        if staker.end_time > diff.timestamp() {
            diff.delete_deferred_staker(&staker)?;
            diff.put_current_staker(staker)?;
            info!(node = %node_id, "Resumed validator");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::*;
    use crate::ErrorKind;
    use camino_types::{Auth, TransferableInput, TransferableOutput};

    fn common(ins: Vec<TransferableInput>, outs: Vec<TransferableOutput>) -> CommonFields {
        let config = test_config();
        CommonFields {
            network_id: config.network_id,
            blockchain_id: config.chain_id,
            ins,
            outs,
            memo: Vec::new(),
        }
    }

    /// Spend all of `key`'s first UTXO: `locked` goes out with `lock`, the rest
    /// minus `fee` comes back unlocked.
    fn paying(
        fixture: &Fixture,
        view: &dyn ChainView,
        key: &TestKey,
        fee: u64,
        locked: u64,
        lock: LockState,
    ) -> CommonFields {
        let input = fixture.unlocked_input_in(view, key);
        let total = input.input.amount();
        let mut outs = Vec::new();
        if locked > 0 {
            outs.push(TransferableOutput::new(
                fee_asset(),
                Output::transfer(locked, key.owners()).lock(lock),
            ));
        }
        outs.push(TransferableOutput::new(
            fee_asset(),
            Output::transfer(total - fee - locked, key.owners()),
        ));
        camino_types::components::sort_outputs(&mut outs).unwrap();
        common(vec![input], outs)
    }

    // ============ Base / Subnet Tests ============

    #[test]
    fn test_create_subnet_and_chain() {
        let fixture = Fixture::new();
        let exec = fixture.executor();
        let alice = fixture.alice();
        let diff = Diff::new(fixture.view());

        let subnet_tx = sign(
            UnsignedTx::CreateSubnet {
                common: paying(&fixture, &diff, &alice, 100, 0, LockState::UNLOCKED),
                owner: alice.owners(),
            },
            &[vec![&alice]],
        );
        let subnet_id = exec.execute_decision(&diff, &subnet_tx).unwrap();
        assert_eq!(diff.get_subnet_owner(&subnet_id).unwrap(), alice.owners());

        let chain_tx = sign(
            UnsignedTx::CreateChain {
                common: paying(&fixture, &diff, &alice, 100, 0, LockState::UNLOCKED),
                subnet_id,
                chain_name: "camino x".to_string(),
                vm_id: Id::hash_of(b"vm"),
                genesis_data: Vec::new(),
                subnet_auth: Auth::single(),
            },
            &[vec![&alice], vec![&alice]],
        );
        let chain_id = exec.execute_decision(&diff, &chain_tx).unwrap();
        assert_eq!(diff.get_chain_subnet(&chain_id).unwrap(), subnet_id);
    }

    #[test]
    fn test_create_chain_unknown_subnet() {
        let fixture = Fixture::new();
        let alice = fixture.alice();
        let diff = Diff::new(fixture.view());
        let tx = sign(
            UnsignedTx::CreateChain {
                common: paying(&fixture, &diff, &alice, 100, 0, LockState::UNLOCKED),
                subnet_id: Id::hash_of(b"missing"),
                chain_name: "x".to_string(),
                vm_id: Id::hash_of(b"vm"),
                genesis_data: Vec::new(),
                subnet_auth: Auth::single(),
            },
            &[vec![&alice], vec![&alice]],
        );
        let err = fixture.executor().execute_decision(&diff, &tx).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    // ============ Validator Tests ============

    fn register_node(fixture: &Fixture, diff: &Diff, member: &TestKey, old: NodeId, new: NodeId) {
        let tx = sign(
            UnsignedTx::RegisterNode {
                common: paying(fixture, diff, member, 10, 0, LockState::UNLOCKED),
                old_node_id: old,
                new_node_id: new,
                node_owner: member.address(),
                owner_auth: Auth::single(),
            },
            &[vec![member], vec![member]],
        );
        fixture.executor().execute_decision(diff, &tx).unwrap();
    }

    fn add_validator_tx(
        fixture: &Fixture,
        diff: &Diff,
        member: &TestKey,
        node_id: NodeId,
        start: u64,
        end: u64,
    ) -> Tx {
        let weight = test_config().validator_bond_amount;
        sign(
            UnsignedTx::AddValidator {
                common: paying(fixture, diff, member, 10, weight, LockState::BONDED),
                validator: Validator {
                    node_id,
                    start,
                    end,
                    weight,
                },
                reward_owner: member.owners(),
                node_owner_auth: Auth::single(),
            },
            &[vec![member], vec![member]],
        )
    }

    #[test]
    fn test_add_validator_pending_then_duplicate() {
        let fixture = Fixture::new();
        let exec = fixture.executor();
        let member = fixture.member(0);
        let diff = Diff::new(fixture.view());
        let new_node = NodeId([0xEE; 20]);

        // Genesis node 0 already validates.
        let err = exec
            .execute_decision(
                &diff,
                &add_validator_tx(&fixture, &diff, &member, node(0), GENESIS_TIME + 10, GENESIS_TIME + 1_000),
            )
            .unwrap_err();
        assert!(matches!(err, ExecutorError::DuplicateValidator { .. }));

        let admin = fixture.alice();
        let other = TestKey::new(50);
        let grant = sign(
            UnsignedTx::AddressState {
                common: paying(&fixture, &diff, &admin, 10, 0, LockState::UNLOCKED),
                address: other.address(),
                flag_bit: AddressState::BIT_CONSORTIUM,
                remove: false,
                executor: admin.address(),
                executor_auth: Auth::single(),
            },
            &[vec![&admin], vec![&admin]],
        );
        exec.execute_decision(&diff, &grant).unwrap();
        assert!(diff
            .address_state(&other.address())
            .unwrap()
            .contains(AddressState::CONSORTIUM));

        // Fund the new member from the admin.
        let input = fixture.unlocked_input_in(&diff, &admin);
        let mut outs = vec![
            TransferableOutput::new(fee_asset(), Output::transfer(10_000, other.owners())),
            TransferableOutput::new(
                fee_asset(),
                Output::transfer(input.input.amount() - 10_000 - 10, admin.owners()),
            ),
        ];
        camino_types::components::sort_outputs(&mut outs).unwrap();
        let fund = sign(
            UnsignedTx::Base {
                common: common(vec![input], outs),
            },
            &[vec![&admin]],
        );
        exec.execute_decision(&diff, &fund).unwrap();

        register_node(&fixture, &diff, &other, NodeId::EMPTY, new_node);
        assert_eq!(diff.node_owner(&new_node).unwrap(), Some(other.address()));

        let tx = add_validator_tx(&fixture, &diff, &other, new_node, GENESIS_TIME + 10, GENESIS_TIME + 1_000);
        let tx_id = exec.execute_decision(&diff, &tx).unwrap();
        let staker = diff
            .get_pending_staker(&PRIMARY_NETWORK_ID, &new_node)
            .unwrap();
        assert_eq!(staker.tx_id, tx_id);
        assert_eq!(staker.weight, test_config().validator_bond_amount);
        assert_eq!(diff.locked_utxo_ids(&tx_id).unwrap().len(), 1);

        let again = add_validator_tx(&fixture, &diff, &other, new_node, GENESIS_TIME + 20, GENESIS_TIME + 1_000);
        assert!(matches!(
            exec.execute_decision(&diff, &again).unwrap_err(),
            ExecutorError::DuplicateValidator { .. }
        ));
    }

    #[test]
    fn test_add_validator_unregistered_node() {
        let fixture = Fixture::new();
        let member = fixture.member(1);
        let diff = Diff::new(fixture.view());
        let tx = add_validator_tx(
            &fixture,
            &diff,
            &member,
            NodeId([0x77; 20]),
            GENESIS_TIME + 10,
            GENESIS_TIME + 1_000,
        );
        let err = fixture.executor().execute_decision(&diff, &tx).unwrap_err();
        assert!(matches!(err, ExecutorError::NodeNotRegistered(_)));
    }

    #[test]
    fn test_subnet_validator_must_fit_primary_period() {
        let fixture = Fixture::new();
        let exec = fixture.executor();
        let alice = fixture.alice();
        let diff = Diff::new(fixture.view());

        let subnet_tx = sign(
            UnsignedTx::CreateSubnet {
                common: paying(&fixture, &diff, &alice, 100, 0, LockState::UNLOCKED),
                owner: alice.owners(),
            },
            &[vec![&alice]],
        );
        let subnet_id = exec.execute_decision(&diff, &subnet_tx).unwrap();

        let subnet_validator = |end: u64| {
            sign(
                UnsignedTx::AddSubnetValidator {
                    common: paying(&fixture, &diff, &alice, 10, 0, LockState::UNLOCKED),
                    validator: Validator {
                        node_id: node(0),
                        start: GENESIS_TIME + 10,
                        end,
                        weight: 1,
                    },
                    subnet_id,
                    subnet_auth: Auth::single(),
                },
                &[vec![&alice], vec![&alice]],
            )
        };

        // Ends after the primary validator.
        let err = exec
            .execute_decision(&diff, &subnet_validator(VALIDATOR_END + 1))
            .unwrap_err();
        assert!(matches!(err, ExecutorError::InvalidValidatorPeriod(_)));
        assert!(diff.pending_stakers().unwrap().is_empty());

        exec.execute_decision(&diff, &subnet_validator(VALIDATOR_END))
            .unwrap();
        assert!(diff.get_pending_staker(&subnet_id, &node(0)).is_ok());
    }

    // ============ Deposit / Claim Tests ============

    #[test]
    fn test_deposit_records_and_locks() {
        let fixture = Fixture::new();
        let member = fixture.member(2);
        let diff = Diff::new(fixture.view());

        let tx = sign(
            UnsignedTx::Deposit {
                common: paying(&fixture, &diff, &member, 10, 10_000, LockState::DEPOSITED),
                offer_id: offer_id(),
                duration: 100,
                reward_owner: member.owners(),
            },
            &[vec![&member]],
        );
        let deposit_id = fixture.executor().execute_decision(&diff, &tx).unwrap();

        let deposit = diff.get_deposit(&deposit_id).unwrap();
        assert_eq!(deposit.amount, 10_000);
        assert_eq!(deposit.start, GENESIS_TIME);
        assert_eq!(deposit.end_time(), GENESIS_TIME + 100);
        assert_eq!(diff.get_deposit_offer(&offer_id()).unwrap().deposited_amount, 10_000);
        assert_eq!(diff.next_to_unlock_deposit_time().unwrap(), GENESIS_TIME + 100);

        let locked = diff.locked_utxo_ids(&deposit_id).unwrap();
        assert_eq!(locked.len(), 1);
        let utxo = diff.get_utxo(&locked[0]).unwrap();
        assert_eq!(utxo.out.lock_ids().deposit_tx_id, deposit_id);
    }

    #[test]
    fn test_deposit_duration_out_of_range() {
        let fixture = Fixture::new();
        let member = fixture.member(2);
        let diff = Diff::new(fixture.view());
        let tx = sign(
            UnsignedTx::Deposit {
                common: paying(&fixture, &diff, &member, 10, 10_000, LockState::DEPOSITED),
                offer_id: offer_id(),
                duration: 5,
                reward_owner: member.owners(),
            },
            &[vec![&member]],
        );
        let err = fixture.executor().execute_decision(&diff, &tx).unwrap_err();
        assert!(matches!(err, ExecutorError::InvalidDeposit(_)));
    }

    #[test]
    fn test_deposit_with_unpayable_reward_rejected() {
        let fixture = Fixture::new();
        let member = fixture.member(2);
        let diff = Diff::new(fixture.view());
        let offer = diff.get_deposit_offer(&offer_id()).unwrap();
        diff.set_deposit_offer(DepositOffer {
            interest_rate_nominator: u64::MAX,
            end: u64::MAX / 2,
            max_duration: 1_000_000_000,
            ..offer
        })
        .unwrap();

        let tx = sign(
            UnsignedTx::Deposit {
                common: paying(&fixture, &diff, &member, 10, 50_000, LockState::DEPOSITED),
                offer_id: offer_id(),
                duration: 1_000_000_000,
                reward_owner: member.owners(),
            },
            &[vec![&member]],
        );
        let err = fixture.executor().execute_decision(&diff, &tx).unwrap_err();
        assert!(matches!(err, ExecutorError::Overflow));
    }

    #[test]
    fn test_claim_mints_rewards() {
        let fixture = Fixture::new();
        let member = fixture.member(3);
        let owner_id = member.owners().owner_id().unwrap();
        let diff = Diff::new(fixture.view());
        diff.set_claimable(owner_id, 500).unwrap();
        let supply = diff.current_supply();

        let claim = |amount: u64| {
            sign(
                UnsignedTx::Claim {
                    common: paying(&fixture, &diff, &member, 10, 0, LockState::UNLOCKED),
                    owner: member.owners(),
                    amount,
                    owner_auth: Auth::single(),
                    claim_to: member.owners(),
                },
                &[vec![&member], vec![&member]],
            )
        };

        let err = fixture.executor().execute_decision(&diff, &claim(501)).unwrap_err();
        assert!(matches!(err, ExecutorError::InsufficientClaimable { .. }));

        let tx = claim(200);
        let tx_id = fixture.executor().execute_decision(&diff, &tx).unwrap();
        assert_eq!(diff.claimable(&owner_id).unwrap(), 300);
        assert_eq!(diff.current_supply(), supply + 200 - 10);
        let minted = diff.get_utxo(&UtxoId::new(tx_id, 1)).unwrap();
        assert_eq!(minted.out.amount(), 200);
    }

    // ============ Address State Tests ============

    #[test]
    fn test_address_state_requires_role() {
        let fixture = Fixture::new();
        let member = fixture.member(0);
        let diff = Diff::new(fixture.view());
        let tx = sign(
            UnsignedTx::AddressState {
                common: paying(&fixture, &diff, &member, 10, 0, LockState::UNLOCKED),
                address: member.address(),
                flag_bit: AddressState::BIT_ROLE_ADMIN,
                remove: false,
                executor: member.address(),
                executor_auth: Auth::single(),
            },
            &[vec![&member], vec![&member]],
        );
        let err = fixture.executor().execute_decision(&diff, &tx).unwrap_err();
        assert!(matches!(err, ExecutorError::Unauthorized(_)));
    }

    #[test]
    fn test_node_deferred_flag_moves_validator() {
        let fixture = Fixture::new();
        let exec = fixture.executor();
        let admin = fixture.alice();
        let member = fixture.member(1);
        let diff = Diff::new(fixture.view());

        let flag = |remove: bool| {
            sign(
                UnsignedTx::AddressState {
                    common: paying(&fixture, &diff, &admin, 10, 0, LockState::UNLOCKED),
                    address: member.address(),
                    flag_bit: AddressState::BIT_NODE_DEFERRED,
                    remove,
                    executor: admin.address(),
                    executor_auth: Auth::single(),
                },
                &[vec![&admin], vec![&admin]],
            )
        };

        exec.execute_decision(&diff, &flag(false)).unwrap();
        assert!(diff.get_current_staker(&PRIMARY_NETWORK_ID, &node(1)).is_err());
        assert!(diff.get_deferred_staker(&PRIMARY_NETWORK_ID, &node(1)).is_ok());

        exec.execute_decision(&diff, &flag(true)).unwrap();
        assert!(diff.get_current_staker(&PRIMARY_NETWORK_ID, &node(1)).is_ok());
        assert!(diff.deferred_stakers().unwrap().is_empty());
    }
}
