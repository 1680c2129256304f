//! Spend verification and UTXO bookkeeping.
//!
//! Value is accounted in pools. Unlocked value of an asset forms one pool;
//! locked value forms one pool per `(asset, lock IDs, owners)`. Every pool must
//! balance, except that the unlocked pool of the fee asset also pays the fee.
//! An output whose lock IDs hold [`Id::THIS_TX`] draws from the pool it would
//! belong to without those fresh locks, which is how transactions move value
//! from unlocked to deposited, or from deposited to deposited-and-bonded.

use crate::{ExecutorError, ExecutorResult};
use camino_state::{Chain, ChainView};
use camino_types::{
    AuthTarget, CommonFields, Credential, Id, LockIds, LockState, OutputOwners,
    SignatureVerifier, TransferableInput, TransferableOutput, TypesError, UnsignedTx, Utxo,
    UtxoId,
};
use std::collections::BTreeMap;
use tracing::{debug, instrument};

/// `(asset, deposit tx, bond tx, owners)`; the last three are empty for unlocked value.
type PoolKey = (Id, Id, Id, Id);

#[derive(Debug, Default, Clone, Copy)]
struct Flow {
    consumed: u64,
    produced: u64,
}

/// Outcome of a successful flow check.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SpendSummary {
    /// Fee-asset value newly locked by the transaction.
    pub newly_locked: u64,
}

/// Verify that `cred` carries valid signatures of the `owners` picked by `sig_indices`.
pub fn verify_owners(
    verifier: &dyn SignatureVerifier,
    owners: &OutputOwners,
    sig_indices: &[u32],
    cred: &Credential,
    message: &[u8],
    now: u64,
) -> ExecutorResult<()> {
    if owners.locktime > now {
        return Err(ExecutorError::InvalidCredentials(format!(
            "owners are time locked until {}",
            owners.locktime
        )));
    }
    if sig_indices.len() != owners.threshold as usize {
        return Err(ExecutorError::InvalidCredentials(format!(
            "expected {} signers, got {}",
            owners.threshold,
            sig_indices.len()
        )));
    }
    if !sig_indices.windows(2).all(|w| w[0] < w[1]) {
        return Err(ExecutorError::InvalidCredentials(
            "signature indices not sorted and unique".to_string(),
        ));
    }
    if cred.sigs.len() != sig_indices.len() {
        return Err(ExecutorError::InvalidCredentials(format!(
            "expected {} signatures, got {}",
            sig_indices.len(),
            cred.sigs.len()
        )));
    }

    for (index, entry) in sig_indices.iter().zip(&cred.sigs) {
        let expected = owners.addrs.get(*index as usize).ok_or_else(|| {
            ExecutorError::InvalidCredentials(format!("signature index {} out of range", index))
        })?;
        match verifier.recover(&entry.public_key, message, &entry.signature) {
            Some(signer) if signer == *expected => {}
            _ => {
                return Err(ExecutorError::InvalidCredentials(format!(
                    "missing valid signature of {}",
                    expected
                )))
            }
        }
    }
    Ok(())
}

/// Owner set an auth requirement is checked against.
pub fn auth_owners(view: &dyn ChainView, target: &AuthTarget) -> ExecutorResult<OutputOwners> {
    match target {
        AuthTarget::Subnet(subnet_id) => Ok(view.get_subnet_owner(subnet_id)?),
        AuthTarget::Address(address) => Ok(OutputOwners::single(*address)),
        AuthTarget::NodeOwner(node_id) => view
            .node_owner(node_id)?
            .map(OutputOwners::single)
            .ok_or(ExecutorError::NodeNotRegistered(*node_id)),
    }
}

/// Verify every auth requirement of `unsigned` against the credentials that
/// follow the input credentials.
pub fn verify_auths(
    view: &dyn ChainView,
    verifier: &dyn SignatureVerifier,
    unsigned: &UnsignedTx,
    creds: &[Credential],
    tx_id: &Id,
) -> ExecutorResult<()> {
    let offset = unsigned.common().map_or(0, |c| c.ins.len());
    let now = view.timestamp();
    for (index, (target, auth)) in unsigned.auths().into_iter().enumerate() {
        let cred = credential(creds, offset + index)?;
        let owners = auth_owners(view, &target)?;
        verify_owners(verifier, &owners, &auth.sig_indices, cred, tx_id.as_bytes(), now)?;
    }
    Ok(())
}

pub(crate) fn credential(creds: &[Credential], index: usize) -> ExecutorResult<&Credential> {
    creds.get(index).ok_or(ExecutorError::Malformed(
        TypesError::WrongCredentialCount {
            expected: index + 1,
            actual: creds.len(),
        },
    ))
}

/// Flags of `ids` held by the enclosing transaction.
fn fresh_locks(ids: &LockIds) -> LockState {
    let mut state = LockState::UNLOCKED;
    if ids.deposit_tx_id == Id::THIS_TX {
        state = state.union(LockState::DEPOSITED);
    }
    if ids.bond_tx_id == Id::THIS_TX {
        state = state.union(LockState::BONDED);
    }
    state
}

fn pool_key(asset_id: Id, ids: &LockIds, owners: &OutputOwners) -> ExecutorResult<PoolKey> {
    if ids.is_locked() {
        Ok((asset_id, ids.deposit_tx_id, ids.bond_tx_id, owners.owner_id()?))
    } else {
        Ok((asset_id, Id::EMPTY, Id::EMPTY, Id::EMPTY))
    }
}

fn add(value: u64, amount: u64) -> ExecutorResult<u64> {
    value.checked_add(amount).ok_or(ExecutorError::Overflow)
}

/// Verify the inputs, credentials and value flow of a user transaction.
///
/// `allowed_lock` names the lock flags the transaction may newly apply to its
/// outputs. Deposited inputs are spendable only by transactions allowed to
/// bond; bonded inputs are never spendable.
#[instrument(skip_all, fields(tx_id = %tx_id, ins = common.ins.len(), outs = common.outs.len()))]
#[allow(clippy::too_many_arguments)]
pub fn verify_spend(
    view: &dyn ChainView,
    verifier: &dyn SignatureVerifier,
    tx_id: &Id,
    common: &CommonFields,
    creds: &[Credential],
    allowed_lock: LockState,
    fee: u64,
    fee_asset_id: &Id,
) -> ExecutorResult<SpendSummary> {
    let now = view.timestamp();
    let mut pools: BTreeMap<PoolKey, Flow> = BTreeMap::new();

    for (index, input) in common.ins.iter().enumerate() {
        let utxo = view.get_utxo(&input.utxo_id)?;
        check_input_matches(input, &utxo)?;

        let ids = utxo.out.lock_ids();
        let state = ids.state();
        if state.is_bonded() || (state.is_deposited() && !allowed_lock.is_bonded()) {
            return Err(ExecutorError::LockedInputNotSpendable(input.utxo_id));
        }

        let owners = utxo.out.owners().ok_or(TypesError::NestedLocks)?;
        verify_owners(
            verifier,
            owners,
            input.input.sig_indices(),
            credential(creds, index)?,
            tx_id.as_bytes(),
            now,
        )?;

        let flow = pools.entry(pool_key(utxo.asset_id, &ids, owners)?).or_default();
        flow.consumed = add(flow.consumed, utxo.out.amount())?;
    }

    let mut summary = SpendSummary::default();
    for output in &common.outs {
        let ids = output.out.lock_ids();
        let fresh = fresh_locks(&ids);
        if fresh.is_locked() {
            if !allowed_lock.is_locked_with(fresh) {
                return Err(ExecutorError::LockNotAllowed(format!(
                    "cannot newly lock {} when only {} is allowed",
                    fresh, allowed_lock
                )));
            }
            if output.asset_id != *fee_asset_id {
                return Err(ExecutorError::LockNotAllowed(format!(
                    "asset {} cannot be locked",
                    output.asset_id
                )));
            }
            summary.newly_locked = add(summary.newly_locked, output.out.amount())?;
        }

        let owners = output.out.owners().ok_or(TypesError::NestedLocks)?;
        let prior = ids.unlock(fresh);
        let flow = pools.entry(pool_key(output.asset_id, &prior, owners)?).or_default();
        flow.produced = add(flow.produced, output.out.amount())?;
    }

    if fee > 0 {
        let flow = pools.entry((*fee_asset_id, Id::EMPTY, Id::EMPTY, Id::EMPTY)).or_default();
        flow.produced = add(flow.produced, fee)?;
    }

    for ((asset_id, ..), flow) in &pools {
        if flow.consumed != flow.produced {
            return Err(ExecutorError::FlowCheckFailed {
                asset_id: *asset_id,
                consumed: flow.consumed,
                produced: flow.produced,
            });
        }
    }

    debug!(pools = pools.len(), newly_locked = summary.newly_locked, "Spend verified");
    Ok(summary)
}

fn check_input_matches(input: &TransferableInput, utxo: &Utxo) -> ExecutorResult<()> {
    let mismatch = |reason: &str| ExecutorError::InputMismatch {
        utxo_id: input.utxo_id,
        reason: reason.to_string(),
    };
    if utxo.asset_id != input.asset_id {
        return Err(mismatch("asset differs"));
    }
    if utxo.out.amount() != input.input.amount() {
        return Err(mismatch("amount differs"));
    }
    if utxo.out.lock_ids() != input.input.lock_ids() {
        return Err(mismatch("lock IDs differ"));
    }
    Ok(())
}

/// Remove the UTXOs spent by `ins`.
pub fn consume_inputs(chain: &dyn Chain, ins: &[TransferableInput]) -> ExecutorResult<()> {
    for input in ins {
        chain.delete_utxo(&input.utxo_id)?;
    }
    Ok(())
}

/// Add `outs` as UTXOs of `tx_id`, resolving fresh lock placeholders.
pub fn produce_outputs(
    chain: &dyn Chain,
    tx_id: &Id,
    outs: &[TransferableOutput],
) -> ExecutorResult<()> {
    for (index, output) in outs.iter().enumerate() {
        chain.add_utxo(Utxo {
            utxo_id: UtxoId::new(*tx_id, index as u32),
            asset_id: output.asset_id,
            out: output.out.clone().fix_lock_ids(*tx_id),
        })?;
    }
    Ok(())
}

/// Release the `state` locks held by `lock_tx_id`.
///
/// Each affected UTXO is re-issued with those flags cleared as output
/// `next_index`, `next_index + 1`, ... of `tx_id`. Locks held by other
/// transactions are kept. Returns the value released.
pub fn release_locks(
    chain: &dyn Chain,
    lock_tx_id: &Id,
    state: LockState,
    tx_id: &Id,
    next_index: &mut u32,
) -> ExecutorResult<u64> {
    let mut released = 0u64;
    for utxo_id in chain.locked_utxo_ids(lock_tx_id)? {
        let utxo = chain.get_utxo(&utxo_id)?;
        let ids = utxo.out.lock_ids();

        let mut held = LockState::UNLOCKED;
        if state.is_deposited() && ids.deposit_tx_id == *lock_tx_id {
            held = held.union(LockState::DEPOSITED);
        }
        if state.is_bonded() && ids.bond_tx_id == *lock_tx_id {
            held = held.union(LockState::BONDED);
        }
        if !held.is_locked() {
            continue;
        }

        chain.delete_utxo(&utxo_id)?;
        released = add(released, utxo.out.amount())?;
        chain.add_utxo(Utxo {
            utxo_id: UtxoId::new(*tx_id, *next_index),
            asset_id: utxo.asset_id,
            out: utxo.out.unlock(held),
        })?;
        *next_index += 1;
    }

    debug!(lock_tx = %lock_tx_id, %state, released, "Released locks");
    Ok(released)
}

/// Remove `fee` from the circulating supply.
pub fn burn_fee(chain: &dyn Chain, fee: u64) -> ExecutorResult<()> {
    if fee > 0 {
        chain.set_current_supply(chain.current_supply().saturating_sub(fee))?;
    }
    Ok(())
}
