//! Input selection.
//!
//! Picks keychain UTXOs to pay a fee and to lock an amount, producing the
//! inputs, outputs and per-input signers of a transaction. Outputs balance
//! every lock pool exactly, so the result passes the chain's flow check.

use crate::{Keychain, WalletError, WalletResult};
use camino_state::ChainView;
use camino_types::components::sort_outputs;
use camino_types::{
    Id, Input, LockIds, LockState, LockedInput, LockedOutput, Output, OutputOwners, ShortId,
    TransferInput, TransferableInput, TransferableOutput, Utxo, UtxoId,
};
use std::collections::BTreeMap;
use tracing::debug;

/// UTXO IDs fetched per page when scanning an address.
const PAGE_SIZE: usize = 256;

/// Inputs and outputs of a transaction, with who signs each input.
#[derive(Debug, Clone, Default)]
pub struct Spend {
    /// Sorted by UTXO ID.
    pub ins: Vec<TransferableInput>,
    /// Sorted by encoding.
    pub outs: Vec<TransferableOutput>,
    /// Signing addresses of each input, in input order.
    pub signers: Vec<Vec<ShortId>>,
}

/// What a [`Spend`] must cover.
#[derive(Debug, Clone)]
pub struct SpendRequest {
    pub asset_id: Id,
    /// Value moved to `to`, newly locked with `lock`.
    pub amount: u64,
    pub lock: LockState,
    /// Value burned; paid from unlocked UTXOs only.
    pub fee: u64,
    pub to: OutputOwners,
    pub change: OutputOwners,
}

/// All UTXOs owned by keychain addresses, ascending by ID.
pub fn keychain_utxos(view: &dyn ChainView, keychain: &Keychain) -> WalletResult<Vec<Utxo>> {
    let mut found: BTreeMap<UtxoId, Utxo> = BTreeMap::new();
    for address in keychain.addresses() {
        let mut start_after = None;
        loop {
            let page = view.utxo_ids(&address, start_after, PAGE_SIZE)?;
            for utxo_id in &page {
                if !found.contains_key(utxo_id) {
                    found.insert(*utxo_id, view.get_utxo(utxo_id)?);
                }
            }
            if page.len() < PAGE_SIZE {
                break;
            }
            start_after = page.last().copied();
        }
    }
    Ok(found.into_values().collect())
}

/// Input spending all of `utxo`, signed at `sig_indices`.
pub fn input_for(utxo: &Utxo, sig_indices: Vec<u32>) -> TransferableInput {
    let plain = Input::Transfer(TransferInput {
        amount: utxo.out.amount(),
        sig_indices,
    });
    let ids = utxo.out.lock_ids();
    TransferableInput {
        utxo_id: utxo.utxo_id,
        asset_id: utxo.asset_id,
        input: if ids.is_locked() {
            Input::Locked(LockedInput::new(ids, plain))
        } else {
            plain
        },
    }
}

/// Output of `amount` to `owners` keeping `ids` and newly locking `lock`.
fn output_with(ids: LockIds, amount: u64, owners: &OutputOwners, lock: LockState) -> Output {
    let plain = Output::transfer(amount, owners.clone());
    let kept = if ids.is_locked() {
        Output::Locked(LockedOutput::new(ids, plain))
    } else {
        plain
    };
    kept.lock(lock)
}

/// Select inputs covering `request` and build the balancing outputs.
///
/// Bonded UTXOs are never selected. Deposited UTXOs are selected only to
/// be bonded, ahead of unlocked ones, and their value stays with their
/// owners.
pub fn select(
    view: &dyn ChainView,
    keychain: &Keychain,
    request: &SpendRequest,
) -> WalletResult<Spend> {
    let now = view.timestamp();
    let mut to_lock = request.amount;
    let mut to_burn = request.fee;
    let mut picked: Vec<(TransferableInput, Vec<ShortId>)> = Vec::new();
    let mut outs = Vec::new();

    // Deposited UTXOs first, so bonds draw on deposits before free funds.
    let mut candidates = keychain_utxos(view, keychain)?;
    candidates.sort_by_key(|utxo| !utxo.out.lock_state().is_deposited());

    for utxo in candidates {
        if to_lock == 0 && to_burn == 0 {
            break;
        }
        if utxo.asset_id != request.asset_id {
            continue;
        }
        let ids = utxo.out.lock_ids();
        let state = ids.state();
        if state.is_bonded() {
            continue;
        }
        if state.is_deposited() && (!request.lock.is_bonded() || to_lock == 0) {
            continue;
        }
        let Some(owners) = utxo.out.owners() else {
            continue;
        };
        let Some(sig_indices) = keychain.match_owners(owners, now) else {
            continue;
        };

        let mut remaining = utxo.out.amount();
        if !state.is_locked() {
            let burned = remaining.min(to_burn);
            to_burn -= burned;
            remaining -= burned;
        }
        let locked = remaining.min(to_lock);
        to_lock -= locked;
        remaining -= locked;

        // Deposited value may only change its bond, not its owners.
        let (to, change) = if state.is_deposited() {
            (owners, owners)
        } else {
            (&request.to, &request.change)
        };
        if locked > 0 {
            outs.push(TransferableOutput::new(
                utxo.asset_id,
                output_with(ids, locked, to, request.lock),
            ));
        }
        if remaining > 0 {
            outs.push(TransferableOutput::new(
                utxo.asset_id,
                output_with(ids, remaining, change, LockState::UNLOCKED),
            ));
        }

        let signers = sig_indices
            .iter()
            .map(|i| owners.addrs[*i as usize])
            .collect();
        picked.push((input_for(&utxo, sig_indices), signers));
    }

    if to_lock > 0 || to_burn > 0 {
        let needed = request.amount.saturating_add(request.fee);
        return Err(WalletError::InsufficientFunds {
            needed,
            available: needed - to_lock - to_burn,
        });
    }

    picked.sort_by_key(|(input, _)| input.utxo_id);
    let (ins, signers): (Vec<_>, Vec<_>) = picked.into_iter().unzip();
    sort_outputs(&mut outs)?;

    debug!(
        ins = ins.len(),
        outs = outs.len(),
        amount = request.amount,
        fee = request.fee,
        "Selected inputs"
    );
    Ok(Spend { ins, outs, signers })
}
