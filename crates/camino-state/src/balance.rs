//! Balance aggregation by lock state.

use crate::{ChainView, StateResult};
use camino_types::{Id, LockState, Output, ShortId, UtxoId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::warn;

/// UTXOs fetched per page while walking an address.
const PAGE_SIZE: usize = 1024;

/// Amounts of one asset split by lock state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    pub unlocked: u64,
    pub bonded: u64,
    pub deposited: u64,
    pub deposited_bonded: u64,
}

impl Balance {
    pub fn total(&self) -> u64 {
        self.unlocked
            .saturating_add(self.bonded)
            .saturating_add(self.deposited)
            .saturating_add(self.deposited_bonded)
    }

    fn add(&mut self, state: LockState, amount: u64) {
        let slot = match state {
            LockState::DEPOSITED => &mut self.deposited,
            LockState::BONDED => &mut self.bonded,
            LockState::DEPOSITED_BONDED => &mut self.deposited_bonded,
            _ => &mut self.unlocked,
        };
        *slot = slot.saturating_add(amount);
    }
}

/// Lock state of a plain or singly wrapped output, `None` for anything else.
fn classify(out: &Output) -> Option<LockState> {
    match out {
        Output::Transfer(_) => Some(LockState::UNLOCKED),
        Output::Locked(locked) => match locked.out.as_ref() {
            Output::Transfer(_) => Some(locked.ids.state()),
            Output::Locked(_) => None,
        },
    }
}

/// Balances per asset of the UTXOs owned by any of `addresses`.
///
/// A UTXO owned by several of the addresses is counted once. Output shapes
/// that cannot be classified are skipped with a warning.
pub fn get_balance(
    view: &dyn ChainView,
    addresses: &[ShortId],
) -> StateResult<BTreeMap<Id, Balance>> {
    let mut utxo_ids = BTreeSet::new();
    for address in addresses {
        let mut start_after: Option<UtxoId> = None;
        loop {
            let page = view.utxo_ids(address, start_after, PAGE_SIZE)?;
            let done = page.len() < PAGE_SIZE;
            start_after = page.last().copied();
            utxo_ids.extend(page);
            if done {
                break;
            }
        }
    }

    let mut balances: BTreeMap<Id, Balance> = BTreeMap::new();
    for utxo_id in &utxo_ids {
        let utxo = view.get_utxo(utxo_id)?;
        let Some(state) = classify(&utxo.out) else {
            warn!(utxo = %utxo_id, "Skipping UTXO with unrecognised output shape");
            continue;
        };
        balances
            .entry(utxo.asset_id)
            .or_default()
            .add(state, utxo.out.amount());
    }
    Ok(balances)
}
