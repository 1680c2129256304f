//! Lock model: which flags (deposited, bonded) hold an output and by which transactions.
//!
//! A locked output is a transferable output wrapped together with its [`LockIds`].
//! Locking is additive: bonding an already deposited output produces a single
//! wrapper carrying both IDs, never a wrapper inside a wrapper.

use crate::components::{Input, Output};
use crate::ids::Id;
use crate::{TypesError, TypesResult};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Two-bit lock lattice: `Unlocked(00)`, `Deposited(01)`, `Bonded(10)`, `DepositedBonded(11)`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct LockState(u8);

impl LockState {
    /// Neither deposited nor bonded.
    pub const UNLOCKED: LockState = LockState(0b00);
    /// Locked by a deposit.
    pub const DEPOSITED: LockState = LockState(0b01);
    /// Locked as validator or proposal bond.
    pub const BONDED: LockState = LockState(0b10);
    /// Deposited and bonded at the same time.
    pub const DEPOSITED_BONDED: LockState = LockState(0b11);

    /// Build from raw bits, rejecting values outside the lattice.
    pub fn from_bits(bits: u8) -> TypesResult<Self> {
        let state = LockState(bits);
        state.verify()?;
        Ok(state)
    }

    /// Raw bits.
    pub fn bits(self) -> u8 {
        self.0
    }

    /// Fails with [`TypesError::InvalidLockState`] outside the 2-bit range.
    pub fn verify(self) -> TypesResult<()> {
        if self.0 > Self::DEPOSITED_BONDED.0 {
            return Err(TypesError::InvalidLockState(self.0));
        }
        Ok(())
    }

    /// Deposit flag set.
    pub fn is_deposited(self) -> bool {
        self.0 & Self::DEPOSITED.0 != 0
    }

    /// Bond flag set.
    pub fn is_bonded(self) -> bool {
        self.0 & Self::BONDED.0 != 0
    }

    /// Any flag set.
    pub fn is_locked(self) -> bool {
        self.0 != 0
    }

    /// Every flag of `other` is also set in `self`.
    pub fn is_locked_with(self, other: LockState) -> bool {
        self.0 & other.0 == other.0
    }

    /// Flags set in either state.
    pub fn union(self, other: LockState) -> LockState {
        LockState(self.0 | other.0)
    }
}

impl fmt::Display for LockState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            0b00 => write!(f, "unlocked"),
            0b01 => write!(f, "deposited"),
            0b10 => write!(f, "bonded"),
            0b11 => write!(f, "depositedBonded"),
            other => write!(f, "invalid({other})"),
        }
    }
}

impl fmt::Debug for LockState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// Transactions holding an output locked. An empty ID means the flag is clear.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Debug, Serialize, Deserialize)]
pub struct LockIds {
    /// Deposit tx locking this output, or empty.
    pub deposit_tx_id: Id,
    /// Bond tx (validator or proposal) locking this output, or empty.
    pub bond_tx_id: Id,
}

impl LockIds {
    /// Build from explicit IDs.
    pub fn new(deposit_tx_id: Id, bond_tx_id: Id) -> Self {
        Self {
            deposit_tx_id,
            bond_tx_id,
        }
    }

    /// Lock state derived from which IDs are set.
    pub fn state(&self) -> LockState {
        let mut bits = 0;
        if !self.deposit_tx_id.is_empty() {
            bits |= LockState::DEPOSITED.0;
        }
        if !self.bond_tx_id.is_empty() {
            bits |= LockState::BONDED.0;
        }
        LockState(bits)
    }

    /// Any lock present.
    pub fn is_locked(&self) -> bool {
        self.state().is_locked()
    }

    /// Mark the flags of `state` as locked by the enclosing transaction.
    pub fn lock(&self, state: LockState) -> LockIds {
        let mut ids = *self;
        if state.is_deposited() {
            ids.deposit_tx_id = Id::THIS_TX;
        }
        if state.is_bonded() {
            ids.bond_tx_id = Id::THIS_TX;
        }
        ids
    }

    /// Clear the flags of `state`, keeping the others.
    pub fn unlock(&self, state: LockState) -> LockIds {
        let mut ids = *self;
        if state.is_deposited() {
            ids.deposit_tx_id = Id::EMPTY;
        }
        if state.is_bonded() {
            ids.bond_tx_id = Id::EMPTY;
        }
        ids
    }

    /// Replace the [`Id::THIS_TX`] placeholder with the real transaction ID.
    pub fn fix(&self, tx_id: Id) -> LockIds {
        let mut ids = *self;
        if ids.deposit_tx_id == Id::THIS_TX {
            ids.deposit_tx_id = tx_id;
        }
        if ids.bond_tx_id == Id::THIS_TX {
            ids.bond_tx_id = tx_id;
        }
        ids
    }

    /// True if every flag of `state` is locked by the enclosing transaction.
    pub fn is_newly_locked_with(&self, state: LockState) -> bool {
        if !state.is_locked() {
            return false;
        }
        (!state.is_deposited() || self.deposit_tx_id == Id::THIS_TX)
            && (!state.is_bonded() || self.bond_tx_id == Id::THIS_TX)
    }

    /// True if any flag of `state` is held by one of `tx_ids`.
    pub fn is_locked_by_any(&self, state: LockState, tx_ids: &HashSet<Id>) -> bool {
        (state.is_deposited() && tx_ids.contains(&self.deposit_tx_id))
            || (state.is_bonded() && tx_ids.contains(&self.bond_tx_id))
    }
}

/// An output held by one or more locks.
#[derive(Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct LockedOutput {
    /// Locking transactions.
    pub ids: LockIds,
    /// Wrapped payload; must not itself be locked.
    pub out: Box<Output>,
}

impl LockedOutput {
    /// Wrap an output.
    pub fn new(ids: LockIds, out: Output) -> Self {
        Self {
            ids,
            out: Box::new(out),
        }
    }

    /// Structural checks.
    pub fn verify(&self) -> TypesResult<()> {
        let state = self.ids.state();
        if !state.is_locked() {
            return Err(TypesError::InvalidLockState(state.bits()));
        }
        if matches!(*self.out, Output::Locked(_)) {
            return Err(TypesError::NestedLocks);
        }
        self.out.verify()
    }
}

/// An input consuming a locked UTXO.
#[derive(Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct LockedInput {
    /// Locking transactions of the consumed UTXO.
    pub ids: LockIds,
    /// Wrapped payload; must not itself be locked.
    pub input: Box<Input>,
}

impl LockedInput {
    /// Wrap an input.
    pub fn new(ids: LockIds, input: Input) -> Self {
        Self {
            ids,
            input: Box::new(input),
        }
    }

    /// Structural checks.
    pub fn verify(&self) -> TypesResult<()> {
        let state = self.ids.state();
        if !state.is_locked() {
            return Err(TypesError::InvalidLockState(state.bits()));
        }
        if matches!(*self.input, Input::Locked(_)) {
            return Err(TypesError::NestedLocks);
        }
        self.input.verify()
    }
}
