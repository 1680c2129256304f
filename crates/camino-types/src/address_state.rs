//! Per-address role and status flags.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Bitmask of roles and statuses held by an address.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct AddressState(pub u64);

impl AddressState {
    /// Bit index of the admin role.
    pub const BIT_ROLE_ADMIN: u8 = 0;
    /// Bit index of the KYC admin role.
    pub const BIT_ROLE_KYC_ADMIN: u8 = 1;
    /// Bit index of the deposit offers admin role.
    pub const BIT_ROLE_OFFERS_ADMIN: u8 = 2;
    /// Bit index of the role allowed to propose admin proposals.
    pub const BIT_ROLE_CONSORTIUM_ADMIN_PROPOSER: u8 = 3;
    /// Bit index of the role allowed to propose base fee changes.
    pub const BIT_ROLE_FEE_PROPOSER: u8 = 4;
    /// Bit index of the KYC verified status.
    pub const BIT_KYC_VERIFIED: u8 = 32;
    /// Bit index of consortium membership.
    pub const BIT_CONSORTIUM: u8 = 38;
    /// Bit index marking a member whose node is deferred.
    pub const BIT_NODE_DEFERRED: u8 = 39;

    pub const EMPTY: AddressState = AddressState(0);
    pub const ROLE_ADMIN: AddressState = AddressState(1 << Self::BIT_ROLE_ADMIN);
    pub const ROLE_KYC_ADMIN: AddressState = AddressState(1 << Self::BIT_ROLE_KYC_ADMIN);
    pub const ROLE_OFFERS_ADMIN: AddressState = AddressState(1 << Self::BIT_ROLE_OFFERS_ADMIN);
    pub const ROLE_CONSORTIUM_ADMIN_PROPOSER: AddressState =
        AddressState(1 << Self::BIT_ROLE_CONSORTIUM_ADMIN_PROPOSER);
    pub const ROLE_FEE_PROPOSER: AddressState = AddressState(1 << Self::BIT_ROLE_FEE_PROPOSER);
    pub const KYC_VERIFIED: AddressState = AddressState(1 << Self::BIT_KYC_VERIFIED);
    pub const CONSORTIUM: AddressState = AddressState(1 << Self::BIT_CONSORTIUM);
    pub const NODE_DEFERRED: AddressState = AddressState(1 << Self::BIT_NODE_DEFERRED);

    /// Mask of every bit with a defined meaning.
    pub const VALID_BITS: AddressState = AddressState(
        Self::ROLE_ADMIN.0
            | Self::ROLE_KYC_ADMIN.0
            | Self::ROLE_OFFERS_ADMIN.0
            | Self::ROLE_CONSORTIUM_ADMIN_PROPOSER.0
            | Self::ROLE_FEE_PROPOSER.0
            | Self::KYC_VERIFIED.0
            | Self::CONSORTIUM.0
            | Self::NODE_DEFERRED.0,
    );

    /// Flag for a bit index, `None` if the bit has no meaning.
    pub fn from_bit(bit: u8) -> Option<AddressState> {
        if bit >= 64 {
            return None;
        }
        let flag = AddressState(1 << bit);
        if Self::VALID_BITS.contains(flag) {
            Some(flag)
        } else {
            None
        }
    }

    /// All bits of `other` are set.
    pub fn contains(self, other: AddressState) -> bool {
        other.0 != 0 && self.0 & other.0 == other.0
    }

    /// Any bit of `other` is set.
    pub fn intersects(self, other: AddressState) -> bool {
        self.0 & other.0 != 0
    }

    /// Copy with the bits of `other` set.
    pub fn with(self, other: AddressState) -> AddressState {
        AddressState(self.0 | other.0)
    }

    /// Copy with the bits of `other` cleared.
    pub fn without(self, other: AddressState) -> AddressState {
        AddressState(self.0 & !other.0)
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Debug for AddressState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AddressState({:#x})", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_bit() {
        assert_eq!(AddressState::from_bit(0), Some(AddressState::ROLE_ADMIN));
        assert_eq!(AddressState::from_bit(38), Some(AddressState::CONSORTIUM));
        assert_eq!(AddressState::from_bit(10), None);
        assert_eq!(AddressState::from_bit(64), None);
    }

    #[test]
    fn test_set_and_clear() {
        let state = AddressState::EMPTY
            .with(AddressState::CONSORTIUM)
            .with(AddressState::KYC_VERIFIED);
        assert!(state.contains(AddressState::CONSORTIUM));
        assert!(!state.contains(AddressState::ROLE_ADMIN));

        let state = state.without(AddressState::CONSORTIUM);
        assert!(!state.intersects(AddressState::CONSORTIUM));
        assert!(state.contains(AddressState::KYC_VERIFIED));
    }
}
