//! Validator entries of the primary network and of subnets.

use crate::components::OutputOwners;
use crate::deposit::interest;
use crate::TypesResult;
use crate::ids::{Id, NodeId, PRIMARY_NETWORK_ID};
use serde::{Deserialize, Serialize};

/// Byte length of a staker ordering key.
pub const STAKER_KEY_LENGTH: usize = 8 + 32;

/// A validator of one subnet.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct Staker {
    /// Transaction that added the validator.
    pub tx_id: Id,
    pub node_id: NodeId,
    pub subnet_id: Id,
    pub weight: u64,
    pub start_time: u64,
    pub end_time: u64,
    /// Reward paid at removal; zero for subnet validators.
    pub potential_reward: u64,
    /// Who receives the reward and the returned bond.
    pub reward_owner: OutputOwners,
}

impl Staker {
    pub fn is_primary(&self) -> bool {
        self.subnet_id == PRIMARY_NETWORK_ID
    }

    pub fn duration(&self) -> u64 {
        self.end_time.saturating_sub(self.start_time)
    }

    /// Ordering key of the current set: removal time, then tx ID.
    pub fn current_key(&self) -> [u8; STAKER_KEY_LENGTH] {
        ordering_key(self.end_time, &self.tx_id)
    }

    /// Ordering key of the pending set: start time, then tx ID.
    pub fn pending_key(&self) -> [u8; STAKER_KEY_LENGTH] {
        ordering_key(self.start_time, &self.tx_id)
    }
}

/// Reward of a primary validator bonding `weight` for `duration` seconds.
pub fn validator_reward(weight: u64, duration: u64, rate_nominator: u64) -> TypesResult<u64> {
    interest(weight, duration, rate_nominator)
}

/// Big-endian time followed by tx ID, so byte order is time order.
pub fn ordering_key(time: u64, tx_id: &Id) -> [u8; STAKER_KEY_LENGTH] {
    let mut key = [0u8; STAKER_KEY_LENGTH];
    key[..8].copy_from_slice(&time.to_be_bytes());
    key[8..].copy_from_slice(tx_id.as_bytes());
    key
}
