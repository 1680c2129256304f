//! Initial chain state.

use crate::{Chain, State, StateResult};
use camino_types::codec;
use camino_types::{
    AddressState, DepositOffer, Id, LockIds, LockedOutput, NodeId, Output, OutputOwners, ShortId,
    Staker, Utxo, UtxoId, PRIMARY_NETWORK_ID,
};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Unlocked funds at genesis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allocation {
    pub owner: OutputOwners,
    pub amount: u64,
}

/// Primary network validator at genesis, run by a consortium member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisValidator {
    pub node_id: NodeId,
    pub member: ShortId,
    pub weight: u64,
    pub end_time: u64,
}

impl GenesisValidator {
    /// Staking tx ID of this validator.
    pub fn tx_id(&self) -> Id {
        let mut buf = b"genesis validator".to_vec();
        buf.extend_from_slice(self.node_id.as_bytes());
        Id::hash_of(&buf)
    }
}

/// Everything needed to build the state at height 0.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Genesis {
    pub timestamp: u64,
    pub base_fee: u64,
    pub fee_asset_id: Id,
    pub allocations: Vec<Allocation>,
    pub validators: Vec<GenesisValidator>,
    pub address_states: Vec<(ShortId, AddressState)>,
    pub deposit_offers: Vec<DepositOffer>,
}

impl Genesis {
    /// ID of the genesis payload; allocations become UTXOs of this ID.
    pub fn id(&self) -> StateResult<Id> {
        Ok(Id::hash_of(&codec::encode(self)?))
    }

    /// Write the genesis state and commit it as height 0.
    pub fn apply(&self, state: &State) -> StateResult<Id> {
        let genesis_id = self.id()?;
        let mut supply: u64 = 0;

        for (index, allocation) in self.allocations.iter().enumerate() {
            state.add_utxo(Utxo {
                utxo_id: UtxoId::new(genesis_id, index as u32),
                asset_id: self.fee_asset_id,
                out: Output::transfer(allocation.amount, allocation.owner.clone()),
            })?;
            supply = supply.saturating_add(allocation.amount);
        }

        for (address, flags) in &self.address_states {
            state.set_address_state(*address, *flags)?;
        }

        for validator in &self.validators {
            let tx_id = validator.tx_id();
            let owner = OutputOwners::single(validator.member);
            state.add_utxo(Utxo {
                utxo_id: UtxoId::new(tx_id, 0),
                asset_id: self.fee_asset_id,
                out: Output::Locked(LockedOutput::new(
                    LockIds::new(Id::EMPTY, tx_id),
                    Output::transfer(validator.weight, owner.clone()),
                )),
            })?;
            state.set_node_owner(validator.node_id, validator.member)?;
            state.put_current_staker(Staker {
                tx_id,
                node_id: validator.node_id,
                subnet_id: PRIMARY_NETWORK_ID,
                weight: validator.weight,
                start_time: self.timestamp,
                end_time: validator.end_time,
                potential_reward: 0,
                reward_owner: owner,
            })?;
            supply = supply.saturating_add(validator.weight);
        }

        for offer in &self.deposit_offers {
            state.set_deposit_offer(offer.clone())?;
        }

        state.set_timestamp(self.timestamp)?;
        state.set_base_fee(self.base_fee)?;
        state.set_current_supply(supply)?;
        state.commit(0)?;

        info!(
            genesis = %genesis_id,
            supply,
            validators = self.validators.len(),
            "Applied genesis"
        );
        Ok(genesis_id)
    }
}
