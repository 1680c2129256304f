//! Storage key layout.
//!
//! Time-ordered indexes start with a big-endian timestamp so that byte order
//! equals time order.

use crate::{StateError, StateResult};
use camino_types::components::UTXO_ID_KEY_LENGTH;
use camino_types::{Id, NodeId, ShortId, UtxoId};

pub const TIMESTAMP: &[u8] = b"timestamp";
pub const CURRENT_SUPPLY: &[u8] = b"current_supply";
pub const BASE_FEE: &[u8] = b"base_fee";
pub const HEIGHT: &[u8] = b"height";

pub fn staker(subnet_id: &Id, node_id: &NodeId) -> Vec<u8> {
    let mut key = Vec::with_capacity(52);
    key.extend_from_slice(subnet_id.as_bytes());
    key.extend_from_slice(node_id.as_bytes());
    key
}

pub fn address_utxo(address: &ShortId, utxo_id: &UtxoId) -> Vec<u8> {
    let mut key = Vec::with_capacity(20 + UTXO_ID_KEY_LENGTH);
    key.extend_from_slice(address.as_bytes());
    key.extend_from_slice(&utxo_id.key());
    key
}

pub fn locked_utxo(lock_tx_id: &Id, utxo_id: &UtxoId) -> Vec<u8> {
    let mut key = Vec::with_capacity(32 + UTXO_ID_KEY_LENGTH);
    key.extend_from_slice(lock_tx_id.as_bytes());
    key.extend_from_slice(&utxo_id.key());
    key
}

/// UTXO ID at the end of an index key.
pub fn utxo_suffix(key: &[u8]) -> StateResult<UtxoId> {
    if key.len() < UTXO_ID_KEY_LENGTH {
        return Err(StateError::Corruption(format!(
            "index key of {} bytes",
            key.len()
        )));
    }
    Ok(UtxoId::from_key(&key[key.len() - UTXO_ID_KEY_LENGTH..])?)
}

pub fn time_index(time: u64, id: &Id) -> Vec<u8> {
    let mut key = Vec::with_capacity(40);
    key.extend_from_slice(&time.to_be_bytes());
    key.extend_from_slice(id.as_bytes());
    key
}

pub fn parse_time_index(key: &[u8]) -> StateResult<(u64, Id)> {
    if key.len() != 40 {
        return Err(StateError::Corruption(format!(
            "time index key of {} bytes",
            key.len()
        )));
    }
    let mut time = [0u8; 8];
    time.copy_from_slice(&key[..8]);
    Ok((u64::from_be_bytes(time), Id::from_slice(&key[8..])?))
}

pub fn weight_diff(height: u64, subnet_id: &Id, node_id: &NodeId) -> Vec<u8> {
    let mut key = Vec::with_capacity(60);
    key.extend_from_slice(&height.to_be_bytes());
    key.extend_from_slice(subnet_id.as_bytes());
    key.extend_from_slice(node_id.as_bytes());
    key
}

pub fn weight_diff_prefix(height: u64, subnet_id: &Id) -> Vec<u8> {
    let mut key = Vec::with_capacity(40);
    key.extend_from_slice(&height.to_be_bytes());
    key.extend_from_slice(subnet_id.as_bytes());
    key
}

/// Node ID at the end of a weight diff key.
pub fn weight_diff_node(key: &[u8]) -> StateResult<NodeId> {
    if key.len() != 60 {
        return Err(StateError::Corruption(format!(
            "weight diff key of {} bytes",
            key.len()
        )));
    }
    let mut node = [0u8; 20];
    node.copy_from_slice(&key[40..]);
    Ok(NodeId(node))
}

pub fn short_id(bytes: &[u8]) -> StateResult<ShortId> {
    Ok(ShortId::from_slice(bytes)?)
}

pub fn node_id(bytes: &[u8]) -> StateResult<NodeId> {
    if bytes.len() != 20 {
        return Err(StateError::Corruption(format!("node ID of {} bytes", bytes.len())));
    }
    let mut node = [0u8; 20];
    node.copy_from_slice(bytes);
    Ok(NodeId(node))
}

pub fn u64_value(bytes: &[u8]) -> StateResult<u64> {
    let array: [u8; 8] = bytes
        .try_into()
        .map_err(|_| StateError::Corruption(format!("u64 value of {} bytes", bytes.len())))?;
    Ok(u64::from_be_bytes(array))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_index_orders_by_time() {
        let a = time_index(5, &Id([9u8; 32]));
        let b = time_index(256, &Id([1u8; 32]));
        assert!(a < b);
        assert_eq!(parse_time_index(&b).unwrap(), (256, Id([1u8; 32])));
    }

    #[test]
    fn test_utxo_suffix() {
        let utxo_id = UtxoId::new(Id([3u8; 32]), 7);
        let key = address_utxo(&ShortId([1u8; 20]), &utxo_id);
        assert_eq!(utxo_suffix(&key).unwrap(), utxo_id);
    }

    #[test]
    fn test_weight_diff_node() {
        let key = weight_diff(3, &Id::EMPTY, &NodeId([4u8; 20]));
        assert_eq!(weight_diff_node(&key).unwrap(), NodeId([4u8; 20]));
        assert!(key.starts_with(&weight_diff_prefix(3, &Id::EMPTY)));
    }
}
