//! Fixed-size identifiers and hashing.

use crate::{TypesError, TypesResult};
use blake2::{digest::Digest, Blake2b};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Type alias for Blake2b with 256-bit output.
type Blake2b256 = Blake2b<blake2::digest::consts::U32>;

/// BLAKE2b-256 digest of `data`.
pub fn blake2b_256(data: &[u8]) -> [u8; 32] {
    let digest = Blake2b256::digest(data);
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    out
}

const fn tagged(tag: &[u8]) -> [u8; 32] {
    let mut out = [0u8; 32];
    let mut i = 0;
    while i < tag.len() && i < 32 {
        out[i] = tag[i];
        i += 1;
    }
    out
}

/// 32-byte identifier (transactions, assets, subnets, chains, proposals, offers).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct Id(pub [u8; 32]);

impl Id {
    /// The empty ID. Also identifies the primary network.
    pub const EMPTY: Id = Id([0u8; 32]);

    /// Placeholder for "the transaction carrying this output", resolved when
    /// the output becomes a UTXO.
    pub const THIS_TX: Id = Id(tagged(b"this tx id"));

    /// Parse from a 32-byte slice.
    pub fn from_slice(bytes: &[u8]) -> TypesResult<Self> {
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| TypesError::InvalidId(format!("expected 32 bytes, got {}", bytes.len())))?;
        Ok(Id(arr))
    }

    /// Hash arbitrary bytes into an ID.
    pub fn hash_of(data: &[u8]) -> Self {
        Id(blake2b_256(data))
    }

    /// True for [`Id::EMPTY`].
    pub fn is_empty(&self) -> bool {
        *self == Id::EMPTY
    }

    /// Raw bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Derive a child ID, e.g. for system-generated UTXOs.
    pub fn prefixed(&self, index: u64) -> Id {
        let mut buf = Vec::with_capacity(40);
        buf.extend_from_slice(&index.to_be_bytes());
        buf.extend_from_slice(&self.0);
        Id::hash_of(&buf)
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Id({})", hex::encode(&self.0[..8]))
    }
}

/// 20-byte identifier used for addresses.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct ShortId(pub [u8; 20]);

impl ShortId {
    /// The empty address.
    pub const EMPTY: ShortId = ShortId([0u8; 20]);

    /// Parse from a 20-byte slice.
    pub fn from_slice(bytes: &[u8]) -> TypesResult<Self> {
        let arr: [u8; 20] = bytes
            .try_into()
            .map_err(|_| TypesError::InvalidId(format!("expected 20 bytes, got {}", bytes.len())))?;
        Ok(ShortId(arr))
    }

    /// True for [`ShortId::EMPTY`].
    pub fn is_empty(&self) -> bool {
        *self == ShortId::EMPTY
    }

    /// Raw bytes.
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }
}

impl fmt::Display for ShortId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Debug for ShortId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ShortId({})", hex::encode(&self.0[..6]))
    }
}

/// Validator node identifier.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct NodeId(pub [u8; 20]);

impl NodeId {
    /// The empty node ID.
    pub const EMPTY: NodeId = NodeId([0u8; 20]);

    /// True for [`NodeId::EMPTY`].
    pub fn is_empty(&self) -> bool {
        *self == NodeId::EMPTY
    }

    /// Raw bytes.
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeID-{}", hex::encode(self.0))
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", hex::encode(&self.0[..6]))
    }
}

/// Subnet ID of the primary network.
pub const PRIMARY_NETWORK_ID: Id = Id::EMPTY;
