//! Test data generators for integration tests.
//!
//! Deterministic identifiers, key seeds and owner sets. Seeds map to the
//! same values on every run so scenario failures reproduce exactly.

use camino_types::{Id, NodeId, OutputOwners, ShortId};
use std::sync::atomic::{AtomicU64, Ordering};

/// Global counter for unique ID generation
static ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Generate a deterministic 32-byte ID from a seed.
pub fn test_id(seed: u8) -> Id {
    let mut id = [0u8; 32];
    id[0] = seed;
    id[31] = seed.wrapping_mul(7);
    Id(id)
}

/// Generate a unique ID (without seed, uses atomic counter).
pub fn unique_id() -> Id {
    let counter = ID_COUNTER.fetch_add(1, Ordering::SeqCst);
    let mut id = [0u8; 32];
    id[0] = 0xAA;
    id[1..9].copy_from_slice(&counter.to_be_bytes());
    Id(id)
}

/// Generate a deterministic address from a seed.
pub fn test_short_id(seed: u8) -> ShortId {
    let mut id = [0u8; 20];
    id[0] = seed;
    id[19] = seed.wrapping_mul(3);
    ShortId(id)
}

/// Node ID of the `index`-th genesis validator.
pub fn test_node_id(index: usize) -> NodeId {
    NodeId([index as u8 + 1; 20])
}

/// Secret key seed; the harness derives member keys from `1..` and the
/// admin key from [`ADMIN_SEED`].
pub fn key_seed(seed: u8) -> [u8; 32] {
    [seed; 32]
}

/// Seed of the admin key.
pub const ADMIN_SEED: u8 = 100;

/// Single-owner set for a generated address.
pub fn test_owners(seed: u8) -> OutputOwners {
    OutputOwners::single(test_short_id(seed))
}
