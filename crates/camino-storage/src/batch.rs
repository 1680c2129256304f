//! Block commit batches.
//!
//! A [`WriteBatch`] holds everything one accepted block writes. Writes are
//! keyed by column family and key, so a key touched several times while the
//! block executed ends up written once with its final value.

use crate::ColumnFamily;
use std::collections::BTreeMap;

/// Final effect of a block on one key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOp {
    Put(Vec<u8>),
    Delete,
}

/// Writes of one block, committed all-or-nothing by
/// [`crate::Storage::write_batch`].
#[derive(Debug, Default)]
pub struct WriteBatch {
    pub(crate) ops: BTreeMap<(ColumnFamily, Vec<u8>), BatchOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value` under `key`, replacing any earlier write to it.
    pub fn put(&mut self, cf: ColumnFamily, key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) {
        self.ops.insert((cf, key.into()), BatchOp::Put(value.into()));
    }

    /// Big-endian counter such as the chain height or timestamp.
    pub fn put_u64(&mut self, cf: ColumnFamily, key: impl Into<Vec<u8>>, value: u64) {
        self.put(cf, key, value.to_be_bytes());
    }

    /// Remove `key`, replacing any earlier write to it.
    pub fn delete(&mut self, cf: ColumnFamily, key: impl Into<Vec<u8>>) {
        self.ops.insert((cf, key.into()), BatchOp::Delete);
    }

    /// Number of distinct keys written.
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Final operation on `key`, if the batch touches it.
    pub fn get(&self, cf: ColumnFamily, key: &[u8]) -> Option<&BatchOp> {
        self.ops.get(&(cf, key.to_vec()))
    }

    /// Writes ordered by column family, then key.
    pub fn into_ops(self) -> impl Iterator<Item = (ColumnFamily, Vec<u8>, BatchOp)> {
        self.ops.into_iter().map(|((cf, key), op)| (cf, key, op))
    }
}
