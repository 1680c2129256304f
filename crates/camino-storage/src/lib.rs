//! # camino-storage
//!
//! Storage layer for the Camino platform chain.
//!
//! This crate provides a RocksDB-based storage abstraction with support for:
//! - Column families for each part of the chain state (UTXOs, stakers, deposits, proposals, ...)
//! - Atomic batch writes
//! - Ordered prefix iteration for time-keyed indexes
//!
//! [`MemoryStorage`] implements the same contract in memory and is what tests run against.

mod batch;
mod database;
mod error;
mod memory;

pub use batch::{BatchOp, WriteBatch};
pub use database::{ColumnFamily, Database};
pub use error::{StorageError, StorageResult};
pub use memory::MemoryStorage;

/// Storage trait for abstracting database operations.
pub trait Storage: Send + Sync {
    /// Get a value by key from a column family.
    fn get(&self, cf: ColumnFamily, key: &[u8]) -> StorageResult<Option<Vec<u8>>>;

    /// Put a key-value pair into a column family.
    fn put(&self, cf: ColumnFamily, key: &[u8], value: &[u8]) -> StorageResult<()>;

    /// Delete a key from a column family.
    fn delete(&self, cf: ColumnFamily, key: &[u8]) -> StorageResult<()>;

    /// Check if a key exists in a column family.
    fn contains(&self, cf: ColumnFamily, key: &[u8]) -> StorageResult<bool> {
        Ok(self.get(cf, key)?.is_some())
    }

    /// Execute a batch of writes atomically.
    fn write_batch(&self, batch: WriteBatch) -> StorageResult<()>;

    /// All entries whose key starts with `prefix`, in ascending key order.
    fn prefix_iter(&self, cf: ColumnFamily, prefix: &[u8]) -> StorageResult<Vec<(Vec<u8>, Vec<u8>)>>;

    /// All entries of a column family, in ascending key order.
    fn iter(&self, cf: ColumnFamily) -> StorageResult<Vec<(Vec<u8>, Vec<u8>)>> {
        self.prefix_iter(cf, &[])
    }
}
