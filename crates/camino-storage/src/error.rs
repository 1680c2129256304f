//! Storage layer errors.

use thiserror::Error;

/// Errors raised by a [`crate::Storage`] backend.
#[derive(Error, Debug)]
pub enum StorageError {
    /// RocksDB error.
    #[error("Database error: {0}")]
    Database(#[from] rocksdb::Error),

    /// The requested column family was never opened.
    #[error("Column family not found: {0}")]
    ColumnFamilyNotFound(&'static str),

    /// A stored value could not be interpreted.
    #[error("Corrupt value in {cf} for key {key}: {reason}")]
    Corruption {
        cf: &'static str,
        key: String,
        reason: String,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
