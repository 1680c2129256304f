//! Wallet error types.

use camino_types::{ShortId, TypesError};
use thiserror::Error;

/// Wallet errors.
#[derive(Error, Debug)]
pub enum WalletError {
    /// The keychain holds no keys.
    #[error("Keychain is empty")]
    NoKeys,

    /// No key for an address that must sign.
    #[error("No key for address {0}")]
    KeyNotFound(ShortId),

    /// Malformed key material.
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// Not enough spendable value.
    #[error("Insufficient funds: need {needed}, have {available}")]
    InsufficientFunds { needed: u64, available: u64 },

    /// The keychain cannot satisfy an owner set.
    #[error("Cannot sign: {0}")]
    CannotSign(String),

    /// Types error.
    #[error("Types error: {0}")]
    Types(#[from] TypesError),

    /// State error.
    #[error("State error: {0}")]
    State(#[from] camino_state::StateError),
}

/// Result type for wallet operations.
pub type WalletResult<T> = Result<T, WalletError>;
