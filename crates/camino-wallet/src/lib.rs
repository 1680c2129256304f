//! # camino-wallet
//!
//! Keys and transaction construction for the Camino platform chain.
//!
//! This crate provides:
//! - An ed25519 [`Keychain`] addressed the way the chain derives addresses
//! - Input selection over keychain UTXOs that balances every lock pool
//! - [`TxBuilder`]: build-and-sign helpers for every user transaction
//!
//! ## Example
//!
//! ```ignore
//! use camino_wallet::{Keychain, TxBuilder};
//!
//! let keychain = Keychain::new();
//! let address = keychain.import_hex(secret_hex)?;
//!
//! let tx = TxBuilder::new(state.as_ref(), &keychain, &config)
//!     .deposit(offer_id, 5_000, 30 * 24 * 3600, OutputOwners::single(address))?;
//! ```

pub mod builder;
mod error;
mod keychain;
pub mod spend;

pub use builder::TxBuilder;
pub use error::{WalletError, WalletResult};
pub use keychain::Keychain;
pub use spend::{select, Spend, SpendRequest};
