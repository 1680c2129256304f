//! # camino-types
//!
//! Core data types of the Camino platform chain.
//!
//! This crate provides:
//! - Identifiers and the versioned binary codec
//! - The lock model (deposited / bonded / both) over UTXO outputs and inputs
//! - UTXO components, output owners and credentials
//! - Deposit offers, deposits and interest computation
//! - DAC proposals and vote tallying
//! - Stakers, address state flags and transaction variants
//!
//! Everything here is pure data plus structural (state-independent) checks.
//! Semantic verification against chain state lives in `camino-executor`.

pub mod address_state;
pub mod codec;
pub mod components;
pub mod crypto;
pub mod deposit;
mod error;
pub mod ids;
pub mod lock;
pub mod proposal;
pub mod staker;
pub mod txs;

pub use address_state::AddressState;
pub use components::{
    Credential, Input, Output, OutputOwners, SignatureEntry, TransferInput, TransferOutput,
    TransferableInput, TransferableOutput, Utxo, UtxoId,
};
pub use crypto::{address_from_public_key, Ed25519Verifier, SignatureVerifier};
pub use deposit::{Deposit, DepositOffer, INTEREST_RATE_DENOMINATOR};
pub use error::{TypesError, TypesResult};
pub use ids::{Id, NodeId, ShortId, PRIMARY_NETWORK_ID};
pub use lock::{LockIds, LockState, LockedInput, LockedOutput};
pub use proposal::{Proposal, ProposalEffect, ProposalState};
pub use staker::Staker;
pub use txs::{Auth, AuthTarget, CommonFields, Tx, TxContext, UnsignedTx, Validator};
