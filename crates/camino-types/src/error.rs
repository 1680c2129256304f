//! Error types for structural (syntactic) validation and encoding.

use crate::ids::ShortId;
use thiserror::Error;

/// Errors raised while decoding or syntactically verifying chain types.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TypesError {
    /// Encoding or decoding failed.
    #[error("Codec error: {0}")]
    Codec(String),

    /// Payload was written with a codec version this node does not understand.
    #[error("Unsupported codec version {0}")]
    UnsupportedCodecVersion(u16),

    /// Lock state outside the 2-bit lattice, or a lock wrapper without any lock.
    #[error("Invalid lock state {0}")]
    InvalidLockState(u8),

    /// A locked output/input wraps another locked output/input.
    #[error("Nested locks are not allowed")]
    NestedLocks,

    /// Identifier has the wrong length.
    #[error("Invalid identifier: {0}")]
    InvalidId(String),

    /// Transaction targets another network.
    #[error("Wrong network ID: expected {expected}, got {actual}")]
    WrongNetworkId { expected: u32, actual: u32 },

    /// Transaction targets another chain.
    #[error("Wrong blockchain ID: expected {expected}, got {actual}")]
    WrongChainId { expected: String, actual: String },

    /// Memo exceeds the size limit.
    #[error("Memo too large: {size} bytes, max {max}")]
    MemoTooLarge { size: usize, max: usize },

    /// Inputs must be sorted by UTXO ID and unique.
    #[error("Inputs are not sorted and unique")]
    InputsNotSortedUnique,

    /// Outputs must be sorted by their encoding.
    #[error("Outputs are not sorted")]
    OutputsNotSorted,

    /// An input or output carries no value.
    #[error("Zero amount in {0}")]
    ZeroAmount(&'static str),

    /// Output owners are malformed.
    #[error("Invalid output owners: {0}")]
    InvalidOwners(String),

    /// Validator description is malformed.
    #[error("Invalid validator: {0}")]
    InvalidValidator(String),

    /// Proposal is malformed.
    #[error("Invalid proposal: {0}")]
    InvalidProposal(String),

    /// Deposit offer is malformed.
    #[error("Invalid deposit offer: {0}")]
    InvalidDepositOffer(String),

    /// Generic malformed transaction field.
    #[error("Invalid transaction: {0}")]
    InvalidTx(String),

    /// Voter already voted on the proposal.
    #[error("Address {0} already voted")]
    AlreadyVoted(ShortId),

    /// Vote option index out of range.
    #[error("Vote option {index} out of range ({options} options)")]
    InvalidVoteOption { index: u32, options: usize },

    /// Admin proposals have no voting phase.
    #[error("Voting is not allowed on admin proposals")]
    VotingNotAllowed,

    /// Credential count does not match the transaction.
    #[error("Wrong number of credentials: expected {expected}, got {actual}")]
    WrongCredentialCount { expected: usize, actual: usize },

    /// Signature material is malformed.
    #[error("Invalid signature: {0}")]
    InvalidSignature(String),

    /// Arithmetic overflow while summing amounts.
    #[error("Arithmetic overflow")]
    Overflow,
}

/// Result type for type-level operations.
pub type TypesResult<T> = Result<T, TypesError>;
