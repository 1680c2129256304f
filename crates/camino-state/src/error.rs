//! Error types for chain state access.

use camino_types::{Id, NodeId, TypesError, UtxoId};
use thiserror::Error;

/// Chain state errors.
#[derive(Error, Debug)]
pub enum StateError {
    /// Storage error.
    #[error("Storage error: {0}")]
    Storage(#[from] camino_storage::StorageError),

    /// Encoding or decoding of a stored value failed.
    #[error("Codec error: {0}")]
    Types(#[from] TypesError),

    #[error("UTXO not found: {0}")]
    UtxoNotFound(UtxoId),

    #[error("Staker not found: node {node_id} on subnet {subnet_id}")]
    StakerNotFound { subnet_id: Id, node_id: NodeId },

    #[error("Subnet not found: {0}")]
    SubnetNotFound(Id),

    #[error("Chain not found: {0}")]
    ChainNotFound(Id),

    #[error("Deposit offer not found: {0}")]
    DepositOfferNotFound(Id),

    #[error("Deposit not found: {0}")]
    DepositNotFound(Id),

    #[error("Proposal not found: {0}")]
    ProposalNotFound(Id),

    #[error("Transaction not found: {0}")]
    TxNotFound(Id),

    /// A time index is empty.
    #[error("Nothing scheduled: {0}")]
    NothingScheduled(&'static str),

    /// Weight history does not reach back to the requested height.
    #[error("Weight history unavailable for height {requested} (last accepted {last})")]
    HeightUnavailable { requested: u64, last: u64 },

    /// Stored data is inconsistent.
    #[error("Corrupted state: {0}")]
    Corruption(String),

    /// Invalid state transition.
    #[error("Invalid state transition: {0}")]
    InvalidTransition(String),
}

impl StateError {
    /// True for missing-entity errors that callers may treat as a negative answer.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            StateError::UtxoNotFound(_)
                | StateError::StakerNotFound { .. }
                | StateError::SubnetNotFound(_)
                | StateError::ChainNotFound(_)
                | StateError::DepositOfferNotFound(_)
                | StateError::DepositNotFound(_)
                | StateError::ProposalNotFound(_)
                | StateError::TxNotFound(_)
                | StateError::NothingScheduled(_)
        )
    }
}

/// Result type for state operations.
pub type StateResult<T> = Result<T, StateError>;

/// Extension for turning not-found errors into `None`.
pub trait OptionalExt<T> {
    /// `Ok(None)` for not-found errors, other errors unchanged.
    fn optional(self) -> StateResult<Option<T>>;
}

impl<T> OptionalExt<T> for StateResult<T> {
    fn optional(self) -> StateResult<Option<T>> {
        match self {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }
}
