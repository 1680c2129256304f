//! Error types for transaction execution.

use camino_state::StateError;
use camino_types::{Id, NodeId, ShortId, TypesError, UtxoId};
use thiserror::Error;

/// How a failure should be handled by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed transaction; never valid.
    Structural,
    /// Invalid against the current state; dropped from the pending pool.
    Semantic,
    /// Time advancement out of bounds; the builder must pick another time.
    Scheduling,
    /// A referenced entity does not exist.
    NotFound,
    /// Storage or encoding failure.
    Internal,
}

/// Transaction execution errors.
#[derive(Error, Debug)]
pub enum ExecutorError {
    /// Syntactic verification failed.
    #[error("Malformed transaction: {0}")]
    Malformed(#[from] TypesError),

    /// State access failed.
    #[error("State error: {0}")]
    State(#[from] StateError),

    #[error("Wrong block type: {0}")]
    WrongBlockType(String),

    /// The block was verified against a state that is no longer the last accepted one.
    #[error("Stale block: built on height {parent}, last accepted height is {current}")]
    StaleBlock { parent: u64, current: u64 },

    #[error("Block is not built on the last accepted state")]
    DetachedBlock,

    #[error("Input {utxo_id} does not match the UTXO it spends: {reason}")]
    InputMismatch { utxo_id: UtxoId, reason: String },

    #[error("Locked UTXO {0} cannot be spent by this transaction")]
    LockedInputNotSpendable(UtxoId),

    #[error("Lock not allowed: {0}")]
    LockNotAllowed(String),

    #[error("Flow check failed for asset {asset_id}: consumed {consumed}, produced {produced}")]
    FlowCheckFailed {
        asset_id: Id,
        consumed: u64,
        produced: u64,
    },

    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Node {node_id} is already a validator of subnet {subnet_id}")]
    DuplicateValidator { subnet_id: Id, node_id: NodeId },

    #[error("Wrong bond amount: expected {expected}, got {actual}")]
    WrongBondAmount { expected: u64, actual: u64 },

    #[error("Invalid validator period: {0}")]
    InvalidValidatorPeriod(String),

    #[error("Node {0} is not registered")]
    NodeNotRegistered(NodeId),

    #[error("Invalid node registration: {0}")]
    InvalidNodeRegistration(String),

    #[error("Address {0} is not a consortium member")]
    NotConsortiumMember(ShortId),

    #[error("Invalid deposit: {0}")]
    InvalidDeposit(String),

    #[error("Invalid deposit offer: {0}")]
    InvalidDepositOffer(String),

    #[error("Claim of {requested} exceeds claimable {available}")]
    InsufficientClaimable { requested: u64, available: u64 },

    #[error("Invalid proposal: {0}")]
    InvalidProposal(String),

    #[error("An exclusion proposal for {0} is already active")]
    ExclusionAlreadyActive(ShortId),

    #[error("Proposal {0} is not open for voting")]
    ProposalNotActive(Id),

    #[error("Address {0} may not vote")]
    NotAllowedToVote(ShortId),

    #[error("Invalid vote: {0}")]
    InvalidVote(TypesError),

    #[error("Timestamp too early: proposed {proposed}, current {current}")]
    TimestampTooEarly { proposed: u64, current: u64 },

    #[error("Timestamp too late: proposed {proposed}, next chain event at {bound}")]
    TimestampTooLate { proposed: u64, bound: u64 },

    #[error("Timestamp too far in the future: proposed {proposed}, local limit {limit}")]
    TimestampInFuture { proposed: u64, limit: u64 },

    #[error("Unexpected system transaction: expected {expected}, got {actual}")]
    UnexpectedSystemTx { expected: String, actual: String },

    #[error("Arithmetic overflow")]
    Overflow,
}

impl ExecutorError {
    /// Classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ExecutorError::Malformed(_) | ExecutorError::WrongBlockType(_) => ErrorKind::Structural,
            ExecutorError::State(e) if e.is_not_found() => ErrorKind::NotFound,
            ExecutorError::State(_) | ExecutorError::Overflow => ErrorKind::Internal,
            ExecutorError::TimestampTooEarly { .. }
            | ExecutorError::TimestampTooLate { .. }
            | ExecutorError::TimestampInFuture { .. }
            | ExecutorError::UnexpectedSystemTx { .. }
            | ExecutorError::StaleBlock { .. }
            | ExecutorError::DetachedBlock => ErrorKind::Scheduling,
            _ => ErrorKind::Semantic,
        }
    }

    /// True if a referenced entity is missing.
    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }
}

/// Result type for execution.
pub type ExecutorResult<T> = Result<T, ExecutorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            ExecutorError::Malformed(TypesError::NestedLocks).kind(),
            ErrorKind::Structural
        );
        assert_eq!(
            ExecutorError::State(StateError::DepositNotFound(Id::EMPTY)).kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            ExecutorError::State(StateError::Corruption("x".to_string())).kind(),
            ErrorKind::Internal
        );
        assert_eq!(
            ExecutorError::TimestampTooLate {
                proposed: 2,
                bound: 1
            }
            .kind(),
            ErrorKind::Scheduling
        );
        assert_eq!(
            ExecutorError::WrongBondAmount {
                expected: 1,
                actual: 2
            }
            .kind(),
            ErrorKind::Semantic
        );
    }
}
