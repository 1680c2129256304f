//! # camino-executor
//!
//! Transaction execution for the Camino platform chain.
//!
//! This crate provides:
//! - Per-kind executors for every transaction of the platform chain
//! - The locked-asset flow check shared by all user transactions
//! - Deterministic construction of system transactions
//! - Block verification and acceptance through [`BlockManager`]
//!
//! ## Architecture
//!
//! Decision transactions run against a [`camino_state::Diff`] and either
//! succeed with all their writes or fail with none. Proposal-style
//! transactions (`AdvanceTime`, `RewardValidator`) yield a commit diff and
//! an abort diff; consensus picks one. The [`BlockManager`] chains the diffs
//! of a block and applies the accepted one to the durable state.

mod block;
pub mod builder;
mod clock;
mod config;
mod error;
pub mod executor;
pub mod utxo;

#[cfg(test)]
mod testing;

pub use block::BlockManager;
pub use builder::{
    build_advance_time_tx, build_finish_proposals_tx, build_reward_validator_tx, next_system_tx,
    staker_to_remove,
};
pub use clock::{Clock, MockClock, SystemClock};
pub use config::{Config, DacConfig, LOCAL_NETWORK_ID, NANO_PER_COIN};
pub use error::{ErrorKind, ExecutorError, ExecutorResult};
pub use executor::{Executor, ProposalOutcome};
