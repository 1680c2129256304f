//! # camino-tests
//!
//! Integration tests for the Camino platform chain engine.
//!
//! This crate provides end-to-end testing including:
//! - Scenario tests driving deposits, staking and governance through blocks
//! - State tests for persistence and staker history on RocksDB
//! - Property-based tests for the lock algebra, value conservation, vote
//!   tallying and chain time

pub mod generators;
pub mod harness;



#[cfg(test)]
mod property_tests;

pub use generators::*;
pub use harness::*;
