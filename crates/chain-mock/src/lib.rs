//! In-memory reference backend for the `MCK` coin type.
//!
//! `MockChain` holds a main chain, mempool and transaction index that tests
//! drive directly: mine blocks, inject transactions, force reorgs, drop
//! connectivity, reject broadcasts. `MockChainClient` serves that state
//! through the `ChainClient` interface, so wallet code can be exercised
//! against every part of the contract without a node.

pub mod chain;
pub mod client;
pub mod config;
pub mod error;

pub use chain::{ChainEvent, MockChain};
pub use client::MockChainClient;
pub use config::MockChainConfig;
pub use error::MockError;
