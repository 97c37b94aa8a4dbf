//! Chain-agnostic wallet interface.
//!
//! Provides:
//! - `ChainClient`, the async contract a blockchain backend implements
//! - the transaction data model (`Transaction`, `SpendInfo`, `Address`,
//!   `Amount`, `BlockInfo`, `EscrowSignature`) with its JSON interchange format
//! - the coin type registry
//! - block and transaction subscription channels with idempotent close

pub mod address;
pub mod amount;
pub mod block;
pub mod client;
pub mod coin_type;
pub mod error;
pub mod escrow;
pub mod subscription;
pub mod transaction;

pub use address::Address;
pub use amount::Amount;
pub use block::BlockInfo;
pub use client::ChainClient;
pub use coin_type::{CoinInfo, CoinType};
pub use error::WalletError;
pub use escrow::EscrowSignature;
pub use subscription::{
    block_channel, transaction_channel, AddressSetChange, BlockSink, BlockSubscription,
    SubscriptionCloser, TransactionSink, TransactionSubscription, DEFAULT_SUBSCRIPTION_BUFFER,
};
pub use transaction::{SpendInfo, Transaction, TransactionId};
