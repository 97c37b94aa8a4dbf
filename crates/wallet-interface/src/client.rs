use async_trait::async_trait;

use crate::address::Address;
use crate::block::BlockInfo;
use crate::coin_type::CoinType;
use crate::error::WalletError;
use crate::subscription::{BlockSubscription, TransactionSubscription};
use crate::transaction::{Transaction, TransactionId};

/// The operation set a chain backend implements for the wallet.
///
/// A client moves through `closed -> open -> closed`; the final close is
/// terminal. Every method except `coin_type`, `open` and `close` requires the
/// open state and fails with `WalletError::Usage` otherwise.
///
/// Implementations are shared across tasks (`Arc<dyn ChainClient>`) and must
/// synchronize internally so that `open`/`close` never overlap an in-flight
/// query.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// The chain this client serves.
    fn coin_type(&self) -> CoinType;

    /// Connect to the backend. `Connection` if it is unreachable.
    async fn open(&self) -> Result<(), WalletError>;

    /// Release every resource and close every subscription handed out.
    async fn close(&self) -> Result<(), WalletError>;

    /// The latest block the backend knows about.
    async fn get_blockchain_info(&self) -> Result<BlockInfo, WalletError>;

    /// Transactions touching `addr` at or above `from_height`, ascending by
    /// height then arrival. Unconfirmed transactions are always included.
    /// An address with no activity yields an empty list.
    async fn get_address_transactions(
        &self,
        addr: &Address,
        from_height: u64,
    ) -> Result<Vec<Transaction>, WalletError>;

    /// `NotFound` if the backend does not know `id`.
    async fn get_transaction(&self, id: &TransactionId) -> Result<Transaction, WalletError>;

    /// Whether `block` is on the backend's current best chain. Reflects the
    /// reorg state at call time.
    async fn is_block_in_main_chain(&self, block: &BlockInfo) -> Result<bool, WalletError>;

    /// Push every transaction touching the (dynamic) address set.
    async fn subscribe_transactions(
        &self,
        addrs: Vec<Address>,
    ) -> Result<TransactionSubscription, WalletError>;

    /// Push every newly observed block.
    async fn subscribe_blocks(&self) -> Result<BlockSubscription, WalletError>;

    /// Submit a backend-encoded transaction. Rejections are `Backend`
    /// errors; connectivity failures are `Connection` errors.
    async fn broadcast(&self, serialized_tx: &[u8]) -> Result<(), WalletError>;
}
