use async_trait::async_trait;
use tokio::sync::{mpsc, RwLock};
use wallet_interface::{
    block_channel, transaction_channel, Address, BlockInfo, BlockSink, BlockSubscription,
    ChainClient, CoinType, SubscriptionCloser, Transaction, TransactionId, TransactionSink,
    TransactionSubscription, WalletError,
};

use crate::chain::{ChainEvent, MockChain};

enum ClientState {
    /// Constructed, never opened.
    Idle,
    Open {
        subscriptions: Vec<SubscriptionCloser>,
    },
    /// Terminal.
    Closed,
}

/// `ChainClient` over a shared `MockChain`.
///
/// Queries hold a read guard on the lifecycle state for their whole
/// duration, so `open` and `close` (write guard) never overlap one.
pub struct MockChainClient {
    chain: MockChain,
    state: RwLock<ClientState>,
}

impl MockChainClient {
    /// Wrap `chain` in an idle client; call `open` before querying.
    pub fn new(chain: MockChain) -> Self {
        MockChainClient {
            chain,
            state: RwLock::new(ClientState::Idle),
        }
    }

    pub fn chain(&self) -> &MockChain {
        &self.chain
    }

    fn require_open(state: &ClientState) -> Result<(), WalletError> {
        match state {
            ClientState::Open { .. } => Ok(()),
            ClientState::Idle => Err(WalletError::Usage("client is not open".into())),
            ClientState::Closed => Err(WalletError::Usage("client is closed".into())),
        }
    }

    fn track(state: &mut ClientState, closer: SubscriptionCloser) {
        if let ClientState::Open { subscriptions } = state {
            subscriptions.retain(|c| !c.is_closed());
            subscriptions.push(closer);
        }
    }
}

async fn forward_blocks(sink: BlockSink, mut events: mpsc::Receiver<ChainEvent>) {
    loop {
        let event = tokio::select! {
            biased;
            _ = sink.closed() => break,
            event = events.recv() => event,
        };
        match event {
            Some(ChainEvent::Block(block)) => {
                let height = block.height;
                if !sink.send(block).await {
                    break;
                }
                tracing::debug!(height, "delivered block");
            }
            Some(ChainEvent::Transaction(_)) => {}
            None => break,
        }
    }
}

/// Sole owner of the subscription's address set: address changes and chain
/// events are handled one at a time, changes first.
async fn forward_transactions(
    mut sink: TransactionSink,
    mut events: mpsc::Receiver<ChainEvent>,
) {
    loop {
        tokio::select! {
            biased;
            change = sink.next_change() => match change {
                Some(change) => sink.apply(change),
                None => break,
            },
            event = events.recv() => match event {
                Some(ChainEvent::Transaction(tx)) => {
                    let txid = tx.id.clone();
                    if sink.send_if_watched(tx).await {
                        tracing::debug!(%txid, "delivered transaction");
                    } else if sink.is_closed() {
                        break;
                    }
                }
                Some(ChainEvent::Block(_)) => {}
                None => break,
            },
        }
    }
}

#[async_trait]
impl ChainClient for MockChainClient {
    fn coin_type(&self) -> CoinType {
        self.chain.config().coin_type
    }

    async fn open(&self) -> Result<(), WalletError> {
        let mut state = self.state.write().await;
        match *state {
            ClientState::Idle => {}
            ClientState::Open { .. } => {
                return Err(WalletError::Usage("client is already open".into()))
            }
            ClientState::Closed => {
                return Err(WalletError::Usage("client is closed and cannot reopen".into()))
            }
        }
        if let Err(e) = self.chain.blockchain_info() {
            tracing::warn!(error = %e, "mock backend unreachable on open");
            return Err(e.into());
        }
        *state = ClientState::Open {
            subscriptions: Vec::new(),
        };
        tracing::info!(coin = %self.chain.config().coin_type, "mock chain client opened");
        Ok(())
    }

    async fn close(&self) -> Result<(), WalletError> {
        let mut state = self.state.write().await;
        let previous = std::mem::replace(&mut *state, ClientState::Closed);
        if let ClientState::Open { subscriptions } = previous {
            let count = subscriptions.len();
            for closer in subscriptions {
                closer.close();
            }
            tracing::info!(subscriptions = count, "mock chain client closed");
        }
        Ok(())
    }

    async fn get_blockchain_info(&self) -> Result<BlockInfo, WalletError> {
        let state = self.state.read().await;
        Self::require_open(&state)?;
        Ok(self.chain.blockchain_info()?)
    }

    async fn get_address_transactions(
        &self,
        addr: &Address,
        from_height: u64,
    ) -> Result<Vec<Transaction>, WalletError> {
        let state = self.state.read().await;
        Self::require_open(&state)?;
        Ok(self.chain.address_transactions(addr, from_height)?)
    }

    async fn get_transaction(&self, id: &TransactionId) -> Result<Transaction, WalletError> {
        let state = self.state.read().await;
        Self::require_open(&state)?;
        Ok(self.chain.transaction(id)?)
    }

    async fn is_block_in_main_chain(&self, block: &BlockInfo) -> Result<bool, WalletError> {
        let state = self.state.read().await;
        Self::require_open(&state)?;
        Ok(self.chain.is_in_main_chain(block)?)
    }

    async fn subscribe_transactions(
        &self,
        addrs: Vec<Address>,
    ) -> Result<TransactionSubscription, WalletError> {
        let mut state = self.state.write().await;
        Self::require_open(&state)?;

        let (sink, subscription) =
            transaction_channel(addrs, self.chain.config().subscription_buffer);
        let (listener, events) = self.chain.listen(sink.closer());
        let chain = self.chain.clone();
        sink.on_close(move || chain.unlisten(listener));
        Self::track(&mut state, sink.closer());

        tracing::debug!(listener, addresses = sink.addresses().len(), "transaction subscription opened");
        tokio::spawn(forward_transactions(sink, events));
        Ok(subscription)
    }

    async fn subscribe_blocks(&self) -> Result<BlockSubscription, WalletError> {
        let mut state = self.state.write().await;
        Self::require_open(&state)?;

        let (sink, subscription) = block_channel(self.chain.config().subscription_buffer);
        let (listener, events) = self.chain.listen(sink.closer());
        let chain = self.chain.clone();
        sink.on_close(move || chain.unlisten(listener));
        Self::track(&mut state, sink.closer());

        tracing::debug!(listener, "block subscription opened");
        tokio::spawn(forward_blocks(sink, events));
        Ok(subscription)
    }

    async fn broadcast(&self, serialized_tx: &[u8]) -> Result<(), WalletError> {
        let state = self.state.read().await;
        Self::require_open(&state)?;
        match self.chain.submit(serialized_tx) {
            Ok(txid) => {
                tracing::info!(%txid, "broadcast accepted");
                Ok(())
            }
            Err(e) => {
                tracing::warn!(error = %e, "broadcast failed");
                Err(e.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MockChainConfig;

    fn client() -> MockChainClient {
        MockChainClient::new(MockChain::new(MockChainConfig::default()).unwrap())
    }

    #[tokio::test]
    async fn queries_require_open() {
        let client = client();
        assert!(matches!(
            client.get_blockchain_info().await,
            Err(WalletError::Usage(_))
        ));
        assert!(matches!(
            client.subscribe_blocks().await,
            Err(WalletError::Usage(_))
        ));
    }

    #[tokio::test]
    async fn open_then_query() {
        let client = client();
        client.open().await.unwrap();
        let tip = client.get_blockchain_info().await.unwrap();
        assert_eq!(tip.height, 0);
        assert_eq!(client.coin_type(), CoinType::MOCK);
    }

    #[tokio::test]
    async fn open_twice_is_usage_error() {
        let client = client();
        client.open().await.unwrap();
        assert!(matches!(client.open().await, Err(WalletError::Usage(_))));
    }

    #[tokio::test]
    async fn close_is_terminal() {
        let client = client();
        client.open().await.unwrap();
        client.close().await.unwrap();
        client.close().await.unwrap();
        assert!(matches!(client.open().await, Err(WalletError::Usage(_))));
        assert!(matches!(
            client.get_transaction(&TransactionId::new("x")).await,
            Err(WalletError::Usage(_))
        ));
    }

    #[tokio::test]
    async fn open_fails_when_unreachable() {
        let client = client();
        client.chain().set_reachable(false);
        let err = client.open().await.unwrap_err();
        assert!(matches!(err, WalletError::Connection(_)));

        client.chain().set_reachable(true);
        client.open().await.unwrap();
    }

    #[tokio::test]
    async fn dropped_subscription_releases_listener() {
        let client = client();
        client.open().await.unwrap();
        let sub = client.subscribe_blocks().await.unwrap();
        assert_eq!(client.chain().listener_count(), 1);
        drop(sub);
        assert_eq!(client.chain().listener_count(), 0);
    }

    #[tokio::test]
    async fn lagging_subscription_is_closed_and_released() {
        let chain = MockChain::new(MockChainConfig {
            subscription_buffer: 1,
            ..MockChainConfig::default()
        })
        .unwrap();
        let client = MockChainClient::new(chain);
        client.open().await.unwrap();
        let sub = client.subscribe_blocks().await.unwrap();

        // The forwarding task has not run yet, so the listener queue fills.
        client.chain().mine_blocks(2).unwrap();
        assert!(sub.is_closed());
        assert_eq!(client.chain().listener_count(), 0);
    }
}
