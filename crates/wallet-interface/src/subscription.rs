//! Push delivery of new blocks and address-filtered transactions.
//!
//! Each subscription is a bounded `mpsc` channel split into a consumer half
//! (`BlockSubscription`, `TransactionSubscription`) handed to the wallet and
//! a producer half (`BlockSink`, `TransactionSink`) kept by the backend.
//! A full buffer makes the producer wait; events are never dropped.
//!
//! Both halves share a `SubscriptionCloser`. Closing from either side, any
//! number of times and from any task, cancels the subscription: release
//! hooks registered by the backend run exactly once and `recv` yields `None`
//! from then on, even if events are still buffered.

use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::address::Address;
use crate::block::BlockInfo;
use crate::error::WalletError;
use crate::transaction::Transaction;

/// Buffer size used by backends that have no configured capacity.
pub const DEFAULT_SUBSCRIPTION_BUFFER: usize = 64;

type CloseHook = Box<dyn FnOnce() + Send + 'static>;

struct CloseState {
    token: CancellationToken,
    /// `None` once the hooks have been taken by the first `close`.
    hooks: Mutex<Option<Vec<CloseHook>>>,
}

/// Shared, idempotent shutdown handle for one subscription.
#[derive(Clone)]
pub struct SubscriptionCloser {
    inner: Arc<CloseState>,
}

impl SubscriptionCloser {
    fn new() -> Self {
        SubscriptionCloser {
            inner: Arc::new(CloseState {
                token: CancellationToken::new(),
                hooks: Mutex::new(Some(Vec::new())),
            }),
        }
    }

    /// Cancel the subscription. Safe to call repeatedly and concurrently;
    /// never blocks on the consumer or the producer.
    pub fn close(&self) {
        let hooks = self
            .inner
            .hooks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        self.inner.token.cancel();
        if let Some(hooks) = hooks {
            tracing::debug!(hooks = hooks.len(), "subscription closed");
            for hook in hooks {
                hook();
            }
        }
    }

    pub fn is_closed(&self) -> bool {
        self.inner.token.is_cancelled()
    }

    /// Resolves once the subscription is closed.
    pub async fn closed(&self) {
        self.inner.token.cancelled().await
    }

    /// Register a release hook. Runs immediately if already closed.
    pub fn on_close(&self, hook: impl FnOnce() + Send + 'static) {
        let mut guard = self
            .inner
            .hooks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(hooks) = guard.as_mut() {
            hooks.push(Box::new(hook));
            return;
        }
        drop(guard);
        hook();
    }
}

impl fmt::Debug for SubscriptionCloser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionCloser")
            .field("closed", &self.is_closed())
            .finish()
    }
}

async fn recv_until_closed<T>(rx: &mut mpsc::Receiver<T>, closer: &SubscriptionCloser) -> Option<T> {
    if closer.is_closed() {
        return None;
    }
    tokio::select! {
        biased;
        _ = closer.closed() => None,
        event = rx.recv() => event,
    }
}

async fn send_until_closed<T>(tx: &mpsc::Sender<T>, closer: &SubscriptionCloser, event: T) -> bool {
    if closer.is_closed() {
        return false;
    }
    tokio::select! {
        biased;
        _ = closer.closed() => false,
        res = tx.send(event) => res.is_ok(),
    }
}

/// Create a block subscription pair with the given buffer capacity.
pub fn block_channel(capacity: usize) -> (BlockSink, BlockSubscription) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let closer = SubscriptionCloser::new();
    (
        BlockSink {
            tx,
            closer: closer.clone(),
        },
        BlockSubscription { out: rx, closer },
    )
}

/// Consumer half of a block subscription.
///
/// Delivers one `BlockInfo` per newly observed block in chain order. After
/// a reorg the same height arrives again with a different hash; use
/// `ChainClient::is_block_in_main_chain` to resolve which one stands.
#[derive(Debug)]
pub struct BlockSubscription {
    out: mpsc::Receiver<BlockInfo>,
    closer: SubscriptionCloser,
}

impl BlockSubscription {
    /// Next block, or `None` once the subscription is closed.
    pub async fn recv(&mut self) -> Option<BlockInfo> {
        recv_until_closed(&mut self.out, &self.closer).await
    }

    /// Non-blocking variant of `recv`.
    pub fn try_recv(&mut self) -> Option<BlockInfo> {
        if self.closer.is_closed() {
            return None;
        }
        self.out.try_recv().ok()
    }

    pub fn close(&self) {
        self.closer.close();
    }

    pub fn is_closed(&self) -> bool {
        self.closer.is_closed()
    }

    /// Handle for closing from another task while this one awaits `recv`.
    pub fn closer(&self) -> SubscriptionCloser {
        self.closer.clone()
    }
}

impl Drop for BlockSubscription {
    fn drop(&mut self) {
        self.closer.close();
    }
}

/// Producer half of a block subscription.
#[derive(Debug)]
pub struct BlockSink {
    tx: mpsc::Sender<BlockInfo>,
    closer: SubscriptionCloser,
}

impl BlockSink {
    /// Deliver a block, waiting for buffer space. Returns `false` if the
    /// subscription closed first.
    pub async fn send(&self, block: BlockInfo) -> bool {
        send_until_closed(&self.tx, &self.closer, block).await
    }

    pub fn is_closed(&self) -> bool {
        self.closer.is_closed()
    }

    pub async fn closed(&self) {
        self.closer.closed().await
    }

    pub fn on_close(&self, hook: impl FnOnce() + Send + 'static) {
        self.closer.on_close(hook);
    }

    pub fn closer(&self) -> SubscriptionCloser {
        self.closer.clone()
    }
}

impl Drop for BlockSink {
    fn drop(&mut self) {
        self.closer.close();
    }
}

/// A change to the address set of a transaction subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddressSetChange {
    Subscribe(Vec<Address>),
    Unsubscribe(Vec<Address>),
}

/// Create a transaction subscription pair watching `addrs`.
pub fn transaction_channel(
    addrs: Vec<Address>,
    capacity: usize,
) -> (TransactionSink, TransactionSubscription) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let (control_tx, control_rx) = mpsc::unbounded_channel();
    let closer = SubscriptionCloser::new();
    (
        TransactionSink {
            tx,
            control: control_rx,
            addresses: addrs.into_iter().collect(),
            closer: closer.clone(),
        },
        TransactionSubscription {
            out: rx,
            control: control_tx,
            closer,
        },
    )
}

/// Consumer half of a transaction subscription.
///
/// A transaction is typically delivered twice: once when first seen
/// unconfirmed and again when confirmed. Deduplication is the caller's job.
#[derive(Debug)]
pub struct TransactionSubscription {
    out: mpsc::Receiver<Transaction>,
    control: mpsc::UnboundedSender<AddressSetChange>,
    closer: SubscriptionCloser,
}

impl TransactionSubscription {
    pub async fn recv(&mut self) -> Option<Transaction> {
        recv_until_closed(&mut self.out, &self.closer).await
    }

    pub fn try_recv(&mut self) -> Option<Transaction> {
        if self.closer.is_closed() {
            return None;
        }
        self.out.try_recv().ok()
    }

    /// Start watching `addrs`. Applies to events the backend observes after
    /// it processes this change.
    pub fn subscribe(&self, addrs: Vec<Address>) -> Result<(), WalletError> {
        self.send_change(AddressSetChange::Subscribe(addrs))
    }

    /// Stop watching `addrs`. Events already in flight may still arrive.
    pub fn unsubscribe(&self, addrs: Vec<Address>) -> Result<(), WalletError> {
        self.send_change(AddressSetChange::Unsubscribe(addrs))
    }

    fn send_change(&self, change: AddressSetChange) -> Result<(), WalletError> {
        if self.closer.is_closed() {
            return Err(WalletError::Usage("transaction subscription is closed".into()));
        }
        self.control
            .send(change)
            .map_err(|_| WalletError::Usage("transaction subscription is closed".into()))
    }

    pub fn close(&self) {
        self.closer.close();
    }

    pub fn is_closed(&self) -> bool {
        self.closer.is_closed()
    }

    pub fn closer(&self) -> SubscriptionCloser {
        self.closer.clone()
    }
}

impl Drop for TransactionSubscription {
    fn drop(&mut self) {
        self.closer.close();
    }
}

/// Producer half of a transaction subscription. Owns the address set, so
/// set changes and filtering are applied by whichever single task holds it.
#[derive(Debug)]
pub struct TransactionSink {
    tx: mpsc::Sender<Transaction>,
    control: mpsc::UnboundedReceiver<AddressSetChange>,
    addresses: HashSet<Address>,
    closer: SubscriptionCloser,
}

impl TransactionSink {
    pub fn addresses(&self) -> &HashSet<Address> {
        &self.addresses
    }

    /// Whether `tx` touches any watched address.
    pub fn watches(&self, tx: &Transaction) -> bool {
        tx.from
            .iter()
            .chain(tx.to.iter())
            .any(|s| self.addresses.contains(&s.address))
    }

    pub fn apply(&mut self, change: AddressSetChange) {
        match change {
            AddressSetChange::Subscribe(addrs) => self.addresses.extend(addrs),
            AddressSetChange::Unsubscribe(addrs) => {
                for addr in &addrs {
                    self.addresses.remove(addr);
                }
            }
        }
    }

    /// Apply every change written so far. Returns how many were applied.
    pub fn apply_pending_changes(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(change) = self.control.try_recv() {
            self.apply(change);
            applied += 1;
        }
        applied
    }

    /// Wait for the next address-set change, or `None` once closed.
    pub async fn next_change(&mut self) -> Option<AddressSetChange> {
        if self.closer.is_closed() {
            return None;
        }
        tokio::select! {
            biased;
            _ = self.closer.closed() => None,
            change = self.control.recv() => change,
        }
    }

    /// Deliver `tx` unconditionally, waiting for buffer space. Returns
    /// `false` if the subscription closed first.
    pub async fn send(&self, tx: Transaction) -> bool {
        send_until_closed(&self.tx, &self.closer, tx).await
    }

    /// Bring the address set up to date, then deliver `tx` if it touches a
    /// watched address. Returns whether it was delivered.
    pub async fn send_if_watched(&mut self, tx: Transaction) -> bool {
        self.apply_pending_changes();
        if !self.watches(&tx) {
            return false;
        }
        self.send(tx).await
    }

    pub fn is_closed(&self) -> bool {
        self.closer.is_closed()
    }

    pub async fn closed(&self) {
        self.closer.closed().await
    }

    pub fn on_close(&self, hook: impl FnOnce() + Send + 'static) {
        self.closer.on_close(hook);
    }

    pub fn closer(&self) -> SubscriptionCloser {
        self.closer.clone()
    }
}

impl Drop for TransactionSink {
    fn drop(&mut self) {
        self.closer.close();
    }
}
