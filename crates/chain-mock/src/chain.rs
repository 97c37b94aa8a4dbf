//! In-memory chain state shared by every `MockChainClient` attached to it.
//!
//! Tests drive the chain directly (`mine_block`, `reorg`,
//! `add_mempool_transaction`, `set_reachable`) and observe the effects
//! through the `ChainClient` interface.
//!
//! Each listener has a bounded queue of `subscriptionBuffer` events. The
//! chain never waits on a listener: one whose queue is full is dropped and
//! its subscription closed, so a stalled consumer costs at most its two
//! buffers.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use sha2::{Digest, Sha256};
use tokio::sync::mpsc::{self, error::TrySendError};
use wallet_interface::{Address, BlockInfo, SubscriptionCloser, Transaction, TransactionId};

use crate::config::MockChainConfig;
use crate::error::MockError;

/// An event fanned out to every listener, in the order the chain produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainEvent {
    Block(BlockInfo),
    Transaction(Transaction),
}

/// Handle to a shared mock chain. Cloning shares the same state.
#[derive(Clone)]
pub struct MockChain {
    inner: Arc<Mutex<ChainState>>,
}

struct TxEntry {
    /// Arrival order, used to break height ties.
    seq: u64,
    tx: Transaction,
}

struct Listener {
    tx: mpsc::Sender<ChainEvent>,
    /// Closed when the listener falls behind.
    closer: SubscriptionCloser,
}

struct ChainState {
    config: MockChainConfig,
    reachable: bool,
    broadcast_rejection: Option<String>,
    /// `main_chain[h].height == h`; index 0 is genesis.
    main_chain: Vec<BlockInfo>,
    /// Every block ever connected, orphans included, by hash.
    blocks: HashMap<String, BlockInfo>,
    transactions: HashMap<TransactionId, TxEntry>,
    next_seq: u64,
    mempool: Vec<TransactionId>,
    block_txs: HashMap<String, Vec<TransactionId>>,
    listeners: HashMap<u64, Listener>,
    next_listener: u64,
    /// Subscriptions to close once the lock is released.
    lagged: Vec<SubscriptionCloser>,
}

fn double_sha256(data: &[u8]) -> [u8; 32] {
    let first = Sha256::digest(data);
    Sha256::digest(first).into()
}

fn block_hash(prev_hash: &str, height: u64, salt: u64) -> String {
    let mut preimage = Vec::with_capacity(prev_hash.len() + 16);
    preimage.extend_from_slice(prev_hash.as_bytes());
    preimage.extend_from_slice(&height.to_le_bytes());
    preimage.extend_from_slice(&salt.to_le_bytes());
    hex::encode(double_sha256(&preimage))
}

/// Transaction ID for a broadcast that did not carry one.
pub fn derive_transaction_id(serialized_tx: &[u8]) -> TransactionId {
    TransactionId::new(hex::encode(double_sha256(serialized_tx)))
}

impl ChainState {
    fn tip(&self) -> &BlockInfo {
        // Genesis is inserted at construction and never removed.
        &self.main_chain[self.main_chain.len() - 1]
    }

    fn ensure_reachable(&self) -> Result<(), MockError> {
        if self.reachable {
            Ok(())
        } else {
            Err(MockError::Unreachable)
        }
    }

    fn emit(&mut self, event: ChainEvent) {
        let lagged = &mut self.lagged;
        self.listeners
            .retain(|&id, listener| match listener.tx.try_send(event.clone()) {
                Ok(()) => true,
                Err(TrySendError::Full(_)) => {
                    tracing::warn!(listener = id, "listener queue full, closing subscription");
                    lagged.push(listener.closer.clone());
                    false
                }
                Err(TrySendError::Closed(_)) => false,
            });
    }

    fn child_of(&self, parent: &BlockInfo, salt: u64) -> Result<BlockInfo, MockError> {
        let height = parent.height + 1;
        let block_time = parent
            .block_time
            .checked_add_signed(self.config.block_interval()?)
            .ok_or(MockError::ClockOverflow { height })?;
        Ok(BlockInfo {
            hash: block_hash(&parent.hash, height, salt),
            height,
            prev_hash: parent.hash.clone(),
            block_time,
        })
    }

    /// Append `block` to the main chain, confirming `txids` in it.
    fn connect(&mut self, block: BlockInfo, txids: Vec<TransactionId>) {
        self.main_chain.push(block.clone());
        self.blocks.insert(block.hash.clone(), block.clone());
        self.emit(ChainEvent::Block(block.clone()));

        let mut confirmed = Vec::with_capacity(txids.len());
        for id in &txids {
            if let Some(entry) = self.transactions.get_mut(id) {
                entry.tx.height = block.height;
                entry.tx.block_info = Some(block.clone());
                confirmed.push(entry.tx.clone());
            }
        }
        self.block_txs.insert(block.hash.clone(), txids);
        for tx in confirmed {
            self.emit(ChainEvent::Transaction(tx));
        }
    }

    fn insert_unconfirmed(&mut self, mut tx: Transaction) -> Result<TransactionId, MockError> {
        if self.transactions.contains_key(&tx.id) {
            return Err(MockError::DuplicateTransaction(tx.id.to_string()));
        }
        tx.height = 0;
        tx.block_info = None;
        let id = tx.id.clone();
        let seq = self.next_seq;
        self.next_seq += 1;
        self.transactions.insert(id.clone(), TxEntry { seq, tx: tx.clone() });
        self.mempool.push(id.clone());
        self.emit(ChainEvent::Transaction(tx));
        Ok(id)
    }
}

impl MockChain {
    /// Build a chain holding only its genesis block. Fails if `config` does
    /// not pass `MockChainConfig::validate`.
    pub fn new(config: MockChainConfig) -> Result<Self, MockError> {
        config.validate()?;
        let genesis_seed = hex::encode(config.coin_type.currency_code());
        let genesis = BlockInfo {
            hash: block_hash(&genesis_seed, 0, 0),
            height: 0,
            prev_hash: String::new(),
            block_time: config.genesis_time()?,
        };
        let reachable = config.reachable;
        Ok(MockChain {
            inner: Arc::new(Mutex::new(ChainState {
                config,
                reachable,
                broadcast_rejection: None,
                blocks: HashMap::from([(genesis.hash.clone(), genesis.clone())]),
                main_chain: vec![genesis],
                transactions: HashMap::new(),
                next_seq: 0,
                mempool: Vec::new(),
                block_txs: HashMap::new(),
                listeners: HashMap::new(),
                next_listener: 0,
                lagged: Vec::new(),
            })),
        })
    }

    fn state(&self) -> MutexGuard<'_, ChainState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `f` on the locked state, then close any subscriptions whose
    /// listeners fell behind. Their release hooks take the lock again.
    fn update<R>(&self, f: impl FnOnce(&mut ChainState) -> R) -> R {
        let mut state = self.state();
        let out = f(&mut *state);
        let lagged = std::mem::take(&mut state.lagged);
        drop(state);
        for closer in lagged {
            closer.close();
        }
        out
    }

    pub fn config(&self) -> MockChainConfig {
        self.state().config.clone()
    }

    // ─── Test controls ───────────────────────────────────────────────

    pub fn set_reachable(&self, reachable: bool) {
        self.state().reachable = reachable;
        tracing::info!(reachable, "mock backend reachability changed");
    }

    /// Reject every broadcast with `reason` until cleared with `None`.
    pub fn reject_broadcasts(&self, reason: Option<String>) {
        self.state().broadcast_rejection = reason;
    }

    /// Add a transaction to the mempool as if relayed by a peer.
    ///
    /// An empty ID is replaced by one derived from the transaction's JSON.
    pub fn add_mempool_transaction(&self, mut tx: Transaction) -> Result<TransactionId, MockError> {
        if tx.id.is_empty() {
            let bytes = tx
                .to_json()
                .map_err(|e| MockError::InvalidEncoding(e.to_string()))?;
            tx.id = derive_transaction_id(&bytes);
        }
        let id = self.update(|state| state.insert_unconfirmed(tx))?;
        tracing::debug!(txid = %id, "transaction entered mempool");
        Ok(id)
    }

    /// Mine one block on the tip confirming the whole mempool.
    pub fn mine_block(&self) -> Result<BlockInfo, MockError> {
        let (block, confirmed) = self.update(|state| {
            let block = state.child_of(state.tip(), 0)?;
            let txids = std::mem::take(&mut state.mempool);
            let confirmed = txids.len();
            state.connect(block.clone(), txids);
            Ok::<_, MockError>((block, confirmed))
        })?;
        tracing::info!(height = block.height, hash = %block.hash, confirmed, "mined block");
        Ok(block)
    }

    pub fn mine_blocks(&self, count: u64) -> Result<Vec<BlockInfo>, MockError> {
        (0..count).map(|_| self.mine_block()).collect()
    }

    /// Replace the top `depth` blocks with competing blocks of the same
    /// heights. Transactions from the orphaned blocks are confirmed again in
    /// the first replacement block, so none ever reverts to unconfirmed.
    /// Returns the replacement blocks in height order.
    pub fn reorg(&self, depth: u64) -> Result<Vec<BlockInfo>, MockError> {
        self.update(|state| {
            let tip = state.tip().height;
            if depth == 0 || depth > tip {
                return Err(MockError::ReorgTooDeep { depth, tip });
            }
            let fork_height = tip - depth;

            // Build the whole branch before touching the main chain.
            let mut replacements: Vec<BlockInfo> = Vec::with_capacity(depth as usize);
            let mut parent = state.main_chain[fork_height as usize].clone();
            for _ in 0..depth {
                let mut salt = rand::random::<u64>();
                if salt == 0 {
                    salt = 1;
                }
                let block = state.child_of(&parent, salt)?;
                parent = block.clone();
                replacements.push(block);
            }

            let orphaned = state.main_chain.split_off(fork_height as usize + 1);
            let mut reconfirm = Vec::new();
            for block in &orphaned {
                if let Some(txids) = state.block_txs.remove(&block.hash) {
                    reconfirm.extend(txids);
                }
            }
            for (i, block) in replacements.iter().enumerate() {
                let txids = if i == 0 {
                    std::mem::take(&mut reconfirm)
                } else {
                    Vec::new()
                };
                state.connect(block.clone(), txids);
            }

            tracing::info!(depth, fork_height, new_tip = %state.tip().hash, "chain reorganized");
            Ok(replacements)
        })
    }

    pub fn tip(&self) -> BlockInfo {
        self.state().tip().clone()
    }

    /// Any block this chain has produced, including orphaned ones.
    pub fn known_block(&self, hash: &str) -> Option<BlockInfo> {
        self.state().blocks.get(hash).cloned()
    }

    // ─── Backend queries ─────────────────────────────────────────────

    pub fn blockchain_info(&self) -> Result<BlockInfo, MockError> {
        let state = self.state();
        state.ensure_reachable()?;
        Ok(state.tip().clone())
    }

    /// Transactions touching `addr` at or above `from_height`, plus every
    /// unconfirmed one, sorted by height then arrival.
    pub fn address_transactions(
        &self,
        addr: &Address,
        from_height: u64,
    ) -> Result<Vec<Transaction>, MockError> {
        let state = self.state();
        state.ensure_reachable()?;
        let mut matches: Vec<&TxEntry> = state
            .transactions
            .values()
            .filter(|e| e.tx.touches(addr))
            .filter(|e| e.tx.height == 0 || e.tx.height >= from_height)
            .collect();
        matches.sort_by_key(|e| (e.tx.height, e.seq));
        Ok(matches.into_iter().map(|e| e.tx.clone()).collect())
    }

    pub fn transaction(&self, id: &TransactionId) -> Result<Transaction, MockError> {
        let state = self.state();
        state.ensure_reachable()?;
        state
            .transactions
            .get(id)
            .map(|e| e.tx.clone())
            .ok_or_else(|| MockError::UnknownTransaction(id.to_string()))
    }

    pub fn is_in_main_chain(&self, block: &BlockInfo) -> Result<bool, MockError> {
        let state = self.state();
        state.ensure_reachable()?;
        if !state.blocks.contains_key(&block.hash) {
            return Ok(false);
        }
        let on_chain = usize::try_from(block.height)
            .ok()
            .and_then(|h| state.main_chain.get(h))
            .is_some_and(|b| b.hash == block.hash);
        Ok(on_chain)
    }

    /// Accept a broadcast. The encoding is the interchange JSON of a
    /// `Transaction`.
    pub fn submit(&self, serialized_tx: &[u8]) -> Result<TransactionId, MockError> {
        self.update(|state| {
            state.ensure_reachable()?;
            if let Some(reason) = &state.broadcast_rejection {
                return Err(MockError::Rejected(reason.clone()));
            }
            let mut tx = Transaction::from_json(serialized_tx)
                .map_err(|e| MockError::InvalidEncoding(e.to_string()))?;
            if tx.id.is_empty() {
                tx.id = derive_transaction_id(serialized_tx);
            }
            state.insert_unconfirmed(tx)
        })
    }

    // ─── Event fan-out ───────────────────────────────────────────────

    /// Register a listener receiving every future event on a queue of
    /// `subscriptionBuffer` events. If the queue is full when an event is
    /// produced, the listener is dropped and `closer` is closed.
    pub fn listen(&self, closer: SubscriptionCloser) -> (u64, mpsc::Receiver<ChainEvent>) {
        let mut state = self.state();
        let (tx, rx) = mpsc::channel(state.config.subscription_buffer.max(1));
        let id = state.next_listener;
        state.next_listener += 1;
        state.listeners.insert(id, Listener { tx, closer });
        (id, rx)
    }

    pub fn unlisten(&self, id: u64) {
        self.state().listeners.remove(&id);
    }

    pub fn listener_count(&self) -> usize {
        self.state().listeners.len()
    }
}
