//! `NodeHandle`: the seam an out-of-process query server and CLI
//! tooling reach through — direct, in-process read access to the
//! stores plus a synchronous transaction-submission entry point.

use std::sync::Arc;

use ember_common::crypto::Hash;
use ember_common::error::TransactionError;
use ember_common::{Account, Block};
use tokio::sync::{mpsc, Mutex};

use crate::core::state::mempool::TransactionPool;
use crate::error::StorageError;
use crate::p2p::PeerManager;
use crate::storage::SledStorage;
use ember_common::{Message, Transaction};

/// Read-only view over the block and account stores, plus everything an
/// out-of-process query server and CLI tools need: direct in-process
/// access to the account store, block store, and `{public_key,
/// is_mining}`, plus a transaction-submission entry point.
pub struct NodeHandle {
    storage: Arc<SledStorage>,
    pool: Arc<Mutex<TransactionPool>>,
    peers: Arc<PeerManager>,
    public_key: Hash,
    is_mining: bool,
}

impl NodeHandle {
    pub fn new(
        storage: Arc<SledStorage>,
        pool: Arc<Mutex<TransactionPool>>,
        peers: Arc<PeerManager>,
        public_key: Hash,
        is_mining: bool,
    ) -> Self {
        NodeHandle {
            storage,
            pool,
            peers,
            public_key,
            is_mining,
        }
    }

    pub fn public_key(&self) -> Hash {
        self.public_key
    }

    pub fn is_mining(&self) -> bool {
        self.is_mining
    }

    pub async fn get_block(&self, number: u64) -> Result<Option<Block>, StorageError> {
        use crate::storage::BlockStore;
        self.storage.get_block(number).await
    }

    pub async fn get_account(&self, address: &Hash) -> Result<Option<Account>, StorageError> {
        use crate::storage::StateStore;
        self.storage.get_account(address).await
    }

    /// Validates synchronously and returns a receipt hash before
    /// gossiping, rather than acknowledging before validation has run.
    pub async fn submit_transaction(&self, tx: Transaction) -> Result<Hash, TransactionError> {
        let hash = tx.canonical_hash();
        {
            let mut pool = self.pool.lock().await;
            pool.add_transaction(tx.clone(), self.storage.as_ref())
                .await?;
        }
        self.peers.broadcast(Message::CreateTransaction(tx));
        Ok(hash)
    }
}

/// Channel the main event loop listens on for locally-submitted
/// transactions, kept separate from the gossip inbound channel so peer
/// traffic can never starve local requests.
pub type ControlSender = mpsc::UnboundedSender<Transaction>;
pub type ControlReceiver = mpsc::UnboundedReceiver<Transaction>;
