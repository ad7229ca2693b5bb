//! The mining coordinator. Runs the nonce search on a dedicated OS
//! thread so the event loop stays responsive, and cancels an in-flight
//! search with a cooperative flag polled every [`NONCE_BATCH`] nonces
//! rather than killing and respawning the thread.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use ember_common::config::block_reward;
use ember_common::crypto::{leading_zero_nibbles, KeyPair};
use ember_common::{Amount, Block, Transaction};
use log::{debug, info};

/// How many nonces the worker tries between checks of the cancellation
/// flag. Small enough to pre-empt promptly, large enough that the
/// atomic load doesn't dominate the hash loop.
const NONCE_BATCH: u64 = 1024;

/// Build the coinbase transaction: pays
/// `BLOCK_REWARD + Σ gas + Σ contractGas` to the miner, signed by MINT.
pub fn build_coinbase(miner_address: ember_common::crypto::Hash, transactions: &[Transaction], timestamp: u64) -> Transaction {
    let fees: Amount = transactions.iter().map(|tx| &tx.gas + &tx.contract_gas()).sum();
    let reward = &block_reward() + &fees;
    Transaction::sign(&KeyPair::mint(), miner_address, reward, Amount::zero(), None, timestamp)
}

/// A candidate block with everything fixed except `nonce`/`hash`, plus
/// the mining pre-image the worker searches over.
pub struct Candidate {
    pub block_number: u64,
    pub timestamp: u64,
    pub transactions: Vec<Transaction>,
    pub difficulty: u32,
    pub parent_hash: ember_common::crypto::Hash,
    pub preimage: String,
}

impl Candidate {
    pub fn new(
        head: &Block,
        difficulty: u32,
        coinbase: Transaction,
        mut pool_transactions: Vec<Transaction>,
        timestamp: u64,
    ) -> Self {
        let mut transactions = Vec::with_capacity(pool_transactions.len() + 1);
        transactions.push(coinbase);
        transactions.append(&mut pool_transactions);

        let block_number = head.block_number + 1;
        let preimage =
            Block::mining_preimage(block_number, timestamp, &transactions, difficulty, &head.hash);

        Candidate {
            block_number,
            timestamp,
            transactions,
            difficulty,
            parent_hash: head.hash,
            preimage,
        }
    }

    fn into_block(self, nonce: u64, hash: ember_common::crypto::Hash) -> Block {
        Block {
            block_number: self.block_number,
            timestamp: self.timestamp,
            transactions: self.transactions,
            difficulty: self.difficulty,
            parent_hash: self.parent_hash,
            nonce,
            hash,
        }
    }
}

/// Owns the one outstanding mining attempt, if any. `preempt` is safe to
/// call from the gossip handler on a different task than the one running
/// `mine`.
pub struct MiningCoordinator {
    current_cancel: Mutex<Option<Arc<AtomicBool>>>,
}

impl Default for MiningCoordinator {
    fn default() -> Self {
        MiningCoordinator {
            current_cancel: Mutex::new(None),
        }
    }
}

impl MiningCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-empt whatever search is currently running, if any. A no-op
    /// if nothing is mining.
    pub fn preempt(&self) {
        if let Some(flag) = self.current_cancel.lock().unwrap().take() {
            flag.store(true, Ordering::SeqCst);
            debug!("mining pre-empted");
        }
    }

    /// Search for a winning nonce for `candidate` on a dedicated thread.
    /// Resolves to `None` if pre-empted before a solution was found,
    /// `Some(block)` otherwise.
    pub async fn mine(&self, candidate: Candidate) -> Option<Block> {
        let cancel = Arc::new(AtomicBool::new(false));
        *self.current_cancel.lock().unwrap() = Some(cancel.clone());

        let (tx, rx) = tokio::sync::oneshot::channel();
        let preimage = candidate.preimage.clone();
        let difficulty = candidate.difficulty;

        std::thread::spawn(move || {
            let mut nonce: u64 = 0;
            loop {
                if nonce % NONCE_BATCH == 0 && cancel.load(Ordering::Relaxed) {
                    return;
                }
                let hash = Block::compute_hash(&preimage, nonce);
                if leading_zero_nibbles(&hash) >= difficulty {
                    let _ = tx.send((nonce, hash));
                    return;
                }
                nonce += 1;
            }
        });

        match rx.await {
            Ok((nonce, hash)) => {
                info!("mined block {} at nonce {nonce}", candidate.block_number);
                *self.current_cancel.lock().unwrap() = None;
                Some(candidate.into_block(nonce, hash))
            }
            Err(_) => None,
        }
    }
}
