//! Shared scaffolding for the integration tests in this directory:
//! temp-backed storage, a funded account, and a tiny nonce-search miner
//! that does not bother with a background thread (the unit tests in
//! `core::mining` already cover the real worker).

#![allow(dead_code)]

use ember_common::crypto::{leading_zero_nibbles, Hash, KeyPair};
use ember_common::{Account, Amount, Block, Transaction};
use ember_node::core::consensus::difficulty;
use ember_node::core::mining::{build_coinbase, Candidate};
use ember_node::storage::{BlockStore, SledStorage, StateStore};
use tempdir::TempDir;

/// Storage backed by a real temporary directory rather than `sled`'s
/// in-memory mode, so tests exercise the same open/flush path the node
/// binary does.
pub struct TestStorage {
    _dir: TempDir,
    pub storage: SledStorage,
}

impl TestStorage {
    pub fn new() -> Self {
        let dir = TempDir::new("ember_test_storage").expect("tempdir");
        let storage = SledStorage::open(dir.path()).expect("open sled storage");
        TestStorage { _dir: dir, storage }
    }
}

/// Persist genesis and return it.
pub async fn seed_genesis(storage: &SledStorage) -> Block {
    let genesis = ember_common::genesis::genesis_block();
    storage.put_block(&genesis).await.unwrap();
    genesis
}

/// Give `address` a starting balance directly in the state store
/// (bypassing a coinbase, since these tests care about what happens
/// after funding, not how the funding arrived).
pub async fn fund(storage: &SledStorage, address: Hash, balance: u64) {
    storage
        .put_account(&address, &Account::new_externally_owned(Amount::from_u64(balance)))
        .await
        .unwrap();
}

/// Mine a child of `parent` containing `transactions`, synchronously and
/// without pre-emption, for tests that don't care about cancellation.
pub async fn mine_block(
    storage: &SledStorage,
    parent: &Block,
    miner: Hash,
    transactions: Vec<Transaction>,
    timestamp: u64,
) -> Block {
    let diff = difficulty::expected_difficulty(parent.block_number + 1, parent, storage)
        .await
        .unwrap();
    let coinbase = build_coinbase(miner, &transactions, timestamp);
    let candidate = Candidate::new(parent, diff, coinbase, transactions, timestamp);
    let preimage = candidate.preimage.clone();

    let mut nonce = 0u64;
    let hash = loop {
        let candidate_hash = Block::compute_hash(&preimage, nonce);
        if leading_zero_nibbles(&candidate_hash) >= diff {
            break candidate_hash;
        }
        nonce += 1;
    };

    Block {
        block_number: candidate.block_number,
        timestamp: candidate.timestamp,
        transactions: candidate.transactions,
        difficulty: candidate.difficulty,
        parent_hash: candidate.parent_hash,
        nonce,
        hash,
    }
}

pub fn fresh_keypair() -> KeyPair {
    KeyPair::generate()
}
