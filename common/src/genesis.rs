//! The fixed genesis block every Ember node must agree on byte-for-byte.

use crate::block::Block;
use crate::config::{GENESIS_PARENT_HASH, INITIAL_DIFFICULTY};
use crate::crypto::{Hash, KeyPair};

/// Genesis has no coinbase and no transactions: it is the fixed root
/// every chain is measured from, mined with a fixed nonce rather than a
/// real proof-of-work search (there is nothing to pay out at height 0).
pub fn genesis_block() -> Block {
    let parent_hash: Hash = GENESIS_PARENT_HASH
        .parse()
        .expect("GENESIS_PARENT_HASH is a valid 64-hex constant");
    let transactions = Vec::new();
    let timestamp = 1_700_000_000_000;
    let nonce = 0;
    let preimage =
        Block::mining_preimage(0, timestamp, &transactions, INITIAL_DIFFICULTY, &parent_hash);
    let hash = Block::compute_hash(&preimage, nonce);
    Block {
        block_number: 0,
        timestamp,
        transactions,
        difficulty: INITIAL_DIFFICULTY,
        parent_hash,
        nonce,
        hash,
    }
}

/// Convenience used only by tests and local tooling: an address that is
/// guaranteed to not collide with MINT or any generated keypair.
pub fn unused_test_address() -> Hash {
    KeyPair::generate().address()
}
