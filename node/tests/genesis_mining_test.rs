//! End-to-end: starting from an empty block store, mining the first
//! block after genesis produces a correctly-shaped block that
//! `verify_block` accepts and that persists under key `"1"`.

mod test_helpers;

use ember_common::config::block_reward;
use ember_common::crypto::KeyPair;
use ember_node::core::consensus::verify_block;
use ember_node::storage::BlockStore;
use test_helpers::{mine_block, seed_genesis, TestStorage};

#[tokio::test]
async fn mines_block_one_with_only_a_coinbase() {
    let env = TestStorage::new();
    let genesis = seed_genesis(&env.storage).await;

    let miner = KeyPair::generate();
    let block = mine_block(&env.storage, &genesis, miner.address(), Vec::new(), genesis.timestamp + 1).await;

    assert_eq!(block.block_number, 1);
    assert_eq!(block.parent_hash, genesis.hash);
    assert_eq!(block.transactions.len(), 1);
    assert_eq!(block.transactions[0].amount, block_reward());
    assert!(block.has_valid_proof_of_work());

    verify_block(&block, &genesis, &env.storage, &env.storage, block.timestamp)
        .await
        .expect("a freshly mined block over genesis must verify");

    env.storage.put_block(&block).await.unwrap();
    let fetched = env.storage.get_block(1).await.unwrap().expect("stored under key 1");
    assert_eq!(fetched, block);
}
