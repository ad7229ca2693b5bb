//! End-to-end: a deployment transaction followed by a call transaction
//! in the same block leaves the expected value in contract storage.

mod test_helpers;

use ember_common::config::MIN_CONTRACT_FEE;
use ember_common::crypto::KeyPair;
use ember_common::error::TransactionError;
use ember_common::{AdditionalData, Amount, Transaction};
use ember_node::core::consensus::verify_block;
use ember_node::core::state::mempool::TransactionPool;
use ember_node::core::state::{compute_block_writes, validate_transaction, StateOverlay};
use ember_node::storage::StateStore;
use test_helpers::{fund, mine_block, seed_genesis, TestStorage};

#[tokio::test]
async fn deploy_then_call_persists_storage() {
    let env = TestStorage::new();
    let genesis = seed_genesis(&env.storage).await;

    let sender = KeyPair::generate();
    fund(&env.storage, sender.address(), 10_000_000).await;
    let contract_address = KeyPair::generate().address();

    let deploy = Transaction::sign(
        &sender,
        contract_address,
        Amount::zero(),
        Amount::from_u64(1_000),
        Some(AdditionalData {
            contract_gas: None,
            sc_body: Some("PUSH 1 PUSH 2 ADD SSTORE x HALT".to_string()),
            storage_map: None,
        }),
        genesis.timestamp + 1,
    );

    let call = Transaction::sign(
        &sender,
        contract_address,
        Amount::zero(),
        Amount::from_u64(1_000),
        Some(AdditionalData {
            contract_gas: Some(Amount::from_u64(5_000)),
            sc_body: None,
            storage_map: None,
        }),
        genesis.timestamp + 2,
    );

    let miner = KeyPair::generate();
    let block = mine_block(
        &env.storage,
        &genesis,
        miner.address(),
        vec![deploy, call],
        genesis.timestamp + 3,
    )
    .await;

    let writes = compute_block_writes(&block, &env.storage, false).await.unwrap();
    for (address, account) in writes {
        env.storage.put_account(&address, &account).await.unwrap();
    }

    let account = env.storage.get_account(&contract_address).await.unwrap().unwrap();
    assert!(account.is_contract());
    assert_eq!(account.storage.get("x"), Some(&"3".to_string()));
}

#[tokio::test]
async fn deploy_with_initial_storage_map_is_applied_verbatim() {
    let env = TestStorage::new();
    let genesis = seed_genesis(&env.storage).await;

    let sender = KeyPair::generate();
    fund(&env.storage, sender.address(), 10_000_000).await;
    let contract_address = KeyPair::generate().address();

    let mut initial = std::collections::BTreeMap::new();
    initial.insert("seeded".to_string(), "1".to_string());

    let deploy = Transaction::sign(
        &sender,
        contract_address,
        Amount::zero(),
        Amount::from_u64(1_000),
        Some(AdditionalData {
            contract_gas: None,
            sc_body: Some("HALT".to_string()),
            storage_map: Some(initial),
        }),
        genesis.timestamp + 1,
    );

    let miner = KeyPair::generate();
    let block = mine_block(&env.storage, &genesis, miner.address(), vec![deploy], genesis.timestamp + 2).await;
    let writes = compute_block_writes(&block, &env.storage, false).await.unwrap();
    let (_, account) = writes
        .into_iter()
        .find(|(addr, _)| *addr == contract_address)
        .expect("contract account was written");
    assert_eq!(account.storage.get("seeded"), Some(&"1".to_string()));
}

/// A free (zero-contractGas) deployment and a properly-fee'd call are
/// admitted to the mempool and survive full block verification together,
/// pinning down that `MIN_CONTRACT_FEE` binds calls, not deployments.
#[tokio::test]
async fn mempool_admits_deploy_and_call_and_verify_block_accepts_them() {
    let env = TestStorage::new();
    let genesis = seed_genesis(&env.storage).await;

    let sender = KeyPair::generate();
    fund(&env.storage, sender.address(), 10_000_000).await;
    let contract_address = KeyPair::generate().address();

    let deploy = Transaction::sign(
        &sender,
        contract_address,
        Amount::zero(),
        Amount::from_u64(1_000),
        Some(AdditionalData {
            contract_gas: None,
            sc_body: Some("PUSH 1 PUSH 2 ADD SSTORE x HALT".to_string()),
            storage_map: None,
        }),
        genesis.timestamp + 1,
    );

    let call = Transaction::sign(
        &sender,
        contract_address,
        Amount::zero(),
        Amount::from_u64(1_000),
        Some(AdditionalData {
            contract_gas: Some(Amount::from_u64(MIN_CONTRACT_FEE)),
            sc_body: None,
            storage_map: None,
        }),
        genesis.timestamp + 2,
    );

    let mut pool = TransactionPool::new();
    pool.add_transaction(deploy.clone(), &env.storage).await.unwrap();
    pool.add_transaction(call.clone(), &env.storage).await.unwrap();
    assert_eq!(pool.len(), 2);

    let miner = KeyPair::generate();
    let block = mine_block(
        &env.storage,
        &genesis,
        miner.address(),
        vec![deploy, call],
        genesis.timestamp + 3,
    )
    .await;

    verify_block(&block, &genesis, &env.storage, &env.storage, genesis.timestamp + 3)
        .await
        .unwrap();

    let writes = compute_block_writes(&block, &env.storage, false).await.unwrap();
    for (address, account) in &writes {
        env.storage.put_account(address, account).await.unwrap();
    }
    let account = env.storage.get_account(&contract_address).await.unwrap().unwrap();
    assert_eq!(account.storage.get("x"), Some(&"3".to_string()));
}

/// A deployment never pays the contract-call fee, but a call that
/// declares a non-zero `contractGas` below the minimum is rejected, both
/// at mempool admission and inside block validation.
#[tokio::test]
async fn call_below_minimum_contract_fee_is_rejected_everywhere() {
    let env = TestStorage::new();
    let genesis = seed_genesis(&env.storage).await;

    let sender = KeyPair::generate();
    fund(&env.storage, sender.address(), 10_000_000).await;
    let contract_address = KeyPair::generate().address();

    let deploy = Transaction::sign(
        &sender,
        contract_address,
        Amount::zero(),
        Amount::from_u64(1_000),
        Some(AdditionalData {
            contract_gas: None,
            sc_body: Some("HALT".to_string()),
            storage_map: None,
        }),
        genesis.timestamp + 1,
    );

    // Deployment is admitted even though it declares no contractGas.
    let mut pool = TransactionPool::new();
    pool.add_transaction(deploy.clone(), &env.storage).await.unwrap();

    let underpaid_call = Transaction::sign(
        &sender,
        contract_address,
        Amount::zero(),
        Amount::from_u64(1_000),
        Some(AdditionalData {
            contract_gas: Some(Amount::from_u64(MIN_CONTRACT_FEE - 1)),
            sc_body: None,
            storage_map: None,
        }),
        genesis.timestamp + 2,
    );

    let err = pool
        .add_transaction(underpaid_call.clone(), &env.storage)
        .await
        .unwrap_err();
    assert!(matches!(err, TransactionError::ContractFeeTooLow { .. }));

    // Same rejection applies directly against `validate_transaction`, the
    // path `verify_block` drives for every transaction in a candidate block.
    let mut overlay = StateOverlay::new(&env.storage);
    let err = validate_transaction(&underpaid_call, &mut overlay, false)
        .await
        .unwrap_err();
    assert!(matches!(err, TransactionError::ContractFeeTooLow { .. }));
}
