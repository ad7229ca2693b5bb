//! Full block validation. Applies every check in order and stops at the
//! first failure; callers never see a partially-checked block.

pub mod difficulty;

use num_traits::ToPrimitive;

use ember_common::config::{block_reward, BLOCK_GAS_LIMIT, TIMESTAMP_FUTURE_SKEW_MS};
use ember_common::error::BlockError;
use ember_common::{Amount, Block, Transaction};

use crate::core::state::{apply_transaction, validate_transaction, StateOverlay};
use crate::error::BlockchainError;
use crate::storage::{BlockStore, StateStore};

/// Validates `block` against `head`, returning the specific failure
/// reason instead of a bare boolean.
///
/// Parent linkage is checked as `block.parent_hash == head.hash` (a
/// block's parent hash must equal the current head's own hash, not the
/// head's parent hash).
pub async fn verify_block(
    block: &Block,
    head: &Block,
    block_store: &dyn BlockStore,
    state_store: &dyn StateStore,
    now_millis: u64,
) -> Result<(), BlockchainError> {
    if block.block_number != head.block_number + 1 {
        return Err(BlockError::WrongHeight {
            expected: head.block_number + 1,
            actual: block.block_number,
        }
        .into());
    }

    if block.parent_hash != head.hash {
        return Err(BlockError::WrongParent.into());
    }

    if block.timestamp < head.timestamp {
        return Err(BlockError::TimestampNotMonotonic(block.timestamp).into());
    }
    if block.timestamp > now_millis + TIMESTAMP_FUTURE_SKEW_MS {
        return Err(BlockError::TimestampInFuture(block.timestamp).into());
    }

    let expected_difficulty =
        difficulty::expected_difficulty(block.block_number, head, block_store).await?;
    if block.difficulty != expected_difficulty {
        return Err(BlockError::WrongDifficulty {
            expected: expected_difficulty,
            actual: block.difficulty,
        }
        .into());
    }

    if !block.has_valid_proof_of_work() {
        return Err(BlockError::InvalidProofOfWork.into());
    }

    let coinbase = block.coinbase().ok_or(BlockError::MissingCoinbase)?;
    if !coinbase.is_signed_by_mint() {
        return Err(BlockError::CoinbaseNotMint.into());
    }

    let non_coinbase = block.non_coinbase_transactions();
    let fees: Amount = non_coinbase
        .iter()
        .map(|tx| &tx.gas + &tx.contract_gas())
        .sum();
    let expected_coinbase_amount = &block_reward() + &fees;
    if coinbase.amount != expected_coinbase_amount {
        return Err(BlockError::WrongCoinbaseAmount {
            expected: expected_coinbase_amount.to_string(),
            actual: coinbase.amount.to_string(),
        }
        .into());
    }

    let total_contract_gas: Amount = non_coinbase
        .iter()
        .map(Transaction::contract_gas)
        .sum();
    let total_contract_gas = total_contract_gas.as_biguint().to_u64().unwrap_or(u64::MAX);
    if total_contract_gas > BLOCK_GAS_LIMIT {
        return Err(BlockError::GasLimitExceeded {
            total: total_contract_gas,
            limit: BLOCK_GAS_LIMIT,
        }
        .into());
    }

    let mut overlay = StateOverlay::new(state_store);
    for (offset, tx) in non_coinbase.iter().enumerate() {
        validate_transaction(tx, &mut overlay, false)
            .await
            .map_err(|source| BlockError::InvalidTransaction {
                index: offset + 1,
                source,
            })?;
        // Logging is off here: this is a throwaway overlay used only to
        // check cumulative validity, not the execution whose effects
        // actually land in the committed state.
        apply_transaction(tx, &mut overlay, false, false).await?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::SledStorage;
    use ember_common::crypto::KeyPair;

    #[tokio::test]
    async fn rejects_wrong_parent() {
        let storage = SledStorage::temporary();
        let head = ember_common::genesis::genesis_block();
        let mut candidate = head.clone();
        candidate.block_number = 1;
        candidate.parent_hash = ember_common::crypto::sha256(b"not the genesis");
        let result = verify_block(&candidate, &head, &storage, &storage, head.timestamp).await;
        assert!(matches!(
            result,
            Err(BlockchainError::Block(BlockError::WrongParent))
        ));
    }

    #[tokio::test]
    async fn accepts_a_freshly_mined_block() {
        let storage = SledStorage::temporary();
        let head = ember_common::genesis::genesis_block();
        let miner = KeyPair::generate();
        let coinbase = Transaction::sign(
            &KeyPair::mint(),
            miner.address(),
            ember_common::config::block_reward(),
            Amount::zero(),
            None,
            head.timestamp + 1,
        );
        let difficulty =
            difficulty::expected_difficulty(1, &head, &storage).await.unwrap();
        let preimage = Block::mining_preimage(
            1,
            head.timestamp + 1,
            &[coinbase.clone()],
            difficulty,
            &head.hash,
        );
        let mut nonce = 0u64;
        let hash = loop {
            let candidate_hash = Block::compute_hash(&preimage, nonce);
            if ember_common::crypto::leading_zero_nibbles(&candidate_hash) >= difficulty {
                break candidate_hash;
            }
            nonce += 1;
        };
        let block = Block {
            block_number: 1,
            timestamp: head.timestamp + 1,
            transactions: vec![coinbase],
            difficulty,
            parent_hash: head.hash,
            nonce,
            hash,
        };
        verify_block(&block, &head, &storage, &storage, head.timestamp + 1)
            .await
            .unwrap();
    }
}
