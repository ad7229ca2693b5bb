use serde::{Deserialize, Serialize};

use crate::canonical::join_fields;
use crate::crypto::{leading_zero_nibbles, sha256, Hash};
use crate::transaction::Transaction;

/// A block. `hash` is always the SHA-256 of the mining pre-image
/// (everything below except `hash`/`nonce`) concatenated with the
/// winning `nonce` — see `Block::compute_hash`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Block {
    pub block_number: u64,
    pub timestamp: u64,
    pub transactions: Vec<Transaction>,
    pub difficulty: u32,
    pub parent_hash: Hash,
    pub nonce: u64,
    pub hash: Hash,
}

impl Block {
    /// Digest of the ordered transaction list. Order is preserved (not
    /// sorted) because slot 0 must remain the coinbase.
    fn transactions_digest(transactions: &[Transaction]) -> String {
        let hashes: Vec<String> = transactions
            .iter()
            .map(|tx| tx.canonical_hash().to_hex())
            .collect();
        hashes.join(",")
    }

    /// Everything that is fixed before mining starts: the nonce is the
    /// only free variable left for the miner to search over.
    pub fn mining_preimage(
        block_number: u64,
        timestamp: u64,
        transactions: &[Transaction],
        difficulty: u32,
        parent_hash: &Hash,
    ) -> String {
        join_fields(&[
            &block_number.to_string(),
            &timestamp.to_string(),
            &Self::transactions_digest(transactions),
            &difficulty.to_string(),
            &parent_hash.to_hex(),
        ])
    }

    pub fn compute_hash(preimage: &str, nonce: u64) -> Hash {
        let full = format!("{preimage}|{nonce}");
        sha256(full.as_bytes())
    }

    /// Recompute the hash this block *should* have, from its own fields.
    pub fn recompute_hash(&self) -> Hash {
        let preimage = Self::mining_preimage(
            self.block_number,
            self.timestamp,
            &self.transactions,
            self.difficulty,
            &self.parent_hash,
        );
        Self::compute_hash(&preimage, self.nonce)
    }

    /// Proof-of-work check: recomputed hash matches the stored one and
    /// carries at least `difficulty` leading hex-zero nibbles.
    pub fn has_valid_proof_of_work(&self) -> bool {
        self.hash == self.recompute_hash() && leading_zero_nibbles(&self.hash) >= self.difficulty
    }

    pub fn coinbase(&self) -> Option<&Transaction> {
        self.transactions.first()
    }

    pub fn non_coinbase_transactions(&self) -> &[Transaction] {
        if self.transactions.is_empty() {
            &[]
        } else {
            &self.transactions[1..]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amount::Amount;
    use crate::crypto::KeyPair;

    fn sample_block(nonce: u64) -> Block {
        let coinbase = Transaction::sign(
            &KeyPair::mint(),
            KeyPair::generate().address(),
            Amount::from_u64(50),
            Amount::zero(),
            None,
            1,
        );
        let preimage =
            Block::mining_preimage(1, 1_700_000_000_000, &[coinbase.clone()], 1, &Hash::zero());
        let hash = Block::compute_hash(&preimage, nonce);
        Block {
            block_number: 1,
            timestamp: 1_700_000_000_000,
            transactions: vec![coinbase],
            difficulty: 1,
            parent_hash: Hash::zero(),
            nonce,
            hash,
        }
    }

    #[test]
    fn recompute_hash_matches_construction() {
        let block = sample_block(0);
        assert_eq!(block.hash, block.recompute_hash());
    }

    #[test]
    fn tampering_any_field_breaks_recomputed_hash() {
        let mut block = sample_block(0);
        block.difficulty = 2;
        assert_ne!(block.hash, block.recompute_hash());
    }

    #[test]
    fn pow_check_respects_difficulty() {
        let mut block = sample_block(0);
        block.difficulty = 64; // unreachable in a test without real mining
        assert!(!block.has_valid_proof_of_work());
    }
}
