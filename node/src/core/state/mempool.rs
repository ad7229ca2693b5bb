//! In-memory ordered transaction pool. Kept purely as a `Vec` in
//! admission order: the mining coordinator reads it greedily in that
//! same order, so no secondary index is needed. Not persisted across
//! restarts.

use ember_common::crypto::Hash;
use ember_common::error::TransactionError;
use ember_common::{Amount, Transaction};
use log::{debug, warn};

use crate::core::state::{validate_transaction, StateOverlay};
use crate::storage::StateStore;

#[derive(Default)]
pub struct TransactionPool {
    transactions: Vec<Transaction>,
}

impl TransactionPool {
    pub fn new() -> Self {
        TransactionPool::default()
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Transaction> {
        self.transactions.iter()
    }

    /// Admit `tx`: it must be individually valid against `store`, the
    /// sender's balance must remain non-negative after every
    /// transaction already queued from that sender, and no two pool
    /// entries from the same sender may share a timestamp.
    pub async fn add_transaction(
        &mut self,
        tx: Transaction,
        store: &dyn StateStore,
    ) -> Result<(), TransactionError> {
        let mut overlay = StateOverlay::new(store);
        let sender = validate_transaction(&tx, &mut overlay, false).await?;

        let mut projected_debit = Amount::zero();
        for queued in &self.transactions {
            let queued_sender = queued
                .sender_address()
                .map_err(|_| TransactionError::BadSignature)?;
            if queued_sender != sender {
                continue;
            }
            if queued.timestamp == tx.timestamp {
                return Err(TransactionError::ReplayedTimestamp(tx.timestamp));
            }
            projected_debit = &projected_debit + &(&(&queued.amount + &queued.gas) + &queued.contract_gas());
        }

        let account = overlay
            .get(&sender)
            .await
            .ok()
            .flatten()
            .expect("validate_transaction already confirmed this account exists");
        let this_debit = &(&tx.amount + &tx.gas) + &tx.contract_gas();
        let total = &projected_debit + &this_debit;
        if account.balance < total {
            return Err(TransactionError::InsufficientBalance {
                need: total.to_string(),
                have: account.balance.to_string(),
            });
        }

        debug!("admitted tx from {} to pool", sender.to_hex());
        self.transactions.push(tx);
        Ok(())
    }

    /// Re-validate every pool entry against the post-block state,
    /// dropping anything that no longer holds.
    pub async fn revalidate(&mut self, store: &dyn StateStore) {
        let pending = std::mem::take(&mut self.transactions);
        let mut kept = Vec::with_capacity(pending.len());
        let mut overlay = StateOverlay::new(store);
        for tx in pending {
            match validate_transaction(&tx, &mut overlay, false).await {
                Ok(sender) => {
                    // Re-run the cumulative check against only the
                    // transactions kept so far, mirroring admission order.
                    let debit = &(&tx.amount + &tx.gas) + &tx.contract_gas();
                    let mut projected = Amount::zero();
                    for other in &kept {
                        let other_tx: &Transaction = other;
                        if other_tx.sender_address().ok() == Some(sender) {
                            projected = &projected + &(&(&other_tx.amount + &other_tx.gas) + &other_tx.contract_gas());
                        }
                    }
                    match overlay.get(&sender).await {
                        Ok(Some(account)) if account.balance >= &projected + &debit => kept.push(tx),
                        _ => warn!("dropping pool tx from {}: no longer affordable", sender.to_hex()),
                    }
                }
                Err(reason) => {
                    warn!("dropping invalid pool tx: {reason}");
                }
            }
        }
        self.transactions = kept;
    }

    /// Remove transactions that were just included in an accepted block
    /// (matched by canonical hash).
    pub fn remove_included(&mut self, included: &[Transaction]) {
        let included_hashes: std::collections::HashSet<Hash> =
            included.iter().map(Transaction::canonical_hash).collect();
        self.transactions
            .retain(|tx| !included_hashes.contains(&tx.canonical_hash()));
    }

    /// Greedily select transactions up to `gas_limit` worth of
    /// `contractGas`.
    pub fn select_for_block(&self, gas_limit: u64) -> Vec<Transaction> {
        use num_traits::ToPrimitive;
        let mut selected = Vec::new();
        let mut used: u64 = 0;
        for tx in &self.transactions {
            let cost = tx.contract_gas().as_biguint().to_u64().unwrap_or(u64::MAX);
            if used.saturating_add(cost) > gas_limit {
                continue;
            }
            used += cost;
            selected.push(tx.clone());
        }
        selected
    }
}
