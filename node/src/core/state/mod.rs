//! The state transition engine: applies a block's transactions to the
//! account store. Validation runs against an in-memory overlay rather
//! than the live store, so a block that fails partway through never
//! leaves a partial write behind.

pub mod mempool;

use std::collections::HashMap;

use ember_common::config::{MIN_CONTRACT_FEE, MIN_TX_FEE};
use ember_common::crypto::Hash;
use ember_common::error::TransactionError;
use ember_common::{Account, Amount, Block, Transaction};

use crate::core::contract::{self, ExecutionContext};
use crate::error::StorageError;
use crate::storage::StateStore;
use num_traits::ToPrimitive;

/// A read-through cache over `StateStore`: reads fall through to the
/// underlying store on first touch and are then served from memory;
/// writes are buffered until the caller commits them as a single batch.
pub struct StateOverlay<'a> {
    store: &'a dyn StateStore,
    cache: HashMap<Hash, Account>,
}

impl<'a> StateOverlay<'a> {
    pub fn new(store: &'a dyn StateStore) -> Self {
        StateOverlay {
            store,
            cache: HashMap::new(),
        }
    }

    pub async fn get(&mut self, address: &Hash) -> Result<Option<Account>, StorageError> {
        if let Some(account) = self.cache.get(address) {
            return Ok(Some(account.clone()));
        }
        match self.store.get_account(address).await? {
            Some(account) => {
                self.cache.insert(*address, account.clone());
                Ok(Some(account))
            }
            None => Ok(None),
        }
    }

    pub fn put(&mut self, address: Hash, account: Account) {
        self.cache.insert(address, account);
    }

    /// Every account this overlay has touched, ready to be committed as
    /// one atomic batch.
    pub fn into_writes(self) -> Vec<(Hash, Account)> {
        self.cache.into_iter().collect()
    }
}

/// Validates `tx` against `overlay`. The MINT key is accepted here only
/// when `allow_mint` is set by the caller (true for slot 0 of a block,
/// false everywhere else, including the mempool).
pub async fn validate_transaction(
    tx: &Transaction,
    overlay: &mut StateOverlay<'_>,
    allow_mint: bool,
) -> Result<Hash, TransactionError> {
    let sender = tx
        .sender_address()
        .map_err(|_| TransactionError::BadSignature)?;

    if tx.is_signed_by_mint() && !allow_mint {
        return Err(TransactionError::UnauthorizedMint {
            sender: sender.to_hex(),
        });
    }

    let account = overlay
        .get(&sender)
        .await
        .map_err(|_| TransactionError::UnknownSender(sender.to_hex()))?;

    let account = match account {
        Some(account) => account,
        None if tx.is_signed_by_mint() => Account::new_externally_owned(Amount::zero()),
        None => return Err(TransactionError::UnknownSender(sender.to_hex())),
    };

    if account.has_consumed(tx.timestamp) {
        return Err(TransactionError::ReplayedTimestamp(tx.timestamp));
    }

    if !tx.is_signed_by_mint() {
        if tx.gas < Amount::from_u64(MIN_TX_FEE) {
            return Err(TransactionError::FeeTooLow {
                have: tx.gas.to_string(),
                minimum: MIN_TX_FEE.to_string(),
            });
        }
        // The minimum only binds a tx that actually declares contractGas
        // (a call into an existing contract consumes interpreter gas). A
        // pure deployment never runs the interpreter — `apply_transaction`
        // just sets the recipient's `body` — so it may leave contractGas
        // at zero.
        if tx.contract_gas() > Amount::zero() && tx.contract_gas() < Amount::from_u64(MIN_CONTRACT_FEE) {
            return Err(TransactionError::ContractFeeTooLow {
                have: tx.contract_gas().to_string(),
                minimum: MIN_CONTRACT_FEE.to_string(),
            });
        }

        let required = &(&tx.amount + &tx.gas) + &tx.contract_gas();
        if account.balance < required {
            return Err(TransactionError::InsufficientBalance {
                need: required.to_string(),
                have: account.balance.to_string(),
            });
        }
    }

    Ok(sender)
}

/// The block-application step for a single transaction. `is_coinbase`
/// selects the "credited only" path for slot 0.
pub async fn apply_transaction(
    tx: &Transaction,
    overlay: &mut StateOverlay<'_>,
    is_coinbase: bool,
    enable_logging: bool,
) -> Result<(), StorageError> {
    let recipient_before = overlay.get(&tx.recipient).await?;
    let recipient_is_new = recipient_before.is_none();
    let mut recipient = recipient_before.unwrap_or_else(|| Account::new_externally_owned(Amount::zero()));
    recipient.balance = &recipient.balance + &tx.amount;

    if is_coinbase {
        overlay.put(tx.recipient, recipient);
        return Ok(());
    }

    let sender_address = tx.sender_address().expect("validated before apply");
    let mut sender = overlay
        .get(&sender_address)
        .await?
        .unwrap_or_else(|| Account::new_externally_owned(Amount::zero()));
    let total_debit = &(&tx.amount + &tx.gas) + &tx.contract_gas();
    sender.balance = sender
        .balance
        .checked_sub(&total_debit)
        .unwrap_or_else(Amount::zero);
    sender.consume_timestamp(tx.timestamp);
    overlay.put(sender_address, sender);

    if recipient_is_new {
        if tx.wants_contract_deploy() {
            let data = tx.additional_data.as_ref().expect("wants_contract_deploy implies additional_data");
            recipient.deploy(data.sc_body.clone().expect("wants_contract_deploy implies sc_body"));
            if let Some(initial_storage) = &data.storage_map {
                recipient.storage = initial_storage.clone();
            }
        }
        overlay.put(tx.recipient, recipient);
        return Ok(());
    }

    if recipient.is_contract() {
        let body = recipient.body.clone().unwrap_or_default();
        let ctx = ExecutionContext {
            caller: &sender_address,
            value: &tx.amount,
            storage: &recipient.storage,
            gas_limit: tx.contract_gas().as_biguint().to_u64().unwrap_or(u64::MAX),
            log_enabled: enable_logging,
        };
        let result = contract::execute(&body, &ctx);
        if result.success {
            recipient.storage = result.storage;
        }
    }

    overlay.put(tx.recipient, recipient);
    Ok(())
}

/// Builds the full write-set for `block` against `store` without
/// mutating it, for the caller to commit atomically. Block-level
/// validity (PoW, parent linkage, per-tx validation) is the consensus
/// module's job; this function trusts its caller already ran
/// `verify_block`.
pub async fn compute_block_writes(
    block: &Block,
    store: &dyn StateStore,
    enable_logging: bool,
) -> Result<Vec<(Hash, Account)>, StorageError> {
    let mut overlay = StateOverlay::new(store);
    for (index, tx) in block.transactions.iter().enumerate() {
        apply_transaction(tx, &mut overlay, index == 0, enable_logging).await?;
    }
    Ok(overlay.into_writes())
}
