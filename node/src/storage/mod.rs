//! Two ordered key→value stores on local disk: the block store (block
//! number → block) and the account store (address → account). Backed
//! by `sled`.

use async_trait::async_trait;
use ember_common::{Account, Block};
use ember_common::crypto::Hash;
use log::{debug, trace};
use std::str::FromStr;

use crate::error::StorageError;

#[async_trait]
pub trait BlockStore: Send + Sync {
    async fn get_block(&self, number: u64) -> Result<Option<Block>, StorageError>;
    async fn put_block(&self, block: &Block) -> Result<(), StorageError>;
    async fn highest_block_number(&self) -> Result<Option<u64>, StorageError>;
}

#[async_trait]
pub trait StateStore: Send + Sync {
    async fn get_account(&self, address: &Hash) -> Result<Option<Account>, StorageError>;
    async fn put_account(&self, address: &Hash, account: &Account) -> Result<(), StorageError>;
    /// Apply a batch of account writes atomically: either all land or
    /// none do.
    async fn put_accounts_atomic(
        &self,
        accounts: Vec<(Hash, Account)>,
    ) -> Result<(), StorageError>;
}

/// `sled`-backed implementation of both stores.
pub struct SledStorage {
    blocks: sled::Tree,
    state: sled::Tree,
}

impl SledStorage {
    pub fn open(data_dir: &std::path::Path) -> Result<Self, StorageError> {
        let db = sled::open(data_dir)?;
        let blocks = db.open_tree("block_db")?;
        let state = db.open_tree("state_db")?;
        Ok(SledStorage { blocks, state })
    }

    #[cfg(test)]
    pub fn temporary() -> Self {
        let db = sled::Config::new().temporary(true).open().unwrap();
        let blocks = db.open_tree("block_db").unwrap();
        let state = db.open_tree("state_db").unwrap();
        SledStorage { blocks, state }
    }
}

#[async_trait]
impl BlockStore for SledStorage {
    async fn get_block(&self, number: u64) -> Result<Option<Block>, StorageError> {
        trace!("get_block {number}");
        match self.blocks.get(number.to_string().as_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn put_block(&self, block: &Block) -> Result<(), StorageError> {
        debug!("put_block {} ({})", block.block_number, block.hash);
        let key = block.block_number.to_string();
        let value = serde_json::to_vec(block)?;
        self.blocks.insert(key.as_bytes(), value)?;
        self.blocks.flush_async().await?;
        Ok(())
    }

    async fn highest_block_number(&self) -> Result<Option<u64>, StorageError> {
        let highest = self
            .blocks
            .iter()
            .keys()
            .filter_map(|k| k.ok())
            .filter_map(|k| u64::from_str(&String::from_utf8_lossy(&k)).ok())
            .max();
        Ok(highest)
    }
}

#[async_trait]
impl StateStore for SledStorage {
    async fn get_account(&self, address: &Hash) -> Result<Option<Account>, StorageError> {
        match self.state.get(address.to_hex().as_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn put_account(&self, address: &Hash, account: &Account) -> Result<(), StorageError> {
        let value = serde_json::to_vec(account)?;
        self.state.insert(address.to_hex().as_bytes(), value)?;
        Ok(())
    }

    async fn put_accounts_atomic(
        &self,
        accounts: Vec<(Hash, Account)>,
    ) -> Result<(), StorageError> {
        let mut batch = sled::Batch::default();
        for (address, account) in &accounts {
            let value = serde_json::to_vec(account)?;
            batch.insert(address.to_hex().as_bytes(), value);
        }
        self.state.apply_batch(batch)?;
        self.state.flush_async().await?;
        Ok(())
    }
}
