use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::collections::BTreeSet;

use crate::amount::Amount;
use crate::crypto::{sha256, Hash};

/// An account record keyed by its 64-hex address in the account store.
/// Lives for the lifetime of the chain once created: accounts are never
/// deleted, only drained to a zero balance.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Account {
    pub balance: Amount,
    /// Contract source (stack-VM program text). Empty for externally
    /// owned accounts.
    pub body: Option<String>,
    /// Contract storage, a string→string map. A `BTreeMap` so that
    /// iteration order is already lexicographic for canonical hashing
    /// without an extra sort pass.
    pub storage: BTreeMap<String, String>,
    /// Every `timestamp` consumed as a nonce by a transaction from this
    /// account (replay protection).
    pub timestamps: BTreeSet<u64>,
    /// Hash of `body`, recomputed whenever `body` changes.
    pub code_hash: Hash,
}

impl Account {
    pub fn new_externally_owned(balance: Amount) -> Self {
        Account {
            balance,
            body: None,
            storage: BTreeMap::new(),
            timestamps: BTreeSet::new(),
            code_hash: Hash::zero(),
        }
    }

    pub fn is_contract(&self) -> bool {
        self.body.is_some()
    }

    pub fn deploy(&mut self, source: String) {
        self.code_hash = sha256(source.as_bytes());
        self.body = Some(source);
    }

    pub fn has_consumed(&self, timestamp: u64) -> bool {
        self.timestamps.contains(&timestamp)
    }

    pub fn consume_timestamp(&mut self, timestamp: u64) -> bool {
        self.timestamps.insert(timestamp)
    }
}
