use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::amount::Amount;
use crate::canonical::{canonical_json, join_fields};
use crate::crypto::{sha256, CryptoError, Hash, KeyPair, Signature};

/// Optional payload: contract deployment/invocation data. Represented
/// as a struct rather than a free `serde_json::Value` so malformed
/// shapes are rejected at the deserialization boundary.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct AdditionalData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contract_gas: Option<Amount>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sc_body: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_map: Option<BTreeMap<String, String>>,
}

impl AdditionalData {
    pub fn is_contract_deployment(&self) -> bool {
        self.sc_body.is_some()
    }

    pub fn contract_gas(&self) -> Amount {
        self.contract_gas.clone().unwrap_or_else(Amount::zero)
    }
}

/// A transfer, optionally carrying a contract deployment or call.
/// `recipient` is a 64-hex address (SHA-256 of the recipient's public
/// key); the sender's address is never stored on the wire — it is
/// recovered from `signature` over `canonical_hash()`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Transaction {
    pub recipient: Hash,
    pub amount: Amount,
    pub gas: Amount,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub additional_data: Option<AdditionalData>,
    pub timestamp: u64,
    pub signature: Signature,
}

impl Transaction {
    /// Canonical hash over every field except `signature`: this is both
    /// the pre-image signed over and the transaction's on-chain
    /// identity hash.
    pub fn canonical_hash(&self) -> Hash {
        let preimage = join_fields(&[
            &self.recipient.to_hex(),
            &self.amount.to_string(),
            &self.gas.to_string(),
            &canonical_json(&self.additional_data),
            &self.timestamp.to_string(),
        ]);
        sha256(preimage.as_bytes())
    }

    pub fn sign(
        key_pair: &KeyPair,
        recipient: Hash,
        amount: Amount,
        gas: Amount,
        additional_data: Option<AdditionalData>,
        timestamp: u64,
    ) -> Self {
        let unsigned = Transaction {
            recipient,
            amount,
            gas,
            additional_data,
            timestamp,
            // placeholder, replaced once the real hash is known
            signature: Signature {
                r: String::new(),
                s: String::new(),
                v: 0,
            },
        };
        let hash = unsigned.canonical_hash();
        let signature = key_pair.sign(&hash);
        Transaction {
            signature,
            ..unsigned
        }
    }

    /// Recover the sender's address from the signature.
    pub fn sender_address(&self) -> Result<Hash, CryptoError> {
        let hash = self.canonical_hash();
        let public_key = self.signature.recover_public_key(&hash)?;
        Ok(public_key.address())
    }

    pub fn is_signed_by_mint(&self) -> bool {
        matches!(self.sender_address(), Ok(address) if address == crate::crypto::KeyPair::mint().address())
    }

    pub fn wants_contract_deploy(&self) -> bool {
        self.additional_data
            .as_ref()
            .map(AdditionalData::is_contract_deployment)
            .unwrap_or(false)
    }

    pub fn contract_gas(&self) -> Amount {
        self.additional_data
            .as_ref()
            .map(AdditionalData::contract_gas)
            .unwrap_or_else(Amount::zero)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recipient_address() -> Hash {
        KeyPair::generate().address()
    }

    #[test]
    fn signed_transaction_recovers_sender() {
        let sender = KeyPair::generate();
        let tx = Transaction::sign(
            &sender,
            recipient_address(),
            Amount::from_u64(5),
            Amount::from_u64(1000),
            None,
            1_700_000_000_000,
        );
        assert_eq!(tx.sender_address().unwrap(), sender.address());
    }

    #[test]
    fn canonical_hash_changes_with_any_field() {
        let sender = KeyPair::generate();
        let recipient = recipient_address();
        let tx_a = Transaction::sign(
            &sender,
            recipient,
            Amount::from_u64(5),
            Amount::from_u64(1000),
            None,
            1,
        );
        let tx_b = Transaction::sign(
            &sender,
            recipient,
            Amount::from_u64(6),
            Amount::from_u64(1000),
            None,
            1,
        );
        assert_ne!(tx_a.canonical_hash(), tx_b.canonical_hash());
    }

    #[test]
    fn mint_signed_transaction_is_recognized() {
        let mint = KeyPair::mint();
        let tx = Transaction::sign(
            &mint,
            recipient_address(),
            Amount::from_u64(50),
            Amount::zero(),
            None,
            1,
        );
        assert!(tx.is_signed_by_mint());
    }

    #[test]
    fn additional_data_round_trips_through_json() {
        let mut storage = BTreeMap::new();
        storage.insert("x".to_string(), "3".to_string());
        let data = AdditionalData {
            contract_gas: Some(Amount::from_u64(7000)),
            sc_body: Some("PUSH 1 PUSH 2 ADD SSTORE x HALT".to_string()),
            storage_map: Some(storage),
        };
        let json = serde_json::to_string(&data).unwrap();
        let parsed: AdditionalData = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, data);
    }
}
