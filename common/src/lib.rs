//! Data model, crypto primitives, and canonical serialization shared by
//! every Ember node.

pub mod account;
pub mod amount;
pub mod block;
pub mod canonical;
pub mod config;
pub mod crypto;
pub mod error;
pub mod genesis;
pub mod message;
pub mod time;
pub mod transaction;

pub use account::Account;
pub use amount::Amount;
pub use block::Block;
pub use error::{BlockError, TransactionError};
pub use message::{Message, PeerAddress};
pub use transaction::{AdditionalData, Transaction};
