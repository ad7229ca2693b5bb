use serde::{Deserialize, Serialize};

use crate::block::Block;
use crate::transaction::Transaction;

/// The gossip/sync wire protocol, modeled as a tagged enum with schema
/// validation at the deserialization boundary. Each frame is exactly
/// one JSON object: `{"type": "...", "data": ...}`.
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(tag = "type", content = "data")]
pub enum Message {
    #[serde(rename = "HANDSHAKE")]
    Handshake(PeerAddress),

    #[serde(rename = "CREATE_TRANSACTION")]
    CreateTransaction(Transaction),

    #[serde(rename = "NEW_BLOCK")]
    NewBlock(Block),

    #[serde(rename = "REQUEST_BLOCK")]
    RequestBlock {
        block_number: u64,
        request_address: PeerAddress,
    },

    #[serde(rename = "SEND_BLOCK")]
    SendBlock(Block),
}

/// A peer's advertised, URL-like address (e.g. `ws://host:port`), used as
/// the identity key for peer-table lookups.
pub type PeerAddress = String;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handshake_round_trips_as_tagged_json() {
        let msg = Message::Handshake("ws://127.0.0.1:9000".to_string());
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"type\":\"HANDSHAKE\""));
        let parsed: Message = serde_json::from_str(&json).unwrap();
        matches!(parsed, Message::Handshake(_));
    }

    #[test]
    fn unknown_type_is_rejected() {
        let bad = r#"{"type":"NOT_A_REAL_MESSAGE","data":null}"#;
        assert!(serde_json::from_str::<Message>(bad).is_err());
    }

    #[test]
    fn request_block_round_trips() {
        let msg = Message::RequestBlock {
            block_number: 7,
            request_address: "ws://peer:9000".to_string(),
        };
        let json = serde_json::to_string(&msg).unwrap();
        let parsed: Message = serde_json::from_str(&json).unwrap();
        match parsed {
            Message::RequestBlock { block_number, .. } => assert_eq!(block_number, 7),
            _ => panic!("wrong variant"),
        }
    }
}
