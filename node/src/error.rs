use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),
    #[error("(de)serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Peer-connection failures. The offending peer is removed from the
/// peer table and may reconnect on the next handshake.
#[derive(Debug, Error)]
pub enum P2pError {
    #[error("socket closed")]
    Closed,
    #[error("failed to parse incoming frame: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("peer {0} is already connected")]
    AlreadyConnected(String),
    #[error("invalid peer address: {0}")]
    InvalidAddress(String),
}

#[derive(Debug, Error)]
pub enum BlockchainError {
    #[error(transparent)]
    Transaction(#[from] ember_common::TransactionError),
    #[error(transparent)]
    Block(#[from] ember_common::BlockError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Contract(#[from] ember_common::error::ContractError),
}
