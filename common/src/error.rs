use thiserror::Error;

/// Transaction-level rejection reasons. Dropped silently on gossip;
/// returned to a direct submitter via `NodeHandle`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransactionError {
    #[error("signature does not recover a valid public key")]
    BadSignature,
    #[error("sender account {0} does not exist")]
    UnknownSender(String),
    #[error("sender {sender} used MINT key outside of a coinbase slot")]
    UnauthorizedMint { sender: String },
    #[error("insufficient balance: need {need}, have {have}")]
    InsufficientBalance { need: String, have: String },
    #[error("timestamp {0} already consumed by this sender")]
    ReplayedTimestamp(u64),
    #[error("gas {have} is below the minimum fee {minimum}")]
    FeeTooLow { have: String, minimum: String },
    #[error("contractGas {have} is below the minimum contract fee {minimum}")]
    ContractFeeTooLow { have: String, minimum: String },
}

/// Block-level rejection reasons. The block is rejected outright; the
/// sending peer is not penalized (no score system).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BlockError {
    #[error("expected block number {expected}, got {actual}")]
    WrongHeight { expected: u64, actual: u64 },
    #[error("parentHash does not match the current head")]
    WrongParent,
    #[error("timestamp {0} is not after the parent block's timestamp")]
    TimestampNotMonotonic(u64),
    #[error("timestamp {0} is too far in the future")]
    TimestampInFuture(u64),
    #[error("expected difficulty {expected}, got {actual}")]
    WrongDifficulty { expected: u32, actual: u32 },
    #[error("block hash fails the proof-of-work check")]
    InvalidProofOfWork,
    #[error("block has no coinbase transaction")]
    MissingCoinbase,
    #[error("coinbase is not signed by the MINT key")]
    CoinbaseNotMint,
    #[error("coinbase amount {actual} does not equal reward+fees {expected}")]
    WrongCoinbaseAmount { expected: String, actual: String },
    #[error("sum of contractGas {total} exceeds the block gas limit {limit}")]
    GasLimitExceeded { total: u64, limit: u64 },
    #[error("transaction {index} is invalid: {source}")]
    InvalidTransaction {
        index: usize,
        #[source]
        source: TransactionError,
    },
}

#[derive(Debug, Error)]
pub enum ContractError {
    #[error("stack underflow")]
    StackUnderflow,
    #[error("out of gas")]
    OutOfGas,
    #[error("undefined opcode: {0}")]
    UndefinedOpcode(String),
    #[error("program did not HALT")]
    NoHalt,
}
