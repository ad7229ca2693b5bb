//! Chain parameters that every node on the network must agree on.
//! These are genesis parameters: changing any of them produces an
//! incompatible chain.

use crate::amount::Amount;
use crate::crypto::MINT_PRIVATE_KEY_HEX;

/// Millis-per-second, to avoid a bare `1000` literal scattered through
/// difficulty/timing code.
pub const MILLIS_PER_SECOND: u64 = 1000;

/// Reward paid to the miner's coinbase, in addition to collected fees.
/// 50 whole coins at 8 decimals.
pub const COIN_DECIMALS: u32 = 8;
pub fn coin_value() -> u64 {
    10u64.pow(COIN_DECIMALS)
}
pub fn block_reward() -> Amount {
    Amount::from_u64(50 * coin_value())
}

/// Total weight of `contractGas` a block's non-coinbase transactions may
/// declare.
pub const BLOCK_GAS_LIMIT: u64 = 10_000_000;

/// Minimum declared transaction fee (`gas`) accepted by `isValid`.
pub const MIN_TX_FEE: u64 = 1_000;

/// Minimum declared `contractGas` for a transaction that targets a
/// contract account.
pub const MIN_CONTRACT_FEE: u64 = 5_000;

/// Target wall-clock time between blocks, in milliseconds.
pub const TARGET_BLOCK_TIME_MS: u64 = 30_000;

/// Number of blocks in a difficulty retarget window.
pub const RETARGET_WINDOW: u64 = 10;

/// Difficulty assigned to the genesis block and used until the first
/// retarget boundary is reached.
pub const INITIAL_DIFFICULTY: u32 = 2;

/// Difficulty never drops below this floor.
pub const MINIMUM_DIFFICULTY: u32 = 1;

/// Allowed clock skew for a block's timestamp versus "now".
pub const TIMESTAMP_FUTURE_SKEW_MS: u64 = 15_000;

/// Fixed parent hash recorded by the genesis block (it has no real parent).
pub const GENESIS_PARENT_HASH: &str =
    "0000000000000000000000000000000000000000000000000000000000000000";

/// All supply enters circulation through block rewards; nothing is
/// pre-mined.
pub fn initial_supply() -> Amount {
    Amount::zero()
}

/// Re-exported for callers that need the MINT signer without depending
/// on `crypto` directly.
pub const MINT_KEY_HEX: &str = MINT_PRIVATE_KEY_HEX;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_reward_is_fifty_coins() {
        assert_eq!(block_reward(), Amount::from_u64(50 * 100_000_000));
    }

    #[test]
    fn minimum_difficulty_is_a_valid_floor() {
        assert!(MINIMUM_DIFFICULTY <= INITIAL_DIFFICULTY);
    }
}
