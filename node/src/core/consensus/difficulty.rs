//! Difficulty retargeting, with concrete cadence and formula fixed as
//! genesis parameters alongside the constants it uses in
//! `ember_common::config`.
//!
//! Fixed-window retarget: every `RETARGET_WINDOW` blocks, compare the
//! wall-clock time the window actually took against
//! `RETARGET_WINDOW * TARGET_BLOCK_TIME_MS`. Adjust by exactly ±1,
//! floored at `MINIMUM_DIFFICULTY`. Between retarget boundaries,
//! difficulty is held constant at the parent's value.

use ember_common::config::{MINIMUM_DIFFICULTY, RETARGET_WINDOW, TARGET_BLOCK_TIME_MS};
use ember_common::Block;

use crate::error::StorageError;
use crate::storage::BlockStore;

/// The difficulty `candidate_number` must carry, given `parent` (the
/// current head) and access to historical blocks for the retarget window.
pub async fn expected_difficulty(
    candidate_number: u64,
    parent: &Block,
    block_store: &dyn BlockStore,
) -> Result<u32, StorageError> {
    if candidate_number == 0 || candidate_number % RETARGET_WINDOW != 0 {
        return Ok(parent.difficulty);
    }

    let window_start_number = match candidate_number.checked_sub(RETARGET_WINDOW) {
        Some(n) => n,
        None => return Ok(parent.difficulty),
    };

    let window_start = match block_store.get_block(window_start_number).await? {
        Some(block) => block,
        // Not enough history yet (e.g. right after genesis): hold steady.
        None => return Ok(parent.difficulty),
    };

    let elapsed_ms = parent.timestamp.saturating_sub(window_start.timestamp);
    let expected_ms = RETARGET_WINDOW * TARGET_BLOCK_TIME_MS;

    let next = if elapsed_ms < expected_ms {
        parent.difficulty + 1
    } else if elapsed_ms > expected_ms {
        parent.difficulty.saturating_sub(1).max(MINIMUM_DIFFICULTY)
    } else {
        parent.difficulty
    };

    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::SledStorage;
    use ember_common::crypto::Hash;

    fn block_at(number: u64, timestamp: u64, difficulty: u32) -> Block {
        Block {
            block_number: number,
            timestamp,
            transactions: Vec::new(),
            difficulty,
            parent_hash: Hash::zero(),
            nonce: 0,
            hash: Hash::zero(),
        }
    }

    #[tokio::test]
    async fn holds_steady_between_retarget_boundaries() {
        let storage = SledStorage::temporary();
        let parent = block_at(5, 1_000, 3);
        let expected = expected_difficulty(6, &parent, &storage).await.unwrap();
        assert_eq!(expected, 3);
    }

    #[tokio::test]
    async fn increments_when_window_is_faster_than_target() {
        let storage = SledStorage::temporary();
        storage.put_block(&block_at(0, 0, 3)).await.unwrap();
        let parent = block_at(10, 10 * TARGET_BLOCK_TIME_MS - 1, 3);
        let expected = expected_difficulty(10, &parent, &storage).await.unwrap();
        assert_eq!(expected, 4);
    }

    #[tokio::test]
    async fn decrements_but_not_below_floor() {
        let storage = SledStorage::temporary();
        storage.put_block(&block_at(0, 0, 1)).await.unwrap();
        let parent = block_at(10, 10 * TARGET_BLOCK_TIME_MS + 1, 1);
        let expected = expected_difficulty(10, &parent, &storage).await.unwrap();
        assert_eq!(expected, MINIMUM_DIFFICULTY);
    }
}
