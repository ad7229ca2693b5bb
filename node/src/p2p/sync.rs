//! Initial chain sync state machine.
//!
//! The sync loop ends as soon as the first `NEW_BLOCK` is accepted over
//! gossip rather than waiting to reach a peer's claimed tip height,
//! which can leave a gap if a peer is far ahead. This tracks the
//! highest height each peer has claimed as instrumentation a future
//! implementer can use to detect that gap — it does not gate the
//! transition to `Synced`.

use std::collections::HashMap;

use ember_common::PeerAddress;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    Idle,
    Syncing,
    Synced,
}

pub struct ChainSync {
    phase: SyncPhase,
    current_sync_block: u64,
    has_bootstrapped: bool,
    /// Additive instrumentation only (see module docs): not consulted by
    /// `mark_synced`.
    peer_heights: HashMap<PeerAddress, u64>,
}

impl ChainSync {
    pub fn idle() -> Self {
        ChainSync {
            phase: SyncPhase::Idle,
            current_sync_block: 1,
            has_bootstrapped: false,
            peer_heights: HashMap::new(),
        }
    }

    /// Enter `Syncing` at startup, resuming from whatever height is
    /// already on disk.
    pub fn start(existing_highest_block: Option<u64>) -> Self {
        ChainSync {
            phase: SyncPhase::Syncing,
            current_sync_block: existing_highest_block.unwrap_or(0).max(1),
            has_bootstrapped: false,
            peer_heights: HashMap::new(),
        }
    }

    pub fn phase(&self) -> SyncPhase {
        self.phase
    }

    pub fn current_sync_block(&self) -> u64 {
        self.current_sync_block
    }

    pub fn note_peer_height(&mut self, peer: PeerAddress, height: u64) {
        self.peer_heights
            .entry(peer)
            .and_modify(|h| *h = (*h).max(height))
            .or_insert(height);
    }

    pub fn highest_known_peer_height(&self) -> Option<u64> {
        self.peer_heights.values().copied().max()
    }

    /// A `SendBlock` accepted at the expected height: advance and
    /// remember that bootstrap (the first block) has happened.
    pub fn advance(&mut self) {
        self.has_bootstrapped = true;
        self.current_sync_block += 1;
    }

    pub fn is_bootstrap(&self) -> bool {
        !self.has_bootstrapped
    }

    /// The gossip handler calls this on the first accepted `NewBlock`,
    /// ending the sync regardless of how far behind we still are
    /// relative to peers.
    pub fn mark_synced(&mut self) {
        self.phase = SyncPhase::Synced;
    }

    /// A node only ever has a sync obligation when `ENABLE_CHAIN_REQUEST`
    /// started it in `Syncing`; one that never had that obligation (its
    /// phase stays `Idle`) is already at its own tip and must still be
    /// able to serve `REQUEST_BLOCK` for a peer doing a cold sync off of
    /// it. So both `Idle` and `Synced` serve requests, and only an
    /// in-progress `Syncing` node refuses.
    pub fn should_serve_requests(&self) -> bool {
        self.phase != SyncPhase::Syncing
    }
}
