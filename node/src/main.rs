use std::sync::Arc;

use clap::Parser;
use ember_common::config::BLOCK_GAS_LIMIT;
use ember_common::crypto::Hash;
use ember_common::{genesis, time, Block, Message, PeerAddress};
use log::{error, info, warn};
use tokio::sync::{mpsc, Mutex};

use ember_node::config::NodeConfig;
use ember_node::core::consensus::{difficulty, verify_block};
use ember_node::core::mining::{self, MiningCoordinator};
use ember_node::core::state::compute_block_writes;
use ember_node::core::state::mempool::TransactionPool;
use ember_node::handle::NodeHandle;
use ember_node::p2p::sync::ChainSync;
use ember_node::p2p::{peer, server, PeerManager};
use ember_node::storage::{BlockStore, SledStorage, StateStore};

/// Pacing between successive `REQUEST_BLOCK` emissions during initial
/// sync, so we don't hammer the peer while it's still catching us up.
const SYNC_REQUEST_DELAY_MS: u64 = 5_000;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = NodeConfig::parse();
    let storage = Arc::new(SledStorage::open(&config.data_dir)?);

    if storage.highest_block_number().await?.is_none() {
        let genesis_block = genesis::genesis_block();
        storage.put_block(&genesis_block).await?;
        info!("initialized fresh chain at genesis {}", genesis_block.hash);
    }

    let head_number = storage
        .highest_block_number()
        .await?
        .expect("genesis was just persisted if nothing existed");
    let head_block = storage
        .get_block(head_number)
        .await?
        .expect("highest_block_number points at a stored block");
    let head = Arc::new(Mutex::new(head_block));

    let key_pair = config.load_or_generate_key()?;
    let miner_address = key_pair.address();
    info!("node address: {miner_address}");

    let pool = Arc::new(Mutex::new(TransactionPool::new()));
    let peers = Arc::new(PeerManager::new(config.my_address()));
    let mining = Arc::new(MiningCoordinator::new());

    let (inbound_tx, mut inbound_rx) = mpsc::unbounded_channel::<(PeerAddress, Message)>();
    let (mine_request_tx, mine_request_rx) = mpsc::unbounded_channel::<()>();
    let (mined_block_tx, mut mined_block_rx) = mpsc::unbounded_channel::<Block>();

    {
        let peers = peers.clone();
        let inbound_tx = inbound_tx.clone();
        let bind_addr = config.bind_addr();
        tokio::spawn(async move {
            if let Err(e) = server::run_server(bind_addr, peers, inbound_tx).await {
                error!("gossip server exited: {e}");
            }
        });
    }

    for raw in &config.peers {
        if raw.is_empty() {
            continue;
        }
        let peers = peers.clone();
        let inbound_tx = inbound_tx.clone();
        let target = raw.clone();
        tokio::spawn(async move {
            if let Err(e) = peer::connect_to(peers, target.clone(), inbound_tx).await {
                warn!("failed to dial {target}: {e}");
            }
        });
    }

    let sync = Arc::new(Mutex::new(if config.enable_chain_request {
        ChainSync::start(Some(head_number))
    } else {
        ChainSync::idle()
    }));

    let node_handle = Arc::new(NodeHandle::new(
        storage.clone(),
        pool.clone(),
        peers.clone(),
        key_pair.public_key().address(),
        config.enable_mining,
    ));
    // Kept alive for the out-of-scope query server to clone; this binary
    // itself only needs it to exist.
    let _ = node_handle;

    if config.enable_mining {
        spawn_mining_worker(
            mine_request_rx,
            mining.clone(),
            storage.clone(),
            pool.clone(),
            head.clone(),
            miner_address,
            mined_block_tx,
        );
        let _ = mine_request_tx.send(());
    }

    spawn_sync_driver(sync.clone(), peers.clone());

    loop {
        tokio::select! {
            Some((from, message)) = inbound_rx.recv() => {
                let mut sync_guard = sync.lock().await;
                handle_message(
                    from,
                    message,
                    &peers,
                    &storage,
                    &pool,
                    &mining,
                    &mut *sync_guard,
                    &inbound_tx,
                    &head,
                    config.enable_mining,
                    &mine_request_tx,
                    config.enable_logging,
                ).await;
            }
            Some(mined) = mined_block_rx.recv() => {
                accept_mined_block(
                    mined,
                    &storage,
                    &pool,
                    &peers,
                    &head,
                    config.enable_mining,
                    &mine_request_tx,
                    config.enable_logging,
                ).await;
            }
            else => break,
        }
    }

    Ok(())
}

/// Drives the initial-sync `REQUEST_BLOCK` cadence: while `sync` is in
/// `Syncing`, periodically asks one open peer (round-robin) for the
/// current sync height. Covers both the initial kick (no block has been
/// requested yet) and a stalled height (the peer we originally asked
/// never answered) — the protocol has no per-peer response timeout, so
/// this periodic retry stands in for one.
fn spawn_sync_driver(sync: Arc<Mutex<ChainSync>>, peers: Arc<PeerManager>) {
    tokio::spawn(async move {
        let mut next_peer = 0usize;
        loop {
            tokio::time::sleep(std::time::Duration::from_millis(SYNC_REQUEST_DELAY_MS)).await;
            let (phase, block_number) = {
                let guard = sync.lock().await;
                (guard.phase(), guard.current_sync_block())
            };
            if phase != ember_node::p2p::sync::SyncPhase::Syncing {
                continue;
            }
            let targets = peers.open_addresses();
            if targets.is_empty() {
                continue;
            }
            let target = &targets[next_peer % targets.len()];
            next_peer = next_peer.wrapping_add(1);
            peers.send_to(
                target,
                Message::RequestBlock {
                    block_number,
                    request_address: peers.my_address().clone(),
                },
            );
        }
    });
}

/// One long-lived task: waits for a "mine now" signal, builds a
/// candidate against the current head and pool, and runs the nonce
/// search. Runs serially — only one search at a time, on an isolated
/// worker rather than a pool.
fn spawn_mining_worker(
    mut requests: mpsc::UnboundedReceiver<()>,
    mining: Arc<MiningCoordinator>,
    storage: Arc<SledStorage>,
    pool: Arc<Mutex<TransactionPool>>,
    head: Arc<Mutex<Block>>,
    miner_address: Hash,
    results: mpsc::UnboundedSender<Block>,
) {
    tokio::spawn(async move {
        while requests.recv().await.is_some() {
            let head_snapshot = head.lock().await.clone();
            let difficulty = match difficulty::expected_difficulty(
                head_snapshot.block_number + 1,
                &head_snapshot,
                storage.as_ref(),
            )
            .await
            {
                Ok(d) => d,
                Err(e) => {
                    error!("difficulty lookup failed: {e}");
                    continue;
                }
            };

            let pool_txs = {
                let pool = pool.lock().await;
                pool.select_for_block(BLOCK_GAS_LIMIT)
            };
            let timestamp = time::current_time_millis().max(head_snapshot.timestamp + 1);
            let coinbase = mining::build_coinbase(miner_address, &pool_txs, timestamp);
            let candidate =
                mining::Candidate::new(&head_snapshot, difficulty, coinbase, pool_txs, timestamp);

            if let Some(block) = mining.mine(candidate).await {
                let _ = results.send(block);
            }
        }
    });
}

#[allow(clippy::too_many_arguments)]
async fn accept_mined_block(
    block: Block,
    storage: &Arc<SledStorage>,
    pool: &Arc<Mutex<TransactionPool>>,
    peers: &Arc<PeerManager>,
    head: &Arc<Mutex<Block>>,
    mining_enabled: bool,
    mine_request_tx: &mpsc::UnboundedSender<()>,
    enable_logging: bool,
) {
    {
        let head_guard = head.lock().await;
        if block.parent_hash != head_guard.hash {
            // A peer's block beat us to this height while we were
            // searching; mining.preempt() should already have stopped
            // this result, but guard against the race anyway.
            warn!("discarding locally mined block {}: head moved on", block.block_number);
            drop(head_guard);
            if mining_enabled {
                let _ = mine_request_tx.send(());
            }
            return;
        }
    }

    if let Err(e) = commit_block(&block, storage, pool, peers, head, enable_logging).await {
        error!("failed to commit locally mined block: {e}");
    }

    if mining_enabled {
        let _ = mine_request_tx.send(());
    }
}

/// Persist `block`, apply its state transition, advance `head`, and
/// gossip it — the common tail shared by locally mined blocks, accepted
/// `NEW_BLOCK` gossip, and accepted sync responses.
async fn commit_block(
    block: &Block,
    storage: &Arc<SledStorage>,
    pool: &Arc<Mutex<TransactionPool>>,
    peers: &Arc<PeerManager>,
    head: &Arc<Mutex<Block>>,
    enable_logging: bool,
) -> anyhow::Result<()> {
    let writes = compute_block_writes(block, storage.as_ref(), enable_logging).await?;
    storage.put_accounts_atomic(writes).await?;
    storage.put_block(block).await?;

    {
        let mut head_guard = head.lock().await;
        *head_guard = block.clone();
    }

    {
        let mut pool_guard = pool.lock().await;
        pool_guard.remove_included(&block.transactions);
        pool_guard.revalidate(storage.as_ref()).await;
    }

    info!(
        "accepted block {} ({}), {} tx",
        block.block_number,
        block.hash,
        block.transactions.len()
    );
    peers.broadcast(Message::NewBlock(block.clone()));
    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn handle_message(
    from: PeerAddress,
    message: Message,
    peers: &Arc<PeerManager>,
    storage: &Arc<SledStorage>,
    pool: &Arc<Mutex<TransactionPool>>,
    mining: &Arc<MiningCoordinator>,
    sync: &mut ChainSync,
    inbound_tx: &mpsc::UnboundedSender<(PeerAddress, Message)>,
    head: &Arc<Mutex<Block>>,
    mining_enabled: bool,
    mine_request_tx: &mpsc::UnboundedSender<()>,
    enable_logging: bool,
) {
    match message {
        Message::Handshake(address) => {
            if !peers.is_known(&address) {
                let peers = peers.clone();
                let inbound_tx = inbound_tx.clone();
                tokio::spawn(async move {
                    if let Err(e) = peer::connect_to(peers, address.clone(), inbound_tx).await {
                        warn!("failed to dial discovered peer {address}: {e}");
                    }
                });
            }
        }

        Message::CreateTransaction(tx) => {
            if sync.phase() == ember_node::p2p::sync::SyncPhase::Syncing {
                return;
            }
            let mut pool_guard = pool.lock().await;
            match pool_guard.add_transaction(tx.clone(), storage.as_ref()).await {
                Ok(()) => {
                    drop(pool_guard);
                    peers.broadcast(Message::CreateTransaction(tx));
                }
                Err(e) => warn!("rejected tx from {from}: {e}"),
            }
        }

        Message::NewBlock(block) => {
            let head_snapshot = head.lock().await.clone();
            if block.block_number <= head_snapshot.block_number {
                return; // duplicate or stale, ignore (re-broadcast no-op guard).
            }
            match verify_block(&block, &head_snapshot, storage.as_ref(), storage.as_ref(), time::current_time_millis()).await {
                Ok(()) => {
                    mining.preempt();
                    if let Err(e) = commit_block(&block, storage, pool, peers, head, enable_logging).await {
                        error!("failed to apply accepted NEW_BLOCK from {from}: {e}");
                        return;
                    }
                    sync.mark_synced();
                    if mining_enabled {
                        let _ = mine_request_tx.send(());
                    }
                }
                Err(e) => warn!("rejected NEW_BLOCK from {from}: {e}"),
            }
        }

        Message::RequestBlock {
            block_number,
            request_address,
        } => {
            if !sync.should_serve_requests() {
                return;
            }
            let head_snapshot = head.lock().await.clone();
            if block_number == 0 || block_number > head_snapshot.block_number {
                return;
            }
            match storage.get_block(block_number).await {
                Ok(Some(block)) => {
                    peers.send_to(&request_address, Message::SendBlock(block));
                }
                Ok(None) => warn!("missing block {block_number} despite being within head range"),
                Err(e) => error!("storage error serving REQUEST_BLOCK: {e}"),
            }
        }

        Message::SendBlock(block) => {
            if sync.phase() != ember_node::p2p::sync::SyncPhase::Syncing {
                return;
            }
            if block.block_number != sync.current_sync_block() {
                return;
            }
            sync.note_peer_height(from.clone(), block.block_number);

            let head_snapshot = head.lock().await.clone();
            let accept = if sync.is_bootstrap() {
                true
            } else {
                verify_block(&block, &head_snapshot, storage.as_ref(), storage.as_ref(), time::current_time_millis())
                    .await
                    .map_err(|e| warn!("sync block {} from {from} failed verification: {e}", block.block_number))
                    .is_ok()
            };

            if !accept {
                return;
            }

            if let Err(e) = commit_block(&block, storage, pool, peers, head, enable_logging).await {
                error!("failed to apply synced block: {e}");
                return;
            }
            sync.advance();

            let next = sync.current_sync_block();
            let from = from.clone();
            let peers = peers.clone();
            let my_address = peers.my_address().clone();
            tokio::spawn(async move {
                tokio::time::sleep(std::time::Duration::from_millis(SYNC_REQUEST_DELAY_MS)).await;
                peers.send_to(
                    &from,
                    Message::RequestBlock {
                        block_number: next,
                        request_address: my_address,
                    },
                );
            });
        }
    }
}
