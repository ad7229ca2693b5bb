//! Peer connection lifecycle and message routing.
//!
//! `PeerManager` is the single owner of the peer table. Every other task
//! reaches peers only through its `broadcast`/`send_to` methods, never
//! by touching the table directly.

pub mod peer;
pub mod server;
pub mod sync;

use dashmap::DashMap;
use ember_common::{Message, PeerAddress};
use log::{debug, trace};
use tokio::sync::mpsc;

pub type OutboundSender = mpsc::UnboundedSender<Message>;

pub struct PeerManager {
    my_address: PeerAddress,
    open: DashMap<PeerAddress, OutboundSender>,
    known: DashMap<PeerAddress, ()>,
}

impl PeerManager {
    pub fn new(my_address: PeerAddress) -> Self {
        PeerManager {
            my_address,
            open: DashMap::new(),
            known: DashMap::new(),
        }
    }

    pub fn my_address(&self) -> &PeerAddress {
        &self.my_address
    }

    pub fn is_known(&self, address: &PeerAddress) -> bool {
        address == &self.my_address || self.known.contains_key(address)
    }

    pub fn mark_known(&self, address: PeerAddress) {
        self.known.insert(address, ());
    }

    /// Register a freshly opened socket's outbound sender, guarding
    /// against a duplicate entry for the same address.
    pub fn register_open(&self, address: PeerAddress, sender: OutboundSender) -> bool {
        if self.open.contains_key(&address) {
            return false;
        }
        self.known.insert(address.clone(), ());
        self.open.insert(address, sender);
        true
    }

    pub fn on_peer_closed(&self, address: &PeerAddress) {
        debug!("peer {address} disconnected");
        self.open.remove(address);
    }

    pub fn open_addresses(&self) -> Vec<PeerAddress> {
        self.open.iter().map(|e| e.key().clone()).collect()
    }

    pub fn send_to(&self, address: &PeerAddress, message: Message) -> bool {
        match self.open.get(address) {
            Some(sender) => sender.send(message).is_ok(),
            None => false,
        }
    }

    /// Send `message` to every open peer, dropping unreachable ones
    /// silently (their own read loop will notice the closed socket and
    /// call `on_peer_closed`).
    pub fn broadcast(&self, message: Message) {
        trace!("broadcasting to {} open peers", self.open.len());
        for entry in self.open.iter() {
            let _ = entry.value().send(message.clone());
        }
    }

    pub fn open_peer_count(&self) -> usize {
        self.open.len()
    }
}
