//! The gossip server: accepts inbound WebSocket connections and waits
//! for the peer's opening `Handshake` frame before registering it.

use std::net::SocketAddr;
use std::sync::Arc;

use ember_common::{Message, PeerAddress};
use futures_util::StreamExt;
use log::{info, warn};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message as WsMessage;

use crate::error::P2pError;
use crate::p2p::peer::spawn_connection;
use crate::p2p::PeerManager;

pub async fn run_server(
    bind_addr: SocketAddr,
    manager: Arc<PeerManager>,
    inbound_tx: mpsc::UnboundedSender<(PeerAddress, Message)>,
) -> std::io::Result<()> {
    let listener = TcpListener::bind(bind_addr).await?;
    info!("gossip server listening on {bind_addr}");

    loop {
        let (socket, remote) = match listener.accept().await {
            Ok(pair) => pair,
            Err(e) => {
                warn!("accept failed: {e}");
                continue;
            }
        };
        let manager = manager.clone();
        let inbound_tx = inbound_tx.clone();
        tokio::spawn(async move {
            if let Err(e) = accept_one(socket, remote, manager, inbound_tx).await {
                warn!("inbound handshake from {remote} failed: {e}");
            }
        });
    }
}

async fn accept_one(
    socket: tokio::net::TcpStream,
    remote: SocketAddr,
    manager: Arc<PeerManager>,
    inbound_tx: mpsc::UnboundedSender<(PeerAddress, Message)>,
) -> anyhow::Result<()> {
    let mut ws_stream = tokio_tungstenite::accept_async(socket)
        .await
        .map_err(P2pError::WebSocket)?;

    let first = ws_stream
        .next()
        .await
        .ok_or(P2pError::Closed)?
        .map_err(P2pError::WebSocket)?;
    let address = match first {
        WsMessage::Text(text) => {
            match serde_json::from_str::<Message>(&text).map_err(P2pError::Parse)? {
                Message::Handshake(address) => address,
                other => anyhow::bail!("expected HANDSHAKE as first frame from {remote}, got {other:?}"),
            }
        }
        other => anyhow::bail!("expected a text frame from {remote}, got {other:?}"),
    };

    let (out_tx, out_rx) = mpsc::unbounded_channel();
    if !manager.register_open(address.clone(), out_tx) {
        return Err(P2pError::AlreadyConnected(address).into());
    }

    let _ = inbound_tx.send((address.clone(), Message::Handshake(address.clone())));
    spawn_connection(address, ws_stream, out_rx, manager, inbound_tx);
    Ok(())
}
