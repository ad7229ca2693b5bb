//! Socket handling shared by inbound (server-accepted) and outbound
//! (dialed) connections: once a `WebSocketStream` exists, both sides are
//! driven identically by [`spawn_connection`].

use std::sync::Arc;

use ember_common::{Message, PeerAddress};
use futures_util::{SinkExt, StreamExt};
use log::{debug, warn};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{connect_async, WebSocketStream};

use crate::error::P2pError;
use crate::p2p::PeerManager;

/// Dial `target`, register it as an open peer, and announce ourselves
/// plus every peer we already know, which gives transitive peer
/// discovery: the remote side dials back anyone it doesn't recognize.
pub async fn connect_to(
    manager: Arc<PeerManager>,
    target: PeerAddress,
    inbound_tx: mpsc::UnboundedSender<(PeerAddress, Message)>,
) -> Result<(), P2pError> {
    if manager.is_known(&target) {
        return Err(P2pError::AlreadyConnected(target));
    }

    let (ws_stream, _) = connect_async(&target)
        .await
        .map_err(|_| P2pError::InvalidAddress(target.clone()))?;

    let (out_tx, out_rx) = mpsc::unbounded_channel();
    if !manager.register_open(target.clone(), out_tx.clone()) {
        return Err(P2pError::AlreadyConnected(target));
    }

    spawn_connection(target.clone(), ws_stream, out_rx, manager.clone(), inbound_tx);

    let _ = out_tx.send(Message::Handshake(manager.my_address().clone()));
    for known in manager.open_addresses() {
        if known != target {
            let _ = out_tx.send(Message::Handshake(known));
        }
    }

    Ok(())
}

/// Drive one already-connected socket: pump `out_rx` into the socket and
/// forward every inbound frame to `inbound_tx`, tagged with `address`.
/// Removes the peer from `manager` when the socket closes either way.
pub fn spawn_connection<S>(
    address: PeerAddress,
    ws_stream: WebSocketStream<S>,
    mut out_rx: mpsc::UnboundedReceiver<Message>,
    manager: Arc<PeerManager>,
    inbound_tx: mpsc::UnboundedSender<(PeerAddress, Message)>,
) where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (mut sink, mut stream) = ws_stream.split();

    tokio::spawn(async move {
        while let Some(message) = out_rx.recv().await {
            let frame = match serde_json::to_string(&message) {
                Ok(json) => WsMessage::Text(json),
                Err(e) => {
                    warn!("failed to encode outgoing message: {e}");
                    continue;
                }
            };
            if sink.send(frame).await.is_err() {
                break;
            }
        }
    });

    tokio::spawn(async move {
        loop {
            match stream.next().await {
                Some(Ok(WsMessage::Text(text))) => match serde_json::from_str::<Message>(&text) {
                    Ok(message) => {
                        if inbound_tx.send((address.clone(), message)).is_err() {
                            break;
                        }
                    }
                    Err(e) => warn!("dropping malformed frame from {address}: {e}"),
                },
                Some(Ok(WsMessage::Close(_))) | None => {
                    debug!("socket closed by {address}");
                    break;
                }
                Some(Err(e)) => {
                    warn!("socket error from {address}: {e}");
                    break;
                }
                _ => {}
            }
        }
        manager.on_peer_closed(&address);
    });
}
