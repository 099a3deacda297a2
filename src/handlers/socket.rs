use crate::dispatch::Dispatcher;
use crate::registry::ConnectionId;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use warp::ws::WebSocket;

/// Serves one push socket for `user_id` until the client goes away.
///
/// The socket is push-only: frames the client sends are ignored.
pub async fn socket_handler(ws: WebSocket, user_id: String, dispatcher: Dispatcher) {
    let (mut ws_tx, mut ws_rx) = ws.split();
    let (client_tx, mut client_rx) = mpsc::unbounded_channel();
    let connection_id = ConnectionId::new();
    let registry = dispatcher.registry().clone();

    for old in registry.register(&user_id, connection_id, client_tx).await {
        log::info!("socket {} of {} replaced by {}", old, user_id, connection_id);
    }
    log::info!("user {} connected on socket {}", user_id, connection_id);
    dispatcher.broadcast_presence().await;

    let writer_user = user_id.clone();
    let writer = tokio::spawn(async move {
        while let Some(message) = client_rx.recv().await {
            if let Err(e) = ws_tx.send(message).await {
                log::debug!("push to {} failed: {}", writer_user, e);
                break;
            }
        }
    });

    while let Some(result) = ws_rx.next().await {
        match result {
            Ok(message) if message.is_close() => break,
            Ok(message) => {
                log::debug!("ignoring client frame from {}: {:?}", user_id, message);
            }
            Err(e) => {
                log::debug!("socket {} of {} errored: {}", connection_id, user_id, e);
                break;
            }
        }
    }

    registry.unregister(&user_id, connection_id).await;
    writer.abort();
    dispatcher.broadcast_presence().await;
    log::info!("user {} disconnected from socket {}", user_id, connection_id);
}
