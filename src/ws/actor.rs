//! Actor-per-connection: one tokio task drives each live WebSocket.
//!
//! The socket is split into reader and writer halves. The writer half is
//! owned by a dedicated task fed from an mpsc channel; the channel's sender
//! is what the session registry hands out, so any part of the system can
//! push frames to this client. The reader loop processes inbound frames
//! strictly in arrival order.

use axum::extract::ws::{CloseFrame, Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval, timeout};

use crate::auth::CLOSE_BANNED;
use crate::identity::store::UserIdentity;
use crate::state::AppState;
use crate::ws::router::{self, RouteOutcome};

/// Ping interval: server sends a WebSocket ping every 30 seconds to
/// detect abruptly dropped transports.
const PING_INTERVAL: Duration = Duration::from_secs(30);

/// Pong timeout: if no pong within 10 seconds after a ping, close.
const PONG_TIMEOUT: Duration = Duration::from_secs(10);

/// Run an authenticated connection until it closes.
///
/// Registers with the session registry on entry and unregisters exactly
/// once on exit, whatever triggered the teardown (client close, transport
/// error, live ban, pong timeout).
pub async fn run_connection(socket: WebSocket, state: AppState, user: UserIdentity) {
    let user_id = user.id;
    let (ws_sender, mut ws_receiver) = socket.split();
    let (tx, rx) = mpsc::unbounded_channel::<Message>();

    state.registry.register(user_id, tx.clone());

    tracing::info!(user_id, username = %user.username, "WebSocket actor started");

    // Writer task: owns the sink, forwards everything from the channel
    let writer_handle = tokio::spawn(writer_task(ws_sender, rx));

    // Ping task: periodic pings, watches for pongs relayed by the reader
    let (pong_tx, mut pong_rx) = mpsc::unbounded_channel::<()>();
    let ping_tx = tx.clone();
    let ping_handle = tokio::spawn(async move {
        let mut ping_timer = interval(PING_INTERVAL);
        // Skip the first immediate tick
        ping_timer.tick().await;

        loop {
            ping_timer.tick().await;

            if ping_tx.send(Message::Ping(vec![1, 2, 3, 4].into())).is_err() {
                // Writer task has died — connection is gone
                break;
            }

            match timeout(PONG_TIMEOUT, pong_rx.recv()).await {
                Ok(Some(())) => {}
                _ => {
                    tracing::warn!("Pong timeout, closing connection");
                    let _ = ping_tx.send(Message::Close(Some(CloseFrame {
                        code: 1001,
                        reason: "Pong timeout".into(),
                    })));
                    break;
                }
            }
        }
    });

    // Reader loop: frames are processed strictly in arrival order
    loop {
        match ws_receiver.next().await {
            Some(Ok(msg)) => match msg {
                Message::Text(text) => {
                    let outcome = router::route_frame(&state, user_id, text.as_str()).await;
                    if outcome == RouteOutcome::RejectedBanned {
                        // Live ban (or deletion): hard stop, no further frames
                        let _ = tx.send(Message::Close(Some(CloseFrame {
                            code: CLOSE_BANNED,
                            reason: "Banned".into(),
                        })));
                        break;
                    }
                }
                Message::Binary(_) => {
                    // Protocol is JSON text; binary frames are not part of it
                    tracing::debug!(user_id, "Binary frame dropped");
                }
                Message::Pong(_) => {
                    let _ = pong_tx.send(());
                }
                Message::Ping(data) => {
                    let _ = tx.send(Message::Pong(data));
                }
                Message::Close(frame) => {
                    tracing::info!(user_id, reason = ?frame, "Client initiated close");
                    break;
                }
            },
            Some(Err(e)) => {
                tracing::warn!(user_id, error = %e, "WebSocket receive error");
                break;
            }
            None => {
                tracing::info!(user_id, "WebSocket stream ended");
                break;
            }
        }
    }

    // Single teardown path for every exit above. The writer is not
    // aborted: once every sender clone is gone it drains whatever is
    // still queued (a pending Close frame included) and exits on its
    // own. Aborting it could kill a 4003 close before it reaches the
    // socket.
    ping_handle.abort();
    let _ = ping_handle.await;
    state.registry.unregister(user_id, &tx);
    drop(tx);
    let _ = writer_handle.await;

    tracing::info!(user_id, username = %user.username, "WebSocket actor stopped");
}

/// Writer task: drains the channel into the WebSocket sink until either
/// side goes away.
async fn writer_task(
    mut ws_sender: futures_util::stream::SplitSink<WebSocket, Message>,
    mut rx: mpsc::UnboundedReceiver<Message>,
) {
    while let Some(msg) = rx.recv().await {
        let is_close = matches!(msg, Message::Close(_));
        if ws_sender.send(msg).await.is_err() {
            // WebSocket send failed — connection is broken
            break;
        }
        if is_close {
            break;
        }
    }
}
