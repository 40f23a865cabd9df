//! WebSocket handshake: token validation and live-identity checks happen
//! before a connection ever reaches the registry.

use axum::{
    extract::{
        ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
};
use serde::Deserialize;

use crate::auth::{jwt, AuthError, CLOSE_BANNED, CLOSE_TOKEN_INVALID};
use crate::identity::store;
use crate::state::AppState;
use crate::ws::actor;

/// Query parameters for the WebSocket connection. Auth is via
/// `?token=JWT` because browsers cannot set headers on WebSocket opens.
#[derive(Debug, Deserialize)]
pub struct WsAuthQuery {
    pub token: String,
}

/// GET /ws?token=JWT
///
/// Rejection (invalid/expired token, unknown user, banned user) upgrades
/// the connection and immediately closes it with a policy close code —
/// no application frame is exchanged and no registry entry is created.
pub async fn ws_upgrade(
    State(state): State<AppState>,
    Query(params): Query<WsAuthQuery>,
    ws: WebSocketUpgrade,
) -> Response {
    let claims = match jwt::validate_access_token(&state.jwt_secret, &params.token) {
        Ok(claims) => claims,
        Err(err) => {
            tracing::warn!(error = %err, "WebSocket auth failed");
            return reject(ws, err.close_code(), "Unauthorized");
        }
    };

    // The token only names the user; ban state is read fresh from the store
    let user = match store::lookup(&state.db, claims.sub).await {
        Ok(Some(user)) => user,
        Ok(None) => {
            tracing::warn!(user_id = claims.sub, "WebSocket auth for unknown user");
            return reject(ws, AuthError::UserNotFound.close_code(), "Unauthorized");
        }
        Err(e) => {
            tracing::error!(error = %e, "Identity lookup failed during handshake");
            return reject(ws, CLOSE_TOKEN_INVALID, "Unauthorized");
        }
    };

    if user.is_banned {
        tracing::warn!(user_id = user.id, username = %user.username, "Banned user rejected at handshake");
        return reject(ws, CLOSE_BANNED, "Banned");
    }

    tracing::info!(user_id = user.id, username = %user.username, "WebSocket connection authenticated");
    ws.on_upgrade(move |socket| actor::run_connection(socket, state, user))
}

/// Upgrade, then immediately close with the given policy code.
fn reject(ws: WebSocketUpgrade, close_code: u16, reason: &'static str) -> Response {
    ws.on_upgrade(move |mut socket: WebSocket| async move {
        let close_frame = CloseFrame {
            code: close_code,
            reason: reason.into(),
        };
        let _ = socket.send(Message::Close(Some(close_frame))).await;
    })
}
