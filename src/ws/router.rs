//! Per-frame routing: revalidate the sender, apply moderation, classify,
//! persist, fan out.
//!
//! The sender gets no feedback for dropped frames — the protocol has no
//! negative-acknowledgement path. The outcome enum exists for logging and
//! tests, not for the wire.

use chrono::Utc;

use crate::chat::store::{self as chat_store, ChatMessage};
use crate::identity::store::{self as identity_store, UserIdentity};
use crate::moderation::gate::{self, Sanction};
use crate::state::AppState;
use crate::ws::protocol::{self, DeliveryFrame, InboundFrame};

/// What happened to one inbound frame. Only `RejectedBanned` changes the
/// connection's state; everything else leaves it active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    /// Persisted and fanned out.
    Accepted,
    /// Bad JSON, unknown type, empty content, or bad/unknown recipient.
    DroppedMalformed,
    /// Sender is muted; nothing persisted, nothing delivered.
    DroppedMuted,
    /// Sender is banned or no longer exists; the connection must close.
    RejectedBanned,
    /// Insert failed; nothing delivered, connection stays open.
    PersistFailed,
}

/// Process one inbound text frame from `sender_id`.
///
/// The sender's identity is re-read from the store on every call — a ban
/// or mute applied mid-session takes effect on the very next frame.
pub async fn route_frame(state: &AppState, sender_id: i64, text: &str) -> RouteOutcome {
    // Revalidate: never reuse the identity resolved at connect time.
    let sender = match identity_store::lookup(&state.db, sender_id).await {
        Ok(Some(user)) => user,
        Ok(None) => {
            tracing::info!(user_id = sender_id, "Sender deleted mid-session, closing");
            return RouteOutcome::RejectedBanned;
        }
        Err(e) => {
            tracing::error!(user_id = sender_id, error = %e, "Identity lookup failed, dropping frame");
            return RouteOutcome::PersistFailed;
        }
    };

    if gate::assess(&sender, Utc::now()) == Sanction::Banned {
        tracing::info!(user_id = sender_id, "Sender banned mid-session, closing");
        return RouteOutcome::RejectedBanned;
    }

    let Some(frame) = protocol::parse_inbound(text) else {
        tracing::debug!(user_id = sender_id, "Malformed frame dropped");
        return RouteOutcome::DroppedMalformed;
    };

    let content = match &frame {
        InboundFrame::Public { content } | InboundFrame::Private { content, .. } => {
            content.trim().to_string()
        }
    };
    if content.is_empty() {
        tracing::debug!(user_id = sender_id, "Empty frame dropped");
        return RouteOutcome::DroppedMalformed;
    }

    // Mute is a soft stop: the frame is swallowed before persistence, the
    // connection keeps receiving.
    if gate::assess(&sender, Utc::now()) == Sanction::Muted {
        tracing::debug!(user_id = sender_id, "Frame from muted sender dropped");
        return RouteOutcome::DroppedMuted;
    }

    match frame {
        InboundFrame::Public { .. } => route_public(state, &sender, content).await,
        InboundFrame::Private { recipient_id, .. } => {
            route_private(state, &sender, recipient_id, content).await
        }
    }
}

/// Persist with no recipient, then broadcast to the whole registry.
async fn route_public(state: &AppState, sender: &UserIdentity, content: String) -> RouteOutcome {
    let Some(message) = persist(state, sender, None, content).await else {
        return RouteOutcome::PersistFailed;
    };

    let delivery = DeliveryFrame::new(&message, sender).to_message();
    state.registry.broadcast(&delivery);

    tracing::debug!(
        message_id = message.id,
        user_id = sender.id,
        "Public message routed"
    );
    RouteOutcome::Accepted
}

/// Persist with a validated recipient, then deliver to sender and (if
/// distinct) recipient. A self-addressed message is delivered once.
async fn route_private(
    state: &AppState,
    sender: &UserIdentity,
    recipient_id: Option<i64>,
    content: String,
) -> RouteOutcome {
    let Some(recipient_id) = recipient_id else {
        tracing::debug!(user_id = sender.id, "Private frame without recipient dropped");
        return RouteOutcome::DroppedMalformed;
    };

    match identity_store::lookup(&state.db, recipient_id).await {
        Ok(Some(_)) => {}
        Ok(None) => {
            tracing::debug!(
                user_id = sender.id,
                recipient_id,
                "Private frame to unknown recipient dropped"
            );
            return RouteOutcome::DroppedMalformed;
        }
        Err(e) => {
            tracing::error!(user_id = sender.id, error = %e, "Recipient lookup failed, dropping frame");
            return RouteOutcome::PersistFailed;
        }
    }

    let Some(message) = persist(state, sender, Some(recipient_id), content).await else {
        return RouteOutcome::PersistFailed;
    };

    let delivery = DeliveryFrame::new(&message, sender).to_message();
    state.registry.send_to_user(sender.id, &delivery);
    if recipient_id != sender.id {
        state.registry.send_to_user(recipient_id, &delivery);
    }

    tracing::debug!(
        message_id = message.id,
        user_id = sender.id,
        recipient_id,
        "Private message routed"
    );
    RouteOutcome::Accepted
}

/// Persist-before-route: a message is routed only after a successful
/// insert. An insert failure is logged and the frame goes nowhere; the
/// connection is not torn down for it.
async fn persist(
    state: &AppState,
    sender: &UserIdentity,
    recipient_id: Option<i64>,
    content: String,
) -> Option<ChatMessage> {
    match chat_store::insert_message(&state.db, sender.id, recipient_id, content).await {
        Ok(message) => Some(message),
        Err(e) => {
            tracing::error!(user_id = sender.id, error = %e, "Message insert failed, not routed");
            None
        }
    }
}
