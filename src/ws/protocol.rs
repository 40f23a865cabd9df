//! JSON wire protocol for the chat WebSocket.
//!
//! Inbound frames are fire-and-forget: the client never receives an
//! acknowledgement or an error response. Anything that does not parse into
//! a recognized frame is dropped by the router.

use axum::extract::ws::Message;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::chat::store::ChatMessage;
use crate::identity::store::UserIdentity;

/// Inbound frame (client → hub). Tagged by the `type` field; an
/// unrecognized tag fails deserialization and the frame is dropped.
#[derive(Debug, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum InboundFrame {
    #[serde(rename = "public_message")]
    Public { content: String },

    #[serde(rename = "private_message")]
    Private {
        content: String,
        /// Missing or non-integer recipient makes the frame malformed.
        recipient_id: Option<i64>,
    },
}

/// Parse an inbound text frame. None = malformed (bad JSON, unknown type,
/// missing fields, wrong field types).
pub fn parse_inbound(text: &str) -> Option<InboundFrame> {
    serde_json::from_str(text).ok()
}

/// Outbound delivery frame (hub → client), pushed asynchronously with no
/// corresponding request. Also the shape of history REST responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryFrame {
    pub id: i64,
    /// Sender id.
    pub user_id: i64,
    pub username: String,
    pub color: String,
    pub is_admin: bool,
    /// None = public broadcast.
    pub recipient_id: Option<i64>,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl DeliveryFrame {
    /// Build a delivery frame from a persisted message and the sender's
    /// identity snapshot taken in the same routing pass.
    pub fn new(message: &ChatMessage, sender: &UserIdentity) -> Self {
        Self {
            id: message.id,
            user_id: sender.id,
            username: sender.username.clone(),
            color: sender.color.clone(),
            is_admin: sender.is_admin,
            recipient_id: message.recipient_id,
            content: message.content.clone(),
            created_at: message.created_at,
        }
    }

    /// Serialize into a WebSocket text message, once per fan-out.
    pub fn to_message(&self) -> Message {
        // DeliveryFrame contains nothing that can fail to serialize
        let json = serde_json::to_string(self).unwrap_or_default();
        Message::Text(json.into())
    }
}
