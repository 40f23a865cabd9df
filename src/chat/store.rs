//! Persistence adapter for chat messages.
//!
//! A message is either fully persisted (id and created_at assigned here)
//! or not persisted at all; the hub never routes a message that failed to
//! insert. Ids are SQLite rowids — monotonically increasing.

use chrono::{DateTime, Utc};
use rusqlite::params;

use crate::db::{DbPool, StoreError};

/// A persisted chat message. Immutable once created.
#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub id: i64,
    pub sender_id: i64,
    /// None = public broadcast message.
    pub recipient_id: Option<i64>,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Insert a message, assigning its canonical id and timestamp.
/// Failure is reported to the caller, never swallowed.
pub async fn insert_message(
    db: &DbPool,
    sender_id: i64,
    recipient_id: Option<i64>,
    content: String,
) -> Result<ChatMessage, StoreError> {
    let db = db.clone();
    tokio::task::spawn_blocking(move || {
        let conn = db.lock().map_err(|_| StoreError::Unavailable)?;
        let created_at = Utc::now();
        conn.execute(
            "INSERT INTO messages (sender_id, recipient_id, content, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![sender_id, recipient_id, content, created_at.to_rfc3339()],
        )?;
        Ok(ChatMessage {
            id: conn.last_insert_rowid(),
            sender_id,
            recipient_id,
            content,
            created_at,
        })
    })
    .await
    .map_err(|_| StoreError::Unavailable)?
}
