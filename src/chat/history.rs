//! Message-history REST endpoints.
//!
//! History rows are shaped exactly like live delivery frames, so clients
//! render both the same way.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use rusqlite::Row;
use serde::Deserialize;

use crate::auth::middleware::Claims;
use crate::db::{DbPool, StoreError};
use crate::state::AppState;
use crate::ws::protocol::DeliveryFrame;

const DEFAULT_PUBLIC_LIMIT: u32 = 50;
const DEFAULT_PRIVATE_LIMIT: u32 = 100;
const MAX_LIMIT: u32 = 500;

#[derive(Debug, Deserialize)]
pub struct PublicHistoryQuery {
    pub limit: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct PrivateHistoryQuery {
    pub with_user_id: i64,
    pub limit: Option<u32>,
}

fn internal_error(err: StoreError) -> (StatusCode, String) {
    tracing::error!(error = %err, "Message history query failed");
    (StatusCode::INTERNAL_SERVER_ERROR, "Internal error".into())
}

fn frame_from_row(row: &Row<'_>) -> rusqlite::Result<DeliveryFrame> {
    let created_at: String = row.get(7)?;
    Ok(DeliveryFrame {
        id: row.get(0)?,
        user_id: row.get(1)?,
        username: row.get(2)?,
        color: row.get(3)?,
        is_admin: row.get(4)?,
        recipient_id: row.get(5)?,
        content: row.get(6)?,
        created_at: DateTime::parse_from_rfc3339(&created_at)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH),
    })
}

/// Fetch the newest `limit` rows matching `where_clause`, returned in
/// ascending id order (chat render order).
async fn query_history(
    db: &DbPool,
    where_clause: &'static str,
    bind: Vec<i64>,
    limit: u32,
) -> Result<Vec<DeliveryFrame>, StoreError> {
    let db = db.clone();
    tokio::task::spawn_blocking(move || {
        let conn = db.lock().map_err(|_| StoreError::Unavailable)?;
        let sql = format!(
            "SELECT m.id, m.sender_id, u.username, u.color, u.is_admin,
                    m.recipient_id, m.content, m.created_at
             FROM messages m
             JOIN users u ON m.sender_id = u.id
             WHERE {where_clause}
             ORDER BY m.id DESC
             LIMIT ?"
        );
        let mut stmt = conn.prepare(&sql)?;
        let mut bound: Vec<&dyn rusqlite::ToSql> =
            bind.iter().map(|v| v as &dyn rusqlite::ToSql).collect();
        let limit = i64::from(limit);
        bound.push(&limit);
        let mut frames = stmt
            .query_map(&bound[..], frame_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        frames.reverse();
        Ok(frames)
    })
    .await
    .map_err(|_| StoreError::Unavailable)?
}

/// GET /messages?limit= — public history (no auth, as the landing page
/// loads it before login).
pub async fn public_messages(
    State(state): State<AppState>,
    Query(query): Query<PublicHistoryQuery>,
) -> Result<Json<Vec<DeliveryFrame>>, (StatusCode, String)> {
    let limit = query.limit.unwrap_or(DEFAULT_PUBLIC_LIMIT).min(MAX_LIMIT);
    let frames = query_history(&state.db, "m.recipient_id IS NULL", vec![], limit)
        .await
        .map_err(internal_error)?;
    Ok(Json(frames))
}

/// GET /private/messages?with_user_id=&limit= — both directions of the
/// conversation between the caller and `with_user_id`.
pub async fn private_messages(
    State(state): State<AppState>,
    claims: Claims,
    Query(query): Query<PrivateHistoryQuery>,
) -> Result<Json<Vec<DeliveryFrame>>, (StatusCode, String)> {
    let limit = query.limit.unwrap_or(DEFAULT_PRIVATE_LIMIT).min(MAX_LIMIT);
    let frames = query_history(
        &state.db,
        "m.recipient_id IS NOT NULL
         AND ((m.sender_id = ?1 AND m.recipient_id = ?2)
           OR (m.sender_id = ?2 AND m.recipient_id = ?1))",
        vec![claims.sub, query.with_user_id],
        limit,
    )
    .await
    .map_err(internal_error)?;
    Ok(Json(frames))
}
