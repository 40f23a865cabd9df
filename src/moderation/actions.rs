//! Admin moderation REST actions: mute, unmute, ban, unban, delete.
//!
//! These mutate the identity store out-of-band; the WebSocket hub picks the
//! changes up on the target's next frame because it re-reads the store per
//! frame. Ban additionally force-closes the target's live connections so
//! the sanction lands even on an idle connection.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::middleware::Claims;
use crate::auth::CLOSE_BANNED;
use crate::db::StoreError;
use crate::identity::store::{self, UserIdentity};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct MuteRequest {
    pub minutes: i64,
}

/// Admin-facing user listing including moderation flags.
#[derive(Debug, Serialize)]
pub struct ModeratedUserView {
    pub id: i64,
    pub username: String,
    pub color: String,
    pub is_admin: bool,
    pub is_banned: bool,
    pub muted_until: Option<chrono::DateTime<Utc>>,
}

impl From<UserIdentity> for ModeratedUserView {
    fn from(user: UserIdentity) -> Self {
        Self {
            id: user.id,
            username: user.username,
            color: user.color,
            is_admin: user.is_admin,
            is_banned: user.is_banned,
            muted_until: user.muted_until,
        }
    }
}

fn internal_error(err: StoreError) -> (StatusCode, String) {
    tracing::error!(error = %err, "Identity store error");
    (StatusCode::INTERNAL_SERVER_ERROR, "Internal error".into())
}

/// Reject non-admin callers. Admin status is re-read from the store, not
/// trusted from token claims, so revoking admin takes effect immediately.
async fn require_admin(state: &AppState, claims: &Claims) -> Result<(), (StatusCode, String)> {
    let caller = store::lookup(&state.db, claims.sub)
        .await
        .map_err(internal_error)?
        .ok_or((StatusCode::UNAUTHORIZED, "User not found".to_string()))?;
    if !caller.is_admin {
        return Err((StatusCode::FORBIDDEN, "Admins only".into()));
    }
    Ok(())
}

fn not_found() -> (StatusCode, String) {
    (StatusCode::NOT_FOUND, "User not found".into())
}

/// GET /admin/users — full listing including moderation flags.
pub async fn admin_list_users(
    State(state): State<AppState>,
    claims: Claims,
) -> Result<Json<Vec<ModeratedUserView>>, (StatusCode, String)> {
    require_admin(&state, &claims).await?;
    let users = store::list_users(&state.db).await.map_err(internal_error)?;
    Ok(Json(users.into_iter().map(ModeratedUserView::from).collect()))
}

/// POST /admin/users/{id}/mute — mute for a positive number of minutes.
pub async fn mute_user(
    State(state): State<AppState>,
    claims: Claims,
    Path(user_id): Path<i64>,
    Json(body): Json<MuteRequest>,
) -> Result<StatusCode, (StatusCode, String)> {
    require_admin(&state, &claims).await?;
    if body.minutes <= 0 {
        return Err((StatusCode::BAD_REQUEST, "Minutes must be > 0".into()));
    }

    let until = Utc::now() + Duration::minutes(body.minutes);
    let existed = store::set_muted_until(&state.db, user_id, Some(until))
        .await
        .map_err(internal_error)?;
    if !existed {
        return Err(not_found());
    }

    tracing::info!(target_user = user_id, minutes = body.minutes, by = claims.sub, "User muted");
    Ok(StatusCode::NO_CONTENT)
}

/// POST /admin/users/{id}/unmute
pub async fn unmute_user(
    State(state): State<AppState>,
    claims: Claims,
    Path(user_id): Path<i64>,
) -> Result<StatusCode, (StatusCode, String)> {
    require_admin(&state, &claims).await?;

    let existed = store::set_muted_until(&state.db, user_id, None)
        .await
        .map_err(internal_error)?;
    if !existed {
        return Err(not_found());
    }

    tracing::info!(target_user = user_id, by = claims.sub, "User unmuted");
    Ok(StatusCode::NO_CONTENT)
}

/// POST /admin/users/{id}/ban — set the ban flag and force-close the
/// target's live WebSocket connections.
pub async fn ban_user(
    State(state): State<AppState>,
    claims: Claims,
    Path(user_id): Path<i64>,
) -> Result<StatusCode, (StatusCode, String)> {
    require_admin(&state, &claims).await?;
    if user_id == claims.sub {
        return Err((StatusCode::BAD_REQUEST, "You cannot ban yourself".into()));
    }

    let existed = store::set_banned(&state.db, user_id, true)
        .await
        .map_err(internal_error)?;
    if !existed {
        return Err(not_found());
    }

    state
        .registry
        .force_close_user(user_id, CLOSE_BANNED, "Banned");

    tracing::info!(target_user = user_id, by = claims.sub, "User banned");
    Ok(StatusCode::NO_CONTENT)
}

/// POST /admin/users/{id}/unban
pub async fn unban_user(
    State(state): State<AppState>,
    claims: Claims,
    Path(user_id): Path<i64>,
) -> Result<StatusCode, (StatusCode, String)> {
    require_admin(&state, &claims).await?;

    let existed = store::set_banned(&state.db, user_id, false)
        .await
        .map_err(internal_error)?;
    if !existed {
        return Err(not_found());
    }

    tracing::info!(target_user = user_id, by = claims.sub, "User unbanned");
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /admin/users/{id} — remove the account and its messages.
pub async fn delete_user(
    State(state): State<AppState>,
    claims: Claims,
    Path(user_id): Path<i64>,
) -> Result<StatusCode, (StatusCode, String)> {
    require_admin(&state, &claims).await?;
    if user_id == claims.sub {
        return Err((StatusCode::BAD_REQUEST, "You cannot delete yourself".into()));
    }

    let existed = store::delete_user(&state.db, user_id)
        .await
        .map_err(internal_error)?;
    if !existed {
        return Err(not_found());
    }

    tracing::info!(target_user = user_id, by = claims.sub, "User deleted");
    Ok(StatusCode::NO_CONTENT)
}
