//! Registration, login, and user listing REST endpoints.

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};

use crate::auth::middleware::Claims;
use crate::auth::{jwt, password};
use crate::db::StoreError;
use crate::identity::store::{self, UserIdentity};
use crate::state::AppState;

const DEFAULT_COLOR: &str = "#ffffff";

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    pub color: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: &'static str,
}

/// Public projection of a user — moderation flags are not exposed here.
#[derive(Debug, Serialize)]
pub struct UserView {
    pub id: i64,
    pub username: String,
    pub color: String,
    pub is_admin: bool,
}

impl From<UserIdentity> for UserView {
    fn from(user: UserIdentity) -> Self {
        Self {
            id: user.id,
            username: user.username,
            color: user.color,
            is_admin: user.is_admin,
        }
    }
}

fn internal_error(err: StoreError) -> (StatusCode, String) {
    tracing::error!(error = %err, "Identity store error");
    (StatusCode::INTERNAL_SERVER_ERROR, "Internal error".into())
}

/// POST /register — create a new (non-admin) account.
pub async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> Result<Json<UserView>, (StatusCode, String)> {
    let username = body.username.trim();
    if username.is_empty() || body.password.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            "Username and password are required".into(),
        ));
    }
    if username.eq_ignore_ascii_case(&state.admin_username) {
        return Err((StatusCode::BAD_REQUEST, "This username is reserved".into()));
    }

    let color = body.color.unwrap_or_else(|| DEFAULT_COLOR.to_string());
    let hash = password::hash_password(&body.password).map_err(|e| {
        tracing::error!(error = %e, "Password hashing failed");
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal error".into())
    })?;

    match store::create_user(&state.db, username, &hash, &color, false).await {
        Ok(user) => {
            tracing::info!(user_id = user.id, username = %user.username, "User registered");
            Ok(Json(user.into()))
        }
        Err(StoreError::UsernameTaken) => {
            Err((StatusCode::BAD_REQUEST, "Username already taken".into()))
        }
        Err(e) => Err(internal_error(e)),
    }
}

/// POST /login — verify credentials, issue an access token.
/// Banned accounts cannot log in at all.
pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<TokenResponse>, (StatusCode, String)> {
    let wrong_credentials = || {
        (
            StatusCode::UNAUTHORIZED,
            "Wrong username or password".to_string(),
        )
    };

    let (user, stored_hash) = store::lookup_by_username(&state.db, &body.username)
        .await
        .map_err(internal_error)?
        .ok_or_else(wrong_credentials)?;

    if !password::verify_password(&body.password, &stored_hash) {
        return Err(wrong_credentials());
    }

    if user.is_banned {
        return Err((StatusCode::FORBIDDEN, "This account is banned".into()));
    }

    let access_token = jwt::issue_access_token(&state.jwt_secret, &user).map_err(|e| {
        tracing::error!(error = %e, "Token issuance failed");
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal error".into())
    })?;

    tracing::info!(user_id = user.id, username = %user.username, "User logged in");
    Ok(Json(TokenResponse {
        access_token,
        token_type: "bearer",
    }))
}

/// GET /me — the caller's current identity.
pub async fn me(
    State(state): State<AppState>,
    claims: Claims,
) -> Result<Json<UserView>, (StatusCode, String)> {
    let user = store::lookup(&state.db, claims.sub)
        .await
        .map_err(internal_error)?
        .ok_or((StatusCode::UNAUTHORIZED, "User not found".to_string()))?;
    Ok(Json(user.into()))
}

/// GET /users — all users, sorted by username. Requires auth.
pub async fn list_users(
    State(state): State<AppState>,
    _claims: Claims,
) -> Result<Json<Vec<UserView>>, (StatusCode, String)> {
    let users = store::list_users(&state.db).await.map_err(internal_error)?;
    Ok(Json(users.into_iter().map(UserView::from).collect()))
}
