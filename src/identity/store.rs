//! Identity & moderation store: read/write access to the users table.
//!
//! The WebSocket hub only ever reads snapshots through [`lookup`]; admin
//! REST actions mutate the moderation flags out-of-band. A snapshot must
//! never be cached across frames — ban/mute take effect on the very next
//! frame because the hub re-reads here every time.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::auth::password;
use crate::db::{DbPool, StoreError};

/// Snapshot of a user's identity and moderation state.
#[derive(Debug, Clone)]
pub struct UserIdentity {
    pub id: i64,
    pub username: String,
    pub color: String,
    pub is_admin: bool,
    pub is_banned: bool,
    pub muted_until: Option<DateTime<Utc>>,
}

const USER_COLUMNS: &str = "id, username, color, is_admin, is_banned, muted_until";

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<UserIdentity> {
    let muted_until: Option<String> = row.get(5)?;
    Ok(UserIdentity {
        id: row.get(0)?,
        username: row.get(1)?,
        color: row.get(2)?,
        is_admin: row.get(3)?,
        is_banned: row.get(4)?,
        muted_until: muted_until
            .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
            .map(|dt| dt.with_timezone(&Utc)),
    })
}

/// Run a closure against the pooled connection on the blocking thread pool.
async fn with_conn<T, F>(db: &DbPool, f: F) -> Result<T, StoreError>
where
    T: Send + 'static,
    F: FnOnce(&Connection) -> Result<T, StoreError> + Send + 'static,
{
    let db = db.clone();
    tokio::task::spawn_blocking(move || {
        let conn = db.lock().map_err(|_| StoreError::Unavailable)?;
        f(&conn)
    })
    .await
    .map_err(|_| StoreError::Unavailable)?
}

/// Fetch a fresh identity snapshot by id. Returns None if the user no
/// longer exists (deleted mid-session).
pub async fn lookup(db: &DbPool, user_id: i64) -> Result<Option<UserIdentity>, StoreError> {
    with_conn(db, move |conn| {
        let user = conn
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
                params![user_id],
                user_from_row,
            )
            .optional()?;
        Ok(user)
    })
    .await
}

/// Fetch a user by username together with the stored password hash.
/// Used by login only.
pub async fn lookup_by_username(
    db: &DbPool,
    username: &str,
) -> Result<Option<(UserIdentity, String)>, StoreError> {
    let username = username.to_string();
    with_conn(db, move |conn| {
        let result = conn
            .query_row(
                &format!("SELECT {USER_COLUMNS}, password_hash FROM users WHERE username = ?1"),
                params![username],
                |row| {
                    let user = user_from_row(row)?;
                    let hash: String = row.get(6)?;
                    Ok((user, hash))
                },
            )
            .optional()?;
        Ok(result)
    })
    .await
}

/// Create a new user. Fails with UsernameTaken on a unique violation.
pub async fn create_user(
    db: &DbPool,
    username: &str,
    password_hash: &str,
    color: &str,
    is_admin: bool,
) -> Result<UserIdentity, StoreError> {
    let username = username.to_string();
    let password_hash = password_hash.to_string();
    let color = color.to_string();
    with_conn(db, move |conn| {
        let now = Utc::now().to_rfc3339();
        let result = conn.execute(
            "INSERT INTO users (username, password_hash, color, is_admin, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![username, password_hash, color, is_admin, now],
        );
        match result {
            Ok(_) => {}
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                return Err(StoreError::UsernameTaken);
            }
            Err(e) => return Err(e.into()),
        }
        Ok(UserIdentity {
            id: conn.last_insert_rowid(),
            username,
            color,
            is_admin,
            is_banned: false,
            muted_until: None,
        })
    })
    .await
}

/// List all users ordered by username.
pub async fn list_users(db: &DbPool) -> Result<Vec<UserIdentity>, StoreError> {
    with_conn(db, move |conn| {
        let mut stmt = conn.prepare(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY username ASC"
        ))?;
        let users = stmt
            .query_map([], user_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(users)
    })
    .await
}

/// Set or clear the ban flag. Returns false if the user does not exist.
pub async fn set_banned(db: &DbPool, user_id: i64, banned: bool) -> Result<bool, StoreError> {
    with_conn(db, move |conn| {
        let changed = conn.execute(
            "UPDATE users SET is_banned = ?1 WHERE id = ?2",
            params![banned, user_id],
        )?;
        Ok(changed > 0)
    })
    .await
}

/// Set or clear the mute expiry. Returns false if the user does not exist.
pub async fn set_muted_until(
    db: &DbPool,
    user_id: i64,
    muted_until: Option<DateTime<Utc>>,
) -> Result<bool, StoreError> {
    with_conn(db, move |conn| {
        let changed = conn.execute(
            "UPDATE users SET muted_until = ?1 WHERE id = ?2",
            params![muted_until.map(|dt| dt.to_rfc3339()), user_id],
        )?;
        Ok(changed > 0)
    })
    .await
}

/// Delete a user and their message rows. Returns false if the user does
/// not exist. Live connections for the user die on their next frame via
/// the UserNotFound revalidation path.
pub async fn delete_user(db: &DbPool, user_id: i64) -> Result<bool, StoreError> {
    with_conn(db, move |conn| {
        conn.execute(
            "DELETE FROM messages WHERE sender_id = ?1 OR recipient_id = ?1",
            params![user_id],
        )?;
        let changed = conn.execute("DELETE FROM users WHERE id = ?1", params![user_id])?;
        Ok(changed > 0)
    })
    .await
}

/// Create the admin account on first boot if it does not exist yet.
pub async fn seed_admin(
    db: &DbPool,
    username: &str,
    plaintext_password: &str,
    color: &str,
) -> Result<(), StoreError> {
    if lookup_by_username(db, username).await?.is_some() {
        tracing::info!(admin = %username, "Admin account already exists");
        return Ok(());
    }
    let hash = password::hash_password(plaintext_password).map_err(|e| {
        tracing::error!(error = %e, "Failed to hash admin password");
        StoreError::Unavailable
    })?;
    let admin = create_user(db, username, &hash, color, true).await?;
    tracing::info!(admin = %username, id = admin.id, "Admin account created");
    Ok(())
}
