use crate::db::DbPool;
use crate::ws::SessionRegistry;

/// Shared application state passed to all handlers via axum State extractor.
#[derive(Clone)]
pub struct AppState {
    /// SQLite connection wrapped in Arc<Mutex>
    pub db: DbPool,
    /// JWT signing secret (256-bit random key)
    pub jwt_secret: Vec<u8>,
    /// Live WebSocket connections per user
    pub registry: SessionRegistry,
    /// Reserved admin username (registration rejects it)
    pub admin_username: String,
}
