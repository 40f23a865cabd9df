pub mod jwt;
pub mod middleware;
pub mod password;

use thiserror::Error;

/// Handshake-time authentication failures. All of them reject the
/// connection before any application frame is exchanged.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("token invalid")]
    Invalid,

    #[error("token expired")]
    Expired,

    #[error("user not found")]
    UserNotFound,
}

/// WebSocket close codes for policy rejections:
/// 4001 = token expired
/// 4002 = token invalid / unknown user
/// 4003 = banned
pub const CLOSE_TOKEN_EXPIRED: u16 = 4001;
pub const CLOSE_TOKEN_INVALID: u16 = 4002;
pub const CLOSE_BANNED: u16 = 4003;

impl AuthError {
    /// Close code sent when this error rejects a WebSocket handshake.
    pub fn close_code(&self) -> u16 {
        match self {
            AuthError::Expired => CLOSE_TOKEN_EXPIRED,
            AuthError::Invalid | AuthError::UserNotFound => CLOSE_TOKEN_INVALID,
        }
    }
}
