use std::path::Path;

use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use rand::Rng;

use crate::auth::middleware::Claims;
use crate::auth::AuthError;
use crate::identity::store::UserIdentity;

/// Access token lifetime in seconds (24 hours).
const ACCESS_TOKEN_TTL_SECS: i64 = 86_400;

/// Load or generate the JWT signing key (256-bit random secret).
/// Key is stored as raw bytes in data_dir/jwt_secret.
pub fn load_or_generate_jwt_secret(data_dir: &str) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    let key_path = Path::new(data_dir).join("jwt_secret");

    if key_path.exists() {
        let key = std::fs::read(&key_path)?;
        if key.len() == 32 {
            tracing::info!("JWT signing key loaded from {}", key_path.display());
            return Ok(key);
        }
        // Invalid key file — regenerate
        tracing::warn!("JWT key file has wrong size ({}), regenerating", key.len());
    }

    let key: [u8; 32] = rand::rng().random();
    std::fs::write(&key_path, key)?;
    tracing::info!("JWT signing key generated at {}", key_path.display());
    Ok(key.to_vec())
}

/// Issue an access token for a user.
/// Claims: sub=user id, username, is_admin, iat, exp.
pub fn issue_access_token(
    secret: &[u8],
    user: &UserIdentity,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = Utc::now().timestamp();
    let claims = Claims {
        sub: user.id,
        username: user.username.clone(),
        is_admin: user.is_admin,
        iat: now,
        exp: now + ACCESS_TOKEN_TTL_SECS,
    };

    encode(
        &Header::default(), // HS256
        &claims,
        &EncodingKey::from_secret(secret),
    )
}

/// Validate an access token and return its claims.
/// The claims identify the user at issue time; moderation state is never
/// trusted from the token — callers re-read the identity store.
pub fn validate_access_token(secret: &[u8], token: &str) -> Result<Claims, AuthError> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|err| match err.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::Expired,
        _ => AuthError::Invalid,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_user() -> UserIdentity {
        UserIdentity {
            id: 42,
            username: "alice".to_string(),
            color: "#00ff00".to_string(),
            is_admin: false,
            is_banned: false,
            muted_until: None,
        }
    }

    #[test]
    fn issue_and_validate_round_trip() {
        let secret = vec![7u8; 32];
        let token = issue_access_token(&secret, &test_user()).unwrap();
        let claims = validate_access_token(&secret, &token).unwrap();
        assert_eq!(claims.sub, 42);
        assert_eq!(claims.username, "alice");
        assert!(!claims.is_admin);
    }

    #[test]
    fn wrong_secret_is_invalid() {
        let token = issue_access_token(&[7u8; 32], &test_user()).unwrap();
        let err = validate_access_token(&[8u8; 32], &token).unwrap_err();
        assert_eq!(err, AuthError::Invalid);
    }

    #[test]
    fn garbage_token_is_invalid() {
        let err = validate_access_token(&[7u8; 32], "not-a-jwt").unwrap_err();
        assert_eq!(err, AuthError::Invalid);
    }
}
