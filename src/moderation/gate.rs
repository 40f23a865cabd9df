//! Moderation policy applied to every inbound frame.
//!
//! Ban is a hard stop: the connection is terminated. Mute is a soft stop:
//! the connection stays open and keeps receiving, only the user's own
//! outbound frames are swallowed before persistence. Ban wins over mute.

use chrono::{DateTime, Utc};

use crate::identity::store::UserIdentity;

/// Sanction in effect for a user at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sanction {
    /// No sanction — the frame proceeds.
    Clear,
    /// Muted until some future instant — drop the frame, keep the connection.
    Muted,
    /// Banned — terminate the connection.
    Banned,
}

/// Evaluate the moderation state of a fresh identity snapshot.
pub fn assess(user: &UserIdentity, now: DateTime<Utc>) -> Sanction {
    if user.is_banned {
        return Sanction::Banned;
    }
    match user.muted_until {
        Some(until) if until > now => Sanction::Muted,
        _ => Sanction::Clear,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn user(is_banned: bool, muted_until: Option<DateTime<Utc>>) -> UserIdentity {
        UserIdentity {
            id: 1,
            username: "u".to_string(),
            color: "#ffffff".to_string(),
            is_admin: false,
            is_banned,
            muted_until,
        }
    }

    #[test]
    fn clear_user_passes() {
        assert_eq!(assess(&user(false, None), Utc::now()), Sanction::Clear);
    }

    #[test]
    fn active_mute_is_muted() {
        let now = Utc::now();
        let u = user(false, Some(now + Duration::minutes(5)));
        assert_eq!(assess(&u, now), Sanction::Muted);
    }

    #[test]
    fn elapsed_mute_is_clear() {
        let now = Utc::now();
        let u = user(false, Some(now - Duration::seconds(1)));
        assert_eq!(assess(&u, now), Sanction::Clear);
    }

    #[test]
    fn ban_wins_over_mute() {
        let now = Utc::now();
        let u = user(true, Some(now + Duration::minutes(5)));
        assert_eq!(assess(&u, now), Sanction::Banned);
    }
}
