pub mod actor;
pub mod handler;
pub mod protocol;
pub mod router;

use axum::extract::ws::{CloseFrame, Message};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Sender half of a WebSocket connection's outbound channel.
/// Any part of the system can clone this to push frames to that client.
pub type ConnectionSender = mpsc::UnboundedSender<Message>;

/// Tracks which users are currently reachable and performs best-effort
/// delivery to their live connections.
///
/// A user can hold multiple concurrent connections (multiple tabs or
/// devices). Invariant: a user id is a key iff its connection list is
/// non-empty — the key is dropped the instant the last connection goes.
///
/// This is the single piece of shared mutable state in the hub; DashMap's
/// sharded locking covers register, unregister, and the membership
/// snapshot taken by broadcast.
#[derive(Clone, Default)]
pub struct SessionRegistry {
    inner: Arc<DashMap<i64, Vec<ConnectionSender>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection for a user, creating the entry if absent.
    pub fn register(&self, user_id: i64, sender: ConnectionSender) {
        self.inner.entry(user_id).or_default().push(sender);

        let count = self.connection_count(user_id);
        tracing::debug!(user_id, connections = count, "Connection registered");
    }

    /// Remove a connection. Idempotent — removing an unknown connection is
    /// a no-op. Drops the user key when the last connection goes.
    pub fn unregister(&self, user_id: i64, sender: &ConnectionSender) {
        if let Some(mut entry) = self.inner.get_mut(&user_id) {
            entry.retain(|s| !s.same_channel(sender));
            let empty = entry.is_empty();
            drop(entry);
            if empty {
                // remove_if re-checks under the shard lock so a concurrent
                // register is not clobbered
                self.inner.remove_if(&user_id, |_, conns| conns.is_empty());
            }
        }
        tracing::debug!(user_id, "Connection unregistered");
    }

    /// Best-effort push to every connection of a user. A failed push means
    /// the connection is dead: it is pruned in place and no error reaches
    /// the caller. Unknown user is a silent no-op.
    pub fn send_to_user(&self, user_id: i64, msg: &Message) {
        if let Some(mut entry) = self.inner.get_mut(&user_id) {
            entry.retain(|sender| sender.send(msg.clone()).is_ok());
            let empty = entry.is_empty();
            drop(entry);
            if empty {
                self.inner.remove_if(&user_id, |_, conns| conns.is_empty());
            }
        }
    }

    /// Deliver to every user registered at call start. The target set is
    /// snapshotted first; connections joining afterwards may miss this
    /// frame, departing ones fail their send silently.
    pub fn broadcast(&self, msg: &Message) {
        let targets: Vec<i64> = self.inner.iter().map(|entry| *entry.key()).collect();
        for user_id in targets {
            self.send_to_user(user_id, msg);
        }
    }

    /// Force-close all of a user's connections (ban enforcement). Sends a
    /// Close frame with the given code; teardown then runs through each
    /// connection's own actor exit path.
    pub fn force_close_user(&self, user_id: i64, close_code: u16, reason: &str) {
        if let Some(entry) = self.inner.get(&user_id) {
            let close_frame = CloseFrame {
                code: close_code,
                reason: reason.to_string().into(),
            };
            for sender in entry.iter() {
                let _ = sender.send(Message::Close(Some(close_frame.clone())));
            }
        }
    }

    /// Number of live connections for a user.
    pub fn connection_count(&self, user_id: i64) -> usize {
        self.inner.get(&user_id).map(|v| v.len()).unwrap_or(0)
    }

    /// Whether a user has at least one live connection.
    pub fn is_online(&self, user_id: i64) -> bool {
        self.inner.contains_key(&user_id)
    }
}
