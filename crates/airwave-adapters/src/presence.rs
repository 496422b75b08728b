//! Presence: the `users` list of who is in the room.

use airwave_session::SessionManager;
use serde::Deserialize;
use tokio::sync::watch;
use tracing::debug;

use crate::attachment::Attachment;

/// Envelope type for the presence list.
pub const USERS: &str = "users";

#[derive(Deserialize)]
struct UsersPayload {
    users: Vec<String>,
}

/// Tracks the latest user list.
pub struct PresenceAdapter {
    users: watch::Receiver<Vec<String>>,
    _attachment: Attachment,
}

impl PresenceAdapter {
    /// Start tracking on `session`.
    pub fn new(session: &SessionManager) -> Self {
        let (tx, users) = watch::channel(Vec::new());
        let attachment = Attachment::new(session, move |envelope| {
            if !envelope.is(USERS) {
                return;
            }
            match envelope.decode::<UsersPayload>() {
                Ok(payload) => {
                    let _ = tx.send_replace(payload.users);
                }
                Err(e) => debug!(envelope_type = USERS, error = %e, "ignoring users frame with unexpected shape"),
            }
        });
        Self {
            users,
            _attachment: attachment,
        }
    }

    /// Current user list.
    pub fn users(&self) -> Vec<String> {
        self.users.borrow().clone()
    }

    /// Watch list changes.
    pub fn changes(&self) -> watch::Receiver<Vec<String>> {
        self.users.clone()
    }
}
