//! Listener count: the numeric `listeners` field, on any inbound envelope.

use airwave_session::SessionManager;
use serde_json::Value;
use tokio::sync::watch;

use crate::attachment::Attachment;

/// Payload key carrying the live listener count.
pub const LISTENERS: &str = "listeners";

/// Tracks the latest reported listener count.
pub struct ListenerCountAdapter {
    count: watch::Receiver<Option<u64>>,
    _attachment: Attachment,
}

impl ListenerCountAdapter {
    /// Start tracking on `session`.
    pub fn new(session: &SessionManager) -> Self {
        let (tx, count) = watch::channel(None);
        let attachment = Attachment::new(session, move |envelope| {
            let Some(n) = envelope.get(LISTENERS).and_then(Value::as_u64) else {
                return;
            };
            let _ = tx.send_if_modified(|current| {
                if *current == Some(n) {
                    false
                } else {
                    *current = Some(n);
                    true
                }
            });
        });
        Self {
            count,
            _attachment: attachment,
        }
    }

    /// Last count seen, if any.
    pub fn current(&self) -> Option<u64> {
        *self.count.borrow()
    }

    /// Watch count changes.
    pub fn changes(&self) -> watch::Receiver<Option<u64>> {
        self.count.clone()
    }
}
