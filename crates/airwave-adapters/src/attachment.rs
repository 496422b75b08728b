//! Per-connection listener bookkeeping shared by every adapter.

use std::sync::Arc;

use airwave_core::Envelope;
use airwave_session::{MessageListener, SessionManager, Subscription};
use parking_lot::Mutex;

/// One session subscription plus the message listener it attached to the
/// most recent connection.
///
/// On every (re)connect the listener is attached to the new connection and
/// the previous one is detached from the connection it was attached to.
/// Dropping the attachment unsubscribes and detaches.
pub(crate) struct Attachment {
    subscription: Subscription,
    listener: Arc<Mutex<Option<MessageListener>>>,
}

impl Attachment {
    pub(crate) fn new<F>(session: &SessionManager, on_envelope: F) -> Self
    where
        F: Fn(&Envelope) + Send + Sync + 'static,
    {
        let on_envelope = Arc::new(on_envelope);
        let listener: Arc<Mutex<Option<MessageListener>>> = Arc::default();
        let slot = listener.clone();
        let subscription = session.subscribe(move |conn| {
            let handler = on_envelope.clone();
            let attached = conn.on_message(move |envelope| handler(envelope));
            let previous = slot.lock().replace(attached);
            drop(previous);
        });
        Self {
            subscription,
            listener,
        }
    }
}

impl Drop for Attachment {
    fn drop(&mut self) {
        let _ = self.subscription.unsubscribe();
        let listener = self.listener.lock().take();
        drop(listener);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;
    use airwave_session::SessionConfig;
    use airwave_session::testing::FakeTransport;

    fn session() -> (SessionManager, FakeTransport) {
        let transport = FakeTransport::new();
        let session = SessionManager::new(SessionConfig::new("ws://test/ws"), Arc::new(transport.clone()));
        (session, transport)
    }

    #[tokio::test(start_paused = true)]
    async fn reattaches_to_each_new_connection() {
        let (session, transport) = session();
        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();
        let attachment = Attachment::new(&session, move |_| {
            let _ = counter.fetch_add(1, Ordering::SeqCst);
        });
        assert!(attachment.listener.lock().is_none());

        let first = transport.link(0).unwrap();
        first.open();
        let first_conn = session.active_connection().unwrap();
        assert_eq!(first_conn.listener_count(), 1);
        first.message(r#"{"type":"x"}"#);

        first.close_remote("");
        tokio::time::sleep(Duration::from_millis(1001)).await;
        transport.link(1).unwrap().open();

        assert_eq!(first_conn.listener_count(), 0);
        transport.link(1).unwrap().message(r#"{"type":"x"}"#);
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn drop_detaches_and_unsubscribes() {
        let (session, transport) = session();
        let attachment = Attachment::new(&session, |_| {});
        transport.last_link().unwrap().open();
        let conn = session.active_connection().unwrap();
        assert_eq!(conn.listener_count(), 1);
        assert_eq!(session.subscriber_count(), 1);

        drop(attachment);
        assert_eq!(conn.listener_count(), 0);
        assert_eq!(session.subscriber_count(), 0);
    }
}
