//! Handle to one live link, shared with every subscriber.

use std::fmt;
use std::sync::{Arc, Weak};

use airwave_core::{ConnectionId, Envelope, SessionError};
use tracing::{debug, trace};

use crate::registry::{SubscriberId, SubscriberRegistry};
use crate::transport::Link;

/// Cheaply clonable handle to the session's current link.
///
/// Subscribers receive it on every (re)connect. Two handles compare equal
/// when they refer to the same link.
#[derive(Clone)]
pub struct Connection {
    inner: Arc<ConnectionInner>,
}

struct ConnectionInner {
    id: ConnectionId,
    url: String,
    link: Box<dyn Link>,
    listeners: SubscriberRegistry<Envelope>,
}

impl Connection {
    pub(crate) fn new(url: &str, link: Box<dyn Link>) -> Self {
        Self {
            inner: Arc::new(ConnectionInner {
                id: ConnectionId::new(),
                url: url.to_owned(),
                link,
                listeners: SubscriberRegistry::new(),
            }),
        }
    }

    /// Unique ID of this link.
    pub fn id(&self) -> &ConnectionId {
        &self.inner.id
    }

    /// Endpoint this link was opened against.
    pub fn url(&self) -> &str {
        &self.inner.url
    }

    /// Whether the link can currently carry frames.
    pub fn is_open(&self) -> bool {
        self.inner.link.is_open()
    }

    /// Encode and send one envelope.
    pub fn send(&self, envelope: &Envelope) -> Result<(), SessionError> {
        let text = envelope.to_json()?;
        self.send_text(text)
    }

    /// Send a pre-encoded frame.
    pub fn send_text(&self, text: String) -> Result<(), SessionError> {
        trace!(connection_id = %self.inner.id, len = text.len(), "outbound frame");
        self.inner.link.send(text).map_err(SessionError::from)
    }

    /// Receive every inbound envelope on this link until the returned
    /// listener is dropped or detached.
    pub fn on_message<F>(&self, callback: F) -> MessageListener
    where
        F: Fn(&Envelope) + Send + Sync + 'static,
    {
        let id = self.inner.listeners.add(callback);
        MessageListener {
            id,
            connection: Arc::downgrade(&self.inner),
        }
    }

    /// Number of attached message listeners.
    pub fn listener_count(&self) -> usize {
        self.inner.listeners.len()
    }

    pub(crate) fn dispatch(&self, envelope: &Envelope) -> usize {
        self.inner.listeners.notify_all(envelope)
    }

    pub(crate) fn close_link(&self) {
        debug!(connection_id = %self.inner.id, "closing link");
        self.inner.link.close();
    }
}

impl PartialEq for Connection {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Connection {}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.inner.id)
            .field("url", &self.inner.url)
            .field("open", &self.is_open())
            .finish_non_exhaustive()
    }
}

/// Registration of a message listener on one [`Connection`].
///
/// Dropping it detaches the listener. Detaching twice is harmless.
#[must_use = "dropping the listener detaches it immediately"]
pub struct MessageListener {
    id: SubscriberId,
    connection: Weak<ConnectionInner>,
}

impl MessageListener {
    /// Registration ID.
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Detach now. Returns `false` if already detached or the link is gone.
    pub fn detach(&self) -> bool {
        self.connection
            .upgrade()
            .is_some_and(|inner| inner.listeners.remove(self.id))
    }
}

impl Drop for MessageListener {
    fn drop(&mut self) {
        let _ = self.detach();
    }
}

impl fmt::Debug for MessageListener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageListener").field("id", &self.id).finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use super::*;
    use airwave_core::TransportError;
    use assert_matches::assert_matches;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct RecordingLink {
        sent: Arc<Mutex<Vec<String>>>,
        closed: AtomicBool,
    }

    impl Link for RecordingLink {
        fn send(&self, text: String) -> Result<(), TransportError> {
            if self.closed.load(Ordering::SeqCst) {
                return Err(TransportError::NotOpen);
            }
            self.sent.lock().push(text);
            Ok(())
        }

        fn close(&self) {
            self.closed.store(true, Ordering::SeqCst);
        }

        fn is_open(&self) -> bool {
            !self.closed.load(Ordering::SeqCst)
        }
    }

    fn connection() -> (Connection, Arc<Mutex<Vec<String>>>) {
        let link = RecordingLink::default();
        let sent = link.sent.clone();
        (Connection::new("ws://test/ws", Box::new(link)), sent)
    }

    #[test]
    fn send_encodes_envelope() {
        let (conn, sent) = connection();
        conn.send(&Envelope::join("nik")).unwrap();
        assert_eq!(*sent.lock(), vec![r#"{"type":"join","nickname":"nik"}"#.to_string()]);
    }

    #[test]
    fn send_after_close_fails() {
        let (conn, _sent) = connection();
        conn.close_link();
        assert!(!conn.is_open());
        assert_matches!(
            conn.send(&Envelope::new("chat")),
            Err(SessionError::Transport(TransportError::NotOpen))
        );
    }

    #[test]
    fn listeners_receive_dispatch_until_dropped() {
        let (conn, _sent) = connection();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let listener = conn.on_message(move |env| sink.lock().push(env.kind.clone()));

        assert_eq!(conn.dispatch(&Envelope::new("chat")), 1);
        drop(listener);
        assert_eq!(conn.dispatch(&Envelope::new("users")), 0);
        assert_eq!(*seen.lock(), vec!["chat".to_string()]);
        assert_eq!(conn.listener_count(), 0);
    }

    #[test]
    fn detach_is_idempotent() {
        let (conn, _sent) = connection();
        let listener = conn.on_message(|_| {});
        assert!(listener.detach());
        assert!(!listener.detach());
    }

    #[test]
    fn listener_outliving_connection_is_harmless() {
        let (conn, _sent) = connection();
        let listener = conn.on_message(|_| {});
        drop(conn);
        assert!(!listener.detach());
    }

    #[test]
    fn equality_is_identity() {
        let (a, _) = connection();
        let (b, _) = connection();
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
        assert_ne!(a.id(), b.id());
    }
}
