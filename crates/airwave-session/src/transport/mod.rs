//! Transport seam between the session and the network.
//!
//! A [`Transport`] opens one [`Link`] per connection attempt and reports its
//! lifecycle through an [`EventSink`]. The session never talks to sockets
//! directly, which lets tests drive it with an in-memory transport.

pub mod websocket;

use std::fmt;
use std::sync::Arc;

use airwave_core::TransportError;

pub use websocket::WebSocketTransport;

/// Lifecycle and inbound traffic of a single link.
#[derive(Debug)]
pub enum TransportEvent {
    /// The link is open and can carry frames.
    Opened,
    /// One inbound text frame.
    Message(String),
    /// The peer or the network closed the link.
    Closed {
        /// Close reason, possibly empty.
        reason: String,
    },
    /// The link failed. No further events follow.
    Error(TransportError),
}

/// Callback half handed to [`Transport::open`].
#[derive(Clone)]
pub struct EventSink {
    handler: Arc<dyn Fn(TransportEvent) + Send + Sync>,
}

impl EventSink {
    /// Wrap a handler.
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(TransportEvent) + Send + Sync + 'static,
    {
        Self {
            handler: Arc::new(handler),
        }
    }

    /// Report an event.
    pub fn emit(&self, event: TransportEvent) {
        (self.handler)(event);
    }
}

impl fmt::Debug for EventSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventSink").finish_non_exhaustive()
    }
}

/// Sending half of an open (or opening) link.
pub trait Link: Send + Sync {
    /// Queue a text frame. Must not block and must not emit events
    /// synchronously.
    fn send(&self, text: String) -> Result<(), TransportError>;

    /// Close the link. Idempotent. Must not emit events synchronously.
    fn close(&self);

    /// Whether frames can currently be sent.
    fn is_open(&self) -> bool;
}

/// Factory for links.
///
/// `open` must return without emitting any event; every [`TransportEvent`]
/// is delivered later, from another task or from test code.
pub trait Transport: Send + Sync {
    /// Start connecting to `url`, reporting progress to `events`.
    fn open(&self, url: &str, events: EventSink) -> Box<dyn Link>;
}
