//! In-memory transport for driving a session from tests.
//!
//! Every `open` creates a [`FakeLinkHandle`] that the test uses to play the
//! server: report the link open, push inbound frames, close it, or fail it.
//! Frames the session sends are recorded per link.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use airwave_core::{Envelope, TransportError};
use parking_lot::Mutex;

use crate::transport::{EventSink, Link, Transport, TransportEvent};

/// Transport whose links are controlled by the test.
#[derive(Clone, Default)]
pub struct FakeTransport {
    links: Arc<Mutex<Vec<FakeLinkHandle>>>,
}

impl FakeTransport {
    /// Empty transport.
    pub fn new() -> Self {
        Self::default()
    }

    /// How many links the session has opened.
    pub fn open_count(&self) -> usize {
        self.links.lock().len()
    }

    /// Link by open order.
    pub fn link(&self, index: usize) -> Option<FakeLinkHandle> {
        self.links.lock().get(index).cloned()
    }

    /// Most recently opened link.
    pub fn last_link(&self) -> Option<FakeLinkHandle> {
        self.links.lock().last().cloned()
    }

    /// Every link opened so far.
    pub fn links(&self) -> Vec<FakeLinkHandle> {
        self.links.lock().clone()
    }
}

impl Transport for FakeTransport {
    fn open(&self, url: &str, events: EventSink) -> Box<dyn Link> {
        let shared = Arc::new(FakeLinkShared::default());
        self.links.lock().push(FakeLinkHandle {
            url: url.to_owned(),
            events,
            shared: shared.clone(),
        });
        Box::new(FakeLink { shared })
    }
}

#[derive(Default)]
struct FakeLinkShared {
    sent: Mutex<Vec<String>>,
    open: AtomicBool,
    closed: AtomicBool,
}

struct FakeLink {
    shared: Arc<FakeLinkShared>,
}

impl Link for FakeLink {
    fn send(&self, text: String) -> Result<(), TransportError> {
        if !self.is_open() {
            return Err(TransportError::NotOpen);
        }
        self.shared.sent.lock().push(text);
        Ok(())
    }

    fn close(&self) {
        self.shared.closed.store(true, Ordering::SeqCst);
    }

    fn is_open(&self) -> bool {
        self.shared.open.load(Ordering::SeqCst) && !self.shared.closed.load(Ordering::SeqCst)
    }
}

/// Server-side control of one fake link.
#[derive(Clone)]
pub struct FakeLinkHandle {
    url: String,
    events: EventSink,
    shared: Arc<FakeLinkShared>,
}

impl FakeLinkHandle {
    /// URL the session dialed.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Report the link open.
    pub fn open(&self) {
        self.shared.open.store(true, Ordering::SeqCst);
        self.events.emit(TransportEvent::Opened);
    }

    /// Push a raw inbound frame.
    pub fn message(&self, text: &str) {
        self.events.emit(TransportEvent::Message(text.to_owned()));
    }

    /// Push an inbound envelope.
    pub fn envelope(&self, envelope: &Envelope) {
        if let Ok(text) = envelope.to_json() {
            self.message(&text);
        }
    }

    /// Close from the server side.
    pub fn close_remote(&self, reason: &str) {
        self.shared.open.store(false, Ordering::SeqCst);
        self.events.emit(TransportEvent::Closed {
            reason: reason.to_owned(),
        });
    }

    /// Fail the link (connect refused, network error).
    pub fn fail(&self, reason: &str) {
        self.shared.open.store(false, Ordering::SeqCst);
        self.events
            .emit(TransportEvent::Error(TransportError::Protocol(reason.to_owned())));
    }

    /// Whether the session closed this link.
    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::SeqCst)
    }

    /// Raw frames the session sent.
    pub fn sent(&self) -> Vec<String> {
        self.shared.sent.lock().clone()
    }

    /// Sent frames that parse as envelopes.
    pub fn sent_envelopes(&self) -> Vec<Envelope> {
        self.sent()
            .iter()
            .filter_map(|text| Envelope::parse(text).ok())
            .collect()
    }
}

impl std::fmt::Debug for FakeLinkHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FakeLinkHandle")
            .field("url", &self.url)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}
