//! WebSocket transport over `tokio-tungstenite`.
//!
//! Each [`Link`] owns one spawned task that dials the endpoint, then pumps
//! outbound frames from an mpsc queue and inbound frames into the
//! [`EventSink`] until either side closes.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use airwave_core::TransportError;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use super::{EventSink, Link, Transport, TransportEvent};

/// Default outbound queue depth per link.
pub const DEFAULT_OUTBOUND_CAPACITY: usize = 256;

/// Opens `ws://` / `wss://` links. Must be used inside a Tokio runtime.
#[derive(Clone, Debug)]
pub struct WebSocketTransport {
    outbound_capacity: usize,
}

impl Default for WebSocketTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl WebSocketTransport {
    /// Transport with the default outbound queue depth.
    pub fn new() -> Self {
        Self {
            outbound_capacity: DEFAULT_OUTBOUND_CAPACITY,
        }
    }

    /// Override the outbound queue depth (minimum 1).
    #[must_use]
    pub fn with_outbound_capacity(mut self, capacity: usize) -> Self {
        self.outbound_capacity = capacity.max(1);
        self
    }
}

impl Transport for WebSocketTransport {
    fn open(&self, url: &str, events: EventSink) -> Box<dyn Link> {
        let (tx, rx) = mpsc::channel(self.outbound_capacity);
        let cancel = CancellationToken::new();
        let open = Arc::new(AtomicBool::new(false));

        drop(tokio::spawn(run_link(
            url.to_owned(),
            rx,
            events,
            cancel.clone(),
            open.clone(),
        )));

        Box::new(WebSocketLink { tx, cancel, open })
    }
}

struct WebSocketLink {
    tx: mpsc::Sender<String>,
    cancel: CancellationToken,
    open: Arc<AtomicBool>,
}

impl Link for WebSocketLink {
    fn send(&self, text: String) -> Result<(), TransportError> {
        if !self.is_open() {
            return Err(TransportError::NotOpen);
        }
        self.tx.try_send(text).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => {
                TransportError::Protocol("outbound queue full".into())
            }
            mpsc::error::TrySendError::Closed(_) => TransportError::NotOpen,
        })
    }

    fn close(&self) {
        self.open.store(false, Ordering::Release);
        self.cancel.cancel();
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire) && !self.cancel.is_cancelled()
    }
}

impl Drop for WebSocketLink {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn run_link(
    url: String,
    mut outbound: mpsc::Receiver<String>,
    events: EventSink,
    cancel: CancellationToken,
    open: Arc<AtomicBool>,
) {
    let connected = tokio::select! {
        () = cancel.cancelled() => {
            debug!(%url, "link closed before connect finished");
            return;
        }
        result = connect_async(url.as_str()) => result,
    };

    let ws = match connected {
        Ok((ws, _response)) => ws,
        Err(e) => {
            warn!(%url, error = %e, "websocket connect failed");
            events.emit(TransportEvent::Error(TransportError::Connect {
                url,
                reason: e.to_string(),
            }));
            return;
        }
    };

    open.store(true, Ordering::Release);
    events.emit(TransportEvent::Opened);

    let (mut ws_tx, mut ws_rx) = ws.split();

    loop {
        tokio::select! {
            () = cancel.cancelled() => {
                let _ = ws_tx.send(Message::Close(None)).await;
                let _ = ws_tx.close().await;
                debug!(%url, "link closed locally");
                break;
            }
            frame = outbound.recv() => {
                let Some(text) = frame else { break };
                if let Err(e) = ws_tx.send(Message::Text(text.into())).await {
                    open.store(false, Ordering::Release);
                    events.emit(TransportEvent::Error(TransportError::Protocol(e.to_string())));
                    break;
                }
            }
            msg = ws_rx.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    trace!(len = text.len(), "inbound frame");
                    events.emit(TransportEvent::Message(text.as_str().to_owned()));
                }
                Some(Ok(Message::Close(frame))) => {
                    open.store(false, Ordering::Release);
                    let reason = frame.map(|f| f.reason.as_str().to_owned()).unwrap_or_default();
                    events.emit(TransportEvent::Closed { reason });
                    break;
                }
                // Ping/pong are answered by tungstenite; binary frames are not part of the protocol.
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    open.store(false, Ordering::Release);
                    events.emit(TransportEvent::Error(TransportError::Protocol(e.to_string())));
                    break;
                }
                None => {
                    open.store(false, Ordering::Release);
                    events.emit(TransportEvent::Closed { reason: "stream ended".into() });
                    break;
                }
            },
        }
    }

    open.store(false, Ordering::Release);
}
