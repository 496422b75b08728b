//! The session manager: one shared link, many subscribers.
//!
//! Lifecycle:
//!
//! ```text
//! Disconnected ──subscribe/connect──▶ Connecting ──Opened──▶ Connected
//!      ▲                                  │                      │
//!      └──── reconnect timer ◀── Closed/Error ◀──────────────────┘
//! ```
//!
//! Rules the implementation holds:
//! - at most one link is live and at most one reconnect timer is armed;
//! - every subscriber is handed each new connection exactly once, and a
//!   subscriber that joins while connected is handed the current one at once;
//! - a non-empty identity is announced before subscribers hear of the link;
//! - after `max_attempts` consecutive failures the session stops retrying
//!   until [`SessionManager::connect`] is called;
//! - after [`SessionManager::close`] nothing reconnects on its own.
//!
//! The state lock is never held while user callbacks run.

use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Duration;

use airwave_core::{Envelope, ReconnectConfig, ReconnectPolicy, ReconnectState, SessionError, SessionId};
use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::{debug, info, trace, warn};

use crate::connection::Connection;
use crate::registry::{Callback, SubscriberId, SubscriberRegistry, call_guarded};
use crate::state::{ConnectionState, SessionStatus};
use crate::timer::ReconnectTimer;
use crate::transport::{EventSink, Transport, TransportEvent};

/// Endpoint plus reconnect tuning.
#[derive(Clone, Debug, PartialEq)]
pub struct SessionConfig {
    /// `ws://` or `wss://` endpoint.
    pub url: String,
    /// Backoff and attempt limit.
    pub reconnect: ReconnectConfig,
}

impl SessionConfig {
    /// Config with default reconnect tuning.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            reconnect: ReconnectConfig::default(),
        }
    }

    /// Replace the reconnect tuning.
    #[must_use]
    pub fn with_reconnect(mut self, reconnect: ReconnectConfig) -> Self {
        self.reconnect = reconnect;
        self
    }
}

/// Shared handle to the session. Clones refer to the same session; the link
/// is closed when the last clone is dropped.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<Inner>,
}

struct Inner {
    id: SessionId,
    url: String,
    policy: ReconnectPolicy,
    transport: Arc<dyn Transport>,
    state: Mutex<SessionState>,
    subscribers: SubscriberRegistry<Connection>,
    status_tx: watch::Sender<SessionStatus>,
}

struct SessionState {
    phase: ConnectionState,
    /// Bumped for every link opened (and on close) so events from older
    /// links can be recognised and dropped.
    generation: u64,
    link: Option<Connection>,
    reconnect: ReconnectState,
    timer: ReconnectTimer,
    gave_up: bool,
    closed: bool,
    identity: Option<String>,
}

impl SessionManager {
    /// New, idle session. Nothing is dialed until the first subscriber or an
    /// explicit [`connect`](Self::connect).
    pub fn new(config: SessionConfig, transport: Arc<dyn Transport>) -> Self {
        let policy = ReconnectPolicy::new(config.reconnect);
        let (status_tx, _) = watch::channel(SessionStatus::Disconnected);
        let id = SessionId::new();
        debug!(session_id = %id, url = %config.url, "session created");
        Self {
            inner: Arc::new(Inner {
                id,
                url: config.url,
                state: Mutex::new(SessionState {
                    phase: ConnectionState::Disconnected,
                    generation: 0,
                    link: None,
                    reconnect: ReconnectState::new(&policy),
                    timer: ReconnectTimer::default(),
                    gave_up: false,
                    closed: false,
                    identity: None,
                }),
                policy,
                transport,
                subscribers: SubscriberRegistry::new(),
                status_tx,
            }),
        }
    }

    /// Session ID (for logs).
    pub fn id(&self) -> &SessionId {
        &self.inner.id
    }

    /// Endpoint.
    pub fn url(&self) -> &str {
        &self.inner.url
    }

    /// Reconnect policy in effect.
    pub fn policy(&self) -> &ReconnectPolicy {
        &self.inner.policy
    }

    // ── Identity ────────────────────────────────────────────────────

    /// Set the nickname announced on every (re)connect. Blank clears it.
    ///
    /// Does not announce on the current link; see [`announce`](Self::announce).
    pub fn set_identity(&self, nickname: Option<&str>) {
        let nickname = nickname.map(str::trim).filter(|n| !n.is_empty()).map(ToOwned::to_owned);
        debug!(session_id = %self.inner.id, nickname = ?nickname, "identity updated");
        self.inner.state.lock().identity = nickname;
    }

    /// Current nickname.
    pub fn identity(&self) -> Option<String> {
        self.inner.state.lock().identity.clone()
    }

    /// Send `join` for the current identity on the live link.
    pub fn announce(&self) -> Result<(), SessionError> {
        let (conn, identity) = {
            let state = self.inner.state.lock();
            (state.connected(), state.identity.clone())
        };
        let Some(nickname) = identity else {
            return Err(SessionError::InvalidInput("no identity set".into()));
        };
        let conn = conn.ok_or(SessionError::NotConnected)?;
        conn.send(&Envelope::join(&nickname))
    }

    // ── Subscribers ─────────────────────────────────────────────────

    /// Register for every connection the session establishes.
    ///
    /// If a connection is live, `callback` runs once immediately with it.
    /// If the session is idle, this triggers a connect.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&Connection) + Send + Sync + 'static,
    {
        let callback: Callback<Connection> = Arc::new(callback);
        let (id, live) = {
            let state = self.inner.state.lock();
            let id = self.inner.subscribers.add_shared(callback.clone());
            (id, state.connected())
        };
        debug!(session_id = %self.inner.id, subscriber = %id, live = live.is_some(), "subscriber added");

        if let Some(conn) = live {
            let _ = call_guarded(id, &callback, &conn);
        }
        self.ensure_connected();

        Subscription {
            id,
            session: Arc::downgrade(&self.inner),
        }
    }

    /// Number of registered subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.len()
    }

    // ── Queries ─────────────────────────────────────────────────────

    /// The live connection, if the session is connected.
    pub fn active_connection(&self) -> Option<Connection> {
        self.inner.state.lock().connected()
    }

    /// Lifecycle phase.
    pub fn state(&self) -> ConnectionState {
        self.inner.state.lock().phase
    }

    /// Coarse status.
    pub fn status(&self) -> SessionStatus {
        *self.inner.status_tx.borrow()
    }

    /// Watch status transitions.
    pub fn status_changes(&self) -> watch::Receiver<SessionStatus> {
        self.inner.status_tx.subscribe()
    }

    /// Consecutive failed attempts since the last successful open.
    pub fn reconnect_attempts(&self) -> u32 {
        self.inner.state.lock().reconnect.attempts()
    }

    /// Time until the pending reconnect, if one is scheduled.
    pub fn reconnect_pending(&self) -> Option<Duration> {
        self.inner.state.lock().timer.remaining()
    }

    // ── Commands ────────────────────────────────────────────────────

    /// Send one envelope on the live link.
    ///
    /// Fails with [`SessionError::NotConnected`] when offline; in that case
    /// a connect is started unless the session is closed, has given up or is
    /// already waiting on a reconnect timer.
    pub fn send(&self, envelope: &Envelope) -> Result<(), SessionError> {
        if let Some(conn) = self.active_connection() {
            return conn.send(envelope);
        }
        self.ensure_connected();
        Err(SessionError::NotConnected)
    }

    /// Connect now.
    ///
    /// Resets the attempt counter and clears a previous give-up or close.
    /// No-op if a link is already connecting or connected; otherwise any
    /// pending reconnect timer is cancelled and a link is opened at once.
    pub fn connect(&self) {
        let mut state = self.inner.state.lock();
        state.closed = false;
        state.gave_up = false;
        state.reconnect.reset(&self.inner.policy);
        if matches!(state.phase, ConnectionState::Connecting | ConnectionState::Connected) {
            debug_assert!(!state.timer.is_armed(), "reconnect timer armed while a link is live");
            self.inner.publish(&state);
            return;
        }
        if state.timer.cancel() {
            debug!(session_id = %self.inner.id, "pending reconnect cancelled by connect()");
        }
        self.open_locked(&mut state);
    }

    /// Close the link and stop reconnecting until [`connect`](Self::connect).
    pub fn close(&self) {
        let (conn, generation) = {
            let mut state = self.inner.state.lock();
            state.closed = true;
            let _ = state.timer.cancel();
            state.generation += 1;
            let conn = state.link.take();
            state.phase = if conn.is_some() {
                ConnectionState::Closing
            } else {
                ConnectionState::Disconnected
            };
            self.inner.publish(&state);
            (conn, state.generation)
        };

        let Some(conn) = conn else { return };
        conn.close_link();
        info!(session_id = %self.inner.id, connection_id = %conn.id(), "session closed");

        let mut state = self.inner.state.lock();
        if state.generation == generation && state.phase == ConnectionState::Closing {
            state.phase = ConnectionState::Disconnected;
            self.inner.publish(&state);
        }
    }

    // ── Internals ───────────────────────────────────────────────────

    fn ensure_connected(&self) {
        let mut state = self.inner.state.lock();
        if state.phase == ConnectionState::Disconnected
            && !state.timer.is_armed()
            && !state.gave_up
            && !state.closed
        {
            self.open_locked(&mut state);
        }
    }

    /// Open a new link. `Transport::open` never emits synchronously, so
    /// calling it under the lock cannot re-enter.
    fn open_locked(&self, state: &mut SessionState) {
        state.generation += 1;
        let generation = state.generation;
        let sink = self.event_sink(generation);
        let link = self.inner.transport.open(&self.inner.url, sink);
        let conn = Connection::new(&self.inner.url, link);
        info!(
            session_id = %self.inner.id,
            connection_id = %conn.id(),
            attempt = state.reconnect.attempts(),
            url = %self.inner.url,
            "connecting"
        );
        state.link = Some(conn);
        state.phase = ConnectionState::Connecting;
        self.inner.publish(state);
    }

    fn event_sink(&self, generation: u64) -> EventSink {
        let weak = Arc::downgrade(&self.inner);
        EventSink::new(move |event| {
            if let Some(inner) = weak.upgrade() {
                SessionManager { inner }.handle_event(generation, event);
            }
        })
    }

    fn handle_event(&self, generation: u64, event: TransportEvent) {
        match event {
            TransportEvent::Opened => self.on_open(generation),
            TransportEvent::Message(text) => self.on_message(generation, &text),
            TransportEvent::Closed { reason } => self.on_link_lost(generation, &reason),
            TransportEvent::Error(err) => self.on_link_lost(generation, &err.to_string()),
        }
    }

    fn on_open(&self, generation: u64) {
        let (conn, snapshot) = {
            let mut state = self.inner.state.lock();
            if state.generation != generation || state.phase != ConnectionState::Connecting {
                trace!(session_id = %self.inner.id, generation, "ignoring open from stale link");
                return;
            }
            let Some(conn) = state.link.clone() else { return };
            info!(session_id = %self.inner.id, connection_id = %conn.id(), "connected");

            // The join is queued before the link becomes visible as connected,
            // so a concurrent subscribe cannot see the link ahead of it.
            // `Link::send` neither blocks nor emits.
            if let Some(nickname) = &state.identity {
                if let Err(e) = conn.send(&Envelope::join(nickname)) {
                    warn!(connection_id = %conn.id(), error = %e, "failed to announce identity");
                }
            }

            state.phase = ConnectionState::Connected;
            state.reconnect.reset(&self.inner.policy);
            state.gave_up = false;
            self.inner.publish(&state);
            (conn, self.inner.subscribers.snapshot())
        };

        let delivered = self.inner.subscribers.notify(&snapshot, &conn);
        debug!(connection_id = %conn.id(), subscribers = delivered, "subscribers notified");
    }

    fn on_message(&self, generation: u64, text: &str) {
        let conn = {
            let state = self.inner.state.lock();
            if state.generation != generation {
                return;
            }
            match state.connected() {
                Some(conn) => conn,
                None => return,
            }
        };
        match Envelope::parse(text) {
            Ok(envelope) => {
                trace!(connection_id = %conn.id(), envelope_type = %envelope.kind, "inbound envelope");
                let _ = conn.dispatch(&envelope);
            }
            Err(e) => {
                warn!(connection_id = %conn.id(), error = %e, "dropping malformed frame");
            }
        }
    }

    fn on_link_lost(&self, generation: u64, reason: &str) {
        let conn = {
            let mut state = self.inner.state.lock();
            if state.generation != generation {
                trace!(session_id = %self.inner.id, generation, "ignoring close from stale link");
                return;
            }
            let Some(conn) = state.link.take() else { return };
            state.phase = ConnectionState::Disconnected;

            if !state.closed {
                self.schedule_reconnect(&mut state, &conn, reason);
            }
            self.inner.publish(&state);
            conn
        };
        conn.close_link();
    }

    fn schedule_reconnect(&self, state: &mut SessionState, conn: &Connection, reason: &str) {
        let random = if self.inner.policy.config().jitter_factor > 0.0 {
            rand::random::<f64>()
        } else {
            0.0
        };
        match state.reconnect.advance(&self.inner.policy, random) {
            Some(delay) => {
                let weak = Arc::downgrade(&self.inner);
                let _ = state.timer.arm(delay, move |token| on_timer(&weak, token));
                #[allow(clippy::cast_possible_truncation)]
                let delay_ms = delay.as_millis() as u64;
                info!(
                    session_id = %self.inner.id,
                    connection_id = %conn.id(),
                    attempt = state.reconnect.attempts(),
                    delay_ms,
                    reason,
                    "connection lost, reconnect scheduled"
                );
            }
            None => {
                state.gave_up = true;
                warn!(
                    session_id = %self.inner.id,
                    attempts = state.reconnect.attempts(),
                    reason,
                    "reconnect attempts exhausted, giving up until connect()"
                );
            }
        }
    }

    fn on_timer(&self, token: u64) {
        let mut state = self.inner.state.lock();
        if !state.timer.fire(token) {
            return;
        }
        if state.closed || state.phase != ConnectionState::Disconnected || state.link.is_some() {
            return;
        }
        debug!(session_id = %self.inner.id, attempt = state.reconnect.attempts(), "reconnect timer fired");
        self.open_locked(&mut state);
    }
}

fn on_timer(weak: &Weak<Inner>, token: u64) {
    if let Some(inner) = weak.upgrade() {
        SessionManager { inner }.on_timer(token);
    }
}

impl SessionState {
    fn connected(&self) -> Option<Connection> {
        if self.phase == ConnectionState::Connected {
            self.link.clone()
        } else {
            None
        }
    }
}

impl Inner {
    fn publish(&self, state: &SessionState) {
        let status = state.phase.status(state.gave_up);
        let _ = self.status_tx.send_if_modified(|current| {
            if *current == status {
                false
            } else {
                *current = status;
                true
            }
        });
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        let state = self.state.get_mut();
        let _ = state.timer.cancel();
        if let Some(conn) = state.link.take() {
            conn.close_link();
        }
    }
}

impl fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("SessionManager")
            .field("id", &self.inner.id)
            .field("url", &self.inner.url)
            .field("phase", &state.phase)
            .field("attempts", &state.reconnect.attempts())
            .field("subscribers", &self.inner.subscribers.len())
            .finish_non_exhaustive()
    }
}

/// A registration made with [`SessionManager::subscribe`].
///
/// Dropping it unsubscribes. Unsubscribing twice is harmless.
#[must_use = "dropping the subscription unsubscribes immediately"]
pub struct Subscription {
    id: SubscriberId,
    session: Weak<Inner>,
}

impl Subscription {
    /// Registration ID.
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Stop receiving connections. Returns `false` if already unsubscribed.
    pub fn unsubscribe(&self) -> bool {
        let removed = self
            .session
            .upgrade()
            .is_some_and(|inner| inner.subscribers.remove(self.id));
        if removed {
            debug!(subscriber = %self.id, "subscriber removed");
        }
        removed
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let _ = self.unsubscribe();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
