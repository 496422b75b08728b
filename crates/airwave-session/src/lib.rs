//! # airwave-session
//!
//! One shared, self-healing real-time connection for the whole client.
//!
//! - **[`SessionManager`]**: owns the single link, dials lazily on the first
//!   subscriber, reconnects with capped exponential backoff and announces the
//!   user's identity on every (re)connect
//! - **[`SubscriberRegistry`]**: ordered callbacks with snapshot fan-out and
//!   per-callback panic isolation
//! - **[`Connection`]**: the handle subscribers get; send envelopes and attach
//!   message listeners
//! - **[`transport`]**: the seam to the network, with a `tokio-tungstenite`
//!   implementation
//!
//! Enable the `testing` feature for an in-memory transport.

#![deny(unsafe_code)]

pub mod connection;
pub mod manager;
pub mod registry;
pub mod state;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
mod timer;
pub mod transport;

pub use connection::{Connection, MessageListener};
pub use manager::{SessionConfig, SessionManager, Subscription};
pub use registry::{SubscriberId, SubscriberRegistry};
pub use state::{ConnectionState, SessionStatus};
pub use transport::{EventSink, Link, Transport, TransportEvent, WebSocketTransport};
