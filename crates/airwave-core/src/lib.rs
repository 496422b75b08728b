//! # airwave-core
//!
//! Shared vocabulary for the Airwave real-time session layer.
//!
//! - **Envelope**: the `{"type": ..., ...payload}` JSON frame exchanged with the server
//! - **Branded IDs**: `ConnectionId`, `SessionId` as newtypes for type safety
//! - **Errors**: `SessionError`, `TransportError`, `EnvelopeError` via `thiserror`
//! - **Reconnect**: backoff configuration and the pure delay calculation
//! - **Logging**: `tracing` subscriber setup and in-memory capture for tests

#![deny(unsafe_code)]

pub mod envelope;
pub mod errors;
pub mod ids;
pub mod logging;
pub mod reconnect;

pub use envelope::Envelope;
pub use errors::{EnvelopeError, SessionError, TransportError};
pub use ids::{ConnectionId, SessionId};
pub use reconnect::{ReconnectConfig, ReconnectPolicy, ReconnectState};
