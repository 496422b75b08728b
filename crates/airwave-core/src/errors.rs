//! Error types for the session layer.
//!
//! - [`TransportError`]: link-level failures. They drive reconnect scheduling
//!   and are never returned from public session operations.
//! - [`EnvelopeError`]: a frame that could not be parsed, encoded, or decoded.
//! - [`SessionError`]: what callers of the session API can actually see.

use thiserror::Error;

/// Failures of a single transport link.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The link could not be established.
    #[error("failed to connect to {url}: {reason}")]
    Connect {
        /// Endpoint that was dialed.
        url: String,
        /// Underlying cause.
        reason: String,
    },

    /// The remote side (or the network) closed the link.
    #[error("connection closed: {reason}")]
    Closed {
        /// Close reason, if the peer sent one.
        reason: String,
    },

    /// The link is gone; the frame could not be queued.
    #[error("link is not open")]
    NotOpen,

    /// A WebSocket protocol violation or I/O failure mid-stream.
    #[error("protocol error: {0}")]
    Protocol(String),
}

/// Failures around envelope (de)serialization.
#[derive(Debug, Error)]
pub enum EnvelopeError {
    /// The frame is not a JSON object with a string `type`.
    #[error("malformed envelope: {0}")]
    Malformed(#[source] serde_json::Error),

    /// The envelope could not be serialized.
    #[error("failed to encode envelope: {0}")]
    Encode(#[source] serde_json::Error),

    /// The payload does not match the shape a consumer expected.
    #[error("unexpected payload shape: {0}")]
    Shape(#[source] serde_json::Error),
}

/// Errors returned by session operations.
#[derive(Debug, Error)]
pub enum SessionError {
    /// No live connection. A connection attempt has been triggered; retry
    /// after the session reports `connected`.
    #[error("not connected")]
    NotConnected,

    /// The outgoing envelope could not be encoded.
    #[error(transparent)]
    Envelope(#[from] EnvelopeError),

    /// The live link rejected the frame (it closed underneath the caller).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A caller-supplied value was rejected before anything was sent.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

/// Result type for session operations.
pub type Result<T> = std::result::Result<T, SessionError>;
