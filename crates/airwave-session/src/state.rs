//! Connection state as seen by the session and by UI indicators.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle phase of the session's single link.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    /// No link. A reconnect may be pending.
    Disconnected,
    /// A link is being established.
    Connecting,
    /// The link is open and subscribers hold it.
    Connected,
    /// `close()` is tearing the link down.
    Closing,
}

/// Coarse status for UI indicators.
///
/// `Error` means reconnect attempts are exhausted; the session stays
/// offline until `connect()` is called.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// Offline (closed, or waiting for a reconnect timer).
    Disconnected,
    /// Dialing.
    Connecting,
    /// Online.
    Connected,
    /// Gave up reconnecting.
    Error,
}

impl SessionStatus {
    /// Wire/UI name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Error => "error",
        }
    }

    /// Whether a live connection exists.
    pub fn is_online(self) -> bool {
        self == Self::Connected
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ConnectionState {
    /// Status for a phase, given whether retries are exhausted.
    pub fn status(self, gave_up: bool) -> SessionStatus {
        match self {
            Self::Connecting => SessionStatus::Connecting,
            Self::Connected => SessionStatus::Connected,
            Self::Disconnected | Self::Closing if gave_up => SessionStatus::Error,
            Self::Disconnected | Self::Closing => SessionStatus::Disconnected,
        }
    }
}
