//! Settings schema.
//!
//! Serialized with camelCase keys; every field has a default so a partial
//! user file is always valid.

use airwave_core::ReconnectConfig;
use airwave_core::logging::LogFormat;
use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Default endpoint for the real-time socket.
pub const DEFAULT_WS_URL: &str = "ws://localhost:3001/ws";

/// Root settings object.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AirwaveSettings {
    /// Socket endpoint and reconnect tuning.
    pub session: SessionSettings,
    /// Nickname source.
    pub identity: IdentitySettings,
    /// Log output.
    pub logging: LoggingSettings,
}

/// Connection settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionSettings {
    /// `ws://` or `wss://` endpoint.
    pub url: String,
    /// Backoff and attempt limit.
    pub reconnect: ReconnectConfig,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            url: DEFAULT_WS_URL.to_string(),
            reconnect: ReconnectConfig::default(),
        }
    }
}

/// Identity settings.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IdentitySettings {
    /// Fixed nickname. When set it wins over the identity store.
    pub nickname: Option<String>,
    /// Identity store location. Defaults to `~/.airwave/identity.json`.
    pub store_path: Option<String>,
}

/// Logging settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Filter directive, e.g. `"info"` or `"airwave_session=debug"`.
    pub level: String,
    /// Output format.
    pub format: LogFormat,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Compact,
        }
    }
}

impl AirwaveSettings {
    /// Reject values the session layer cannot run with.
    pub fn validate(&self) -> Result<()> {
        let url = self.session.url.as_str();
        if !(url.starts_with("ws://") || url.starts_with("wss://")) {
            return Err(SettingsError::InvalidValue(format!(
                "session.url must use ws:// or wss://, got {url:?}"
            )));
        }
        let reconnect = &self.session.reconnect;
        if reconnect.base_delay_ms == 0 {
            return Err(SettingsError::InvalidValue(
                "session.reconnect.baseDelayMs must be positive".into(),
            ));
        }
        if reconnect.max_delay_ms < reconnect.base_delay_ms {
            return Err(SettingsError::InvalidValue(
                "session.reconnect.maxDelayMs must be >= baseDelayMs".into(),
            ));
        }
        if !(0.0..=1.0).contains(&reconnect.jitter_factor) {
            return Err(SettingsError::InvalidValue(
                "session.reconnect.jitterFactor must be within 0.0..=1.0".into(),
            ));
        }
        Ok(())
    }
}
