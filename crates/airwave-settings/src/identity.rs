//! Persisted identity.
//!
//! A flat JSON object on disk (`~/.airwave/identity.json`) acting as a tiny
//! key-value store. The session layer never touches it: the application reads
//! the nickname once at startup, hands it to the session, and writes it back
//! when the user renames themselves.

use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use tracing::debug;

use crate::errors::{Result, SettingsError};
use crate::loader::airwave_dir;
use crate::types::AirwaveSettings;

/// Key under which the display name is stored.
pub const NICKNAME_KEY: &str = "nickname";

/// File-backed string key-value store.
#[derive(Clone, Debug)]
pub struct IdentityStore {
    path: PathBuf,
}

impl IdentityStore {
    /// Store at an explicit path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at the configured path, or `~/.airwave/identity.json`.
    pub fn from_settings(settings: &AirwaveSettings) -> Self {
        settings
            .identity
            .store_path
            .as_ref()
            .map_or_else(|| Self::new(airwave_dir().join("identity.json")), Self::new)
    }

    /// Backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<Map<String, Value>> {
        if !self.path.exists() {
            return Ok(Map::new());
        }
        let content = std::fs::read_to_string(&self.path)?;
        match serde_json::from_str(&content)? {
            Value::Object(map) => Ok(map),
            _ => Err(SettingsError::InvalidValue(format!(
                "{} must contain a JSON object",
                self.path.display()
            ))),
        }
    }

    /// Read a string value.
    pub fn get(&self, key: &str) -> Result<Option<String>> {
        let map = self.read_all()?;
        Ok(map.get(key).and_then(Value::as_str).map(ToOwned::to_owned))
    }

    /// Write a string value, keeping other keys intact.
    pub fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut map = self.read_all()?;
        let _ = map.insert(key.to_owned(), Value::String(value.to_owned()));
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_string_pretty(&Value::Object(map))?)?;
        debug!(path = %self.path.display(), key, "identity store updated");
        Ok(())
    }

    /// Stored nickname, ignoring blank values.
    pub fn nickname(&self) -> Result<Option<String>> {
        Ok(self
            .get(NICKNAME_KEY)?
            .map(|n| n.trim().to_owned())
            .filter(|n| !n.is_empty()))
    }

    /// Persist a nickname.
    pub fn set_nickname(&self, nickname: &str) -> Result<()> {
        self.set(NICKNAME_KEY, nickname.trim())
    }
}

/// Nickname to announce: a configured override wins over the store.
pub fn resolve_nickname(settings: &AirwaveSettings, store: &IdentityStore) -> Result<Option<String>> {
    if let Some(nick) = settings
        .identity
        .nickname
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
    {
        return Ok(Some(nick.to_owned()));
    }
    store.nickname()
}
