//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`AirwaveSettings::default()`]
//! 2. If `~/.airwave/settings.json` exists, deep-merge user values over defaults
//! 3. Apply `AIRWAVE_*` environment variable overrides (highest priority)
//! 4. Validate (skipped by [`load_unvalidated_from_path`])
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::errors::Result;
use crate::types::AirwaveSettings;

/// Directory holding Airwave's per-user files (`~/.airwave`).
pub fn airwave_dir() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".airwave")
}

/// Resolve the path to the settings file (`~/.airwave/settings.json`).
pub fn settings_path() -> PathBuf {
    airwave_dir().join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<AirwaveSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// A missing file yields defaults. Invalid JSON or values that fail
/// [`AirwaveSettings::validate`] are errors.
pub fn load_settings_from_path(path: &Path) -> Result<AirwaveSettings> {
    let settings = load_unvalidated_from_path(path)?;
    settings.validate()?;
    Ok(settings)
}

/// Defaults, file and env overrides, without validation.
///
/// For callers that layer further overrides (command-line flags) on top and
/// validate the result themselves.
pub fn load_unvalidated_from_path(path: &Path) -> Result<AirwaveSettings> {
    let mut settings = read_settings_file(path)?;
    apply_env_overrides(&mut settings);
    Ok(settings)
}

/// Defaults merged with the file at `path`, without env overrides.
fn read_settings_file(path: &Path) -> Result<AirwaveSettings> {
    let defaults = serde_json::to_value(AirwaveSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    Ok(serde_json::from_value(merged)?)
}

/// Recursive deep merge of two JSON values.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = if let Some(target_val) = target_map.remove(&key) {
                    deep_merge(target_val, source_val)
                } else {
                    source_val
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply environment variable overrides to loaded settings.
///
/// Invalid values are ignored with a warning (file/default value stays).
pub fn apply_env_overrides(settings: &mut AirwaveSettings) {
    apply_overrides(settings, |name| std::env::var(name).ok());
}

/// Override logic over an arbitrary lookup, so it can be tested without
/// touching the process environment.
fn apply_overrides(settings: &mut AirwaveSettings, lookup: impl Fn(&str) -> Option<String>) {
    let string = |name: &str| lookup(name).filter(|v| !v.is_empty());
    let number = |name: &str, min: u64, max: u64| {
        let val = lookup(name)?;
        let result = parse_u64_range(&val, min, max);
        if result.is_none() {
            tracing::warn!(key = name, value = %val, "invalid numeric env var, ignoring");
        }
        result
    };

    // ── Session ─────────────────────────────────────────────────────
    if let Some(v) = string("AIRWAVE_WS_URL") {
        settings.session.url = v;
    }
    if let Some(v) = number("AIRWAVE_RECONNECT_BASE_DELAY_MS", 1, 3_600_000) {
        settings.session.reconnect.base_delay_ms = v;
    }
    if let Some(v) = number("AIRWAVE_RECONNECT_MAX_DELAY_MS", 1, 3_600_000) {
        settings.session.reconnect.max_delay_ms = v;
    }
    if let Some(v) = number("AIRWAVE_RECONNECT_MAX_ATTEMPTS", 0, 1000) {
        #[allow(clippy::cast_possible_truncation)]
        let attempts = v as u32;
        settings.session.reconnect.max_attempts = attempts;
    }
    if let Some(val) = lookup("AIRWAVE_RECONNECT_JITTER") {
        match parse_unit_f64(&val) {
            Some(v) => settings.session.reconnect.jitter_factor = v,
            None => tracing::warn!(key = "AIRWAVE_RECONNECT_JITTER", value = %val, "invalid jitter env var, ignoring"),
        }
    }

    // ── Identity ────────────────────────────────────────────────────
    if let Some(v) = string("AIRWAVE_NICKNAME") {
        settings.identity.nickname = Some(v);
    }
    if let Some(v) = string("AIRWAVE_IDENTITY_PATH") {
        settings.identity.store_path = Some(v);
    }

    // ── Logging ─────────────────────────────────────────────────────
    if let Some(v) = string("AIRWAVE_LOG_LEVEL") {
        settings.logging.level = v;
    }
}

// ── Pure parsing functions ──────────────────────────────────────────────────

/// Parse a string as a `u64` within a range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as an `f64` within `0.0..=1.0`.
pub fn parse_unit_f64(val: &str) -> Option<f64> {
    let n: f64 = val.parse().ok()?;
    (0.0..=1.0).contains(&n).then_some(n)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
