//! # airwave-settings
//!
//! Layered configuration for Airwave clients.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`AirwaveSettings::default()`]
//! 2. **User file**: `~/.airwave/settings.json` (deep-merged over defaults)
//! 3. **Environment variables**: `AIRWAVE_*` overrides (highest priority)
//!
//! The persisted nickname lives separately in an [`IdentityStore`], read once
//! at startup and handed to the session.

#![deny(unsafe_code)]

pub mod errors;
pub mod identity;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use identity::{IdentityStore, resolve_nickname};
pub use loader::{deep_merge, load_settings, load_settings_from_path, load_unvalidated_from_path, settings_path};
pub use types::*;
