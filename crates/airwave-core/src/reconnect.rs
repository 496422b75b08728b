//! Reconnect configuration and backoff calculation.
//!
//! Pure, clock-free building blocks. The session manager owns the timer;
//! this module only answers "how long until the next attempt, if any":
//!
//! - [`ReconnectConfig`]: base delay, cap, attempt limit, jitter
//! - [`ReconnectPolicy`]: `min(base * 2^attempt, cap)`, optionally jittered
//! - [`ReconnectState`]: the attempt counter advanced on every failure

use std::time::Duration;

use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Default number of automatic reconnect attempts before giving up.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;
/// Default delay before the first reconnect, in milliseconds.
pub const DEFAULT_BASE_DELAY_MS: u64 = 1000;
/// Default upper bound on a single reconnect delay, in milliseconds.
pub const DEFAULT_MAX_DELAY_MS: u64 = 16_000;
/// Default jitter factor (0 disables jitter).
pub const DEFAULT_JITTER_FACTOR: f64 = 0.0;

/// Reconnect tuning.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconnectConfig {
    /// Delay before the first reconnect attempt in ms (default: 1000).
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Cap on any single delay in ms (default: 16000).
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Consecutive failed attempts before the session gives up (default: 5).
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Fraction 0.0–1.0 by which a delay may be randomly shortened (default: 0).
    #[serde(default = "default_jitter_factor")]
    pub jitter_factor: f64,
}

fn default_base_delay_ms() -> u64 {
    DEFAULT_BASE_DELAY_MS
}
fn default_max_delay_ms() -> u64 {
    DEFAULT_MAX_DELAY_MS
}
fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}
fn default_jitter_factor() -> f64 {
    DEFAULT_JITTER_FACTOR
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: DEFAULT_BASE_DELAY_MS,
            max_delay_ms: DEFAULT_MAX_DELAY_MS,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            jitter_factor: DEFAULT_JITTER_FACTOR,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Backoff calculation
// ─────────────────────────────────────────────────────────────────────────────

/// Exponential backoff: `min(base_delay * 2^attempt, max_delay)`.
///
/// `attempt` is zero-based (0 for the first reconnect). Saturates instead of
/// overflowing for large attempt numbers.
#[must_use]
pub fn calculate_backoff_delay(attempt: u32, base_delay_ms: u64, max_delay_ms: u64) -> u64 {
    base_delay_ms
        .saturating_mul(1u64 << attempt.min(63))
        .min(max_delay_ms)
}

/// Shorten a delay by up to `jitter_factor` of its length.
///
/// `random` should be a value in `[0.0, 1.0)` from a PRNG. The result never
/// exceeds `delay_ms`, so jitter cannot push a delay past the backoff curve.
#[must_use]
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn apply_jitter(delay_ms: u64, jitter_factor: f64, random: f64) -> u64 {
    let factor = jitter_factor.clamp(0.0, 1.0);
    let random = random.clamp(0.0, 1.0);
    let scaled = (delay_ms as f64) * (1.0 - random * factor);
    (scaled.round().max(0.0) as u64).min(delay_ms)
}

/// Backoff policy built from a [`ReconnectConfig`].
#[derive(Clone, Debug, Default)]
pub struct ReconnectPolicy {
    config: ReconnectConfig,
}

impl ReconnectPolicy {
    /// Create a policy.
    pub fn new(config: ReconnectConfig) -> Self {
        Self { config }
    }

    /// The underlying configuration.
    pub fn config(&self) -> &ReconnectConfig {
        &self.config
    }

    /// Attempt limit.
    pub fn max_attempts(&self) -> u32 {
        self.config.max_attempts
    }

    /// Un-jittered delay for a zero-based attempt. Non-decreasing in `attempt`.
    pub fn delay(&self, attempt: u32) -> Duration {
        Duration::from_millis(calculate_backoff_delay(
            attempt,
            self.config.base_delay_ms,
            self.config.max_delay_ms,
        ))
    }

    /// Delay with jitter applied. Always `<= self.delay(attempt)`.
    pub fn jittered_delay(&self, attempt: u32, random: f64) -> Duration {
        let upper = calculate_backoff_delay(
            attempt,
            self.config.base_delay_ms,
            self.config.max_delay_ms,
        );
        Duration::from_millis(apply_jitter(upper, self.config.jitter_factor, random))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Attempt counter
// ─────────────────────────────────────────────────────────────────────────────

/// Reconnect bookkeeping: attempts so far and the next (un-jittered) delay.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconnectState {
    attempts: u32,
    next_delay: Duration,
}

impl ReconnectState {
    /// Fresh state: `{0, base_delay}`.
    pub fn new(policy: &ReconnectPolicy) -> Self {
        Self {
            attempts: 0,
            next_delay: policy.delay(0),
        }
    }

    /// Failed attempts since the last successful open.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Delay the next failure would schedule (before jitter).
    pub fn next_delay(&self) -> Duration {
        self.next_delay
    }

    /// Whether the attempt budget is spent.
    pub fn is_exhausted(&self, policy: &ReconnectPolicy) -> bool {
        self.attempts >= policy.max_attempts()
    }

    /// Back to `{0, base_delay}` after a successful open or an explicit connect.
    pub fn reset(&mut self, policy: &ReconnectPolicy) {
        *self = Self::new(policy);
    }

    /// Record a failure and return the delay before the next attempt.
    ///
    /// Returns `None` once `max_attempts` failures have been recorded; the
    /// counter then stays put until [`reset`](Self::reset).
    pub fn advance(&mut self, policy: &ReconnectPolicy, random: f64) -> Option<Duration> {
        if self.is_exhausted(policy) {
            return None;
        }
        let delay = policy.jittered_delay(self.attempts, random);
        self.attempts += 1;
        self.next_delay = policy.delay(self.attempts);
        Some(delay)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
