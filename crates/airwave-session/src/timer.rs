//! Single-slot reconnect timer.
//!
//! At most one timer is armed. Arming replaces (and aborts) the previous
//! one, and each arm gets a fresh token so a callback that raced a cancel
//! can tell it is stale.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;

struct Armed {
    token: u64,
    deadline: Instant,
    handle: JoinHandle<()>,
}

/// Owner of the pending reconnect, if any.
#[derive(Default)]
pub(crate) struct ReconnectTimer {
    next_token: u64,
    armed: Option<Armed>,
}

impl ReconnectTimer {
    /// Arm for `delay`, replacing any pending timer. `on_fire` receives the
    /// token and must confirm it with [`Self::fire`] before acting.
    pub(crate) fn arm<F>(&mut self, delay: Duration, on_fire: F) -> u64
    where
        F: FnOnce(u64) + Send + 'static,
    {
        let _ = self.cancel();
        self.next_token += 1;
        let token = self.next_token;
        let deadline = Instant::now() + delay;
        let handle = tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            on_fire(token);
        });
        self.armed = Some(Armed {
            token,
            deadline,
            handle,
        });
        token
    }

    /// Cancel the pending timer. Returns whether one was armed.
    pub(crate) fn cancel(&mut self) -> bool {
        match self.armed.take() {
            Some(armed) => {
                armed.handle.abort();
                true
            }
            None => false,
        }
    }

    /// Consume the pending timer if `token` is the current one.
    pub(crate) fn fire(&mut self, token: u64) -> bool {
        if self.armed.as_ref().is_some_and(|a| a.token == token) {
            self.armed = None;
            true
        } else {
            false
        }
    }

    pub(crate) fn is_armed(&self) -> bool {
        self.armed.is_some()
    }

    /// Time left until the pending timer fires.
    pub(crate) fn remaining(&self) -> Option<Duration> {
        self.armed
            .as_ref()
            .map(|a| a.deadline.saturating_duration_since(Instant::now()))
    }
}

impl Drop for ReconnectTimer {
    fn drop(&mut self) {
        let _ = self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU64, Ordering};

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn fires_after_delay() {
        let fired = Arc::new(AtomicU64::new(0));
        let mut timer = ReconnectTimer::default();
        let seen = fired.clone();
        let token = timer.arm(Duration::from_millis(1000), move |t| seen.store(t, Ordering::SeqCst));

        tokio::time::sleep(Duration::from_millis(999)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert_eq!(timer.remaining(), Some(Duration::from_millis(1)));

        tokio::time::sleep(Duration::from_millis(2)).await;
        assert_eq!(fired.load(Ordering::SeqCst), token);
        assert!(timer.fire(token));
        assert!(!timer.is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_prevents_fire() {
        let fired = Arc::new(AtomicU64::new(0));
        let mut timer = ReconnectTimer::default();
        let seen = fired.clone();
        let _ = timer.arm(Duration::from_millis(10), move |t| seen.store(t, Ordering::SeqCst));
        assert!(timer.cancel());
        assert!(!timer.cancel());

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn rearm_replaces_previous() {
        let fired = Arc::new(AtomicU64::new(0));
        let mut timer = ReconnectTimer::default();

        let first_seen = fired.clone();
        let first = timer.arm(Duration::from_millis(10), move |t| {
            let _ = first_seen.fetch_add(t, Ordering::SeqCst);
        });
        let second_seen = fired.clone();
        let second = timer.arm(Duration::from_millis(20), move |t| {
            let _ = second_seen.fetch_add(t, Ordering::SeqCst);
        });
        assert_ne!(first, second);
        assert!(!timer.fire(first));

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(fired.load(Ordering::SeqCst), second);
        assert!(timer.fire(second));
    }
}
