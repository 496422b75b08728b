//! Subscriber registry with snapshot-based, panic-isolated fan-out.
//!
//! Callbacks are stored behind `Arc` so a notification round can work from a
//! snapshot taken outside any lock. A callback removed while a round is in
//! progress is skipped for the rest of that round; a callback that panics is
//! logged and the round continues with the next subscriber.

use std::any::Any;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tracing::error;

/// Shared callback type stored in a [`SubscriberRegistry`].
pub type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Handle identifying one registration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub_{}", self.0)
    }
}

/// One registration. `live` is cleared on removal so snapshots taken
/// earlier can skip it without consulting the registry.
struct Entry<T> {
    id: SubscriberId,
    callback: Callback<T>,
    live: Arc<AtomicBool>,
}

impl<T> Clone for Entry<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            callback: self.callback.clone(),
            live: self.live.clone(),
        }
    }
}

struct Entries<T> {
    next_id: u64,
    entries: Vec<Entry<T>>,
}

/// Ordered set of callbacks.
pub struct SubscriberRegistry<T> {
    inner: Mutex<Entries<T>>,
}

/// Registrations captured at one instant.
pub struct Snapshot<T> {
    entries: Vec<Entry<T>>,
}

impl<T> Snapshot<T> {
    /// Number of captured registrations.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing was registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<T> Default for SubscriberRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> SubscriberRegistry<T> {
    /// Empty registry.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Entries {
                next_id: 1,
                entries: Vec::new(),
            }),
        }
    }

    /// Register a callback.
    pub fn add<F>(&self, callback: F) -> SubscriberId
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.add_shared(Arc::new(callback))
    }

    /// Register an already shared callback.
    pub fn add_shared(&self, callback: Callback<T>) -> SubscriberId {
        let mut inner = self.inner.lock();
        let id = SubscriberId(inner.next_id);
        inner.next_id += 1;
        inner.entries.push(Entry {
            id,
            callback,
            live: Arc::new(AtomicBool::new(true)),
        });
        id
    }

    /// Remove a registration. Returns `false` if it was already gone.
    pub fn remove(&self, id: SubscriberId) -> bool {
        let mut inner = self.inner.lock();
        let Some(pos) = inner.entries.iter().position(|e| e.id == id) else {
            return false;
        };
        let entry = inner.entries.remove(pos);
        entry.live.store(false, Ordering::Release);
        true
    }

    /// Whether `id` is still registered.
    pub fn contains(&self, id: SubscriberId) -> bool {
        self.inner.lock().entries.iter().any(|e| e.id == id)
    }

    /// Number of registrations.
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().entries.is_empty()
    }

    /// Capture the current registrations.
    pub fn snapshot(&self) -> Snapshot<T> {
        Snapshot {
            entries: self.inner.lock().entries.clone(),
        }
    }

    /// Deliver `value` to every entry of `snapshot` that is still registered.
    ///
    /// Returns the number of callbacks that ran to completion.
    pub fn notify(&self, snapshot: &Snapshot<T>, value: &T) -> usize {
        let mut delivered = 0;
        for entry in &snapshot.entries {
            if !entry.live.load(Ordering::Acquire) {
                continue;
            }
            if call_guarded(entry.id, &entry.callback, value) {
                delivered += 1;
            }
        }
        delivered
    }

    /// Snapshot and deliver in one step.
    pub fn notify_all(&self, value: &T) -> usize {
        let snapshot = self.snapshot();
        self.notify(&snapshot, value)
    }
}

impl<T> fmt::Debug for SubscriberRegistry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriberRegistry")
            .field("len", &self.len())
            .finish()
    }
}

/// Run one callback, containing any panic. Returns `true` on success.
pub(crate) fn call_guarded<T>(id: SubscriberId, callback: &Callback<T>, value: &T) -> bool {
    match catch_unwind(AssertUnwindSafe(|| callback(value))) {
        Ok(()) => true,
        Err(payload) => {
            error!(subscriber = %id, panic = panic_message(payload.as_ref()), "subscriber panicked");
            false
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
