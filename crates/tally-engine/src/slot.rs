//! Single-value mailbox between a response observer and the control flow.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::Notify;

/// A cloneable handle to one optional value.
///
/// The observer side calls [`set`](Self::set); the control flow consumes with
/// [`check`](Self::check), [`take`](Self::take) or
/// [`wait_take`](Self::wait_take). Every consuming read leaves the slot empty,
/// so a value is never seen twice.
pub struct ResponseSlot<T> {
    inner: Arc<SlotInner<T>>,
}

struct SlotInner<T> {
    value: Mutex<Option<T>>,
    notify: Notify,
}

impl<T> Clone for ResponseSlot<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Default for ResponseSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for ResponseSlot<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseSlot")
            .field("filled", &self.lock().is_some())
            .finish()
    }
}

impl<T> ResponseSlot<T> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(SlotInner {
                value: Mutex::new(None),
                notify: Notify::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<T>> {
        // A panic while holding the lock cannot leave an Option half-written.
        self.inner
            .value
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Store a value, replacing any unconsumed one.
    pub fn set(&self, value: T) {
        *self.lock() = Some(value);
        self.inner.notify.notify_one();
    }

    /// Remove and return the stored value.
    pub fn take(&self) -> Option<T> {
        self.lock().take()
    }

    /// Discard any stored value.
    pub fn clear(&self) {
        self.lock().take();
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_none()
    }

    /// Wait up to `timeout` for a value and consume it.
    pub async fn wait_take(&self, timeout: Duration) -> Option<T> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if let Some(value) = self.take() {
                return Some(value);
            }
            if tokio::time::timeout_at(deadline, self.inner.notify.notified())
                .await
                .is_err()
            {
                return self.take();
            }
        }
    }
}

impl<T: Clone> ResponseSlot<T> {
    /// Current value without consuming it. Diagnostic use only.
    pub fn get(&self) -> Option<T> {
        self.lock().clone()
    }
}

impl<T: PartialEq> ResponseSlot<T> {
    /// Compare the stored value with `expected`, then clear the slot whatever the outcome.
    pub fn check(&self, expected: &T) -> bool {
        self.take().as_ref() == Some(expected)
    }

    /// Like [`check`](Self::check) but waits up to `timeout` for a value to arrive.
    pub async fn check_within(&self, expected: &T, timeout: Duration) -> bool {
        self.wait_take(timeout).await.as_ref() == Some(expected)
    }
}
