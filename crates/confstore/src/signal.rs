//! Single-slot change signal.

use std::fmt;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

#[derive(Default)]
struct SignalInner {
    set: Mutex<bool>,
    cond: Condvar,
}

/// Auto-reset wake-up handle fired after committed changes.
///
/// The signal holds at most one pending wake-up: several `set` calls before a
/// waiter consumes it collapse into one. A successful wait resets it.
#[derive(Clone, Default)]
pub struct ChangeSignal {
    inner: Arc<SignalInner>,
}

impl ChangeSignal {
    /// Create an unset signal.
    pub fn new() -> Self {
        Self::default()
    }

    fn flag(&self) -> MutexGuard<'_, bool> {
        self.inner.set.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Set the signal and wake one waiter.
    pub fn set(&self) {
        *self.flag() = true;
        self.inner.cond.notify_one();
    }

    /// Block until the signal is set, then reset it.
    pub fn wait(&self) {
        let mut set = self.flag();
        while !*set {
            set = self
                .inner
                .cond
                .wait(set)
                .unwrap_or_else(PoisonError::into_inner);
        }
        *set = false;
    }

    /// Block until the signal is set or `timeout` elapses.
    ///
    /// Returns `true` and resets the signal if it was set.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let set = self.flag();
        let (mut set, _) = self
            .inner
            .cond
            .wait_timeout_while(set, timeout, |set| !*set)
            .unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *set, false)
    }

    /// Consume a pending wake-up without blocking.
    pub fn try_take(&self) -> bool {
        std::mem::replace(&mut *self.flag(), false)
    }

    /// Whether a wake-up is pending.
    pub fn is_set(&self) -> bool {
        *self.flag()
    }
}

impl fmt::Debug for ChangeSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeSignal")
            .field("set", &self.is_set())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_sets_collapse() {
        let signal = ChangeSignal::new();
        signal.set();
        signal.set();
        signal.set();
        assert!(signal.try_take());
        assert!(!signal.try_take());
    }

    #[test]
    fn test_wait_resets() {
        let signal = ChangeSignal::new();
        signal.set();
        signal.wait();
        assert!(!signal.is_set());
    }

    #[test]
    fn test_wait_timeout_expires() {
        let signal = ChangeSignal::new();
        assert!(!signal.wait_timeout(Duration::from_millis(20)));
    }

    #[test]
    fn test_wakes_waiter_on_other_thread() {
        let signal = ChangeSignal::new();
        let waiter = {
            let signal = signal.clone();
            thread::spawn(move || signal.wait_timeout(Duration::from_secs(5)))
        };
        thread::sleep(Duration::from_millis(20));
        signal.set();
        assert!(waiter.join().unwrap());
    }
}
