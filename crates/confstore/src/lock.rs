//! Reader/writer lock shared by every store in a graph.
//!
//! `StoreLock` records which threads hold it so that nested store operations
//! on the same thread behave predictably:
//!
//! - read locks are re-entrant per thread;
//! - a read taken while the same thread holds the write lock passes through;
//! - a write requested while the same thread holds the write lock is
//!   [`StoreError::LockRecursion`], and one requested while it holds a read
//!   lock is [`StoreError::LockUpgrade`].
//!
//! Waiting writers block new readers from other threads, so a steady stream
//! of readers cannot starve a writer.

use crate::{StoreError, StoreResult};
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, ThreadId};

#[derive(Default)]
struct LockState {
    readers: HashMap<ThreadId, usize>,
    writer: Option<ThreadId>,
    waiting_writers: usize,
}

#[derive(Default)]
struct LockInner {
    state: Mutex<LockState>,
    cond: Condvar,
}

/// Shared reader/writer lock handle. Cloning yields another handle to the
/// same lock.
#[derive(Clone, Default)]
pub struct StoreLock {
    inner: Arc<LockInner>,
}

impl StoreLock {
    /// Create a new unlocked lock.
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, LockState> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn wait<'a>(&self, guard: MutexGuard<'a, LockState>) -> MutexGuard<'a, LockState> {
        self.inner
            .cond
            .wait(guard)
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Acquire the read lock, blocking while another thread writes.
    ///
    /// Returns `true` if a read hold was recorded, `false` if the call passed
    /// through because the current thread owns the write lock.
    pub fn acquire_read(&self) -> bool {
        let me = thread::current().id();
        let mut state = self.state();
        if state.writer == Some(me) {
            return false;
        }
        if let Some(count) = state.readers.get_mut(&me) {
            *count += 1;
            return true;
        }
        while state.writer.is_some() || state.waiting_writers > 0 {
            state = self.wait(state);
        }
        state.readers.insert(me, 1);
        true
    }

    /// Release one read hold of the current thread.
    pub fn release_read(&self) -> StoreResult<()> {
        let me = thread::current().id();
        let mut state = self.state();
        match state.readers.get_mut(&me) {
            Some(count) if *count > 1 => {
                *count -= 1;
                Ok(())
            }
            Some(_) => {
                state.readers.remove(&me);
                drop(state);
                self.inner.cond.notify_all();
                Ok(())
            }
            None => Err(StoreError::LockNotHeld { mode: "read" }),
        }
    }

    /// Acquire the write lock, blocking until all other holders release.
    pub fn acquire_write(&self) -> StoreResult<()> {
        let me = thread::current().id();
        let mut state = self.state();
        if state.writer == Some(me) {
            return Err(StoreError::LockRecursion);
        }
        if state.readers.contains_key(&me) {
            return Err(StoreError::LockUpgrade);
        }
        state.waiting_writers += 1;
        while state.writer.is_some() || !state.readers.is_empty() {
            state = self.wait(state);
        }
        state.waiting_writers -= 1;
        state.writer = Some(me);
        Ok(())
    }

    /// Release the write lock held by the current thread.
    pub fn release_write(&self) -> StoreResult<()> {
        let me = thread::current().id();
        let mut state = self.state();
        if state.writer != Some(me) {
            return Err(StoreError::LockNotHeld { mode: "write" });
        }
        state.writer = None;
        drop(state);
        self.inner.cond.notify_all();
        Ok(())
    }

    /// Acquire the read lock for the lifetime of the returned guard.
    pub fn read(&self) -> ReadGuard {
        let held = self.acquire_read();
        ReadGuard {
            lock: self.clone(),
            held,
            _not_send: PhantomData,
        }
    }

    /// Acquire the write lock for the lifetime of the returned guard.
    pub fn write(&self) -> StoreResult<WriteGuard> {
        self.acquire_write()?;
        Ok(WriteGuard {
            lock: self.clone(),
            _not_send: PhantomData,
        })
    }

    /// Whether the current thread owns the write lock.
    pub fn is_write_held_by_current_thread(&self) -> bool {
        self.state().writer == Some(thread::current().id())
    }

    /// Whether the current thread holds a read lock.
    pub fn is_read_held_by_current_thread(&self) -> bool {
        self.state().readers.contains_key(&thread::current().id())
    }

    /// Whether any thread owns the write lock.
    pub fn is_write_locked(&self) -> bool {
        self.state().writer.is_some()
    }

    /// Number of threads currently holding a read lock.
    pub fn reader_count(&self) -> usize {
        self.state().readers.len()
    }

    /// Whether two handles refer to the same lock.
    pub fn ptr_eq(&self, other: &StoreLock) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for StoreLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state();
        f.debug_struct("StoreLock")
            .field("readers", &state.readers.len())
            .field("writer", &state.writer.is_some())
            .finish()
    }
}

/// Read hold released on drop.
#[must_use = "the read lock is released when the guard is dropped"]
pub struct ReadGuard {
    lock: StoreLock,
    held: bool,
    _not_send: PhantomData<*const ()>,
}

impl Drop for ReadGuard {
    fn drop(&mut self) {
        if self.held {
            if let Err(e) = self.lock.release_read() {
                tracing::error!(error = %e, "failed to release read lock");
            }
        }
    }
}

/// Write hold released on drop.
#[must_use = "the write lock is released when the guard is dropped"]
pub struct WriteGuard {
    lock: StoreLock,
    _not_send: PhantomData<*const ()>,
}

impl Drop for WriteGuard {
    fn drop(&mut self) {
        if let Err(e) = self.lock.release_write() {
            tracing::error!(error = %e, "failed to release write lock");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    #[test]
    fn test_read_is_reentrant() {
        let lock = StoreLock::new();
        let a = lock.read();
        let b = lock.read();
        assert!(lock.is_read_held_by_current_thread());
        drop(a);
        assert!(lock.is_read_held_by_current_thread());
        drop(b);
        assert!(!lock.is_read_held_by_current_thread());
    }

    #[test]
    fn test_read_passes_through_own_write() {
        let lock = StoreLock::new();
        let w = lock.write().unwrap();
        let r = lock.read();
        assert!(!lock.is_read_held_by_current_thread());
        drop(r);
        assert!(lock.is_write_held_by_current_thread());
        drop(w);
        assert!(!lock.is_write_locked());
    }

    #[test]
    fn test_write_recursion_is_rejected() {
        let lock = StoreLock::new();
        let _w = lock.write().unwrap();
        assert_eq!(lock.write().err(), Some(StoreError::LockRecursion));
    }

    #[test]
    fn test_upgrade_is_rejected() {
        let lock = StoreLock::new();
        let _r = lock.read();
        assert_eq!(lock.write().err(), Some(StoreError::LockUpgrade));
    }

    #[test]
    fn test_release_without_hold_is_error() {
        let lock = StoreLock::new();
        assert_eq!(
            lock.release_read(),
            Err(StoreError::LockNotHeld { mode: "read" })
        );
        assert_eq!(
            lock.release_write(),
            Err(StoreError::LockNotHeld { mode: "write" })
        );
    }

    #[test]
    fn test_writer_excludes_readers() {
        let lock = StoreLock::new();
        let w = lock.write().unwrap();
        let entered = Arc::new(AtomicBool::new(false));

        let handle = {
            let lock = lock.clone();
            let entered = Arc::clone(&entered);
            thread::spawn(move || {
                let _r = lock.read();
                entered.store(true, Ordering::SeqCst);
            })
        };

        thread::sleep(Duration::from_millis(50));
        assert!(!entered.load(Ordering::SeqCst));
        drop(w);
        handle.join().unwrap();
        assert!(entered.load(Ordering::SeqCst));
    }

    #[test]
    fn test_readers_share() {
        let lock = StoreLock::new();
        let _r = lock.read();
        let other = lock.clone();
        thread::spawn(move || {
            let _r = other.read();
            assert_eq!(other.reader_count(), 2);
        })
        .join()
        .unwrap();
    }
}
