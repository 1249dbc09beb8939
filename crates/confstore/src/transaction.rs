//! Change transactions.

use crate::{SharedState, StoreResult, WriteGuard};
use std::fmt;
use std::sync::Arc;

/// Scoped batch of mutations on one store graph.
///
/// The outermost transaction on a thread owns the graph's write lock. A
/// transaction opened while the current thread already holds the write lock
/// is nested: it neither locks nor notifies. When the owning transaction is
/// dropped it releases the write lock and then fires the change
/// notification once, on every exit path including unwinding.
#[must_use = "the transaction commits when it is dropped"]
pub struct ChangeTransaction {
    shared: Arc<SharedState>,
    guard: Option<WriteGuard>,
}

impl ChangeTransaction {
    /// Open a transaction on the graph owning `shared`.
    ///
    /// Fails with [`crate::StoreError::LockUpgrade`] if the current thread
    /// holds only a read lock.
    pub fn begin(shared: Arc<SharedState>) -> StoreResult<Self> {
        let guard = shared.write_scope()?;
        Ok(Self { shared, guard })
    }

    /// Whether this transaction owns the write lock and will notify.
    pub fn is_outermost(&self) -> bool {
        self.guard.is_some()
    }
}

impl Drop for ChangeTransaction {
    fn drop(&mut self) {
        if let Some(guard) = self.guard.take() {
            drop(guard);
            self.shared.notify_changed();
        }
    }
}

impl fmt::Debug for ChangeTransaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeTransaction")
            .field("outermost", &self.is_outermost())
            .finish()
    }
}
