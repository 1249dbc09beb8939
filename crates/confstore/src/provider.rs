//! Persistence boundary.

use crate::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

/// Loads and persists value trees on behalf of a store.
///
/// Encoding and I/O belong to the implementor. Failures are the
/// implementor's to report; stores never see them.
pub trait ConfigProvider: Send + Sync {
    /// The persisted tree, or `None` when nothing has been stored yet.
    fn load(&self) -> Option<Value>;

    /// Persist a tree.
    fn store(&self, value: Value);
}

/// In-memory provider.
#[derive(Debug, Default)]
pub struct MemoryProvider {
    value: Mutex<Option<Value>>,
    stores: AtomicUsize,
}

impl MemoryProvider {
    /// Create an empty provider.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a provider that already holds `value`.
    pub fn with_value(value: Value) -> Self {
        Self {
            value: Mutex::new(Some(value)),
            stores: AtomicUsize::new(0),
        }
    }

    /// The currently held tree.
    pub fn value(&self) -> Option<Value> {
        self.value
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replace the held tree without counting it as a store.
    pub fn set_value(&self, value: Option<Value>) {
        *self.value.lock().unwrap_or_else(PoisonError::into_inner) = value;
    }

    /// Number of `store` calls so far.
    pub fn store_count(&self) -> usize {
        self.stores.load(Ordering::SeqCst)
    }
}

impl ConfigProvider for MemoryProvider {
    fn load(&self) -> Option<Value> {
        self.value()
    }

    fn store(&self, value: Value) {
        *self.value.lock().unwrap_or_else(PoisonError::into_inner) = Some(value);
        self.stores.fetch_add(1, Ordering::SeqCst);
    }
}
