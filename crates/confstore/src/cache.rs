//! Process-wide keyed cache with single-creation semantics.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

/// A cache whose values are created at most once per key.
///
/// Concurrent first access to the same key blocks all but one caller until
/// the value exists; every caller then observes that single value. Creation
/// for different keys proceeds independently, so a creator may itself look
/// up other keys.
pub struct SingleCreationCache<K, V> {
    slots: RwLock<HashMap<K, Arc<OnceLock<V>>>>,
}

impl<K, V> Default for SingleCreationCache<K, V> {
    fn default() -> Self {
        Self {
            slots: RwLock::new(HashMap::new()),
        }
    }
}

impl<K, V> SingleCreationCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, key: &K) -> Arc<OnceLock<V>> {
        if let Some(slot) = self
            .slots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
        {
            return Arc::clone(slot);
        }
        let mut slots = self.slots.write().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(slots.entry(key.clone()).or_default())
    }

    /// Return the cached value for `key`, creating it with `create` if absent.
    pub fn get_or_create(&self, key: K, create: impl FnOnce(&K) -> V) -> V {
        let slot = self.slot(&key);
        slot.get_or_init(|| create(&key)).clone()
    }

    /// Return the cached value for `key` without creating it.
    pub fn get(&self, key: &K) -> Option<V> {
        self.slots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .and_then(|slot| slot.get().cloned())
    }

    /// Number of keys with a created value.
    pub fn len(&self) -> usize {
        self.slots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|slot| slot.get().is_some())
            .count()
    }

    /// Check whether no value has been created yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
