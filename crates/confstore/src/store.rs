//! Runtime core shared by every generated store.
//!
//! `#[derive(Schema)]` emits a thin handle type around `Arc<StoreCore<T>>`
//! with one getter and setter per member. Everything else a store does lives
//! here:
//!
//! - getters read under the graph's read lock;
//! - setters write inside a [`ChangeTransaction`] (or, for `plain` members,
//!   under the write lock only);
//! - `deserialize` decodes against a snapshot, then assigns every member in
//!   one transaction so observers see a single change;
//! - `copy_from` copies every member in one transaction and then runs the
//!   schema's `copied` hook.

use crate::{
    ChangeSignal, ChangeTransaction, ConfigProvider, Map, Schema, StoreError, StoreHooks,
    StoreLink, StoreLock, StoreResult, Value, ValueKind,
};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};

/// Handle returned by [`PropertyObservers::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

type PropertyCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// Registered property-change callbacks of one store.
#[derive(Default)]
pub struct PropertyObservers {
    next: AtomicU64,
    entries: RwLock<Vec<(ObserverId, PropertyCallback)>>,
}

impl PropertyObservers {
    /// Register a callback receiving the name of each changed field.
    pub fn subscribe(&self, callback: impl Fn(&str) + Send + Sync + 'static) -> ObserverId {
        let id = ObserverId(self.next.fetch_add(1, Ordering::Relaxed));
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, Arc::new(callback)));
        id
    }

    /// Remove a callback. Returns whether it was registered.
    pub fn unsubscribe(&self, id: ObserverId) -> bool {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let before = entries.len();
        entries.retain(|(entry, _)| *entry != id);
        entries.len() != before
    }

    /// Invoke every callback with `property`.
    pub fn notify(&self, property: &str) {
        let callbacks: Vec<PropertyCallback> = self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, cb)| Arc::clone(cb))
            .collect();
        for callback in callbacks {
            callback(property);
        }
    }

    /// Number of registered callbacks.
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Check whether no callback is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// State behind a generated store handle.
pub struct StoreCore<T: Schema> {
    link: StoreLink,
    slots: RwLock<T::Slots>,
    observers: PropertyObservers,
}

impl<T: StoreHooks> StoreCore<T> {
    /// Wrap `value`, attaching a node under `parent` or starting a new graph.
    ///
    /// The root of a graph routes committed changes to `T::changed`.
    pub fn new(value: T, parent: Option<&StoreLink>) -> Arc<Self> {
        let link = StoreLink::attach(T::NAME, parent);
        let slots = T::materialize(value, &link);
        let core = Arc::new(Self {
            link,
            slots: RwLock::new(slots),
            observers: PropertyObservers::default(),
        });
        if core.link.is_root() {
            let shared = core.link.shared();
            let weak = Arc::downgrade(&core);
            shared.set_changed_hook(move || {
                if let Some(core) = weak.upgrade() {
                    T::changed(&core.handle());
                }
            });
            let root: Weak<dyn RootEntry> = Arc::downgrade(&core) as Weak<Self>;
            shared.set_root(root);
        }
        core
    }

    /// A store handle for this core.
    pub fn handle(self: &Arc<Self>) -> T::Store {
        <T::Store as crate::GeneratedStore>::from_core(Arc::clone(self))
    }

    /// The store's node in its graph.
    pub fn link(&self) -> &StoreLink {
        &self.link
    }

    /// Property observers of this store.
    pub fn observers(&self) -> &PropertyObservers {
        &self.observers
    }

    fn slots(&self) -> RwLockReadGuard<'_, T::Slots> {
        self.slots.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn slots_mut(&self) -> RwLockWriteGuard<'_, T::Slots> {
        self.slots.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn notify_properties(&self, names: &[&'static str]) {
        if T::NOTIFY {
            for name in names {
                self.observers.notify(name);
            }
        }
    }

    /// Run `read` against the slots under the graph's read lock.
    pub fn read<R>(&self, read: impl FnOnce(&T::Slots) -> R) -> R {
        let _guard = self.link.lock().read();
        read(&self.slots())
    }

    /// Run `write` against the slots for the member `field`.
    ///
    /// Intercepted members write inside a change transaction; others only
    /// take the write lock. A write that cannot take the lock is logged and
    /// skipped.
    pub fn write(
        &self,
        field: &'static str,
        intercepted: bool,
        write: impl FnOnce(&mut T::Slots, &StoreLink),
    ) {
        let shared = self.link.shared();
        let scope = if intercepted {
            ChangeTransaction::begin(shared).map(WriteScope::Transaction)
        } else {
            shared.write_scope().map(WriteScope::Lock)
        };
        let scope = match scope {
            Ok(scope) => scope,
            Err(err) => {
                tracing::error!(schema = T::NAME, member = field, error = %err, "write skipped");
                return;
            }
        };
        write(&mut self.slots_mut(), &self.link);
        drop(scope);
        if intercepted {
            self.notify_properties(&[field]);
        }
    }

    /// Encode every member.
    pub fn serialize(&self) -> Map {
        let members = T::members();
        self.read(|slots| T::encode(slots, &members))
    }

    /// Decode `value` into the store.
    ///
    /// Members are decoded against a snapshot without holding the lock, then
    /// assigned in one change transaction.
    pub fn deserialize(&self, value: &Value) {
        let Some(map) = value.as_map() else {
            let err = StoreError::type_mismatch(ValueKind::Map, value.kind());
            tracing::error!(schema = T::NAME, error = %err, "tree ignored");
            return;
        };
        let members = T::members();
        let current = self.read(|slots| slots.clone());
        let decoded = T::decode(&current, map, &members);
        drop(current);

        let assigned = {
            let tx = match self.link.change_transaction() {
                Ok(tx) => tx,
                Err(err) => {
                    tracing::error!(schema = T::NAME, error = %err, "tree ignored");
                    return;
                }
            };
            let assigned = T::assign(&mut self.slots_mut(), decoded, &self.link);
            drop(tx);
            assigned
        };
        self.notify_properties(&assigned);
    }

    /// Copy every serialized member of `source` into the store.
    ///
    /// With `use_lock` the copy runs in its own change transaction;
    /// otherwise the caller is expected to hold the write lock.
    pub fn copy_from(self: &Arc<Self>, source: &T, use_lock: bool) {
        let tx = if use_lock {
            match self.link.change_transaction() {
                Ok(tx) => Some(tx),
                Err(err) => {
                    tracing::error!(schema = T::NAME, error = %err, "copy skipped");
                    return;
                }
            }
        } else {
            None
        };
        let copied = T::copy_into(&mut self.slots_mut(), source, &self.link);
        T::copied(&self.handle());
        drop(tx);
        self.notify_properties(&copied);
    }

    /// Copy the store out into a plain value.
    pub fn snapshot(&self) -> T {
        self.read(T::snapshot)
    }

    /// Reload this store, and the children under it, from a provider.
    pub fn read_from(self: &Arc<Self>, provider: &dyn ConfigProvider) {
        match provider.load() {
            Some(value) => {
                tracing::debug!(schema = T::NAME, "reloading store");
                self.deserialize(&value);
            }
            None => {
                tracing::debug!(schema = T::NAME, "provider has no tree, keeping current values");
                self.changed();
            }
        }
        T::on_reload(&self.handle());
    }

    /// Persist this store, and the children under it, to a provider.
    pub fn write_to(&self, provider: &dyn ConfigProvider) {
        tracing::debug!(schema = T::NAME, "persisting store");
        provider.store(Value::Map(self.serialize()));
    }

    /// Open and close a transaction, firing the change notification if it
    /// was the outermost one.
    pub fn changed(&self) {
        match self.link.change_transaction() {
            Ok(tx) => drop(tx),
            Err(err) => tracing::error!(schema = T::NAME, error = %err, "change not signalled"),
        }
    }
}

impl<T: Schema> fmt::Debug for StoreCore<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreCore")
            .field("schema", &T::NAME)
            .field("link", &self.link)
            .finish()
    }
}

/// Reload and persist entry points of the root store of a graph.
pub(crate) trait RootEntry: Send + Sync {
    fn reload(self: Arc<Self>, provider: &dyn ConfigProvider);

    fn persist(&self, provider: &dyn ConfigProvider);
}

impl<T: StoreHooks> RootEntry for StoreCore<T> {
    fn reload(self: Arc<Self>, provider: &dyn ConfigProvider) {
        self.read_from(provider);
    }

    fn persist(&self, provider: &dyn ConfigProvider) {
        self.write_to(provider);
    }
}

enum WriteScope {
    Transaction(#[allow(dead_code)] ChangeTransaction),
    Lock(#[allow(dead_code)] Option<crate::WriteGuard>),
}

/// A handle type generated for a schema.
///
/// Generated handles are cheap to clone; clones refer to the same store.
pub trait GeneratedStore: Clone + Send + Sync + 'static {
    /// The wrapped schema.
    type Schema: StoreHooks;

    /// Wrap a core.
    fn from_core(core: Arc<StoreCore<Self::Schema>>) -> Self;

    /// The wrapped core.
    fn core(&self) -> &Arc<StoreCore<Self::Schema>>;

    /// Create a store holding the schema default.
    fn create(parent: Option<&StoreLink>) -> Self {
        Self::from_value(<Self::Schema as Default>::default(), parent)
    }

    /// Create a store holding `value`.
    fn from_value(value: Self::Schema, parent: Option<&StoreLink>) -> Self {
        Self::from_core(StoreCore::new(value, parent))
    }

    /// The store's node in its graph.
    fn link(&self) -> &StoreLink {
        self.core().link()
    }

    /// Encode every member.
    fn serialize(&self) -> Map {
        self.core().serialize()
    }

    /// Decode a tree into the store.
    fn deserialize(&self, value: &Value) {
        self.core().deserialize(value)
    }

    /// Copy every serialized member of `source` into the store.
    fn copy_from(&self, source: &Self::Schema, use_lock: bool) {
        self.core().copy_from(source, use_lock)
    }

    /// Copy the store out into a plain value.
    fn snapshot(&self) -> Self::Schema {
        self.core().snapshot()
    }

    /// Signal a change.
    fn changed(&self) {
        self.core().changed()
    }

    /// Open a change transaction on the store's graph.
    fn change_transaction(&self) -> StoreResult<ChangeTransaction> {
        self.link().change_transaction()
    }

    /// Whether two handles refer to the same store.
    fn same_store(&self, other: &Self) -> bool {
        Arc::ptr_eq(self.core(), other.core())
    }
}

/// Object-safe view of a store used by providers and registries.
pub trait ConfigStore: Send + Sync {
    /// Signal set once after any committed change.
    fn read_signal(&self) -> ChangeSignal;

    /// The graph's reader/writer lock.
    fn write_lock(&self) -> StoreLock;

    /// Reload the whole graph from a provider.
    ///
    /// Called on a nested store, this reloads the root store of its graph.
    fn read_from(&self, provider: &dyn ConfigProvider);

    /// Persist the whole graph to a provider.
    ///
    /// Called on a nested store, this persists the root store of its graph.
    fn write_to(&self, provider: &dyn ConfigProvider);
}

impl<S: GeneratedStore> ConfigStore for S {
    fn read_signal(&self) -> ChangeSignal {
        self.link().signal()
    }

    fn write_lock(&self) -> StoreLock {
        self.link().lock()
    }

    fn read_from(&self, provider: &dyn ConfigProvider) {
        match self.link().shared().root_entry() {
            Some(root) => root.reload(provider),
            None => self.core().read_from(provider),
        }
    }

    fn write_to(&self, provider: &dyn ConfigProvider) {
        match self.link().shared().root_entry() {
            Some(root) => root.persist(provider),
            None => self.core().write_to(provider),
        }
    }
}
