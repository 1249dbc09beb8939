//! Arena of connected stores.
//!
//! Every store belongs to exactly one [`StoreGraph`]. The graph records the
//! parent of each store by index, and only the root node carries the
//! [`SharedState`] (lock, change signal and root change hook). Finding the
//! shared state is a walk of parent indices to the root.
//!
//! Nodes are never removed while the graph lives. A nested store that is
//! cleared and later recreated leaves its old node behind, unreachable.

use crate::store::RootEntry;
use crate::{ChangeSignal, ChangeTransaction, StoreLock, StoreResult, WriteGuard};
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, Weak};

/// Index of a store inside its graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StoreId(usize);

impl StoreId {
    /// The raw arena index.
    #[inline]
    pub fn index(&self) -> usize {
        self.0
    }
}

type ChangedHook = Arc<dyn Fn() + Send + Sync>;

/// Lock and notification primitives owned by the root of a graph.
#[derive(Default)]
pub struct SharedState {
    lock: StoreLock,
    signal: ChangeSignal,
    changed: RwLock<Option<ChangedHook>>,
    root: RwLock<Option<Weak<dyn RootEntry>>>,
}

impl SharedState {
    /// The graph's reader/writer lock.
    pub fn lock(&self) -> &StoreLock {
        &self.lock
    }

    /// The graph's change signal.
    pub fn signal(&self) -> &ChangeSignal {
        &self.signal
    }

    pub(crate) fn set_changed_hook(&self, hook: impl Fn() + Send + Sync + 'static) {
        *self.changed.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(hook));
    }

    pub(crate) fn set_root(&self, root: Weak<dyn RootEntry>) {
        *self.root.write().unwrap_or_else(PoisonError::into_inner) = Some(root);
    }

    /// The root store, while it is alive.
    pub(crate) fn root_entry(&self) -> Option<Arc<dyn RootEntry>> {
        self.root
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .and_then(Weak::upgrade)
    }

    /// Fire the change signal, then the root store's change hook.
    pub fn notify_changed(&self) {
        self.signal.set();
        let hook = self
            .changed
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(hook) = hook {
            hook();
        }
    }

    /// Take the write lock unless the current thread already owns it.
    ///
    /// Returns `None` when the call is nested inside an existing write.
    pub fn write_scope(&self) -> StoreResult<Option<WriteGuard>> {
        if self.lock.is_write_held_by_current_thread() {
            Ok(None)
        } else {
            self.lock.write().map(Some)
        }
    }
}

impl fmt::Debug for SharedState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedState")
            .field("lock", &self.lock)
            .field("signal", &self.signal)
            .finish()
    }
}

enum NodeOwner {
    Root(Arc<SharedState>),
    Child(StoreId),
}

struct StoreNode {
    schema: &'static str,
    owner: NodeOwner,
}

/// Arena holding every store node of one connected graph.
#[derive(Default)]
pub struct StoreGraph {
    nodes: RwLock<Vec<StoreNode>>,
}

impl StoreGraph {
    fn push(&self, schema: &'static str, owner: NodeOwner) -> StoreId {
        let mut nodes = self.nodes.write().unwrap_or_else(PoisonError::into_inner);
        nodes.push(StoreNode { schema, owner });
        StoreId(nodes.len() - 1)
    }

    /// Number of nodes ever allocated in this graph.
    pub fn len(&self) -> usize {
        self.nodes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Check whether the graph has no nodes.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Handle to one store node: the graph plus the node's index.
#[derive(Clone)]
pub struct StoreLink {
    graph: Arc<StoreGraph>,
    id: StoreId,
}

impl StoreLink {
    /// Create a new graph whose root node is for `schema`.
    pub fn new_root(schema: &'static str) -> Self {
        let graph = Arc::new(StoreGraph::default());
        let id = graph.push(schema, NodeOwner::Root(Arc::new(SharedState::default())));
        Self { graph, id }
    }

    /// Add a child node under this one.
    pub fn new_child(&self, schema: &'static str) -> Self {
        let id = self.graph.push(schema, NodeOwner::Child(self.id));
        Self {
            graph: Arc::clone(&self.graph),
            id,
        }
    }

    /// Attach a node for `schema` under `parent`, or start a new graph.
    pub fn attach(schema: &'static str, parent: Option<&StoreLink>) -> Self {
        match parent {
            Some(parent) => parent.new_child(schema),
            None => Self::new_root(schema),
        }
    }

    /// The node's index.
    pub fn id(&self) -> StoreId {
        self.id
    }

    /// The graph this node belongs to.
    pub fn graph(&self) -> &Arc<StoreGraph> {
        &self.graph
    }

    /// The schema name recorded for this node.
    pub fn schema_name(&self) -> &'static str {
        self.graph.nodes.read().unwrap_or_else(PoisonError::into_inner)[self.id.0].schema
    }

    fn parent_id(&self) -> Option<StoreId> {
        match self.graph.nodes.read().unwrap_or_else(PoisonError::into_inner)[self.id.0].owner {
            NodeOwner::Root(_) => None,
            NodeOwner::Child(parent) => Some(parent),
        }
    }

    /// Whether this node is the root of its graph.
    pub fn is_root(&self) -> bool {
        self.parent_id().is_none()
    }

    /// The parent node, if any.
    pub fn parent(&self) -> Option<StoreLink> {
        self.parent_id().map(|id| StoreLink {
            graph: Arc::clone(&self.graph),
            id,
        })
    }

    /// The root node of the graph.
    pub fn root(&self) -> StoreLink {
        let nodes = self.graph.nodes.read().unwrap_or_else(PoisonError::into_inner);
        let mut id = self.id;
        while let NodeOwner::Child(parent) = nodes[id.0].owner {
            id = parent;
        }
        StoreLink {
            graph: Arc::clone(&self.graph),
            id,
        }
    }

    /// Number of parent links between this node and the root.
    pub fn depth(&self) -> usize {
        let nodes = self.graph.nodes.read().unwrap_or_else(PoisonError::into_inner);
        let mut id = self.id;
        let mut depth = 0;
        while let NodeOwner::Child(parent) = nodes[id.0].owner {
            id = parent;
            depth += 1;
        }
        depth
    }

    /// The graph's shared state, found at the root.
    pub fn shared(&self) -> Arc<SharedState> {
        let nodes = self.graph.nodes.read().unwrap_or_else(PoisonError::into_inner);
        let mut id = self.id;
        loop {
            match &nodes[id.0].owner {
                NodeOwner::Root(shared) => return Arc::clone(shared),
                NodeOwner::Child(parent) => id = *parent,
            }
        }
    }

    /// The graph's lock.
    pub fn lock(&self) -> StoreLock {
        self.shared().lock().clone()
    }

    /// The graph's change signal.
    pub fn signal(&self) -> ChangeSignal {
        self.shared().signal().clone()
    }

    /// Open a change transaction on the graph.
    pub fn change_transaction(&self) -> StoreResult<ChangeTransaction> {
        ChangeTransaction::begin(self.shared())
    }

    /// Whether two links name the same node of the same graph.
    pub fn ptr_eq(&self, other: &StoreLink) -> bool {
        Arc::ptr_eq(&self.graph, &other.graph) && self.id == other.id
    }
}

impl fmt::Debug for StoreLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreLink")
            .field("id", &self.id)
            .field("schema", &self.schema_name())
            .finish()
    }
}
