//! The engine handle and its locked transaction.
//!
//! # Locking
//!
//! Every engine owns one mutex around its [`TreeState`]. All tree shape and
//! value mutations, and every change to the subscription sets, run while it
//! is held. The public API takes the lock through [`PropTree::with`], which
//! hands out a [`PropTxn`]; inline subscription callbacks receive that same
//! transaction and re-enter the tree through it.
//!
//! Taking the lock a second time on the same thread would deadlock. The
//! engine records which trees the current thread holds and panics instead,
//! naming the transaction as the way back in.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;
use smallvec::SmallVec;

use super::arena::{Arena, NodeId};
use super::handle::Prop;
use super::node::Node;
use crate::config::EngineConfig;
use crate::courier::{Courier, CourierInner};
use crate::error::{PropError, Result};
use crate::subscription::{SubId, SubState, SubscribeOptions, Subscription};
use crate::tags::TagStore;

thread_local! {
    static HELD: RefCell<SmallVec<[usize; 2]>> = RefCell::new(SmallVec::new());
}

struct HeldGuard(usize);

impl HeldGuard {
    fn enter(key: usize) -> Self {
        HELD.with(|held| held.borrow_mut().push(key));
        Self(key)
    }
}

impl Drop for HeldGuard {
    fn drop(&mut self) {
        HELD.with(|held| {
            let mut held = held.borrow_mut();
            if let Some(pos) = held.iter().rposition(|k| *k == self.0) {
                held.remove(pos);
            }
        });
    }
}

/// Work run under the tree lock once the current lock scope ends.
pub(crate) type Deferred = Box<dyn FnOnce(&mut PropTxn<'_>) + Send>;

/// Everything guarded by the tree lock.
pub(crate) struct TreeState {
    pub(crate) nodes: Arena<Node>,
    pub(crate) subs: HashMap<SubId, SubState>,
}

pub(crate) struct Shared {
    pub(crate) state: Mutex<TreeState>,
    pub(crate) tags: TagStore,
    pub(crate) config: EngineConfig,
    pub(crate) global: NodeId,
    pub(crate) default_courier: OnceLock<Courier>,
    /// Subscriptions dropped while their thread held the tree lock.
    pub(crate) orphans: Mutex<Vec<SubId>>,
    /// Teardown of other handles dropped under the lock.
    pub(crate) deferred: Mutex<Vec<Deferred>>,
}

/// A property engine.
///
/// Cloning is cheap and yields another handle to the same tree.
#[derive(Clone)]
pub struct PropTree {
    pub(crate) shared: Arc<Shared>,
}

impl PropTree {
    /// Create an engine with its own global root.
    pub fn new(config: EngineConfig) -> Self {
        let mut nodes = Arena::new();
        let global = nodes.insert(Node::new(Some(Arc::from(config.global_name.as_str()))));
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(TreeState {
                    nodes,
                    subs: HashMap::new(),
                }),
                tags: TagStore::new(),
                config,
                global,
                default_courier: OnceLock::new(),
                orphans: Mutex::new(Vec::new()),
                deferred: Mutex::new(Vec::new()),
            }),
        }
    }

    /// The process-wide engine.
    pub fn global() -> &'static PropTree {
        static GLOBAL: OnceLock<PropTree> = OnceLock::new();
        GLOBAL.get_or_init(PropTree::default)
    }

    /// Run `f` with the tree lock held.
    ///
    /// # Panics
    ///
    /// Panics when the current thread already holds this tree's lock, which
    /// happens when an inline callback calls back into the locking API
    /// instead of using the transaction it was given.
    pub fn with<R>(&self, f: impl FnOnce(&mut PropTxn<'_>) -> R) -> R {
        assert!(
            !self.held_here(),
            "property tree lock re-entered; use the PropTxn passed to the callback"
        );
        let mut state = self.shared.state.lock();
        let _held = HeldGuard::enter(self.key());
        let mut txn = PropTxn {
            tree: self,
            state: &mut state,
            skip: None,
        };
        let out = f(&mut txn);
        txn.reap_orphans();
        out
    }

    /// Whether the current thread holds this tree's lock.
    pub fn held_here(&self) -> bool {
        let key = self.key();
        HELD.with(|held| held.borrow().contains(&key))
    }

    fn key(&self) -> usize {
        Arc::as_ptr(&self.shared) as *const () as usize
    }

    /// Handle to a node of this tree. The id may be stale.
    pub fn prop(&self, id: NodeId) -> Prop {
        Prop::new(self.clone(), id)
    }

    /// The global root.
    pub fn global_root(&self) -> Prop {
        self.prop(self.shared.global)
    }

    /// Create a detached root node.
    pub fn create_root(&self, name: Option<&str>) -> Prop {
        let id = self.with(|txn| txn.create_root(name));
        self.prop(id)
    }

    /// Register a subscription.
    pub fn subscribe(&self, options: SubscribeOptions) -> Result<Subscription> {
        self.with(|txn| txn.subscribe(options))
    }

    /// The tag store of this engine.
    pub fn tags(&self) -> &TagStore {
        &self.shared.tags
    }

    pub fn config(&self) -> &EngineConfig {
        &self.shared.config
    }

    /// Number of live nodes, including the global root.
    pub fn node_count(&self) -> usize {
        self.with(|txn| txn.state.nodes.len())
    }

    /// Number of live subscriptions.
    pub fn subscription_count(&self) -> usize {
        self.with(|txn| txn.state.subs.len())
    }

    /// Render a subtree, see [`PropTxn::dump`].
    pub fn dump(&self, id: NodeId) -> String {
        self.with(|txn| txn.dump(id))
    }

    /// The engine's default thread courier, started on first use.
    pub(crate) fn default_courier(&self) -> Result<Arc<CourierInner>> {
        if let Some(courier) = self.shared.default_courier.get() {
            return Ok(courier.inner().clone());
        }
        let config = &self.shared.config;
        let courier = Courier::thread_for(&config.default_courier_name, config)?;
        // A racing thread may have won; its courier is kept and ours shuts down.
        let _ = self.shared.default_courier.set(courier);
        let courier = self
            .shared
            .default_courier
            .get()
            .ok_or_else(|| PropError::Config("default courier unavailable".into()))?;
        Ok(courier.inner().clone())
    }

    pub(crate) fn same_tree(&self, other: &PropTree) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }

    /// Queue an unsubscribe for the end of the current lock scope.
    pub(crate) fn defer_unsubscribe(&self, id: SubId) {
        self.shared.orphans.lock().push(id);
    }

    /// Queue `task` for the end of the current lock scope.
    pub(crate) fn defer(&self, task: impl FnOnce(&mut PropTxn<'_>) + Send + 'static) {
        self.shared.deferred.lock().push(Box::new(task));
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        for (_, sub) in self.state.get_mut().subs.drain() {
            sub.shared.mark_zombie();
            if let Some(courier) = &sub.shared.courier {
                courier.detach();
            }
        }
    }
}

impl Default for PropTree {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl fmt::Debug for PropTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropTree")
            .field("global", &self.shared.config.global_name)
            .finish()
    }
}

/// The tree with its lock held.
///
/// Obtained from [`PropTree::with`] or passed to inline callbacks. Every
/// operation on it runs under the same lock acquisition, so a sequence of
/// calls is applied atomically with respect to other threads.
pub struct PropTxn<'a> {
    pub(crate) tree: &'a PropTree,
    pub(crate) state: &'a mut TreeState,
    /// Subscription that should not hear about the changes made here.
    pub(crate) skip: Option<SubId>,
}

impl<'a> PropTxn<'a> {
    /// The engine this transaction belongs to.
    pub fn tree(&self) -> &PropTree {
        self.tree
    }

    /// Handle to a node.
    pub fn prop(&self, id: NodeId) -> Prop {
        self.tree.prop(id)
    }

    /// Suppress notifications to `sub` for the following mutations.
    ///
    /// Returns the previous setting so callers can restore it.
    pub fn set_skip(&mut self, sub: Option<SubId>) -> Option<SubId> {
        std::mem::replace(&mut self.skip, sub)
    }

    /// Whether `id` still names a live node.
    pub fn is_alive(&self, id: NodeId) -> bool {
        self.state.nodes.contains(id)
    }

    pub(crate) fn node(&self, id: NodeId) -> Option<&Node> {
        self.state.nodes.get(id)
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.state.nodes.get_mut(id)
    }

    pub(crate) fn global(&self) -> NodeId {
        self.tree.shared.global
    }

    fn reap_orphans(&mut self) {
        loop {
            let orphans = std::mem::take(&mut *self.tree.shared.orphans.lock());
            let deferred = std::mem::take(&mut *self.tree.shared.deferred.lock());
            if orphans.is_empty() && deferred.is_empty() {
                break;
            }
            for id in orphans {
                self.unsubscribe_id(id);
            }
            for task in deferred {
                task(self);
            }
        }
    }
}
