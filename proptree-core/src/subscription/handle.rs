//! The owning handle returned by `subscribe`.

use std::fmt;
use std::sync::Arc;

use super::shared::{SubId, SubShared};
use crate::tree::{Prop, PropTree};

/// A live subscription.
///
/// Dropping the handle unsubscribes. Use [`detach`](Self::detach) to keep
/// the subscription for the lifetime of the tree.
pub struct Subscription {
    tree: PropTree,
    shared: Arc<SubShared>,
    detached: bool,
}

impl Subscription {
    pub(crate) fn new(tree: PropTree, shared: Arc<SubShared>) -> Self {
        Self {
            tree,
            shared,
            detached: false,
        }
    }

    pub fn id(&self) -> SubId {
        self.shared.id
    }

    /// Whether the subscription was removed.
    pub fn is_zombie(&self) -> bool {
        self.shared.is_zombie()
    }

    /// Remove the subscription now.
    pub fn unsubscribe(self) {
        drop(self)
    }

    /// Give up ownership without unsubscribing.
    pub fn detach(mut self) -> SubId {
        self.detached = true;
        self.shared.id
    }

    /// The node whose value the subscription observes.
    ///
    /// Takes the tree lock; inside a callback use the transaction instead.
    pub fn value_node(&self) -> Option<Prop> {
        let id = self.shared.id;
        let value = self
            .tree
            .with(|txn| txn.state.subs.get(&id).and_then(|s| s.value))?;
        Some(self.tree.prop(value))
    }

    /// The node the subscription was registered on.
    pub fn canonical_node(&self) -> Option<Prop> {
        let id = self.shared.id;
        let canonical = self
            .tree
            .with(|txn| txn.state.subs.get(&id).and_then(|s| s.canonical))?;
        Some(self.tree.prop(canonical))
    }

    /// Ask the producer of this subscription's directory for more children.
    pub fn want_more_children(&self) {
        let id = self.shared.id;
        self.tree.with(|txn| txn.want_more_children(id));
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if self.detached || self.shared.is_zombie() {
            return;
        }
        let id = self.shared.id;
        if self.tree.held_here() {
            self.shared.mark_zombie();
            self.tree.defer_unsubscribe(id);
        } else {
            self.tree.with(|txn| txn.unsubscribe_id(id));
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.shared.id)
            .field("zombie", &self.shared.is_zombie())
            .finish()
    }
}
