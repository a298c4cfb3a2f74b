//! Node handles.
//!
//! A [`Prop`] names one node of one engine. Every method takes the tree lock
//! for the duration of the call; use [`PropTree::with`] to batch several
//! operations under one acquisition.

use std::fmt;
use std::sync::Arc;

use super::arena::NodeId;
use super::engine::PropTree;
use super::value::PropValue;
use crate::subscription::ExtEvent;

/// Handle to a node. Holding it does not keep the node alive.
#[derive(Clone)]
pub struct Prop {
    tree: PropTree,
    id: NodeId,
}

impl Prop {
    pub(crate) fn new(tree: PropTree, id: NodeId) -> Self {
        Self { tree, id }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn tree(&self) -> &PropTree {
        &self.tree
    }

    /// Whether the node has been destroyed.
    pub fn is_zombie(&self) -> bool {
        !self.tree.with(|txn| txn.is_alive(self.id))
    }

    pub fn name(&self) -> Option<Arc<str>> {
        self.tree.with(|txn| txn.name(self.id))
    }

    pub fn parent(&self) -> Option<Prop> {
        let parent = self.tree.with(|txn| txn.parent(self.id))?;
        Some(self.tree.prop(parent))
    }

    pub fn value(&self) -> Option<PropValue> {
        self.tree.with(|txn| txn.value(self.id))
    }

    pub fn get_int(&self) -> Option<i32> {
        self.tree.with(|txn| txn.get_int(self.id))
    }

    pub fn get_float(&self) -> Option<f32> {
        self.tree.with(|txn| txn.get_float(self.id))
    }

    pub fn get_str(&self) -> Option<Arc<str>> {
        self.tree.with(|txn| txn.get_str(self.id))
    }

    pub fn children(&self) -> Vec<Prop> {
        let ids = self.tree.with(|txn| txn.children(self.id));
        ids.into_iter().map(|id| self.tree.prop(id)).collect()
    }

    pub fn child_names(&self) -> Vec<Arc<str>> {
        self.tree.with(|txn| txn.child_names(self.id))
    }

    /// Find-or-create a named child.
    pub fn create_child(&self, name: &str) -> Option<Prop> {
        let id = self.tree.with(|txn| txn.create_child(self.id, Some(name)))?;
        Some(self.tree.prop(id))
    }

    /// Append an unnamed child.
    pub fn create_anonymous(&self) -> Option<Prop> {
        let id = self.tree.with(|txn| txn.create_child(self.id, None))?;
        Some(self.tree.prop(id))
    }

    /// Find-or-create a dotted path below this node.
    pub fn create_path(&self, path: &str) -> Option<Prop> {
        let names: Vec<&str> = path.split('.').collect();
        let id = self.tree.with(|txn| txn.create_path(self.id, &names))?;
        Some(self.tree.prop(id))
    }

    /// Look up a dotted path without creating or following aliases.
    pub fn find(&self, path: &str) -> Option<Prop> {
        let names: Vec<&str> = path.split('.').collect();
        let id = self.tree.with(|txn| txn.find(self.id, &names))?;
        Some(self.tree.prop(id))
    }

    pub fn set_int(&self, value: i32) {
        self.tree.with(|txn| txn.set_int(self.id, value));
    }

    pub fn add_int(&self, delta: i32) {
        self.tree.with(|txn| txn.add_int(self.id, delta));
    }

    pub fn toggle_int(&self) {
        self.tree.with(|txn| txn.toggle_int(self.id));
    }

    pub fn set_int_clamp(&self, min: i32, max: i32) {
        self.tree.with(|txn| txn.set_int_clamp(self.id, min, max));
    }

    pub fn set_float(&self, value: f32) {
        self.tree.with(|txn| txn.set_float(self.id, value));
    }

    pub fn add_float(&self, delta: f32) {
        self.tree.with(|txn| txn.add_float(self.id, delta));
    }

    pub fn set_float_clamp(&self, min: f32, max: f32) {
        self.tree.with(|txn| txn.set_float_clamp(self.id, min, max));
    }

    pub fn set_str(&self, text: &str) {
        self.tree.with(|txn| txn.set_str(self.id, text));
    }

    pub fn set_rich_str(&self, text: &str) {
        self.tree.with(|txn| txn.set_rich_str(self.id, text));
    }

    pub fn set_shared_str(&self, text: Arc<str>) {
        self.tree.with(|txn| txn.set_shared_str(self.id, text));
    }

    pub fn set_void(&self) {
        self.tree.with(|txn| txn.set_void(self.id));
    }

    pub fn set_ref(&self, target: Option<&Prop>) {
        self.tree
            .with(|txn| txn.set_ref(self.id, target.map(Prop::id)));
    }

    pub fn set_value(&self, value: PropValue) {
        self.tree.with(|txn| txn.set_value(self.id, value));
    }

    pub fn make_dir(&self) -> bool {
        self.tree.with(|txn| txn.make_dir(self.id))
    }

    pub fn copy_from(&self, src: &Prop) {
        self.tree.with(|txn| txn.copy(self.id, src.id));
    }

    pub fn destroy(&self) -> bool {
        self.tree.with(|txn| txn.destroy(self.id))
    }

    pub fn destroy_children(&self) {
        self.tree.with(|txn| txn.destroy_children(self.id));
    }

    pub fn unparent(&self) {
        self.tree.with(|txn| txn.unparent(self.id));
    }

    pub fn set_parent(&self, parent: &Prop, before: Option<&Prop>) -> bool {
        self.tree
            .with(|txn| txn.set_parent(self.id, parent.id, before.map(Prop::id)))
    }

    pub fn move_before(&self, before: Option<&Prop>) {
        self.tree
            .with(|txn| txn.move_child(self.id, before.map(Prop::id)));
    }

    pub fn select(&self) {
        self.tree.with(|txn| txn.select(self.id, None));
    }

    pub fn suggest_focus(&self) {
        self.tree.with(|txn| txn.suggest_focus(self.id));
    }

    pub fn send_ext_event(&self, event: ExtEvent) {
        self.tree.with(|txn| txn.send_ext_event(self.id, event));
    }

    /// Make this node an alias of `src`.
    pub fn link_to(&self, src: &Prop) {
        self.tree.with(|txn| txn.link(src.id, self.id));
    }

    /// Make this node an alias of `src`, holding a structural count on it.
    pub fn link_to_hard(&self, src: &Prop) {
        self.tree.with(|txn| txn.link_hard(src.id, self.id));
    }

    /// Remove this node's alias.
    pub fn unlink(&self) {
        self.tree.with(|txn| txn.unlink(self.id));
    }

    /// The ultimate originator of this node.
    pub fn follow(&self) -> Prop {
        let id = self.tree.with(|txn| txn.follow(self.id));
        self.tree.prop(id)
    }

    /// Whether both handles resolve to the same node.
    pub fn same_target(&self, other: &Prop) -> bool {
        self.tree.same_tree(&other.tree) && self.tree.with(|txn| txn.same_target(self.id, other.id))
    }

    pub fn dn(&self) -> String {
        self.tree.with(|txn| txn.dn(self.id))
    }
}

impl PartialEq for Prop {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.tree.same_tree(&other.tree)
    }
}

impl Eq for Prop {}

impl fmt::Debug for Prop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Prop({:?})", self.id)
    }
}
