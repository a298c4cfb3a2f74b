//! Structural operations: creating, moving, selecting and destroying nodes.

use std::sync::Arc;

use super::arena::NodeId;
use super::engine::PropTxn;
use super::node::{Dir, Node, NodeFlags, Payload};
use crate::subscription::{ExtEvent, PropEvent, SubFlags};

impl PropTxn<'_> {
    /// Create a detached root node.
    pub fn create_root(&mut self, name: Option<&str>) -> NodeId {
        self.state.nodes.insert(Node::new(name.map(Arc::from)))
    }

    /// Find the child called `name`, or append a new one.
    ///
    /// An unnamed child is always created. The parent becomes a directory
    /// if it is not one already; `None` is returned when it is dead or
    /// refuses to change type.
    pub fn create_child(&mut self, parent: NodeId, name: Option<&str>) -> Option<NodeId> {
        self.create_before(parent, name, None)
    }

    /// Like [`create_child`](Self::create_child) but a new node is inserted
    /// right after `after`.
    pub fn create_after(
        &mut self,
        parent: NodeId,
        name: Option<&str>,
        after: NodeId,
    ) -> Option<NodeId> {
        let before = self.node(parent).and_then(|node| {
            let children = node.children();
            let pos = children.iter().position(|c| *c == after)?;
            children.get(pos + 1).copied()
        });
        self.create_before(parent, name, before)
    }

    /// Find-or-create every level of `names` below `parent`.
    pub fn create_path<S: AsRef<str>>(&mut self, parent: NodeId, names: &[S]) -> Option<NodeId> {
        let mut node = parent;
        for name in names {
            node = self.create_child(node, Some(name.as_ref()))?;
        }
        Some(node)
    }

    fn create_before(
        &mut self,
        parent: NodeId,
        name: Option<&str>,
        before: Option<NodeId>,
    ) -> Option<NodeId> {
        if !self.make_dir(parent) {
            return None;
        }
        if let Some(name) = name {
            if let Some(existing) = self.child_by_name(parent, name) {
                return Some(existing);
            }
        }
        let child = self.state.nodes.insert(Node::new(name.map(Arc::from)));
        self.insert_child(parent, child, before, true);
        Some(child)
    }

    /// Turn the node into an empty directory.
    ///
    /// Idempotent. Returns `false` when the node is dead or refuses to drop
    /// its current value.
    pub fn make_dir(&mut self, id: NodeId) -> bool {
        match self.node(id) {
            None => return false,
            Some(node) if node.payload.is_dir() => return true,
            Some(_) => {}
        }
        if !self.clean(id) {
            return false;
        }
        if let Some(node) = self.node_mut(id) {
            node.payload = Payload::Dir(Dir::default());
        }
        self.notify_value(id);
        true
    }

    /// Prepare a node for a change of type.
    ///
    /// Clamped numbers only accept numeric writes, and a directory with a
    /// subscription registered anywhere below it keeps its children.
    pub(crate) fn clean(&mut self, id: NodeId) -> bool {
        let Some(node) = self.node(id) else {
            return false;
        };
        if node.payload.is_clamped() {
            tracing::warn!(node = %id, "refusing to change type of a clamped value");
            return false;
        }
        if !node.payload.is_dir() {
            return true;
        }
        if self.has_canonical_below(id) {
            tracing::warn!(node = %id, "refusing to drop a directory with subscribers");
            return false;
        }
        for child in self.node(id).map(|n| n.children().to_vec()).unwrap_or_default() {
            self.destroy_child(id, child);
        }
        true
    }

    fn has_canonical_below(&self, id: NodeId) -> bool {
        self.node(id).is_some_and(|node| {
            node.children().iter().any(|child| {
                self.node(*child)
                    .is_some_and(|c| !c.canonical_subs.is_empty())
                    || self.has_canonical_below(*child)
            })
        })
    }

    fn insert_child(&mut self, parent: NodeId, child: NodeId, before: Option<NodeId>, notify: bool) {
        let Some(parent_node) = self.state.nodes.get_mut(parent) else {
            return;
        };
        let inherit = parent_node
            .flags
            .intersects(NodeFlags::MULTI_SUB | NodeFlags::MULTI_NOTIFY);
        let Some(dir) = parent_node.payload.dir_mut() else {
            return;
        };
        let pos = before.and_then(|b| dir.children.iter().position(|c| *c == b));
        match pos {
            Some(pos) => dir.children.insert(pos, child),
            None => dir.children.push(child),
        }
        if let Some(node) = self.state.nodes.get_mut(child) {
            node.parent = Some(parent);
            if inherit {
                node.flags |= NodeFlags::MULTI_NOTIFY;
            }
        }
        if notify {
            let event = match pos.and(before) {
                Some(before) => PropEvent::AddChildBefore {
                    child: self.prop(child),
                    before: self.prop(before),
                    selected: false,
                },
                None => PropEvent::AddChild {
                    child: self.prop(child),
                    selected: false,
                },
            };
            self.notify_event(parent, event);
        }
    }

    fn check_not_ancestor(&self, child: NodeId, parent: NodeId) {
        assert_ne!(child, parent, "a node cannot be its own child");
        let mut cursor = self.parent(parent);
        while let Some(up) = cursor {
            assert_ne!(up, child, "a node cannot become its own descendant");
            cursor = self.parent(up);
        }
    }

    fn check_sibling(&self, before: Option<NodeId>, parent: NodeId) -> Option<NodeId> {
        let before = before.filter(|b| self.is_alive(*b))?;
        assert_eq!(
            self.parent(before),
            Some(parent),
            "insertion point belongs to another parent"
        );
        Some(before)
    }

    /// Attach `child` under `parent`, before `before` or at the end.
    ///
    /// A child that already has a parent is detached first.
    pub fn set_parent(&mut self, child: NodeId, parent: NodeId, before: Option<NodeId>) -> bool {
        if !self.is_alive(child) || !self.is_alive(parent) {
            return false;
        }
        self.check_not_ancestor(child, parent);
        let before = self.check_sibling(before, parent);
        if self.parent(child).is_some() {
            self.unparent(child);
        }
        if !self.make_dir(parent) {
            return false;
        }
        self.insert_child(parent, child, before, true);
        true
    }

    /// Attach a batch of children with a single vector event.
    pub fn set_parent_vector(
        &mut self,
        children: &[NodeId],
        parent: NodeId,
        before: Option<NodeId>,
    ) -> bool {
        if !self.is_alive(parent) {
            return false;
        }
        let before = self.check_sibling(before, parent);
        let mut attached = Vec::with_capacity(children.len());
        for &child in children {
            if !self.is_alive(child) {
                continue;
            }
            self.check_not_ancestor(child, parent);
            if self.parent(child).is_some() {
                self.unparent(child);
            }
            attached.push(child);
        }
        if !self.make_dir(parent) {
            return false;
        }
        for &child in &attached {
            self.insert_child(parent, child, before, false);
        }
        if attached.is_empty() {
            return true;
        }
        let props = attached.iter().map(|c| self.prop(*c)).collect();
        let event = match before {
            Some(before) => PropEvent::AddChildVectorBefore {
                children: props,
                before: self.prop(before),
            },
            None => PropEvent::AddChildVector(props),
        };
        self.notify_event(parent, event);
        true
    }

    /// Detach a node from its parent without destroying it.
    pub fn unparent(&mut self, child: NodeId) {
        let Some(parent) = self.parent(child) else {
            return;
        };
        self.notify_event(parent, PropEvent::DelChild(self.prop(child)));
        self.detach(parent, child);
    }

    fn detach(&mut self, parent: NodeId, child: NodeId) {
        if let Some(dir) = self.node_mut(parent).and_then(|n| n.payload.dir_mut()) {
            dir.children.retain(|c| *c != child);
            if dir.selected == Some(child) {
                dir.selected = None;
            }
        }
        if let Some(node) = self.node_mut(child) {
            node.parent = None;
        }
    }

    /// Move `child` before `before` (or to the end) within its parent.
    pub fn move_child(&mut self, child: NodeId, before: Option<NodeId>) {
        let Some(parent) = self.parent(child) else {
            return;
        };
        if before == Some(child) {
            return;
        }
        let before = self.check_sibling(before, parent);
        let Some(dir) = self.node_mut(parent).and_then(|n| n.payload.dir_mut()) else {
            return;
        };
        let Some(pos) = dir.children.iter().position(|c| *c == child) else {
            return;
        };
        if dir.children.get(pos + 1).copied() == before {
            return;
        }
        dir.children.remove(pos);
        match before.and_then(|b| dir.children.iter().position(|c| *c == b)) {
            Some(at) => dir.children.insert(at, child),
            None => dir.children.push(child),
        }
        let event = PropEvent::MoveChild {
            child: self.prop(child),
            before: before.map(|b| self.prop(b)),
        };
        self.notify_event(parent, event);
    }

    /// Drop one structural reference; tear the node down when none remain.
    ///
    /// Returns whether the node was destroyed.
    pub fn destroy(&mut self, id: NodeId) -> bool {
        self.destroy0(id)
    }

    pub(crate) fn destroy0(&mut self, id: NodeId) -> bool {
        let Some(node) = self.node_mut(id) else {
            return false;
        };
        // Zero means teardown is already in progress further up the stack.
        if node.xref == 0 {
            return false;
        }
        node.xref -= 1;
        if node.xref > 0 {
            return false;
        }

        self.unlink_targets(id);

        for child in self.node(id).map(|n| n.children().to_vec()).unwrap_or_default() {
            self.destroy_child(id, child);
        }

        let (canonical, value) = match self.node_mut(id) {
            Some(node) => {
                node.payload = Payload::Void;
                (
                    std::mem::take(&mut node.canonical_subs),
                    std::mem::take(&mut node.value_subs),
                )
            }
            None => return true,
        };

        let mut expired = Vec::new();
        for sid in canonical {
            let Some(state) = self.state.subs.get_mut(&sid) else {
                continue;
            };
            state.canonical = None;
            let flags = state.shared.flags;
            if flags.intersects(SubFlags::TRACK_DESTROY | SubFlags::TRACK_DESTROY_EXPEDITE) {
                self.deliver(sid, PropEvent::Destroyed, false, None);
            }
            if flags.contains(SubFlags::AUTO_DESTROY) {
                expired.push(sid);
            }
        }

        for sid in value {
            let Some(flags) = self.state.subs.get(&sid).map(|s| s.shared.flags) else {
                continue;
            };
            let quiet = SubFlags::TRACK_DESTROY | SubFlags::TRACK_DESTROY_EXPEDITE | SubFlags::IGNORE_VOID;
            if !flags.intersects(quiet) {
                self.deliver(sid, PropEvent::SetVoid, false, None);
            }
            if let Some(state) = self.state.subs.get_mut(&sid) {
                if state.value == Some(id) {
                    state.value = None;
                }
            }
        }

        if let Some(originator) = self.node(id).and_then(|n| n.originator) {
            let xrefed = self
                .node(id)
                .is_some_and(|n| n.flags.contains(NodeFlags::XREFED_ORIGINATOR));
            if let Some(orig) = self.node_mut(originator) {
                orig.targets.retain(|t| *t != id);
            }
            if xrefed {
                self.destroy0(originator);
            }
        }

        if let Some(parent) = self.parent(id) {
            self.notify_event(parent, PropEvent::DelChild(self.prop(id)));
            self.detach(parent, id);
        }

        self.state.nodes.remove(id);
        for sid in expired {
            self.unsubscribe_id(sid);
        }
        true
    }

    fn destroy_child(&mut self, parent: NodeId, child: NodeId) {
        if !self.destroy0(child) && self.parent(child) == Some(parent) {
            self.unparent(child);
        }
    }

    /// Destroy every child of a directory.
    pub fn destroy_children(&mut self, parent: NodeId) {
        for child in self.node(parent).map(|n| n.children().to_vec()).unwrap_or_default() {
            self.destroy_child(parent, child);
        }
    }

    /// Set every child of a directory to void.
    pub fn void_children(&mut self, parent: NodeId) {
        for child in self.node(parent).map(|n| n.children().to_vec()).unwrap_or_default() {
            self.set_void(child);
        }
    }

    /// Destroy the child called `name`, if any.
    pub fn destroy_by_name(&mut self, parent: NodeId, name: &str) -> bool {
        match self.child_by_name(parent, name) {
            Some(child) => {
                self.destroy_child(parent, child);
                true
            }
            None => false,
        }
    }

    /// Destroy the first child, if any.
    pub fn destroy_first(&mut self, parent: NodeId) -> bool {
        match self.node(parent).and_then(|n| n.children().first().copied()) {
            Some(child) => {
                self.destroy_child(parent, child);
                true
            }
            None => false,
        }
    }

    /// Mark every child for a later [`destroy_marked_children`](Self::destroy_marked_children).
    pub fn mark_children(&mut self, parent: NodeId) {
        for child in self.node(parent).map(|n| n.children().to_vec()).unwrap_or_default() {
            if let Some(node) = self.node_mut(child) {
                node.flags |= NodeFlags::MARKED;
            }
        }
    }

    pub fn unmark(&mut self, id: NodeId) {
        if let Some(node) = self.node_mut(id) {
            node.flags -= NodeFlags::MARKED;
        }
    }

    pub fn is_marked(&self, id: NodeId) -> bool {
        self.node(id)
            .is_some_and(|n| n.flags.contains(NodeFlags::MARKED))
    }

    /// Destroy the children still marked since the last `mark_children`.
    pub fn destroy_marked_children(&mut self, parent: NodeId) {
        for child in self.node(parent).map(|n| n.children().to_vec()).unwrap_or_default() {
            if self.is_marked(child) {
                self.destroy_child(parent, child);
            }
        }
    }

    /// Select a child of its parent directory.
    pub fn select(&mut self, child: NodeId, extra: Option<NodeId>) {
        let Some(parent) = self.parent(child) else {
            return;
        };
        if let Some(dir) = self.node_mut(parent).and_then(|n| n.payload.dir_mut()) {
            dir.selected = Some(child);
        }
        let event = PropEvent::SelectChild {
            child: Some(self.prop(child)),
            extra: extra.map(|e| self.prop(e)),
        };
        self.notify_event(parent, event);
    }

    /// Clear the selection of a directory.
    pub fn unselect(&mut self, parent: NodeId) {
        let Some(dir) = self.node_mut(parent).and_then(|n| n.payload.dir_mut()) else {
            return;
        };
        dir.selected = None;
        self.notify_event(
            parent,
            PropEvent::SelectChild {
                child: None,
                extra: None,
            },
        );
    }

    /// Select the first child whose string value equals `value`.
    pub fn select_by_value(&mut self, parent: NodeId, value: &str) -> bool {
        let found = self.node(parent).and_then(|node| {
            node.children().iter().copied().find(|child| {
                self.node(*child)
                    .is_some_and(|c| matches!(&c.payload, Payload::Str(s) if s.as_str() == value))
            })
        });
        match found {
            Some(child) => {
                self.select(child, None);
                true
            }
            None => false,
        }
    }

    /// Ask observers of the parent to move focus to `child`.
    pub fn suggest_focus(&mut self, child: NodeId) {
        if let Some(parent) = self.parent(child) {
            self.notify_event(parent, PropEvent::SuggestFocus(self.prop(child)));
        }
    }

    /// Ask the owner of a directory to create a new child.
    pub fn request_new_child(&mut self, parent: NodeId) {
        if self.is_alive(parent) {
            self.notify_event(parent, PropEvent::ReqNewChild);
        }
    }

    /// Ask the owner of the parent to delete `child`.
    pub fn request_delete(&mut self, child: NodeId) {
        self.request_delete_multi(&[child]);
    }

    /// Ask the owner to delete several siblings at once.
    pub fn request_delete_multi(&mut self, children: &[NodeId]) {
        let Some(parent) = children.first().and_then(|c| self.parent(*c)) else {
            return;
        };
        let props = children
            .iter()
            .filter(|c| self.parent(**c) == Some(parent))
            .map(|c| self.prop(*c))
            .collect();
        self.notify_event(parent, PropEvent::ReqDeleteVector(props));
    }

    /// Ask the owner of the parent to move `child` before `before`.
    pub fn request_move(&mut self, child: NodeId, before: Option<NodeId>) {
        let Some(parent) = self.parent(child) else {
            return;
        };
        let event = PropEvent::ReqMoveChild {
            child: self.prop(child),
            before: before.map(|b| self.prop(b)),
        };
        self.notify_event(parent, event);
    }

    /// Tell observers whether the producer can supply more children.
    pub fn have_more_children(&mut self, parent: NodeId, more: bool) {
        if self.is_alive(parent) {
            self.notify_event(parent, PropEvent::HaveMoreChildren(more));
        }
    }

    /// Send an application event to the node's subscribers.
    pub fn send_ext_event(&mut self, id: NodeId, event: ExtEvent) {
        if self.is_alive(id) {
            self.notify_event(id, PropEvent::External(event));
        }
    }
}
