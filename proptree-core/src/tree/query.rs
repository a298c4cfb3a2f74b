//! Read accessors. Dead nodes read as `None`.

use std::sync::Arc;

use super::arena::NodeId;
use super::engine::PropTxn;
use super::node::Payload;
use super::path::Segment;
use super::value::PropValue;

impl PropTxn<'_> {
    /// The ultimate originator of `id`, or `id` itself when it aliases nothing.
    pub fn follow(&self, id: NodeId) -> NodeId {
        let mut cursor = id;
        while let Some(next) = self.node(cursor).and_then(|n| n.originator) {
            cursor = next;
        }
        cursor
    }

    /// The node `id` directly aliases.
    pub fn originator(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).and_then(|n| n.originator)
    }

    /// Nodes aliasing `id`.
    pub fn alias_targets(&self, id: NodeId) -> Vec<NodeId> {
        self.node(id)
            .map(|n| n.targets.to_vec())
            .unwrap_or_default()
    }

    /// Whether two nodes resolve to the same node through their aliases.
    pub fn same_target(&self, a: NodeId, b: NodeId) -> bool {
        self.is_alive(a) && self.follow(a) == self.follow(b)
    }

    /// Snapshot of the value `id` resolves to.
    pub fn value(&self, id: NodeId) -> Option<PropValue> {
        self.node(self.follow(id)).map(|n| PropValue::of(&n.payload))
    }

    pub fn get_int(&self, id: NodeId) -> Option<i32> {
        match self.node(self.follow(id)).map(|n| &n.payload)? {
            Payload::Int { value, .. } => Some(*value),
            Payload::Float { value, .. } => Some(*value as i32),
            _ => None,
        }
    }

    pub fn get_float(&self, id: NodeId) -> Option<f32> {
        match self.node(self.follow(id)).map(|n| &n.payload)? {
            Payload::Int { value, .. } => Some(*value as f32),
            Payload::Float { value, .. } => Some(*value),
            _ => None,
        }
    }

    pub fn get_str(&self, id: NodeId) -> Option<Arc<str>> {
        match self.node(self.follow(id)).map(|n| &n.payload)? {
            Payload::Str(s) => Some(s.shared()),
            _ => None,
        }
    }

    /// Clamp range of a numeric node, widened to `f32`.
    pub fn clamp_range(&self, id: NodeId) -> Option<(f32, f32)> {
        match self.node(self.follow(id)).map(|n| &n.payload)? {
            Payload::Int { clamp, .. } => clamp.map(|(lo, hi)| (lo as f32, hi as f32)),
            Payload::Float { clamp, .. } => *clamp,
            _ => None,
        }
    }

    pub fn is_dir(&self, id: NodeId) -> bool {
        self.node(self.follow(id))
            .is_some_and(|n| n.payload.is_dir())
    }

    pub fn name(&self, id: NodeId) -> Option<Arc<str>> {
        self.node(id).and_then(|n| n.name.clone())
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).and_then(|n| n.parent)
    }

    /// Stable snapshot of the children `id` resolves to.
    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        self.node(self.follow(id))
            .map(|n| n.children().to_vec())
            .unwrap_or_default()
    }

    pub fn first_child(&self, id: NodeId) -> Option<NodeId> {
        self.node(self.follow(id))
            .and_then(|n| n.children().first().copied())
    }

    /// The child at `index` of the directory `id` resolves to.
    pub fn child_at(&self, id: NodeId, index: usize) -> Option<NodeId> {
        self.node(self.follow(id))
            .and_then(|n| n.children().get(index).copied())
    }

    pub fn child_count(&self, id: NodeId) -> usize {
        self.node(self.follow(id)).map_or(0, |n| n.children().len())
    }

    /// Names of the named children, in order.
    pub fn child_names(&self, id: NodeId) -> Vec<Arc<str>> {
        self.children(id)
            .into_iter()
            .filter_map(|c| self.name(c))
            .collect()
    }

    /// The selected child of a directory.
    pub fn selected(&self, id: NodeId) -> Option<NodeId> {
        self.node(self.follow(id))
            .and_then(|n| n.payload.dir())
            .and_then(|d| d.selected)
    }

    pub(crate) fn child_by_name(&self, parent: NodeId, name: &str) -> Option<NodeId> {
        self.node(parent)?
            .children()
            .iter()
            .copied()
            .find(|c| self.node(*c).and_then(|n| n.name.as_deref()) == Some(name))
    }

    /// Look a path up without creating nodes or following aliases.
    pub fn find<S: AsRef<str>>(&self, id: NodeId, names: &[S]) -> Option<NodeId> {
        names
            .iter()
            .try_fold(id, |node, name| self.child_by_name(node, name.as_ref()))
    }

    /// Look a path up, following aliases at every level.
    pub fn find_follow<S: AsRef<str>>(&self, id: NodeId, names: &[S]) -> Option<NodeId> {
        let found = names.iter().try_fold(id, |node, name| {
            self.child_by_name(self.follow(node), name.as_ref())
        })?;
        Some(self.follow(found))
    }

    /// Resolve segments, following aliases and honouring `*N` indices.
    pub fn resolve(&self, id: NodeId, segments: &[Segment]) -> Option<NodeId> {
        let found = segments.iter().try_fold(id, |node, segment| {
            let node = self.follow(node);
            match segment {
                Segment::Name(name) => self.child_by_name(node, name),
                Segment::Index(index) => self.node(node)?.children().get(*index).copied(),
            }
        })?;
        Some(self.follow(found))
    }

    /// Dotted name from the topmost ancestor down to `id`.
    ///
    /// Unnamed nodes appear as `*N`, their position under the parent.
    pub fn dn(&self, id: NodeId) -> String {
        let mut parts = Vec::new();
        let mut cursor = Some(id);
        while let Some(node_id) = cursor {
            let Some(node) = self.node(node_id) else {
                break;
            };
            let part = match (&node.name, node.parent) {
                (Some(name), _) => name.to_string(),
                (None, Some(parent)) => {
                    let pos = self
                        .node(parent)
                        .and_then(|p| p.children().iter().position(|c| *c == node_id))
                        .unwrap_or(0);
                    format!("*{pos}")
                }
                (None, None) => "*".to_string(),
            };
            parts.push(part);
            cursor = node.parent;
        }
        parts.reverse();
        parts.join(".")
    }
}

#[cfg(test)]
mod tests {
    use crate::tree::{PropTree, Segment};

    #[test]
    fn find_does_not_create() {
        let tree = PropTree::default();
        tree.with(|txn| {
            let root = txn.create_root(None);
            let a = txn.create_child(root, Some("a")).unwrap();
            let b = txn.create_child(a, Some("b")).unwrap();
            assert_eq!(txn.find(root, &["a", "b"]), Some(b));
            assert_eq!(txn.find(root, &["a", "zz"]), None);
            assert_eq!(txn.children(a), vec![b]);
        });
    }

    #[test]
    fn resolve_supports_indices() {
        let tree = PropTree::default();
        tree.with(|txn| {
            let root = txn.create_root(None);
            let list = txn.create_child(root, Some("list")).unwrap();
            let _first = txn.create_child(list, None).unwrap();
            let second = txn.create_child(list, None).unwrap();
            let segs = [Segment::from("list"), Segment::Index(1)];
            assert_eq!(txn.resolve(root, &segs), Some(second));
            let missing = [Segment::from("list"), Segment::Index(7)];
            assert_eq!(txn.resolve(root, &missing), None);
        });
    }

    #[test]
    fn dn_names_the_path() {
        let tree = PropTree::default();
        tree.with(|txn| {
            let root = txn.create_root(Some("app"));
            let items = txn.create_child(root, Some("items")).unwrap();
            txn.create_child(items, None).unwrap();
            let second = txn.create_child(items, None).unwrap();
            assert_eq!(txn.dn(second), "app.items.*1");
        });
    }

    #[test]
    fn dead_nodes_read_as_none() {
        let tree = PropTree::default();
        tree.with(|txn| {
            let root = txn.create_root(None);
            let a = txn.create_child(root, Some("a")).unwrap();
            txn.set_int(a, 4);
            txn.destroy(a);
            assert_eq!(txn.value(a), None);
            assert_eq!(txn.get_int(a), None);
            assert!(txn.children(a).is_empty());
        });
    }
}
