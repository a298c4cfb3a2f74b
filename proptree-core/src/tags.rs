//! Per-node tags.
//!
//! A tag attaches an arbitrary payload to a node under an owner key, so
//! several independent components can hang their own state off the same
//! node. The store is a concurrent map keyed by node and does not take the
//! tree lock. Tags are not removed when their node dies; owners clear what
//! they set.

use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use smallvec::SmallVec;

use crate::tree::{NodeId, Prop, PropTxn};

/// A tag payload.
pub type TagPayload = Arc<dyn Any + Send + Sync>;

/// Identifies the owner of a tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TagKey(u64);

impl TagKey {
    /// Allocate a key no other owner holds.
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// Owner-keyed payloads attached to nodes.
#[derive(Default)]
pub struct TagStore {
    map: DashMap<NodeId, SmallVec<[(TagKey, TagPayload); 2]>>,
}

impl TagStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach `payload` to `node` under `key`, returning the payload it replaces.
    pub fn set(&self, node: NodeId, key: TagKey, payload: TagPayload) -> Option<TagPayload> {
        let mut entry = self.map.entry(node).or_default();
        match entry.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => Some(std::mem::replace(slot, payload)),
            None => {
                entry.push((key, payload));
                None
            }
        }
    }

    /// The payload `key` attached to `node`, if it has type `T`.
    pub fn get<T: Any + Send + Sync>(&self, node: NodeId, key: TagKey) -> Option<Arc<T>> {
        let entry = self.map.get(&node)?;
        let (_, payload) = entry.iter().find(|(k, _)| *k == key)?;
        payload.clone().downcast().ok()
    }

    pub fn has(&self, node: NodeId, key: TagKey) -> bool {
        self.map
            .get(&node)
            .is_some_and(|entry| entry.iter().any(|(k, _)| *k == key))
    }

    /// Detach and return the payload `key` attached to `node`.
    ///
    /// # Panics
    ///
    /// Panics when no such tag exists.
    pub fn clear(&self, node: NodeId, key: TagKey) -> TagPayload {
        let removed = self.map.get_mut(&node).and_then(|mut entry| {
            let pos = entry.iter().position(|(k, _)| *k == key)?;
            Some(entry.remove(pos).1)
        });
        self.map.remove_if(&node, |_, entry| entry.is_empty());
        match removed {
            Some(payload) => payload,
            None => panic!("tag {key:?} cleared twice or never set on {node}"),
        }
    }

    /// Number of nodes carrying at least one tag.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

impl fmt::Debug for TagStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TagStore").field("nodes", &self.map.len()).finish()
    }
}

impl PropTxn<'_> {
    pub fn tag_set(&self, node: NodeId, key: TagKey, payload: TagPayload) -> Option<TagPayload> {
        self.tree().tags().set(node, key, payload)
    }

    pub fn tag_get<T: Any + Send + Sync>(&self, node: NodeId, key: TagKey) -> Option<Arc<T>> {
        self.tree().tags().get(node, key)
    }

    pub fn tag_clear(&self, node: NodeId, key: TagKey) -> TagPayload {
        self.tree().tags().clear(node, key)
    }

    pub fn tag_has(&self, node: NodeId, key: TagKey) -> bool {
        self.tree().tags().has(node, key)
    }
}

impl Prop {
    /// Attach a tag to this node. See [`TagStore::set`].
    pub fn tag_set<T: Any + Send + Sync>(&self, key: TagKey, payload: T) -> Option<TagPayload> {
        self.tree().tags().set(self.id(), key, Arc::new(payload))
    }

    pub fn tag_get<T: Any + Send + Sync>(&self, key: TagKey) -> Option<Arc<T>> {
        self.tree().tags().get(self.id(), key)
    }

    pub fn tag_clear(&self, key: TagKey) -> TagPayload {
        self.tree().tags().clear(self.id(), key)
    }
}
