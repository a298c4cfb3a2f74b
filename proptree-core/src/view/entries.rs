//! Bookkeeping shared by the adapters.

use std::sync::Arc;

use crate::subscription::{PropEvent, SubId, SubscribeOptions};
use crate::tree::{NodeId, PropTxn, PropValue};

/// Entries owned by an adapter, addressed by slot.
///
/// Lookups by node go through the tag store; the slots only let the owner
/// reach every entry when a source goes away.
pub(super) struct Slots<T> {
    items: Vec<Option<Arc<T>>>,
    free: Vec<usize>,
}

impl<T> Slots<T> {
    pub(super) fn new() -> Self {
        Self {
            items: Vec::new(),
            free: Vec::new(),
        }
    }

    /// The slot the next [`insert`](Self::insert) will use.
    pub(super) fn vacant(&self) -> usize {
        self.free.last().copied().unwrap_or(self.items.len())
    }

    pub(super) fn insert(&mut self, item: Arc<T>) -> usize {
        match self.free.pop() {
            Some(slot) => {
                self.items[slot] = Some(item);
                slot
            }
            None => {
                self.items.push(Some(item));
                self.items.len() - 1
            }
        }
    }

    pub(super) fn remove(&mut self, slot: usize) -> Option<Arc<T>> {
        let item = self.items.get_mut(slot)?.take()?;
        self.free.push(slot);
        Some(item)
    }

    pub(super) fn drain(&mut self) -> Vec<Arc<T>> {
        self.free.clear();
        std::mem::take(&mut self.items).into_iter().flatten().collect()
    }

    pub(super) fn len(&self) -> usize {
        self.items.len() - self.free.len()
    }
}

/// Scalar carried by a value event. Directories and references count as void.
pub(super) fn key_of(event: &PropEvent) -> Option<PropValue> {
    Some(match event {
        PropEvent::SetVoid | PropEvent::SetDir | PropEvent::SetRef(_) => PropValue::Void,
        PropEvent::SetStr(s) => PropValue::Str(s.clone()),
        PropEvent::SetInt(v) => PropValue::Int(*v),
        PropEvent::SetFloat(v) => PropValue::Float(*v),
        _ => return None,
    })
}

/// Watch the value at `path` below `child` with an inline subscription.
///
/// `on_key` runs once right away with the current value when the path
/// resolves, then on every change.
pub(super) fn watch_key<F>(txn: &mut PropTxn<'_>, child: NodeId, path: &str, on_key: F) -> Option<SubId>
where
    F: Fn(&mut PropTxn<'_>, PropValue) + Send + Sync + 'static,
{
    let options = SubscribeOptions::new()
        .named_root(&txn.prop(child), "item")
        .path_str(&format!("item.{path}"))
        .on_inline(move |txn, event| {
            if let Some(key) = key_of(event) {
                on_key(txn, key);
            }
        });
    match txn.subscribe(options) {
        Ok(sub) => Some(sub.detach()),
        Err(err) => {
            tracing::warn!(%child, %err, "cannot watch view key");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slots_reuse_freed_positions() {
        let mut slots = Slots::new();
        let a = slots.insert(Arc::new('a'));
        let b = slots.insert(Arc::new('b'));
        assert_eq!((a, b), (0, 1));

        assert_eq!(slots.remove(a).as_deref(), Some(&'a'));
        assert!(slots.remove(a).is_none());
        assert_eq!(slots.vacant(), a);
        assert_eq!(slots.insert(Arc::new('c')), a);
        assert_eq!(slots.len(), 2);

        let mut drained: Vec<char> = slots.drain().iter().map(|c| **c).collect();
        drained.sort();
        assert_eq!(drained, vec!['b', 'c']);
        assert_eq!(slots.len(), 0);
    }
}
