//! Aliases between nodes.
//!
//! `link(src, dst)` makes `dst` read through to `src`: every subscription
//! bound at or below `dst` is moved onto the matching node below `src`, and
//! scalar reads and writes on `dst` are forwarded. `unlink(dst)` undoes
//! exactly what one link did, even when other aliases were stacked above
//! or below it in the meantime.

mod relink;

use crate::subscription::PendingQueue;
use crate::tree::{NodeFlags, NodeId, PropTxn};

impl PropTxn<'_> {
    /// Make `dst` an alias of `src`.
    ///
    /// An existing alias on `dst` is replaced. Linking a node onto an alias
    /// that already leads back to it panics.
    pub fn link(&mut self, src: NodeId, dst: NodeId) {
        self.link0(src, dst, false);
    }

    /// Like [`link`](Self::link), but `dst` also holds a structural count
    /// on `src` until the alias is removed.
    pub fn link_hard(&mut self, src: NodeId, dst: NodeId) {
        self.link0(src, dst, true);
    }

    fn link0(&mut self, src: NodeId, dst: NodeId, hard: bool) {
        assert_ne!(src, dst, "a node cannot alias itself");
        if !self.is_alive(src) || !self.is_alive(dst) {
            return;
        }
        if self.originator(dst) == Some(src) {
            return;
        }
        assert!(
            !self.alias_chain_contains(src, dst),
            "alias from {} onto {} would form a cycle",
            self.dn(dst),
            self.dn(src)
        );

        let mut pending = PendingQueue::default();
        if self.originator(dst).is_some() {
            self.unlink0(dst, Some(&mut pending));
        }

        if hard {
            if let Some(node) = self.node_mut(dst) {
                node.flags |= NodeFlags::XREFED_ORIGINATOR;
            }
            if let Some(node) = self.node_mut(src) {
                node.xref += 1;
            }
        }
        if let Some(node) = self.node_mut(dst) {
            node.originator = Some(src);
        }
        if let Some(node) = self.node_mut(src) {
            node.targets.push(dst);
        }
        tracing::debug!(src = %src, dst = %dst, hard, "link");

        self.relink_subscriptions(src, dst, &[dst]);
        self.flush_pending(pending);
    }

    /// Remove the alias on `dst`, if any.
    pub fn unlink(&mut self, dst: NodeId) {
        self.unlink0(dst, None);
    }

    pub(crate) fn unlink0(&mut self, dst: NodeId, pending: Option<&mut PendingQueue>) {
        let Some(node) = self.node_mut(dst) else {
            return;
        };
        let Some(src) = node.originator.take() else {
            return;
        };
        let xrefed = node.flags.contains(NodeFlags::XREFED_ORIGINATOR);
        node.flags.remove(NodeFlags::XREFED_ORIGINATOR);
        if let Some(orig) = self.node_mut(src) {
            orig.targets.retain(|t| *t != dst);
        }
        tracing::debug!(src = %src, dst = %dst, "unlink");

        self.follow_and_unlink(dst, src, pending, &[]);
        if xrefed {
            self.destroy0(src);
        }
    }

    fn alias_chain_contains(&self, from: NodeId, needle: NodeId) -> bool {
        let mut cursor = Some(from);
        while let Some(id) = cursor {
            if id == needle {
                return true;
            }
            cursor = self.originator(id);
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use crate::subscription::{PropEvent, SubscribeOptions};
    use crate::tree::PropTree;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicI32, Ordering};
    use std::sync::Arc;

    #[test]
    fn link_moves_subscription_and_unlink_restores_it() {
        let tree = PropTree::default();
        let a = tree.create_root(Some("a"));
        let b = tree.create_root(Some("b"));
        a.create_path("x").unwrap().set_int(1);
        b.create_path("x").unwrap().set_int(2);

        let seen = Arc::new(AtomicI32::new(0));
        let _sub = tree
            .subscribe(
                SubscribeOptions::new()
                    .root(&a)
                    .path_str("a.x")
                    .inline()
                    .store_int(seen.clone()),
            )
            .unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), 1);

        a.link_to(&b);
        assert_eq!(seen.load(Ordering::SeqCst), 2);
        assert_eq!(a.find("x").unwrap().get_int(), Some(1));
        assert_eq!(a.follow(), b);

        a.unlink();
        assert_eq!(seen.load(Ordering::SeqCst), 1);
        assert_eq!(a.follow(), a);
    }

    #[test]
    fn equal_values_are_not_renotified() {
        let tree = PropTree::default();
        let r = tree.create_root(Some("r"));
        let a = r.create_child("a").unwrap();
        let b = r.create_child("b").unwrap();
        a.set_int(5);
        b.set_int(5);

        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let _sub = tree
            .subscribe(
                SubscribeOptions::new()
                    .root(&r)
                    .path_str("r.b")
                    .no_initial_update()
                    .inline()
                    .on_event(move |e| sink.lock().push(format!("{e:?}"))),
            )
            .unwrap();

        b.link_to(&a);
        assert!(events.lock().is_empty());

        a.set_int(6);
        assert_eq!(*events.lock(), vec!["SetInt(6)".to_string()]);
    }

    #[test]
    fn hard_link_keeps_source_alive_until_unlinked() {
        let tree = PropTree::default();
        let src = tree.create_root(Some("src"));
        let dst = tree.create_root(Some("dst"));
        src.set_int(3);

        dst.link_to_hard(&src);
        assert!(!src.destroy());
        assert!(!src.is_zombie());
        assert_eq!(dst.get_int(), Some(3));

        dst.unlink();
        assert!(src.is_zombie());
        assert_eq!(dst.get_int(), None);
    }

    #[test]
    fn destroying_source_unlinks_aliases() {
        let tree = PropTree::default();
        let src = tree.create_root(Some("src"));
        let dst = tree.create_root(Some("dst"));
        dst.link_to(&src);

        src.destroy();
        assert!(!dst.is_zombie());
        assert_eq!(dst.follow(), dst);
    }

    #[test]
    fn relinking_holds_back_superseded_notifications() {
        let tree = PropTree::default();
        let r = tree.create_root(Some("r"));
        let x = r.create_child("x").unwrap();
        let y = r.create_child("y").unwrap();
        let v = r.create_child("v").unwrap();
        x.set_int(1);
        y.set_int(2);
        v.set_int(9);

        v.link_to(&x);
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let _sub = tree
            .subscribe(
                SubscribeOptions::new()
                    .root(&r)
                    .path_str("r.v")
                    .no_initial_update()
                    .inline()
                    .on_event(move |e| {
                        if let PropEvent::SetInt(n) = e {
                            sink.lock().push(*n)
                        }
                    }),
            )
            .unwrap();

        // The intermediate fall-back to v's own value (9) is never seen.
        v.link_to(&y);
        assert_eq!(*events.lock(), vec![2]);
    }

    #[test]
    #[should_panic(expected = "cannot alias itself")]
    fn self_alias_panics() {
        let tree = PropTree::default();
        let r = tree.create_root(Some("r"));
        r.link_to(&r);
    }

    #[test]
    #[should_panic(expected = "would form a cycle")]
    fn alias_cycle_panics() {
        let tree = PropTree::default();
        let a = tree.create_root(Some("a"));
        let b = tree.create_root(Some("b"));
        b.link_to(&a);
        a.link_to(&b);
    }
}
