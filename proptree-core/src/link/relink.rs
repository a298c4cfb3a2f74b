//! Moving subscriptions between nodes when aliases change.
//!
//! A subscription bound through an alias remembers every alias node it was
//! diverted through (its origins). Linking pushes the subscriptions of the
//! alias down onto the ultimate originator and records the alias as an
//! origin; unlinking walks the old originator's subtree and brings back
//! exactly the subscriptions whose origins name the broken alias.

use crate::subscription::{PendingQueue, PropEvent, SubFlags, SubId};
use crate::tree::{payloads_equal, NodeId, Payload, PropTxn};

impl PropTxn<'_> {
    /// Rebind every value subscription of `dst` (and of its named
    /// descendants) onto the matching nodes below `src`.
    pub(crate) fn relink_subscriptions(&mut self, src: NodeId, dst: NodeId, prepend: &[NodeId]) {
        if let Some(next) = self.originator(src) {
            let mut chain = prepend.to_vec();
            chain.push(src);
            self.relink_subscriptions(next, dst, &chain);
            return;
        }

        let subs = self
            .node_mut(dst)
            .map(|n| std::mem::take(&mut n.value_subs))
            .unwrap_or_default();
        for sid in subs {
            self.retarget(src, sid, None);
            self.prepend_origins(sid, prepend);
        }
        self.recompute_flags(dst);

        if !self.is_dir_node(dst) {
            return;
        }
        match self.node(src).map(|n| &n.payload) {
            Some(Payload::Dir(_)) => {}
            Some(Payload::Void) => {
                self.make_dir(src);
            }
            _ => return,
        }

        for (child, name) in self.named_children(dst) {
            let Some(twin) = self.create_child(src, Some(&name)) else {
                continue;
            };
            if self.is_dir_node(child) {
                self.make_dir(twin);
            }
            self.relink_subscriptions(twin, child, prepend);
        }
    }

    /// Move one subscription's value binding to `to`.
    ///
    /// The subscription hears the new value only when it differs from the
    /// old one. With `pending` the notifications are held back instead.
    pub(crate) fn retarget(&mut self, to: NodeId, sid: SubId, mut pending: Option<&mut PendingQueue>) {
        let Some(state) = self.state.subs.get(&sid) else {
            return;
        };
        let old = state.value;
        let flags = state.flags();
        if old == Some(to) {
            return;
        }
        let skipped = self.skip == Some(sid);

        let equal = match old {
            Some(old) => {
                let was_dir = self.is_dir_node(old);
                if was_dir && !skipped && !flags.contains(SubFlags::IGNORE_VOID) {
                    self.deliver(sid, PropEvent::SetVoid, false, None);
                }
                if let Some(node) = self.node_mut(old) {
                    node.value_subs.retain(|s| *s != sid);
                }
                payloads_equal(
                    self.node(old).map(|n| &n.payload),
                    self.node(to).map(|n| &n.payload),
                )
            }
            None => false,
        };

        if let Some(node) = self.node_mut(to) {
            node.value_subs.push(sid);
        }
        if let Some(state) = self.state.subs.get_mut(&sid) {
            state.value = Some(to);
        }
        if let Some(old) = old {
            self.recompute_flags(old);
        }
        self.recompute_flags(to);
        self.monitor_check(to);

        if skipped || equal {
            return;
        }
        if let Some(state) = self.state.subs.get_mut(&sid) {
            state.pending_unlink = pending.is_some();
        }
        self.notify_value_to(sid, to, false, pending.as_deref_mut());
        if self.is_dir_node(to) {
            self.replay_children(sid, to, false, pending);
        }
    }

    fn prepend_origins(&mut self, sid: SubId, prepend: &[NodeId]) {
        let Some(state) = self.state.subs.get_mut(&sid) else {
            return;
        };
        for origin in prepend {
            if !state.origins.contains(origin) {
                state.origins.insert(0, *origin);
            }
        }
    }

    /// Whether any subscription at or below `src` was diverted through `link`.
    pub(crate) fn search_for_linkage(&self, src: NodeId, link: NodeId) -> bool {
        let src = self.follow(src);
        let Some(node) = self.node(src) else {
            return false;
        };
        let linked = node.value_subs.iter().any(|sid| {
            self.state
                .subs
                .get(sid)
                .is_some_and(|s| s.origins.contains(&link))
        });
        linked
            || self
                .named_children(src)
                .into_iter()
                .any(|(child, _)| self.search_for_linkage(child, link))
    }

    /// Bring subscriptions diverted through `broken` back from `src` to `dst`.
    pub(crate) fn restore_and_descend(
        &mut self,
        dst: NodeId,
        src: NodeId,
        broken: NodeId,
        mut pending: Option<&mut PendingQueue>,
        prepend: &[NodeId],
    ) {
        let subs = self
            .node(src)
            .map(|n| n.value_subs.clone())
            .unwrap_or_default();
        for sid in subs {
            let Some(state) = self.state.subs.get_mut(&sid) else {
                continue;
            };
            let Some(pos) = state.origins.iter().position(|o| *o == broken) else {
                continue;
            };
            state.origins.remove(pos);
            self.retarget(dst, sid, pending.as_deref_mut());
            self.prepend_origins(sid, prepend);
        }

        if !self.is_dir_node(src) {
            return;
        }
        for (child, name) in self.named_children(src) {
            let target = self.follow(child);
            if !self.search_for_linkage(target, broken) {
                continue;
            }
            let Some(twin) = self.create_child(dst, Some(&name)) else {
                continue;
            };
            if self.is_dir_node(child) {
                self.make_dir(twin);
            }
            self.restore_and_descend(twin, target, broken, pending.as_deref_mut(), prepend);
        }
    }

    pub(crate) fn follow_and_unlink(
        &mut self,
        dst: NodeId,
        src: NodeId,
        pending: Option<&mut PendingQueue>,
        prepend: &[NodeId],
    ) {
        if let Some(next) = self.originator(src) {
            let mut chain = prepend.to_vec();
            chain.push(src);
            self.follow_and_unlink(dst, next, pending, &chain);
            return;
        }
        if self.search_for_linkage(src, dst) {
            self.restore_and_descend(dst, src, dst, pending, prepend);
        }
    }

    /// Break every alias pointing at `id`, innermost first.
    pub(crate) fn unlink_targets(&mut self, id: NodeId) {
        while let Some(target) = self.node(id).and_then(|n| n.targets.first().copied()) {
            self.unlink_targets(target);
            self.unlink0(target, None);
            if let Some(node) = self.node_mut(id) {
                node.targets.retain(|t| *t != target);
            }
        }
    }

    fn is_dir_node(&self, id: NodeId) -> bool {
        self.node(id).is_some_and(|n| n.payload.is_dir())
    }

    fn named_children(&self, id: NodeId) -> Vec<(NodeId, String)> {
        let Some(node) = self.node(id) else {
            return Vec::new();
        };
        node.children()
            .iter()
            .filter_map(|c| {
                let name = self.node(*c)?.name.as_deref()?;
                Some((*c, name.to_string()))
            })
            .collect()
    }
}
