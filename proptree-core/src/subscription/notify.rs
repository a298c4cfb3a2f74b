//! Fan-out of changes to subscriptions.
//!
//! Every mutation ends in one of two walks: [`notify_value`] for a value
//! change, which goes to the node's value subscriptions, and
//! [`notify_event`] for structural events, which go to the same set. Each
//! subscription then gets the event inline or through its courier.
//!
//! Walks iterate over a snapshot. An inline callback may mutate the tree,
//! including the node being walked; a nested value change bumps the node's
//! sequence number and the outer walk stops handing out its now stale
//! value, since the nested walk already delivered the newer one.
//!
//! [`notify_value`]: PropTxn::notify_value
//! [`notify_event`]: PropTxn::notify_event

use std::sync::Arc;

use super::callback::Callback;
use super::event::PropEvent;
use super::flags::SubFlags;
use super::shared::{SubId, SubShared};
use crate::courier::Notification;
use crate::tree::{NodeFlags, NodeId, Payload, PropTxn};

/// Notifications held back while an alias is replaced.
///
/// Only entries whose subscription was not rebound again by the new alias
/// are delivered when the queue is flushed.
#[derive(Default)]
pub(crate) struct PendingQueue {
    entries: Vec<(SubId, PropEvent)>,
}

impl PropTxn<'_> {
    /// The value event describing `node`'s current payload.
    pub(crate) fn value_event(&self, node: NodeId) -> PropEvent {
        match self.node(node).map(|n| &n.payload) {
            None | Some(Payload::Void) => PropEvent::SetVoid,
            Some(Payload::Dir(_)) => PropEvent::SetDir,
            Some(Payload::Str(s)) => PropEvent::SetStr(s.clone()),
            Some(Payload::Int { value, .. }) => PropEvent::SetInt(*value),
            Some(Payload::Float { value, .. }) => PropEvent::SetFloat(*value),
            Some(Payload::Ref(target)) => PropEvent::SetRef(self.prop(*target)),
        }
    }

    fn bound_to(&self, sid: SubId, node: NodeId) -> bool {
        self.state
            .subs
            .get(&sid)
            .is_some_and(|s| s.value == Some(node))
    }

    /// Tell every value subscriber of `node` about its new value.
    pub(crate) fn notify_value(&mut self, node: NodeId) {
        let Some(n) = self.node_mut(node) else {
            return;
        };
        n.seq += 1;
        let seq = n.seq;
        let subs = n.value_subs.clone();
        let multi = n.flags.contains(NodeFlags::MULTI_NOTIFY);

        for sid in subs {
            if self.node(node).map(|n| n.seq) != Some(seq) {
                break;
            }
            if Some(sid) == self.skip || !self.bound_to(sid, node) {
                continue;
            }
            self.notify_value_to(sid, node, false, None);
        }

        if multi {
            self.notify_multi(node);
        }
    }

    /// Send `node`'s value to one subscription.
    pub(crate) fn notify_value_to(
        &mut self,
        sid: SubId,
        node: NodeId,
        direct: bool,
        pending: Option<&mut PendingQueue>,
    ) {
        let event = self.value_event(node);
        let ignore_void = self
            .state
            .subs
            .get(&sid)
            .is_some_and(|s| s.flags().contains(SubFlags::IGNORE_VOID));
        if ignore_void && matches!(event, PropEvent::SetVoid) {
            return;
        }
        self.deliver(sid, event, direct, pending);
    }

    /// Send a structural event to every value subscriber of `node`.
    pub(crate) fn notify_event(&mut self, node: NodeId, event: PropEvent) {
        let Some(subs) = self.node(node).map(|n| n.value_subs.clone()) else {
            return;
        };
        for sid in subs {
            if Some(sid) == self.skip || !self.bound_to(sid, node) {
                continue;
            }
            self.deliver(sid, event.clone(), false, None);
        }
    }

    /// Ping multi subscriptions on the ancestors of `node`.
    fn notify_multi(&mut self, node: NodeId) {
        let mut cursor = self.parent(node);
        while let Some(up) = cursor {
            let Some(n) = self.node(up) else {
                break;
            };
            if n.flags.contains(NodeFlags::MULTI_SUB) {
                let subs: Vec<SubId> = n
                    .value_subs
                    .iter()
                    .copied()
                    .filter(|sid| {
                        self.state
                            .subs
                            .get(sid)
                            .is_some_and(|s| s.flags().contains(SubFlags::MULTI))
                    })
                    .collect();
                for sid in subs {
                    if Some(sid) != self.skip {
                        self.notify_value_to(sid, up, false, None);
                    }
                }
            }
            cursor = self.parent(up);
        }
    }

    /// Replay a directory's children as `AddChild` events.
    pub(crate) fn replay_children(
        &mut self,
        sid: SubId,
        node: NodeId,
        direct: bool,
        mut pending: Option<&mut PendingQueue>,
    ) {
        let (children, selected) = match self.node(node).and_then(|n| n.payload.dir()) {
            Some(dir) => (dir.children.clone(), dir.selected),
            None => return,
        };
        for child in children {
            let event = PropEvent::AddChild {
                child: self.prop(child),
                selected: selected == Some(child),
            };
            self.deliver(sid, event, direct, pending.as_deref_mut());
        }
    }

    /// Hand one event to one subscription.
    ///
    /// With a pending queue the event is held back. Otherwise inline
    /// subscriptions, and `direct` deliveries, run the callback right here;
    /// everything else is appended to the subscription's courier.
    pub(crate) fn deliver(
        &mut self,
        sid: SubId,
        event: PropEvent,
        direct: bool,
        pending: Option<&mut PendingQueue>,
    ) {
        let Some(shared) = self.state.subs.get(&sid).map(|s| s.shared.clone()) else {
            return;
        };
        if shared.is_zombie() {
            return;
        }
        if shared.flags.contains(SubFlags::DEBUG) {
            tracing::debug!(sub = %sid, ?event, direct, "property event");
        }
        if let Some(pending) = pending {
            pending.entries.push((sid, event));
            return;
        }
        match &shared.courier {
            Some(courier) if !direct => {
                let expedite = shared.flags.contains(SubFlags::EXPEDITE)
                    || (matches!(event, PropEvent::Destroyed)
                        && shared.flags.contains(SubFlags::TRACK_DESTROY_EXPEDITE));
                courier.enqueue(Notification::new(shared.clone(), event), expedite);
            }
            _ => self.invoke_inline(&shared, &event),
        }
    }

    fn invoke_inline(&mut self, shared: &Arc<SubShared>, event: &PropEvent) {
        match &shared.callback {
            Callback::Inline(f) => {
                let f = f.clone();
                f(self, event);
            }
            callback => callback.invoke(event),
        }
    }

    /// Release held-back notifications for subscriptions still waiting on them.
    pub(crate) fn flush_pending(&mut self, pending: PendingQueue) {
        let mut touched = Vec::with_capacity(pending.entries.len());
        for (sid, event) in pending.entries {
            let waiting = self
                .state
                .subs
                .get(&sid)
                .is_some_and(|s| s.pending_unlink);
            if waiting {
                self.deliver(sid, event, false, None);
            } else {
                tracing::trace!(sub = %sid, "dropping superseded relink notification");
            }
            touched.push(sid);
        }
        for sid in touched {
            if let Some(state) = self.state.subs.get_mut(&sid) {
                state.pending_unlink = false;
            }
        }
    }

    /// Refresh the monitor and multi marks of `node` from its value set.
    pub(crate) fn recompute_flags(&mut self, node: NodeId) {
        let Some(n) = self.node(node) else {
            return;
        };
        let mut monitored = false;
        let mut multi = false;
        for sid in &n.value_subs {
            if let Some(state) = self.state.subs.get(sid) {
                monitored |= state.flags().contains(SubFlags::MONITOR);
                multi |= state.flags().contains(SubFlags::MULTI);
            }
        }
        if let Some(n) = self.node_mut(node) {
            n.flags.set(NodeFlags::MONITORED, monitored);
            n.flags.set(NodeFlags::MULTI_SUB, multi);
        }
        if multi {
            self.flood_multi_notify(node);
        }
    }

    fn flood_multi_notify(&mut self, node: NodeId) {
        for child in self.node(node).map(|n| n.children().to_vec()).unwrap_or_default() {
            if let Some(c) = self.node_mut(child) {
                if c.flags.contains(NodeFlags::MULTI_NOTIFY) {
                    continue;
                }
                c.flags |= NodeFlags::MULTI_NOTIFY;
            }
            self.flood_multi_notify(child);
        }
    }

    /// Wake monitor subscriptions once an ordinary subscriber is bound to `node`.
    pub(crate) fn monitor_check(&mut self, node: NodeId) {
        let Some(n) = self.node(node) else {
            return;
        };
        if !n.flags.contains(NodeFlags::MONITORED) {
            return;
        }
        let subs = n.value_subs.clone();
        let is_monitor = |txn: &Self, sid: &SubId| {
            txn.state
                .subs
                .get(sid)
                .is_some_and(|s| s.flags().contains(SubFlags::MONITOR))
        };
        if subs.iter().all(|sid| is_monitor(self, sid)) {
            return;
        }
        for sid in subs {
            if is_monitor(self, &sid) {
                self.deliver(sid, PropEvent::SubscriptionMonitorActive, false, None);
            }
        }
    }
}
