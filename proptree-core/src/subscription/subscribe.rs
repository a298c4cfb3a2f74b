//! Registering and removing subscriptions.

use std::sync::Arc;

use smallvec::SmallVec;

use super::event::PropEvent;
use super::flags::SubFlags;
use super::handle::Subscription;
use super::options::SubscribeOptions;
use super::shared::{SubId, SubShared, SubState};
use crate::error::{PropError, Result};
use crate::tree::{NodeFlags, NodeId, Payload, Prop, PropTxn, Segment};

impl PropTxn<'_> {
    /// Register a subscription.
    ///
    /// The path is resolved greedily: missing children are created and void
    /// nodes along the way become directories. A scalar in the way leaves
    /// the subscription unbound, which is not an error.
    pub fn subscribe(&mut self, options: SubscribeOptions) -> Result<Subscription> {
        let SubscribeOptions {
            roots,
            path,
            path_error,
            callback,
            courier,
            lock,
            flags,
            allow_index,
        } = options;

        if let Some(err) = path_error {
            return Err(err);
        }
        let callback = callback.ok_or(PropError::MissingCallback)?;

        for (root, _) in &roots {
            assert!(
                root.tree().same_tree(self.tree),
                "subscription root belongs to another property tree"
            );
            if !self.is_alive(root.id()) {
                return Err(PropError::DeadRoot);
            }
        }

        let (start, rest) = match &path {
            Some(path) => {
                let (first, rest) = path.split_first().ok_or(PropError::NoRoot)?;
                (self.resolve_root(first, &roots)?, rest)
            }
            None => {
                let (root, _) = roots.first().ok_or(PropError::NoRoot)?;
                (root.id(), &[][..])
            }
        };

        let segments: Vec<Segment> = rest
            .iter()
            .map(|s| Segment::parse(s, allow_index))
            .collect();
        let mut origins = SmallVec::new();
        let canonical = self.subfind(start, &segments, false, None);
        let value = self.subfind(start, &segments, true, Some(&mut origins));

        if flags.contains(SubFlags::SINGLETON) {
            if let Some(node) = value.and_then(|v| self.node(v)) {
                let taken = node.value_subs.iter().any(|sid| {
                    self.state
                        .subs
                        .get(sid)
                        .is_some_and(|s| s.shared.callback.same(&callback))
                });
                if taken {
                    return Err(PropError::AlreadySubscribed);
                }
            }
        }

        let courier = if flags.contains(SubFlags::INLINE) {
            None
        } else {
            Some(match courier {
                Some(courier) => courier,
                None => self.tree.default_courier()?,
            })
        };
        if let Some(courier) = &courier {
            courier.attach();
        }

        let id = SubId::next();
        let shared = Arc::new(SubShared::new(id, flags, callback, lock, courier));
        self.state.subs.insert(
            id,
            SubState {
                shared: shared.clone(),
                value,
                canonical,
                origins,
                pending_unlink: false,
            },
        );
        tracing::trace!(sub = %id, ?canonical, ?value, "subscribed");

        if let Some(node) = canonical.and_then(|c| self.node_mut(c)) {
            node.canonical_subs.push(id);
            if flags.contains(SubFlags::MONITOR) {
                node.flags |= NodeFlags::MONITORED;
            }
        }

        if let Some(value) = value {
            if let Some(node) = self.node_mut(value) {
                node.value_subs.push(id);
            }
            self.recompute_flags(value);

            if !flags.contains(SubFlags::NO_INITIAL_UPDATE) {
                let direct = flags.backlog_is_direct();
                self.notify_value_to(id, value, direct, None);
                if !flags.contains(SubFlags::MULTI) {
                    self.replay_children(id, value, direct, None);
                }
            }

            if flags.contains(SubFlags::MONITOR) {
                if self.has_ordinary_subscriber(value) {
                    self.deliver(id, PropEvent::SubscriptionMonitorActive, false, None);
                }
            } else {
                self.monitor_check(value);
            }
        }

        if canonical.is_none() && flags.contains(SubFlags::TRACK_DESTROY) {
            self.deliver(id, PropEvent::Destroyed, false, None);
        }

        Ok(Subscription::new(self.tree.clone(), shared))
    }

    fn resolve_root(&self, name: &str, roots: &[(Prop, Option<String>)]) -> Result<NodeId> {
        if let Some((root, _)) = roots.iter().find(|(_, alias)| alias.as_deref() == Some(name)) {
            return Ok(root.id());
        }
        if let Some((root, _)) = roots
            .iter()
            .find(|(root, _)| self.name(root.id()).as_deref() == Some(name))
        {
            return Ok(root.id());
        }
        if name == self.tree.config().global_name {
            return Ok(self.global());
        }
        Err(PropError::UnknownRoot(name.to_string()))
    }

    /// Walk `segments` from `root`, creating what is missing.
    ///
    /// With `follow` set, aliases are followed at every step and each alias
    /// passed is recorded in `origins`.
    pub(crate) fn subfind(
        &mut self,
        root: NodeId,
        segments: &[Segment],
        follow: bool,
        mut origins: Option<&mut SmallVec<[NodeId; 4]>>,
    ) -> Option<NodeId> {
        let mut cursor = root;
        for segment in segments {
            if follow {
                cursor = self.follow_recording(cursor, origins.as_deref_mut());
            }
            let payload = &self.node(cursor)?.payload;
            let (is_dir, is_void) = (payload.is_dir(), matches!(payload, Payload::Void));
            if is_void {
                if let Some(node) = self.node_mut(cursor) {
                    node.payload = Payload::Dir(Default::default());
                }
                self.notify_value(cursor);
            } else if !is_dir {
                if let Some(origins) = origins.as_deref_mut() {
                    origins.clear();
                }
                return None;
            }
            cursor = match segment {
                Segment::Index(index) => match self.node(cursor)?.children().get(*index) {
                    Some(child) => *child,
                    None => {
                        if let Some(origins) = origins.as_deref_mut() {
                            origins.clear();
                        }
                        return None;
                    }
                },
                Segment::Name(name) => match self.child_by_name(cursor, name) {
                    Some(child) => child,
                    None => self.create_child(cursor, Some(name))?,
                },
            };
        }
        if follow {
            cursor = self.follow_recording(cursor, origins);
        }
        Some(cursor)
    }

    fn follow_recording(
        &self,
        mut cursor: NodeId,
        mut origins: Option<&mut SmallVec<[NodeId; 4]>>,
    ) -> NodeId {
        while let Some(next) = self.originator(cursor) {
            if let Some(origins) = origins.as_deref_mut() {
                origins.push(cursor);
            }
            cursor = next;
        }
        cursor
    }

    fn has_ordinary_subscriber(&self, node: NodeId) -> bool {
        self.node(node).is_some_and(|n| {
            n.value_subs.iter().any(|sid| {
                self.state
                    .subs
                    .get(sid)
                    .is_some_and(|s| !s.flags().contains(SubFlags::MONITOR))
            })
        })
    }

    /// Remove a subscription. Its queued notifications are dropped unseen.
    pub fn unsubscribe(&mut self, sub: Subscription) {
        let id = sub.detach();
        self.unsubscribe_id(id);
    }

    pub(crate) fn unsubscribe_id(&mut self, id: SubId) {
        let Some(state) = self.state.subs.remove(&id) else {
            return;
        };
        state.shared.mark_zombie();
        if let Some(courier) = &state.shared.courier {
            courier.detach();
        }
        if let Some(node) = state.canonical.and_then(|c| self.node_mut(c)) {
            node.canonical_subs.retain(|s| *s != id);
        }
        if let Some(value) = state.value {
            if let Some(node) = self.node_mut(value) {
                node.value_subs.retain(|s| *s != id);
            }
            self.recompute_flags(value);
        }
        tracing::trace!(sub = %id, "unsubscribed");
    }

    /// Ask the producer behind `sub` for more children.
    pub fn want_more_children(&mut self, sub: SubId) {
        let Some(value) = self.state.subs.get(&sub).and_then(|s| s.value) else {
            return;
        };
        let prev = self.set_skip(Some(sub));
        self.notify_event(value, PropEvent::WantMoreChildren);
        self.set_skip(prev);
    }
}
