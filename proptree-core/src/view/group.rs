//! Grouping a directory by a key below each child.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use super::entries::{watch_key, Slots};
use crate::error::{PropError, Result};
use crate::subscription::{PropEvent, SubId, SubscribeOptions};
use crate::tags::TagKey;
use crate::tree::{split_path, NodeId, Prop, PropTree, PropTxn, PropValue};

struct Group {
    root: NodeId,
    nodes: NodeId,
    members: usize,
}

struct Member {
    child: NodeId,
    slot: usize,
    state: Mutex<MemberState>,
}

struct MemberState {
    group: Option<Arc<str>>,
    out: Option<NodeId>,
    key_sub: Option<SubId>,
    live: bool,
}

struct GroupState {
    groups: HashMap<Arc<str>, Group>,
    members: Slots<Member>,
    sub: Option<SubId>,
}

struct GroupShared {
    dest: NodeId,
    path: String,
    tag: TagKey,
    state: Mutex<GroupState>,
    closed: AtomicBool,
}

/// Sorts the children of a source directory into one group per key value.
///
/// The destination gets one unnamed node per distinct key, in the order the
/// keys first appeared. Each group node has a `name` string holding the key
/// and a `nodes` directory with one node aliased onto every member. A child
/// whose key changes moves to the matching group; a group disappears with
/// its last member. Children with a void or missing key belong to no group.
///
/// Integer keys group by their decimal text, floats by six decimals.
pub struct GroupedView {
    tree: PropTree,
    shared: Arc<GroupShared>,
}

impl GroupedView {
    pub fn new(dest: &Prop, source: &Prop, key_path: &str) -> Result<Self> {
        split_path(key_path)?;
        let tree = dest.tree().clone();
        let shared = Arc::new(GroupShared {
            dest: dest.id(),
            path: key_path.to_string(),
            tag: TagKey::new(),
            state: Mutex::new(GroupState {
                groups: HashMap::new(),
                members: Slots::new(),
                sub: None,
            }),
            closed: AtomicBool::new(false),
        });
        tree.with(|txn| -> Result<()> {
            if !txn.make_dir(shared.dest) {
                return Err(PropError::DeadRoot);
            }
            let grouper = shared.clone();
            let subscribed = txn.subscribe(
                SubscribeOptions::new()
                    .root(source)
                    .track_destruction()
                    .on_inline(move |txn, event| grouper.on_source_event(txn, event)),
            );
            match subscribed {
                Ok(sub) => {
                    shared.state.lock().sub = Some(sub.detach());
                    Ok(())
                }
                Err(err) => {
                    shared.close(txn);
                    Err(err)
                }
            }
        })?;
        Ok(Self { tree, shared })
    }

    pub fn dest(&self) -> Prop {
        self.tree.prop(self.shared.dest)
    }

    pub fn group_count(&self) -> usize {
        self.shared.state.lock().groups.len()
    }

    /// The `nodes` directory of the group named `name`.
    pub fn group(&self, name: &str) -> Option<Prop> {
        let nodes = self.shared.state.lock().groups.get(name)?.nodes;
        Some(self.tree.prop(nodes))
    }

    pub fn close(self) {
        drop(self)
    }

    pub fn close_in(self, txn: &mut PropTxn<'_>) {
        self.shared.close(txn);
    }
}

impl Drop for GroupedView {
    fn drop(&mut self) {
        if self.shared.closed.load(Ordering::Acquire) {
            return;
        }
        let shared = self.shared.clone();
        if self.tree.held_here() {
            self.tree.defer(move |txn| shared.close(txn));
        } else {
            self.tree.with(|txn| shared.close(txn));
        }
    }
}

impl fmt::Debug for GroupedView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GroupedView")
            .field("dest", &self.shared.dest)
            .field("key", &self.shared.path)
            .field("groups", &self.group_count())
            .finish()
    }
}

/// Group name for a key, or `None` when the key places the child nowhere.
fn group_name(key: &PropValue) -> Option<Arc<str>> {
    match key {
        PropValue::Str(s) => Some(s.shared()),
        PropValue::Int(v) => Some(Arc::from(v.to_string())),
        PropValue::Float(v) => Some(Arc::from(format!("{v:.6}"))),
        _ => None,
    }
}

impl GroupShared {
    fn on_source_event(self: &Arc<Self>, txn: &mut PropTxn<'_>, event: &PropEvent) {
        if self.closed.load(Ordering::Acquire) {
            return;
        }
        match event {
            PropEvent::AddChild { child, .. } | PropEvent::AddChildBefore { child, .. } => {
                self.add_member(txn, child.id());
            }
            PropEvent::AddChildVector(children)
            | PropEvent::AddChildVectorBefore { children, .. } => {
                for child in children {
                    self.add_member(txn, child.id());
                }
            }
            PropEvent::DelChild(child) => self.remove_member(txn, child.id()),
            PropEvent::SetVoid | PropEvent::Destroyed => self.clear(txn),
            _ => {}
        }
    }

    fn add_member(self: &Arc<Self>, txn: &mut PropTxn<'_>, child: NodeId) {
        if txn.tag_has(child, self.tag) {
            return;
        }
        let member = {
            let mut state = self.state.lock();
            let member = Arc::new(Member {
                child,
                slot: state.members.vacant(),
                state: Mutex::new(MemberState {
                    group: None,
                    out: None,
                    key_sub: None,
                    live: true,
                }),
            });
            state.members.insert(member.clone());
            member
        };
        txn.tag_set(child, self.tag, member.clone());

        let grouper = Arc::downgrade(self);
        let watched = member.clone();
        let key_sub = watch_key(txn, child, &self.path, move |txn, key| {
            if let Some(grouper) = grouper.upgrade() {
                grouper.regroup(txn, &watched, group_name(&key));
            }
        });
        member.state.lock().key_sub = key_sub;
    }

    /// Move `member` to the group `name`, or out of every group.
    fn regroup(&self, txn: &mut PropTxn<'_>, member: &Member, name: Option<Arc<str>>) {
        if self.closed.load(Ordering::Acquire) {
            return;
        }
        let (previous, out) = {
            let mut state = member.state.lock();
            if !state.live || state.group == name {
                return;
            }
            (std::mem::replace(&mut state.group, name.clone()), state.out.take())
        };
        if let Some(out) = out {
            txn.destroy(out);
        }
        if let Some(previous) = previous {
            self.leave(txn, &previous);
        }
        let Some(name) = name else {
            return;
        };
        let Some(nodes) = self.join(txn, &name) else {
            return;
        };
        let out = txn.create_root(None);
        txn.link(member.child, out);
        txn.set_parent(out, nodes, None);
        member.state.lock().out = Some(out);
    }

    /// Count a member into the group `name`, creating the group if needed.
    fn join(&self, txn: &mut PropTxn<'_>, name: &Arc<str>) -> Option<NodeId> {
        {
            let mut state = self.state.lock();
            if let Some(group) = state.groups.get_mut(name) {
                group.members += 1;
                return Some(group.nodes);
            }
        }
        let root = txn.create_child(self.dest, None)?;
        let label = txn.create_child(root, Some("name"))?;
        txn.set_shared_str(label, name.clone());
        let nodes = txn.create_child(root, Some("nodes"))?;
        txn.make_dir(nodes);
        tracing::trace!(dest = %self.dest, group = %name, "group created");
        self.state.lock().groups.insert(
            name.clone(),
            Group {
                root,
                nodes,
                members: 1,
            },
        );
        Some(nodes)
    }

    fn leave(&self, txn: &mut PropTxn<'_>, name: &Arc<str>) {
        let emptied = {
            let mut state = self.state.lock();
            let Some(group) = state.groups.get_mut(name) else {
                return;
            };
            group.members -= 1;
            if group.members > 0 {
                return;
            }
            state.groups.remove(name).map(|g| g.root)
        };
        if let Some(root) = emptied {
            txn.destroy(root);
        }
    }

    fn remove_member(&self, txn: &mut PropTxn<'_>, child: NodeId) {
        if !txn.tag_has(child, self.tag) {
            return;
        }
        let Ok(member) = txn.tag_clear(child, self.tag).downcast::<Member>() else {
            return;
        };
        self.state.lock().members.remove(member.slot);
        self.release(txn, &member);
    }

    fn release(&self, txn: &mut PropTxn<'_>, member: &Member) {
        let (group, out, key_sub) = {
            let mut state = member.state.lock();
            state.live = false;
            (state.group.take(), state.out.take(), state.key_sub.take())
        };
        if let Some(sub) = key_sub {
            txn.unsubscribe_id(sub);
        }
        if let Some(out) = out {
            txn.destroy(out);
        }
        if let Some(group) = group {
            self.leave(txn, &group);
        }
    }

    fn clear(&self, txn: &mut PropTxn<'_>) {
        let members = self.state.lock().members.drain();
        for member in members {
            if txn.tag_has(member.child, self.tag) {
                txn.tag_clear(member.child, self.tag);
            }
            self.release(txn, &member);
        }
    }

    fn close(&self, txn: &mut PropTxn<'_>) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let sub = self.state.lock().sub.take();
        if let Some(sub) = sub {
            txn.unsubscribe_id(sub);
        }
        self.clear(txn);
        let leftover: Vec<NodeId> = self
            .state
            .lock()
            .groups
            .drain()
            .map(|(_, group)| group.root)
            .collect();
        for root in leftover {
            txn.destroy(root);
        }
        tracing::debug!(dest = %self.dest, "grouped view closed");
    }
}
