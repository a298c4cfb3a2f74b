//! The flat derived-view adapter.
//!
//! The destination holds exactly the visible entries, source by source:
//! the block of source `s` starts after the visible entries of every
//! earlier source. Each source keeps a count of its visible entries, so a
//! block boundary is a sum and an index into the destination directory.

use std::cmp::Ordering as KeyOrdering;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use super::entries::{watch_key, Slots};
use super::transform::{Identity, ViewTransform};
use crate::error::Result;
use crate::subscription::{PropEvent, SubId, SubscribeOptions};
use crate::tags::TagKey;
use crate::tree::{NodeId, Prop, PropTree, PropTxn, PropValue};

/// One mirrored source child, tagged on both the child and its
/// destination node.
struct ViewEntry {
    child: NodeId,
    out: NodeId,
    source: usize,
    slot: usize,
    state: Mutex<EntryState>,
}

struct EntryState {
    key: PropValue,
    key_sub: Option<SubId>,
    /// Placement decisions start once the key watcher is set up, and stop
    /// when the entry is released.
    ready: bool,
    visible: bool,
}

struct SourceState {
    root: NodeId,
    tag: TagKey,
    sub: Option<SubId>,
    entries: Slots<ViewEntry>,
    visible: usize,
}

struct ViewShared {
    dest: NodeId,
    transform: Box<dyn ViewTransform>,
    sources: Mutex<Vec<SourceState>>,
    closed: AtomicBool,
}

/// Keeps a destination directory in sync with one or more source directories.
///
/// Every visible source child is mirrored by one unnamed destination node
/// aliased onto it, so subscribers of the destination see the child's full
/// subtree. Children of several sources are concatenated in the order the
/// sources were added; within a source the [`ViewTransform`] filters and
/// orders them.
///
/// The destination must be owned by the view. Dropping the view (or
/// [`close`](Self::close)) removes the mirrored nodes.
pub struct DerivedView {
    tree: PropTree,
    shared: Arc<ViewShared>,
}

/// Configures a [`DerivedView`].
pub struct DerivedViewBuilder {
    dest: Prop,
    sources: Vec<Prop>,
    transform: Box<dyn ViewTransform>,
}

impl DerivedViewBuilder {
    /// Append a source directory.
    pub fn source(mut self, source: &Prop) -> Self {
        self.sources.push(source.clone());
        self
    }

    pub fn transform(mut self, transform: impl ViewTransform) -> Self {
        self.transform = Box::new(transform);
        self
    }

    /// Subscribe to the sources and populate the destination.
    pub fn build(self) -> Result<DerivedView> {
        let tree = self.dest.tree().clone();
        let shared = Arc::new(ViewShared {
            dest: self.dest.id(),
            transform: self.transform,
            sources: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        });
        tree.with(|txn| {
            let attached = shared.attach_sources(txn, &self.sources);
            if attached.is_err() {
                shared.close(txn);
            }
            attached
        })?;
        tracing::debug!(dest = %shared.dest, sources = self.sources.len(), "derived view built");
        Ok(DerivedView { tree, shared })
    }
}

impl DerivedView {
    pub fn builder(dest: &Prop) -> DerivedViewBuilder {
        DerivedViewBuilder {
            dest: dest.clone(),
            sources: Vec::new(),
            transform: Box::new(Identity),
        }
    }

    pub fn dest(&self) -> Prop {
        self.tree.prop(self.shared.dest)
    }

    /// Number of source children tracked, shown or not.
    pub fn entry_count(&self) -> usize {
        self.shared.sources.lock().iter().map(|s| s.entries.len()).sum()
    }

    /// Unsubscribe, clear tags and destroy the mirrored nodes.
    pub fn close(self) {
        drop(self)
    }

    /// [`close`](Self::close) from inside a callback holding the tree lock.
    pub fn close_in(self, txn: &mut PropTxn<'_>) {
        self.shared.close(txn);
    }
}

impl Drop for DerivedView {
    fn drop(&mut self) {
        if self.shared.closed.load(Ordering::Acquire) {
            return;
        }
        let shared = self.shared.clone();
        if self.tree.held_here() {
            tracing::trace!(dest = %shared.dest, "derived view dropped under the tree lock");
            self.tree.defer(move |txn| shared.close(txn));
        } else {
            self.tree.with(|txn| shared.close(txn));
        }
    }
}

impl fmt::Debug for DerivedView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DerivedView")
            .field("dest", &self.shared.dest)
            .field("sources", &self.shared.sources.lock().len())
            .finish()
    }
}

impl ViewShared {
    fn attach_sources(self: &Arc<Self>, txn: &mut PropTxn<'_>, sources: &[Prop]) -> Result<()> {
        txn.make_dir(self.dest);
        for source in sources {
            let index = {
                let mut states = self.sources.lock();
                states.push(SourceState {
                    root: source.id(),
                    tag: TagKey::new(),
                    sub: None,
                    entries: Slots::new(),
                    visible: 0,
                });
                states.len() - 1
            };
            let view = self.clone();
            let sub = txn.subscribe(
                SubscribeOptions::new()
                    .root(source)
                    .track_destruction()
                    .on_inline(move |txn, event| view.on_source_event(txn, index, event)),
            )?;
            self.sources.lock()[index].sub = Some(sub.detach());
        }
        Ok(())
    }

    fn on_source_event(self: &Arc<Self>, txn: &mut PropTxn<'_>, source: usize, event: &PropEvent) {
        if self.closed.load(Ordering::Acquire) {
            return;
        }
        match event {
            PropEvent::AddChild { child, .. } | PropEvent::AddChildBefore { child, .. } => {
                self.add_child(txn, source, child.id());
            }
            PropEvent::AddChildVector(children)
            | PropEvent::AddChildVectorBefore { children, .. } => {
                for child in children {
                    self.add_child(txn, source, child.id());
                }
            }
            PropEvent::DelChild(child) => self.remove_child(txn, source, child.id()),
            PropEvent::MoveChild { child, .. } => self.move_child(txn, source, child.id()),
            PropEvent::SetVoid | PropEvent::Destroyed => self.clear_source(txn, source),
            _ => {}
        }
    }

    fn tag(&self, source: usize) -> TagKey {
        self.sources.lock()[source].tag
    }

    fn add_child(self: &Arc<Self>, txn: &mut PropTxn<'_>, source: usize, child: NodeId) {
        let tag = self.tag(source);
        if txn.tag_has(child, tag) {
            return;
        }

        let out = txn.create_root(None);
        txn.link(child, out);
        let entry = {
            let mut sources = self.sources.lock();
            let entries = &mut sources[source].entries;
            let entry = Arc::new(ViewEntry {
                child,
                out,
                source,
                slot: entries.vacant(),
                state: Mutex::new(EntryState {
                    key: PropValue::Void,
                    key_sub: None,
                    ready: false,
                    visible: false,
                }),
            });
            entries.insert(entry.clone());
            entry
        };
        txn.tag_set(child, tag, entry.clone());
        txn.tag_set(out, tag, entry.clone());

        if let Some(path) = self.transform.key_path() {
            let view = Arc::downgrade(self);
            let watched = entry.clone();
            let key_sub = watch_key(txn, child, path, move |txn, key| {
                if let Some(view) = view.upgrade() {
                    view.key_changed(txn, &watched, key);
                }
            });
            entry.state.lock().key_sub = key_sub;
        }

        entry.state.lock().ready = true;
        self.place(txn, &entry);
    }

    fn key_changed(&self, txn: &mut PropTxn<'_>, entry: &ViewEntry, key: PropValue) {
        if self.closed.load(Ordering::Acquire) {
            return;
        }
        let ready = {
            let mut state = entry.state.lock();
            if state.key == key {
                return;
            }
            state.key = key;
            state.ready
        };
        if ready {
            self.place(txn, entry);
        }
    }

    /// Show, hide or reposition `entry` after its key was (re)evaluated.
    fn place(&self, txn: &mut PropTxn<'_>, entry: &ViewEntry) {
        let (admit, visible) = {
            let state = entry.state.lock();
            if !state.ready {
                return;
            }
            (self.transform.admit(&state.key), state.visible)
        };
        match (visible, admit) {
            (false, true) => self.show(txn, entry),
            (true, false) => self.hide(txn, entry),
            (true, true) if self.transform.sorts() => {
                self.hide(txn, entry);
                self.show(txn, entry);
            }
            _ => {}
        }
    }

    fn show(&self, txn: &mut PropTxn<'_>, entry: &ViewEntry) {
        let before = self.insert_point(txn, entry);
        txn.set_parent(entry.out, self.dest, before);
        entry.state.lock().visible = true;
        self.sources.lock()[entry.source].visible += 1;
    }

    fn hide(&self, txn: &mut PropTxn<'_>, entry: &ViewEntry) {
        entry.state.lock().visible = false;
        self.sources.lock()[entry.source].visible -= 1;
        txn.unparent(entry.out);
    }

    /// Index range of a source's block in the destination, and its tag.
    fn block(&self, source: usize) -> (usize, usize, TagKey) {
        let sources = self.sources.lock();
        let start = sources[..source].iter().map(|s| s.visible).sum();
        let state = &sources[source];
        (start, start + state.visible, state.tag)
    }

    /// The destination node a hidden `entry` should be inserted before.
    fn insert_point(&self, txn: &PropTxn<'_>, entry: &ViewEntry) -> Option<NodeId> {
        let (start, end, tag) = self.block(entry.source);
        if self.transform.sorts() {
            let key = entry.state.lock().key.clone();
            let (mut lo, mut hi) = (start, end);
            while lo < hi {
                let mid = lo + (hi - lo) / 2;
                let goes_after = txn
                    .child_at(self.dest, mid)
                    .and_then(|out| txn.tag_get::<ViewEntry>(out, tag))
                    .is_some_and(|other| {
                        let other_state = other.state.lock();
                        self.transform.compare(&other_state.key, &key) != KeyOrdering::Greater
                    });
                if goes_after {
                    lo = mid + 1;
                } else {
                    hi = mid;
                }
            }
            return txn.child_at(self.dest, lo);
        }
        next_visible_sibling(txn, entry.child, tag).or_else(|| txn.child_at(self.dest, end))
    }

    fn move_child(&self, txn: &mut PropTxn<'_>, source: usize, child: NodeId) {
        if self.transform.sorts() {
            return;
        }
        let tag = self.tag(source);
        let Some(entry) = txn.tag_get::<ViewEntry>(child, tag) else {
            return;
        };
        if !entry.state.lock().visible {
            return;
        }
        let (_, end, _) = self.block(source);
        let before = next_visible_sibling(txn, child, tag).or_else(|| txn.child_at(self.dest, end));
        txn.move_child(entry.out, before);
    }

    fn remove_child(&self, txn: &mut PropTxn<'_>, source: usize, child: NodeId) {
        let tag = self.tag(source);
        if !txn.tag_has(child, tag) {
            return;
        }
        let Ok(entry) = txn.tag_clear(child, tag).downcast::<ViewEntry>() else {
            return;
        };
        self.sources.lock()[source].entries.remove(entry.slot);
        self.release(txn, &entry, tag);
    }

    /// Drop an entry that is no longer in its slot nor tagged on its child.
    fn release(&self, txn: &mut PropTxn<'_>, entry: &ViewEntry, tag: TagKey) {
        if txn.tag_has(entry.out, tag) {
            txn.tag_clear(entry.out, tag);
        }
        let (key_sub, visible) = {
            let mut state = entry.state.lock();
            state.ready = false;
            (state.key_sub.take(), std::mem::replace(&mut state.visible, false))
        };
        if visible {
            self.sources.lock()[entry.source].visible -= 1;
        }
        if let Some(sub) = key_sub {
            txn.unsubscribe_id(sub);
        }
        txn.destroy(entry.out);
    }

    fn clear_source(&self, txn: &mut PropTxn<'_>, source: usize) {
        let (entries, tag, root) = {
            let mut sources = self.sources.lock();
            let state = &mut sources[source];
            (state.entries.drain(), state.tag, state.root)
        };
        if !entries.is_empty() {
            tracing::trace!(source = %root, count = entries.len(), "view source cleared");
        }
        for entry in entries {
            if txn.tag_has(entry.child, tag) {
                txn.tag_clear(entry.child, tag);
            }
            self.release(txn, &entry, tag);
        }
    }

    fn close(&self, txn: &mut PropTxn<'_>) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let subs: Vec<SubId> = self.sources.lock().iter().filter_map(|s| s.sub).collect();
        for sub in subs {
            txn.unsubscribe_id(sub);
        }
        let count = self.sources.lock().len();
        for source in 0..count {
            self.clear_source(txn, source);
        }
        tracing::debug!(dest = %self.dest, "derived view closed");
    }
}

/// Destination node of the first shown sibling after `child` in its source.
fn next_visible_sibling(txn: &PropTxn<'_>, child: NodeId, tag: TagKey) -> Option<NodeId> {
    let parent = txn.parent(child)?;
    let siblings = txn.node(parent)?.children();
    let pos = siblings.iter().rposition(|c| *c == child)?;
    siblings[pos + 1..].iter().find_map(|sibling| {
        let entry = txn.tag_get::<ViewEntry>(*sibling, tag)?;
        let visible = entry.state.lock().visible;
        visible.then_some(entry.out)
    })
}
