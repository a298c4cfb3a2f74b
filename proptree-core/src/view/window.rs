//! A paging window over a directory.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::Result;
use crate::subscription::{PropEvent, SubId, SubscribeOptions};
use crate::tags::TagKey;
use crate::tree::{NodeId, Prop, PropTree, PropTxn};

struct WindowState {
    offset: usize,
    limit: usize,
    /// Source children currently mirrored, in destination order.
    shown: Vec<NodeId>,
    sub: Option<SubId>,
}

struct WindowShared {
    source: NodeId,
    dest: NodeId,
    tag: TagKey,
    state: Mutex<WindowState>,
    closed: AtomicBool,
}

/// Mirrors the children of a source directory from `offset`, at most
/// `limit` of them.
///
/// Each child in the window gets an unnamed destination node aliased onto
/// it. The source is typically another view's destination, so a sorted or
/// filtered list can be paged. Work per source change is bounded by the
/// window size.
pub struct WindowView {
    tree: PropTree,
    shared: Arc<WindowShared>,
}

impl WindowView {
    pub fn new(dest: &Prop, source: &Prop, offset: usize, limit: usize) -> Result<Self> {
        let tree = dest.tree().clone();
        let shared = Arc::new(WindowShared {
            source: source.id(),
            dest: dest.id(),
            tag: TagKey::new(),
            state: Mutex::new(WindowState {
                offset,
                limit,
                shown: Vec::new(),
                sub: None,
            }),
            closed: AtomicBool::new(false),
        });
        tree.with(|txn| -> Result<()> {
            txn.make_dir(shared.dest);
            let window = shared.clone();
            let sub = txn.subscribe(
                SubscribeOptions::new()
                    .root(source)
                    .track_destruction()
                    .no_initial_update()
                    .on_inline(move |txn, event| window.on_source_event(txn, event)),
            )?;
            shared.state.lock().sub = Some(sub.detach());
            shared.sync(txn);
            Ok(())
        })?;
        Ok(Self { tree, shared })
    }

    pub fn dest(&self) -> Prop {
        self.tree.prop(self.shared.dest)
    }

    /// Current `(offset, limit)`.
    pub fn window(&self) -> (usize, usize) {
        let state = self.shared.state.lock();
        (state.offset, state.limit)
    }

    /// Number of children in the source, inside the window or not.
    pub fn source_len(&self) -> usize {
        self.tree.with(|txn| txn.child_count(self.shared.source))
    }

    /// Move or resize the window.
    pub fn set_window(&self, offset: usize, limit: usize) {
        self.tree.with(|txn| self.set_window_in(txn, offset, limit));
    }

    /// [`set_window`](Self::set_window) from inside a callback holding the
    /// tree lock.
    pub fn set_window_in(&self, txn: &mut PropTxn<'_>, offset: usize, limit: usize) {
        {
            let mut state = self.shared.state.lock();
            if (state.offset, state.limit) == (offset, limit) {
                return;
            }
            state.offset = offset;
            state.limit = limit;
        }
        self.shared.sync(txn);
    }

    /// Unsubscribe, clear tags and destroy the mirrored nodes.
    pub fn close(self) {
        drop(self)
    }

    pub fn close_in(self, txn: &mut PropTxn<'_>) {
        self.shared.close(txn);
    }
}

impl Drop for WindowView {
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

impl fmt::Debug for WindowView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("WindowView")
            .field("dest", &self.shared.dest)
            .field("offset", &state.offset)
            .field("limit", &state.limit)
            .finish()
    }
}

impl WindowShared {
    fn on_source_event(&self, txn: &mut PropTxn<'_>, event: &PropEvent) {
        if self.closed.load(Ordering::Acquire) {
            return;
        }
        match event {
            PropEvent::AddChild { .. }
            | PropEvent::AddChildBefore { .. }
            | PropEvent::AddChildVector(_)
            | PropEvent::AddChildVectorBefore { .. }
            | PropEvent::DelChild(_)
            | PropEvent::MoveChild { .. }
            | PropEvent::SetDir
            | PropEvent::SetVoid
            | PropEvent::Destroyed => self.sync(txn),
            _ => {}
        }
    }

    /// Make the destination mirror the source children inside the window.
    fn sync(&self, txn: &mut PropTxn<'_>) {
        let (offset, limit, shown) = {
            let mut state = self.state.lock();
            (state.offset, state.limit, std::mem::take(&mut state.shown))
        };
        let wanted: Vec<NodeId> = (offset..offset.saturating_add(limit))
            .map_while(|i| txn.child_at(self.source, i))
            .collect();

        for child in shown.iter().filter(|c| !wanted.contains(c)) {
            self.drop_member(txn, *child);
        }
        for (i, child) in wanted.iter().copied().enumerate() {
            let out = match txn.tag_get::<NodeId>(child, self.tag) {
                Some(out) => *out,
                None => {
                    let out = txn.create_root(None);
                    txn.link(child, out);
                    txn.tag_set(child, self.tag, Arc::new(out));
                    txn.tag_set(out, self.tag, Arc::new(child));
                    out
                }
            };
            let at = txn.child_at(self.dest, i);
            if at == Some(out) {
                continue;
            }
            if txn.parent(out) == Some(self.dest) {
                txn.move_child(out, at);
            } else {
                txn.set_parent(out, self.dest, at);
            }
        }
        self.state.lock().shown = wanted;
    }

    fn drop_member(&self, txn: &mut PropTxn<'_>, child: NodeId) {
        if !txn.tag_has(child, self.tag) {
            return;
        }
        let Ok(out) = txn.tag_clear(child, self.tag).downcast::<NodeId>() else {
            return;
        };
        if txn.tag_has(*out, self.tag) {
            txn.tag_clear(*out, self.tag);
        }
        txn.destroy(*out);
    }

    fn close(&self, txn: &mut PropTxn<'_>) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let (sub, shown) = {
            let mut state = self.state.lock();
            (state.sub.take(), std::mem::take(&mut state.shown))
        };
        if let Some(sub) = sub {
            txn.unsubscribe_id(sub);
        }
        for child in shown {
            self.drop_member(txn, child);
        }
        tracing::debug!(dest = %self.dest, "window view closed");
    }
}
