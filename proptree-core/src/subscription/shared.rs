//! Subscription records.
//!
//! A subscription is split in two. [`SubShared`] holds what a delivery
//! needs (flags, callback, lock, courier, the zombie flag) and is reference
//! counted: the tree holds one reference and every queued notification holds
//! another, so the record outlives `unsubscribe` until its last notification
//! drains. [`SubState`] holds the bindings into the tree and lives only
//! inside the locked tree state.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use smallvec::SmallVec;

use super::callback::Callback;
use super::event::PropEvent;
use super::flags::SubFlags;
use super::lock::DeliveryLock;
use crate::courier::CourierInner;
use crate::tree::NodeId;

/// Unique identifier for a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubId(u64);

impl SubId {
    /// Allocate a fresh id.
    pub(crate) fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub#{}", self.0)
    }
}

pub(crate) struct SubShared {
    pub(crate) id: SubId,
    pub(crate) flags: SubFlags,
    pub(crate) callback: Callback,
    pub(crate) lock: Option<Arc<dyn DeliveryLock>>,
    /// `None` for inline subscriptions.
    pub(crate) courier: Option<Arc<CourierInner>>,
    zombie: AtomicBool,
}

impl SubShared {
    pub(crate) fn new(
        id: SubId,
        flags: SubFlags,
        callback: Callback,
        lock: Option<Arc<dyn DeliveryLock>>,
        courier: Option<Arc<CourierInner>>,
    ) -> Self {
        Self {
            id,
            flags,
            callback,
            lock,
            courier,
            zombie: AtomicBool::new(false),
        }
    }

    pub(crate) fn is_zombie(&self) -> bool {
        self.zombie.load(Ordering::Acquire)
    }

    pub(crate) fn mark_zombie(&self) {
        self.zombie.store(true, Ordering::Release);
    }

    /// Run the callback for a notification taken off a courier queue.
    ///
    /// Inline callbacks never reach a queue: `on_inline` sets `INLINE`, and
    /// inline subscriptions are registered without a courier.
    pub(crate) fn invoke_queued(&self, event: &PropEvent) {
        self.callback.invoke(event);
    }
}

/// Bindings of a live subscription, owned by the tree state.
pub(crate) struct SubState {
    pub(crate) shared: Arc<SubShared>,
    /// The node the subscription observes.
    pub(crate) value: Option<NodeId>,
    /// The node it was registered on.
    pub(crate) canonical: Option<NodeId>,
    /// Alias nodes the value binding was diverted through.
    pub(crate) origins: SmallVec<[NodeId; 4]>,
    /// Set while a held-back notification may still be released.
    pub(crate) pending_unlink: bool,
}

impl SubState {
    pub(crate) fn flags(&self) -> SubFlags {
        self.shared.flags
    }
}
