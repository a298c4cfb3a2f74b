//! The subscribe builder.

use std::sync::atomic::AtomicI32;
use std::sync::Arc;

use parking_lot::Mutex;

use super::callback::Callback;
use super::event::{ExtEvent, PropEvent};
use super::flags::SubFlags;
use super::lock::{DeliveryLock, EntryLock};
use crate::courier::{Courier, CourierInner};
use crate::error::PropError;
use crate::tree::{split_path, Prop, PropTxn};

/// Everything a subscribe call can be configured with.
///
/// A path names its root in the first segment: the engine's global root,
/// a root declared with [`named_root`](Self::named_root), or a declared
/// root matched by node name. Without a path the subscription lands on the
/// first declared root itself.
///
/// # Example
///
/// ```rust,ignore
/// let sub = tree.subscribe(
///     SubscribeOptions::new()
///         .named_root(&page, "page")
///         .path_str("page.model.loading")
///         .courier(&ui_courier)
///         .on_int(|loading| spinner.set_visible(loading != 0)),
/// )?;
/// ```
#[derive(Default)]
pub struct SubscribeOptions {
    pub(crate) roots: Vec<(Prop, Option<String>)>,
    pub(crate) path: Option<Vec<String>>,
    pub(crate) path_error: Option<PropError>,
    pub(crate) callback: Option<Callback>,
    pub(crate) courier: Option<Arc<CourierInner>>,
    pub(crate) lock: Option<Arc<dyn DeliveryLock>>,
    pub(crate) flags: SubFlags,
    pub(crate) allow_index: bool,
}

impl SubscribeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a root, matched by its node name.
    pub fn root(mut self, root: &Prop) -> Self {
        self.roots.push((root.clone(), None));
        self
    }

    /// Declare a root under a symbolic name.
    pub fn named_root(mut self, root: &Prop, name: &str) -> Self {
        self.roots.push((root.clone(), Some(name.to_string())));
        self
    }

    /// Path as separate segments, root name first.
    pub fn path<I, S>(mut self, segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.path = Some(segments.into_iter().map(Into::into).collect());
        self
    }

    /// Path as a dotted string, root name first.
    pub fn path_str(mut self, path: &str) -> Self {
        match split_path(path) {
            Ok(segments) => self.path = Some(segments),
            Err(err) => self.path_error = Some(err),
        }
        self
    }

    /// Treat `*N` segments as index selectors.
    pub fn allow_index(mut self, allow: bool) -> Self {
        self.allow_index = allow;
        self
    }

    /// Receive every event.
    pub fn on_event<F>(mut self, f: F) -> Self
    where
        F: Fn(&PropEvent) + Send + Sync + 'static,
    {
        self.callback = Some(Callback::Event(Arc::new(f)));
        self
    }

    /// Receive every event together with the locked tree. Implies `INLINE`.
    pub fn on_inline<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut PropTxn<'_>, &PropEvent) + Send + Sync + 'static,
    {
        self.callback = Some(Callback::Inline(Arc::new(f)));
        self.flags |= SubFlags::INLINE;
        self
    }

    /// Receive values narrowed to integers.
    pub fn on_int<F>(mut self, f: F) -> Self
    where
        F: Fn(i32) + Send + Sync + 'static,
    {
        self.callback = Some(Callback::Int(Arc::new(f)));
        self
    }

    /// Receive values narrowed to floats.
    pub fn on_float<F>(mut self, f: F) -> Self
    where
        F: Fn(f32) + Send + Sync + 'static,
    {
        self.callback = Some(Callback::Float(Arc::new(f)));
        self
    }

    /// Receive string values, `None` when the value goes void.
    pub fn on_str<F>(mut self, f: F) -> Self
    where
        F: Fn(Option<&str>) + Send + Sync + 'static,
    {
        self.callback = Some(Callback::Str(Arc::new(f)));
        self
    }

    /// Be told when the registration node dies. Implies `TRACK_DESTROY`.
    pub fn on_destroyed<F>(mut self, f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.callback = Some(Callback::Destroyed(Arc::new(f)));
        self.flags |= SubFlags::TRACK_DESTROY;
        self
    }

    /// Receive application events.
    pub fn on_ext<F>(mut self, f: F) -> Self
    where
        F: Fn(&ExtEvent) + Send + Sync + 'static,
    {
        self.callback = Some(Callback::Ext(Arc::new(f)));
        self
    }

    /// Store integer values into `target`.
    pub fn store_int(mut self, target: Arc<AtomicI32>) -> Self {
        self.callback = Some(Callback::StoreInt(target));
        self
    }

    /// Store float values into `target`.
    pub fn store_float(mut self, target: Arc<Mutex<f32>>) -> Self {
        self.callback = Some(Callback::StoreFloat(target));
        self
    }

    /// Deliver through `courier` instead of the engine's default courier.
    pub fn courier(mut self, courier: &Courier) -> Self {
        self.courier = Some(courier.inner().clone());
        self
    }

    /// Hold `lock` around every queued delivery.
    pub fn mutex(mut self, lock: Arc<EntryLock>) -> Self {
        self.lock = Some(lock);
        self
    }

    /// Hold a caller-defined lock around every queued delivery.
    pub fn external_lock(mut self, lock: Arc<dyn DeliveryLock>) -> Self {
        self.lock = Some(lock);
        self
    }

    /// Add raw flags.
    pub fn flags(mut self, flags: SubFlags) -> Self {
        self.flags |= flags;
        self
    }

    pub fn no_initial_update(self) -> Self {
        self.flags(SubFlags::NO_INITIAL_UPDATE)
    }

    pub fn track_destruction(self) -> Self {
        self.flags(SubFlags::TRACK_DESTROY)
    }

    pub fn ignore_void(self) -> Self {
        self.flags(SubFlags::IGNORE_VOID)
    }

    pub fn debug(self) -> Self {
        self.flags(SubFlags::DEBUG)
    }

    pub fn multi(self) -> Self {
        self.flags(SubFlags::MULTI)
    }

    pub fn expedite(self) -> Self {
        self.flags(SubFlags::EXPEDITE)
    }

    pub fn direct(self) -> Self {
        self.flags(SubFlags::DIRECT_UPDATE)
    }

    pub fn inline(self) -> Self {
        self.flags(SubFlags::INLINE)
    }

    pub fn auto_destroy(self) -> Self {
        self.flags(SubFlags::AUTO_DESTROY)
    }

    pub fn singleton(self) -> Self {
        self.flags(SubFlags::SINGLETON)
    }

    pub fn monitor(self) -> Self {
        self.flags(SubFlags::MONITOR)
    }
}
