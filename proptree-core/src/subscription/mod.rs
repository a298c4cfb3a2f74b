//! Subscriptions and the events they receive.
//!
//! A subscription names a node by path from a root. Two nodes are
//! recorded: the *canonical* node the path resolves to without following
//! aliases, and the *value* node reached by following them. Value events
//! and child events come from the value node; `Destroyed` comes from the
//! canonical one.
//!
//! Delivery is either inline, under the tree lock on the mutating thread,
//! or queued on a [`Courier`](crate::courier::Courier).

mod callback;
mod event;
mod flags;
mod handle;
mod lock;
mod notify;
mod options;
mod shared;
mod subscribe;

pub use event::{ExtEvent, PropEvent};
pub use flags::SubFlags;
pub use handle::Subscription;
pub use lock::{DeliveryLock, EntryGuard, EntryLock, FnLock};
pub use options::SubscribeOptions;
pub use shared::SubId;

pub(crate) use lock::Held;
pub(crate) use notify::PendingQueue;
pub(crate) use shared::{SubShared, SubState};
