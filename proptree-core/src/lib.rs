//! Proptree Core
//!
//! This crate provides the reactive property tree that application state is
//! published through. It implements:
//!
//! - A hierarchical tree of typed values (void, string, int, float, reference,
//!   directory)
//! - Subscriptions with inline or courier-based delivery
//! - Symbolic links that rebind whole subtrees of subscriptions
//! - A side-table tag store and a generic derived-view adapter
//! - Structural export to nested mappings (JSON, MessagePack)
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `tree`: Node arena, typed values, paths and the locked transaction
//! - `subscription`: Subscribe options, events, typed callbacks, delivery locks
//! - `courier`: Delivery contexts (thread-owned, polled, waitable)
//! - `link`: The relinker that moves subscriptions when aliases change
//! - `tags`: Per-node owner-keyed payloads
//! - `view`: Derived views (mirror, filter, sort, concatenation, grouping,
//!   paging)
//! - `export`: Subtree export and import
//!
//! # Example
//!
//! ```rust,ignore
//! use proptree_core::{PropTree, SubscribeOptions};
//!
//! let tree = PropTree::default();
//! let root = tree.create_root(Some("app"));
//! let volume = root.create_child("volume").unwrap();
//!
//! let sub = tree.subscribe(
//!     SubscribeOptions::new()
//!         .named_root(&root, "app")
//!         .path_str("app.volume")
//!         .inline()
//!         .on_int(|v| println!("volume is now {v}")),
//! )?;
//!
//! volume.set_int(11);
//! // prints: "volume is now 11"
//! ```

pub mod config;
pub mod courier;
pub mod error;
pub mod export;
pub mod link;
pub mod subscription;
pub mod tags;
pub mod tree;
pub mod view;

pub use config::EngineConfig;
pub use courier::{Courier, Notification};
pub use error::{PropError, Result};
pub use export::Exported;
pub use subscription::{
    DeliveryLock, EntryLock, ExtEvent, FnLock, PropEvent, SubFlags, SubId, SubscribeOptions,
    Subscription,
};
pub use tags::{TagKey, TagPayload, TagStore};
pub use tree::{NodeId, Prop, PropStr, PropTree, PropTxn, PropValue, Segment, StrKind};
pub use view::{
    DerivedView, DerivedViewBuilder, GroupedView, Identity, SortBy, TextFilter, ViewTransform,
    WindowView,
};
