//! Property Tree
//!
//! This module holds the tree itself: the node arena, typed values, path
//! handling and the transaction through which everything is mutated.
//!
//! # Concepts
//!
//! ## Nodes
//!
//! A node holds one value: void, a string, an integer or float (optionally
//! clamped to a range), a reference to another node, or a directory of
//! ordered children. Children may be named or anonymous. Turning a node into
//! a directory drops its scalar value.
//!
//! ## Aliases
//!
//! A node may alias another node (its originator). Reads and scalar writes
//! through a [`Prop`] forward to the end of the alias chain, and
//! subscriptions registered on the alias observe the originator. See the
//! `link` module for how subscriptions move when aliases change.
//!
//! ## Lifetime
//!
//! Nodes live in a generational arena. Destroying a node frees its slot and
//! bumps the slot's generation, so every outstanding [`NodeId`] and [`Prop`]
//! turns into a zombie handle: writes are ignored and reads return `None`.

mod arena;
mod dump;
mod engine;
mod handle;
mod node;
mod path;
mod query;
mod setters;
mod structure;
mod value;

pub use arena::NodeId;
pub use engine::{PropTree, PropTxn};
pub use handle::Prop;
pub use node::{PropStr, StrKind};
pub use path::{split_path, Segment};
pub use value::PropValue;

pub(crate) use node::{NodeFlags, Payload};
pub(crate) use value::{parse_leading_int, payloads_equal};
