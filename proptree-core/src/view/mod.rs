//! Derived views.
//!
//! An adapter subscribes inline to a source directory and maintains a
//! destination directory from it: one aliased node per shown source child,
//! correlated through the tag store so removals and moves find their
//! destination node without searching.
//!
//! - [`DerivedView`] concatenates sources and filters or sorts them with a
//!   [`ViewTransform`].
//! - [`GroupedView`] builds one group node per key value.
//! - [`WindowView`] pages through a directory by offset and limit.
//!
//! Every source change is applied to the affected entry only.

mod adapter;
mod entries;
mod group;
mod transform;
mod window;

pub use adapter::{DerivedView, DerivedViewBuilder};
pub use group::GroupedView;
pub use transform::{Identity, SortBy, TextFilter, ViewTransform};
pub use window::WindowView;
