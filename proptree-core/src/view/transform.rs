//! Transforms a derived view applies to its entries.

use std::cmp::Ordering;

use crate::tree::PropValue;

/// Decides which source children a view shows and in what order.
///
/// A transform that names a [`key_path`](Self::key_path) gets the value at
/// that path below each child; [`admit`](Self::admit) filters on it and,
/// when [`sorts`](Self::sorts) is set, [`compare`](Self::compare) orders by
/// it. Without a key path every child sees [`PropValue::Void`].
pub trait ViewTransform: Send + Sync + 'static {
    /// Dotted path, relative to each child, of the value to watch.
    fn key_path(&self) -> Option<&str> {
        None
    }

    fn admit(&self, _key: &PropValue) -> bool {
        true
    }

    /// Whether entries are ordered by key instead of kept in source order.
    fn sorts(&self) -> bool {
        false
    }

    fn compare(&self, _a: &PropValue, _b: &PropValue) -> Ordering {
        Ordering::Equal
    }
}

/// Mirrors every child in source order.
#[derive(Debug, Clone, Copy, Default)]
pub struct Identity;

impl ViewTransform for Identity {}

/// Shows children whose key contains a needle, ignoring case.
#[derive(Debug, Clone)]
pub struct TextFilter {
    path: String,
    needle: String,
}

impl TextFilter {
    pub fn new(path: impl Into<String>, needle: &str) -> Self {
        Self {
            path: path.into(),
            needle: needle.to_lowercase(),
        }
    }
}

impl ViewTransform for TextFilter {
    fn key_path(&self) -> Option<&str> {
        Some(&self.path)
    }

    fn admit(&self, key: &PropValue) -> bool {
        if self.needle.is_empty() {
            return true;
        }
        key.as_str()
            .is_some_and(|text| text.to_lowercase().contains(&self.needle))
    }
}

/// Orders children by their key. Ties keep the order they were placed in.
#[derive(Debug, Clone)]
pub struct SortBy {
    path: String,
    descending: bool,
}

impl SortBy {
    pub fn ascending(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            descending: false,
        }
    }

    pub fn descending(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            descending: true,
        }
    }
}

impl ViewTransform for SortBy {
    fn key_path(&self) -> Option<&str> {
        Some(&self.path)
    }

    fn sorts(&self) -> bool {
        true
    }

    fn compare(&self, a: &PropValue, b: &PropValue) -> Ordering {
        let ord = key_order(a, b);
        if self.descending {
            ord.reverse()
        } else {
            ord
        }
    }
}

/// Numbers before strings before everything else; numbers compare as
/// floats, strings by text.
fn key_order(a: &PropValue, b: &PropValue) -> Ordering {
    fn rank(v: &PropValue) -> u8 {
        match v {
            PropValue::Int(_) | PropValue::Float(_) => 0,
            PropValue::Str(_) => 1,
            _ => 2,
        }
    }
    match (a, b) {
        (PropValue::Str(x), PropValue::Str(y)) => x.as_str().cmp(y.as_str()),
        _ => match (a.as_float(), b.as_float()) {
            (Some(x), Some(y)) => x.total_cmp(&y),
            _ => rank(a).cmp(&rank(b)),
        },
    }
}
