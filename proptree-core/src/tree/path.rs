//! Path segments.
//!
//! A path is a root name followed by child names. With index selectors
//! allowed, `*N` addresses the Nth child of a directory in order.

use std::fmt;

use crate::error::{PropError, Result};

/// One step of a path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    /// A named child.
    Name(String),
    /// The Nth child, counting every child.
    Index(usize),
}

impl Segment {
    /// Interpret `text`, treating `*N` as an index only when `allow_index` is set.
    pub fn parse(text: &str, allow_index: bool) -> Segment {
        if allow_index {
            if let Some(index) = text.strip_prefix('*').and_then(|n| n.parse().ok()) {
                return Segment::Index(index);
            }
        }
        Segment::Name(text.to_string())
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Name(name) => f.write_str(name),
            Segment::Index(index) => write!(f, "*{index}"),
        }
    }
}

impl From<&str> for Segment {
    fn from(name: &str) -> Self {
        Segment::Name(name.to_string())
    }
}

/// Split a dotted path such as `global.media.current`.
pub fn split_path(path: &str) -> Result<Vec<String>> {
    if path.is_empty() {
        return Err(PropError::InvalidPath(path.to_string()));
    }
    let parts: Vec<String> = path.split('.').map(str::to_string).collect();
    if parts.iter().any(String::is_empty) {
        return Err(PropError::InvalidPath(path.to_string()));
    }
    Ok(parts)
}
