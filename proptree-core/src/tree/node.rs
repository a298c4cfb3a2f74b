//! Property nodes and their payloads.

use std::fmt;
use std::sync::Arc;

use bitflags::bitflags;
use smallvec::SmallVec;

use super::arena::NodeId;
use crate::subscription::SubId;

/// How a string payload should be rendered by consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StrKind {
    /// Plain UTF-8 text.
    #[default]
    Plain,
    /// Rich text with inline markup.
    Rich,
}

/// A string payload.
///
/// The text is an `Arc<str>` so interned strings can be shared between nodes
/// and events without copying.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct PropStr {
    text: Arc<str>,
    kind: StrKind,
}

impl PropStr {
    /// Create a plain string payload.
    pub fn plain(text: impl Into<Arc<str>>) -> Self {
        Self {
            text: text.into(),
            kind: StrKind::Plain,
        }
    }

    /// Create a rich-text payload.
    pub fn rich(text: impl Into<Arc<str>>) -> Self {
        Self {
            text: text.into(),
            kind: StrKind::Rich,
        }
    }

    /// Borrow the text.
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Share the underlying text.
    pub fn shared(&self) -> Arc<str> {
        self.text.clone()
    }

    /// Rendering kind.
    pub fn kind(&self) -> StrKind {
        self.kind
    }
}

impl fmt::Debug for PropStr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            StrKind::Plain => write!(f, "{:?}", self.text),
            StrKind::Rich => write!(f, "rich({:?})", self.text),
        }
    }
}

impl fmt::Display for PropStr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Children of a directory node.
#[derive(Debug, Default)]
pub(crate) struct Dir {
    pub(crate) children: Vec<NodeId>,
    pub(crate) selected: Option<NodeId>,
}

/// The value stored in a node.
#[derive(Debug)]
pub(crate) enum Payload {
    Void,
    Dir(Dir),
    Str(PropStr),
    Int {
        value: i32,
        clamp: Option<(i32, i32)>,
    },
    Float {
        value: f32,
        clamp: Option<(f32, f32)>,
    },
    Ref(NodeId),
}

impl Payload {
    pub(crate) fn is_dir(&self) -> bool {
        matches!(self, Payload::Dir(_))
    }

    pub(crate) fn is_clamped(&self) -> bool {
        matches!(
            self,
            Payload::Int { clamp: Some(_), .. } | Payload::Float { clamp: Some(_), .. }
        )
    }

    pub(crate) fn dir(&self) -> Option<&Dir> {
        match self {
            Payload::Dir(dir) => Some(dir),
            _ => None,
        }
    }

    pub(crate) fn dir_mut(&mut self) -> Option<&mut Dir> {
        match self {
            Payload::Dir(dir) => Some(dir),
            _ => None,
        }
    }
}

bitflags! {
    /// Bookkeeping marks on a node.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub(crate) struct NodeFlags: u8 {
        /// The originator carries a structural count taken by a hard link.
        const XREFED_ORIGINATOR = 0x01;
        /// A monitor subscription is bound here.
        const MONITORED         = 0x02;
        /// A directory-only multi subscription is bound here.
        const MULTI_SUB         = 0x04;
        /// Some ancestor carries a multi subscription.
        const MULTI_NOTIFY      = 0x08;
        /// Marked for a later `destroy_marked_children` sweep.
        const MARKED            = 0x10;
    }
}

/// One node in the tree.
#[derive(Debug)]
pub(crate) struct Node {
    pub(crate) name: Option<Arc<str>>,
    pub(crate) parent: Option<NodeId>,
    pub(crate) payload: Payload,
    pub(crate) flags: NodeFlags,

    /// Structural count. The node is torn down when it reaches zero.
    pub(crate) xref: u32,

    /// The node this one aliases.
    pub(crate) originator: Option<NodeId>,
    /// Nodes aliasing this one.
    pub(crate) targets: SmallVec<[NodeId; 2]>,

    /// Subscriptions whose resolved value node is this node.
    pub(crate) value_subs: Vec<SubId>,
    /// Subscriptions registered on this node.
    pub(crate) canonical_subs: Vec<SubId>,

    /// Bumped on every value notification.
    pub(crate) seq: u64,
}

impl Node {
    pub(crate) fn new(name: Option<Arc<str>>) -> Self {
        Self {
            name,
            parent: None,
            payload: Payload::Void,
            flags: NodeFlags::empty(),
            xref: 1,
            originator: None,
            targets: SmallVec::new(),
            value_subs: Vec::new(),
            canonical_subs: Vec::new(),
            seq: 0,
        }
    }

    pub(crate) fn children(&self) -> &[NodeId] {
        self.payload
            .dir()
            .map(|dir| dir.children.as_slice())
            .unwrap_or(&[])
    }
}
