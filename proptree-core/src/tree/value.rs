//! Value snapshots.

use super::arena::NodeId;
use super::node::{Payload, PropStr};

/// A copy of a node's value taken under the tree lock.
#[derive(Debug, Clone, PartialEq)]
pub enum PropValue {
    /// No value.
    Void,
    /// The node is a directory.
    Dir,
    /// A string.
    Str(PropStr),
    /// An integer.
    Int(i32),
    /// A float.
    Float(f32),
    /// A reference to another node.
    Ref(NodeId),
}

impl PropValue {
    pub(crate) fn of(payload: &Payload) -> Self {
        match payload {
            Payload::Void => PropValue::Void,
            Payload::Dir(_) => PropValue::Dir,
            Payload::Str(s) => PropValue::Str(s.clone()),
            Payload::Int { value, .. } => PropValue::Int(*value),
            Payload::Float { value, .. } => PropValue::Float(*value),
            Payload::Ref(target) => PropValue::Ref(*target),
        }
    }

    /// Integer view: ints as-is, floats truncated, strings parsed.
    pub fn as_int(&self) -> Option<i32> {
        match self {
            PropValue::Int(v) => Some(*v),
            PropValue::Float(v) => Some(*v as i32),
            PropValue::Str(s) => Some(parse_leading_int(s.as_str())),
            _ => None,
        }
    }

    /// Float view of an int or float.
    pub fn as_float(&self) -> Option<f32> {
        match self {
            PropValue::Int(v) => Some(*v as f32),
            PropValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Text of a string value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropValue::Str(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn is_void(&self) -> bool {
        matches!(self, PropValue::Void)
    }
}

/// Whether moving a subscriber from `a` to `b` changes what it observes.
///
/// Void equals void. Directories never compare equal since their children
/// have to be replayed.
pub(crate) fn payloads_equal(a: Option<&Payload>, b: Option<&Payload>) -> bool {
    match (a, b) {
        (None | Some(Payload::Void), None | Some(Payload::Void)) => true,
        (Some(Payload::Str(x)), Some(Payload::Str(y))) => x == y,
        (Some(Payload::Int { value: x, .. }), Some(Payload::Int { value: y, .. })) => x == y,
        (Some(Payload::Float { value: x, .. }), Some(Payload::Float { value: y, .. })) => x == y,
        (Some(Payload::Ref(x)), Some(Payload::Ref(y))) => x == y,
        _ => false,
    }
}

/// Parse an optional sign and leading digits, returning 0 when none are found.
pub(crate) fn parse_leading_int(text: &str) -> i32 {
    let text = text.trim_start();
    let (negative, digits) = match text.as_bytes().first() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        _ => (false, text),
    };
    let mut value: i64 = 0;
    for b in digits.bytes().take_while(u8::is_ascii_digit) {
        value = (value * 10 + i64::from(b - b'0')).min(i64::from(i32::MAX) + 1);
    }
    let value = if negative { -value } else { value };
    value.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
}
