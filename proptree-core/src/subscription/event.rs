//! Events delivered to subscriptions.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::tree::{Prop, PropStr};

/// An application-defined event routed through the tree.
#[derive(Clone)]
pub struct ExtEvent {
    name: Arc<str>,
    payload: Option<Arc<dyn Any + Send + Sync>>,
}

impl ExtEvent {
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self {
            name: name.into(),
            payload: None,
        }
    }

    /// Attach a payload that receivers can downcast.
    pub fn with_payload<T: Any + Send + Sync>(mut self, payload: T) -> Self {
        self.payload = Some(Arc::new(payload));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn payload<T: Any>(&self) -> Option<&T> {
        self.payload.as_deref()?.downcast_ref()
    }
}

impl fmt::Debug for ExtEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtEvent")
            .field("name", &self.name)
            .field("has_payload", &self.payload.is_some())
            .finish()
    }
}

/// One state transition as seen by a subscription.
#[derive(Debug, Clone)]
pub enum PropEvent {
    /// The value became void.
    SetVoid,
    /// The node became (or is) a directory.
    SetDir,
    SetStr(PropStr),
    SetInt(i32),
    SetFloat(f32),
    /// The node now references another node.
    SetRef(Prop),

    /// A child was appended.
    AddChild { child: Prop, selected: bool },
    /// A child was inserted before a sibling.
    AddChildBefore {
        child: Prop,
        before: Prop,
        selected: bool,
    },
    /// Several children were appended at once.
    AddChildVector(Vec<Prop>),
    /// Several children were inserted before a sibling at once.
    AddChildVectorBefore { children: Vec<Prop>, before: Prop },
    /// A child was removed.
    DelChild(Prop),
    /// A child moved before `before`, or to the end.
    MoveChild { child: Prop, before: Option<Prop> },
    /// The selection changed. `None` clears it.
    SelectChild {
        child: Option<Prop>,
        extra: Option<Prop>,
    },
    SuggestFocus(Prop),

    /// Someone asks the owner to create a child.
    ReqNewChild,
    /// Someone asks the owner to delete these children.
    ReqDeleteVector(Vec<Prop>),
    /// Someone asks the owner to move a child.
    ReqMoveChild { child: Prop, before: Option<Prop> },
    /// The producer can (or cannot) supply more children.
    HaveMoreChildren(bool),
    /// A consumer wants more children.
    WantMoreChildren,

    /// The registration node was destroyed.
    Destroyed,
    External(ExtEvent),
    /// An ordinary subscriber arrived on a monitored node.
    SubscriptionMonitorActive,
}

impl PropEvent {
    /// Whether this event carries a value rather than a structural change.
    pub fn is_value(&self) -> bool {
        matches!(
            self,
            PropEvent::SetVoid
                | PropEvent::SetDir
                | PropEvent::SetStr(_)
                | PropEvent::SetInt(_)
                | PropEvent::SetFloat(_)
                | PropEvent::SetRef(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ext_event_payload_downcasts() {
        let event = ExtEvent::new("seek").with_payload(42u64);
        assert_eq!(event.name(), "seek");
        assert_eq!(event.payload::<u64>(), Some(&42));
        assert_eq!(event.payload::<i32>(), None);
    }

    #[test]
    fn value_events_are_classified() {
        assert!(PropEvent::SetInt(1).is_value());
        assert!(PropEvent::SetVoid.is_value());
        assert!(!PropEvent::Destroyed.is_value());
        assert!(!PropEvent::WantMoreChildren.is_value());
    }
}
