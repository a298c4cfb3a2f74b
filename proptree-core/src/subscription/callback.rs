//! Callbacks and the trampolines that narrow events for typed observers.

use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use super::event::{ExtEvent, PropEvent};
use crate::tree::{parse_leading_int, PropTxn};

pub(crate) type EventFn = Arc<dyn Fn(&PropEvent) + Send + Sync>;
pub(crate) type InlineFn = Arc<dyn Fn(&mut PropTxn<'_>, &PropEvent) + Send + Sync>;

/// What to call when an event is delivered.
#[derive(Clone)]
pub(crate) enum Callback {
    /// Every event, unfiltered.
    Event(EventFn),
    /// Every event, plus the locked tree.
    Inline(InlineFn),
    Int(Arc<dyn Fn(i32) + Send + Sync>),
    Float(Arc<dyn Fn(f32) + Send + Sync>),
    Str(Arc<dyn Fn(Option<&str>) + Send + Sync>),
    Destroyed(Arc<dyn Fn() + Send + Sync>),
    Ext(Arc<dyn Fn(&ExtEvent) + Send + Sync>),
    StoreInt(Arc<AtomicI32>),
    StoreFloat(Arc<Mutex<f32>>),
}

/// Integer view of a value event.
pub(crate) fn int_of(event: &PropEvent) -> Option<i32> {
    match event {
        PropEvent::SetInt(v) => Some(*v),
        PropEvent::SetFloat(v) => Some(*v as i32),
        PropEvent::SetStr(s) => Some(parse_leading_int(s.as_str())),
        PropEvent::SetVoid => Some(0),
        _ => None,
    }
}

/// Float view of a value event.
pub(crate) fn float_of(event: &PropEvent) -> Option<f32> {
    match event {
        PropEvent::SetInt(v) => Some(*v as f32),
        PropEvent::SetFloat(v) => Some(*v),
        PropEvent::SetVoid => Some(0.0),
        _ => None,
    }
}

impl Callback {
    /// Invoke a callback that does not need the tree.
    ///
    /// Inline callbacks are dispatched by the caller, which owns the lock.
    pub(crate) fn invoke(&self, event: &PropEvent) {
        match self {
            Callback::Event(f) => f(event),
            Callback::Inline(_) => {}
            Callback::Int(f) => {
                if let Some(v) = int_of(event) {
                    f(v)
                }
            }
            Callback::Float(f) => {
                if let Some(v) = float_of(event) {
                    f(v)
                }
            }
            Callback::Str(f) => match event {
                PropEvent::SetStr(s) => f(Some(s.as_str())),
                PropEvent::SetVoid => f(None),
                _ => {}
            },
            Callback::Destroyed(f) => {
                if matches!(event, PropEvent::Destroyed) {
                    f()
                }
            }
            Callback::Ext(f) => {
                if let PropEvent::External(ext) = event {
                    f(ext)
                }
            }
            Callback::StoreInt(target) => {
                if let Some(v) = int_of(event) {
                    target.store(v, Ordering::SeqCst);
                }
            }
            Callback::StoreFloat(target) => {
                if let Some(v) = float_of(event) {
                    *target.lock() = v;
                }
            }
        }
    }

    /// Whether two callbacks are the same closure.
    pub(crate) fn same(&self, other: &Callback) -> bool {
        fn addr<T: ?Sized>(arc: &Arc<T>) -> *const () {
            Arc::as_ptr(arc) as *const ()
        }
        let (a, b) = match (self, other) {
            (Callback::Event(a), Callback::Event(b)) => (addr(a), addr(b)),
            (Callback::Inline(a), Callback::Inline(b)) => (addr(a), addr(b)),
            (Callback::Int(a), Callback::Int(b)) => (addr(a), addr(b)),
            (Callback::Float(a), Callback::Float(b)) => (addr(a), addr(b)),
            (Callback::Str(a), Callback::Str(b)) => (addr(a), addr(b)),
            (Callback::Destroyed(a), Callback::Destroyed(b)) => (addr(a), addr(b)),
            (Callback::Ext(a), Callback::Ext(b)) => (addr(a), addr(b)),
            (Callback::StoreInt(a), Callback::StoreInt(b)) => (addr(a), addr(b)),
            (Callback::StoreFloat(a), Callback::StoreFloat(b)) => (addr(a), addr(b)),
            _ => return false,
        };
        a == b
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::PropStr;

    #[test]
    fn int_trampoline_narrows() {
        let seen = Arc::new(AtomicI32::new(-1));
        let cb = Callback::StoreInt(seen.clone());

        cb.invoke(&PropEvent::SetFloat(3.7));
        assert_eq!(seen.load(Ordering::SeqCst), 3);

        cb.invoke(&PropEvent::SetStr(PropStr::plain("12 items")));
        assert_eq!(seen.load(Ordering::SeqCst), 12);

        cb.invoke(&PropEvent::SetVoid);
        assert_eq!(seen.load(Ordering::SeqCst), 0);

        cb.invoke(&PropEvent::SetInt(9));
        cb.invoke(&PropEvent::SetDir);
        assert_eq!(seen.load(Ordering::SeqCst), 9);
    }

    #[test]
    fn string_trampoline_maps_void_to_none() {
        let seen: Arc<Mutex<Vec<Option<String>>>> = Arc::default();
        let sink = seen.clone();
        let cb = Callback::Str(Arc::new(move |s: Option<&str>| {
            sink.lock().push(s.map(str::to_string))
        }));

        cb.invoke(&PropEvent::SetStr(PropStr::plain("hello")));
        cb.invoke(&PropEvent::SetVoid);
        cb.invoke(&PropEvent::SetInt(4));

        assert_eq!(*seen.lock(), vec![Some("hello".to_string()), None]);
    }

    #[test]
    fn same_compares_closure_identity() {
        let f: Arc<dyn Fn(i32) + Send + Sync> = Arc::new(|_: i32| {});
        let a = Callback::Int(f.clone());
        let b = Callback::Int(f);
        let c = Callback::Int(Arc::new(|_: i32| {}));
        assert!(a.same(&b));
        assert!(!a.same(&c));
    }
}
