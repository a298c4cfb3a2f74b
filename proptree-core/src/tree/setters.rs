//! Typed value setters.
//!
//! Setters act on the node `id` resolves to through its aliases. A write
//! that leaves the value unchanged, after clamping, sends nothing.

use std::sync::Arc;

use super::arena::NodeId;
use super::engine::PropTxn;
use super::node::{Payload, PropStr};
use super::value::PropValue;

fn clamp_i32(value: i32, range: Option<(i32, i32)>) -> i32 {
    match range {
        Some((lo, hi)) => value.clamp(lo, hi),
        None => value,
    }
}

fn clamp_f32(value: f32, range: Option<(f32, f32)>) -> f32 {
    match range {
        Some((lo, hi)) => value.clamp(lo, hi),
        None => value,
    }
}

/// What a numeric write did to an existing payload.
enum Outcome {
    Unchanged,
    Changed,
    /// The node holds something else and must be cleaned first.
    Replace,
}

impl PropTxn<'_> {
    /// Drop the old value and store `payload`, notifying on success.
    fn replace_payload(&mut self, id: NodeId, payload: Payload) -> bool {
        if !self.clean(id) {
            return false;
        }
        match self.node_mut(id) {
            Some(node) => node.payload = payload,
            None => return false,
        }
        self.notify_value(id);
        true
    }

    fn finish(&mut self, id: NodeId, outcome: Outcome, fallback: impl FnOnce() -> Payload) {
        match outcome {
            Outcome::Unchanged => {}
            Outcome::Changed => self.notify_value(id),
            Outcome::Replace => {
                self.replace_payload(id, fallback());
            }
        }
    }

    /// Store an integer. A float node becomes an int node keeping its range.
    pub fn set_int(&mut self, id: NodeId, value: i32) {
        let id = self.follow(id);
        let outcome = match self.node_mut(id).map(|n| &mut n.payload) {
            None => return,
            Some(Payload::Int {
                value: current,
                clamp,
            }) => {
                let value = clamp_i32(value, *clamp);
                if *current == value {
                    Outcome::Unchanged
                } else {
                    *current = value;
                    Outcome::Changed
                }
            }
            Some(payload @ Payload::Float { .. }) => {
                let Payload::Float { clamp, .. } = *payload else {
                    return;
                };
                let clamp = clamp.map(|(lo, hi)| (lo as i32, hi as i32));
                *payload = Payload::Int {
                    value: clamp_i32(value, clamp),
                    clamp,
                };
                Outcome::Changed
            }
            Some(_) => Outcome::Replace,
        };
        self.finish(id, outcome, || Payload::Int { value, clamp: None });
    }

    /// Add to an integer, respecting its range.
    pub fn add_int(&mut self, id: NodeId, delta: i32) {
        let id = self.follow(id);
        let outcome = match self.node_mut(id).map(|n| &mut n.payload) {
            None => return,
            Some(Payload::Int { value, clamp }) => {
                let next = clamp_i32(value.saturating_add(delta), *clamp);
                if next == *value {
                    Outcome::Unchanged
                } else {
                    *value = next;
                    Outcome::Changed
                }
            }
            Some(Payload::Float { value, clamp }) => {
                let next = clamp_f32(*value + delta as f32, *clamp);
                if next == *value {
                    Outcome::Unchanged
                } else {
                    *value = next;
                    Outcome::Changed
                }
            }
            Some(_) => Outcome::Replace,
        };
        self.finish(id, outcome, || Payload::Int {
            value: delta,
            clamp: None,
        });
    }

    /// Flip an integer between zero and one. Non-integers become one.
    pub fn toggle_int(&mut self, id: NodeId) {
        let current = self.get_int(id);
        self.set_int(id, if current.unwrap_or(0) == 0 { 1 } else { 0 });
    }

    /// Give a numeric node a range and clamp its current value into it.
    ///
    /// # Panics
    ///
    /// Panics when `min > max`.
    pub fn set_int_clamp(&mut self, id: NodeId, min: i32, max: i32) {
        assert!(min <= max, "clamp range is inverted");
        let id = self.follow(id);
        let outcome = match self.node_mut(id).map(|n| &mut n.payload) {
            None => return,
            Some(Payload::Int { value, clamp }) => {
                *clamp = Some((min, max));
                let next = (*value).clamp(min, max);
                if next == *value {
                    Outcome::Unchanged
                } else {
                    *value = next;
                    Outcome::Changed
                }
            }
            Some(Payload::Float { value, clamp }) => {
                let range = (min as f32, max as f32);
                *clamp = Some(range);
                let next = clamp_f32(*value, Some(range));
                if next == *value {
                    Outcome::Unchanged
                } else {
                    *value = next;
                    Outcome::Changed
                }
            }
            Some(_) => Outcome::Replace,
        };
        self.finish(id, outcome, || Payload::Int {
            value: 0i32.clamp(min, max),
            clamp: Some((min, max)),
        });
    }

    /// Store a float. An int node becomes a float node keeping its range.
    pub fn set_float(&mut self, id: NodeId, value: f32) {
        let id = self.follow(id);
        let outcome = match self.node_mut(id).map(|n| &mut n.payload) {
            None => return,
            Some(Payload::Float {
                value: current,
                clamp,
            }) => {
                let value = clamp_f32(value, *clamp);
                if *current == value {
                    Outcome::Unchanged
                } else {
                    *current = value;
                    Outcome::Changed
                }
            }
            Some(payload @ Payload::Int { .. }) => {
                let Payload::Int { clamp, .. } = *payload else {
                    return;
                };
                let clamp = clamp.map(|(lo, hi)| (lo as f32, hi as f32));
                *payload = Payload::Float {
                    value: clamp_f32(value, clamp),
                    clamp,
                };
                Outcome::Changed
            }
            Some(_) => Outcome::Replace,
        };
        self.finish(id, outcome, || Payload::Float { value, clamp: None });
    }

    /// Add to a float, respecting its range. An int node becomes a float.
    pub fn add_float(&mut self, id: NodeId, delta: f32) {
        match self.value(id) {
            Some(PropValue::Float(current)) => self.set_float(id, current + delta),
            Some(PropValue::Int(current)) => self.set_float(id, current as f32 + delta),
            Some(_) => self.set_float(id, delta),
            None => {}
        }
    }

    /// Give a numeric node a float range and clamp its value into it.
    ///
    /// # Panics
    ///
    /// Panics when `min > max`.
    pub fn set_float_clamp(&mut self, id: NodeId, min: f32, max: f32) {
        assert!(min <= max, "clamp range is inverted");
        let id = self.follow(id);
        let outcome = match self.node_mut(id).map(|n| &mut n.payload) {
            None => return,
            Some(Payload::Float { value, clamp }) => {
                *clamp = Some((min, max));
                let next = (*value).clamp(min, max);
                if next == *value {
                    Outcome::Unchanged
                } else {
                    *value = next;
                    Outcome::Changed
                }
            }
            Some(payload @ Payload::Int { .. }) => {
                let Payload::Int { value, .. } = *payload else {
                    return;
                };
                *payload = Payload::Float {
                    value: (value as f32).clamp(min, max),
                    clamp: Some((min, max)),
                };
                Outcome::Changed
            }
            Some(_) => Outcome::Replace,
        };
        self.finish(id, outcome, || Payload::Float {
            value: 0.0f32.clamp(min, max),
            clamp: Some((min, max)),
        });
    }

    /// Store a copied plain string.
    pub fn set_str(&mut self, id: NodeId, text: &str) {
        self.set_prop_str(id, PropStr::plain(text));
    }

    /// Store a rich-text string.
    pub fn set_rich_str(&mut self, id: NodeId, text: &str) {
        self.set_prop_str(id, PropStr::rich(text));
    }

    /// Store a shared string without copying it.
    pub fn set_shared_str(&mut self, id: NodeId, text: Arc<str>) {
        self.set_prop_str(id, PropStr::plain(text));
    }

    pub fn set_prop_str(&mut self, id: NodeId, text: PropStr) {
        let id = self.follow(id);
        match self.node(id).map(|n| &n.payload) {
            None => {}
            Some(Payload::Str(current)) if *current == text => {}
            Some(_) => {
                self.replace_payload(id, Payload::Str(text));
            }
        }
    }

    /// Drop the value.
    pub fn set_void(&mut self, id: NodeId) {
        let id = self.follow(id);
        match self.node(id).map(|n| &n.payload) {
            None | Some(Payload::Void) => {}
            Some(_) => {
                self.replace_payload(id, Payload::Void);
            }
        }
    }

    /// Store a reference to another node, or void for `None`.
    pub fn set_ref(&mut self, id: NodeId, target: Option<NodeId>) {
        let Some(target) = target else {
            self.set_void(id);
            return;
        };
        let id = self.follow(id);
        match self.node(id).map(|n| &n.payload) {
            None => {}
            Some(Payload::Ref(current)) if *current == target => {}
            Some(_) => {
                self.replace_payload(id, Payload::Ref(target));
            }
        }
    }

    /// Store a snapshot value. `Dir` makes the node a directory.
    pub fn set_value(&mut self, id: NodeId, value: PropValue) {
        match value {
            PropValue::Void => self.set_void(id),
            PropValue::Dir => {
                let id = self.follow(id);
                self.make_dir(id);
            }
            PropValue::Str(s) => self.set_prop_str(id, s),
            PropValue::Int(v) => self.set_int(id, v),
            PropValue::Float(v) => self.set_float(id, v),
            PropValue::Ref(target) => self.set_ref(id, Some(target)),
        }
    }

    /// Copy the value, or the whole subtree of a directory, from `src` to `dst`.
    pub fn copy(&mut self, dst: NodeId, src: NodeId) {
        let Some(value) = self.value(src) else {
            return;
        };
        if value != PropValue::Dir {
            self.set_value(dst, value);
            return;
        }
        let dst = self.follow(dst);
        if !self.make_dir(dst) {
            return;
        }
        for child in self.children(src) {
            let name = self.name(child);
            if let Some(copy) = self.create_child(dst, name.as_deref()) {
                self.copy(copy, child);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::tree::{PropStr, PropTree, PropValue};

    #[test]
    fn int_clamp_applies_before_compare() {
        let tree = PropTree::default();
        tree.with(|txn| {
            let n = txn.create_root(None);
            txn.set_int(n, 50);
            txn.set_int_clamp(n, 0, 10);
            assert_eq!(txn.get_int(n), Some(10));
            txn.set_int(n, 99);
            assert_eq!(txn.get_int(n), Some(10));
            txn.add_int(n, -3);
            assert_eq!(txn.get_int(n), Some(7));
        });
    }

    #[test]
    fn float_and_int_convert_in_place_keeping_range() {
        let tree = PropTree::default();
        tree.with(|txn| {
            let n = txn.create_root(None);
            txn.set_float_clamp(n, 0.0, 1.0);
            txn.set_int(n, 5);
            assert_eq!(txn.value(n), Some(PropValue::Int(1)));
            txn.set_float(n, 0.25);
            assert_eq!(txn.value(n), Some(PropValue::Float(0.25)));
            assert_eq!(txn.clamp_range(n), Some((0.0, 1.0)));
        });
    }

    #[test]
    fn clamped_nodes_refuse_strings() {
        let tree = PropTree::default();
        tree.with(|txn| {
            let n = txn.create_root(None);
            txn.set_int_clamp(n, 0, 3);
            txn.set_str(n, "nope");
            assert_eq!(txn.value(n), Some(PropValue::Int(0)));
        });
    }

    #[test]
    fn toggle_flips_between_zero_and_one() {
        let tree = PropTree::default();
        tree.with(|txn| {
            let n = txn.create_root(None);
            txn.toggle_int(n);
            assert_eq!(txn.get_int(n), Some(1));
            txn.toggle_int(n);
            assert_eq!(txn.get_int(n), Some(0));
        });
    }

    #[test]
    fn directory_becomes_scalar_when_unobserved() {
        let tree = PropTree::default();
        tree.with(|txn| {
            let n = txn.create_root(None);
            let child = txn.create_child(n, Some("c")).unwrap();
            txn.set_str(n, "flat");
            assert!(!txn.is_alive(child));
            assert_eq!(
                txn.value(n),
                Some(PropValue::Str(PropStr::plain("flat")))
            );
        });
    }

    #[test]
    fn copy_duplicates_subtree() {
        let tree = PropTree::default();
        tree.with(|txn| {
            let src = txn.create_root(None);
            let a = txn.create_child(src, Some("a")).unwrap();
            txn.set_int(a, 3);
            let b = txn.create_path(src, &["b", "c"]).unwrap();
            txn.set_str(b, "deep");

            let dst = txn.create_root(None);
            txn.copy(dst, src);
            let a2 = txn.find(dst, &["a"]).unwrap();
            let c2 = txn.find(dst, &["b", "c"]).unwrap();
            assert_eq!(txn.get_int(a2), Some(3));
            assert_eq!(txn.get_str(c2).as_deref(), Some("deep"));
        });
    }
}
