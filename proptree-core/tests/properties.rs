//! Property Tests
//!
//! Invariants of value delivery, aliasing and export checked over generated
//! inputs, plus the fixed scenarios they are built around.

use std::sync::Arc;

use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use proptree_core::{Exported, PropEvent, PropTree, SubscribeOptions};

fn recording(
    tree: &PropTree,
    options: SubscribeOptions,
) -> (Arc<Mutex<Vec<String>>>, proptree_core::Subscription) {
    let log = Arc::new(Mutex::new(Vec::new()));
    let sink = log.clone();
    let sub = tree
        .subscribe(
            options
                .inline()
                .on_event(move |e: &PropEvent| sink.lock().push(format!("{e:?}"))),
        )
        .unwrap();
    (log, sub)
}

fn scalar() -> impl Strategy<Value = Exported> {
    prop_oneof![
        Just(Exported::Void),
        any::<i32>().prop_map(Exported::Int),
        (-1.0e6f32..1.0e6).prop_map(Exported::Float),
        "[a-z ]{0,12}".prop_map(Exported::Str),
    ]
}

fn subtree() -> impl Strategy<Value = Exported> {
    scalar().prop_recursive(3, 24, 4, |inner| {
        prop::collection::vec(("[a-z]{1,6}", inner), 1..4).prop_map(|entries| {
            Exported::Dir(entries.into_iter().collect())
        })
    })
}

proptest! {
    /// The last value set is the last value observed, and every observed
    /// value was actually set.
    #[test]
    fn last_set_is_last_seen(values in prop::collection::vec(-5i32..5, 1..40)) {
        let tree = PropTree::default();
        let root = tree.create_root(Some("r"));
        let node = root.create_child("n").unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let _sub = tree
            .subscribe(
                SubscribeOptions::new()
                    .root(&root)
                    .path_str("r.n")
                    .inline()
                    .no_initial_update()
                    .on_int(move |v| sink.lock().push(v)),
            )
            .unwrap();

        for v in &values {
            node.set_int(*v);
        }

        let seen = seen.lock();
        prop_assert_eq!(seen.last(), values.last());
        for v in seen.iter() {
            prop_assert!(values.contains(v));
        }
        prop_assert!(seen.windows(2).all(|w| w[0] != w[1]));
    }

    /// Writing the current value again sends nothing.
    #[test]
    fn rewriting_current_value_is_silent(value in any::<i32>()) {
        let tree = PropTree::default();
        let root = tree.create_root(Some("r"));
        let node = root.create_child("n").unwrap();
        node.set_int(value);

        let (log, _sub) = recording(
            &tree,
            SubscribeOptions::new().root(&root).path_str("r.n").no_initial_update(),
        );
        node.set_int(value);
        prop_assert!(log.lock().is_empty());
    }

    /// Export followed by import reproduces the subtree.
    #[test]
    fn export_import_is_isomorphic(tree_shape in subtree()) {
        let exported = match tree_shape {
            dir @ Exported::Dir(_) => dir,
            scalar => Exported::Dir([("leaf".to_string(), scalar)].into_iter().collect()),
        };
        let tree = PropTree::default();
        let first = tree.create_root(None);
        first.import(&exported);
        let second = tree.create_root(None);
        second.import(&first.export());

        prop_assert_eq!(second.export(), first.export());
        let bytes = first.export().to_msgpack().unwrap();
        prop_assert_eq!(Exported::from_msgpack(&bytes).unwrap(), first.export());
    }

    /// A subscription lands on the same ultimate node whether it was made
    /// before or after the alias.
    #[test]
    fn binding_is_independent_of_alias_order(
        subscribe_first in any::<bool>(),
        a in any::<i32>(),
        b in any::<i32>(),
    ) {
        let tree = PropTree::default();
        let left = tree.create_root(Some("left"));
        let right = tree.create_root(Some("right"));
        left.create_path("x").unwrap().set_int(a);
        let target = right.create_path("x").unwrap();
        target.set_int(b);

        let options = SubscribeOptions::new().root(&left).path_str("left.x");
        let sub = if subscribe_first {
            let sub = tree.subscribe(options.inline().on_event(|_| {})).unwrap();
            left.link_to(&right);
            sub
        } else {
            left.link_to(&right);
            tree.subscribe(options.inline().on_event(|_| {})).unwrap()
        };

        prop_assert_eq!(sub.value_node(), Some(target));
    }
}

/// Test that a value set after subscribing arrives once, and that aliasing
/// a second node onto it only reports a transition that was not yet seen.
#[test]
fn alias_onto_seen_value_is_silent() {
    let tree = PropTree::default();
    let r = tree.create_root(Some("r"));
    let a = r.create_child("a").unwrap();
    let b = r.create_child("b").unwrap();

    let (on_a, _sa) = recording(
        &tree,
        SubscribeOptions::new().root(&r).path_str("r.a").no_initial_update(),
    );
    a.set_int(5);
    assert_eq!(*on_a.lock(), vec!["SetInt(5)".to_string()]);

    b.set_int(5);
    let (seen_five, _sb) = recording(
        &tree,
        SubscribeOptions::new().root(&r).path_str("r.b").no_initial_update(),
    );
    b.link_to(&a);
    assert!(seen_five.lock().is_empty());

    let c = r.create_child("c").unwrap();
    let (fresh, _sc) = recording(
        &tree,
        SubscribeOptions::new().root(&r).path_str("r.c").no_initial_update(),
    );
    c.link_to(&a);
    assert_eq!(*fresh.lock(), vec!["SetInt(5)".to_string()]);
    assert_eq!(*on_a.lock(), vec!["SetInt(5)".to_string()]);
}

/// Test that the first child of a void node turns it into a directory
/// with one notification each.
#[test]
fn first_child_makes_directory() {
    let tree = PropTree::default();
    let r = tree.create_root(Some("r"));
    let node = r.create_child("list").unwrap();

    let log = Arc::new(Mutex::new(Vec::new()));
    let sink = log.clone();
    let _sub = tree
        .subscribe(
            SubscribeOptions::new()
                .root(&r)
                .path_str("r.list")
                .inline()
                .no_initial_update()
                .on_event(move |e| {
                    sink.lock().push(match e {
                        PropEvent::SetDir => "dir",
                        PropEvent::AddChild { .. } => "add",
                        _ => "other",
                    })
                }),
        )
        .unwrap();

    node.create_anonymous().unwrap();
    assert_eq!(*log.lock(), vec!["dir", "add"]);
}
