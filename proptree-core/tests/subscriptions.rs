//! Subscription Behaviour Tests
//!
//! Flags, subscribe errors, index paths, application events and the rules
//! for callbacks that run with the tree lock held.

use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use proptree_core::{
    Courier, ExtEvent, PropError, PropEvent, PropTree, SubscribeOptions, Subscription,
};

fn recording(
    tree: &PropTree,
    options: SubscribeOptions,
) -> (Arc<Mutex<Vec<PropEvent>>>, Subscription) {
    let log = Arc::new(Mutex::new(Vec::new()));
    let sink = log.clone();
    let sub = tree
        .subscribe(
            options
                .inline()
                .on_event(move |e: &PropEvent| sink.lock().push(e.clone())),
        )
        .unwrap();
    (log, sub)
}

fn count(log: &Mutex<Vec<PropEvent>>, f: impl Fn(&PropEvent) -> bool) -> usize {
    log.lock().iter().filter(|e| f(e)).count()
}

/// Test that a monitor hears about the first ordinary subscriber and
/// nothing before it.
#[test]
fn monitor_wakes_when_ordinary_subscriber_arrives() {
    let tree = PropTree::default();
    let root = tree.create_root(None);
    let x = root.create_child("x").unwrap();

    let (log, _monitor) = recording(&tree, SubscribeOptions::new().root(&x).monitor());
    let active = |e: &PropEvent| matches!(e, PropEvent::SubscriptionMonitorActive);
    assert_eq!(count(&log, active), 0);

    let value = Arc::new(AtomicI32::new(-1));
    let _reader = tree
        .subscribe(SubscribeOptions::new().root(&x).inline().store_int(value.clone()))
        .unwrap();
    assert_eq!(count(&log, active), 1);

    x.set_int(4);
    assert_eq!(value.load(Ordering::SeqCst), 4);
    assert_eq!(count(&log, active), 1);
}

/// Test that a multi subscription is pinged for changes anywhere below its
/// directory, including children created after it subscribed.
#[test]
fn multi_subscription_hears_descendant_changes() {
    let tree = PropTree::default();
    let dir = tree.create_root(None);
    let a = dir.create_child("a").unwrap();
    a.set_int(1);

    let (log, _sub) = recording(&tree, SubscribeOptions::new().root(&dir).multi());
    let set_dir = |e: &PropEvent| matches!(e, PropEvent::SetDir);
    assert_eq!(count(&log, set_dir), 1);
    assert_eq!(count(&log, |e| matches!(e, PropEvent::AddChild { .. })), 0);

    a.set_int(2);
    assert_eq!(count(&log, set_dir), 2);

    let b = dir.create_child("b").unwrap();
    b.set_int(5);
    assert_eq!(count(&log, set_dir), 3);
    assert_eq!(count(&log, |e| matches!(e, PropEvent::AddChild { .. })), 1);
}

/// Test that a singleton refuses the same callback twice on one node.
#[test]
fn singleton_rejects_duplicate_callback() {
    let tree = PropTree::default();
    let x = tree.create_root(Some("x"));
    let target = Arc::new(AtomicI32::new(-1));

    let _first = tree
        .subscribe(SubscribeOptions::new().root(&x).singleton().inline().store_int(target.clone()))
        .unwrap();
    let again =
        tree.subscribe(SubscribeOptions::new().root(&x).singleton().inline().store_int(target));
    assert!(matches!(again, Err(PropError::AlreadySubscribed)));

    let other = Arc::new(AtomicI32::new(-1));
    assert!(tree
        .subscribe(SubscribeOptions::new().root(&x).singleton().inline().store_int(other))
        .is_ok());
}

/// Test that auto-destroy subscriptions go away with their node and
/// ordinary ones stay registered.
#[test]
fn auto_destroy_unsubscribes_with_node() {
    let tree = PropTree::default();
    let root = tree.create_root(None);
    let x = root.create_child("x").unwrap();
    let before = tree.subscription_count();

    let (_, auto) = recording(&tree, SubscribeOptions::new().root(&x).auto_destroy());
    let (_, plain) = recording(&tree, SubscribeOptions::new().root(&x));
    assert_eq!(tree.subscription_count(), before + 2);

    assert!(x.destroy());
    assert!(auto.is_zombie());
    assert!(!plain.is_zombie());
    assert_eq!(tree.subscription_count(), before + 1);
}

/// Test that ignore-void suppresses void values from the backlog, from
/// setters and from destruction.
#[test]
fn ignore_void_skips_void_values() {
    let tree = PropTree::default();
    let root = tree.create_root(None);
    let x = root.create_child("x").unwrap();
    let void = |e: &PropEvent| matches!(e, PropEvent::SetVoid);

    let (quiet, _q) = recording(&tree, SubscribeOptions::new().root(&x).ignore_void());
    let (loud, _l) = recording(&tree, SubscribeOptions::new().root(&x));
    assert_eq!(count(&loud, void), 1);

    x.set_int(3);
    x.set_void();
    x.set_int(6);
    x.destroy();

    assert_eq!(count(&quiet, void), 0);
    assert_eq!(
        count(&quiet, |e| matches!(e, PropEvent::SetInt(3) | PropEvent::SetInt(6))),
        2
    );
    assert_eq!(count(&loud, void), 3);
}

/// Test that direct update delivers the backlog on the subscribing thread
/// while later changes still wait for the courier.
#[test]
fn direct_update_delivers_backlog_synchronously() {
    let tree = PropTree::default();
    let x = tree.create_root(Some("x"));
    x.set_int(4);
    let courier = Courier::passive();

    let direct = Arc::new(AtomicI32::new(-1));
    let queued = Arc::new(AtomicI32::new(-1));
    let _d = tree
        .subscribe(
            SubscribeOptions::new()
                .root(&x)
                .courier(&courier)
                .direct()
                .store_int(direct.clone()),
        )
        .unwrap();
    let _q = tree
        .subscribe(SubscribeOptions::new().root(&x).courier(&courier).store_int(queued.clone()))
        .unwrap();
    assert_eq!(direct.load(Ordering::SeqCst), 4);
    assert_eq!(queued.load(Ordering::SeqCst), -1);

    x.set_int(5);
    assert_eq!(direct.load(Ordering::SeqCst), 4);
    courier.poll();
    assert_eq!(direct.load(Ordering::SeqCst), 5);
    assert_eq!(queued.load(Ordering::SeqCst), 5);
}

/// Test each way a subscribe call can be refused.
#[test]
fn subscribe_reports_errors() {
    let tree = PropTree::default();
    let live = tree.create_root(Some("live"));
    let gone = tree.create_root(Some("gone"));
    assert!(gone.destroy());

    let dead = tree.subscribe(SubscribeOptions::new().root(&gone).on_event(|_| {}));
    assert!(matches!(dead, Err(PropError::DeadRoot)));

    let unknown = tree.subscribe(
        SubscribeOptions::new()
            .root(&live)
            .path_str("nowhere.x")
            .on_event(|_| {}),
    );
    assert!(matches!(unknown, Err(PropError::UnknownRoot(name)) if name == "nowhere"));

    let rootless = tree.subscribe(SubscribeOptions::new().on_event(|_| {}));
    assert!(matches!(rootless, Err(PropError::NoRoot)));

    let silent = tree.subscribe(SubscribeOptions::new().root(&live));
    assert!(matches!(silent, Err(PropError::MissingCallback)));

    let malformed = tree.subscribe(
        SubscribeOptions::new()
            .root(&live)
            .path_str("live..x")
            .on_event(|_| {}),
    );
    assert!(matches!(malformed, Err(PropError::InvalidPath(_))));

    assert_eq!(tree.subscription_count(), 0);
}

/// Test that `*N` selects a child by position only when index paths are
/// allowed, and that an index past the end leaves the subscription unbound.
#[test]
fn index_segments_select_children_by_position() {
    let tree = PropTree::default();
    let list = tree.create_root(None);
    list.create_anonymous().unwrap().set_int(10);
    list.create_anonymous().unwrap().set_int(20);

    let second = Arc::new(AtomicI32::new(-1));
    let _s = tree
        .subscribe(
            SubscribeOptions::new()
                .named_root(&list, "list")
                .path_str("list.*1")
                .allow_index(true)
                .inline()
                .store_int(second.clone()),
        )
        .unwrap();
    assert_eq!(second.load(Ordering::SeqCst), 20);

    let missing = Arc::new(AtomicI32::new(-1));
    let unbound = tree
        .subscribe(
            SubscribeOptions::new()
                .named_root(&list, "list")
                .path_str("list.*5")
                .allow_index(true)
                .inline()
                .store_int(missing.clone()),
        )
        .unwrap();
    assert_eq!(missing.load(Ordering::SeqCst), -1);
    assert!(unbound.value_node().is_none());
    assert_eq!(list.children().len(), 2);

    let literal = Arc::new(AtomicI32::new(-1));
    let _l = tree
        .subscribe(
            SubscribeOptions::new()
                .named_root(&list, "list")
                .path_str("list.*1")
                .inline()
                .store_int(literal.clone()),
        )
        .unwrap();
    assert_eq!(literal.load(Ordering::SeqCst), 0);
    assert!(list.find("*1").is_some());
    assert_eq!(list.children().len(), 3);
}

/// Test that application events reach `on_ext` subscribers with their
/// payload and leave value subscribers alone.
#[test]
fn ext_events_carry_payload() {
    let tree = PropTree::default();
    let x = tree.create_root(Some("x"));
    x.set_int(1);

    let seen: Arc<Mutex<Vec<(String, Option<u32>)>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let _ext = tree
        .subscribe(SubscribeOptions::new().root(&x).inline().on_ext(move |ext| {
            sink.lock()
                .push((ext.name().to_string(), ext.payload::<u32>().copied()));
        }))
        .unwrap();
    let value = Arc::new(AtomicI32::new(-1));
    let _v = tree
        .subscribe(SubscribeOptions::new().root(&x).inline().store_int(value.clone()))
        .unwrap();

    x.send_ext_event(ExtEvent::new("refresh").with_payload(42u32));
    x.send_ext_event(ExtEvent::new("ping"));

    assert_eq!(
        *seen.lock(),
        vec![("refresh".to_string(), Some(42)), ("ping".to_string(), None)]
    );
    assert_eq!(value.load(Ordering::SeqCst), 1);
}

/// Test that an inline callback may write its own node, and that every
/// subscriber ends on the latest value without seeing an older one after it.
#[test]
fn inline_callback_writing_its_node_delivers_latest_last() {
    let tree = PropTree::default();
    let x = tree.create_root(Some("x"));
    let id = x.id();

    let writer_log = Arc::new(Mutex::new(Vec::new()));
    let sink = writer_log.clone();
    let _writer = tree
        .subscribe(SubscribeOptions::new().root(&x).on_inline(move |txn, e| {
            if let PropEvent::SetInt(v) = e {
                sink.lock().push(*v);
                if *v < 3 {
                    txn.set_int(id, v + 1);
                }
            }
        }))
        .unwrap();

    let reader_log = Arc::new(Mutex::new(Vec::new()));
    let sink = reader_log.clone();
    let _reader = tree
        .subscribe(SubscribeOptions::new().root(&x).inline().on_int(move |v| sink.lock().push(v)))
        .unwrap();
    reader_log.lock().clear();

    x.set_int(1);
    assert_eq!(*writer_log.lock(), vec![1, 2, 3]);
    assert_eq!(*reader_log.lock(), vec![3]);
    assert_eq!(x.get_int(), Some(3));
}

/// Test that dropping a subscription while the tree lock is held silences
/// it at once and unregisters it when the lock scope ends.
#[test]
fn subscription_dropped_under_lock_is_removed_after() {
    let tree = PropTree::default();
    let x = tree.create_root(Some("x"));
    let value = Arc::new(AtomicI32::new(-1));
    let sub = tree
        .subscribe(SubscribeOptions::new().root(&x).inline().store_int(value.clone()))
        .unwrap();
    assert_eq!(tree.subscription_count(), 1);

    tree.with(|txn| {
        drop(sub);
        txn.set_int(x.id(), 9);
    });

    assert_eq!(value.load(Ordering::SeqCst), 0);
    assert_eq!(tree.subscription_count(), 0);
}

/// Test that a subscription can drop itself from its own inline callback.
#[test]
fn inline_callback_can_drop_its_subscription() {
    let tree = PropTree::default();
    let x = tree.create_root(Some("x"));
    let slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));
    let hits = Arc::new(AtomicI32::new(0));

    let own = slot.clone();
    let counter = hits.clone();
    let sub = tree
        .subscribe(
            SubscribeOptions::new()
                .root(&x)
                .no_initial_update()
                .inline()
                .on_int(move |_| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    own.lock().take();
                }),
        )
        .unwrap();
    *slot.lock() = Some(sub);

    x.set_int(1);
    x.set_int(2);
    assert_eq!(hits.load(Ordering::SeqCst), 1);
    assert_eq!(tree.subscription_count(), 0);
}

/// Test that an inline subscription bypasses a courier it was given.
#[test]
fn inline_subscription_never_queues_on_courier() {
    let tree = PropTree::default();
    let x = tree.create_root(Some("x"));
    let courier = Courier::passive();

    let seen = Arc::new(AtomicI32::new(-1));
    let target = seen.clone();
    let _sub = tree
        .subscribe(
            SubscribeOptions::new()
                .root(&x)
                .courier(&courier)
                .on_inline(move |_, e| {
                    if let PropEvent::SetInt(v) = e {
                        target.store(*v, Ordering::SeqCst);
                    }
                }),
        )
        .unwrap();
    assert_eq!(courier.subscriber_count(), 0);

    x.set_int(8);
    assert_eq!(seen.load(Ordering::SeqCst), 8);
    assert!(!courier.has_pending());
}
