//! Concurrency Stress Tests
//!
//! Writers, couriers and unsubscribing owners racing each other.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use proptree_core::{Courier, EntryLock, PropTree, SubscribeOptions};

/// Test that once an owner holding the delivery lock unsubscribes, no
/// further callback runs, even with writers still producing events.
#[test]
fn unsubscribe_under_lock_stops_delivery() {
    let tree = PropTree::default();
    let root = tree.create_root(Some("r"));
    let node = root.create_child("counter").unwrap();
    let courier = Courier::thread("stress").unwrap();
    let stop = Arc::new(AtomicBool::new(false));

    let writers: Vec<_> = (0..4)
        .map(|w| {
            let node = node.clone();
            let stop = stop.clone();
            thread::spawn(move || {
                let mut i = 0;
                while !stop.load(Ordering::Relaxed) {
                    node.set_int(w * 100_000 + i);
                    i += 1;
                }
            })
        })
        .collect();

    for _ in 0..50 {
        let lock = Arc::new(EntryLock::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let sub = tree
            .subscribe(
                SubscribeOptions::new()
                    .root(&root)
                    .path_str("r.counter")
                    .courier(&courier)
                    .mutex(lock.clone())
                    .on_int(move |_| {
                        counter.fetch_add(1, Ordering::SeqCst);
                    }),
            )
            .unwrap();
        thread::sleep(Duration::from_millis(1));

        let seen = {
            let _held = lock.hold();
            drop(sub);
            calls.load(Ordering::SeqCst)
        };
        thread::sleep(Duration::from_millis(2));
        assert_eq!(calls.load(Ordering::SeqCst), seen);
    }

    stop.store(true, Ordering::Relaxed);
    for writer in writers {
        writer.join().unwrap();
    }
    assert_eq!(courier.subscriber_count(), 0);
}

/// Test that subscriptions dropped from other threads while a passive
/// courier is draining leave nothing behind.
#[test]
fn concurrent_drops_while_draining() {
    let tree = PropTree::default();
    let root = tree.create_root(Some("r"));
    let node = root.create_child("value").unwrap();
    let courier = Courier::passive();

    let subs: Vec<_> = (0..64)
        .map(|_| {
            tree.subscribe(
                SubscribeOptions::new()
                    .root(&root)
                    .path_str("r.value")
                    .courier(&courier)
                    .on_int(|_| {}),
            )
            .unwrap()
        })
        .collect();
    for v in 0..32 {
        node.set_int(v);
    }

    let droppers: Vec<_> = subs
        .into_iter()
        .enumerate()
        .fold(vec![Vec::new(), Vec::new(), Vec::new(), Vec::new()], |mut acc, (i, sub)| {
            acc[i % 4].push(sub);
            acc
        })
        .into_iter()
        .map(|batch| thread::spawn(move || drop(batch)))
        .collect();

    while courier.has_pending() {
        courier.poll();
    }
    for dropper in droppers {
        dropper.join().unwrap();
    }
    courier.poll();

    assert!(!courier.has_pending());
    assert_eq!(courier.subscriber_count(), 0);
    assert_eq!(tree.subscription_count(), 0);
}
