//! Couriers: where queued notifications are delivered.
//!
//! Every non-inline subscription delivers through a courier. A courier owns
//! two FIFO queues, expedited and normal, filled under the tree lock and
//! drained without it. Flavours differ only in who drains:
//!
//! - [`Courier::thread`]: a dedicated named thread
//! - [`Courier::passive`] / [`Courier::with_notify`]: whoever calls `poll`
//! - [`Courier::waitable`]: a caller blocking in `wait`
//!
//! The queue mutex is always taken after the tree lock, never before, and
//! callbacks never run with either held.

mod context;
mod queue;

pub use context::Courier;
pub use queue::Notification;

pub(crate) use queue::CourierInner;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subscription::{EntryLock, PropEvent, SubscribeOptions};
    use crate::tree::PropTree;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicI32, AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    fn recorder() -> (Arc<Mutex<Vec<String>>>, impl Fn(&PropEvent) + Send + Sync + 'static) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = log.clone();
        (log, move |event: &PropEvent| sink.lock().push(format!("{event:?}")))
    }

    #[test]
    fn passive_courier_holds_events_until_polled() {
        let tree = PropTree::default();
        let root = tree.create_root(Some("r"));
        let courier = Courier::passive();
        let value = Arc::new(AtomicI32::new(-1));
        let _sub = tree
            .subscribe(
                SubscribeOptions::new()
                    .root(&root)
                    .path_str("r.a")
                    .courier(&courier)
                    .store_int(value.clone()),
            )
            .unwrap();

        root.find("a").unwrap().set_int(4);
        assert_eq!(value.load(Ordering::SeqCst), -1);
        assert!(courier.has_pending());

        assert_eq!(courier.poll(), 2);
        assert_eq!(value.load(Ordering::SeqCst), 4);
        assert!(!courier.has_pending());
    }

    #[test]
    fn expedited_events_jump_the_queue() {
        let tree = PropTree::default();
        let root = tree.create_root(Some("r"));
        let courier = Courier::passive();
        let order = Arc::new(Mutex::new(Vec::new()));

        let (slow, fast) = (order.clone(), order.clone());
        let _normal = tree
            .subscribe(
                SubscribeOptions::new()
                    .root(&root)
                    .path_str("r.a")
                    .no_initial_update()
                    .courier(&courier)
                    .on_int(move |v| slow.lock().push(("normal", v))),
            )
            .unwrap();
        let _urgent = tree
            .subscribe(
                SubscribeOptions::new()
                    .root(&root)
                    .path_str("r.a")
                    .no_initial_update()
                    .expedite()
                    .courier(&courier)
                    .on_int(move |v| fast.lock().push(("expedite", v))),
            )
            .unwrap();

        root.find("a").unwrap().set_int(1);
        courier.poll();
        assert_eq!(*order.lock(), vec![("expedite", 1), ("normal", 1)]);
    }

    #[test]
    fn unsubscribed_notifications_are_released_unseen() {
        let tree = PropTree::default();
        let root = tree.create_root(Some("r"));
        let courier = Courier::passive();
        let (log, sink) = recorder();
        let sub = tree
            .subscribe(
                SubscribeOptions::new()
                    .root(&root)
                    .courier(&courier)
                    .no_initial_update()
                    .on_event(sink),
            )
            .unwrap();

        root.set_int(3);
        assert!(courier.has_pending());
        sub.unsubscribe();

        assert_eq!(courier.poll(), 1);
        assert!(log.lock().is_empty());
        assert_eq!(courier.subscriber_count(), 0);
    }

    #[test]
    fn poll_timed_keeps_leftovers_in_order() {
        let tree = PropTree::default();
        let root = tree.create_root(Some("r"));
        let courier = Courier::passive();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let _sub = tree
            .subscribe(
                SubscribeOptions::new()
                    .root(&root)
                    .courier(&courier)
                    .no_initial_update()
                    .on_int(move |v| {
                        std::thread::sleep(Duration::from_millis(5));
                        sink.lock().push(v);
                    }),
            )
            .unwrap();

        for v in 1..=4 {
            root.set_int(v);
        }
        let first = courier.poll_timed(Duration::from_millis(1));
        assert_eq!(first, 1);
        assert!(courier.has_pending());

        courier.poll();
        assert_eq!(*seen.lock(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn thread_courier_delivers_under_entry_lock() {
        let tree = PropTree::default();
        let root = tree.create_root(Some("r"));
        let lock = Arc::new(EntryLock::new());
        let courier = Courier::thread_with("test-courier", lock.clone()).unwrap();
        let observed_locked = Arc::new(AtomicUsize::new(0));
        let held = lock.clone();
        let hits = observed_locked.clone();
        let sub = tree
            .subscribe(
                SubscribeOptions::new()
                    .root(&root)
                    .courier(&courier)
                    .on_int(move |_| {
                        if held.is_locked() {
                            hits.fetch_add(1, Ordering::SeqCst);
                        }
                    }),
            )
            .unwrap();

        root.set_int(7);
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while observed_locked.load(Ordering::SeqCst) < 2 && std::time::Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(1));
        }
        assert_eq!(observed_locked.load(Ordering::SeqCst), 2);

        {
            let _owner = lock.hold();
            sub.unsubscribe();
        }
        assert_eq!(courier.subscriber_count(), 0);
    }

    #[test]
    fn waitable_courier_returns_batches() {
        let tree = PropTree::default();
        let root = tree.create_root(Some("r"));
        let courier = Courier::waitable();
        let value = Arc::new(AtomicI32::new(0));
        let _sub = tree
            .subscribe(
                SubscribeOptions::new()
                    .root(&root)
                    .no_initial_update()
                    .courier(&courier)
                    .store_int(value.clone()),
            )
            .unwrap();

        assert!(courier.wait(Some(Duration::from_millis(10))).is_empty());

        root.set_int(9);
        let batch = courier.wait(None);
        assert_eq!(batch.len(), 1);
        assert!(matches!(batch[0].event(), PropEvent::SetInt(9)));
        courier.dispatch_batch(batch);
        assert_eq!(value.load(Ordering::SeqCst), 9);
    }

    #[test]
    fn wait_for_int_sees_value_set_from_another_thread() {
        let tree = PropTree::default();
        let root = tree.create_root(Some("r"));
        let setter = root.clone();
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            setter.set_int(42);
        });

        assert!(tree.wait_for_int(&root, 42, Duration::from_secs(5)).unwrap());
        handle.join().unwrap();
        assert!(!tree.wait_for_int(&root, 1, Duration::from_millis(10)).unwrap());
    }

    #[test]
    fn notify_callback_fires_on_enqueue() {
        let tree = PropTree::default();
        let root = tree.create_root(Some("r"));
        let pings = Arc::new(AtomicUsize::new(0));
        let counter = pings.clone();
        let courier = Courier::with_notify(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let _sub = tree
            .subscribe(
                SubscribeOptions::new()
                    .root(&root)
                    .courier(&courier)
                    .on_int(|_| {}),
            )
            .unwrap();

        root.set_int(1);
        root.set_int(2);
        assert_eq!(pings.load(Ordering::SeqCst), 3);
        assert_eq!(courier.poll(), 3);
    }
}
