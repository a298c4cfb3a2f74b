//! The queue shared by every courier flavour.

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::config::EngineConfig;
use crate::subscription::{DeliveryLock, Held, PropEvent, SubFlags, SubId, SubShared};

/// One event queued for one subscription.
///
/// Holding a notification keeps the subscription's callback alive even
/// after it was unsubscribed; delivery then checks the zombie flag and
/// drops the event unseen.
pub struct Notification {
    sub: Arc<SubShared>,
    event: PropEvent,
}

impl Notification {
    pub(crate) fn new(sub: Arc<SubShared>, event: PropEvent) -> Self {
        Self { sub, event }
    }

    pub fn event(&self) -> &PropEvent {
        &self.event
    }

    /// The subscription this notification is addressed to.
    pub fn subscription(&self) -> SubId {
        self.sub.id
    }

    /// Lock, re-check, invoke, unlock.
    pub(crate) fn deliver(self, fallback: Option<&dyn DeliveryLock>) {
        let sub = &self.sub;
        if sub.is_zombie() {
            return;
        }
        let lock = if sub.flags.contains(SubFlags::DONT_LOCK) {
            None
        } else {
            sub.lock.as_deref().or(fallback)
        };
        let _held = lock.map(Held::acquire);
        if sub.is_zombie() {
            return;
        }
        sub.invoke_queued(&self.event);
    }
}

impl fmt::Debug for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Notification")
            .field("sub", &self.sub.id)
            .field("event", &self.event)
            .finish()
    }
}

#[derive(Default)]
pub(crate) struct Queues {
    pub(crate) expedite: VecDeque<Notification>,
    pub(crate) normal: VecDeque<Notification>,
    /// Left over from a `poll_timed` pass that ran out of budget.
    pub(crate) deferred: VecDeque<Notification>,
    pub(crate) closed: bool,
}

impl Queues {
    pub(crate) fn is_empty(&self) -> bool {
        self.expedite.is_empty() && self.normal.is_empty() && self.deferred.is_empty()
    }

    pub(crate) fn pop(&mut self) -> Option<Notification> {
        self.deferred
            .pop_front()
            .or_else(|| self.expedite.pop_front())
            .or_else(|| self.normal.pop_front())
    }

    /// Everything queued, in dispatch order.
    pub(crate) fn take_all(&mut self) -> Vec<Notification> {
        let mut out = Vec::with_capacity(self.deferred.len() + self.expedite.len() + self.normal.len());
        out.extend(self.deferred.drain(..));
        out.extend(self.expedite.drain(..));
        out.extend(self.normal.drain(..));
        out
    }
}

/// State shared between a [`Courier`](super::Courier) handle, its thread
/// and the subscriptions delivering through it.
pub(crate) struct CourierInner {
    pub(crate) name: String,
    pub(crate) queues: Mutex<Queues>,
    pub(crate) cond: Condvar,
    pub(crate) entry_lock: Option<Arc<dyn DeliveryLock>>,
    pub(crate) notify: Option<Box<dyn Fn() + Send + Sync>>,
    refs: AtomicUsize,
    slow_debug: Duration,
    slow_info: Duration,
    trace: bool,
}

impl CourierInner {
    pub(crate) fn new(
        name: String,
        entry_lock: Option<Arc<dyn DeliveryLock>>,
        notify: Option<Box<dyn Fn() + Send + Sync>>,
        config: &EngineConfig,
    ) -> Self {
        Self {
            name,
            queues: Mutex::new(Queues::default()),
            cond: Condvar::new(),
            entry_lock,
            notify,
            refs: AtomicUsize::new(0),
            slow_debug: Duration::from_micros(config.slow_dispatch_debug_us),
            slow_info: Duration::from_micros(config.slow_dispatch_info_us),
            trace: config.trace_dispatch,
        }
    }

    /// Append a notification. Called with the tree lock held.
    pub(crate) fn enqueue(&self, notification: Notification, expedite: bool) {
        let rejected = {
            let mut queues = self.queues.lock();
            if queues.closed {
                Some(notification)
            } else {
                if expedite {
                    queues.expedite.push_back(notification);
                } else {
                    queues.normal.push_back(notification);
                }
                None
            }
        };
        if let Some(notification) = rejected {
            tracing::trace!(courier = %self.name, sub = %notification.subscription(), "courier closed, notification released");
            return;
        }
        self.cond.notify_one();
        if let Some(notify) = &self.notify {
            notify();
        }
    }

    pub(crate) fn attach(&self) {
        self.refs.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn detach(&self) {
        self.refs.fetch_sub(1, Ordering::AcqRel);
    }

    pub(crate) fn subscriber_count(&self) -> usize {
        self.refs.load(Ordering::Acquire)
    }

    /// Deliver one notification, logging slow callbacks.
    pub(crate) fn dispatch(&self, notification: Notification) {
        let sub = notification.subscription();
        if self.trace {
            tracing::trace!(courier = %self.name, %sub, event = ?notification.event(), "dispatch");
        }
        let start = Instant::now();
        notification.deliver(self.entry_lock.as_deref());
        let elapsed = start.elapsed();
        if elapsed >= self.slow_info {
            tracing::info!(courier = %self.name, %sub, ?elapsed, "slow property callback");
        } else if elapsed >= self.slow_debug {
            tracing::debug!(courier = %self.name, %sub, ?elapsed, "slow property callback");
        }
    }

    /// Close the queues and release what is left, outside the queue lock.
    pub(crate) fn close(&self) {
        let leftover = {
            let mut queues = self.queues.lock();
            queues.closed = true;
            queues.take_all()
        };
        self.cond.notify_all();
        if !leftover.is_empty() {
            tracing::debug!(courier = %self.name, count = leftover.len(), "releasing undelivered notifications");
        }
        drop(leftover);
    }
}
