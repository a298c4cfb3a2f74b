//! Courier handles: the thread, passive and waitable flavours.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use super::queue::{CourierInner, Queues};
use super::Notification;
use crate::config::EngineConfig;
use crate::error::Result;
use crate::subscription::{DeliveryLock, SubscribeOptions};
use crate::tree::{Prop, PropTree};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flavour {
    Thread,
    Passive,
    Waitable,
}

/// A delivery context for queued notifications.
///
/// Subscriptions name a courier with [`SubscribeOptions::courier`]; their
/// events are appended here in mutation order and handed to the callback
/// when the courier drains. Dropping the courier closes it.
pub struct Courier {
    inner: Arc<CourierInner>,
    flavour: Flavour,
    thread: Option<JoinHandle<()>>,
}

impl Courier {
    /// A courier with its own named dispatch thread.
    pub fn thread(name: &str) -> Result<Self> {
        Self::spawn(CourierInner::new(name.to_string(), None, None, &EngineConfig::default()))
    }

    /// A thread courier that holds `lock` around deliveries of
    /// subscriptions that bring no lock of their own.
    pub fn thread_with(name: &str, lock: Arc<dyn DeliveryLock>) -> Result<Self> {
        Self::spawn(CourierInner::new(
            name.to_string(),
            Some(lock),
            None,
            &EngineConfig::default(),
        ))
    }

    pub(crate) fn thread_for(name: &str, config: &EngineConfig) -> Result<Self> {
        Self::spawn(CourierInner::new(name.to_string(), None, None, config))
    }

    fn spawn(inner: CourierInner) -> Result<Self> {
        let inner = Arc::new(inner);
        let worker = inner.clone();
        let thread = thread::Builder::new()
            .name(inner.name.clone())
            .spawn(move || run(&worker))?;
        tracing::debug!(courier = %inner.name, "courier thread started");
        Ok(Self {
            inner,
            flavour: Flavour::Thread,
            thread: Some(thread),
        })
    }

    /// A courier drained by calling [`poll`](Self::poll).
    pub fn passive() -> Self {
        Self::unthreaded(Flavour::Passive, None, None)
    }

    pub fn passive_with_lock(lock: Arc<dyn DeliveryLock>) -> Self {
        Self::unthreaded(Flavour::Passive, Some(lock), None)
    }

    /// A passive courier that calls `notify` after every enqueue.
    ///
    /// `notify` runs on the mutating thread with the tree lock held. It
    /// should only schedule a later [`poll`](Self::poll).
    pub fn with_notify<F>(notify: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self::unthreaded(Flavour::Passive, None, Some(Box::new(notify)))
    }

    /// A courier drained by [`wait`](Self::wait) from a thread of the caller's choosing.
    pub fn waitable() -> Self {
        Self::unthreaded(Flavour::Waitable, None, None)
    }

    fn unthreaded(
        flavour: Flavour,
        lock: Option<Arc<dyn DeliveryLock>>,
        notify: Option<Box<dyn Fn() + Send + Sync>>,
    ) -> Self {
        let name = match flavour {
            Flavour::Waitable => "waitable",
            _ => "passive",
        };
        Self {
            inner: Arc::new(CourierInner::new(
                name.to_string(),
                lock,
                notify,
                &EngineConfig::default(),
            )),
            flavour,
            thread: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Number of live subscriptions delivering through this courier.
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscriber_count()
    }

    pub fn has_pending(&self) -> bool {
        !self.inner.queues.lock().is_empty()
    }

    /// Deliver everything queued, expedited entries first.
    ///
    /// Notifications enqueued by the callbacks themselves are delivered in
    /// the same call. Returns the number of notifications dispatched.
    pub fn poll(&self) -> usize {
        let mut count = 0;
        loop {
            let next = self.inner.queues.lock().pop();
            let Some(notification) = next else {
                break;
            };
            self.inner.dispatch(notification);
            count += 1;
        }
        count
    }

    /// Deliver queued notifications until `budget` is spent.
    ///
    /// What is left is kept, ahead of newer entries, for the next call.
    pub fn poll_timed(&self, budget: Duration) -> usize {
        let deadline = Instant::now() + budget;
        let batch = self.inner.queues.lock().take_all();
        let mut rest = batch.into_iter();
        let mut count = 0;
        for notification in rest.by_ref() {
            self.inner.dispatch(notification);
            count += 1;
            if Instant::now() >= deadline {
                break;
            }
        }
        let leftover: Vec<Notification> = rest.collect();
        if !leftover.is_empty() {
            tracing::debug!(courier = %self.inner.name, left = leftover.len(), "poll budget exhausted");
            let mut queues = self.inner.queues.lock();
            for notification in leftover.into_iter().rev() {
                queues.deferred.push_front(notification);
            }
        }
        count
    }

    /// Block until something is queued or `timeout` passes, then take it all.
    pub fn wait(&self, timeout: Option<Duration>) -> Vec<Notification> {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut queues = self.inner.queues.lock();
        while queues.is_empty() && !queues.closed {
            match deadline {
                Some(deadline) => {
                    if self.inner.cond.wait_until(&mut queues, deadline).timed_out() {
                        break;
                    }
                }
                None => self.inner.cond.wait(&mut queues),
            }
        }
        queues.take_all()
    }

    /// Deliver a batch returned by [`wait`](Self::wait).
    pub fn dispatch_batch(&self, batch: Vec<Notification>) {
        for notification in batch {
            self.inner.dispatch(notification);
        }
    }

    /// [`wait`](Self::wait) followed by [`dispatch_batch`](Self::dispatch_batch).
    pub fn wait_and_dispatch(&self, timeout: Option<Duration>) -> usize {
        let batch = self.wait(timeout);
        let count = batch.len();
        self.dispatch_batch(batch);
        count
    }

    pub(crate) fn inner(&self) -> &Arc<CourierInner> {
        &self.inner
    }
}

/// Thread courier loop: all expedited entries plus one normal per pass.
fn run(inner: &CourierInner) {
    loop {
        let (expedited, next) = {
            let mut queues = inner.queues.lock();
            while !queues.closed && queues.is_empty() {
                inner.cond.wait(&mut queues);
            }
            if queues.closed {
                break;
            }
            take_pass(&mut queues)
        };
        for notification in expedited {
            inner.dispatch(notification);
        }
        if let Some(notification) = next {
            inner.dispatch(notification);
        }
    }
    tracing::debug!(courier = %inner.name, "courier thread exiting");
}

fn take_pass(queues: &mut Queues) -> (Vec<Notification>, Option<Notification>) {
    let mut expedited: Vec<Notification> = queues.deferred.drain(..).collect();
    expedited.extend(queues.expedite.drain(..));
    (expedited, queues.normal.pop_front())
}

impl Drop for Courier {
    fn drop(&mut self) {
        self.inner.close();
        let refs = self.inner.subscriber_count();
        if refs > 0 {
            tracing::error!(courier = %self.inner.name, refs, "courier dropped while subscriptions still use it");
        }
        if let Some(thread) = self.thread.take() {
            if thread.thread().id() == thread::current().id() {
                return;
            }
            if thread.join().is_err() {
                tracing::error!(courier = %self.inner.name, "courier thread panicked");
            }
        }
    }
}

impl fmt::Debug for Courier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Courier")
            .field("name", &self.inner.name)
            .field("flavour", &self.flavour)
            .field("subscribers", &self.inner.subscriber_count())
            .finish()
    }
}

impl PropTree {
    /// Block until `prop` holds the integer `value`, or `timeout` passes.
    ///
    /// Returns whether the value was seen.
    pub fn wait_for_int(&self, prop: &Prop, value: i32, timeout: Duration) -> Result<bool> {
        let courier = Courier::waitable();
        let seen = Arc::new(AtomicBool::new(false));
        let flag = seen.clone();
        let sub = self.subscribe(
            SubscribeOptions::new()
                .root(prop)
                .courier(&courier)
                .on_int(move |v| {
                    if v == value {
                        flag.store(true, Ordering::Release);
                    }
                }),
        )?;

        let deadline = Instant::now() + timeout;
        while !seen.load(Ordering::Acquire) {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            courier.wait_and_dispatch(Some(deadline - now));
        }
        drop(sub);
        Ok(seen.load(Ordering::Acquire))
    }
}
