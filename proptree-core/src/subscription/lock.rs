//! Locks taken around queued deliveries.
//!
//! A subscription may name a lock that its courier holds while the callback
//! runs. Code that owns the observed object takes the same lock before
//! unsubscribing, which guarantees no callback is running or will run once
//! `unsubscribe` returns.

use std::fmt;

use parking_lot::lock_api::RawMutex as _;
use parking_lot::RawMutex;

/// A lock the courier takes around each delivery.
pub trait DeliveryLock: Send + Sync {
    fn lock(&self);
    fn unlock(&self);
}

/// A plain mutual-exclusion lock usable both by couriers and by owners.
///
/// Unlike a `Mutex<()>` guard it can be released from a different call than
/// the one that took it, which is what the courier needs. Lock and unlock
/// must happen on the same thread.
pub struct EntryLock {
    raw: RawMutex,
}

impl EntryLock {
    pub fn new() -> Self {
        Self { raw: RawMutex::INIT }
    }

    /// Take the lock for the lifetime of the returned guard.
    pub fn hold(&self) -> EntryGuard<'_> {
        DeliveryLock::lock(self);
        EntryGuard { lock: self }
    }

    pub fn is_locked(&self) -> bool {
        self.raw.is_locked()
    }
}

impl Default for EntryLock {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EntryLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntryLock")
            .field("locked", &self.is_locked())
            .finish()
    }
}

impl DeliveryLock for EntryLock {
    fn lock(&self) {
        self.raw.lock();
    }

    fn unlock(&self) {
        if !self.raw.is_locked() {
            tracing::warn!("entry lock released while not held");
            return;
        }
        // SAFETY: callers pair this with `lock` on the same thread, through
        // `EntryGuard` or the courier's `Held`.
        unsafe { self.raw.unlock() }
    }
}

/// Guard returned by [`EntryLock::hold`].
pub struct EntryGuard<'a> {
    lock: &'a EntryLock,
}

impl Drop for EntryGuard<'_> {
    fn drop(&mut self) {
        self.lock.unlock();
    }
}

/// A delivery lock built from two closures.
pub struct FnLock<L, U> {
    lock: L,
    unlock: U,
}

impl<L, U> FnLock<L, U>
where
    L: Fn() + Send + Sync,
    U: Fn() + Send + Sync,
{
    pub fn new(lock: L, unlock: U) -> Self {
        Self { lock, unlock }
    }
}

impl<L, U> DeliveryLock for FnLock<L, U>
where
    L: Fn() + Send + Sync,
    U: Fn() + Send + Sync,
{
    fn lock(&self) {
        (self.lock)()
    }

    fn unlock(&self) {
        (self.unlock)()
    }
}

/// Holds a delivery lock until dropped, so a panicking callback still unlocks.
pub(crate) struct Held<'a>(&'a dyn DeliveryLock);

impl<'a> Held<'a> {
    pub(crate) fn acquire(lock: &'a dyn DeliveryLock) -> Self {
        lock.lock();
        Self(lock)
    }
}

impl Drop for Held<'_> {
    fn drop(&mut self) {
        self.0.unlock();
    }
}
