//! Subscription flags.

use bitflags::bitflags;

bitflags! {
    /// Behaviour switches for a subscription.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct SubFlags: u32 {
        /// Deliver `Destroyed` when the registration node dies.
        const TRACK_DESTROY          = 0x0000_0001;
        /// Trace every event generated for this subscription.
        const DEBUG                  = 0x0000_0002;
        /// Hear `SubscriptionMonitorActive` when ordinary subscribers arrive.
        const MONITOR                = 0x0000_0004;
        /// Queue on the courier's expedited queue.
        const EXPEDITE               = 0x0000_0008;
        /// Directory-only subscription pinged on any change below it.
        const MULTI                  = 0x0000_0010;
        /// Deliver every event synchronously under the tree lock.
        const INLINE                 = 0x0000_0020;
        /// Never generate void value events.
        const IGNORE_VOID            = 0x0000_0040;
        /// Queue `Destroyed` on the expedited queue.
        const TRACK_DESTROY_EXPEDITE = 0x0000_0080;
        /// Skip the synthetic backlog at subscribe time.
        const NO_INITIAL_UPDATE      = 0x0000_0200;
        /// Deliver the backlog synchronously, later events through the courier.
        const DIRECT_UPDATE          = 0x0001_0000;
        /// Do not take any delivery lock.
        const DONT_LOCK              = 0x0002_0000;
        /// Refuse a second registration of the same callback on the same node.
        const SINGLETON              = 0x0004_0000;
        /// Unsubscribe automatically when the registration node dies.
        const AUTO_DESTROY           = 0x0008_0000;
    }
}

impl SubFlags {
    /// Whether the initial backlog is delivered on the subscribing thread.
    pub(crate) fn backlog_is_direct(self) -> bool {
        self.intersects(SubFlags::DIRECT_UPDATE | SubFlags::INLINE)
    }
}
