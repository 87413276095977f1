//! `AddressRenewal`: a timer-bound renewal record for one `(service, VIP)`
//! pair (spec.md §3).
//!
//! The actual timer task lives in `purelb-announcer`, which is the only
//! crate that touches tokio; this type is the cancellation token and
//! bookkeeping the spec's invariant is stated in terms of: "at most one
//! non-cancelled `AddressRenewal` per (nsName, v)".

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// A cancellable handle to a scheduled renewal. Cloning shares the same
/// cancellation flag, so the timer task and the owning map both observe a
/// `cancel()` call immediately.
#[derive(Clone, Debug)]
pub struct AddressRenewal {
    interval: Duration,
    cancelled: Arc<AtomicBool>,
}

impl AddressRenewal {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Stop and discard the timer. Checked by the renewal task at each fire
    /// (spec.md §4.3 "Rescheduling ... cancellation stops and discards the
    /// timer").
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_uncancelled_and_observes_cancel_through_clones() {
        let renewal = AddressRenewal::new(Duration::from_secs(30));
        let clone = renewal.clone();
        assert!(!renewal.is_cancelled());
        clone.cancel();
        assert!(renewal.is_cancelled());
    }
}
