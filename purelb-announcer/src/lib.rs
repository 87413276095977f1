//! Local VIP placement, election gating, GARP emission and address-lifetime
//! renewal (spec.md §4.3).
//!
//! Single-owner by design: every mutating [`Announcer`] method takes
//! `&mut self` and is meant to be driven exclusively from the
//! reconciliation-worker task (spec.md §5 "Concurrency invariant"), so no
//! internal locking is needed.

pub mod announcer;
pub mod config;
pub mod endpoints;
pub mod error;
pub mod metrics;
pub mod placement;
pub mod renewals;

pub use announcer::{AnnounceOutcome, Announcer, InterfaceFamily, WinnerLookup};
pub use config::AnnouncerConfig;
pub use error::AnnouncerError;
pub use metrics::{AnnouncerMetrics, NullMetrics};
pub use placement::Placement;
