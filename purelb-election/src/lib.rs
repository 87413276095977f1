//! Subnet-aware leader election over Kubernetes Leases (spec.md §4.2).
//!
//! Each node runs an [`Elector`], which bootstraps and renews its own Lease,
//! and a [`PeerObserver`] that watches every other node's Lease to build an
//! [`purelb_core::ElectionState`] snapshot. `Elector::winner` combines the
//! two: a per-service, per-VIP deterministic pick among the currently live,
//! healthy nodes.

pub mod config;
pub mod elector;
pub mod error;
pub mod lease_io;
pub mod metrics;
pub mod peers;
pub mod subnets;

pub use config::ElectionConfig;
pub use elector::Elector;
pub use error::ElectionError;
pub use metrics::{ElectionMetrics, NullMetrics};
pub use peers::PeerObserver;
