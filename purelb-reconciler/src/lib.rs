//! Ties election and announcement together into the Service reconciliation
//! loop (spec.md §4, §5).

pub mod config;
pub mod context;
pub mod controller;
pub mod error;
pub mod glue;
pub mod index;
pub mod metrics;
pub mod state;

pub use config::ReconcilerConfig;
pub use context::Context;
pub use error::ReconcilerError;
pub use metrics::{NullMetrics, ReconcilerMetrics};
pub use state::ServiceAssignments;
