//! Data model and pure algorithms shared by the PureLB node-side announcer.
//!
//! Nothing in this crate touches the network or the Kubernetes API: it is the
//! part of the system that a property test can exercise without a cluster.

pub mod annotations;
pub mod election;
pub mod identity;
pub mod lease;
pub mod renewal;
pub mod service;
pub mod subnet;

pub use election::{ElectionState, Winner};
pub use identity::NodeIdentity;
pub use lease::LeaseRecord;
pub use renewal::AddressRenewal;
pub use service::{clamp_lifetimes, AnnouncedAddress, ServiceAssignment};
pub use subnet::{format_subnets, parse_subnets, SubnetError};
