//! Local networking primitives the announcer builds on (spec.md §4.3).
//!
//! Everything here is synchronous-looking from the caller's point of view
//! (each call `.await`s a netlink round trip) but none of it blocks: spec.md
//! §5 expects netlink calls to "return promptly" and not be cancelled, so we
//! don't wrap them in timeouts here — the caller decides.

pub mod addresses;
pub mod dummy;
pub mod error;
pub mod garp;
pub mod links;

pub use addresses::{AddressFlags, DiscoveredAddress};
pub use error::NetlinkError;
pub use links::LinkInfo;

use rtnetlink::Handle;

/// Open a netlink route socket and spawn its driving connection task.
///
/// Mirrors the standard `rtnetlink` bootstrap: `new_connection` hands back a
/// background future that must be polled for the `Handle` to make progress.
pub fn connect() -> Result<Handle, NetlinkError> {
    let (connection, handle, _messages) =
        rtnetlink::new_connection().map_err(NetlinkError::Connect)?;
    tokio::spawn(connection);
    Ok(handle)
}
