//! Dummy-interface lifecycle (spec.md §4.3 "Dummy-interface lifecycle").
//!
//! Created on first configuration load, exclusively owned by this process,
//! removed on `Shutdown`. A routing daemon outside this system is expected
//! to notice addresses installed here and advertise routes for them.

use rtnetlink::Handle;

use crate::error::NetlinkError;
use crate::links::{link_by_name, LinkInfo};

/// Ensure a dummy link named `name` exists, creating it if necessary.
/// Idempotent: if the link already exists (e.g. after a restart), it is
/// reused rather than recreated.
pub async fn ensure(handle: &Handle, name: &str) -> Result<LinkInfo, NetlinkError> {
    if let Some(link) = link_by_name(handle, name).await? {
        return Ok(link);
    }
    handle
        .link()
        .add()
        .dummy(name.to_string())
        .execute()
        .await
        .map_err(NetlinkError::Request)?;
    link_by_name(handle, name)
        .await?
        .ok_or_else(|| NetlinkError::LinkNotFound(name.to_string()))
}

/// Remove a dummy link by name. Missing links are treated as already
/// removed, so `Shutdown` is idempotent.
pub async fn remove(handle: &Handle, name: &str) -> Result<(), NetlinkError> {
    let Some(link) = link_by_name(handle, name).await? else {
        return Ok(());
    };
    handle
        .link()
        .del(link.index)
        .execute()
        .await
        .map_err(NetlinkError::Request)
}
