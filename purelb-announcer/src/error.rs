//! The `NetlinkFailure` error kind as it surfaces from the announcer
//! (spec.md §7).

#[derive(Debug, thiserror::Error)]
pub enum AnnouncerError {
    #[error("failed to install or withdraw an address")]
    Netlink(#[source] purelb_netlink::NetlinkError),

    #[error("failed to resolve local/remote placement")]
    Placement(#[source] purelb_netlink::NetlinkError),
}
