//! Error kinds for the election subsystem (spec.md §7: `RenewalFailure`,
//! plus the underlying `TransientAPI` causes).

#[derive(Debug, thiserror::Error)]
pub enum ElectionError {
    #[error("failed to read this node's UID")]
    ReadNode(#[source] kube::Error),

    #[error("node {0:?} has no UID")]
    MissingNodeUid(String),

    #[error("failed to apply this node's Lease")]
    ApplyLease(#[source] kube::Error),

    #[error("failed to delete this node's Lease")]
    DeleteLease(#[source] kube::Error),

    #[error("failed to read this node's Lease after applying it")]
    MissingRenewTime,

    #[error("failed to discover local subnets")]
    SubnetDiscovery(#[source] purelb_netlink::NetlinkError),

    #[error("peer Lease watch failed")]
    Watch(#[source] kube::runtime::watcher::Error),

    #[error("API call did not complete within the deadline")]
    Timeout,
}
