//! The `NetlinkFailure` error kind (spec.md §7).

#[derive(Debug, thiserror::Error)]
pub enum NetlinkError {
    #[error("failed to open netlink route socket")]
    Connect(#[source] std::io::Error),

    #[error("link {0:?} not found")]
    LinkNotFound(String),

    #[error("netlink request failed")]
    Request(#[source] rtnetlink::Error),

    #[error("failed to build {0} socket")]
    RawSocket(&'static str, #[source] std::io::Error),

    #[error("failed to send {0} frame")]
    Send(&'static str, #[source] std::io::Error),

    #[error("invalid interface name regex {0:?}")]
    InvalidInterfacePattern(String, #[source] regex::Error),
}
