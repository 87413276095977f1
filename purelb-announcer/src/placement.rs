//! The local/remote placement decision (spec.md §4.3 "Local vs. remote
//! decision").

use std::net::IpAddr;

use purelb_netlink::LinkInfo;
use rtnetlink::Handle;

use crate::config::AnnouncerConfig;
use crate::error::AnnouncerError;

/// Where a VIP should be installed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Placement {
    /// A local interface already carries an address whose network contains
    /// the VIP; install it there as a secondary address.
    Local(LinkInfo),
    /// No local interface matches; install on the process-owned dummy
    /// interface for an external routing daemon to pick up.
    Remote,
}

/// Candidate local interfaces: either every link matching the configured
/// name/regex, or the single default-route interface for `vip`'s address
/// family when no pattern is configured.
async fn candidate_links(handle: &Handle, config: &AnnouncerConfig, vip: IpAddr) -> Result<Vec<LinkInfo>, AnnouncerError> {
    if let Some(pattern) = &config.local_interface_pattern {
        return purelb_netlink::links::links_matching(handle, pattern)
            .await
            .map_err(AnnouncerError::Placement);
    }
    let link = purelb_netlink::links::default_route_link(handle, vip.is_ipv6())
        .await
        .map_err(AnnouncerError::Placement)?;
    Ok(link.into_iter().collect())
}

/// Decide whether `vip` is local or remote (spec.md §4.3).
pub async fn determine(handle: &Handle, config: &AnnouncerConfig, vip: IpAddr) -> Result<Placement, AnnouncerError> {
    for link in candidate_links(handle, config, vip).await? {
        let addrs = purelb_netlink::addresses::list_addresses(handle, link.index)
            .await
            .map_err(AnnouncerError::Placement)?;
        if purelb_netlink::addresses::contains(&addrs, vip) {
            return Ok(Placement::Local(link));
        }
    }
    Ok(Placement::Remote)
}
