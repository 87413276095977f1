//! Link enumeration and the local/remote placement lookups (spec.md §4.3).

use futures::TryStreamExt;
use netlink_packet_route::link::LinkAttribute;
use regex::Regex;
use rtnetlink::Handle;

use crate::error::NetlinkError;

/// A link's stable identity for the purposes of address placement.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LinkInfo {
    pub index: u32,
    pub name: String,
    /// The link's hardware (Ethernet) address, when it has one. Dummy and
    /// loopback links carry one too; only tunnel-type links lack it.
    pub mac: Option<[u8; 6]>,
}

/// List every link the kernel knows about.
pub async fn list_links(handle: &Handle) -> Result<Vec<LinkInfo>, NetlinkError> {
    let mut links = Vec::new();
    let mut stream = handle.link().get().execute();
    while let Some(msg) = stream.try_next().await.map_err(NetlinkError::Request)? {
        let name = msg.attributes.iter().find_map(|attr| match attr {
            LinkAttribute::IfName(name) => Some(name.clone()),
            _ => None,
        });
        let mac = msg.attributes.iter().find_map(|attr| match attr {
            LinkAttribute::Address(bytes) if bytes.len() == 6 => {
                let mut mac = [0u8; 6];
                mac.copy_from_slice(bytes);
                Some(mac)
            }
            _ => None,
        });
        if let Some(name) = name {
            links.push(LinkInfo {
                index: msg.header.index,
                name,
                mac,
            });
        }
    }
    Ok(links)
}

/// Resolve a single link by its exact name. Missing interfaces are not an
/// error at the call site: spec.md §4.2 says "missing interfaces are
/// skipped silently" for subnet discovery, so callers that need that
/// behavior should treat `Ok(None)` as "skip".
pub async fn link_by_name(handle: &Handle, name: &str) -> Result<Option<LinkInfo>, NetlinkError> {
    Ok(list_links(handle)
        .await?
        .into_iter()
        .find(|link| link.name == name))
}

/// Resolve every link whose name matches a user-configured regex
/// (spec.md §4.3 "a *local* interface (either one matching a user-configured
/// name/regex ...)").
pub async fn links_matching(handle: &Handle, pattern: &str) -> Result<Vec<LinkInfo>, NetlinkError> {
    let re = Regex::new(pattern)
        .map_err(|err| NetlinkError::InvalidInterfacePattern(pattern.to_string(), err))?;
    Ok(list_links(handle)
        .await?
        .into_iter()
        .filter(|link| re.is_match(&link.name))
        .collect())
}

/// The interface index carrying the default route, if any, for the given
/// address family (spec.md §4.2 subnet discovery, §4.3 remote placement).
///
/// A default route is the one whose destination prefix is absent (the
/// kernel's `0.0.0.0/0` / `::/0`).
pub async fn default_route_link(handle: &Handle, v6: bool) -> Result<Option<LinkInfo>, NetlinkError> {
    use netlink_packet_route::route::{RouteAddress, RouteAttribute, RouteMessage};

    let ip_version = if v6 {
        rtnetlink::IpVersion::V6
    } else {
        rtnetlink::IpVersion::V4
    };
    let mut stream = handle.route().get(ip_version).execute();
    let mut default_route: Option<RouteMessage> = None;
    while let Some(route) = stream.try_next().await.map_err(NetlinkError::Request)? {
        let has_destination = route
            .attributes
            .iter()
            .any(|attr| matches!(attr, RouteAttribute::Destination(RouteAddress::Inet(_) | RouteAddress::Inet6(_))));
        if !has_destination {
            default_route = Some(route);
            break;
        }
    }
    let Some(route) = default_route else {
        return Ok(None);
    };
    let oif = route.attributes.iter().find_map(|attr| match attr {
        RouteAttribute::Oif(idx) => Some(*idx),
        _ => None,
    });
    let Some(index) = oif else {
        return Ok(None);
    };
    Ok(list_links(handle)
        .await?
        .into_iter()
        .find(|link| link.index == index))
}
