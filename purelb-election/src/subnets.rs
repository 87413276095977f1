//! Subnet discovery (spec.md §4.2 "Subnet discovery").

use ipnet::IpNet;
use rtnetlink::Handle;

use crate::error::ElectionError;

/// For each configured interface name, plus (optionally) the default-route
/// interface for each address family, enumerate assigned addresses and
/// reduce them to a deduplicated, sorted subnet list. Missing interfaces are
/// skipped silently, matching spec.md §4.2.
pub async fn discover_local_subnets(
    handle: &Handle,
    interface_names: &[String],
    include_default_route_interfaces: bool,
) -> Result<Vec<IpNet>, ElectionError> {
    let mut link_indices = Vec::new();

    for name in interface_names {
        if let Some(link) = purelb_netlink::links::link_by_name(handle, name)
            .await
            .map_err(ElectionError::SubnetDiscovery)?
        {
            link_indices.push(link.index);
        } else {
            tracing::debug!(interface = %name, "configured interface not found, skipping");
        }
    }

    if include_default_route_interfaces {
        for v6 in [false, true] {
            if let Some(link) = purelb_netlink::links::default_route_link(handle, v6)
                .await
                .map_err(ElectionError::SubnetDiscovery)?
            {
                link_indices.push(link.index);
            }
        }
    }

    link_indices.sort_unstable();
    link_indices.dedup();

    let mut nets = Vec::new();
    for index in link_indices {
        let addrs = purelb_netlink::addresses::list_addresses(handle, index)
            .await
            .map_err(ElectionError::SubnetDiscovery)?;
        nets.extend(purelb_netlink::addresses::subnets_for_discovery(&addrs));
    }
    nets.sort_by_key(|n| (n.addr(), n.prefix_len()));
    nets.dedup();
    Ok(nets)
}
