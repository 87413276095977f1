//! Address enumeration, subnet discovery and `AddrReplace` installation
//! (spec.md §4.2 "Subnet discovery", §4.3 "Address lifetime & renewal").

use std::net::IpAddr;

use futures::TryStreamExt;
use ipnet::IpNet;
use netlink_packet_route::address::{AddressAttribute, AddressMessage};
use rtnetlink::Handle;

use crate::error::NetlinkError;

// Kernel `IFA_F_*` bits (linux/if_addr.h). Hardcoded rather than pulled from
// a crate enum: these numeric values are kernel ABI and have not changed
// since IPv6 address flags were introduced.
const IFA_F_DEPRECATED: u32 = 0x20;
const IFA_F_TENTATIVE: u32 = 0x40;
const IFA_F_DADFAILED: u32 = 0x08;

/// The flag bits spec.md §4.2 says to skip an IPv6 address for: "Skip IPv6
/// addresses with `DADFAILED | DEPRECATED | TENTATIVE` flag bits set".
const SKIP_MASK: u32 = IFA_F_DEPRECATED | IFA_F_TENTATIVE | IFA_F_DADFAILED;

/// A raw `IFA_F_*` bitmask, kept opaque so callers test against named bits
/// rather than poke at the integer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AddressFlags(u32);

impl AddressFlags {
    pub fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    pub fn should_skip_for_discovery(self) -> bool {
        self.0 & SKIP_MASK != 0
    }
}

/// One address assigned to a link, as discovered via netlink.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DiscoveredAddress {
    pub ip: IpAddr,
    pub prefix_len: u8,
    pub flags: AddressFlags,
}

fn parse_message(msg: &AddressMessage) -> Option<DiscoveredAddress> {
    let ip = msg.attributes.iter().find_map(|attr| match attr {
        AddressAttribute::Address(addr) => Some(*addr),
        _ => None,
    })?;
    let raw_flags = msg
        .attributes
        .iter()
        .find_map(|attr| match attr {
            AddressAttribute::Flags(flags) => Some(flags.bits()),
            _ => None,
        })
        .unwrap_or(u32::from(msg.header.flags.bits()));
    Some(DiscoveredAddress {
        ip,
        prefix_len: msg.header.prefix_len,
        flags: AddressFlags::from_raw(raw_flags),
    })
}

/// List every address assigned to a link.
pub async fn list_addresses(handle: &Handle, link_index: u32) -> Result<Vec<DiscoveredAddress>, NetlinkError> {
    let mut addrs = Vec::new();
    let mut stream = handle
        .address()
        .get()
        .set_link_index_filter(link_index)
        .execute();
    while let Some(msg) = stream.try_next().await.map_err(NetlinkError::Request)? {
        if let Some(addr) = parse_message(&msg) {
            addrs.push(addr);
        }
    }
    Ok(addrs)
}

/// `fe80::/10`, the IPv6 link-local block spec.md §4.2 says to always skip.
fn is_ipv6_link_local(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V6(v6) => (v6.segments()[0] & 0xffc0) == 0xfe80,
        IpAddr::V4(_) => false,
    }
}

/// Reduce a link's addresses to the deduplicated, sorted subnet list spec.md
/// §4.2 wants published on this node's Lease: each address's *network*
/// (the address masked by its prefix), skipping flagged and link-local IPv6
/// addresses.
pub fn subnets_for_discovery(addrs: &[DiscoveredAddress]) -> Vec<IpNet> {
    let mut nets: Vec<IpNet> = addrs
        .iter()
        .filter(|addr| !is_ipv6_link_local(addr.ip))
        .filter(|addr| !(addr.ip.is_ipv6() && addr.flags.should_skip_for_discovery()))
        .filter_map(|addr| IpNet::new(addr.ip, addr.prefix_len).ok())
        .map(|net| net.trunc())
        .collect();
    nets.sort_by_key(|n| (n.addr(), n.prefix_len()));
    nets.dedup();
    nets
}

/// Whether any address on this link is in the same network as `vip`: the
/// "local" half of spec.md §4.3's local/remote placement decision.
pub fn contains(addrs: &[DiscoveredAddress], vip: IpAddr) -> bool {
    addrs.iter().any(|addr| {
        IpNet::new(addr.ip, addr.prefix_len)
            .map(|net| net.contains(&vip))
            .unwrap_or(false)
    })
}

/// Install `vip/prefix_len` on `link_index`, idempotently: a netlink
/// `AddrReplace`, not a bare add that would fail if the address already
/// exists (spec.md §4.3, §5 "it uses `AddrReplace` (idempotent) for
/// installation").
pub async fn add_or_replace(
    handle: &Handle,
    link_index: u32,
    vip: IpAddr,
    prefix_len: u8,
    valid_lifetime_secs: u32,
    preferred_lifetime_secs: u32,
) -> Result<(), NetlinkError> {
    let mut request = handle
        .address()
        .add(link_index, vip, prefix_len)
        .replace();
    if valid_lifetime_secs != 0 {
        request = request.valid_lifetime(valid_lifetime_secs).preferred_lifetime(preferred_lifetime_secs);
    }
    request.execute().await.map_err(NetlinkError::Request)
}

/// Remove `vip/prefix_len` from `link_index`. The announcer never calls this
/// for an address it does not already have in its own table (spec.md §5
/// "refuses to remove an address not in its own table").
pub async fn remove(handle: &Handle, link_index: u32, vip: IpAddr, prefix_len: u8) -> Result<(), NetlinkError> {
    let mut addrs = handle
        .address()
        .get()
        .set_link_index_filter(link_index)
        .execute();
    while let Some(msg) = addrs.try_next().await.map_err(NetlinkError::Request)? {
        let matches = msg.attributes.iter().any(
            |attr| matches!(attr, AddressAttribute::Address(addr) if *addr == vip),
        ) && msg.header.prefix_len == prefix_len;
        if matches {
            handle
                .address()
                .del(msg)
                .execute()
                .await
                .map_err(NetlinkError::Request)?;
            return Ok(());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(ip: &str, flags: u32) -> DiscoveredAddress {
        DiscoveredAddress {
            ip: ip.parse().unwrap(),
            prefix_len: if ip.contains(':') { 64 } else { 24 },
            flags: AddressFlags::from_raw(flags),
        }
    }

    #[test]
    fn skips_dadfailed_deprecated_tentative_and_link_local() {
        let addrs = vec![
            addr("192.168.1.5", 0),
            addr("fe80::1", 0),
            addr("2001:db8::1", IFA_F_TENTATIVE),
            addr("2001:db8::2", IFA_F_DADFAILED),
            addr("2001:db8::3", IFA_F_DEPRECATED),
            addr("2001:db8::4", 0),
        ];
        let nets = subnets_for_discovery(&addrs);
        assert_eq!(nets.len(), 2);
        assert!(nets.iter().any(|n| n.to_string() == "192.168.1.0/24"));
        assert!(nets.iter().any(|n| n.to_string() == "2001:db8::/64"));
    }

    #[test]
    fn dedupes_and_sorts() {
        let addrs = vec![addr("10.0.0.5", 0), addr("10.0.0.6", 0)];
        let nets = subnets_for_discovery(&addrs);
        assert_eq!(nets.len(), 1);
        assert_eq!(nets[0].to_string(), "10.0.0.0/24");
    }

    #[test]
    fn contains_checks_network_membership() {
        let addrs = vec![addr("10.0.0.5", 0)];
        assert!(contains(&addrs, "10.0.0.200".parse().unwrap()));
        assert!(!contains(&addrs, "10.0.1.200".parse().unwrap()));
    }
}
