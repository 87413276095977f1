//! Gratuitous ARP (IPv4) and unsolicited Neighbor Advertisement (IPv6)
//! emission (spec.md §4.3 "GARP").
//!
//! Refreshing peers' ARP/neighbor caches requires an `AF_PACKET` raw socket,
//! which the kernel only lets us address with a `sockaddr_ll` built by hand.
//! This crate carries `unsafe_code = "allow"` in its own `Cargo.toml` (see
//! `purelb-netlink/Cargo.toml`) for exactly this; the unsafe surface is kept
//! to the raw socket syscalls themselves.

use std::mem;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::os::fd::{FromRawFd, OwnedFd};

use tokio::io::unix::AsyncFd;

use crate::error::NetlinkError;

const ETH_P_ARP: u16 = 0x0806;
const ETH_P_IPV6: u16 = 0x86DD;
const ETH_ALEN: usize = 6;
const BROADCAST_MAC: [u8; ETH_ALEN] = [0xff; ETH_ALEN];
/// `33:33:00:00:00:01`, the all-nodes IPv6 multicast MAC.
const IPV6_ALL_NODES_MAC: [u8; ETH_ALEN] = [0x33, 0x33, 0x00, 0x00, 0x00, 0x01];

fn open_packet_socket(ifindex: u32, ethertype: u16) -> Result<OwnedFd, NetlinkError> {
    // SAFETY: `libc::socket` is called with valid, constant arguments; the
    // returned fd is immediately wrapped and owned, so it cannot leak.
    let fd = unsafe { libc::socket(libc::AF_PACKET, libc::SOCK_RAW, (ethertype.to_be() as i32)) };
    if fd < 0 {
        return Err(NetlinkError::RawSocket("AF_PACKET", std::io::Error::last_os_error()));
    }
    // SAFETY: `fd` was just created above and is not owned elsewhere.
    let fd = unsafe { OwnedFd::from_raw_fd(fd) };

    let mut addr: libc::sockaddr_ll = unsafe { mem::zeroed() };
    addr.sll_family = libc::AF_PACKET as u16;
    addr.sll_protocol = ethertype.to_be();
    addr.sll_ifindex = ifindex as i32;

    // SAFETY: `addr` is a validly initialized sockaddr_ll of the size bind()
    // is told to expect.
    let rc = unsafe {
        libc::bind(
            std::os::fd::AsRawFd::as_raw_fd(&fd),
            std::ptr::addr_of!(addr).cast::<libc::sockaddr>(),
            mem::size_of::<libc::sockaddr_ll>() as libc::socklen_t,
        )
    };
    if rc < 0 {
        return Err(NetlinkError::RawSocket("AF_PACKET bind", std::io::Error::last_os_error()));
    }
    Ok(fd)
}

async fn send_frame(ifindex: u32, ethertype: u16, frame: &[u8], label: &'static str) -> Result<(), NetlinkError> {
    let fd = open_packet_socket(ifindex, ethertype)?;
    // SAFETY: `fd` is a freshly bound, non-blocking-capable socket we own
    // exclusively; registering it with the reactor just polls readiness.
    unsafe {
        let flags = libc::fcntl(std::os::fd::AsRawFd::as_raw_fd(&fd), libc::F_GETFL, 0);
        libc::fcntl(std::os::fd::AsRawFd::as_raw_fd(&fd), libc::F_SETFL, flags | libc::O_NONBLOCK);
    }
    let async_fd = AsyncFd::new(fd).map_err(|err| NetlinkError::RawSocket(label, err))?;

    loop {
        let mut guard = async_fd
            .writable()
            .await
            .map_err(|err| NetlinkError::Send(label, err))?;
        // SAFETY: `send` with a valid buffer pointer/length pair on a socket
        // fd we hold exclusive ownership of.
        let rc = unsafe {
            libc::send(
                std::os::fd::AsRawFd::as_raw_fd(async_fd.get_ref()),
                frame.as_ptr().cast(),
                frame.len(),
                0,
            )
        };
        if rc >= 0 {
            return Ok(());
        }
        let err = std::io::Error::last_os_error();
        if err.kind() == std::io::ErrorKind::WouldBlock {
            guard.clear_ready();
            continue;
        }
        return Err(NetlinkError::Send(label, err));
    }
}

fn ethernet_header(dst: [u8; ETH_ALEN], src: [u8; ETH_ALEN], ethertype: u16) -> Vec<u8> {
    let mut frame = Vec::with_capacity(14);
    frame.extend_from_slice(&dst);
    frame.extend_from_slice(&src);
    frame.extend_from_slice(&ethertype.to_be_bytes());
    frame
}

/// Emit a gratuitous ARP: a broadcast ARP request announcing `vip` as
/// belonging to `mac`, sender and target IP both set to `vip` per the usual
/// GARP convention.
pub async fn send_gratuitous_arp(ifindex: u32, mac: [u8; ETH_ALEN], vip: Ipv4Addr) -> Result<(), NetlinkError> {
    let mut frame = ethernet_header(BROADCAST_MAC, mac, ETH_P_ARP);
    frame.extend_from_slice(&1u16.to_be_bytes()); // htype: Ethernet
    frame.extend_from_slice(&0x0800u16.to_be_bytes()); // ptype: IPv4
    frame.push(ETH_ALEN as u8); // hlen
    frame.push(4); // plen
    frame.extend_from_slice(&1u16.to_be_bytes()); // oper: request
    frame.extend_from_slice(&mac); // sender hw addr
    frame.extend_from_slice(&vip.octets()); // sender proto addr
    frame.extend_from_slice(&[0u8; ETH_ALEN]); // target hw addr (unknown)
    frame.extend_from_slice(&vip.octets()); // target proto addr
    send_frame(ifindex, ETH_P_ARP, &frame, "GARP").await
}

fn icmpv6_checksum(src: Ipv6Addr, dst: Ipv6Addr, payload: &[u8]) -> u16 {
    let mut sum: u32 = 0;
    for chunk in src.octets().chunks(2).chain(dst.octets().chunks(2)) {
        sum += u32::from(u16::from_be_bytes([chunk[0], chunk[1]]));
    }
    sum += (payload.len() as u32) & 0xffff;
    sum += u32::from(libc::IPPROTO_ICMPV6 as u16);
    let mut iter = payload.chunks(2);
    for chunk in &mut iter {
        let word = if chunk.len() == 2 {
            u16::from_be_bytes([chunk[0], chunk[1]])
        } else {
            u16::from_be_bytes([chunk[0], 0])
        };
        sum += u32::from(word);
    }
    while sum >> 16 != 0 {
        sum = (sum & 0xffff) + (sum >> 16);
    }
    !(sum as u16)
}

/// Emit an unsolicited Neighbor Advertisement announcing `vip` as belonging
/// to `mac`, the IPv6 analogue of a gratuitous ARP.
pub async fn send_unsolicited_neighbor_advertisement(
    ifindex: u32,
    mac: [u8; ETH_ALEN],
    vip: Ipv6Addr,
) -> Result<(), NetlinkError> {
    const NA_OVERRIDE_FLAG: u32 = 0x2000_0000;

    let mut icmp = Vec::with_capacity(32);
    icmp.push(136); // type: Neighbor Advertisement
    icmp.push(0); // code
    icmp.extend_from_slice(&[0u8, 0u8]); // checksum placeholder
    icmp.extend_from_slice(&NA_OVERRIDE_FLAG.to_be_bytes());
    icmp.extend_from_slice(&vip.octets());
    icmp.push(2); // option type: target link-layer address
    icmp.push(1); // option length in units of 8 octets
    icmp.extend_from_slice(&mac);

    let all_nodes: Ipv6Addr = "ff02::1".parse().expect("valid multicast address");
    let checksum = icmpv6_checksum(vip, all_nodes, &icmp);
    icmp[2..4].copy_from_slice(&checksum.to_be_bytes());

    let mut frame = ethernet_header(IPV6_ALL_NODES_MAC, mac, ETH_P_IPV6);
    frame.push(0x60); // version 6, traffic class high nibble
    frame.extend_from_slice(&[0, 0, 0]); // traffic class low nibble + flow label
    frame.extend_from_slice(&(icmp.len() as u16).to_be_bytes()); // payload length
    frame.push(libc::IPPROTO_ICMPV6 as u8); // next header
    frame.push(255); // hop limit
    frame.extend_from_slice(&vip.octets()); // source: the VIP itself, per the GARP self-referential convention
    frame.extend_from_slice(&all_nodes.octets()); // destination: all-nodes multicast
    frame.extend_from_slice(&icmp);
    send_frame(ifindex, ETH_P_IPV6, &frame, "unsolicited NA").await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn icmpv6_checksum_is_nonzero_for_nonzero_payload() {
        let addr: Ipv6Addr = "2001:db8::1".parse().unwrap();
        let payload = vec![136, 0, 0, 0, 0, 0, 0, 0];
        assert_ne!(icmpv6_checksum(addr, addr, &payload), 0);
    }
}
