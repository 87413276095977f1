//! Parsing and formatting of the `purelb.io/subnets` Lease annotation.
//!
//! The annotation is a comma-joined list of CIDR strings (spec.md §3, §6).
//! Subnet discovery (spec.md §4.2) always produces a deduplicated, sorted
//! list before formatting, so `format_subnets(parse_subnets(s)) == s` holds
//! for any string already in that canonical form (spec.md §8 item 7).

use ipnet::IpNet;

/// Parse a comma-joined CIDR list into a deduplicated, sorted vector.
///
/// An empty string parses to an empty list. Each element is trimmed before
/// parsing so annotations hand-edited with stray whitespace still round-trip.
pub fn parse_subnets(s: &str) -> Result<Vec<IpNet>, SubnetError> {
    let mut nets = Vec::new();
    for part in s.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let net: IpNet = part
            .parse()
            .map_err(|_| SubnetError::InvalidCidr(part.to_string()))?;
        nets.push(net.trunc());
    }
    nets.sort_by_key(|n| (n.addr(), n.prefix_len()));
    nets.dedup();
    Ok(nets)
}

/// Format a subnet list back into the canonical comma-joined annotation form.
///
/// The input is deduplicated and sorted first, so callers never need to
/// canonicalize before formatting.
pub fn format_subnets(nets: &[IpNet]) -> String {
    let mut nets: Vec<IpNet> = nets.iter().map(|n| n.trunc()).collect();
    nets.sort_by_key(|n| (n.addr(), n.prefix_len()));
    nets.dedup();
    nets.iter()
        .map(|n| n.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

#[derive(Debug, thiserror::Error)]
pub enum SubnetError {
    #[error("invalid CIDR {0:?}")]
    InvalidCidr(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_sorted_deduplicated_lists() {
        let canonical = "10.0.0.0/8,192.168.1.0/24";
        let parsed = parse_subnets(canonical).unwrap();
        assert_eq!(format_subnets(&parsed), canonical);
    }

    #[test]
    fn dedupes_and_sorts_out_of_order_input() {
        let nets = parse_subnets("192.168.1.0/24,10.0.0.0/8,192.168.1.0/24").unwrap();
        assert_eq!(format_subnets(&nets), "10.0.0.0/8,192.168.1.0/24");
    }

    #[test]
    fn empty_string_is_empty_list() {
        assert!(parse_subnets("").unwrap().is_empty());
        assert_eq!(format_subnets(&[]), "");
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_subnets("not-a-cidr").is_err());
    }

    proptest::proptest! {
        #[test]
        fn round_trip_holds_for_any_canonical_list(
            a in 0u8..255, b in 0u8..255, pa in 0u8..32,
            c in 0u8..255, d in 0u8..255, pb in 0u8..32,
        ) {
            let raw = format!("{a}.{b}.0.0/{pa},{c}.{d}.0.0/{pb}");
            if let Ok(nets) = parse_subnets(&raw) {
                let formatted = format_subnets(&nets);
                let reparsed = parse_subnets(&formatted).unwrap();
                proptest::prop_assert_eq!(nets, reparsed);
            }
        }
    }
}
