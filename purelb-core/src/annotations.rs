//! Well-known annotation and label keys this system owns (spec.md §6).
//!
//! Centralized the way `kube-core` centralizes its own well-known labels, so
//! the reconciler and the announcer never respell a key differently.

/// Marks a Service as owned by this system (the "brand annotation").
/// Absence means "do not touch" (spec.md §4.4 step 3).
pub const BRAND: &str = "purelb.io/managed";

/// Records which node is currently announcing the Service.
pub const ANNOUNCING_NODE: &str = "purelb.io/announcing-node";

/// Records the interface a VIP is announced on, suffixed by address family
/// when it can be determined (spec.md §4.4).
pub const ANNOUNCING_INTERFACE_IPV4: &str = "purelb.io/announcing-interface-IPv4";
pub const ANNOUNCING_INTERFACE_IPV6: &str = "purelb.io/announcing-interface-IPv6";
pub const ANNOUNCING_INTERFACE_UNKNOWN: &str = "purelb.io/announcing-interface-unknown";

/// The subnet list a node's Lease advertises (spec.md §3, §6).
pub const LEASE_SUBNETS: &str = "purelb.io/subnets";

/// Lease name prefix this system's peer-Lease informer filters on
/// (spec.md §4.2, §6).
pub const LEASE_NAME_PREFIX: &str = "purelb-node-";

/// EndpointSlice-to-Service index label (spec.md §4.1).
pub const SERVICE_NAME_LABEL: &str = "kubernetes.io/service-name";

/// Service keys short-circuited to success without reconciliation
/// (spec.md §4.1 "Filtering").
pub const RESERVED_SERVICE_KEYS: &[&str] = &[
    "default/kubernetes",
    "kube-system/kube-dns",
    "kube-system/kube-controller-manager",
    "kube-system/kube-scheduler",
];

/// Build the Lease object name for a node (spec.md §6:
/// `"purelb-node-" + nodeName`).
pub fn lease_name(node: &str) -> String {
    format!("{LEASE_NAME_PREFIX}{node}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lease_name_has_the_documented_prefix() {
        assert_eq!(lease_name("worker-1"), "purelb-node-worker-1");
    }

    #[test]
    fn reserved_keys_cover_the_documented_set() {
        assert_eq!(RESERVED_SERVICE_KEYS.len(), 4);
        assert!(RESERVED_SERVICE_KEYS.contains(&"default/kubernetes"));
    }
}
