//! `ServiceAssignment` and `AnnouncedAddress` (spec.md §3).

use std::net::IpAddr;

use educe::Educe;

/// Per-service local state held by the reconciler: which VIPs this Service
/// currently advertises.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServiceAssignment {
    pub ns_name: String,
    pub ingresses: Vec<IpAddr>,
}

impl ServiceAssignment {
    pub fn new(ns_name: impl Into<String>) -> Self {
        Self {
            ns_name: ns_name.into(),
            ingresses: Vec::new(),
        }
    }
}

/// A (VIP, interface, lifetime-options) tuple currently installed on a link
/// (spec.md §3). The announcer is the sole writer.
#[derive(Educe)]
#[educe(Clone, Debug, PartialEq)]
pub struct AnnouncedAddress {
    pub vip: IpAddr,
    pub interface: String,
    /// Clamped `validLifetime` in seconds; `0` means permanent.
    pub valid_lifetime_secs: u32,
    /// Clamped `preferredLifetime` in seconds; always `<= valid_lifetime_secs`
    /// unless `valid_lifetime_secs == 0`.
    pub preferred_lifetime_secs: u32,
}

impl AnnouncedAddress {
    /// Build an `AnnouncedAddress`, applying the clamping contract from
    /// spec.md §4.3: `validLifetime = 0` is permanent and left alone;
    /// otherwise the effective valid lifetime is `max(configured, 60)` and
    /// the preferred lifetime is clamped to `min(preferred, valid)`.
    pub fn new(vip: IpAddr, interface: impl Into<String>, valid_lifetime_secs: u32, preferred_lifetime_secs: u32) -> Self {
        let (valid, preferred) = clamp_lifetimes(valid_lifetime_secs, preferred_lifetime_secs);
        Self {
            vip,
            interface: interface.into(),
            valid_lifetime_secs: valid,
            preferred_lifetime_secs: preferred,
        }
    }

    /// `None` for a permanent address; otherwise the renewal cadence from
    /// spec.md §4.3: `max(validLifetime / 2, 30s)`.
    pub fn renewal_interval(&self) -> Option<std::time::Duration> {
        if self.valid_lifetime_secs == 0 {
            return None;
        }
        let half = self.valid_lifetime_secs / 2;
        Some(std::time::Duration::from_secs(half.max(30) as u64))
    }
}

/// Apply the address-lifetime clamping contract (spec.md §4.3, §8 item 8).
pub fn clamp_lifetimes(valid_lifetime_secs: u32, preferred_lifetime_secs: u32) -> (u32, u32) {
    if valid_lifetime_secs == 0 {
        return (0, 0);
    }
    let valid = valid_lifetime_secs.max(60);
    let preferred = preferred_lifetime_secs.min(valid);
    (valid, preferred)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_valid_lifetime_is_permanent() {
        assert_eq!(clamp_lifetimes(0, 500), (0, 0));
    }

    #[test]
    fn short_valid_lifetime_is_raised_to_floor() {
        let (valid, _) = clamp_lifetimes(10, 5);
        assert_eq!(valid, 60);
    }

    #[test]
    fn preferred_never_exceeds_valid() {
        let (valid, preferred) = clamp_lifetimes(300, 1_000);
        assert_eq!(valid, 300);
        assert_eq!(preferred, 300);
    }

    #[test]
    fn renewal_interval_is_half_valid_floored_at_30s() {
        let addr = AnnouncedAddress::new("10.0.0.1".parse().unwrap(), "eth0", 300, 200);
        assert_eq!(addr.renewal_interval(), Some(std::time::Duration::from_secs(150)));

        let short = AnnouncedAddress::new("10.0.0.1".parse().unwrap(), "eth0", 10, 5);
        assert_eq!(short.renewal_interval(), Some(std::time::Duration::from_secs(60)));

        let permanent = AnnouncedAddress::new("10.0.0.1".parse().unwrap(), "eth0", 0, 0);
        assert_eq!(permanent.renewal_interval(), None);
    }

    proptest::proptest! {
        #[test]
        fn clamping_invariant_holds_for_any_input(valid in 0u32..100_000, preferred in 0u32..100_000) {
            let (v, p) = clamp_lifetimes(valid, preferred);
            proptest::prop_assert!(v >= 60 || v == 0);
            proptest::prop_assert!(p <= v);
        }
    }
}
