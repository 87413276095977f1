//! The eight metrics spec.md §6 names, registered on the default
//! `prometheus` registry the way the reference pack's controller binaries
//! do it.

use std::sync::Arc;

use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use purelb_announcer::AnnouncerMetrics;
use purelb_election::ElectionMetrics;
use purelb_reconciler::ReconcilerMetrics;

pub struct Metrics {
    registry: Registry,
    lease_healthy: IntGauge,
    lease_renewals_total: IntCounter,
    lease_renewal_failures_total: IntCounter,
    member_count: IntGauge,
    winner_changes_total: IntCounterVec,
    address_additions_total: IntCounter,
    address_withdrawals_total: IntCounter,
    garp_sent_total: IntCounter,
}

impl Metrics {
    pub fn new() -> Result<Arc<Self>, prometheus::Error> {
        let registry = Registry::new();

        let lease_healthy = IntGauge::new("lease_healthy", "1 if this node's own lease renewals are currently succeeding")?;
        let lease_renewals_total = IntCounter::new("lease_renewals_total", "Total successful lease renewals")?;
        let lease_renewal_failures_total = IntCounter::new("lease_renewal_failures_total", "Total failed lease renewal attempts")?;
        let member_count = IntGauge::new("member_count", "Number of live peer nodes in the current election snapshot")?;
        let winner_changes_total = IntCounterVec::new(
            Opts::new("winner_changes_total", "Total times a service's announcing node changed"),
            &["service"],
        )?;
        let address_additions_total = IntCounter::new("address_additions_total", "Total VIP address installs")?;
        let address_withdrawals_total = IntCounter::new("address_withdrawals_total", "Total VIP address withdrawals")?;
        let garp_sent_total = IntCounter::new("garp_sent_total", "Total gratuitous ARP / unsolicited NA packets sent")?;

        registry.register(Box::new(lease_healthy.clone()))?;
        registry.register(Box::new(lease_renewals_total.clone()))?;
        registry.register(Box::new(lease_renewal_failures_total.clone()))?;
        registry.register(Box::new(member_count.clone()))?;
        registry.register(Box::new(winner_changes_total.clone()))?;
        registry.register(Box::new(address_additions_total.clone()))?;
        registry.register(Box::new(address_withdrawals_total.clone()))?;
        registry.register(Box::new(garp_sent_total.clone()))?;

        Ok(Arc::new(Self {
            registry,
            lease_healthy,
            lease_renewals_total,
            lease_renewal_failures_total,
            member_count,
            winner_changes_total,
            address_additions_total,
            address_withdrawals_total,
            garp_sent_total,
        }))
    }

    pub fn encode(&self) -> Result<Vec<u8>, prometheus::Error> {
        let encoder = TextEncoder::new();
        let families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&families, &mut buffer)?;
        Ok(buffer)
    }
}

impl ElectionMetrics for Metrics {
    fn renewal_succeeded(&self) {
        self.lease_renewals_total.inc();
    }

    fn renewal_failed(&self) {
        self.lease_renewal_failures_total.inc();
    }

    fn set_healthy(&self, healthy: bool) {
        self.lease_healthy.set(i64::from(healthy));
    }

    fn set_member_count(&self, count: usize) {
        self.member_count.set(count as i64);
    }
}

impl AnnouncerMetrics for Metrics {
    fn address_installed(&self) {
        self.address_additions_total.inc();
    }

    fn address_withdrawn(&self) {
        self.address_withdrawals_total.inc();
    }

    fn garp_sent(&self) {
        self.garp_sent_total.inc();
    }
}

impl ReconcilerMetrics for Metrics {
    fn winner_changed(&self, service: &str) {
        self.winner_changes_total.with_label_values(&[service]).inc();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_without_error_before_any_observation() {
        let metrics = Metrics::new().unwrap();
        let body = metrics.encode().unwrap();
        assert!(String::from_utf8(body).unwrap().contains("lease_healthy"));
    }
}
