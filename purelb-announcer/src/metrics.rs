//! A narrow metrics sink, mirroring `purelb_election::ElectionMetrics`: this
//! crate stays opinion-free about the Prometheus registry, the `purelb`
//! binary crate implements the trait.

pub trait AnnouncerMetrics: Send + Sync {
    fn address_installed(&self);
    fn address_withdrawn(&self);
    fn garp_sent(&self);
}

pub struct NullMetrics;

impl AnnouncerMetrics for NullMetrics {
    fn address_installed(&self) {}
    fn address_withdrawn(&self) {}
    fn garp_sent(&self) {}
}
