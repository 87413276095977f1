//! A narrow metrics sink for reconciler-level events, mirroring
//! `purelb_election::ElectionMetrics` and `purelb_announcer::AnnouncerMetrics`.

pub trait ReconcilerMetrics: Send + Sync {
    fn winner_changed(&self, service: &str);
}

pub struct NullMetrics;

impl ReconcilerMetrics for NullMetrics {
    fn winner_changed(&self, _service: &str) {}
}
