//! A narrow metrics sink so this crate doesn't need an opinion on which
//! metrics backend the binary uses (spec.md §6 names the series; the `purelb`
//! binary crate owns the Prometheus registry and implements this trait).

pub trait ElectionMetrics: Send + Sync {
    fn renewal_succeeded(&self);
    fn renewal_failed(&self);
    fn set_healthy(&self, healthy: bool);
    fn set_member_count(&self, count: usize);
}

/// A sink that discards everything, used where no binary-level metrics
/// registry is wired up (unit tests, `cargo doc` examples).
pub struct NullMetrics;

impl ElectionMetrics for NullMetrics {
    fn renewal_succeeded(&self) {}
    fn renewal_failed(&self) {}
    fn set_healthy(&self, _healthy: bool) {}
    fn set_member_count(&self, _count: usize) {}
}
