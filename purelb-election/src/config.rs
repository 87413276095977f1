//! Election timing configuration (spec.md §4.2 "Timing defaults").

use std::time::Duration;

/// `leaseDuration = 10s`, `renewDeadline = 7s`, `retryPeriod = 2s`
/// (spec.md §4.2). The constraint `retryPeriod < renewDeadline <
/// leaseDuration` is enforced by [`ElectionConfig::new`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ElectionConfig {
    pub lease_duration: Duration,
    pub renew_deadline: Duration,
    pub retry_period: Duration,
    /// Consecutive renewal failures before self-demotion (spec.md §4.2: 3).
    pub max_renew_failures: u32,
    /// Shortened API-call deadline used during shutdown (spec.md §4.2: 500ms
    /// vs the normal 10s).
    pub shutdown_deadline: Duration,
}

impl Default for ElectionConfig {
    fn default() -> Self {
        Self {
            lease_duration: Duration::from_secs(10),
            renew_deadline: Duration::from_secs(7),
            retry_period: Duration::from_secs(2),
            max_renew_failures: 3,
            shutdown_deadline: Duration::from_millis(500),
        }
    }
}

impl ElectionConfig {
    /// Build a config, validating the ordering constraint spec.md §4.2
    /// states. Malformed overrides (spec.md §6: "fall back to defaults ...
    /// if unset or unparseable") should be caught by the caller before
    /// reaching here; this is the last line of defense.
    pub fn new(lease_duration: Duration, renew_deadline: Duration, retry_period: Duration) -> Result<Self, InvalidTiming> {
        if !(retry_period < renew_deadline && renew_deadline < lease_duration) {
            return Err(InvalidTiming {
                lease_duration,
                renew_deadline,
                retry_period,
            });
        }
        Ok(Self {
            lease_duration,
            renew_deadline,
            retry_period,
            ..Self::default()
        })
    }
}

#[derive(Debug, thiserror::Error)]
#[error("invalid election timing: retryPeriod ({retry_period:?}) < renewDeadline ({renew_deadline:?}) < leaseDuration ({lease_duration:?}) must hold")]
pub struct InvalidTiming {
    pub lease_duration: Duration,
    pub renew_deadline: Duration,
    pub retry_period: Duration,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_satisfies_the_ordering_constraint() {
        let cfg = ElectionConfig::default();
        assert!(cfg.retry_period < cfg.renew_deadline);
        assert!(cfg.renew_deadline < cfg.lease_duration);
    }

    #[test]
    fn rejects_out_of_order_timings() {
        let result = ElectionConfig::new(Duration::from_secs(5), Duration::from_secs(7), Duration::from_secs(2));
        assert!(result.is_err());
    }
}
