//! `LeaseRecord`: the unit of cluster-observable node membership (spec.md §3).

use chrono::{DateTime, Duration, Utc};
use ipnet::IpNet;

/// A snapshot of one node's heartbeat, read from (or about to be written to)
/// a `coordination.k8s.io/v1` `Lease`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LeaseRecord {
    pub holder: String,
    pub renewed_at: DateTime<Utc>,
    pub duration_seconds: i64,
    pub subnets: Vec<IpNet>,
}

impl LeaseRecord {
    pub fn new(holder: impl Into<String>, renewed_at: DateTime<Utc>, duration_seconds: i64, subnets: Vec<IpNet>) -> Self {
        Self {
            holder: holder.into(),
            renewed_at,
            duration_seconds,
            subnets,
        }
    }

    /// A LeaseRecord is valid at `now` iff `renewedAt + duration >= now`.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.renewed_at + Duration::seconds(self.duration_seconds) >= now
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_exactly_at_expiry_boundary() {
        let now = Utc::now();
        let record = LeaseRecord::new("a", now - Duration::seconds(10), 10, vec![]);
        assert!(record.is_valid_at(now));
    }

    #[test]
    fn invalid_one_second_past_expiry() {
        let now = Utc::now();
        let record = LeaseRecord::new("a", now - Duration::seconds(11), 10, vec![]);
        assert!(!record.is_valid_at(now));
    }
}
