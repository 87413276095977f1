//! Conversions between the `coordination.k8s.io/v1 Lease` wire object and
//! [`purelb_core::LeaseRecord`] (spec.md §6 "Lease object — persisted layout").

use chrono::{DateTime, Utc};
use k8s_openapi::api::coordination::v1::Lease;
use purelb_core::LeaseRecord;
use serde_json::{json, Value};

/// Parse a `Lease` object into a [`LeaseRecord`]. Returns `None` for a Lease
/// that has no spec, no holder, or no renew time yet (e.g. freshly created
/// by someone else and not yet populated) — such a Lease contributes nothing
/// to `ElectionState`.
pub fn lease_record_from(lease: &Lease) -> Option<LeaseRecord> {
    let spec = lease.spec.as_ref()?;
    let holder = spec.holder_identity.clone()?;
    let renewed_at = spec.renew_time.as_ref()?.0;
    let duration_seconds = i64::from(spec.lease_duration_seconds?);
    let subnets = lease
        .metadata
        .annotations
        .as_ref()
        .and_then(|a| a.get(purelb_core::annotations::LEASE_SUBNETS))
        .map(|raw| purelb_core::parse_subnets(raw).unwrap_or_default())
        .unwrap_or_default();
    Some(LeaseRecord::new(holder, renewed_at, duration_seconds, subnets))
}

/// Build the server-side-apply patch body for this node's own Lease
/// (spec.md §6's persisted layout, §4.2 "Bootstrap"/"Renewing").
///
/// `is_renew_only` omits `ownerReferences` and the subnets annotation from
/// the patch: a renewal only ever needs to touch `renewTime`, so re-sending
/// the rest every two seconds would just be needless write amplification
/// (and a chance to race the subnets if they were ever allowed to change
/// mid-lifetime, which spec.md does not contemplate).
pub fn apply_patch(
    node: &str,
    subnets_annotation: &str,
    now: DateTime<Utc>,
    lease_duration_seconds: i32,
    node_uid: &str,
    pod_uid: Option<&str>,
    is_renew_only: bool,
) -> Value {
    let renew_time = now.to_rfc3339();
    if is_renew_only {
        return json!({
            "apiVersion": "coordination.k8s.io/v1",
            "kind": "Lease",
            "spec": {
                "holderIdentity": node,
                "renewTime": renew_time,
                "leaseDurationSeconds": lease_duration_seconds,
            },
        });
    }

    let mut annotations = serde_json::Map::new();
    annotations.insert(
        purelb_core::annotations::LEASE_SUBNETS.to_string(),
        Value::String(subnets_annotation.to_string()),
    );
    if let Some(pod_uid) = pod_uid {
        annotations.insert("purelb.io/pod-uid".to_string(), Value::String(pod_uid.to_string()));
    }

    json!({
        "apiVersion": "coordination.k8s.io/v1",
        "kind": "Lease",
        "metadata": {
            "annotations": annotations,
            "ownerReferences": [{
                "apiVersion": "v1",
                "kind": "Node",
                "name": node,
                "uid": node_uid,
            }],
        },
        "spec": {
            "holderIdentity": node,
            "renewTime": renew_time,
            "leaseDurationSeconds": lease_duration_seconds,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::{MicroTime, ObjectMeta};
    use k8s_openapi::api::coordination::v1::LeaseSpec;
    use std::collections::BTreeMap;

    #[test]
    fn parses_a_well_formed_lease() {
        let now = Utc::now();
        let lease = Lease {
            metadata: ObjectMeta {
                annotations: Some(BTreeMap::from([(
                    purelb_core::annotations::LEASE_SUBNETS.to_string(),
                    "10.0.0.0/8".to_string(),
                )])),
                ..Default::default()
            },
            spec: Some(LeaseSpec {
                holder_identity: Some("node-a".to_string()),
                renew_time: Some(MicroTime(now)),
                lease_duration_seconds: Some(10),
                ..Default::default()
            }),
        };
        let record = lease_record_from(&lease).unwrap();
        assert_eq!(record.holder, "node-a");
        assert_eq!(record.subnets.len(), 1);
    }

    #[test]
    fn missing_spec_yields_none() {
        let lease = Lease::default();
        assert!(lease_record_from(&lease).is_none());
    }
}
