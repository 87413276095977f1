//! `ExternalTrafficPolicy=Local` endpoint-readiness aggregation (spec.md
//! §4.3 "`ExternalTrafficPolicy=Local`").

use k8s_openapi::api::discovery::v1::EndpointSlice;

/// True if any endpoint across `slices` is both ready and hosted on `node`.
///
/// A pure function over the EndpointSlices the reconciler already indexed
/// by the service's `kubernetes.io/service-name` label (spec.md §4.1), so
/// it can be unit tested without a cluster.
pub fn has_local_ready_endpoint(slices: &[EndpointSlice], node: &str) -> bool {
    slices.iter().flat_map(|slice| &slice.endpoints).any(|endpoint| {
        let ready = endpoint
            .conditions
            .as_ref()
            .and_then(|c| c.ready)
            .unwrap_or(true);
        let on_node = endpoint.node_name.as_deref() == Some(node);
        ready && on_node
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::discovery::v1::{Endpoint, EndpointConditions};

    fn slice(endpoints: Vec<Endpoint>) -> EndpointSlice {
        EndpointSlice {
            metadata: Default::default(),
            address_type: "IPv4".to_string(),
            endpoints,
            ports: None,
        }
    }

    fn endpoint(node: &str, ready: Option<bool>) -> Endpoint {
        Endpoint {
            addresses: vec!["10.0.0.5".to_string()],
            conditions: Some(EndpointConditions {
                ready,
                ..Default::default()
            }),
            node_name: Some(node.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn ready_endpoint_on_node_counts() {
        let slices = vec![slice(vec![endpoint("node-a", Some(true))])];
        assert!(has_local_ready_endpoint(&slices, "node-a"));
        assert!(!has_local_ready_endpoint(&slices, "node-b"));
    }

    #[test]
    fn not_ready_endpoint_does_not_count() {
        let slices = vec![slice(vec![endpoint("node-a", Some(false))])];
        assert!(!has_local_ready_endpoint(&slices, "node-a"));
    }

    #[test]
    fn missing_ready_condition_defaults_to_ready() {
        let slices = vec![slice(vec![endpoint("node-a", None)])];
        assert!(has_local_ready_endpoint(&slices, "node-a"));
    }

    #[test]
    fn aggregates_across_multiple_slices() {
        let slices = vec![
            slice(vec![endpoint("node-b", Some(true))]),
            slice(vec![endpoint("node-a", Some(true))]),
        ];
        assert!(has_local_ready_endpoint(&slices, "node-a"));
    }
}
