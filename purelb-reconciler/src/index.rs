//! The `EndpointSlice` → `Service` index (spec.md §4.1 "Sources": "mapped to
//! their parent Service via the `kubernetes.io/service-name` label using a
//! custom index").

use k8s_openapi::api::core::v1::Service;
use k8s_openapi::api::discovery::v1::EndpointSlice;
use kube::runtime::reflector::ObjectRef;
use kube::ResourceExt;

/// Map one `EndpointSlice` event to the `Service` it belongs to, if any.
/// Wired into `Controller::watches` so an `EndpointSlice` update triggers a
/// reconciliation of its parent Service (spec.md §4.1).
pub fn endpointslice_to_service(slice: EndpointSlice) -> Option<ObjectRef<Service>> {
    let namespace = slice.namespace()?;
    let service_name = slice
        .labels()
        .get(purelb_core::annotations::SERVICE_NAME_LABEL)?
        .clone();
    Some(ObjectRef::new(&service_name).within(&namespace))
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use std::collections::BTreeMap;

    #[test]
    fn maps_slice_to_its_parent_service() {
        let slice = EndpointSlice {
            metadata: ObjectMeta {
                namespace: Some("ns".to_string()),
                labels: Some(BTreeMap::from([(
                    purelb_core::annotations::SERVICE_NAME_LABEL.to_string(),
                    "web".to_string(),
                )])),
                ..Default::default()
            },
            address_type: "IPv4".to_string(),
            endpoints: vec![],
            ports: None,
        };
        let service_ref = endpointslice_to_service(slice).unwrap();
        assert_eq!(service_ref.name, "web");
        assert_eq!(service_ref.namespace.as_deref(), Some("ns"));
    }

    #[test]
    fn unlabeled_slice_maps_to_nothing() {
        let slice = EndpointSlice {
            metadata: ObjectMeta {
                namespace: Some("ns".to_string()),
                ..Default::default()
            },
            address_type: "IPv4".to_string(),
            endpoints: vec![],
            ports: None,
        };
        assert!(endpointslice_to_service(slice).is_none());
    }
}
