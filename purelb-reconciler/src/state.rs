//! Per-service reconciler state (spec.md §3 `ServiceAssignment`).

use std::collections::HashMap;

use purelb_core::ServiceAssignment;

/// All `ServiceAssignment`s, keyed by `namespace/name`. Touched only from
/// the reconciliation worker (spec.md §5 "Concurrency invariant").
#[derive(Default)]
pub struct ServiceAssignments {
    by_key: HashMap<String, ServiceAssignment>,
}

impl ServiceAssignments {
    pub fn get_or_create(&mut self, service_key: &str) -> &mut ServiceAssignment {
        self.by_key
            .entry(service_key.to_string())
            .or_insert_with(|| ServiceAssignment::new(service_key))
    }

    pub fn remove(&mut self, service_key: &str) -> Option<ServiceAssignment> {
        self.by_key.remove(service_key)
    }

    pub fn get(&self, service_key: &str) -> Option<&ServiceAssignment> {
        self.by_key.get(service_key)
    }
}
