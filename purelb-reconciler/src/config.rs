//! Reconciler-level configuration (spec.md §6).

/// Identifies this process as the author of server-side-apply patches and
/// of the Kubernetes events it publishes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconcilerConfig {
    pub field_manager: String,
    pub controller_pod_name: String,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            field_manager: "purelb".to_string(),
            controller_pod_name: "purelb".to_string(),
        }
    }
}
