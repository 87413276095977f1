//! Error kinds surfaced from reconciliation (spec.md §7).

#[derive(Debug, thiserror::Error)]
pub enum ReconcilerError {
    #[error("Kubernetes API call failed")]
    Api(#[source] kube::Error),

    /// A Kubernetes API call did not complete within the shutdown-mode
    /// deadline (spec.md §5 "Cancellation & timeouts").
    #[error("API call exceeded the shutdown-mode deadline")]
    ShutdownDeadlineExceeded,

    #[error(transparent)]
    Announcer(#[from] purelb_announcer::AnnouncerError),

    #[error("bug: {0}")]
    Bug(String),
}

impl ReconcilerError {
    /// spec.md §7 `ShutdownContextCanceled`: silently swallow errors that
    /// are just the shortened shutdown-mode deadline firing.
    pub fn is_shutdown_noise(&self) -> bool {
        matches!(self, ReconcilerError::ShutdownDeadlineExceeded)
    }
}
