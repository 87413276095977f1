//! The per-node election state machine (spec.md §4.2: Bootstrap → Renewing →
//! Unhealthy → Draining).

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use chrono::Utc;
use k8s_openapi::api::coordination::v1::Lease;
use k8s_openapi::api::core::v1::Node;
use kube::api::{Patch, PatchParams};
use kube::{Api, ResourceExt};
use purelb_core::{annotations, format_subnets, ElectionState, NodeIdentity, Winner};
use std::net::IpAddr;
use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;

use crate::config::ElectionConfig;
use crate::error::ElectionError;
use crate::lease_io::apply_patch;
use crate::metrics::{ElectionMetrics, NullMetrics};
use crate::peers::PeerObserver;

const FIELD_MANAGER: &str = "purelb";

/// Ties subnet discovery, Lease bootstrap/renewal, health tracking, and peer
/// observation into the single per-node state machine spec.md §4.2 describes.
///
/// `healthy` tracks whether this node's own renewals are succeeding;
/// `draining` is set by [`Elector::mark_unhealthy`] independently of renewal
/// outcome (spec.md: "Draining ... entered on MarkUnhealthy from shutdown").
/// A node is considered a valid winner candidate only while both are true.
pub struct Elector {
    client: kube::Client,
    namespace: String,
    node: NodeIdentity,
    pod_uid: Option<String>,
    config: ElectionConfig,
    peers: PeerObserver,
    node_uid: OnceCell<String>,
    healthy: AtomicBool,
    draining: AtomicBool,
    consecutive_failures: AtomicU32,
    /// Wall-clock time of the last successful renewal, used for the
    /// `renewDeadline` liveness bound (spec.md §4.2 "Renewing": demote if
    /// "time since last success exceeds renewDeadline", independent of the
    /// consecutive-failure counter).
    last_success: Mutex<Instant>,
    cancel: CancellationToken,
    metrics: Arc<dyn ElectionMetrics>,
}

impl Elector {
    pub fn new(client: kube::Client, namespace: String, node: NodeIdentity, pod_uid: Option<String>, config: ElectionConfig) -> Self {
        Self {
            client,
            namespace,
            node,
            pod_uid,
            config,
            peers: PeerObserver::new(),
            node_uid: OnceCell::new(),
            healthy: AtomicBool::new(false),
            draining: AtomicBool::new(false),
            consecutive_failures: AtomicU32::new(0),
            last_success: Mutex::new(Instant::now()),
            cancel: CancellationToken::new(),
            metrics: Arc::new(NullMetrics),
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<dyn ElectionMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn peers(&self) -> &PeerObserver {
        &self.peers
    }

    pub fn node(&self) -> &NodeIdentity {
        &self.node
    }

    fn lease_api(&self) -> Api<Lease> {
        Api::namespaced(self.client.clone(), &self.namespace)
    }

    /// Bootstrap: discover this node's subnets, look up its Node UID for the
    /// owner reference, and apply the full Lease body for the first time
    /// (spec.md §4.2 "Bootstrap"). Leaves the node marked healthy on success.
    pub async fn bootstrap(&self, netlink: &rtnetlink::Handle, interface_names: &[String], include_default_route: bool) -> Result<(), ElectionError> {
        let subnets = crate::subnets::discover_local_subnets(netlink, interface_names, include_default_route)
            .await?;
        let annotation = format_subnets(&subnets);

        let node_uid = self.lookup_node_uid().await?;

        let patch = apply_patch(
            self.node.as_str(),
            &annotation,
            Utc::now(),
            self.config.lease_duration.as_secs() as i32,
            &node_uid,
            self.pod_uid.as_deref(),
            false,
        );
        self.apply(patch).await?;
        self.healthy.store(true, Ordering::SeqCst);
        self.consecutive_failures.store(0, Ordering::SeqCst);
        *self.last_success.lock().unwrap() = Instant::now();
        self.metrics.set_healthy(true);
        tracing::info!(node = %self.node, subnets = %annotation, "lease bootstrapped");
        Ok(())
    }

    async fn lookup_node_uid(&self) -> Result<String, ElectionError> {
        if let Some(uid) = self.node_uid.get() {
            return Ok(uid.clone());
        }
        let nodes: Api<Node> = Api::all(self.client.clone());
        let node = nodes.get(self.node.as_str()).await.map_err(ElectionError::ReadNode)?;
        let uid = node.uid().ok_or_else(|| ElectionError::MissingNodeUid(self.node.as_str().to_string()))?;
        let _ = self.node_uid.set(uid.clone());
        Ok(uid)
    }

    async fn apply(&self, patch: serde_json::Value) -> Result<(), ElectionError> {
        let params = PatchParams::apply(FIELD_MANAGER).force();
        let deadline = if self.draining.load(Ordering::SeqCst) {
            self.config.shutdown_deadline
        } else {
            self.config.renew_deadline
        };
        tokio::time::timeout(deadline, self.lease_api().patch(&annotations::lease_name(self.node.as_str()), &params, &Patch::Apply(patch)))
            .await
            .map_err(|_| ElectionError::Timeout)?
            .map_err(ElectionError::ApplyLease)?;
        Ok(())
    }

    /// Renewing: run until [`Elector::stop_renewals`] is called or the
    /// cancellation token fires, PATCHing `renewTime` every `retryPeriod`
    /// (spec.md §4.2 "Renewing"). Self-demotes to unhealthy after
    /// `maxRenewFailures` consecutive failures, or once wall-clock time
    /// since the last success exceeds `renewDeadline`, whichever comes
    /// first.
    pub async fn run_renew_loop(&self) {
        let mut interval = tokio::time::interval(self.config.retry_period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.renew_once().await;
                }
                _ = self.cancel.cancelled() => {
                    tracing::info!(node = %self.node, "renewals stopped");
                    return;
                }
            }
        }
    }

    async fn renew_once(&self) {
        let node_uid = match self.node_uid.get() {
            Some(uid) => uid.clone(),
            None => String::new(),
        };
        let patch = apply_patch(
            self.node.as_str(),
            "",
            Utc::now(),
            self.config.lease_duration.as_secs() as i32,
            &node_uid,
            self.pod_uid.as_deref(),
            true,
        );
        match self.apply(patch).await {
            Ok(()) => {
                self.consecutive_failures.store(0, Ordering::SeqCst);
                *self.last_success.lock().unwrap() = Instant::now();
                if !self.draining.load(Ordering::SeqCst) {
                    self.healthy.store(true, Ordering::SeqCst);
                    self.metrics.set_healthy(true);
                }
                self.metrics.renewal_succeeded();
            }
            Err(err) => {
                let failures = self.consecutive_failures.fetch_add(1, Ordering::SeqCst) + 1;
                self.metrics.renewal_failed();
                tracing::warn!(node = %self.node, %err, failures, "lease renewal failed");
                let since_success = self.last_success.lock().unwrap().elapsed();
                if failures >= self.config.max_renew_failures || since_success > self.config.renew_deadline {
                    self.healthy.store(false, Ordering::SeqCst);
                    self.metrics.set_healthy(false);
                    tracing::warn!(node = %self.node, failures, since_success_secs = since_success.as_secs(), "self-demoted: failure threshold or renewDeadline exceeded");
                }
            }
        }
    }

    /// Unhealthy/Draining: this node never wins while either its own
    /// renewals are failing or it has been marked for shutdown.
    pub fn winner(&self, service_key: &str, vip: Option<IpAddr>) -> Winner {
        let healthy = self.healthy.load(Ordering::SeqCst) && !self.draining.load(Ordering::SeqCst);
        self.peers.state().winner(service_key, vip, healthy)
    }

    pub fn state(&self) -> Arc<ElectionState> {
        self.peers.state()
    }

    /// Draining: step one of the shutdown sequence. `Winner` starts
    /// returning empty immediately; renewals keep running until
    /// [`Elector::stop_renewals`] is called (spec.md §6 drain sequence).
    pub fn mark_unhealthy(&self) {
        self.draining.store(true, Ordering::SeqCst);
        self.metrics.set_healthy(false);
    }

    pub fn stop_renewals(&self) {
        self.cancel.cancel();
    }

    /// Draining: step four. Deletes this node's own Lease under the
    /// shortened shutdown deadline (spec.md §4.2, §6).
    pub async fn delete_our_lease(&self) -> Result<(), ElectionError> {
        let name = annotations::lease_name(self.node.as_str());
        let result = tokio::time::timeout(self.config.shutdown_deadline, self.lease_api().delete(&name, &Default::default())).await;
        match result {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(kube::Error::Api(e))) if e.code == 404 => Ok(()),
            Ok(Err(err)) => Err(ElectionError::DeleteLease(err)),
            Err(_) => Err(ElectionError::Timeout),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unhealthy_winner_is_always_empty_even_with_live_peers() {
        let state = ElectionState::from_records(std::iter::empty(), Utc::now());
        let winner = state.winner("svc", None, false);
        assert!(winner.is_empty());
    }
}
