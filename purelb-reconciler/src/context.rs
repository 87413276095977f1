//! The shared context every reconciliation runs against.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;

use kube::runtime::events::{Recorder, Reporter};
use kube::Client;
use purelb_announcer::Announcer;
use purelb_election::Elector;
use tokio::sync::Mutex;

use crate::config::ReconcilerConfig;
use crate::metrics::{NullMetrics, ReconcilerMetrics};
use crate::state::ServiceAssignments;

/// `Announcer` and `ServiceAssignments` are wrapped in an async `Mutex`
/// purely because `Controller::run` hands reconcilers an immutable
/// `Arc<Context>`; the Controller is configured for concurrency 1, so the
/// lock is never contended (spec.md §5 "sole writer", §9 "No locks are
/// used" refers to the *domain* data structures, not this interior-
/// mutability technicality).
pub struct Context {
    pub client: Client,
    pub config: ReconcilerConfig,
    pub elector: Arc<Elector>,
    pub announcer: Mutex<Announcer>,
    pub assignments: Mutex<ServiceAssignments>,
    pub events: Recorder,
    metrics: Arc<dyn ReconcilerMetrics>,
    /// Last-seen winner per (service, VIP), used only to detect changes for
    /// `winner_changes_total` (spec.md §6).
    last_winners: Mutex<HashMap<(String, IpAddr), String>>,
}

impl Context {
    pub fn new(client: Client, config: ReconcilerConfig, elector: Arc<Elector>, announcer: Announcer) -> Self {
        let reporter = Reporter {
            controller: config.field_manager.clone(),
            instance: Some(config.controller_pod_name.clone()),
        };
        let events = Recorder::new(client.clone(), reporter);
        Self {
            client,
            config,
            elector,
            announcer: Mutex::new(announcer),
            assignments: Mutex::new(ServiceAssignments::default()),
            events,
            metrics: Arc::new(NullMetrics),
            last_winners: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<dyn ReconcilerMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Record `node` as the current winner for `(service_key, vip)`,
    /// reporting `winner_changes_total` only when it differs from the
    /// previously recorded winner.
    pub async fn note_winner(&self, service_key: &str, vip: IpAddr, node: &str) {
        let mut last = self.last_winners.lock().await;
        let key = (service_key.to_string(), vip);
        if last.get(&key).map(String::as_str) != Some(node) {
            self.metrics.winner_changed(service_key);
            last.insert(key, node.to_string());
        }
    }
}
