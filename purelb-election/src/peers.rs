//! Peer-Lease observation and atomic `ElectionState` publication
//! (spec.md §4.2 "Peer observation").

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use chrono::Utc;
use futures::StreamExt;
use k8s_openapi::api::coordination::v1::Lease;
use kube::runtime::watcher;
use kube::{Api, ResourceExt};
use purelb_core::ElectionState;
use tokio::sync::broadcast;

use crate::error::ElectionError;
use crate::lease_io::lease_record_from;

/// Observes every peer Lease in the configured namespace, rebuilds
/// `ElectionState` from scratch on every change, and publishes the new
/// snapshot via an atomic pointer swap (spec.md §3, §9 "Election informer +
/// atomic state swap"). No locks: readers `load()` a coherent snapshot.
pub struct PeerObserver {
    state: Arc<ArcSwap<ElectionState>>,
    membership_changed: broadcast::Sender<()>,
}

impl PeerObserver {
    pub fn new() -> Self {
        let (membership_changed, _rx) = broadcast::channel(16);
        Self {
            state: Arc::new(ArcSwap::from_pointee(ElectionState::default())),
            membership_changed,
        }
    }

    /// The current, immediately-consistent snapshot.
    pub fn state(&self) -> Arc<ElectionState> {
        self.state.load_full()
    }

    /// Subscribe to notifications fired whenever the live-node set changes.
    /// This is the hook spec.md §4.2 calls "On-member-change": callers use
    /// it to drive `ForceSync`.
    pub fn membership_changes(&self) -> broadcast::Receiver<()> {
        self.membership_changed.subscribe()
    }

    /// Explicitly trigger `ForceSync` (spec.md §6 shutdown step 2: "every
    /// Service re-enqueued and reconciled with the unhealthy flag set"),
    /// over the same channel membership changes use.
    pub fn force_sync(&self) {
        let _ = self.membership_changed.send(());
    }

    /// Run the informer loop until the stream ends or is cancelled. Expects
    /// to be spawned as its own task (spec.md §5 "Informer goroutines ...
    /// enqueue keys only").
    pub async fn run(&self, api: Api<Lease>, expiry_tick: Duration) -> Result<(), ElectionError> {
        let mut peers: HashMap<String, purelb_core::LeaseRecord> = HashMap::new();
        let mut stream = std::pin::pin!(watcher(api, watcher::Config::default()));
        let mut ticker = tokio::time::interval(expiry_tick);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        let mut previous_live: Vec<String> = Vec::new();
        loop {
            tokio::select! {
                event = stream.next() => {
                    let Some(event) = event else { break };
                    let event = event.map_err(ElectionError::Watch)?;
                    apply_event(&mut peers, event);
                    previous_live = self.publish(&peers, previous_live);
                }
                _ = ticker.tick() => {
                    previous_live = self.publish(&peers, previous_live);
                }
            }
        }
        Ok(())
    }

    fn publish(&self, peers: &HashMap<String, purelb_core::LeaseRecord>, previous_live: Vec<String>) -> Vec<String> {
        let snapshot = ElectionState::from_records(peers.values(), Utc::now());
        let live_now = snapshot.live_nodes().to_vec();
        self.state.store(Arc::new(snapshot));
        if live_now != previous_live {
            let _ = self.membership_changed.send(());
        }
        live_now
    }
}

impl Default for PeerObserver {
    fn default() -> Self {
        Self::new()
    }
}

fn apply_event(peers: &mut HashMap<String, purelb_core::LeaseRecord>, event: watcher::Event<Lease>) {
    match event {
        watcher::Event::Apply(lease) | watcher::Event::InitApply(lease) => {
            if !lease.name_any().starts_with(purelb_core::annotations::LEASE_NAME_PREFIX) {
                return;
            }
            match lease_record_from(&lease) {
                Some(record) => {
                    peers.insert(lease.name_any(), record);
                }
                None => {
                    peers.remove(&lease.name_any());
                }
            }
        }
        watcher::Event::Delete(lease) => {
            peers.remove(&lease.name_any());
        }
        watcher::Event::Init | watcher::Event::InitDone => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use k8s_openapi::api::coordination::v1::LeaseSpec;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::{MicroTime, ObjectMeta};

    fn peer_lease(name: &str, holder: &str, age_secs: i64, duration_secs: i32) -> Lease {
        Lease {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                ..Default::default()
            },
            spec: Some(LeaseSpec {
                holder_identity: Some(holder.to_string()),
                renew_time: Some(MicroTime(Utc::now() - ChronoDuration::seconds(age_secs))),
                lease_duration_seconds: Some(duration_secs),
                ..Default::default()
            }),
        }
    }

    #[test]
    fn non_matching_lease_names_are_ignored() {
        let mut peers = HashMap::new();
        let stray = Lease {
            metadata: ObjectMeta {
                name: Some("unrelated-lease".to_string()),
                ..Default::default()
            },
            spec: Some(LeaseSpec {
                holder_identity: Some("node-a".to_string()),
                renew_time: Some(MicroTime(Utc::now())),
                lease_duration_seconds: Some(10),
                ..Default::default()
            }),
        };
        apply_event(&mut peers, watcher::Event::Apply(stray));
        assert!(peers.is_empty());
    }

    #[test]
    fn apply_then_delete_round_trips() {
        let mut peers = HashMap::new();
        let lease = peer_lease("purelb-node-a", "node-a", 0, 10);
        apply_event(&mut peers, watcher::Event::Apply(lease.clone()));
        assert_eq!(peers.len(), 1);
        apply_event(&mut peers, watcher::Event::Delete(lease));
        assert!(peers.is_empty());
    }

    #[tokio::test]
    async fn publish_notifies_only_on_membership_change() {
        let observer = PeerObserver::new();
        let mut rx = observer.membership_changes();

        let mut peers = HashMap::new();
        peers.insert("purelb-node-a".to_string(), {
            let lease = peer_lease("purelb-node-a", "node-a", 0, 10);
            lease_record_from(&lease).unwrap()
        });
        let live = observer.publish(&peers, Vec::new());
        assert_eq!(live, vec!["node-a".to_string()]);
        rx.try_recv().expect("first publish should notify");

        // Re-publishing the same membership must not notify again.
        let live2 = observer.publish(&peers, live);
        assert_eq!(live2, vec!["node-a".to_string()]);
        assert!(rx.try_recv().is_err());
    }
}
