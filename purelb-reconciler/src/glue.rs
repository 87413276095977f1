//! Reconciler glue: the four-step contract from spec.md §4.4.

use std::collections::HashSet;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use k8s_openapi::api::core::v1::{ObjectReference, Service};
use k8s_openapi::api::discovery::v1::EndpointSlice;
use kube::runtime::controller::Action;
use kube::runtime::events::{Event, EventType};
use kube::{Api, Client, ResourceExt};
use purelb_announcer::{AnnounceOutcome, InterfaceFamily, WinnerLookup};
use purelb_core::annotations;

use crate::context::Context;
use crate::error::ReconcilerError;

struct ElectorWinner(Arc<purelb_election::Elector>);

impl WinnerLookup for ElectorWinner {
    fn winner(&self, service_key: &str, vip: IpAddr) -> Option<String> {
        self.0.winner(service_key, Some(vip)).node().map(str::to_string)
    }
}

fn service_key(svc: &Service) -> String {
    format!("{}/{}", svc.namespace().unwrap_or_default(), svc.name_any())
}

fn object_reference(svc: &Service) -> ObjectReference {
    ObjectReference {
        api_version: Some("v1".to_string()),
        kind: Some("Service".to_string()),
        name: Some(svc.name_any()),
        namespace: svc.namespace(),
        uid: svc.uid(),
        ..Default::default()
    }
}

/// `reconcile(service, endpointSlices[]) → {Success, Error, ReprocessAll}`
/// (spec.md §4.1, §4.4). `ReprocessAll` is expressed as `Ok` plus a side
/// effect (the caller's `ForceSync`, driven independently by
/// `PeerObserver::membership_changes`), so this function only ever returns
/// `Ok` (schedule a follow-up) or `Err` (requeue with back-off).
pub async fn reconcile(svc: Arc<Service>, ctx: Arc<Context>) -> Result<Action, ReconcilerError> {
    let key = service_key(&svc);
    if annotations::RESERVED_SERVICE_KEYS.contains(&key.as_str()) {
        return Ok(Action::await_change());
    }

    let mut svc = (*svc).clone();
    let original = svc.clone();

    let has_brand = svc.annotations().get(annotations::BRAND).is_some();
    let is_load_balancer = svc.spec.as_ref().and_then(|s| s.type_.as_deref()) == Some("LoadBalancer");

    // Step 1: no longer a LoadBalancer but still branded -> delete and strip.
    if !is_load_balancer && has_brand {
        ctx.announcer.lock().await.delete_balancer(&key, "service is no longer of type LoadBalancer").await?;
        strip_owned_annotations(&mut svc);
        write_back(&ctx.client, &original, &svc).await?;
        ctx.assignments.lock().await.remove(&key);
        return Ok(Action::await_change());
    }

    // Step 2: nothing assigned yet.
    let ingresses = svc
        .status
        .as_ref()
        .and_then(|s| s.load_balancer.as_ref())
        .and_then(|lb| lb.ingress.as_ref())
        .cloned()
        .unwrap_or_default();
    if ingresses.is_empty() {
        return Ok(Action::await_change());
    }

    // Step 3: not ours.
    if !has_brand {
        return Ok(Action::await_change());
    }

    // Step 4: announce each ingress.
    let endpoint_slices = list_endpoint_slices(&ctx.client, &svc).await?;
    let etp_local = svc.spec.as_ref().and_then(|s| s.external_traffic_policy.as_deref()) == Some("Local");
    let my_node = ctx.elector.node().as_str();

    let mut current_vips = HashSet::new();
    let mut any_local_placement = false;
    for ingress in &ingresses {
        let Some(raw_ip) = ingress.ip.as_deref() else { continue };
        // spec.md §7 InvalidIP: skip this ingress, treat as Success. The
        // stale-VIP diff below (against the previous ServiceAssignment)
        // withdraws whatever used to be announced at this slot; nothing
        // else tracked for this service is touched.
        let Ok(vip) = raw_ip.parse::<IpAddr>() else {
            tracing::warn!(service = %key, ip = raw_ip, "ingress IP is not parseable, skipping");
            continue;
        };
        current_vips.insert(vip);

        let local_ready = purelb_announcer::endpoints::has_local_ready_endpoint(&endpoint_slices, my_node);
        let outcome = ctx
            .announcer
            .lock()
            .await
            .ensure_announced(&key, vip, &ElectorWinner(ctx.elector.clone()), my_node, etp_local, local_ready, 0, 0)
            .await?;

        any_local_placement |= outcome.is_local();
        match outcome {
            AnnounceOutcome::Installed { node, interface, family, .. } => {
                ctx.note_winner(&key, vip, &node).await;
                annotate(&mut svc, annotations::ANNOUNCING_NODE, Some(node));
                let family_key = match family {
                    InterfaceFamily::V4 => annotations::ANNOUNCING_INTERFACE_IPV4,
                    InterfaceFamily::V6 => annotations::ANNOUNCING_INTERFACE_IPV6,
                };
                annotate(&mut svc, family_key, Some(interface));
            }
            AnnounceOutcome::Withdrawn { .. } => {
                annotate(&mut svc, annotations::ANNOUNCING_NODE, None);
            }
        }
    }

    // Withdraw VIPs this service advertised in a previous reconcile but no
    // longer lists (status.loadBalancer.ingress shrank, or an ingress IP
    // flipped to unparseable) — spec.md §3 `ServiceAssignment.ingresses`.
    let stale_vips: Vec<IpAddr> = {
        let assignments = ctx.assignments.lock().await;
        assignments
            .get(&key)
            .map(|assignment| assignment.ingresses.iter().copied().filter(|vip| !current_vips.contains(vip)).collect())
            .unwrap_or_default()
    };
    for vip in stale_vips {
        ctx.announcer.lock().await.withdraw(&key, vip).await?;
    }
    {
        let mut assignments = ctx.assignments.lock().await;
        assignments.get_or_create(&key).ingresses = current_vips.into_iter().collect();
    }

    // Local-interface announcements do not support ExternalTrafficPolicy=Local
    // (spec.md §4.3): coerce to Cluster and notify.
    if etp_local && any_local_placement {
        if let Some(spec) = svc.spec.as_mut() {
            spec.external_traffic_policy = Some("Cluster".to_string());
        }
        let reference = object_reference(&svc);
        let _ = ctx
            .events
            .publish(
                &Event {
                    type_: EventType::Warning,
                    reason: "PolicyCoerced".to_string(),
                    note: Some("ExternalTrafficPolicy=Local is not supported for a locally-announced VIP; coerced to Cluster".to_string()),
                    action: "Reconcile".to_string(),
                    secondary: None,
                },
                &reference,
            )
            .await;
    }

    write_back(&ctx.client, &original, &svc).await?;
    Ok(Action::await_change())
}

fn annotate(svc: &mut Service, key: &str, value: Option<String>) {
    let annotations = svc.metadata.annotations.get_or_insert_with(Default::default);
    match value {
        Some(v) => {
            annotations.insert(key.to_string(), v);
        }
        None => {
            annotations.remove(key);
        }
    }
}

fn strip_owned_annotations(svc: &mut Service) {
    if let Some(annotations) = svc.metadata.annotations.as_mut() {
        annotations.remove(annotations::BRAND);
        annotations.remove(annotations::ANNOUNCING_NODE);
        annotations.remove(annotations::ANNOUNCING_INTERFACE_IPV4);
        annotations.remove(annotations::ANNOUNCING_INTERFACE_IPV6);
        annotations.remove(annotations::ANNOUNCING_INTERFACE_UNKNOWN);
    }
}

/// Write back mutations only if the copy differs from the original, status
/// first then spec/annotations (spec.md §4.4 step 4).
async fn write_back(client: &Client, original: &Service, updated: &Service) -> Result<(), ReconcilerError> {
    let ns = updated.namespace().ok_or_else(|| ReconcilerError::Bug("service has no namespace".to_string()))?;
    let api: Api<Service> = Api::namespaced(client.clone(), &ns);

    if original.status != updated.status {
        let mut status_only = updated.clone();
        status_only.spec = original.spec.clone();
        status_only.metadata = original.metadata.clone();
        let payload = serde_json::to_vec(&status_only).map_err(|e| ReconcilerError::Bug(e.to_string()))?;
        api.replace_status(&updated.name_any(), &Default::default(), payload)
            .await
            .map_err(ReconcilerError::Api)?;
    }

    if original.metadata.annotations != updated.metadata.annotations || original.spec != updated.spec {
        api.replace(&updated.name_any(), &Default::default(), updated)
            .await
            .map_err(ReconcilerError::Api)?;
    }

    Ok(())
}

async fn list_endpoint_slices(client: &Client, svc: &Service) -> Result<Vec<EndpointSlice>, ReconcilerError> {
    let ns = svc.namespace().ok_or_else(|| ReconcilerError::Bug("service has no namespace".to_string()))?;
    let api: Api<EndpointSlice> = Api::namespaced(client.clone(), &ns);
    let label_selector = format!("{}={}", annotations::SERVICE_NAME_LABEL, svc.name_any());
    let list = api
        .list(&kube::api::ListParams::default().labels(&label_selector))
        .await
        .map_err(ReconcilerError::Api)?;
    Ok(list.items)
}

/// Error policy for `Controller::run`: log and requeue with back-off,
/// unless the error is shutdown-mode noise (spec.md §7 propagation rule).
pub fn error_policy(_svc: Arc<Service>, err: &ReconcilerError, _ctx: Arc<Context>) -> Action {
    if err.is_shutdown_noise() {
        tracing::debug!(%err, "swallowing shutdown-mode error");
        return Action::await_change();
    }
    tracing::warn!(%err, "reconciliation failed, requeuing");
    Action::requeue(Duration::from_secs(5))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserved_keys_are_recognized() {
        assert!(annotations::RESERVED_SERVICE_KEYS.contains(&"default/kubernetes"));
    }
}
