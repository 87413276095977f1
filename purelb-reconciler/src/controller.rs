//! Wires the `Controller` loop: Service as the owned resource, EndpointSlice
//! watched through the custom index, peer-membership changes driving
//! `ForceSync` (spec.md §4.1, §5).

use std::sync::Arc;

use futures::StreamExt;
use k8s_openapi::api::core::v1::Service;
use k8s_openapi::api::discovery::v1::EndpointSlice;
use kube::runtime::{watcher, Controller};
use kube::{Api, Client};
use tokio_stream::wrappers::BroadcastStream;

use crate::context::Context;
use crate::glue::{error_policy, reconcile};
use crate::index::endpointslice_to_service;

/// Run the Controller to completion (stream exhaustion or cancellation).
/// A single worker (spec.md §5 "sole writer"): `Announcer` and
/// `ServiceAssignments` are mutated from exactly one reconciliation at a
/// time, so concurrency is pinned to 1 rather than left at the default.
pub async fn run(client: Client, ctx: Arc<Context>) {
    let services: Api<Service> = Api::all(client.clone());
    let endpoint_slices: Api<EndpointSlice> = Api::all(client);

    let force_sync = BroadcastStream::new(ctx.elector.peers().membership_changes()).filter_map(|res| async move { res.ok() });

    Controller::new(services, watcher::Config::default())
        .watches(endpoint_slices, watcher::Config::default(), |slice| {
            endpointslice_to_service(slice)
        })
        .reconcile_all_on(force_sync)
        .concurrency(1)
        .shutdown_on_signal()
        .run(reconcile, error_policy, ctx)
        .for_each(|result| async move {
            match result {
                Ok((object_ref, action)) => {
                    tracing::debug!(service = %object_ref.name, ?action, "reconciled");
                }
                Err(err) => {
                    tracing::warn!(%err, "reconcile stream error");
                }
            }
        })
        .await;
}
