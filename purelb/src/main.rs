//! Process entry point: configuration, client construction, tracing
//! initialization, and the shutdown orchestrator (spec.md §6).

mod config;
mod metrics;
mod server;
mod shutdown;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use k8s_openapi::api::coordination::v1::Lease;
use kube::{Api, Client};
use purelb_announcer::{Announcer, AnnouncerConfig};
use purelb_core::NodeIdentity;
use purelb_election::{ElectionConfig, Elector};
use purelb_reconciler::{Context as ReconcilerContext, ReconcilerConfig};

use crate::config::Config;
use crate::metrics::Metrics;
use crate::server::Readiness;

const NORMAL_LEASE_DURATION: Duration = Duration::from_secs(10);
const NORMAL_RENEW_DEADLINE: Duration = Duration::from_secs(7);
const NORMAL_RETRY_PERIOD: Duration = Duration::from_secs(2);
const PEER_EXPIRY_TICK: Duration = Duration::from_secs(1);
const GARP_SETTLE_DELAY: Duration = Duration::from_secs(2);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();
    init_tracing(&config.log_level);

    match run(config).await {
        Ok(()) => {
            tracing::info!("shut down cleanly");
            Ok(())
        }
        Err(err) => {
            tracing::error!(%err, "fatal startup error");
            std::process::exit(1);
        }
    }
}

fn init_tracing(level: &str) {
    let default_directive = if level == "debug" { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_directive));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn run(config: Config) -> anyhow::Result<()> {
    let node = NodeIdentity::new(config.node_name.clone())?;
    let client = Client::try_default().await?;
    let metrics = Metrics::new()?;

    let lease_duration = Config::duration_or_default(&config.lease_duration, "leaseDuration", NORMAL_LEASE_DURATION);
    let renew_deadline = Config::duration_or_default(&config.renew_deadline, "renewDeadline", NORMAL_RENEW_DEADLINE);
    let retry_period = Config::duration_or_default(&config.retry_period, "retryPeriod", NORMAL_RETRY_PERIOD);
    let election_config = ElectionConfig::new(lease_duration, renew_deadline, retry_period).unwrap_or_else(|err| {
        tracing::warn!(%err, "invalid election timing override, using defaults");
        ElectionConfig::default()
    });

    let netlink = purelb_netlink::connect()?;

    let elector = Arc::new(
        Elector::new(client.clone(), config.namespace.clone(), node, config.pod_uid.clone(), election_config)
            .with_metrics(metrics.clone()),
    );
    elector.bootstrap(&netlink, &config.announce_interfaces, true).await?;

    let peer_leases: Api<Lease> = Api::namespaced(client.clone(), &config.namespace);
    let peer_elector = elector.clone();
    let peers_task = tokio::spawn(async move {
        if let Err(err) = peer_elector.peers().run(peer_leases, PEER_EXPIRY_TICK).await {
            tracing::error!(%err, "peer Lease observer exited");
        }
    });

    let renew_elector = elector.clone();
    let renew_task = tokio::spawn(async move {
        renew_elector.run_renew_loop().await;
    });

    let announcer_config = AnnouncerConfig {
        dummy_interface_name: config.dummy_interface.clone(),
        local_interface_pattern: config.local_interface_pattern.clone(),
    };
    let mut announcer = Announcer::new(netlink.clone(), announcer_config).with_metrics(metrics.clone());
    announcer.ensure_dummy_interface().await?;

    let reconciler_config = ReconcilerConfig {
        field_manager: "purelb".to_string(),
        controller_pod_name: config.pod_uid.clone().unwrap_or_else(|| "purelb".to_string()),
    };
    let ctx = Arc::new(ReconcilerContext::new(client.clone(), reconciler_config, elector.clone(), announcer).with_metrics(metrics.clone()));

    let controller_client = client.clone();
    let controller_ctx = ctx.clone();
    let controller_task = tokio::spawn(async move {
        purelb_reconciler::controller::run(controller_client, controller_ctx).await;
    });

    let readiness = Readiness::default();
    readiness.set_ready(true);
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    let server_metrics = metrics.clone();
    let server_readiness = readiness.clone();
    let server_task = tokio::spawn(async move {
        if let Err(err) = server::run(addr, server_metrics, server_readiness).await {
            tracing::error!(%err, "metrics server exited");
        }
    });

    let signal = shutdown::wait_for_shutdown_signal().await;
    tracing::info!(signal, "received shutdown signal, draining");
    readiness.set_ready(false);

    drain(&elector, &ctx).await;

    peers_task.abort();
    renew_task.abort();
    controller_task.abort();
    server_task.abort();

    Ok(())
}

/// spec.md §6's exact six-step sequence: `MarkUnhealthy` → `ForceSync` →
/// 2s settle sleep → `StopRenewals` → `DeleteOurLease` → announcer
/// `Shutdown`.
async fn drain(elector: &Elector, ctx: &ReconcilerContext) {
    elector.mark_unhealthy();
    elector.peers().force_sync();
    tokio::time::sleep(GARP_SETTLE_DELAY).await;
    elector.stop_renewals();
    if let Err(err) = elector.delete_our_lease().await {
        tracing::warn!(%err, "failed to delete this node's lease during shutdown");
    }
    if let Err(err) = ctx.announcer.lock().await.shutdown().await {
        tracing::warn!(%err, "failed to tear down the dummy interface during shutdown");
    }
}
