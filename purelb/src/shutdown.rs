//! Waits for the three signals spec.md §6 names: SIGINT, SIGQUIT, SIGTERM.
//! Modeled on `kube_runtime::Controller::shutdown_on_signal`'s
//! `futures::future::select` over `ctrl_c` and a Unix terminate handler,
//! extended with `SIGQUIT`.

use tokio::signal::unix::{signal, SignalKind};

pub async fn wait_for_shutdown_signal() -> &'static str {
    let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
    let mut sigquit = signal(SignalKind::quit()).expect("failed to install SIGQUIT handler");

    tokio::select! {
        _ = tokio::signal::ctrl_c() => "SIGINT",
        _ = sigterm.recv() => "SIGTERM",
        _ = sigquit.recv() => "SIGQUIT",
    }
}
