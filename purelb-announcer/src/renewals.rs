//! Address-lifetime renewal scheduling (spec.md §4.3 "Address lifetime &
//! renewal").
//!
//! Each finite-lifetime address gets one timer task. The task only ever
//! touches the atomic `cancelled` flag and performs an idempotent netlink
//! `AddrReplace` (spec.md §4.3 "Concurrency invariant") — it never reaches
//! back into the announcer's own maps.

use std::net::IpAddr;

use purelb_core::AddressRenewal;
use rtnetlink::Handle;

/// Spawn a renewal task for `vip` on `link_index`, re-applying the same
/// lifetime options every `renewal.interval()` until cancelled.
pub fn spawn(handle: Handle, link_index: u32, vip: IpAddr, prefix_len: u8, valid_secs: u32, preferred_secs: u32, renewal: AddressRenewal) {
    tokio::spawn(async move {
        let interval = renewal.interval();
        loop {
            tokio::time::sleep(interval).await;
            if renewal.is_cancelled() {
                return;
            }
            if let Err(err) = purelb_netlink::addresses::add_or_replace(&handle, link_index, vip, prefix_len, valid_secs, preferred_secs).await {
                tracing::warn!(%vip, %err, "address renewal failed");
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn cancelled_renewal_stops_without_firing_again() {
        let renewal = AddressRenewal::new(Duration::from_secs(30));
        let flag_clone = renewal.clone();
        // Cancel before the first tick; the loop should exit on the first
        // wake without attempting a netlink call.
        flag_clone.cancel();
        assert!(renewal.is_cancelled());
    }
}
