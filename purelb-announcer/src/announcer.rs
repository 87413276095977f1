//! The `Announcer`: local VIP placement, election gating, GARP emission and
//! withdrawal discipline (spec.md §4.3).

use std::collections::{HashMap, HashSet};
use std::net::IpAddr;
use std::sync::Arc;

use purelb_core::{clamp_lifetimes, AddressRenewal};
use purelb_netlink::LinkInfo;
use rtnetlink::Handle;

use crate::config::AnnouncerConfig;
use crate::error::AnnouncerError;
use crate::metrics::{AnnouncerMetrics, NullMetrics};
use crate::placement::{self, Placement};
use crate::renewals;

/// Looks up the election winner for a VIP's string form. Kept as a trait
/// so this crate doesn't need to depend on `purelb-election`; the
/// reconciler wires a real `Elector` in.
pub trait WinnerLookup {
    fn winner(&self, service_key: &str, vip: IpAddr) -> Option<String>;
}

/// The interface family suffix recorded in the `announcing-interface`
/// annotation (spec.md §4.4).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InterfaceFamily {
    V4,
    V6,
}

impl InterfaceFamily {
    fn of(vip: IpAddr) -> Self {
        if vip.is_ipv6() {
            InterfaceFamily::V6
        } else {
            InterfaceFamily::V4
        }
    }
}

/// The outcome of announcing a single VIP, used by the reconciler to update
/// `announcing-node`/`announcing-interface*` annotations.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AnnounceOutcome {
    Installed { node: String, interface: String, family: InterfaceFamily, is_local: bool },
    /// Not installed on this node: either not the winner (local) or the
    /// node has no local-ready endpoint (remote, `ExternalTrafficPolicy=Local`).
    Withdrawn { is_local: bool },
}

impl AnnounceOutcome {
    /// Whether the VIP resolved to a local-interface placement, regardless
    /// of whether this node won it (spec.md §4.3: "Local-interface
    /// announcements do not support policy `Local`").
    pub fn is_local(&self) -> bool {
        match self {
            AnnounceOutcome::Installed { is_local, .. } | AnnounceOutcome::Withdrawn { is_local } => *is_local,
        }
    }
}

struct Installation {
    link: LinkInfo,
    is_local: bool,
    prefix_len: u8,
}

/// Owns all announcer mutable state. Per spec.md §4.3 "Concurrency
/// invariant", every mutating method requires `&mut self`: callers are
/// expected to run it from the single reconciliation-worker task, so no
/// internal locking is needed.
pub struct Announcer {
    handle: Handle,
    config: AnnouncerConfig,
    dummy_link: Option<LinkInfo>,
    /// nsName -> VIPs currently announced for it.
    service_vips: HashMap<String, HashSet<IpAddr>>,
    /// VIP -> nsNames referencing it, for withdrawal refcounting.
    vip_refs: HashMap<IpAddr, HashSet<String>>,
    installations: HashMap<IpAddr, Installation>,
    renewals: HashMap<(String, IpAddr), AddressRenewal>,
    metrics: Arc<dyn AnnouncerMetrics>,
}

impl Announcer {
    pub fn new(handle: Handle, config: AnnouncerConfig) -> Self {
        Self {
            handle,
            config,
            dummy_link: None,
            service_vips: HashMap::new(),
            vip_refs: HashMap::new(),
            installations: HashMap::new(),
            renewals: HashMap::new(),
            metrics: Arc::new(NullMetrics),
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<dyn AnnouncerMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Create the dummy interface if it doesn't already exist (spec.md §4.3
    /// "Dummy-interface lifecycle": "created on first configuration load").
    pub async fn ensure_dummy_interface(&mut self) -> Result<(), AnnouncerError> {
        let link = purelb_netlink::dummy::ensure(&self.handle, &self.config.dummy_interface_name)
            .await
            .map_err(AnnouncerError::Netlink)?;
        self.dummy_link = Some(link);
        Ok(())
    }

    /// A configuration change that renames the dummy interface: create the
    /// new one, remove the old (spec.md §4.3).
    pub async fn rename_dummy_interface(&mut self, new_name: String) -> Result<(), AnnouncerError> {
        let old_name = std::mem::replace(&mut self.config.dummy_interface_name, new_name);
        self.ensure_dummy_interface().await?;
        if old_name != self.config.dummy_interface_name {
            purelb_netlink::dummy::remove(&self.handle, &old_name)
                .await
                .map_err(AnnouncerError::Netlink)?;
        }
        Ok(())
    }

    /// Announce (or withdraw) a single VIP for one service (spec.md §4.3,
    /// §4.4 step 4). `etp_local` is the Service's
    /// `ExternalTrafficPolicy=Local` flag; `local_ready` is whether this
    /// node hosts a ready endpoint, aggregated by the caller via
    /// [`crate::endpoints::has_local_ready_endpoint`].
    pub async fn ensure_announced(
        &mut self,
        service_key: &str,
        vip: IpAddr,
        winner: &dyn WinnerLookup,
        my_node: &str,
        etp_local: bool,
        local_ready: bool,
        valid_lifetime_secs: u32,
        preferred_lifetime_secs: u32,
    ) -> Result<AnnounceOutcome, AnnouncerError> {
        let placement = placement::determine(&self.handle, &self.config, vip).await?;

        let is_local_placement = matches!(placement, Placement::Local(_));
        let should_install = match &placement {
            Placement::Local(_) => winner.winner(service_key, vip).as_deref() == Some(my_node),
            Placement::Remote => !etp_local || local_ready,
        };

        self.track_reference(service_key, vip);

        if !should_install {
            self.withdraw_vip(service_key, vip).await?;
            return Ok(AnnounceOutcome::Withdrawn { is_local: is_local_placement });
        }

        let (link, is_local) = match placement {
            Placement::Local(link) => (link, true),
            Placement::Remote => {
                let link = match &self.dummy_link {
                    Some(link) => link.clone(),
                    None => {
                        self.ensure_dummy_interface().await?;
                        self.dummy_link.clone().expect("just ensured")
                    }
                };
                (link, false)
            }
        };

        let prefix_len = if vip.is_ipv6() { 128 } else { 32 };
        let (valid, preferred) = clamp_lifetimes(valid_lifetime_secs, preferred_lifetime_secs);

        purelb_netlink::addresses::add_or_replace(&self.handle, link.index, vip, prefix_len, valid, preferred)
            .await
            .map_err(AnnouncerError::Netlink)?;

        self.installations.insert(vip, Installation { link: link.clone(), is_local, prefix_len });
        self.reschedule_renewal(service_key, vip, link.index, prefix_len, valid, preferred);
        self.metrics.address_installed();

        if is_local {
            match self.emit_garp(&link, vip).await {
                Ok(()) => self.metrics.garp_sent(),
                Err(err) => tracing::warn!(%vip, %err, "GARP emission failed"),
            }
        }

        Ok(AnnounceOutcome::Installed {
            node: my_node.to_string(),
            interface: link.name,
            family: InterfaceFamily::of(vip),
            is_local,
        })
    }

    fn track_reference(&mut self, service_key: &str, vip: IpAddr) {
        self.service_vips.entry(service_key.to_string()).or_default().insert(vip);
        self.vip_refs.entry(vip).or_default().insert(service_key.to_string());
    }

    async fn emit_garp(&self, link: &LinkInfo, vip: IpAddr) -> Result<(), purelb_netlink::NetlinkError> {
        let Some(mac) = link.mac else {
            tracing::debug!(interface = %link.name, "link has no hardware address, skipping GARP");
            return Ok(());
        };
        match vip {
            IpAddr::V4(v4) => purelb_netlink::garp::send_gratuitous_arp(link.index, mac, v4).await,
            IpAddr::V6(v6) => purelb_netlink::garp::send_unsolicited_neighbor_advertisement(link.index, mac, v6).await,
        }
    }

    fn reschedule_renewal(&mut self, service_key: &str, vip: IpAddr, link_index: u32, prefix_len: u8, valid: u32, preferred: u32) {
        let key = (service_key.to_string(), vip);
        if let Some(old) = self.renewals.remove(&key) {
            old.cancel();
        }
        if valid == 0 {
            return;
        }
        let interval = std::time::Duration::from_secs(u64::from((valid / 2).max(30)));
        let renewal = AddressRenewal::new(interval);
        renewals::spawn(self.handle.clone(), link_index, vip, prefix_len, valid, preferred, renewal.clone());
        self.renewals.insert(key, renewal);
    }

    /// Withdraw a single `vip` previously announced for `service_key`,
    /// leaving any other VIPs tracked for the same service untouched.
    /// Unlike [`Announcer::delete_balancer`] this does not forget the whole
    /// service, so the caller is expected to keep its own VIP bookkeeping in
    /// sync (spec.md §3 `ServiceAssignment.ingresses`).
    pub async fn withdraw(&mut self, service_key: &str, vip: IpAddr) -> Result<(), AnnouncerError> {
        if let Some(vips) = self.service_vips.get_mut(service_key) {
            vips.remove(&vip);
        }
        self.withdraw_vip(service_key, vip).await
    }

    /// Withdraw `vip` for `service_key`, unless another service still
    /// references it (spec.md §8 item 9 "Withdrawal refcount").
    async fn withdraw_vip(&mut self, service_key: &str, vip: IpAddr) -> Result<(), AnnouncerError> {
        if let Some(key_renewal) = self.renewals.remove(&(service_key.to_string(), vip)) {
            key_renewal.cancel();
        }
        if let Some(refs) = self.vip_refs.get_mut(&vip) {
            refs.remove(service_key);
            if !refs.is_empty() {
                return Ok(());
            }
        }
        self.vip_refs.remove(&vip);
        if let Some(installation) = self.installations.remove(&vip) {
            purelb_netlink::addresses::remove(&self.handle, installation.link.index, vip, installation.prefix_len)
                .await
                .map_err(AnnouncerError::Netlink)?;
            self.metrics.address_withdrawn();
        }
        Ok(())
    }

    /// `DeleteBalancer(nsName, reason)`: withdraw every VIP this service
    /// advertised (spec.md §4.3 "Withdrawal").
    pub async fn delete_balancer(&mut self, service_key: &str, reason: &str) -> Result<(), AnnouncerError> {
        let vips: Vec<IpAddr> = self.service_vips.remove(service_key).into_iter().flatten().collect();
        tracing::info!(service = service_key, reason, vip_count = vips.len(), "deleting balancer");
        for vip in vips {
            self.withdraw_vip(service_key, vip).await?;
        }
        Ok(())
    }

    /// Tear down the dummy interface (spec.md §4.3, §6 shutdown step 6).
    pub async fn shutdown(&mut self) -> Result<(), AnnouncerError> {
        purelb_netlink::dummy::remove(&self.handle, &self.config.dummy_interface_name)
            .await
            .map_err(AnnouncerError::Netlink)?;
        self.dummy_link = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedWinner(Option<String>);
    impl WinnerLookup for FixedWinner {
        fn winner(&self, _service_key: &str, _vip: IpAddr) -> Option<String> {
            self.0.clone()
        }
    }

    #[test]
    fn interface_family_matches_address_kind() {
        assert_eq!(InterfaceFamily::of("10.0.0.1".parse().unwrap()), InterfaceFamily::V4);
        assert_eq!(InterfaceFamily::of("::1".parse().unwrap()), InterfaceFamily::V6);
    }

    #[test]
    fn fixed_winner_lookup_reports_configured_node() {
        let winner = FixedWinner(Some("node-a".to_string()));
        assert_eq!(winner.winner("ns/svc", "10.0.0.1".parse().unwrap()), Some("node-a".to_string()));
    }
}
