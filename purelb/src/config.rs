//! Process configuration (spec.md §6, SPEC_FULL.md §4).

use std::time::Duration;

use clap::Parser;

/// `PURELB_*` environment variables with matching flags, parsed with
/// `clap::Parser` the way the reference controllers in this workspace's
/// pack configure themselves.
#[derive(Parser, Clone, Debug)]
#[command(author, version, about = "PureLB node-side announcer")]
pub struct Config {
    /// The Kubernetes node this process runs on.
    #[arg(long, env = "PURELB_NODE_NAME")]
    pub node_name: String,

    /// Namespace holding the per-node Leases.
    #[arg(long, env = "PURELB_NAMESPACE", default_value = "purelb")]
    pub namespace: String,

    /// This Pod's UID, recorded on the Lease for debugging.
    #[arg(long, env = "PURELB_POD_UID")]
    pub pod_uid: Option<String>,

    #[arg(long, env = "PURELB_LEASE_DURATION", default_value = "10s")]
    pub lease_duration: String,

    #[arg(long, env = "PURELB_RENEW_DEADLINE", default_value = "7s")]
    pub renew_deadline: String,

    #[arg(long, env = "PURELB_RETRY_PERIOD", default_value = "2s")]
    pub retry_period: String,

    /// Interfaces whose addresses seed this node's subnet list; in addition
    /// to these, the default-route interface is always included.
    #[arg(long = "announce-interfaces", env = "PURELB_ANNOUNCE_INTERFACES", value_delimiter = ',')]
    pub announce_interfaces: Vec<String>,

    /// Regex matched against link names to decide local VIP placement.
    /// Unset: fall back to the default-route interface.
    #[arg(long = "local-interface-pattern", env = "PURELB_LOCAL_INTERFACE_PATTERN")]
    pub local_interface_pattern: Option<String>,

    #[arg(long = "dummy-interface", env = "PURELB_DUMMY_INTERFACE", default_value = "purelb-dummy0")]
    pub dummy_interface: String,

    /// Address to bind the `/metrics` and `/healthz` endpoints to.
    #[arg(long = "host", env = "PURELB_HOST", default_value = "0.0.0.0")]
    pub host: String,

    #[arg(long = "port", env = "PURELB_PORT", default_value_t = 7472)]
    pub port: u16,

    /// `info` or `debug`; overridden by `RUST_LOG` if set.
    #[arg(long = "log-level", env = "PURELB_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Config {
    /// Parse a `humantime` duration, falling back to `default` with a
    /// warning log on anything unparseable or absent (spec.md §6: "fall
    /// back to defaults ... if unset or unparseable").
    pub fn duration_or_default(raw: &str, field: &str, default: Duration) -> Duration {
        match humantime::parse_duration(raw) {
            Ok(d) => d,
            Err(err) => {
                tracing::warn!(field, raw, %err, fallback = ?default, "invalid duration, using default");
                default
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unparseable_duration_falls_back_to_default() {
        let d = Config::duration_or_default("not-a-duration", "leaseDuration", Duration::from_secs(10));
        assert_eq!(d, Duration::from_secs(10));
    }

    #[test]
    fn valid_duration_parses() {
        let d = Config::duration_or_default("2s", "retryPeriod", Duration::from_secs(99));
        assert_eq!(d, Duration::from_secs(2));
    }
}
