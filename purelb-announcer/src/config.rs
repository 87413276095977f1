//! Announcer configuration (spec.md §4.3 "Local vs. remote decision",
//! "Dummy-interface lifecycle").

/// `name` is a user-chosen dummy interface; `local_interface_pattern` is an
/// optional regex matched against link names to decide whether a VIP is
/// local. When unset, the default-route interface for the VIP's address
/// family is used instead.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AnnouncerConfig {
    pub dummy_interface_name: String,
    pub local_interface_pattern: Option<String>,
}

impl Default for AnnouncerConfig {
    fn default() -> Self {
        Self {
            dummy_interface_name: "purelb-dummy0".to_string(),
            local_interface_pattern: None,
        }
    }
}
