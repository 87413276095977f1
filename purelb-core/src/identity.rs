//! The stable identity of this process's Kubernetes node.

use std::fmt;

/// The Kubernetes node name this process runs on, fixed for the life of the
/// process (spec.md §3, `NodeIdentity`).
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeIdentity(String);

impl NodeIdentity {
    /// Build an identity from a node name. Empty names are rejected: an
    /// empty `holderIdentity` is indistinguishable from an unheld Lease.
    pub fn new(node_name: impl Into<String>) -> Result<Self, EmptyNodeName> {
        let node_name = node_name.into();
        if node_name.is_empty() {
            return Err(EmptyNodeName);
        }
        Ok(Self(node_name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for NodeIdentity {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// `PURELB_NODE_NAME` / `--node-name` resolved to an empty string.
#[derive(Debug, thiserror::Error)]
#[error("node name must not be empty")]
pub struct EmptyNodeName;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_name() {
        assert!(NodeIdentity::new("").is_err());
    }

    #[test]
    fn keeps_the_name_verbatim() {
        let id = NodeIdentity::new("node-a").unwrap();
        assert_eq!(id.as_str(), "node-a");
        assert_eq!(id.to_string(), "node-a");
    }
}
