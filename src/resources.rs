/// Arguments for the resources a stack declares
use serde::{Deserialize, Serialize};

use crate::error::StackError;

/// Private network request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkArgs {
    pub label: String,
    pub region: String,
}

/// Firewall request bound to an existing network
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirewallArgs {
    pub name: String,
    pub region: String,
    pub network_id: String,
    pub create_default_rules: bool,
}

/// Shape of one node pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodePool {
    /// Number of nodes in the pool
    pub node_count: u32,

    /// Civo instance size (e.g., "g4s.kube.medium")
    pub size: String,
}

/// Immutable description of the desired cluster
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterSpec {
    pub region: String,
    pub network_id: String,
    pub firewall_id: String,
    pub kubernetes_version: String,
    pub pools: Vec<NodePool>,
    pub applications: Vec<String>,
}

impl ClusterSpec {
    /// Reject specs the provider would refuse anyway
    pub fn validate(&self) -> Result<(), StackError> {
        if self.region.trim().is_empty() {
            return Err(StackError::InvalidSpec("region must not be empty".into()));
        }
        if self.firewall_id.is_empty() {
            return Err(StackError::InvalidSpec(
                "firewall reference is unresolved".into(),
            ));
        }
        if self.kubernetes_version.trim().is_empty() {
            return Err(StackError::InvalidSpec(
                "kubernetes_version must not be empty".into(),
            ));
        }
        if self.pools.is_empty() {
            return Err(StackError::InvalidSpec(
                "at least one node pool is required".into(),
            ));
        }
        for (i, pool) in self.pools.iter().enumerate() {
            if pool.node_count == 0 {
                return Err(StackError::InvalidSpec(format!(
                    "pool {} must have at least one node",
                    i
                )));
            }
            if pool.size.trim().is_empty() {
                return Err(StackError::InvalidSpec(format!(
                    "pool {} has no instance size",
                    i
                )));
            }
        }
        Ok(())
    }

    /// Add-on list in the comma-separated form the Civo API takes
    pub fn applications_field(&self) -> String {
        self.applications
            .iter()
            .map(|a| a.trim())
            .filter(|a| !a.is_empty())
            .collect::<Vec<_>>()
            .join(",")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> ClusterSpec {
        ClusterSpec {
            region: "LON1".to_string(),
            network_id: "net-1".to_string(),
            firewall_id: "fw-1".to_string(),
            kubernetes_version: "1.21.0-k3s1".to_string(),
            pools: vec![NodePool {
                node_count: 3,
                size: "g3.k3s.medium".to_string(),
            }],
            applications: vec!["Traefik".to_string(), " Helm".to_string()],
        }
    }

    #[test]
    fn test_valid_spec() {
        tokio_test::assert_ok!(spec().validate());
    }

    #[test]
    fn test_invalid_specs() {
        let mut s = spec();
        s.region = " ".to_string();
        tokio_test::assert_err!(s.validate());

        let mut s = spec();
        s.pools.clear();
        tokio_test::assert_err!(s.validate());

        let mut s = spec();
        s.pools[0].node_count = 0;
        tokio_test::assert_err!(s.validate());

        let mut s = spec();
        s.kubernetes_version.clear();
        tokio_test::assert_err!(s.validate());

        let mut s = spec();
        s.firewall_id.clear();
        tokio_test::assert_err!(s.validate());
    }

    #[test]
    fn test_applications_field() {
        assert_eq!(spec().applications_field(), "Traefik,Helm");

        let mut s = spec();
        s.applications = vec![];
        assert_eq!(s.applications_field(), "");
    }
}
