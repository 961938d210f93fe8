/// Configuration for a Civo cluster stack with OpenCost
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::civo::client::CIVO_API_BASE;
use crate::resources::NodePool;

/// Main stack configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StackConfig {
    /// Stack name (prefix of every resource URN)
    pub stack_name: String,

    /// Civo API configuration
    pub civo: CivoConfig,

    /// Private network
    pub network: NetworkConfig,

    /// Firewall attached to the network
    pub firewall: FirewallConfig,

    /// Kubernetes cluster
    pub cluster: ClusterConfig,
}

/// Civo API access
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CivoConfig {
    /// Civo API key (can also be set via CIVO_TOKEN env var)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    /// API base URL
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Civo region (e.g., "LON1")
    pub region: String,
}

/// Private network configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Network label, also used to find it again on re-runs
    pub label: String,
}

/// Firewall configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FirewallConfig {
    /// Firewall name
    pub name: String,

    /// Let Civo create its default ingress/egress rules
    #[serde(default = "default_true")]
    pub create_default_rules: bool,
}

/// Kubernetes cluster configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterConfig {
    /// Cluster name
    pub name: String,

    /// Kubernetes version (e.g., "1.21.0-k3s1")
    pub kubernetes_version: String,

    /// Node pools
    pub pools: Vec<NodePool>,

    /// Marketplace applications to pre-install
    #[serde(default)]
    pub applications: Vec<String>,

    /// How long to wait for the cluster to become active
    #[serde(default = "default_ready_timeout")]
    pub ready_timeout_secs: u64,
}

fn default_api_url() -> String {
    CIVO_API_BASE.to_string()
}

fn default_true() -> bool {
    true
}

fn default_ready_timeout() -> u64 {
    900
}

impl StackConfig {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: StackConfig = serde_yaml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.stack_name.is_empty() {
            anyhow::bail!("stack_name cannot be empty");
        }
        if self.civo.region.trim().is_empty() {
            anyhow::bail!("civo.region cannot be empty");
        }
        url::Url::parse(&self.civo.api_url)
            .map_err(|e| anyhow::anyhow!("civo.api_url is not a valid URL: {}", e))?;

        if self.network.label.is_empty() {
            anyhow::bail!("network.label cannot be empty");
        }
        if self.firewall.name.is_empty() {
            anyhow::bail!("firewall.name cannot be empty");
        }
        if self.cluster.name.is_empty() {
            anyhow::bail!("cluster.name cannot be empty");
        }
        if self.cluster.kubernetes_version.is_empty() {
            anyhow::bail!("cluster.kubernetes_version cannot be empty");
        }
        if self.cluster.pools.is_empty() {
            anyhow::bail!("at least one node pool is required");
        }
        if let Some(pool) = self.cluster.pools.iter().find(|p| p.node_count == 0) {
            anyhow::bail!("node pool of size {} has no nodes", pool.size);
        }

        Ok(())
    }

    /// Get Civo API token from config or environment
    pub fn get_civo_token(&self) -> anyhow::Result<String> {
        self.civo
            .token
            .clone()
            .or_else(|| std::env::var("CIVO_TOKEN").ok())
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "Civo API token not found. Set CIVO_TOKEN environment variable or specify in config"
                )
            })
    }

    /// Generate an example configuration file
    pub fn example() -> Self {
        Self {
            stack_name: "dev".to_string(),
            civo: CivoConfig {
                token: None,
                api_url: default_api_url(),
                region: "LON1".to_string(),
            },
            network: NetworkConfig {
                label: "my-custom-network".to_string(),
            },
            firewall: FirewallConfig {
                name: "my-civo-cluster-firewall".to_string(),
                create_default_rules: true,
            },
            cluster: ClusterConfig {
                name: "my-civo-cluster".to_string(),
                kubernetes_version: "1.21.0-k3s1".to_string(),
                pools: vec![NodePool {
                    node_count: 3,
                    size: "g3.k3s.medium".to_string(),
                }],
                applications: vec!["Traefik".to_string(), "Helm".to_string()],
                ready_timeout_secs: default_ready_timeout(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_validation() {
        let mut config = StackConfig::example();
        assert!(config.validate().is_ok());

        config.cluster.pools[0].node_count = 0;
        assert!(config.validate().is_err());

        let mut config = StackConfig::example();
        config.civo.api_url = "::".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_example_roundtrips_through_yaml() {
        let yaml = serde_yaml::to_string(&StackConfig::example()).unwrap();
        assert!(!yaml.contains("token"));

        let parsed: StackConfig = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed.cluster.applications, vec!["Traefik", "Helm"]);
    }

    #[test]
    fn test_defaults_applied() {
        let yaml = r#"
stack_name: dev
civo:
  region: LON1
network:
  label: net
firewall:
  name: fw
cluster:
  name: c
  kubernetes_version: 1.21.0-k3s1
  pools:
    - node_count: 1
      size: g3.k3s.small
"#;
        let config: StackConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.civo.api_url, "https://api.civo.com/v2");
        assert!(config.firewall.create_default_rules);
        assert!(config.cluster.applications.is_empty());
        assert_eq!(config.cluster.ready_timeout_secs, 900);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_token_from_config() {
        let mut config = StackConfig::example();
        config.civo.token = Some("abc".to_string());
        assert_eq!(config.get_civo_token().unwrap(), "abc");
    }
}
