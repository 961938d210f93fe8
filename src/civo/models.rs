/// Civo API data models
use serde::{Deserialize, Serialize};

/// Private network resource
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Network {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub default: bool,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

/// Network creation response
#[derive(Debug, Serialize, Deserialize)]
pub struct CreateNetworkResponse {
    pub id: String,
    #[serde(default)]
    pub label: String,
    pub result: String,
}

/// Firewall resource
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Firewall {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub network_id: Option<String>,
    #[serde(default)]
    pub rules_count: Option<u32>,
    #[serde(default)]
    pub cluster_count: Option<u32>,
}

/// Firewall creation response
#[derive(Debug, Serialize, Deserialize)]
pub struct CreateFirewallResponse {
    pub id: String,
    pub name: String,
    pub result: String,
}

/// Node pool of a Kubernetes cluster
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KubernetesPool {
    pub id: String,
    pub count: u32,
    pub size: String,
    #[serde(default)]
    pub instance_names: Vec<String>,
}

/// Managed Kubernetes cluster
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KubernetesCluster {
    pub id: String,
    pub name: String,
    pub status: String,
    #[serde(default)]
    pub ready: bool,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub network_id: Option<String>,
    #[serde(default)]
    pub firewall_id: Option<String>,
    #[serde(default)]
    pub api_endpoint: Option<String>,
    #[serde(default)]
    pub master_ip: Option<String>,
    #[serde(default)]
    pub kubeconfig: Option<String>,
    #[serde(default)]
    pub pools: Vec<KubernetesPool>,
    #[serde(default)]
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl KubernetesCluster {
    /// Cluster is provisioned and its API is serving
    pub fn is_active(&self) -> bool {
        self.ready && self.status.eq_ignore_ascii_case("ACTIVE")
    }
}

/// Paginated cluster list response
#[derive(Debug, Serialize, Deserialize)]
pub struct KubernetesClusterList {
    pub page: u32,
    pub per_page: u32,
    pub pages: u32,
    pub items: Vec<KubernetesCluster>,
}

/// Generic `{"result": "success"}` acknowledgement
#[derive(Debug, Serialize, Deserialize)]
pub struct SimpleResponse {
    pub result: String,
}

/// Error response from API
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub result: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cluster() {
        let body = r#"{
            "id": "69a23478-a89e-41d2-97b1-6f4c341cee70",
            "name": "my-civo-cluster",
            "status": "ACTIVE",
            "ready": true,
            "version": "1.21.0-k3s1",
            "firewall_id": "fw-1",
            "kubeconfig": "apiVersion: v1\n",
            "pools": [{"id": "pool-0", "count": 3, "size": "g3.k3s.medium"}],
            "created_at": "2021-06-01T10:00:00Z"
        }"#;

        let cluster: KubernetesCluster = serde_json::from_str(body).unwrap();
        assert!(cluster.is_active());
        assert_eq!(cluster.pools[0].count, 3);
        assert!(cluster.pools[0].instance_names.is_empty());
        assert!(cluster.created_at.is_some());
    }

    #[test]
    fn test_building_cluster_is_not_active() {
        let body = r#"{"id": "c1", "name": "c", "status": "BUILDING", "ready": false}"#;
        let cluster: KubernetesCluster = serde_json::from_str(body).unwrap();
        assert!(!cluster.is_active());
        assert!(cluster.kubeconfig.is_none());
    }
}
