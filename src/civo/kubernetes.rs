/// Kubernetes cluster management for Civo
use anyhow::{Context, Result};
use std::time::{Duration, Instant};
use tracing::{debug, info};

use super::client::{CivoClient, CreateClusterRequest, PoolRequest};
use super::models::KubernetesCluster;
use crate::resources::ClusterSpec;

/// Cluster manager for Civo managed Kubernetes
pub struct ClusterManager {
    client: CivoClient,
    poll_interval: Duration,
}

impl ClusterManager {
    /// Create a new cluster manager
    pub fn new(client: CivoClient) -> Self {
        Self {
            client,
            poll_interval: Duration::from_secs(10),
        }
    }

    /// Find a cluster by name
    pub async fn find_cluster(
        &self,
        name: &str,
        region: &str,
    ) -> Result<Option<KubernetesCluster>> {
        let clusters = self
            .client
            .list_clusters(region)
            .await
            .context("Failed to list Kubernetes clusters")?;

        Ok(clusters.into_iter().find(|c| c.name == name))
    }

    /// Create the cluster unless one with the same name already exists
    pub async fn ensure_cluster(
        &self,
        name: &str,
        spec: &ClusterSpec,
    ) -> Result<KubernetesCluster> {
        if let Some(cluster) = self.find_cluster(name, &spec.region).await? {
            check_attachment(&cluster, spec)?;
            info!(
                "Found existing cluster: {} (ID: {}, status: {})",
                cluster.name, cluster.id, cluster.status
            );
            return Ok(cluster);
        }

        info!(
            "Creating Kubernetes cluster {} in {} ({} pool(s), version {})",
            name,
            spec.region,
            spec.pools.len(),
            spec.kubernetes_version
        );

        let cluster = self
            .client
            .create_cluster(&create_request(name, spec))
            .await
            .context("Failed to create Kubernetes cluster")?;

        info!(
            "Cluster creation accepted: {} (ID: {})",
            cluster.name, cluster.id
        );

        Ok(cluster)
    }

    /// Wait until the cluster reports ACTIVE and ready
    pub async fn wait_for_active(
        &self,
        cluster: &KubernetesCluster,
        region: &str,
        timeout_secs: u64,
    ) -> Result<KubernetesCluster> {
        if cluster.is_active() {
            return Ok(cluster.clone());
        }

        info!("Waiting for cluster {} to become active...", cluster.name);

        let start = Instant::now();
        let timeout = Duration::from_secs(timeout_secs);

        loop {
            let current = self
                .client
                .get_cluster(&cluster.id, region)
                .await
                .context("Failed to get cluster status")?;

            if current.is_active() {
                info!("✓ Cluster {} is active", current.name);
                return Ok(current);
            }

            if current.status.eq_ignore_ascii_case("ERROR") {
                anyhow::bail!("Cluster {} entered ERROR state", current.name);
            }

            if start.elapsed() > timeout {
                anyhow::bail!(
                    "Timeout after {} seconds waiting for cluster {} (last status: {})",
                    timeout_secs,
                    current.name,
                    current.status
                );
            }

            debug!("Cluster {} status: {}", current.name, current.status);
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    /// Fetch the kubeconfig of a realized cluster
    pub async fn kubeconfig(&self, cluster_id: &str, region: &str) -> Result<Option<String>> {
        let cluster = self
            .client
            .get_cluster(cluster_id, region)
            .await
            .context("Failed to read cluster kubeconfig")?;

        Ok(cluster.kubeconfig.filter(|k| !k.trim().is_empty()))
    }

    /// Delete cluster by name
    pub async fn delete_cluster(&self, name: &str, region: &str) -> Result<()> {
        match self.find_cluster(name, region).await? {
            Some(cluster) => {
                info!("Deleting cluster: {} (ID: {})", cluster.name, cluster.id);
                self.client
                    .delete_cluster(&cluster.id, region)
                    .await
                    .context("Failed to delete Kubernetes cluster")?;
                info!("Cluster deletion requested");
            }
            None => info!("Cluster not found, nothing to delete"),
        }

        Ok(())
    }
}

/// An existing cluster may only be reused if it sits on the spec's network and firewall
fn check_attachment(cluster: &KubernetesCluster, spec: &ClusterSpec) -> Result<()> {
    if cluster
        .network_id
        .as_deref()
        .is_some_and(|id| id != spec.network_id)
    {
        anyhow::bail!(
            "Cluster {} already exists on network {:?}, expected {}",
            cluster.name,
            cluster.network_id,
            spec.network_id
        );
    }
    if cluster
        .firewall_id
        .as_deref()
        .is_some_and(|id| id != spec.firewall_id)
    {
        anyhow::bail!(
            "Cluster {} already exists behind firewall {:?}, expected {}",
            cluster.name,
            cluster.firewall_id,
            spec.firewall_id
        );
    }
    Ok(())
}

/// Translate a cluster spec into the Civo create request
fn create_request(name: &str, spec: &ClusterSpec) -> CreateClusterRequest {
    CreateClusterRequest {
        name: name.to_string(),
        region: spec.region.clone(),
        network_id: spec.network_id.clone(),
        firewall_id: spec.firewall_id.clone(),
        kubernetes_version: spec.kubernetes_version.clone(),
        pools: spec
            .pools
            .iter()
            .enumerate()
            .map(|(i, pool)| PoolRequest {
                id: format!("{}-pool-{}", name, i),
                count: pool.node_count,
                size: pool.size.clone(),
            })
            .collect(),
        applications: spec.applications_field(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::NodePool;

    fn london_spec() -> ClusterSpec {
        ClusterSpec {
            region: "LON1".to_string(),
            network_id: "net-1".to_string(),
            firewall_id: "fw-1".to_string(),
            kubernetes_version: "1.21.0-k3s1".to_string(),
            pools: vec![NodePool {
                node_count: 3,
                size: "g3.k3s.medium".to_string(),
            }],
            applications: vec!["Traefik".to_string(), "Helm".to_string()],
        }
    }

    fn existing(network_id: Option<&str>, firewall_id: Option<&str>) -> KubernetesCluster {
        KubernetesCluster {
            id: "old".to_string(),
            name: "my-civo-cluster".to_string(),
            status: "ACTIVE".to_string(),
            ready: true,
            version: None,
            network_id: network_id.map(str::to_string),
            firewall_id: firewall_id.map(str::to_string),
            api_endpoint: None,
            master_ip: None,
            kubeconfig: None,
            pools: vec![],
            created_at: None,
        }
    }

    #[test]
    fn test_create_request_carries_spec_fields() {
        let spec = london_spec();

        let request = create_request("my-civo-cluster", &spec);
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["region"], "LON1");
        assert_eq!(json["network_id"], "net-1");
        assert_eq!(json["firewall_id"], "fw-1");
        assert_eq!(json["kubernetes_version"], "1.21.0-k3s1");
        assert_eq!(json["applications"], "Traefik,Helm");
        assert_eq!(json["pools"][0]["id"], "my-civo-cluster-pool-0");
        assert_eq!(json["pools"][0]["count"], 3);
        assert_eq!(json["pools"][0]["size"], "g3.k3s.medium");
    }

    #[test]
    fn test_existing_cluster_on_other_firewall_is_rejected() {
        let err = check_attachment(&existing(Some("net-1"), Some("fw-OTHER")), &london_spec())
            .unwrap_err();
        assert!(err.to_string().contains("fw-OTHER"));
    }

    #[test]
    fn test_existing_cluster_on_other_network_is_rejected() {
        let err = check_attachment(&existing(Some("net-OTHER"), Some("fw-1")), &london_spec())
            .unwrap_err();
        assert!(err.to_string().contains("net-OTHER"));
    }

    #[test]
    fn test_existing_cluster_on_this_run_is_reused() {
        let spec = london_spec();
        assert!(check_attachment(&existing(Some("net-1"), Some("fw-1")), &spec).is_ok());
        assert!(check_attachment(&existing(None, None), &spec).is_ok());
    }
}
