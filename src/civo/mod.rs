/// Civo API client implementation
pub mod client;
pub mod firewall;
pub mod kubernetes;
pub mod models;
pub mod network;

pub use client::CivoClient;
pub use firewall::FirewallManager;
pub use kubernetes::ClusterManager;
pub use network::NetworkManager;

use anyhow::Result;
use async_trait::async_trait;

use crate::provider::CloudProvider;
use crate::resources::{ClusterSpec, FirewallArgs, NetworkArgs};
use models::{Firewall, KubernetesCluster, Network};

/// `CloudProvider` backed by the Civo API
pub struct CivoCloud {
    networks: NetworkManager,
    firewalls: FirewallManager,
    clusters: ClusterManager,
    ready_timeout_secs: u64,
}

impl CivoCloud {
    pub fn new(client: CivoClient, ready_timeout_secs: u64) -> Self {
        Self {
            networks: NetworkManager::new(client.clone()),
            firewalls: FirewallManager::new(client.clone()),
            clusters: ClusterManager::new(client),
            ready_timeout_secs,
        }
    }
}

#[async_trait]
impl CloudProvider for CivoCloud {
    async fn create_network(&self, args: &NetworkArgs) -> Result<Network> {
        self.networks.ensure_network(args).await
    }

    async fn create_firewall(&self, args: &FirewallArgs) -> Result<Firewall> {
        self.firewalls
            .ensure_firewall(
                &args.name,
                &args.region,
                &args.network_id,
                args.create_default_rules,
            )
            .await
    }

    async fn create_cluster(&self, name: &str, spec: &ClusterSpec) -> Result<KubernetesCluster> {
        let cluster = self.clusters.ensure_cluster(name, spec).await?;
        self.clusters
            .wait_for_active(&cluster, &spec.region, self.ready_timeout_secs)
            .await
    }

    async fn read_kubeconfig(
        &self,
        cluster: &KubernetesCluster,
        region: &str,
    ) -> Result<Option<String>> {
        if let Some(kubeconfig) = cluster.kubeconfig.as_ref().filter(|k| !k.trim().is_empty()) {
            return Ok(Some(kubeconfig.clone()));
        }
        self.clusters.kubeconfig(&cluster.id, region).await
    }
}
