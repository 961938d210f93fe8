/// Collaborator seams: the cloud API and the in-cluster chart installer
use anyhow::Result;
use async_trait::async_trait;

use crate::civo::models::{Firewall, KubernetesCluster, Network};
use crate::helm::{ChartRelease, InstalledRelease};
use crate::k8s::KubeClient;
use crate::resources::{ClusterSpec, FirewallArgs, NetworkArgs};

/// Cloud-side operations a stack needs
#[async_trait]
pub trait CloudProvider: Send + Sync {
    async fn create_network(&self, args: &NetworkArgs) -> Result<Network>;

    async fn create_firewall(&self, args: &FirewallArgs) -> Result<Firewall>;

    /// Create the cluster and wait until it is realized
    async fn create_cluster(&self, name: &str, spec: &ClusterSpec) -> Result<KubernetesCluster>;

    /// Credential material for a realized cluster; `None` when the
    /// provider returned nothing usable
    async fn read_kubeconfig(
        &self,
        cluster: &KubernetesCluster,
        region: &str,
    ) -> Result<Option<String>>;
}

/// Cluster-side operations a stack needs
#[async_trait]
pub trait KubernetesProvider: Send + Sync {
    /// Build a client bound to exactly this kubeconfig
    async fn connect(&self, cluster_name: &str, kubeconfig: &str) -> Result<KubeClient>;

    async fn install_chart(
        &self,
        client: &KubeClient,
        release: &ChartRelease,
    ) -> Result<InstalledRelease>;
}

/// Recording fakes of both seams
#[cfg(test)]
pub mod fake {
    use super::*;
    use std::path::PathBuf;
    use std::sync::{Arc, Mutex};

    /// One observed provider call
    #[derive(Debug, Clone, PartialEq)]
    pub enum Call {
        CreateNetwork(NetworkArgs),
        CreateFirewall(FirewallArgs),
        CreateCluster { name: String, spec: ClusterSpec },
        ReadKubeconfig { cluster_id: String },
        Connect { cluster: String, kubeconfig: String, client_id: u64 },
        InstallChart { client_id: u64, release: ChartRelease },
    }

    pub type CallLog = Arc<Mutex<Vec<Call>>>;

    pub fn kubeconfig_for(cluster_id: &str) -> String {
        format!("apiVersion: v1\n# credentials for {}\n", cluster_id)
    }

    #[derive(Default)]
    pub struct FakeCloud {
        pub log: CallLog,
        pub fail_cluster_create: Option<String>,
        pub empty_kubeconfig: bool,
    }

    impl FakeCloud {
        fn record(&self, call: Call) {
            self.log.lock().unwrap().push(call);
        }
    }

    #[async_trait]
    impl CloudProvider for FakeCloud {
        async fn create_network(&self, args: &NetworkArgs) -> Result<Network> {
            self.record(Call::CreateNetwork(args.clone()));
            Ok(Network {
                id: format!("net-{}", args.label),
                name: args.label.clone(),
                label: args.label.clone(),
                default: false,
                region: Some(args.region.clone()),
                status: Some("Active".to_string()),
            })
        }

        async fn create_firewall(&self, args: &FirewallArgs) -> Result<Firewall> {
            self.record(Call::CreateFirewall(args.clone()));
            Ok(Firewall {
                id: format!("fw-{}", args.name),
                name: args.name.clone(),
                network_id: Some(args.network_id.clone()),
                rules_count: None,
                cluster_count: None,
            })
        }

        async fn create_cluster(
            &self,
            name: &str,
            spec: &ClusterSpec,
        ) -> Result<KubernetesCluster> {
            self.record(Call::CreateCluster {
                name: name.to_string(),
                spec: spec.clone(),
            });
            if let Some(reason) = &self.fail_cluster_create {
                anyhow::bail!("API error: {}", reason);
            }
            Ok(KubernetesCluster {
                id: format!("cluster-{}", name),
                name: name.to_string(),
                status: "ACTIVE".to_string(),
                ready: true,
                version: Some(spec.kubernetes_version.clone()),
                network_id: Some(spec.network_id.clone()),
                firewall_id: Some(spec.firewall_id.clone()),
                api_endpoint: None,
                master_ip: None,
                kubeconfig: None,
                pools: vec![],
                created_at: None,
            })
        }

        async fn read_kubeconfig(
            &self,
            cluster: &KubernetesCluster,
            _region: &str,
        ) -> Result<Option<String>> {
            self.record(Call::ReadKubeconfig {
                cluster_id: cluster.id.clone(),
            });
            if self.empty_kubeconfig {
                return Ok(None);
            }
            Ok(Some(kubeconfig_for(&cluster.id)))
        }
    }

    #[derive(Default)]
    pub struct FakeKube {
        pub log: CallLog,
        pub fail_connect: Option<String>,
        pub fail_install: Option<String>,
    }

    #[async_trait]
    impl KubernetesProvider for FakeKube {
        async fn connect(&self, cluster_name: &str, kubeconfig: &str) -> Result<KubeClient> {
            let client = KubeClient::new(
                cluster_name,
                PathBuf::from(format!("/fake/{}.kubeconfig", cluster_name)),
                "https://fake:6443",
            );
            self.log.lock().unwrap().push(Call::Connect {
                cluster: cluster_name.to_string(),
                kubeconfig: kubeconfig.to_string(),
                client_id: client.id(),
            });
            if let Some(reason) = &self.fail_connect {
                anyhow::bail!("{}", reason);
            }
            Ok(client)
        }

        async fn install_chart(
            &self,
            client: &KubeClient,
            release: &ChartRelease,
        ) -> Result<InstalledRelease> {
            self.log.lock().unwrap().push(Call::InstallChart {
                client_id: client.id(),
                release: release.clone(),
            });
            if let Some(reason) = &self.fail_install {
                anyhow::bail!("{}", reason);
            }
            Ok(InstalledRelease {
                name: release.name.clone(),
                namespace: release.namespace.clone(),
                chart: release.chart.clone(),
                version: release.version.clone(),
                cluster: client.cluster_name().to_string(),
            })
        }
    }
}
