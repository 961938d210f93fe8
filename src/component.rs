/// Composite resource: a Civo cluster with OpenCost installed on it
use std::sync::Arc;
use tracing::info;

use crate::civo::models::KubernetesCluster;
use crate::error::StackError;
use crate::helm::{ChartRelease, InstalledRelease};
use crate::k8s::KubeClient;
use crate::provider::{CloudProvider, KubernetesProvider};
use crate::resources::ClusterSpec;
use crate::stack::{Output, Resource, ResourceKind, Stack, Urn};

pub const COMPONENT_TYPE: &str = "civo-opencost:cluster";

/// Cluster, credential and cost-analyzer release bundled as one unit.
///
/// Children are registered under the component so teardown removes the
/// release before the cluster. Each step only starts once the value it
/// reads is available:
///
/// 1. realize the cluster from the spec
/// 2. read its kubeconfig
/// 3. build a Kubernetes client from that kubeconfig alone
/// 4. install the pinned OpenCost chart through that client
pub struct CostMonitoredCluster {
    pub urn: Urn,
    pub cluster: Resource<KubernetesCluster>,
    pub client: Resource<KubeClient>,
    pub release: Resource<InstalledRelease>,
    /// Kubeconfig exactly as the provider returned it
    pub kubeconfig: Output<String>,
}

impl CostMonitoredCluster {
    pub fn new(
        stack: &Stack,
        name: &str,
        spec: Output<ClusterSpec>,
        cloud: Arc<dyn CloudProvider>,
        kube: Arc<dyn KubernetesProvider>,
    ) -> Result<Self, StackError> {
        let component = stack.register(
            ResourceKind::Component(COMPONENT_TYPE),
            name,
            None,
            spec.map(|_| ()),
        )?;
        let parent = Some(&component.urn);

        let cluster = {
            let cloud = cloud.clone();
            let cluster_name = name.to_string();
            stack.register(
                ResourceKind::KubernetesCluster,
                name,
                parent,
                spec.apply(move |spec| async move {
                    spec.validate()?;
                    let cluster = cloud
                        .create_cluster(&cluster_name, &spec)
                        .await
                        .map_err(|e| StackError::provider(&cluster_name, &e))?;
                    info!("Cluster {} realized (ID: {})", cluster.name, cluster.id);
                    Ok(cluster)
                }),
            )?
        };

        let kubeconfig = {
            let region = spec.map(|spec| spec.region);
            cluster
                .output
                .zip(&region)
                .apply(move |(cluster, region)| async move {
                    match cloud.read_kubeconfig(&cluster, &region).await {
                        Ok(Some(kubeconfig)) if !kubeconfig.trim().is_empty() => Ok(kubeconfig),
                        Ok(_) => Err(StackError::credential(
                            &cluster.name,
                            "provider returned no kubeconfig",
                        )),
                        Err(e) => Err(StackError::provider(
                            format!("{} kubeconfig", cluster.name),
                            &e,
                        )),
                    }
                })
        };

        let client = {
            let kube = kube.clone();
            stack.register(
                ResourceKind::KubernetesProvider,
                &format!("{}-k8s", name),
                parent,
                kubeconfig
                    .zip(&cluster.output)
                    .apply(move |(kubeconfig, cluster)| async move {
                        kube.connect(&cluster.name, &kubeconfig)
                            .await
                            .map_err(|e| StackError::credential(&cluster.name, format!("{:#}", e)))
                    }),
            )?
        };

        let release = stack.register(
            ResourceKind::HelmRelease,
            &format!("{}-opencost", name),
            parent,
            client
                .output
                .zip(&cluster.output)
                .apply(move |(client, cluster)| async move {
                    let chart = ChartRelease::opencost(&cluster.name);
                    kube.install_chart(&client, &chart)
                        .await
                        .map_err(|e| StackError::chart_install(&chart.name, &e))
                }),
        )?;

        Ok(Self {
            urn: component.urn,
            cluster,
            client,
            release,
            kubeconfig,
        })
    }
}
