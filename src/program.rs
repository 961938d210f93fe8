/// The stack: network, firewall, then a cost-monitored cluster
use std::sync::Arc;
use tracing::debug;

use crate::component::CostMonitoredCluster;
use crate::config::StackConfig;
use crate::error::StackError;
use crate::provider::{CloudProvider, KubernetesProvider};
use crate::resources::{ClusterSpec, FirewallArgs, NetworkArgs};
use crate::stack::{Output, ResourceKind, Stack};

pub const KUBECONFIG_EXPORT: &str = "kubeconfig";
pub const CLUSTER_ID_EXPORT: &str = "cluster_id";
pub const API_SERVER_EXPORT: &str = "api_server";
pub const RELEASE_EXPORT: &str = "opencost_release";

/// Declare every resource of the stack and export the kubeconfig
/// alongside the cluster id, API server and release identity.
///
/// Nothing is created here; `Stack::apply` realizes the declarations.
pub fn declare(
    stack: &Stack,
    config: &StackConfig,
    cloud: Arc<dyn CloudProvider>,
    kube: Arc<dyn KubernetesProvider>,
) -> Result<CostMonitoredCluster, StackError> {
    let region = config.civo.region.clone();

    let network = {
        let cloud = cloud.clone();
        let args = NetworkArgs {
            label: config.network.label.clone(),
            region: region.clone(),
        };
        stack.register(
            ResourceKind::Network,
            &config.network.label,
            None,
            Output::known(args).apply(move |args| async move {
                cloud
                    .create_network(&args)
                    .await
                    .map(|network| network.id)
                    .map_err(|e| StackError::provider(&args.label, &e))
            }),
        )?
    };

    let firewall = {
        let cloud = cloud.clone();
        let name = config.firewall.name.clone();
        let region = region.clone();
        let create_default_rules = config.firewall.create_default_rules;
        stack.register(
            ResourceKind::Firewall,
            &config.firewall.name,
            None,
            network.output.apply(move |network_id| async move {
                let args = FirewallArgs {
                    name,
                    region,
                    network_id,
                    create_default_rules,
                };
                cloud
                    .create_firewall(&args)
                    .await
                    .map(|firewall| firewall.id)
                    .map_err(|e| StackError::provider(&args.name, &e))
            }),
        )?
    };

    let spec = {
        let cluster = config.cluster.clone();
        network
            .output
            .zip(&firewall.output)
            .map(move |(network_id, firewall_id)| ClusterSpec {
                region,
                network_id,
                firewall_id,
                kubernetes_version: cluster.kubernetes_version,
                pools: cluster.pools,
                applications: cluster.applications,
            })
    };

    let component = CostMonitoredCluster::new(stack, &config.cluster.name, spec, cloud, kube)?;
    stack.export_secret(KUBECONFIG_EXPORT, component.kubeconfig.clone());
    stack.export(
        CLUSTER_ID_EXPORT,
        component.cluster.output.map(|cluster| cluster.id),
    );
    stack.export(
        API_SERVER_EXPORT,
        component.client.output.map(|client| client.server().to_string()),
    );
    stack.export(
        RELEASE_EXPORT,
        component
            .release
            .output
            .map(|release| format!("{}/{} {}", release.namespace, release.name, release.version)),
    );
    debug!("Declared {}", component.urn);

    Ok(component)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::fake::{kubeconfig_for, Call, FakeCloud, FakeKube};

    fn declare_fake(stack: &Stack) -> (CostMonitoredCluster, crate::provider::fake::CallLog) {
        let cloud = FakeCloud::default();
        let log = cloud.log.clone();
        let kube = FakeKube {
            log: log.clone(),
            ..Default::default()
        };
        let component =
            declare(stack, &StackConfig::example(), Arc::new(cloud), Arc::new(kube)).unwrap();
        (component, log)
    }

    #[tokio::test]
    async fn test_cluster_references_network_and_firewall_of_this_run() {
        let stack = Stack::new("dev");
        let (component, log) = declare_fake(&stack);

        let records = stack.resources();
        let component_record = records.iter().find(|r| r.urn == component.urn).unwrap();
        let network_urn = &records[0].urn;
        let firewall_urn = &records[1].urn;
        assert_eq!(records[0].kind, ResourceKind::Network);
        assert_eq!(records[1].kind, ResourceKind::Firewall);
        assert!(records[1].dependencies.contains(network_urn));
        assert!(component_record.dependencies.contains(network_urn));
        assert!(component_record.dependencies.contains(firewall_urn));

        stack.apply().await.unwrap();

        let calls = log.lock().unwrap().clone();
        let Call::CreateFirewall(fw) = &calls[1] else {
            panic!("expected firewall creation, got {:?}", calls[1]);
        };
        assert_eq!(fw.network_id, "net-my-custom-network");
        assert!(fw.create_default_rules);

        let Call::CreateCluster { spec, .. } = &calls[2] else {
            panic!("expected cluster creation, got {:?}", calls[2]);
        };
        assert_eq!(spec.network_id, "net-my-custom-network");
        assert_eq!(spec.firewall_id, "fw-my-civo-cluster-firewall");
        assert_eq!(spec.region, "LON1");
        assert_eq!(spec.applications_field(), "Traefik,Helm");
    }

    #[tokio::test]
    async fn test_exported_kubeconfig_matches_provider() {
        let stack = Stack::new("dev");
        declare_fake(&stack);

        let outputs = stack.apply().await.unwrap();

        assert_eq!(
            outputs.get(KUBECONFIG_EXPORT),
            Some(kubeconfig_for("cluster-my-civo-cluster").as_str())
        );
        assert!(outputs.secrets.contains(KUBECONFIG_EXPORT));
    }

    #[tokio::test]
    async fn test_plain_exports_describe_the_cluster() {
        let stack = Stack::new("dev");
        declare_fake(&stack);

        let outputs = stack.apply().await.unwrap();

        assert_eq!(outputs.get(CLUSTER_ID_EXPORT), Some("cluster-my-civo-cluster"));
        assert_eq!(outputs.get(API_SERVER_EXPORT), Some("https://fake:6443"));
        assert_eq!(outputs.get(RELEASE_EXPORT), Some("opencost/opencost 1.82.0"));
        assert_eq!(outputs.secrets.len(), 1);
        assert_eq!(
            outputs.display_value(CLUSTER_ID_EXPORT).as_deref(),
            Some("cluster-my-civo-cluster")
        );
    }

    #[test]
    fn test_declaring_makes_no_calls() {
        let stack = Stack::new("dev");
        let (_component, log) = declare_fake(&stack);

        assert!(log.lock().unwrap().is_empty());
        let order: Vec<ResourceKind> = stack.creation_order().into_iter().map(|r| r.kind).collect();
        assert_eq!(
            order,
            vec![
                ResourceKind::Network,
                ResourceKind::Firewall,
                ResourceKind::Component(crate::component::COMPONENT_TYPE),
                ResourceKind::KubernetesCluster,
                ResourceKind::KubernetesProvider,
                ResourceKind::HelmRelease,
            ]
        );
    }
}
