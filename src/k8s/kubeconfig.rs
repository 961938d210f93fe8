/// Kubeconfig parsing and validation
use anyhow::{Context, Result};
use serde::Deserialize;

/// The subset of a kubeconfig needed to check it is usable
#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Kubeconfig {
    #[serde(default)]
    pub clusters: Vec<NamedCluster>,
    #[serde(default)]
    pub contexts: Vec<NamedContext>,
    #[serde(default)]
    pub current_context: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct NamedCluster {
    pub name: String,
    pub cluster: ClusterEntry,
}

#[derive(Debug, Deserialize)]
pub struct ClusterEntry {
    pub server: String,
}

#[derive(Debug, Deserialize)]
pub struct NamedContext {
    pub name: String,
    pub context: ContextEntry,
}

#[derive(Debug, Deserialize)]
pub struct ContextEntry {
    pub cluster: String,
    #[serde(default)]
    pub user: Option<String>,
}

impl Kubeconfig {
    /// Parse and check that the current context points at a server
    pub fn parse(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            anyhow::bail!("kubeconfig is empty");
        }

        let config: Kubeconfig =
            serde_yaml::from_str(content).context("kubeconfig is not valid YAML")?;

        if config.clusters.is_empty() {
            anyhow::bail!("kubeconfig defines no clusters");
        }
        config.server()?;

        Ok(config)
    }

    /// API server URL of the current context, or of the only cluster
    pub fn server(&self) -> Result<&str> {
        let cluster_name = match &self.current_context {
            Some(current) => {
                let context = self
                    .contexts
                    .iter()
                    .find(|c| &c.name == current)
                    .with_context(|| format!("current context {} is not defined", current))?;
                context.context.cluster.as_str()
            }
            None if self.clusters.len() == 1 => self.clusters[0].name.as_str(),
            None => anyhow::bail!("kubeconfig has several clusters and no current context"),
        };

        let cluster = self
            .clusters
            .iter()
            .find(|c| c.name == cluster_name)
            .with_context(|| format!("cluster {} is not defined", cluster_name))?;

        if cluster.cluster.server.trim().is_empty() {
            anyhow::bail!("cluster {} has no server URL", cluster_name);
        }

        Ok(&cluster.cluster.server)
    }
}

#[cfg(test)]
pub(crate) const SAMPLE: &str = r#"apiVersion: v1
kind: Config
clusters:
- cluster:
    certificate-authority-data: LS0tLS1CRUdJTi==
    server: https://212.2.240.10:6443
  name: my-civo-cluster
contexts:
- context:
    cluster: my-civo-cluster
    user: my-civo-cluster
  name: my-civo-cluster
current-context: my-civo-cluster
users:
- name: my-civo-cluster
  user:
    client-certificate-data: LS0tLS1CRUdJTi==
    client-key-data: LS0tLS1CRUdJTi==
"#;
