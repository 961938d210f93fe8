/// Helm chart installation through a cluster-scoped client
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::k8s::KubeClient;
use crate::provider::KubernetesProvider;
use crate::utils::command::ensure_tool;

pub const OPENCOST_RELEASE: &str = "opencost";
pub const OPENCOST_NAMESPACE: &str = "opencost";
pub const OPENCOST_CHART: &str = "cost-analyzer";
pub const OPENCOST_CHART_VERSION: &str = "1.82.0";
pub const OPENCOST_REPO: &str = "https://helm.opencost.io";

/// A chart to install, pinned to an exact version and repository
#[derive(Debug, Clone, PartialEq)]
pub struct ChartRelease {
    pub name: String,
    pub namespace: String,
    pub chart: String,
    pub version: String,
    pub repo: String,
    pub values: serde_json::Value,
}

impl ChartRelease {
    /// The OpenCost cost-analyzer, labelled with the cluster it reports on
    pub fn opencost(cluster_name: &str) -> Self {
        Self {
            name: OPENCOST_RELEASE.to_string(),
            namespace: OPENCOST_NAMESPACE.to_string(),
            chart: OPENCOST_CHART.to_string(),
            version: OPENCOST_CHART_VERSION.to_string(),
            repo: OPENCOST_REPO.to_string(),
            values: serde_json::json!({
                "global": {
                    "clusterName": cluster_name,
                },
            }),
        }
    }

    /// `helm` arguments for an idempotent install
    fn install_args(&self, values_file: &Path) -> Vec<String> {
        vec![
            "upgrade".to_string(),
            "--install".to_string(),
            self.name.clone(),
            self.chart.clone(),
            "--repo".to_string(),
            self.repo.clone(),
            "--version".to_string(),
            self.version.clone(),
            "--namespace".to_string(),
            self.namespace.clone(),
            "--create-namespace".to_string(),
            "--values".to_string(),
            values_file.display().to_string(),
        ]
    }
}

/// A release that helm reported as deployed
#[derive(Debug, Clone, PartialEq)]
pub struct InstalledRelease {
    pub name: String,
    pub namespace: String,
    pub chart: String,
    pub version: String,
    pub cluster: String,
}

/// Installs charts with the `helm` CLI
pub struct HelmProvider {
    workdir: PathBuf,
}

impl HelmProvider {
    /// Kubeconfigs and values files are kept under `workdir`
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
        }
    }

    /// Check if helm is installed
    pub async fn check_helm_installed() -> Result<()> {
        ensure_tool("helm", &["version"], "https://helm.sh/docs/intro/install/").await
    }

    /// Remove a release; a release that is already gone is not an error
    pub async fn uninstall(&self, client: &KubeClient, name: &str, namespace: &str) -> Result<()> {
        info!("Uninstalling release {} from {}", name, client.cluster_name());

        let output = client
            .command("helm")
            .args(["uninstall", name, "--namespace", namespace])
            .output()
            .await?;

        if !output.success() {
            if output.stderr.contains("not found") {
                info!("Release {} not found, nothing to uninstall", name);
                return Ok(());
            }
            anyhow::bail!("Failed to uninstall {}: {}", name, output.stderr.trim());
        }

        info!("Release {} uninstalled", name);
        Ok(())
    }

    /// Values file written for `release` on `cluster_name`
    pub fn values_file(&self, cluster_name: &str, release: &str) -> PathBuf {
        self.workdir
            .join(format!("{}-{}-values.yaml", cluster_name, release))
    }

    async fn write_values(&self, client: &KubeClient, release: &ChartRelease) -> Result<PathBuf> {
        let path = self.values_file(client.cluster_name(), &release.name);
        let yaml = serde_yaml::to_string(&release.values).context("Failed to render chart values")?;

        tokio::fs::create_dir_all(&self.workdir)
            .await
            .with_context(|| format!("Failed to create {}", self.workdir.display()))?;
        tokio::fs::write(&path, yaml)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;

        Ok(path)
    }
}

#[async_trait]
impl KubernetesProvider for HelmProvider {
    async fn connect(&self, cluster_name: &str, kubeconfig: &str) -> Result<KubeClient> {
        KubeClient::from_kubeconfig(cluster_name, kubeconfig, &self.workdir).await
    }

    async fn install_chart(
        &self,
        client: &KubeClient,
        release: &ChartRelease,
    ) -> Result<InstalledRelease> {
        info!(
            "Installing {} {} from {} into {}/{}",
            release.chart,
            release.version,
            release.repo,
            client.cluster_name(),
            release.namespace
        );

        let values_file = self.write_values(client, release).await?;

        client
            .command("helm")
            .args(release.install_args(&values_file))
            .describe(format!("Failed to install {}", release.name))
            .run()
            .await?;

        info!("✓ Release {} deployed", release.name);

        Ok(InstalledRelease {
            name: release.name.clone(),
            namespace: release.namespace.clone(),
            chart: release.chart.clone(),
            version: release.version.clone(),
            cluster: client.cluster_name().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opencost_release_is_pinned() {
        let a = ChartRelease::opencost("alpha");
        let b = ChartRelease::opencost("beta");

        assert_eq!(a.chart, "cost-analyzer");
        assert_eq!(a.version, "1.82.0");
        assert_eq!(a.repo, "https://helm.opencost.io");
        assert_eq!((a.version, a.repo), (b.version, b.repo));
        assert_eq!(b.values["global"]["clusterName"], "beta");
    }

    #[test]
    fn test_install_args() {
        let release = ChartRelease::opencost("alpha");
        let args = release.install_args(Path::new("/work/alpha-opencost-values.yaml"));

        assert_eq!(
            args.join(" "),
            "upgrade --install opencost cost-analyzer --repo https://helm.opencost.io \
             --version 1.82.0 --namespace opencost --create-namespace \
             --values /work/alpha-opencost-values.yaml"
        );
    }

    #[tokio::test]
    async fn test_values_file_contents() {
        let dir = tempfile::tempdir().unwrap();
        let provider = HelmProvider::new(dir.path());
        let client = KubeClient::new("alpha", dir.path().join("alpha.kubeconfig"), "https://x");

        let path = provider
            .write_values(&client, &ChartRelease::opencost("alpha"))
            .await
            .unwrap();

        assert_eq!(path, provider.values_file("alpha", "opencost"));
        let written: serde_yaml::Value =
            serde_yaml::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(written["global"]["clusterName"].as_str(), Some("alpha"));
    }

    #[tokio::test]
    async fn test_check_helm() {
        // Informational: helm may be absent in CI
        let _ = HelmProvider::check_helm_installed().await;
    }
}
