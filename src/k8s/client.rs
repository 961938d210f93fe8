/// Kubernetes client scoped to a single cluster's kubeconfig
use anyhow::{Context, Result};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info};

use super::kubeconfig::Kubeconfig;
use crate::utils::command::{ensure_tool, ToolCommand};

static NEXT_CLIENT_ID: AtomicU64 = AtomicU64::new(1);

/// Handle on one cluster's API.
///
/// Every command built through the client is pinned to this client's
/// kubeconfig file, never to the ambient `~/.kube/config`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KubeClient {
    id: u64,
    cluster_name: String,
    kubeconfig_path: PathBuf,
    server: String,
}

impl KubeClient {
    pub fn new(cluster_name: &str, kubeconfig_path: PathBuf, server: &str) -> Self {
        Self {
            id: NEXT_CLIENT_ID.fetch_add(1, Ordering::Relaxed),
            cluster_name: cluster_name.to_string(),
            kubeconfig_path,
            server: server.to_string(),
        }
    }

    /// Validate `kubeconfig` and store it under `dir` as `<cluster>.kubeconfig`
    pub async fn from_kubeconfig(cluster_name: &str, kubeconfig: &str, dir: &Path) -> Result<Self> {
        let parsed = Kubeconfig::parse(kubeconfig)?;
        let server = parsed.server()?.to_string();

        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("Failed to create {}", dir.display()))?;

        let path = Self::kubeconfig_file(dir, cluster_name);
        tokio::fs::write(&path, kubeconfig)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;

        info!("Kubernetes client for {} targets {}", cluster_name, server);

        let client = Self::new(cluster_name, path, &server);
        debug!(
            "Client #{} bound to {}",
            client.id,
            client.kubeconfig_path.display()
        );
        Ok(client)
    }

    /// Where `from_kubeconfig` stores a cluster's kubeconfig under `dir`
    pub fn kubeconfig_file(dir: &Path, cluster_name: &str) -> PathBuf {
        dir.join(format!("{}.kubeconfig", cluster_name))
    }

    #[cfg(test)]
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn cluster_name(&self) -> &str {
        &self.cluster_name
    }

    pub fn kubeconfig_path(&self) -> &Path {
        &self.kubeconfig_path
    }

    pub fn server(&self) -> &str {
        &self.server
    }

    /// Build a tool invocation bound to this cluster
    pub fn command<S: AsRef<OsStr>>(&self, program: S) -> ToolCommand {
        ToolCommand::new(program)
            .kubeconfig(&self.kubeconfig_path)
            .arg("--kubeconfig")
            .arg(&self.kubeconfig_path)
    }

    /// Server version reported by the control plane
    pub async fn server_version(&self) -> Result<String> {
        let stdout = self
            .command("kubectl")
            .args(["version", "-o", "json"])
            .describe("Failed to reach Kubernetes API")
            .run()
            .await?;

        let version: serde_json::Value =
            serde_json::from_str(&stdout).context("Unexpected kubectl version output")?;

        version["serverVersion"]["gitVersion"]
            .as_str()
            .map(str::to_string)
            .context("kubectl did not report a server version")
    }

    /// Check if kubectl is installed
    pub async fn check_kubectl_installed() -> Result<()> {
        ensure_tool(
            "kubectl",
            &["version", "--client"],
            "https://kubernetes.io/docs/tasks/tools/",
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::k8s::kubeconfig::SAMPLE;

    #[tokio::test]
    async fn test_clients_are_isolated_per_cluster() {
        let dir = tempfile::tempdir().unwrap();

        let a = KubeClient::from_kubeconfig("cluster-a", SAMPLE, dir.path())
            .await
            .unwrap();
        let b = KubeClient::from_kubeconfig("cluster-b", SAMPLE, dir.path())
            .await
            .unwrap();

        assert_ne!(a.id(), b.id());
        assert_ne!(a.kubeconfig_path(), b.kubeconfig_path());
        assert_eq!(
            a.kubeconfig_path(),
            KubeClient::kubeconfig_file(dir.path(), "cluster-a")
        );
        assert_eq!(
            std::fs::read_to_string(a.kubeconfig_path()).unwrap(),
            SAMPLE
        );
        assert_eq!(a.server(), "https://212.2.240.10:6443");
    }

    #[tokio::test]
    async fn test_invalid_kubeconfig_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();

        let result = KubeClient::from_kubeconfig("broken", "", dir.path()).await;

        tokio_test::assert_err!(result);
        assert!(!dir.path().join("broken.kubeconfig").exists());
    }

    #[test]
    fn test_commands_pin_kubeconfig() {
        let client = KubeClient::new("c", PathBuf::from("/tmp/c.kubeconfig"), "https://x");
        let rendered = client.command("helm").arg("list").rendered();
        assert_eq!(rendered, "helm --kubeconfig /tmp/c.kubeconfig list");
    }
}
