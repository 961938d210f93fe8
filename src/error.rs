/// Error taxonomy for stack evaluation
use thiserror::Error;

/// Errors surfaced while declaring or applying a stack.
///
/// Values are cloneable because a single failure is observed by every
/// deferred output that depends on the failing resource.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StackError {
    /// Malformed specification, rejected before any remote call
    #[error("invalid specification: {0}")]
    InvalidSpec(String),

    /// Two resources registered under the same URN
    #[error("duplicate resource: {0}")]
    DuplicateResource(String),

    /// Cloud provider request failed (network, auth, quota, validation)
    #[error("provider request for {resource} failed: {message}")]
    Provider { resource: String, message: String },

    /// Cluster realized without usable credential material
    #[error("kubeconfig for cluster {cluster} is unusable: {message}")]
    Credential { cluster: String, message: String },

    /// Chart repository, chart version or control plane unreachable
    #[error("chart release {release} failed: {message}")]
    ChartInstall { release: String, message: String },
}

impl StackError {
    pub fn provider(resource: impl Into<String>, err: &anyhow::Error) -> Self {
        Self::Provider {
            resource: resource.into(),
            message: format!("{:#}", err),
        }
    }

    pub fn credential(cluster: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Credential {
            cluster: cluster.into(),
            message: message.into(),
        }
    }

    pub fn chart_install(release: impl Into<String>, err: &anyhow::Error) -> Self {
        Self::ChartInstall {
            release: release.into(),
            message: format!("{:#}", err),
        }
    }
}
