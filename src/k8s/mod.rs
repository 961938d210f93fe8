/// Kubernetes access scoped to a cluster's kubeconfig
pub mod client;
pub mod kubeconfig;

pub use client::KubeClient;
