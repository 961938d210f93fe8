/// Network management for Civo
use anyhow::{Context, Result};
use tracing::info;

use super::client::CivoClient;
use super::models::Network;
use crate::resources::NetworkArgs;

/// Network manager for handling Civo private networks
pub struct NetworkManager {
    client: CivoClient,
}

impl NetworkManager {
    /// Create a new network manager
    pub fn new(client: CivoClient) -> Self {
        Self { client }
    }

    /// Find a network by label
    pub async fn find_network(&self, label: &str, region: &str) -> Result<Option<Network>> {
        let networks = self
            .client
            .list_networks(region)
            .await
            .context("Failed to list networks")?;

        Ok(networks.into_iter().find(|n| n.label == label))
    }

    /// Create or get existing network with the requested label
    pub async fn ensure_network(&self, args: &NetworkArgs) -> Result<Network> {
        if let Some(network) = self.find_network(&args.label, &args.region).await? {
            info!(
                "Found existing network: {} (ID: {})",
                network.label, network.id
            );
            return Ok(network);
        }

        info!("Creating private network: {}", args.label);

        let created = self
            .client
            .create_network(&args.label, &args.region)
            .await
            .context("Failed to create network")?;

        info!(
            "Network created successfully: {} (ID: {})",
            created.label, created.id
        );

        Ok(Network {
            id: created.id,
            name: args.label.clone(),
            label: args.label.clone(),
            default: false,
            region: Some(args.region.clone()),
            status: None,
        })
    }

    /// Delete network by label
    pub async fn delete_network(&self, label: &str, region: &str) -> Result<()> {
        match self.find_network(label, region).await? {
            Some(network) => {
                info!("Deleting network: {} (ID: {})", network.label, network.id);
                self.client
                    .delete_network(&network.id, region)
                    .await
                    .context("Failed to delete network")?;
                info!("Network deleted successfully");
            }
            None => info!("Network not found, nothing to delete"),
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    #[ignore] // Requires API token
    async fn test_network_roundtrip() {
        let token = std::env::var("CIVO_TOKEN").expect("CIVO_TOKEN not set");
        let client = CivoClient::new(&token, super::super::client::CIVO_API_BASE).unwrap();
        let manager = NetworkManager::new(client);
        let args = NetworkArgs {
            label: "civo-opencost-test-network".to_string(),
            region: "LON1".to_string(),
        };

        let first = manager.ensure_network(&args).await.unwrap();
        let second = manager.ensure_network(&args).await.unwrap();
        assert_eq!(first.id, second.id);

        manager.delete_network(&args.label, &args.region).await.unwrap();
    }
}
