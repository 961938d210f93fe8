/// Firewall management for Civo
use anyhow::{Context, Result};
use tokio::time::{sleep, Duration};
use tracing::info;

use super::client::{CivoClient, CreateFirewallRequest};
use super::models::Firewall;

/// Attempts made while a firewall is still attached to a cluster
const DELETE_ATTEMPTS: u32 = 12;

/// Firewall manager
pub struct FirewallManager {
    client: CivoClient,
}

impl FirewallManager {
    /// Create a new firewall manager
    pub fn new(client: CivoClient) -> Self {
        Self { client }
    }

    /// Find a firewall by name
    pub async fn find_firewall(&self, name: &str, region: &str) -> Result<Option<Firewall>> {
        let firewalls = self
            .client
            .list_firewalls(region)
            .await
            .context("Failed to list firewalls")?;

        Ok(firewalls.into_iter().find(|f| f.name == name))
    }

    /// Create or get existing firewall bound to `network_id`.
    ///
    /// With `create_default_rules` Civo opens its standard ingress set
    /// (SSH, HTTP/S, the Kubernetes API) and allows all egress.
    pub async fn ensure_firewall(
        &self,
        name: &str,
        region: &str,
        network_id: &str,
        create_default_rules: bool,
    ) -> Result<Firewall> {
        if let Some(firewall) = self.find_firewall(name, region).await? {
            if firewall.network_id.as_deref().is_some_and(|id| id != network_id) {
                anyhow::bail!(
                    "Firewall {} already exists on network {:?}, expected {}",
                    name,
                    firewall.network_id,
                    network_id
                );
            }
            info!(
                "Found existing firewall: {} (ID: {})",
                firewall.name, firewall.id
            );
            return Ok(firewall);
        }

        info!("Creating firewall {} on network {}", name, network_id);

        let request = CreateFirewallRequest {
            name: name.to_string(),
            region: region.to_string(),
            network_id: network_id.to_string(),
            create_rules: create_default_rules,
        };

        let created = self
            .client
            .create_firewall(&request)
            .await
            .context("Failed to create firewall")?;

        info!(
            "Firewall created successfully: {} (ID: {})",
            created.name, created.id
        );

        Ok(Firewall {
            id: created.id,
            name: created.name,
            network_id: Some(network_id.to_string()),
            rules_count: None,
            cluster_count: None,
        })
    }

    /// Delete firewall by name, waiting while clusters still use it
    pub async fn delete_firewall(&self, name: &str, region: &str) -> Result<()> {
        let Some(firewall) = self.find_firewall(name, region).await? else {
            info!("Firewall not found, nothing to delete");
            return Ok(());
        };

        info!("Deleting firewall: {} (ID: {})", firewall.name, firewall.id);

        for attempt in 1..=DELETE_ATTEMPTS {
            match self.client.delete_firewall(&firewall.id, region).await {
                Ok(()) => {
                    info!("Firewall deleted successfully");
                    return Ok(());
                }
                Err(e) if is_in_use(&e) && attempt < DELETE_ATTEMPTS => {
                    info!(
                        "Firewall still in use, waiting for cluster removal (attempt {}/{})...",
                        attempt, DELETE_ATTEMPTS
                    );
                    sleep(Duration::from_secs(10)).await;
                }
                Err(e) => return Err(e).context("Failed to delete firewall"),
            }
        }

        Ok(())
    }
}

fn is_in_use(err: &anyhow::Error) -> bool {
    let msg = format!("{:#}", err);
    msg.contains("in_use") || msg.contains("still in use") || msg.contains("has_dependents")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_use_detection() {
        assert!(is_in_use(&anyhow::anyhow!(
            "API error: database_firewall_in_use - firewall is attached"
        )));
        assert!(!is_in_use(&anyhow::anyhow!("API error: authentication_invalid_key")));
    }

    #[tokio::test]
    #[ignore] // Requires API token
    async fn test_firewall_manager() {
        let token = std::env::var("CIVO_TOKEN").expect("CIVO_TOKEN not set");
        let client = CivoClient::new(&token, super::super::client::CIVO_API_BASE).unwrap();
        let manager = FirewallManager::new(client);

        let missing = manager
            .find_firewall("civo-opencost-does-not-exist", "LON1")
            .await
            .unwrap();
        assert!(missing.is_none());
    }
}
