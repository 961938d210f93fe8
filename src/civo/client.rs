/// Civo API client
use anyhow::{Context, Result};
use reqwest::{header, Client};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;
use url::Url;

use super::models::*;

pub const CIVO_API_BASE: &str = "https://api.civo.com/v2";

/// Main Civo API client
#[derive(Clone, Debug)]
pub struct CivoClient {
    client: Client,
    base_url: Url,
}

impl CivoClient {
    /// Create a new Civo API client
    pub fn new(api_token: &str, base_url: &str) -> Result<Self> {
        let mut auth = header::HeaderValue::from_str(&format!("bearer {}", api_token))
            .context("Invalid API token format")?;
        auth.set_sensitive(true);

        let mut headers = header::HeaderMap::new();
        headers.insert(header::AUTHORIZATION, auth);
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/json"),
        );

        let client = Client::builder()
            .default_headers(headers)
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        let base_url = Url::parse(base_url.trim_end_matches('/'))
            .with_context(|| format!("Invalid Civo API URL: {}", base_url))?;

        Ok(Self { client, base_url })
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.base_url.as_str().trim_end_matches('/'), endpoint)
    }

    /// Make a GET request scoped to a region
    pub(crate) async fn get<T: DeserializeOwned>(&self, endpoint: &str, region: &str) -> Result<T> {
        let url = self.url(endpoint);
        debug!("GET {} (region {})", url, region);

        let response = self
            .client
            .get(&url)
            .query(&[("region", region)])
            .send()
            .await
            .context("Failed to send GET request")?;

        self.handle_response(response).await
    }

    /// Make a POST request with a JSON body
    pub(crate) async fn post<T: Serialize, R: DeserializeOwned>(
        &self,
        endpoint: &str,
        body: &T,
    ) -> Result<R> {
        let url = self.url(endpoint);
        debug!("POST {}", url);

        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .context("Failed to send POST request")?;

        self.handle_response(response).await
    }

    /// Make a DELETE request scoped to a region
    pub(crate) async fn delete(&self, endpoint: &str, region: &str) -> Result<()> {
        let url = self.url(endpoint);
        debug!("DELETE {} (region {})", url, region);

        let response = self
            .client
            .delete(&url)
            .query(&[("region", region)])
            .send()
            .await
            .context("Failed to send DELETE request")?;

        let _: SimpleResponse = self.handle_response(response).await?;
        Ok(())
    }

    /// Handle API response, checking for errors
    async fn handle_response<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T> {
        let status = response.status();

        if status.is_success() {
            return response
                .json::<T>()
                .await
                .context("Failed to parse API response");
        }

        let error_text = response.text().await.unwrap_or_default();
        anyhow::bail!("{}", describe_error(status, &error_text))
    }

    /// List networks in a region
    pub async fn list_networks(&self, region: &str) -> Result<Vec<Network>> {
        self.get("networks", region).await
    }

    /// Create a private network
    pub async fn create_network(&self, label: &str, region: &str) -> Result<CreateNetworkResponse> {
        #[derive(Serialize)]
        struct Request<'a> {
            label: &'a str,
            region: &'a str,
        }

        self.post("networks", &Request { label, region }).await
    }

    /// Delete a network
    pub async fn delete_network(&self, network_id: &str, region: &str) -> Result<()> {
        self.delete(&format!("networks/{}", network_id), region)
            .await
    }

    /// List firewalls in a region
    pub async fn list_firewalls(&self, region: &str) -> Result<Vec<Firewall>> {
        self.get("firewalls", region).await
    }

    /// Create a firewall attached to a network
    pub async fn create_firewall(
        &self,
        request: &CreateFirewallRequest,
    ) -> Result<CreateFirewallResponse> {
        self.post("firewalls", request).await
    }

    /// Delete a firewall
    pub async fn delete_firewall(&self, firewall_id: &str, region: &str) -> Result<()> {
        self.delete(&format!("firewalls/{}", firewall_id), region)
            .await
    }

    /// List Kubernetes clusters in a region
    pub async fn list_clusters(&self, region: &str) -> Result<Vec<KubernetesCluster>> {
        let response: KubernetesClusterList = self.get("kubernetes/clusters", region).await?;
        Ok(response.items)
    }

    /// Get cluster by ID
    pub async fn get_cluster(&self, cluster_id: &str, region: &str) -> Result<KubernetesCluster> {
        self.get(&format!("kubernetes/clusters/{}", cluster_id), region)
            .await
    }

    /// Create a Kubernetes cluster
    pub async fn create_cluster(
        &self,
        request: &CreateClusterRequest,
    ) -> Result<KubernetesCluster> {
        self.post("kubernetes/clusters", request).await
    }

    /// Delete a Kubernetes cluster
    pub async fn delete_cluster(&self, cluster_id: &str, region: &str) -> Result<()> {
        self.delete(&format!("kubernetes/clusters/{}", cluster_id), region)
            .await
    }
}

/// Turn a failed response body into a readable message
fn describe_error(status: reqwest::StatusCode, body: &str) -> String {
    match serde_json::from_str::<ErrorResponse>(body) {
        Ok(error) => match error.reason {
            Some(reason) => format!("API error: {} - {}", error.code, reason),
            None => format!("API error: {}", error.code),
        },
        Err(_) => format!("API request failed with status {}: {}", status, body),
    }
}

/// Request structure for creating a firewall
#[derive(Debug, Serialize)]
pub struct CreateFirewallRequest {
    pub name: String,
    pub region: String,
    pub network_id: String,
    pub create_rules: bool,
}

/// Request structure for creating a Kubernetes cluster
#[derive(Debug, Serialize)]
pub struct CreateClusterRequest {
    pub name: String,
    pub region: String,
    pub network_id: String,
    pub firewall_id: String,
    pub kubernetes_version: String,
    pub pools: Vec<PoolRequest>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub applications: String,
}

/// Request structure for one node pool
#[derive(Debug, Serialize)]
pub struct PoolRequest {
    pub id: String,
    pub count: u32,
    pub size: String,
}
