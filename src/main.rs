/// civo-opencost - Civo Kubernetes with OpenCost
///
/// Provisions a Civo Kubernetes cluster behind its own network and firewall,
/// installs the OpenCost cost-analyzer chart and publishes the kubeconfig.
mod civo;
mod component;
mod config;
mod error;
mod helm;
mod k8s;
mod program;
mod provider;
mod resources;
mod stack;
mod utils;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::civo::{CivoClient, CivoCloud, ClusterManager, FirewallManager, NetworkManager};
use crate::config::StackConfig;
use crate::helm::{HelmProvider, OPENCOST_NAMESPACE, OPENCOST_RELEASE};
use crate::k8s::KubeClient;
use crate::provider::KubernetesProvider;
use crate::stack::{ResourceKind, Stack, StackOutputs};

#[derive(Parser)]
#[command(name = "civo-opencost")]
#[command(about = "Deploy a Civo Kubernetes cluster with OpenCost", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, default_value = "stack.yaml")]
    config: PathBuf,

    /// Output directory for kubeconfigs and stack outputs
    #[arg(short, long, default_value = "./output")]
    output: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or update the stack
    Up,

    /// Show the resources the stack declares without creating anything
    Preview,

    /// Destroy the stack's resources
    Destroy,

    /// Show stack status
    Status,

    /// Generate example configuration file
    Init,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize tracing
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("civo_opencost={}", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let result = match cli.command {
        Commands::Up => up(&cli).await,
        Commands::Preview => preview(&cli).await,
        Commands::Destroy => destroy(&cli).await,
        Commands::Status => show_status(&cli).await,
        Commands::Init => init_config(&cli).await,
    };

    if let Err(e) = result {
        error!("Error: {:#}", e);
        std::process::exit(1);
    }
}

/// Declare the stack against the live Civo and Helm providers
fn declare_stack(cli: &Cli, config: &StackConfig, token: &str) -> Result<Stack> {
    let client = CivoClient::new(token, &config.civo.api_url)?;
    let cloud = Arc::new(CivoCloud::new(client, config.cluster.ready_timeout_secs));
    let kube = Arc::new(HelmProvider::new(cli.output.clone()));

    let stack = Stack::new(&config.stack_name);
    program::declare(&stack, config, cloud, kube)?;
    Ok(stack)
}

/// Create or update the stack
async fn up(cli: &Cli) -> Result<()> {
    info!("Starting stack deployment...");

    HelmProvider::check_helm_installed()
        .await
        .context("helm is required")?;

    let config = StackConfig::from_file(&cli.config).context("Failed to load configuration")?;
    let token = config.get_civo_token()?;

    info!("Stack: {} (region {})", config.stack_name, config.civo.region);

    let stack = declare_stack(cli, &config, &token)?;
    let outputs = stack.apply().await?;

    write_outputs(&cli.output, stack.name(), &outputs).await?;

    info!("✓ Stack deployed successfully!");
    info!("");
    info!("Outputs:");
    for name in outputs.values.keys() {
        if let Some(value) = outputs.display_value(name) {
            info!("  {}: {}", name, value);
        }
    }
    info!("");
    info!("To access your cluster:");
    info!(
        "  export KUBECONFIG={}",
        cli.output.join(program::KUBECONFIG_EXPORT).display()
    );
    info!("  kubectl -n {} get pods", OPENCOST_NAMESPACE);

    Ok(())
}

const OUTPUTS_FILE: &str = "outputs.json";

/// Persist stack outputs under the output directory
async fn write_outputs(dir: &Path, stack_name: &str, outputs: &StackOutputs) -> Result<()> {
    tokio::fs::create_dir_all(dir)
        .await
        .context("Failed to create output directory")?;

    if let Some(kubeconfig) = outputs.get(program::KUBECONFIG_EXPORT) {
        tokio::fs::write(dir.join(program::KUBECONFIG_EXPORT), kubeconfig)
            .await
            .context("Failed to write kubeconfig")?;
    }

    let document = serde_json::json!({
        "stack": stack_name,
        "updated_at": chrono::Utc::now(),
        "outputs": outputs.values,
    });
    tokio::fs::write(
        dir.join(OUTPUTS_FILE),
        serde_json::to_string_pretty(&document)?,
    )
    .await
    .context("Failed to write outputs.json")?;

    Ok(())
}

/// Remove the files `write_outputs` produced
async fn remove_outputs(dir: &Path) -> Result<()> {
    for name in [program::KUBECONFIG_EXPORT, OUTPUTS_FILE] {
        remove_if_exists(&dir.join(name)).await?;
    }
    Ok(())
}

async fn remove_if_exists(path: &Path) -> Result<()> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {
            info!("Removed {}", path.display());
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).with_context(|| format!("Failed to remove {}", path.display())),
    }
}

/// Show what the stack declares, in creation and teardown order
async fn preview(cli: &Cli) -> Result<()> {
    let config = StackConfig::from_file(&cli.config).context("Failed to load configuration")?;

    // Declaring is lazy, so no API call is made and a token is optional
    let token = config.get_civo_token().unwrap_or_default();
    let stack = declare_stack(cli, &config, &token)?;

    info!("Stack: {}", stack.name());
    info!("");
    info!("Creation order:");
    for record in stack.creation_order() {
        let after: Vec<&str> = record.dependencies.iter().map(|d| d.name()).collect();
        match (&record.parent, after.is_empty()) {
            (Some(parent), _) => info!(
                "  + {} {} (in {}, after: {})",
                record.kind,
                record.urn.name(),
                parent.name(),
                after.join(", ")
            ),
            (None, true) => info!("  + {} {}", record.kind, record.urn.name()),
            (None, false) => info!(
                "  + {} {} (after: {})",
                record.kind,
                record.urn.name(),
                after.join(", ")
            ),
        }
    }
    info!("");
    info!("Teardown order:");
    for record in stack.teardown_order() {
        info!("  - {} {}", record.kind, record.urn.name());
    }

    Ok(())
}

/// Destroy the stack's resources, dependents first
async fn destroy(cli: &Cli) -> Result<()> {
    info!("Starting stack destruction...");

    let config = StackConfig::from_file(&cli.config).context("Failed to load configuration")?;
    let token = config.get_civo_token()?;
    let region = config.civo.region.as_str();

    let client = CivoClient::new(&token, &config.civo.api_url)?;
    let clusters = ClusterManager::new(client.clone());
    let firewalls = FirewallManager::new(client.clone());
    let networks = NetworkManager::new(client);
    let helm = HelmProvider::new(cli.output.clone());

    let stack = declare_stack(cli, &config, &token)?;

    for record in stack.teardown_order() {
        match record.kind {
            ResourceKind::HelmRelease => {
                match connect_existing(&clusters, &helm, &config).await {
                    Ok(Some(kube)) => {
                        if let Err(e) = helm
                            .uninstall(&kube, OPENCOST_RELEASE, OPENCOST_NAMESPACE)
                            .await
                        {
                            warn!("Could not uninstall release, continuing: {:#}", e);
                        }
                    }
                    Ok(None) => info!("Cluster not reachable, skipping release uninstall"),
                    Err(e) => warn!("Could not connect to cluster, continuing: {:#}", e),
                }
                remove_if_exists(&helm.values_file(&config.cluster.name, OPENCOST_RELEASE))
                    .await?;
            }
            ResourceKind::KubernetesProvider => {
                remove_if_exists(&KubeClient::kubeconfig_file(
                    &cli.output,
                    &config.cluster.name,
                ))
                .await?;
            }
            ResourceKind::KubernetesCluster => {
                clusters.delete_cluster(&config.cluster.name, region).await?;
            }
            ResourceKind::Firewall => {
                firewalls.delete_firewall(&config.firewall.name, region).await?;
            }
            ResourceKind::Network => {
                networks.delete_network(&config.network.label, region).await?;
            }
            ResourceKind::Component(_) => {}
        }
    }

    remove_outputs(&cli.output).await?;

    info!("✓ Stack destroyed successfully");

    Ok(())
}

/// Client for the configured cluster if it exists and has credentials
async fn connect_existing(
    clusters: &ClusterManager,
    helm: &HelmProvider,
    config: &StackConfig,
) -> Result<Option<KubeClient>> {
    let Some(cluster) = clusters
        .find_cluster(&config.cluster.name, &config.civo.region)
        .await?
    else {
        return Ok(None);
    };

    match clusters.kubeconfig(&cluster.id, &config.civo.region).await? {
        Some(kubeconfig) => Ok(Some(helm.connect(&cluster.name, &kubeconfig).await?)),
        None => Ok(None),
    }
}

/// Show stack status
async fn show_status(cli: &Cli) -> Result<()> {
    let config = StackConfig::from_file(&cli.config).context("Failed to load configuration")?;
    let token = config.get_civo_token()?;
    let region = config.civo.region.as_str();

    let client = CivoClient::new(&token, &config.civo.api_url)?;
    let networks = NetworkManager::new(client.clone());
    let firewalls = FirewallManager::new(client.clone());
    let clusters = ClusterManager::new(client);

    info!("Stack: {} (region {})", config.stack_name, region);
    info!("");

    match networks.find_network(&config.network.label, region).await? {
        Some(n) => info!("Network:  {} (ID: {})", n.label, n.id),
        None => info!("Network:  {} (not created)", config.network.label),
    }

    match firewalls.find_firewall(&config.firewall.name, region).await? {
        Some(f) => info!("Firewall: {} (ID: {})", f.name, f.id),
        None => info!("Firewall: {} (not created)", config.firewall.name),
    }

    let Some(cluster) = clusters.find_cluster(&config.cluster.name, region).await? else {
        info!("Cluster:  {} (not created)", config.cluster.name);
        return Ok(());
    };

    info!(
        "Cluster:  {} (ID: {}, Status: {}, Version: {})",
        cluster.name,
        cluster.id,
        cluster.status,
        cluster.version.as_deref().unwrap_or("N/A")
    );
    for pool in &cluster.pools {
        info!("  Pool {}: {} x {}", pool.id, pool.count, pool.size);
    }

    if !cluster.is_active() {
        return Ok(());
    }

    if let Err(e) = KubeClient::check_kubectl_installed().await {
        info!("  Skipping API server check: {:#}", e);
        return Ok(());
    }

    let helm = HelmProvider::new(cli.output.clone());
    match connect_existing(&clusters, &helm, &config).await {
        Ok(Some(kube)) => {
            info!("  Kubeconfig: {}", kube.kubeconfig_path().display());
            match kube.server_version().await {
                Ok(version) => info!("  API server: {} ({})", kube.server(), version),
                Err(e) => info!("  Could not reach API server: {}", e),
            }
        }
        Ok(None) => info!("  No kubeconfig available yet"),
        Err(e) => info!("  Could not load kubeconfig: {}", e),
    }

    Ok(())
}

/// Initialize example configuration file
async fn init_config(cli: &Cli) -> Result<()> {
    if cli.config.exists() {
        anyhow::bail!(
            "Configuration file already exists: {}",
            cli.config.display()
        );
    }

    let example_config = StackConfig::example();
    let yaml = serde_yaml::to_string(&example_config)?;

    tokio::fs::write(&cli.config, yaml)
        .await
        .context("Failed to write configuration file")?;

    info!("Example configuration created: {}", cli.config.display());
    info!("");
    info!("Next steps:");
    info!("  1. Edit the configuration file to match your requirements");
    info!("  2. Set your Civo API key:");
    info!("     export CIVO_TOKEN=your-token-here");
    info!("  3. Preview and create the stack:");
    info!("     civo-opencost preview");
    info!("     civo-opencost up");

    Ok(())
}
