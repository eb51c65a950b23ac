use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use cluster_installer::prelude::*;
use cluster_installer::workflow::layout::INSTALL_CONFIG_FILE;
use cluster_installer::workflow::validate_cluster_config;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "cluster-installer")]
#[command(about = "Install and tear down clusters", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Cluster directory holding install-config.yaml and generated assets
    #[arg(short, long, global = true, default_value = ".")]
    dir: PathBuf,

    /// Installer config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Create cluster resources
    Create {
        #[command(subcommand)]
        target: CreateTarget,
    },

    /// Destroy cluster resources
    Destroy {
        #[command(subcommand)]
        target: DestroyTarget,
    },

    /// Wait for an install milestone
    WaitFor {
        #[command(subcommand)]
        target: WaitTarget,

        /// Install status service URL (overrides config)
        #[arg(long, global = true)]
        api_url: Option<String>,
    },

    /// Validate install-config.yaml without creating anything
    Validate,
}

#[derive(Subcommand)]
enum CreateTarget {
    /// Generate install assets and create the cluster infrastructure
    Cluster,
}

#[derive(Subcommand)]
enum DestroyTarget {
    /// Destroy the bootstrap resources once the control plane is up
    Bootstrap,
    /// Destroy every resource of the cluster
    Cluster,
}

#[derive(Subcommand)]
enum WaitTarget {
    /// Wait until the cluster manifests are validated
    ClusterValidated,
    /// Wait until the control plane has taken over from bootstrap
    BootstrapComplete,
    /// Wait until the install has finished
    InstallComplete,
}

impl WaitTarget {
    fn milestone(&self) -> Milestone {
        match self {
            WaitTarget::ClusterValidated => Milestone::ClusterValidated,
            WaitTarget::BootstrapComplete => Milestone::BootstrapComplete,
            WaitTarget::InstallComplete => Milestone::InstallComplete,
        }
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        "cluster_installer=debug"
    } else {
        "cluster_installer=info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            tracing::error!(error = %format!("{:#}", e), "Command failed");
            ExitCode::from(2)
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<bool> {
    let config = InstallerConfig::resolve(cli.config.as_deref())?;
    let dir = std::path::absolute(&cli.dir)
        .with_context(|| format!("invalid cluster directory {}", cli.dir.display()))?;

    match cli.command {
        Commands::Create {
            target: CreateTarget::Cluster,
        } => create_cluster(&dir, &config).await,
        Commands::Destroy {
            target: DestroyTarget::Bootstrap,
        } => destroy_bootstrap(&dir, &config).await,
        Commands::Destroy {
            target: DestroyTarget::Cluster,
        } => destroy_cluster(&dir, &config).await,
        Commands::WaitFor { target, api_url } => {
            wait(&dir, &config, target.milestone(), api_url).await
        }
        Commands::Validate => validate(&dir),
    }
}

fn executor(config: &InstallerConfig) -> anyhow::Result<Arc<TerraformExecutor>> {
    Ok(Arc::new(TerraformExecutor::locate(
        config.terraform_binary.as_deref(),
    )?))
}

async fn create_cluster(dir: &Path, config: &InstallerConfig) -> anyhow::Result<bool> {
    let metadata = Metadata::new(dir, &config.templates_dir);
    let mut workflow = install_workflow(metadata, executor(config)?);
    workflow.run().await?;
    println!("Cluster created in {}", dir.display());
    Ok(true)
}

async fn destroy_bootstrap(dir: &Path, config: &InstallerConfig) -> anyhow::Result<bool> {
    BootstrapTeardown::new(executor(config)?, &config.templates_dir)
        .with_settle_delay(config.settle_delay())
        .destroy(dir)
        .await
        .context("failed to destroy bootstrap resources")?;
    println!("Bootstrap resources destroyed");
    Ok(true)
}

async fn destroy_cluster(dir: &Path, config: &InstallerConfig) -> anyhow::Result<bool> {
    let metadata = Metadata::new(dir, &config.templates_dir);
    let mut workflow = destroy_workflow(metadata, executor(config)?);
    workflow.run().await?;
    println!("Cluster destroyed");
    Ok(true)
}

async fn wait(
    dir: &Path,
    config: &InstallerConfig,
    milestone: Milestone,
    api_url: Option<String>,
) -> anyhow::Result<bool> {
    let api_url = api_url
        .or_else(|| config.wait.api_url.clone())
        .context("no install status API configured (set wait.api_url or pass --api-url)")?;
    let metadata = ClusterMetadata::load(dir)?;

    let source = RestStatusSource::new(&api_url, &metadata.cluster_id)?;
    wait_for(&source, milestone, &config.wait.options(milestone)).await?;
    println!("{} reached", milestone);
    Ok(true)
}

fn validate(dir: &Path) -> anyhow::Result<bool> {
    let path = dir.join(INSTALL_CONFIG_FILE);
    let cluster = ClusterConfig::load(&path)?;

    match validate_cluster_config(&cluster) {
        Ok(()) => {
            println!("✓ {} is valid", path.display());
            Ok(true)
        }
        Err(errs) => {
            for err in errs.errors() {
                println!("✗ {}", err);
            }
            Ok(false)
        }
    }
}
