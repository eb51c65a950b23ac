//! Built-in install steps
//!
//! Config steps regenerate their artifacts from the loaded cluster config and
//! can be re-run over an existing cluster directory. Executor steps drive one
//! named infrastructure step through an [`InfraExecutor`].

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, instrument};

use crate::assets::{ensure_tls_assets, ignition, Renderer, TerraformVariables};
use crate::engine::error::InstallError;
use crate::engine::step::Step;
use crate::infra::{find_step_templates, InfraExecutor};
use crate::workflow::cluster_config::{ClusterConfig, MASTER_POOL, WORKER_POOL};
use crate::workflow::cluster_metadata::ClusterMetadata;
use crate::workflow::layout::{
    ignition_file, AUTH_DIR, CLUSTER_CONFIG_MANIFEST, INSTALL_CONFIG_FILE, KUBECONFIG_FILE,
    MANIFESTS_DIR, TFVARS_FILE, TLS_DIR,
};
use crate::workflow::validation::validate_cluster_config;
use crate::workflow::Metadata;

fn write_file(path: &Path, contents: &str) -> Result<(), InstallError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| InstallError::io(format!("failed to create {}", parent.display()), e))?;
    }
    fs::write(path, contents).map_err(|e| InstallError::write(path, e))
}

fn require_platform(config: &ClusterConfig) -> Result<&'static str, InstallError> {
    match config.platform_name() {
        "" => Err(InstallError::Config("no platform configured".to_string())),
        name => Ok(name),
    }
}

// ============================================================================
// Config steps
// ============================================================================

/// Load and validate `install-config.yaml`, resolving the cluster id
pub struct ReadClusterConfigStep;

impl ReadClusterConfigStep {
    /// Config value first, then the id already persisted in
    /// `metadata.json`, then a fresh one
    fn resolve_cluster_id(cluster_dir: &Path, config: &ClusterConfig) -> Result<String, InstallError> {
        if let Some(id) = &config.cluster_id {
            return Ok(id.clone());
        }

        match ClusterMetadata::load(cluster_dir) {
            Ok(existing) if !existing.cluster_id.is_empty() => {
                debug!(cluster_id = %existing.cluster_id, "Reusing persisted cluster id");
                Ok(existing.cluster_id)
            }
            Ok(_) => Ok(uuid::Uuid::new_v4().to_string()),
            Err(e) if e.is_not_found() => Ok(uuid::Uuid::new_v4().to_string()),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl Step for ReadClusterConfigStep {
    fn name(&self) -> &str {
        "read-cluster-config"
    }

    async fn run(&self, metadata: &mut Metadata) -> Result<(), InstallError> {
        let mut config = ClusterConfig::load(metadata.path(INSTALL_CONFIG_FILE))?;
        validate_cluster_config(&config)?;

        let cluster_id = Self::resolve_cluster_id(metadata.cluster_dir(), &config)?;
        config.cluster_id = Some(cluster_id);

        info!(
            cluster = %config.name,
            platform = config.platform_name(),
            "Loaded cluster config"
        );
        metadata.set_cluster(config)
    }
}

/// Write `terraform.tfvars`
pub struct GenerateTerraformVariablesStep;

#[async_trait]
impl Step for GenerateTerraformVariablesStep {
    fn name(&self) -> &str {
        "generate-terraform-variables"
    }

    async fn run(&self, metadata: &mut Metadata) -> Result<(), InstallError> {
        let vars = TerraformVariables::from_config(metadata.cluster()?)?;
        write_file(&metadata.path(TFVARS_FILE), &vars.to_json()?)
    }
}

/// Generate the cluster PKI under `tls/`
pub struct GenerateTlsConfigStep;

#[async_trait]
impl Step for GenerateTlsConfigStep {
    fn name(&self) -> &str {
        "generate-tls-config"
    }

    async fn run(&self, metadata: &mut Metadata) -> Result<(), InstallError> {
        let tls_dir = metadata.path(TLS_DIR);
        ensure_tls_assets(&tls_dir, metadata.cluster()?)?;
        metadata.tls_dir = Some(tls_dir);
        Ok(())
    }
}

/// Render the manifests handed to the bootstrap machine
pub struct GenerateClusterConfigMapsStep;

#[async_trait]
impl Step for GenerateClusterConfigMapsStep {
    fn name(&self) -> &str {
        "generate-cluster-config-maps"
    }

    async fn run(&self, metadata: &mut Metadata) -> Result<(), InstallError> {
        let manifests_dir = metadata.path(MANIFESTS_DIR);
        let rendered = Renderer::new()?.cluster_config(metadata.cluster()?)?;
        write_file(&manifests_dir.join(CLUSTER_CONFIG_MANIFEST), &rendered)?;
        metadata.manifests_dir = Some(manifests_dir);
        Ok(())
    }
}

/// Write the ignition config of every role and the admin kubeconfig
pub struct GenerateIgnitionConfigStep;

#[async_trait]
impl Step for GenerateIgnitionConfigStep {
    fn name(&self) -> &str {
        "generate-ignition-configs"
    }

    async fn run(&self, metadata: &mut Metadata) -> Result<(), InstallError> {
        let tls_dir = metadata
            .tls_dir
            .clone()
            .ok_or_else(|| InstallError::Config("TLS assets have not been generated".to_string()))?;
        let manifests_dir = metadata
            .manifests_dir
            .clone()
            .ok_or_else(|| InstallError::Config("manifests have not been rendered".to_string()))?;

        let config = metadata.cluster()?.clone();
        let tls = ensure_tls_assets(&tls_dir, &config)?;

        let manifest_path = manifests_dir.join(CLUSTER_CONFIG_MANIFEST);
        let manifest = fs::read_to_string(&manifest_path).map_err(|e| {
            InstallError::io(format!("failed to read {}", manifest_path.display()), e)
        })?;

        let kubeconfig = Renderer::new()?.kubeconfig(&config, &tls)?;
        let kubeconfig_path = metadata.path(AUTH_DIR).join(KUBECONFIG_FILE);
        write_file(&kubeconfig_path, &kubeconfig)?;

        let configs = [
            (
                "bootstrap",
                ignition::bootstrap(&config, &tls, &manifest, &kubeconfig),
            ),
            (MASTER_POOL, ignition::pointer(&config, MASTER_POOL, &tls)),
            (WORKER_POOL, ignition::pointer(&config, WORKER_POOL, &tls)),
        ];

        for (role, ign) in configs {
            let path: PathBuf = metadata.path(&ignition_file(role));
            write_file(&path, &ign.to_json()?)?;
            metadata.ignition_files.insert(role.to_string(), path);
        }
        metadata.kubeconfig = Some(kubeconfig_path);
        Ok(())
    }
}

/// Persist `metadata.json` for the destroy commands
pub struct WriteClusterMetadataStep;

#[async_trait]
impl Step for WriteClusterMetadataStep {
    fn name(&self) -> &str {
        "write-cluster-metadata"
    }

    async fn run(&self, metadata: &mut Metadata) -> Result<(), InstallError> {
        let config = metadata.cluster()?;
        let cluster_id = config
            .cluster_id
            .as_deref()
            .ok_or_else(|| InstallError::Config("cluster id has not been assigned".to_string()))?;

        ClusterMetadata::from_config(config, cluster_id).save(metadata.cluster_dir())?;
        Ok(())
    }
}

// ============================================================================
// Executor steps
// ============================================================================

/// Apply one infrastructure step
pub struct InstallStep {
    name: String,
    step: String,
    skip_if_applied: bool,
    executor: Arc<dyn InfraExecutor>,
}

impl InstallStep {
    pub fn new(step: &str, executor: Arc<dyn InfraExecutor>) -> Self {
        Self {
            name: format!("install-{}", step),
            step: step.to_string(),
            skip_if_applied: false,
            executor,
        }
    }

    /// Skip the apply when the step already has a state file
    pub fn skip_if_applied(mut self) -> Self {
        self.skip_if_applied = true;
        self
    }
}

#[async_trait]
impl Step for InstallStep {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(skip_all, fields(step = %self.step))]
    async fn run(&self, metadata: &mut Metadata) -> Result<(), InstallError> {
        let work_dir = metadata.cluster_dir().to_path_buf();

        if self.skip_if_applied && self.executor.has_state_file(&work_dir, &self.step) {
            info!("State file already exists, skipping apply");
            return Ok(());
        }

        let platform = require_platform(metadata.cluster()?)?;
        let templates = find_step_templates(metadata.templates_dir(), &self.step, platform)
            .map_err(|e| InstallError::executor("Terraform init", e))?;

        self.executor
            .init(&work_dir, &templates)
            .await
            .map_err(|e| InstallError::executor("Terraform init", e))?;
        self.executor
            .apply(&work_dir, &self.step, &templates, &[])
            .await
            .map_err(|e| InstallError::executor("Terraform apply", e))?;

        info!("Applied");
        Ok(())
    }
}

/// Destroy one infrastructure step; nothing to do without a state file
pub struct DestroyStep {
    name: String,
    step: String,
    executor: Arc<dyn InfraExecutor>,
}

impl DestroyStep {
    pub fn new(step: &str, executor: Arc<dyn InfraExecutor>) -> Self {
        Self {
            name: format!("destroy-{}", step),
            step: step.to_string(),
            executor,
        }
    }
}

#[async_trait]
impl Step for DestroyStep {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(skip_all, fields(step = %self.step))]
    async fn run(&self, metadata: &mut Metadata) -> Result<(), InstallError> {
        let work_dir = metadata.cluster_dir().to_path_buf();

        if !self.executor.has_state_file(&work_dir, &self.step) {
            info!("No state file, nothing to destroy");
            return Ok(());
        }

        let platform = require_platform(metadata.cluster()?)?;
        let templates = find_step_templates(metadata.templates_dir(), &self.step, platform)
            .map_err(|e| InstallError::executor("Terraform init", e))?;

        self.executor
            .init(&work_dir, &templates)
            .await
            .map_err(|e| InstallError::executor("Terraform init", e))?;
        self.executor
            .destroy(&work_dir, &self.step, &templates, &[])
            .await
            .map_err(|e| InstallError::executor("Terraform destroy", e))?;

        info!("Destroyed");
        Ok(())
    }
}
