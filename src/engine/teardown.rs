//! Bootstrap teardown
//!
//! Removes the bootstrap machine and its resources once the control plane
//! is up, leaving every other resource of the cluster in place. The work
//! happens on a copy of the bootstrap state inside a temporary workspace;
//! the canonical `bootstrap.tfstate` is only ever replaced by a rename
//! after the destroy has succeeded.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use tracing::{debug, info, instrument};

use crate::engine::error::InstallError;
use crate::infra::{find_step_templates, state_file_name, InfraExecutor};
use crate::workflow::cluster_metadata::ClusterMetadata;
use crate::workflow::layout::{
    BOOTSTRAP_MODULE, BOOTSTRAP_OVERRIDE_FILE, BOOTSTRAP_STEP, TFVARS_FILE,
};

/// Time the load balancer gets to drop the bootstrap targets before the
/// bootstrap resources are destroyed
pub const BOOTSTRAP_SETTLE_DELAY: Duration = Duration::from_secs(10);

const OVERRIDE_CONTENTS: &str = "{\n  \"bootstrap_load_balancer_targets\": false\n}\n";

pub struct BootstrapTeardown {
    executor: Arc<dyn InfraExecutor>,
    templates_dir: PathBuf,
    settle_delay: Duration,
    temp_root: Option<PathBuf>,
}

impl BootstrapTeardown {
    pub fn new(executor: Arc<dyn InfraExecutor>, templates_dir: impl Into<PathBuf>) -> Self {
        Self {
            executor,
            templates_dir: templates_dir.into(),
            settle_delay: BOOTSTRAP_SETTLE_DELAY,
            temp_root: None,
        }
    }

    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    /// Create temporary workspaces under `root` instead of the system temp dir
    pub fn with_temp_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.temp_root = Some(root.into());
        self
    }

    fn workspace(&self) -> Result<TempDir, InstallError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("cluster-installer-");
        let created = match &self.temp_root {
            Some(root) => builder.tempdir_in(root),
            None => builder.tempdir(),
        };
        created.map_err(|e| InstallError::io("failed to create a temporary directory", e))
    }

    /// Destroy the bootstrap resources of the cluster in `cluster_dir`
    #[instrument(skip(self), fields(cluster_dir = %cluster_dir.display()))]
    pub async fn destroy(&self, cluster_dir: &Path) -> Result<(), InstallError> {
        let metadata = ClusterMetadata::load(cluster_dir)?;
        let platform = metadata.platform();
        if platform.is_empty() {
            return Err(InstallError::Config(
                "no platform configured in metadata".to_string(),
            ));
        }

        let override_path = cluster_dir.join(BOOTSTRAP_OVERRIDE_FILE);
        fs::write(&override_path, OVERRIDE_CONTENTS)
            .map_err(|e| InstallError::write(&override_path, e))?;

        // Removed when dropped, on every return path below
        let workspace = self.workspace()?;
        let work_dir = workspace.path();
        debug!(work_dir = %work_dir.display(), "Created temporary workspace");

        let state_file = state_file_name(BOOTSTRAP_STEP);
        for name in [state_file.as_str(), TFVARS_FILE, BOOTSTRAP_OVERRIDE_FILE] {
            fs::copy(cluster_dir.join(name), work_dir.join(name)).map_err(|e| {
                InstallError::io(
                    format!("failed to copy {} to the temporary directory", name),
                    e,
                )
            })?;
        }

        let templates = find_step_templates(&self.templates_dir, BOOTSTRAP_STEP, platform)
            .map_err(|e| InstallError::executor("Terraform init", e))?;
        self.executor
            .init(work_dir, &templates)
            .await
            .map_err(|e| InstallError::executor("Terraform init", e))?;

        info!(platform, "Removing bootstrap from load balancer targets");
        let var_file = format!(
            "-var-file={}",
            work_dir.join(BOOTSTRAP_OVERRIDE_FILE).display()
        );
        self.executor
            .apply(work_dir, BOOTSTRAP_STEP, &templates, &[var_file])
            .await
            .map_err(|e| InstallError::executor("Terraform apply", e))?;

        // The target group must stop referencing bootstrap before it is destroyed
        debug!(delay = ?self.settle_delay, "Waiting for load balancer changes to settle");
        tokio::time::sleep(self.settle_delay).await;

        info!("Destroying bootstrap resources");
        let target = format!("-target={}", BOOTSTRAP_MODULE);
        self.executor
            .destroy(work_dir, BOOTSTRAP_STEP, &templates, &[target])
            .await
            .map_err(|e| InstallError::executor("Terraform destroy", e))?;

        replace_state(&work_dir.join(&state_file), &cluster_dir.join(&state_file))?;

        info!("Bootstrap destroyed");
        Ok(())
    }
}

/// Stage `source` next to `canonical` as `<name>.new`, then rename it over
/// `canonical`. The staged copy is removed if the rename fails.
fn replace_state(source: &Path, canonical: &Path) -> Result<(), InstallError> {
    let mut staged = canonical.as_os_str().to_owned();
    staged.push(".new");
    let staged = PathBuf::from(staged);

    fs::copy(source, &staged).map_err(|e| {
        InstallError::io(
            format!("failed to copy {} from the temporary directory", source.display()),
            e,
        )
    })?;
    if let Err(e) = fs::rename(&staged, canonical) {
        let _ = fs::remove_file(&staged);
        return Err(InstallError::io(
            format!("failed to replace {}", canonical.display()),
            e,
        ));
    }
    Ok(())
}
