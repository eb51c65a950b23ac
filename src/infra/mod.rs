//! Infrastructure executor boundary
//!
//! The installer never creates cloud resources itself. It drives an
//! external infrastructure-as-code executor through four operations:
//! - `init`: prepare a working directory for a step's templates
//! - `apply`: create or converge the resources of a named step
//! - `destroy`: tear down resources, optionally scoped by target flags
//! - `has_state_file`: check whether a step already has recorded state
//!
//! `terraform` holds the implementation that shells out to the Terraform
//! binary. Tests substitute their own implementation of [`InfraExecutor`].

use async_trait::async_trait;
use std::path::{Path, PathBuf};

pub mod terraform;

pub use terraform::TerraformExecutor;

/// Errors reported by an executor
#[derive(Debug, thiserror::Error)]
pub enum ExecutorError {
    #[error("executor binary not found: {0}")]
    BinaryNotFound(String),

    #[error("templates not found at {0}")]
    MissingTemplates(PathBuf),

    #[error("failed to run {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{verb} exited with code {code}: {stderr}")]
    CommandFailed {
        verb: String,
        code: i32,
        stderr: String,
    },
}

/// Captured output of an executor invocation
#[derive(Debug, Clone, Default)]
pub struct ExecutorOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Operations the install pipeline needs from the infrastructure executor.
///
/// Every call is awaited to completion before the next one is issued.
#[async_trait]
pub trait InfraExecutor: Send + Sync {
    /// Prepare `work_dir` for the templates in `template_dir`
    async fn init(&self, work_dir: &Path, template_dir: &Path) -> Result<(), ExecutorError>;

    /// Apply the named step. `extra_args` are passed through verbatim
    /// (e.g. `-var-file=<path>`).
    async fn apply(
        &self,
        work_dir: &Path,
        step: &str,
        template_dir: &Path,
        extra_args: &[String],
    ) -> Result<ExecutorOutput, ExecutorError>;

    /// Destroy the resources of the named step, scoped by `extra_args`
    /// (e.g. `-target=module.bootstrap`)
    async fn destroy(
        &self,
        work_dir: &Path,
        step: &str,
        template_dir: &Path,
        extra_args: &[String],
    ) -> Result<ExecutorOutput, ExecutorError>;

    /// Whether `work_dir` already holds state for the named step
    fn has_state_file(&self, work_dir: &Path, step: &str) -> bool {
        work_dir.join(state_file_name(step)).exists()
    }
}

/// State file name of a step
pub fn state_file_name(step: &str) -> String {
    format!("{}.tfstate", step)
}

/// Resolve the template directory of a step for a platform:
/// `<base>/<step>/<platform>`
pub fn find_step_templates(base: &Path, step: &str, platform: &str) -> Result<PathBuf, ExecutorError> {
    let dir = base.join(step).join(platform);
    if dir.is_dir() {
        Ok(dir)
    } else {
        Err(ExecutorError::MissingTemplates(dir))
    }
}
