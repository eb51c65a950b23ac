//! Terraform executor
//!
//! Runs the `terraform` binary with the cluster (or temporary) directory as
//! its working directory. Each step keeps its own state file,
//! `<step>.tfstate`, next to the shared `terraform.tfvars`.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info, instrument};

use super::{state_file_name, ExecutorError, ExecutorOutput, InfraExecutor};
use crate::workflow::layout::TFVARS_FILE;

const COMMON_FLAGS: [&str; 2] = ["-input=false", "-no-color"];

pub struct TerraformExecutor {
    binary: PathBuf,
}

impl TerraformExecutor {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Find the binary: an explicit name or path if given, otherwise
    /// `terraform` on `PATH`
    pub fn locate(explicit: Option<&str>) -> Result<Self, ExecutorError> {
        let name = explicit.unwrap_or("terraform");
        let binary = which::which(name)
            .map_err(|e| ExecutorError::BinaryNotFound(format!("{}: {}", name, e)))?;
        Ok(Self::new(binary))
    }

    async fn run(
        &self,
        verb: &str,
        work_dir: &Path,
        args: Vec<String>,
    ) -> Result<ExecutorOutput, ExecutorError> {
        debug!(verb, work_dir = %work_dir.display(), ?args, "Running terraform");

        let mut cmd = Command::new(&self.binary);
        cmd.args(&args)
            .current_dir(work_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let output = cmd.output().await.map_err(|e| ExecutorError::Spawn {
            command: format!("{} {}", self.binary.display(), verb),
            source: e,
        })?;

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        if output.status.success() {
            Ok(ExecutorOutput { stdout, stderr })
        } else {
            Err(ExecutorError::CommandFailed {
                verb: format!("terraform {}", verb),
                code: output.status.code().unwrap_or(-1),
                stderr: stderr.trim().to_string(),
            })
        }
    }
}

/// Arguments shared by apply and destroy
fn step_args(
    verb: &str,
    work_dir: &Path,
    step: &str,
    template_dir: &Path,
    extra_args: &[String],
) -> Vec<String> {
    let mut args = vec![verb.to_string()];
    args.extend(COMMON_FLAGS.iter().map(|s| s.to_string()));
    args.push("-auto-approve".to_string());
    args.push(format!(
        "-state={}",
        work_dir.join(state_file_name(step)).display()
    ));

    let tfvars = work_dir.join(TFVARS_FILE);
    if tfvars.exists() {
        args.push(format!("-var-file={}", tfvars.display()));
    }

    args.extend(extra_args.iter().cloned());
    args.push(template_dir.display().to_string());
    args
}

#[async_trait]
impl InfraExecutor for TerraformExecutor {
    #[instrument(skip_all, fields(work_dir = %work_dir.display(), template_dir = %template_dir.display()))]
    async fn init(&self, work_dir: &Path, template_dir: &Path) -> Result<(), ExecutorError> {
        if !template_dir.is_dir() {
            return Err(ExecutorError::MissingTemplates(template_dir.to_path_buf()));
        }

        let mut args = vec!["init".to_string()];
        args.extend(COMMON_FLAGS.iter().map(|s| s.to_string()));
        args.push(template_dir.display().to_string());

        self.run("init", work_dir, args).await?;
        Ok(())
    }

    #[instrument(skip_all, fields(step = %step, work_dir = %work_dir.display()))]
    async fn apply(
        &self,
        work_dir: &Path,
        step: &str,
        template_dir: &Path,
        extra_args: &[String],
    ) -> Result<ExecutorOutput, ExecutorError> {
        info!("Applying infrastructure");
        let args = step_args("apply", work_dir, step, template_dir, extra_args);
        self.run("apply", work_dir, args).await
    }

    #[instrument(skip_all, fields(step = %step, work_dir = %work_dir.display()))]
    async fn destroy(
        &self,
        work_dir: &Path,
        step: &str,
        template_dir: &Path,
        extra_args: &[String],
    ) -> Result<ExecutorOutput, ExecutorError> {
        info!(?extra_args, "Destroying infrastructure");
        let args = step_args("destroy", work_dir, step, template_dir, extra_args);
        self.run("destroy", work_dir, args).await
    }
}
