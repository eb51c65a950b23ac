//! # Cluster Installer
//!
//! Installs a cluster from a declarative configuration by generating the
//! install artifacts and driving an external infrastructure executor.
//!
//! ## Features
//!
//! - **Ordered install pipeline** - Steps run in order over shared metadata and stop at the first failure
//! - **Re-runnable** - Config steps regenerate deterministically; the bootstrap apply is skipped once its state exists
//! - **Scoped bootstrap teardown** - Destroys only the bootstrap module, replacing state by atomic rename
//! - **Milestone waiting** - Polls the install status service until validation, bootstrap or install completes
//!
//! ## Cluster directory
//!
//! - `install-config.yaml`: the cluster description (input)
//! - `terraform.tfvars`: executor variables
//! - `<step>.tfstate`: executor state per step (`assets`, `infra`, `bootstrap`)
//! - `tls/`, `manifests/`, `auth/kubeconfig`, `*.ign`: generated assets
//! - `metadata.json`: what the destroy commands need to know
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use cluster_installer::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let executor = Arc::new(TerraformExecutor::locate(None)?);
//!     let metadata = Metadata::new("./mycluster", "./data/templates");
//!
//!     let mut workflow = install_workflow(metadata, executor.clone());
//!     workflow.run().await?;
//!
//!     BootstrapTeardown::new(executor, "./data/templates")
//!         .destroy(std::path::Path::new("./mycluster"))
//!         .await?;
//!     Ok(())
//! }
//! ```

pub mod assets;
pub mod engine;
pub mod infra;
pub mod waitfor;
pub mod workflow;

// Re-export main types
pub use engine::{
    destroy_workflow, install_workflow, BootstrapTeardown, FnStep, InstallError, Step, Workflow,
};
pub use infra::{ExecutorError, ExecutorOutput, InfraExecutor, TerraformExecutor};
pub use waitfor::{wait_for, Milestone, RestStatusSource, StatusSource, WaitError, WaitOptions};
pub use workflow::{
    ClusterConfig, ClusterMetadata, InstallerConfig, LoadError, Metadata, PlatformConfig,
    ValidationErrors,
};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::engine::{
        destroy_workflow, install_workflow, BootstrapTeardown, InstallError, Step, Workflow,
    };
    pub use crate::infra::{InfraExecutor, TerraformExecutor};
    pub use crate::waitfor::{wait_for, Milestone, RestStatusSource, WaitOptions};
    pub use crate::workflow::{ClusterConfig, ClusterMetadata, InstallerConfig, Metadata};
}
