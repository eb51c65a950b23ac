//! Install metadata threaded through every workflow step
//!
//! One `Metadata` exists per workflow run. The cluster directory and the
//! templates location are fixed at construction; the cluster config is set
//! exactly once per run by the step that loads it; every derived field is
//! written only by the step that produces it.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::cluster_config::ClusterConfig;
use crate::engine::error::InstallError;

#[derive(Debug, Clone)]
pub struct Metadata {
    cluster_dir: PathBuf,
    templates_dir: PathBuf,
    cluster: Option<ClusterConfig>,

    /// Directory holding the generated TLS material
    pub tls_dir: Option<PathBuf>,

    /// Directory holding rendered manifests
    pub manifests_dir: Option<PathBuf>,

    /// Ignition config per machine role
    pub ignition_files: BTreeMap<String, PathBuf>,

    /// Admin kubeconfig
    pub kubeconfig: Option<PathBuf>,
}

impl Metadata {
    pub fn new(cluster_dir: impl Into<PathBuf>, templates_dir: impl Into<PathBuf>) -> Self {
        Self {
            cluster_dir: cluster_dir.into(),
            templates_dir: templates_dir.into(),
            cluster: None,
            tls_dir: None,
            manifests_dir: None,
            ignition_files: BTreeMap::new(),
            kubeconfig: None,
        }
    }

    pub fn cluster_dir(&self) -> &Path {
        &self.cluster_dir
    }

    pub fn templates_dir(&self) -> &Path {
        &self.templates_dir
    }

    /// Path of a well-known artifact inside the cluster directory
    pub fn path(&self, name: &str) -> PathBuf {
        self.cluster_dir.join(name)
    }

    /// The loaded cluster config
    pub fn cluster(&self) -> Result<&ClusterConfig, InstallError> {
        self.cluster.as_ref().ok_or_else(|| {
            InstallError::Config("cluster config has not been loaded".to_string())
        })
    }

    pub fn has_cluster(&self) -> bool {
        self.cluster.is_some()
    }

    /// Record the loaded cluster config. It can only be set once per run.
    pub fn set_cluster(&mut self, cluster: ClusterConfig) -> Result<(), InstallError> {
        if self.cluster.is_some() {
            return Err(InstallError::Config(
                "cluster config is already loaded".to_string(),
            ));
        }
        self.cluster = Some(cluster);
        Ok(())
    }

    /// Forget the loaded config and everything derived from it, so a new run
    /// starts from the cluster directory alone
    pub fn reset(&mut self) {
        self.cluster = None;
        self.tls_dir = None;
        self.manifests_dir = None;
        self.ignition_files.clear();
        self.kubeconfig = None;
    }

    /// Check that the cluster directory exists and is writable
    pub fn ensure_cluster_dir(&self) -> Result<(), InstallError> {
        let meta = std::fs::metadata(&self.cluster_dir).map_err(|e| {
            InstallError::Config(format!(
                "cluster directory {} is not accessible: {}",
                self.cluster_dir.display(),
                e
            ))
        })?;

        if !meta.is_dir() {
            return Err(InstallError::Config(format!(
                "cluster directory {} is not a directory",
                self.cluster_dir.display()
            )));
        }

        if meta.permissions().readonly() {
            return Err(InstallError::Config(format!(
                "cluster directory {} is not writable",
                self.cluster_dir.display()
            )));
        }

        Ok(())
    }
}
