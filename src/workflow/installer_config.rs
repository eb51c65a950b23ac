//! Installer configuration
//!
//! Settings of the installer itself rather than of the cluster, loaded from
//! an optional YAML file:
//!
//! ```yaml
//! terraform_binary: /usr/local/bin/terraform
//! templates_dir: /usr/share/cluster-installer/templates
//! bootstrap_settle_seconds: 10
//!
//! wait:
//!   api_url: http://assisted-service:8090
//!   poll_interval_secs: 10
//!   install_complete_timeout_secs: 3600
//! ```
//!
//! `CLUSTER_INSTALLER_TEMPLATES` overrides `templates_dir`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::loader::{load_yaml, LoadError};
use crate::waitfor::{Milestone, WaitOptions};

pub const TEMPLATES_ENV: &str = "CLUSTER_INSTALLER_TEMPLATES";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InstallerConfig {
    /// Path or name of the terraform binary; looked up on `PATH` when unset
    #[serde(default)]
    pub terraform_binary: Option<String>,

    #[serde(default = "default_templates_dir")]
    pub templates_dir: PathBuf,

    #[serde(default = "default_settle_seconds")]
    pub bootstrap_settle_seconds: u64,

    #[serde(default)]
    pub wait: WaitConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WaitConfig {
    #[serde(default)]
    pub api_url: Option<String>,

    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    #[serde(default)]
    pub cluster_validated_timeout_secs: Option<u64>,

    #[serde(default)]
    pub bootstrap_complete_timeout_secs: Option<u64>,

    #[serde(default)]
    pub install_complete_timeout_secs: Option<u64>,
}

fn default_templates_dir() -> PathBuf {
    PathBuf::from("data/templates")
}

fn default_settle_seconds() -> u64 {
    10
}

fn default_poll_interval() -> u64 {
    10
}

impl Default for InstallerConfig {
    fn default() -> Self {
        Self {
            terraform_binary: None,
            templates_dir: default_templates_dir(),
            bootstrap_settle_seconds: default_settle_seconds(),
            wait: WaitConfig::default(),
        }
    }
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            api_url: None,
            poll_interval_secs: default_poll_interval(),
            cluster_validated_timeout_secs: None,
            bootstrap_complete_timeout_secs: None,
            install_complete_timeout_secs: None,
        }
    }
}

impl InstallerConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        load_yaml(path.as_ref())
    }

    /// Load `path` when given, otherwise use the defaults; then apply
    /// environment overrides
    pub fn resolve(path: Option<&Path>) -> Result<Self, LoadError> {
        let mut config = match path {
            Some(p) => Self::load(p)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Apply overrides from a variable lookup
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(dir) = lookup(TEMPLATES_ENV).filter(|v| !v.is_empty()) {
            self.templates_dir = PathBuf::from(dir);
        }
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_secs(self.bootstrap_settle_seconds)
    }
}

impl WaitConfig {
    pub fn options(&self, milestone: Milestone) -> WaitOptions {
        let timeout = match milestone {
            Milestone::ClusterValidated => self.cluster_validated_timeout_secs,
            Milestone::BootstrapComplete => self.bootstrap_complete_timeout_secs,
            Milestone::InstallComplete => self.install_complete_timeout_secs,
        };
        WaitOptions {
            poll_interval: Duration::from_secs(self.poll_interval_secs),
            timeout: timeout.map(Duration::from_secs),
        }
    }
}
