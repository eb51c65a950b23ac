//! Cluster configuration
//!
//! The user-supplied description of the cluster, loaded from
//! `install-config.yaml`:
//!
//! ```yaml
//! name: demo
//! base_domain: example.com
//! platform:
//!   aws:
//!     region: us-east-1
//! networking:
//!   machine_cidr: 10.0.0.0/16
//! pull_secret: '{"auths":{}}'
//! machine_pools:
//!   - name: master
//!     replicas: 3
//!   - name: worker
//!     replicas: 2
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::loader::{load_yaml, LoadError};
use super::platform::{AwsMachinePool, PlatformConfig};

pub const MASTER_POOL: &str = "master";
pub const WORKER_POOL: &str = "worker";

/// Replica count used when a pool is missing or does not set one
pub const DEFAULT_REPLICAS: u32 = 3;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClusterConfig {
    /// Cluster name, the first label of every cluster DNS name
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub base_domain: String,

    /// Stable cluster identifier; generated when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_id: Option<String>,

    /// Written as a single-key map (`aws: {...}`), not a YAML tag
    #[serde(default, with = "serde_yaml::with::singleton_map")]
    pub platform: Option<PlatformConfig>,

    #[serde(default)]
    pub networking: Networking,

    #[serde(default)]
    pub pull_secret: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssh_key: Option<String>,

    #[serde(default)]
    pub machine_pools: Vec<MachinePool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Networking {
    #[serde(rename = "type", default = "default_network_type")]
    pub network_type: String,

    #[serde(default = "default_machine_cidr")]
    pub machine_cidr: String,

    #[serde(default = "default_service_cidr")]
    pub service_cidr: String,

    #[serde(default)]
    pub cluster_network: ClusterNetwork,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClusterNetwork {
    #[serde(default = "default_cluster_cidr")]
    pub cidr: String,

    #[serde(default = "default_host_prefix")]
    pub host_prefix: u8,
}

fn default_network_type() -> String {
    "OVNKubernetes".to_string()
}

fn default_machine_cidr() -> String {
    "10.0.0.0/16".to_string()
}

fn default_service_cidr() -> String {
    "172.30.0.0/16".to_string()
}

fn default_cluster_cidr() -> String {
    "10.128.0.0/14".to_string()
}

fn default_host_prefix() -> u8 {
    23
}

impl Default for Networking {
    fn default() -> Self {
        Self {
            network_type: default_network_type(),
            machine_cidr: default_machine_cidr(),
            service_cidr: default_service_cidr(),
            cluster_network: ClusterNetwork::default(),
        }
    }
}

impl Default for ClusterNetwork {
    fn default() -> Self {
        Self {
            cidr: default_cluster_cidr(),
            host_prefix: default_host_prefix(),
        }
    }
}

/// A named group of identically configured machines
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MachinePool {
    pub name: String,

    pub replicas: Option<u32>,

    #[serde(default)]
    pub platform: MachinePoolPlatform,
}

/// Per-pool platform overrides
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct MachinePoolPlatform {
    pub aws: Option<AwsMachinePool>,

    pub openstack: Option<OpenStackMachinePool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct OpenStackMachinePool {
    pub flavor_name: Option<String>,
}

impl ClusterConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        load_yaml(path.as_ref())
    }

    /// `<name>.<base_domain>`
    pub fn cluster_domain(&self) -> String {
        format!("{}.{}", self.name, self.base_domain)
    }

    pub fn api_host(&self) -> String {
        format!("api.{}", self.cluster_domain())
    }

    pub fn internal_api_host(&self) -> String {
        format!("api-int.{}", self.cluster_domain())
    }

    /// Name of the configured platform, or `""` when none is set
    pub fn platform_name(&self) -> &'static str {
        self.platform.as_ref().map(|p| p.name()).unwrap_or("")
    }

    pub fn machine_pool(&self, name: &str) -> Option<&MachinePool> {
        self.machine_pools.iter().find(|p| p.name == name)
    }

    pub fn replicas(&self, pool: &str) -> u32 {
        self.machine_pool(pool)
            .and_then(|p| p.replicas)
            .unwrap_or(DEFAULT_REPLICAS)
    }
}
