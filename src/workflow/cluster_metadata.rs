//! Persisted cluster metadata
//!
//! Written to `metadata.json` during install and read back by the destroy
//! commands, which need to know which platform (and which resources) the
//! cluster was created on without the original install config.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::engine::error::InstallError;

use super::cluster_config::ClusterConfig;
use super::layout::METADATA_FILE;
use super::loader::{load_json, LoadError};
use super::platform::PlatformConfig;

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClusterMetadata {
    pub cluster_name: String,

    #[serde(rename = "clusterID")]
    pub cluster_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aws: Option<AwsMetadata>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub openstack: Option<OpenStackMetadata>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub libvirt: Option<LibvirtMetadata>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AwsMetadata {
    pub region: String,

    /// Tag sets identifying the cluster's resources
    pub identifier: Vec<HashMap<String, String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OpenStackMetadata {
    pub cloud: String,
    pub region: String,
    pub identifier: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LibvirtMetadata {
    pub uri: String,
}

impl ClusterMetadata {
    pub fn from_config(config: &ClusterConfig, cluster_id: &str) -> Self {
        let mut metadata = Self {
            cluster_name: config.name.clone(),
            cluster_id: cluster_id.to_string(),
            ..Default::default()
        };

        match &config.platform {
            Some(PlatformConfig::Aws(aws)) => {
                metadata.aws = Some(AwsMetadata {
                    region: aws.region.clone(),
                    identifier: vec![
                        HashMap::from([(
                            format!("kubernetes.io/cluster/{}", config.name),
                            "owned".to_string(),
                        )]),
                        HashMap::from([("clusterid".to_string(), cluster_id.to_string())]),
                    ],
                });
            }
            Some(PlatformConfig::Openstack(os)) => {
                metadata.openstack = Some(OpenStackMetadata {
                    cloud: os.cloud.clone(),
                    region: os.region.clone(),
                    identifier: HashMap::from([(
                        "clusterid".to_string(),
                        cluster_id.to_string(),
                    )]),
                });
            }
            Some(PlatformConfig::Libvirt(libvirt)) => {
                metadata.libvirt = Some(LibvirtMetadata {
                    uri: libvirt.uri.clone(),
                });
            }
            None => {}
        }

        metadata
    }

    /// Load `metadata.json` from a cluster directory
    pub fn load(cluster_dir: &Path) -> Result<Self, LoadError> {
        load_json(&cluster_dir.join(METADATA_FILE))
    }

    /// Write `metadata.json` into a cluster directory
    pub fn save(&self, cluster_dir: &Path) -> Result<PathBuf, InstallError> {
        let path = cluster_dir.join(METADATA_FILE);
        let mut json = serde_json::to_string_pretty(self)?;
        json.push('\n');
        fs::write(&path, json).map_err(|e| InstallError::write(&path, e))?;
        Ok(path)
    }

    /// Name of the recorded platform, or `""` when none is recorded
    pub fn platform(&self) -> &'static str {
        if self.aws.is_some() {
            "aws"
        } else if self.openstack.is_some() {
            "openstack"
        } else if self.libvirt.is_some() {
            "libvirt"
        } else {
            ""
        }
    }
}
