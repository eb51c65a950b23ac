//! Platform types and configurations
//!
//! This module contains the platform-specific configuration types for:
//! - AWS
//! - OpenStack
//! - libvirt
//!
//! It also holds the process-wide default tables keyed by region.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::LazyLock;

// ============================================================================
// Default tables
// ============================================================================

/// Instance class used when a region has no entry in the table
pub const FALLBACK_INSTANCE_CLASS: &str = "m4";

/// Default OpenStack region
pub const DEFAULT_OPENSTACK_REGION: &str = "regionOne";

/// Default libvirt network interface
pub const DEFAULT_LIBVIRT_INTERFACE: &str = "tt0";

/// Default instance class per AWS region. Regions launched after m4 was
/// retired only offer m5.
static DEFAULT_MACHINE_CLASS: LazyLock<HashMap<&'static str, &'static str>> =
    LazyLock::new(|| {
        HashMap::from([
            ("ap-northeast-1", "m4"),
            ("ap-northeast-2", "m4"),
            ("ap-northeast-3", "m4"),
            ("ap-south-1", "m4"),
            ("ap-southeast-1", "m4"),
            ("ap-southeast-2", "m4"),
            ("ca-central-1", "m4"),
            ("eu-central-1", "m4"),
            ("eu-north-1", "m5"),
            ("eu-west-1", "m4"),
            ("eu-west-2", "m4"),
            ("eu-west-3", "m5"),
            ("sa-east-1", "m4"),
            ("us-east-1", "m4"),
            ("us-east-2", "m4"),
            ("us-gov-east-1", "m5"),
            ("us-gov-west-1", "m4"),
            ("us-west-1", "m4"),
            ("us-west-2", "m4"),
        ])
    });

/// Whether the default table knows the region
pub fn is_known_aws_region(region: &str) -> bool {
    DEFAULT_MACHINE_CLASS.contains_key(region)
}

// ============================================================================
// Platform Enum
// ============================================================================

/// Infrastructure platform the cluster is installed on
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum PlatformConfig {
    Aws(AwsPlatform),
    Openstack(OpenStackPlatform),
    Libvirt(LibvirtPlatform),
}

impl PlatformConfig {
    /// Platform name, also used to select executor templates
    pub fn name(&self) -> &'static str {
        match self {
            PlatformConfig::Aws(_) => "aws",
            PlatformConfig::Openstack(_) => "openstack",
            PlatformConfig::Libvirt(_) => "libvirt",
        }
    }
}

// ============================================================================
// AWS Configuration
// ============================================================================

/// AWS platform configuration shared by all machine pools
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct AwsPlatform {
    /// Region the cluster is created in
    #[serde(default)]
    pub region: String,

    /// Additional tags applied to every created resource
    #[serde(default)]
    pub user_tags: HashMap<String, String>,

    /// Used by machine pools that do not set their own platform config
    #[serde(default)]
    pub default_machine_platform: Option<AwsMachinePool>,
}

impl AwsPlatform {
    /// Instance class for the configured region
    pub fn default_instance_class(&self) -> &'static str {
        DEFAULT_MACHINE_CLASS
            .get(self.region.as_str())
            .copied()
            .unwrap_or(FALLBACK_INSTANCE_CLASS)
    }

    /// Instance type for a pool, falling back to the platform default and
    /// then to the region's default class
    pub fn instance_type(&self, pool: Option<&AwsMachinePool>) -> String {
        pool.and_then(|p| p.instance_type.clone())
            .or_else(|| {
                self.default_machine_platform
                    .as_ref()
                    .and_then(|p| p.instance_type.clone())
            })
            .unwrap_or_else(|| format!("{}.xlarge", self.default_instance_class()))
    }
}

/// AWS machine pool overrides
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct AwsMachinePool {
    pub instance_type: Option<String>,

    #[serde(default)]
    pub zones: Vec<String>,

    pub root_volume_size: Option<u32>,
}

// ============================================================================
// OpenStack Configuration
// ============================================================================

/// OpenStack platform configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OpenStackPlatform {
    /// Entry in clouds.yaml used for credentials
    #[serde(default)]
    pub cloud: String,

    #[serde(default = "default_openstack_region")]
    pub region: String,

    /// Network used for floating IPs
    #[serde(default)]
    pub external_network: String,

    /// Glance image the machines boot from
    pub base_image: Option<String>,

    /// Flavor used when a pool does not set one
    pub flavor_name: Option<String>,

    #[serde(default)]
    pub extra_tags: HashMap<String, String>,
}

fn default_openstack_region() -> String {
    DEFAULT_OPENSTACK_REGION.to_string()
}

// ============================================================================
// libvirt Configuration
// ============================================================================

/// libvirt platform configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LibvirtPlatform {
    /// Connection URI of the libvirt daemon
    #[serde(default)]
    pub uri: String,

    #[serde(default = "default_libvirt_interface")]
    pub network_interface: String,

    /// Image the machines boot from
    pub image: Option<String>,
}

fn default_libvirt_interface() -> String {
    DEFAULT_LIBVIRT_INTERFACE.to_string()
}
