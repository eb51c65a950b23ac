//! Install inputs and per-run state
//!
//! This module contains the types the install pipeline reads and threads
//! through its steps:
//! - `cluster_config` - The user's cluster description (`install-config.yaml`)
//! - `platform` - Platform configurations and default tables
//! - `validation` - Field-path validation of the cluster config
//! - `cluster_metadata` - Persisted metadata (`metadata.json`)
//! - `metadata` - Shared state handed to every step
//! - `layout` - Well-known names inside the cluster directory
//! - `installer_config` - Settings of the installer itself
//! - `loader` - YAML/JSON document loading

pub mod cluster_config;
pub mod cluster_metadata;
pub mod installer_config;
pub mod layout;
pub mod loader;
pub mod metadata;
pub mod platform;
pub mod validation;

pub use cluster_config::{ClusterConfig, MachinePool, Networking};
pub use cluster_metadata::ClusterMetadata;
pub use installer_config::{InstallerConfig, WaitConfig};
pub use loader::LoadError;
pub use metadata::Metadata;
pub use platform::{AwsPlatform, LibvirtPlatform, OpenStackPlatform, PlatformConfig};
pub use validation::{validate_cluster_config, FieldError, ValidationErrors};
