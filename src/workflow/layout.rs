//! Cluster directory layout
//!
//! Well-known file and directory names inside a cluster directory. Every
//! generated artifact and every piece of executor state is keyed by one of
//! these names.

/// Cluster configuration supplied by the user
pub const INSTALL_CONFIG_FILE: &str = "install-config.yaml";

/// Variables consumed by every executor step
pub const TFVARS_FILE: &str = "terraform.tfvars";

/// Persisted cluster metadata, read back by the destroy commands
pub const METADATA_FILE: &str = "metadata.json";

/// Variables override that drops the bootstrap host from the load balancers
pub const BOOTSTRAP_OVERRIDE_FILE: &str = "disable-bootstrap-load-balancer-targets.tfvars";

/// Generated TLS material
pub const TLS_DIR: &str = "tls";

/// Rendered cluster manifests
pub const MANIFESTS_DIR: &str = "manifests";

/// Rendered cluster config map
pub const CLUSTER_CONFIG_MANIFEST: &str = "cluster-config.yaml";

/// Admin credentials
pub const AUTH_DIR: &str = "auth";
pub const KUBECONFIG_FILE: &str = "kubeconfig";

/// Executor step that creates shared assets (DNS zones, buckets)
pub const ASSETS_STEP: &str = "assets";

/// Executor step that creates the cluster network, load balancers and masters
pub const INFRA_STEP: &str = "infra";

/// Executor step that creates the temporary bootstrap host
pub const BOOTSTRAP_STEP: &str = "bootstrap";

/// Executor module that holds the bootstrap host resources
pub const BOOTSTRAP_MODULE: &str = "module.bootstrap";

/// Ignition config file name for a machine role
pub fn ignition_file(role: &str) -> String {
    format!("{}.ign", role)
}
