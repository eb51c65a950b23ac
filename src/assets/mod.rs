//! Install artifacts generated into the cluster directory
//!
//! - `tfvars`: executor variables
//! - `tls`: root CA and leaf certificates
//! - `manifests`: cluster-config ConfigMap and the admin kubeconfig
//! - `ignition`: per-role machine configs

pub mod ignition;
pub mod manifests;
pub mod tfvars;
pub mod tls;

pub use manifests::Renderer;
pub use tfvars::TerraformVariables;
pub use tls::{ensure_tls_assets, CertKeyPair, TlsBundle};
