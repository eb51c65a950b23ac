//! Rendered manifests and the admin kubeconfig
//!
//! Both are handlebars templates compiled once into a strict registry, so a
//! missing template variable is an error rather than an empty string.

use base64::Engine as _;
use handlebars::{no_escape, Handlebars};
use serde_json::json;

use crate::engine::error::InstallError;
use crate::workflow::cluster_config::ClusterConfig;

use super::tls::TlsBundle;

const CLUSTER_CONFIG_TEMPLATE: &str = "cluster-config";
const KUBECONFIG_TEMPLATE: &str = "kubeconfig";

const CLUSTER_CONFIG: &str = r#"apiVersion: v1
kind: ConfigMap
metadata:
  name: cluster-config-v1
  namespace: kube-system
data:
  install-config: |
{{install_config}}
"#;

const KUBECONFIG: &str = r#"apiVersion: v1
kind: Config
clusters:
- cluster:
    certificate-authority-data: {{ca_data}}
    server: https://{{api_host}}:6443
  name: {{cluster_name}}
contexts:
- context:
    cluster: {{cluster_name}}
    user: admin
  name: admin
current-context: admin
preferences: {}
users:
- name: admin
  user:
    client-certificate-data: {{client_cert_data}}
    client-key-data: {{client_key_data}}
"#;

pub struct Renderer {
    registry: Handlebars<'static>,
}

impl Renderer {
    pub fn new() -> Result<Self, InstallError> {
        let mut registry = Handlebars::new();
        registry.set_strict_mode(true);
        registry.register_escape_fn(no_escape);
        registry.register_template_string(CLUSTER_CONFIG_TEMPLATE, CLUSTER_CONFIG)?;
        registry.register_template_string(KUBECONFIG_TEMPLATE, KUBECONFIG)?;
        Ok(Self { registry })
    }

    /// ConfigMap carrying the install config, read back by in-cluster
    /// operators
    pub fn cluster_config(&self, config: &ClusterConfig) -> Result<String, InstallError> {
        let yaml = serde_yaml::to_string(config)
            .map_err(|e| InstallError::Template(format!("failed to encode install config: {}", e)))?;
        let indented = yaml
            .lines()
            .map(|line| format!("    {}", line))
            .collect::<Vec<_>>()
            .join("\n");

        Ok(self.registry.render(
            CLUSTER_CONFIG_TEMPLATE,
            &json!({ "install_config": indented }),
        )?)
    }

    pub fn kubeconfig(&self, config: &ClusterConfig, tls: &TlsBundle) -> Result<String, InstallError> {
        let b64 = base64::engine::general_purpose::STANDARD;
        Ok(self.registry.render(
            KUBECONFIG_TEMPLATE,
            &json!({
                "cluster_name": config.name,
                "api_host": config.api_host(),
                "ca_data": b64.encode(&tls.ca.cert_pem),
                "client_cert_data": b64.encode(&tls.admin.cert_pem),
                "client_key_data": b64.encode(&tls.admin.key_pem),
            }),
        )?)
    }
}
