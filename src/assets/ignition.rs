//! Ignition configs (config version 3.2.0)
//!
//! The bootstrap machine gets a full config carrying the pull secret, the
//! TLS material, and the rendered manifests. Masters and workers get a small
//! pointer config that merges the real one from the machine-config server.

use base64::Engine as _;
use serde::Serialize;

use crate::engine::error::InstallError;
use crate::workflow::cluster_config::ClusterConfig;

use super::tls::{CertKeyPair, TlsBundle, ADMIN, APISERVER, KUBELET, ROOT_CA};

pub const IGNITION_VERSION: &str = "3.2.0";
pub const MACHINE_CONFIG_PORT: u16 = 22623;

const FILE_MODE: u32 = 0o644;
const KEY_MODE: u32 = 0o600;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Config {
    pub ignition: Ignition,
    #[serde(skip_serializing_if = "Passwd::is_empty")]
    pub passwd: Passwd,
    #[serde(skip_serializing_if = "Storage::is_empty")]
    pub storage: Storage,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Ignition {
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<IgnitionConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub security: Option<Security>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct IgnitionConfig {
    pub merge: Vec<Resource>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Security {
    pub tls: TlsSection,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TlsSection {
    pub certificate_authorities: Vec<Resource>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Resource {
    pub source: String,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct Passwd {
    pub users: Vec<User>,
}

impl Passwd {
    fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub name: String,
    pub ssh_authorized_keys: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct Storage {
    pub files: Vec<File>,
}

impl Storage {
    fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct File {
    pub path: String,
    pub mode: u32,
    pub overwrite: bool,
    pub contents: Resource,
}

/// `data:` URL carrying `contents` base64 encoded
pub fn data_url(contents: &[u8]) -> String {
    format!(
        "data:text/plain;charset=utf-8;base64,{}",
        base64::engine::general_purpose::STANDARD.encode(contents)
    )
}

fn file(path: &str, mode: u32, contents: &[u8]) -> File {
    File {
        path: path.to_string(),
        mode,
        overwrite: true,
        contents: Resource {
            source: data_url(contents),
        },
    }
}

fn passwd(config: &ClusterConfig) -> Passwd {
    let users = config
        .ssh_key
        .as_ref()
        .filter(|k| !k.trim().is_empty())
        .map(|key| User {
            name: "core".to_string(),
            ssh_authorized_keys: vec![key.trim().to_string()],
        })
        .into_iter()
        .collect();
    Passwd { users }
}

fn tls_files(files: &mut Vec<File>, name: &str, pair: &CertKeyPair) {
    files.push(file(
        &format!("/opt/openshift/tls/{}.crt", name),
        FILE_MODE,
        pair.cert_pem.as_bytes(),
    ));
    files.push(file(
        &format!("/opt/openshift/tls/{}.key", name),
        KEY_MODE,
        pair.key_pem.as_bytes(),
    ));
}

/// Full config for the bootstrap machine
pub fn bootstrap(
    config: &ClusterConfig,
    tls: &TlsBundle,
    cluster_config_manifest: &str,
    kubeconfig: &str,
) -> Config {
    let mut files = vec![file(
        "/root/.docker/config.json",
        KEY_MODE,
        config.pull_secret.as_bytes(),
    )];
    tls_files(&mut files, ROOT_CA, &tls.ca);
    tls_files(&mut files, ADMIN, &tls.admin);
    tls_files(&mut files, APISERVER, &tls.apiserver);
    tls_files(&mut files, KUBELET, &tls.kubelet);
    files.push(file(
        "/opt/openshift/manifests/cluster-config.yaml",
        FILE_MODE,
        cluster_config_manifest.as_bytes(),
    ));
    files.push(file(
        "/opt/openshift/auth/kubeconfig",
        KEY_MODE,
        kubeconfig.as_bytes(),
    ));

    Config {
        ignition: Ignition {
            version: IGNITION_VERSION.to_string(),
            config: None,
            security: None,
        },
        passwd: passwd(config),
        storage: Storage { files },
    }
}

/// Pointer config for a master or worker: merge the served config, trusting
/// the cluster root CA
pub fn pointer(config: &ClusterConfig, role: &str, tls: &TlsBundle) -> Config {
    Config {
        ignition: Ignition {
            version: IGNITION_VERSION.to_string(),
            config: Some(IgnitionConfig {
                merge: vec![Resource {
                    source: format!(
                        "https://{}:{}/config/{}",
                        config.internal_api_host(),
                        MACHINE_CONFIG_PORT,
                        role
                    ),
                }],
            }),
            security: Some(Security {
                tls: TlsSection {
                    certificate_authorities: vec![Resource {
                        source: data_url(tls.ca.cert_pem.as_bytes()),
                    }],
                },
            }),
        },
        passwd: passwd(config),
        storage: Storage::default(),
    }
}

impl Config {
    pub fn to_json(&self) -> Result<String, InstallError> {
        Ok(serde_json::to_string(self)?)
    }
}
