//! Cluster PKI
//!
//! Generates the root CA and the leaf certificates the control plane needs.
//! Material already present in the TLS directory is kept; when the CA exists
//! it is reloaded from PEM and used to sign whichever leaves are missing.

use std::fs;
use std::net::IpAddr;
use std::path::{Path, PathBuf};

use rcgen::{
    string::Ia5String, BasicConstraints, CertificateParams, DistinguishedName, DnType, DnValue,
    ExtendedKeyUsagePurpose, IsCa, Issuer, KeyPair, KeyUsagePurpose, SanType,
};
use tracing::{debug, info};

use crate::engine::error::InstallError;
use crate::workflow::cluster_config::ClusterConfig;

pub const CA_VALIDITY_YEARS: i64 = 10;
pub const CERT_VALIDITY_YEARS: i64 = 1;

pub const ROOT_CA: &str = "root-ca";
pub const ADMIN: &str = "admin";
pub const APISERVER: &str = "apiserver";
pub const KUBELET: &str = "kubelet";

fn compute_validity(years: i64) -> (time::OffsetDateTime, time::OffsetDateTime) {
    let now = time::OffsetDateTime::now_utc();
    (now, now + time::Duration::days(years * 365))
}

/// PEM encoded certificate and key
#[derive(Debug, Clone, PartialEq)]
pub struct CertKeyPair {
    pub cert_pem: String,
    pub key_pem: String,
}

impl CertKeyPair {
    pub fn cert_path(dir: &Path, name: &str) -> PathBuf {
        dir.join(format!("{}.crt", name))
    }

    pub fn key_path(dir: &Path, name: &str) -> PathBuf {
        dir.join(format!("{}.key", name))
    }

    /// Read `<name>.crt` and `<name>.key`; `None` unless both exist
    fn read(dir: &Path, name: &str) -> Result<Option<Self>, InstallError> {
        let cert = Self::cert_path(dir, name);
        let key = Self::key_path(dir, name);
        if !cert.is_file() || !key.is_file() {
            return Ok(None);
        }

        let read = |p: &Path| {
            fs::read_to_string(p)
                .map_err(|e| InstallError::io(format!("failed to read {}", p.display()), e))
        };
        Ok(Some(Self {
            cert_pem: read(&cert)?,
            key_pem: read(&key)?,
        }))
    }

    fn write(&self, dir: &Path, name: &str) -> Result<(), InstallError> {
        let cert = Self::cert_path(dir, name);
        let key = Self::key_path(dir, name);
        fs::write(&cert, &self.cert_pem).map_err(|e| InstallError::write(&cert, e))?;
        fs::write(&key, &self.key_pem).map_err(|e| InstallError::write(&key, e))?;
        Ok(())
    }
}

/// The material later assets embed
#[derive(Debug, Clone)]
pub struct TlsBundle {
    pub ca: CertKeyPair,
    pub admin: CertKeyPair,
    pub apiserver: CertKeyPair,
    pub kubelet: CertKeyPair,
}

struct LeafSpec {
    common_name: String,
    organization: Option<&'static str>,
    usages: Vec<ExtendedKeyUsagePurpose>,
    sans: Vec<String>,
}

fn distinguished_name(common_name: &str, organization: Option<&str>) -> DistinguishedName {
    let mut dn = DistinguishedName::new();
    dn.push(DnType::CommonName, DnValue::Utf8String(common_name.to_string()));
    if let Some(org) = organization {
        dn.push(DnType::OrganizationName, DnValue::Utf8String(org.to_string()));
    }
    dn
}

fn subject_alt_name(san: &str) -> Result<SanType, InstallError> {
    if let Ok(ip) = san.parse::<IpAddr>() {
        return Ok(SanType::IpAddress(ip));
    }
    Ia5String::try_from(san.to_string())
        .map(SanType::DnsName)
        .map_err(|e| InstallError::Tls(format!("invalid DNS name '{}': {}", san, e)))
}

fn generate_ca(common_name: &str) -> Result<CertKeyPair, InstallError> {
    let mut params = CertificateParams::default();
    params.distinguished_name = distinguished_name(common_name, Some("openshift"));
    params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
    params.key_usages = vec![
        KeyUsagePurpose::KeyCertSign,
        KeyUsagePurpose::CrlSign,
        KeyUsagePurpose::DigitalSignature,
    ];
    let (not_before, not_after) = compute_validity(CA_VALIDITY_YEARS);
    params.not_before = not_before;
    params.not_after = not_after;

    let key = KeyPair::generate()?;
    let cert = params.self_signed(&key)?;
    Ok(CertKeyPair {
        cert_pem: cert.pem(),
        key_pem: key.serialize_pem(),
    })
}

fn sign_leaf(ca: &CertKeyPair, spec: &LeafSpec) -> Result<CertKeyPair, InstallError> {
    let mut params = CertificateParams::default();
    params.distinguished_name = distinguished_name(&spec.common_name, spec.organization);
    params.is_ca = IsCa::NoCa;
    params.key_usages = vec![
        KeyUsagePurpose::DigitalSignature,
        KeyUsagePurpose::KeyEncipherment,
    ];
    params.extended_key_usages = spec.usages.clone();
    params.subject_alt_names = spec
        .sans
        .iter()
        .map(|s| subject_alt_name(s))
        .collect::<Result<Vec<_>, _>>()?;
    let (not_before, not_after) = compute_validity(CERT_VALIDITY_YEARS);
    params.not_before = not_before;
    params.not_after = not_after;

    let key = KeyPair::generate()?;
    let ca_key = KeyPair::from_pem(&ca.key_pem)?;
    let issuer = Issuer::from_ca_cert_pem(&ca.cert_pem, ca_key)?;
    let cert = params.signed_by(&key, &issuer)?;

    Ok(CertKeyPair {
        cert_pem: cert.pem(),
        key_pem: key.serialize_pem(),
    })
}

fn admin_spec() -> LeafSpec {
    LeafSpec {
        common_name: "system:admin".to_string(),
        organization: Some("system:masters"),
        usages: vec![ExtendedKeyUsagePurpose::ClientAuth],
        sans: Vec::new(),
    }
}

fn apiserver_spec(config: &ClusterConfig) -> LeafSpec {
    LeafSpec {
        common_name: "system:kube-apiserver".to_string(),
        organization: Some("kube-master"),
        usages: vec![ExtendedKeyUsagePurpose::ServerAuth],
        sans: vec![
            config.api_host(),
            config.internal_api_host(),
            "localhost".to_string(),
            "127.0.0.1".to_string(),
        ],
    }
}

fn kubelet_spec() -> LeafSpec {
    LeafSpec {
        common_name: "system:serviceaccount:openshift-machine-config-operator:node-bootstrapper"
            .to_string(),
        organization: Some("system:serviceaccounts:openshift-machine-config-operator"),
        usages: vec![ExtendedKeyUsagePurpose::ClientAuth],
        sans: Vec::new(),
    }
}

/// Existing leaves are only trusted when the CA that signed them is still
/// the one on disk
fn ensure_leaf(
    tls_dir: &Path,
    ca: &CertKeyPair,
    name: &str,
    spec: LeafSpec,
    reuse: bool,
) -> Result<CertKeyPair, InstallError> {
    if reuse {
        if let Some(existing) = CertKeyPair::read(tls_dir, name)? {
            return Ok(existing);
        }
    }

    info!(cert = name, "Generating certificate");
    let pair = sign_leaf(ca, &spec)?;
    pair.write(tls_dir, name)?;
    Ok(pair)
}

/// Make sure every certificate exists in `tls_dir`, generating only what is
/// missing. A regenerated CA re-signs every leaf.
pub fn ensure_tls_assets(tls_dir: &Path, config: &ClusterConfig) -> Result<TlsBundle, InstallError> {
    fs::create_dir_all(tls_dir)
        .map_err(|e| InstallError::io(format!("failed to create {}", tls_dir.display()), e))?;

    let (ca, reuse) = match CertKeyPair::read(tls_dir, ROOT_CA)? {
        Some(existing) => {
            debug!("Reusing existing root CA");
            (existing, true)
        }
        None => {
            info!("Generating root CA");
            let ca = generate_ca("root-ca")?;
            ca.write(tls_dir, ROOT_CA)?;
            (ca, false)
        }
    };

    Ok(TlsBundle {
        admin: ensure_leaf(tls_dir, &ca, ADMIN, admin_spec(), reuse)?,
        apiserver: ensure_leaf(tls_dir, &ca, APISERVER, apiserver_spec(config), reuse)?,
        kubelet: ensure_leaf(tls_dir, &ca, KUBELET, kubelet_spec(), reuse)?,
        ca,
    })
}
