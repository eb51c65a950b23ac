//! Cluster config validation
//!
//! Every rule appends a [`FieldError`] tagged with the dotted path of the
//! offending field; all errors are reported together.

use std::collections::HashSet;
use std::fmt;
use std::net::IpAddr;
use std::sync::LazyLock;

use ipnetwork::IpNetwork;
use regex::Regex;

use super::cluster_config::{ClusterConfig, MachinePool, Networking, MASTER_POOL, WORKER_POOL};
use super::platform::{
    is_known_aws_region, AwsPlatform, LibvirtPlatform, OpenStackPlatform, PlatformConfig,
};

static DNS_LABEL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?$").unwrap());

static DNS_SUBDOMAIN_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?(\.[a-z0-9]([-a-z0-9]*[a-z0-9])?)*$").unwrap()
});

/// Link-local address of the instance metadata service on AWS and OpenStack
const METADATA_SERVICE_ADDRESS: &str = "169.254.169.254";

const SUPPORTED_POOLS: [&str; 2] = [MASTER_POOL, WORKER_POOL];

#[derive(Debug, Clone, PartialEq)]
pub enum FieldErrorKind {
    Required,
    Invalid(String),
    Duplicate(String),
    Unsupported {
        value: String,
        supported: Vec<String>,
    },
}

/// A single validation failure
#[derive(Debug, Clone, PartialEq)]
pub struct FieldError {
    pub path: String,
    pub kind: FieldErrorKind,
    pub detail: String,
}

impl FieldError {
    pub fn required(path: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind: FieldErrorKind::Required,
            detail: detail.into(),
        }
    }

    pub fn invalid(
        path: impl Into<String>,
        value: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            kind: FieldErrorKind::Invalid(value.into()),
            detail: detail.into(),
        }
    }

    pub fn duplicate(path: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind: FieldErrorKind::Duplicate(value.into()),
            detail: String::new(),
        }
    }

    pub fn unsupported(path: impl Into<String>, value: impl Into<String>, supported: &[&str]) -> Self {
        Self {
            path: path.into(),
            kind: FieldErrorKind::Unsupported {
                value: value.into(),
                supported: supported.iter().map(|s| s.to_string()).collect(),
            },
            detail: String::new(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            FieldErrorKind::Required => write!(f, "{}: Required value: {}", self.path, self.detail),
            FieldErrorKind::Invalid(value) => {
                write!(f, "{}: Invalid value: {:?}: {}", self.path, value, self.detail)
            }
            FieldErrorKind::Duplicate(value) => {
                write!(f, "{}: Duplicate value: {:?}", self.path, value)
            }
            FieldErrorKind::Unsupported { value, supported } => {
                let supported = supported
                    .iter()
                    .map(|s| format!("{:?}", s))
                    .collect::<Vec<_>>()
                    .join(", ");
                write!(
                    f,
                    "{}: Unsupported value: {:?}: supported values: {}",
                    self.path, value, supported
                )
            }
        }
    }
}

/// All validation failures for one config
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ValidationErrors(pub Vec<FieldError>);

impl ValidationErrors {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn errors(&self) -> &[FieldError] {
        &self.0
    }

    fn push(&mut self, error: FieldError) {
        self.0.push(error);
    }

    fn into_result(self) -> Result<(), ValidationErrors> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.as_slice() {
            [single] => write!(f, "{}", single),
            many => {
                let joined = many
                    .iter()
                    .map(|e| e.to_string())
                    .collect::<Vec<_>>()
                    .join(", ");
                write!(f, "[{}]", joined)
            }
        }
    }
}

impl std::error::Error for ValidationErrors {}

/// Validate a full cluster config
pub fn validate_cluster_config(config: &ClusterConfig) -> Result<(), ValidationErrors> {
    let mut errs = ValidationErrors::default();

    if config.name.is_empty() {
        errs.push(FieldError::required("name", "cluster name must be specified"));
    } else if config.name.len() > 63 || !DNS_LABEL_REGEX.is_match(&config.name) {
        errs.push(FieldError::invalid(
            "name",
            &config.name,
            "must be a lower case DNS-1123 label",
        ));
    }

    if config.base_domain.is_empty() {
        errs.push(FieldError::required("baseDomain", "base domain must be specified"));
    } else if !DNS_SUBDOMAIN_REGEX.is_match(&config.base_domain) {
        errs.push(FieldError::invalid(
            "baseDomain",
            &config.base_domain,
            "must be a lower case DNS-1123 subdomain",
        ));
    }

    if let Some(id) = &config.cluster_id {
        if uuid::Uuid::parse_str(id).is_err() {
            errs.push(FieldError::invalid("clusterID", id, "must be a UUID"));
        }
    }

    validate_pull_secret(&config.pull_secret, &mut errs);

    let networks = validate_networking(&config.networking, &mut errs);

    match &config.platform {
        None => errs.push(FieldError::required(
            "platform",
            "exactly one platform must be configured",
        )),
        Some(platform) => validate_platform(platform, &networks, &mut errs),
    }

    validate_machine_pools(&config.machine_pools, &mut errs);

    errs.into_result()
}

fn validate_pull_secret(secret: &str, errs: &mut ValidationErrors) {
    if secret.is_empty() {
        errs.push(FieldError::required("pullSecret", "pull secret must be specified"));
        return;
    }

    match serde_json::from_str::<serde_json::Value>(secret) {
        Ok(value) if value.get("auths").map(|a| a.is_object()).unwrap_or(false) => {}
        Ok(_) => errs.push(FieldError::invalid(
            "pullSecret",
            "<redacted>",
            "auths required",
        )),
        Err(e) => errs.push(FieldError::invalid(
            "pullSecret",
            "<redacted>",
            format!("failed to parse: {}", e),
        )),
    }
}

/// Parsed networks, with their field paths, for the platform checks
struct ParsedNetworks(Vec<(&'static str, IpNetwork)>);

fn parse_network(
    path: &'static str,
    cidr: &str,
    errs: &mut ValidationErrors,
) -> Option<IpNetwork> {
    match cidr.parse::<IpNetwork>() {
        Ok(net) => Some(net),
        Err(e) => {
            errs.push(FieldError::invalid(path, cidr, e.to_string()));
            None
        }
    }
}

fn validate_networking(networking: &Networking, errs: &mut ValidationErrors) -> ParsedNetworks {
    let mut parsed = Vec::new();

    if networking.network_type.is_empty() {
        errs.push(FieldError::required(
            "networking.type",
            "network provider type required",
        ));
    }

    let machine = parse_network("networking.machineCIDR", &networking.machine_cidr, errs);
    let service = parse_network("networking.serviceCIDR", &networking.service_cidr, errs);

    if let (Some(machine), Some(service)) = (machine, service) {
        if machine.contains(service.network()) || service.contains(machine.network()) {
            errs.push(FieldError::invalid(
                "networking.serviceCIDR",
                &networking.service_cidr,
                "service network must not overlap with machine network",
            ));
        }
    }

    if let Some(net) = machine {
        parsed.push(("networking.machineCIDR", net));
    }
    if let Some(net) = service {
        parsed.push(("networking.serviceCIDR", net));
    }

    let cluster = &networking.cluster_network;
    if let Some(net) = parse_network("networking.clusterNetwork.cidr", &cluster.cidr, errs) {
        let max = if net.is_ipv4() { 32 } else { 128 };
        if cluster.host_prefix < net.prefix() || cluster.host_prefix > max {
            errs.push(FieldError::invalid(
                "networking.clusterNetwork.hostPrefix",
                cluster.host_prefix.to_string(),
                format!(
                    "cluster network prefix must not be larger than host prefix and host prefix must not exceed {}",
                    max
                ),
            ));
        }
        parsed.push(("networking.clusterNetwork.cidr", net));
    }

    ParsedNetworks(parsed)
}

fn validate_platform(platform: &PlatformConfig, networks: &ParsedNetworks, errs: &mut ValidationErrors) {
    match platform {
        PlatformConfig::Aws(aws) => {
            validate_aws(aws, errs);
            validate_metadata_service(networks, errs);
        }
        PlatformConfig::Openstack(os) => {
            validate_openstack(os, errs);
            validate_metadata_service(networks, errs);
        }
        PlatformConfig::Libvirt(libvirt) => validate_libvirt(libvirt, errs),
    }
}

fn validate_aws(aws: &AwsPlatform, errs: &mut ValidationErrors) {
    if aws.region.is_empty() {
        errs.push(FieldError::required(
            "platform.aws.region",
            "region must be specified",
        ));
    } else if !is_known_aws_region(&aws.region) {
        tracing::warn!(region = %aws.region, "Region has no default instance class, using fallback");
    }

    for key in aws.user_tags.keys() {
        if key.starts_with("kubernetes.io/cluster/") {
            errs.push(FieldError::invalid(
                format!("platform.aws.userTags[{}]", key),
                key,
                "tag key is reserved for the installer",
            ));
        }
    }
}

fn validate_openstack(os: &OpenStackPlatform, errs: &mut ValidationErrors) {
    if os.cloud.is_empty() {
        errs.push(FieldError::required(
            "platform.openstack.cloud",
            "cloud must be specified",
        ));
    }
    if os.region.is_empty() {
        errs.push(FieldError::required(
            "platform.openstack.region",
            "region must be specified",
        ));
    }
    if os.external_network.is_empty() {
        errs.push(FieldError::required(
            "platform.openstack.externalNetwork",
            "external network must be specified",
        ));
    }
}

fn validate_libvirt(libvirt: &LibvirtPlatform, errs: &mut ValidationErrors) {
    if libvirt.uri.is_empty() {
        errs.push(FieldError::required(
            "platform.libvirt.uri",
            "libvirt connection URI must be specified",
        ));
    }
}

fn validate_metadata_service(networks: &ParsedNetworks, errs: &mut ValidationErrors) {
    let reserved: IpAddr = match METADATA_SERVICE_ADDRESS.parse() {
        Ok(ip) => ip,
        Err(_) => return,
    };

    for (path, net) in &networks.0 {
        if net.contains(reserved) {
            errs.push(FieldError::invalid(
                *path,
                net.to_string(),
                format!(
                    "contains {} which is reserved for the metadata service",
                    METADATA_SERVICE_ADDRESS
                ),
            ));
        }
    }
}

fn validate_machine_pools(pools: &[MachinePool], errs: &mut ValidationErrors) {
    let mut seen = HashSet::new();

    for (i, pool) in pools.iter().enumerate() {
        let path = format!("machinePools[{}]", i);

        if !SUPPORTED_POOLS.contains(&pool.name.as_str()) {
            errs.push(FieldError::unsupported(
                format!("{}.name", path),
                &pool.name,
                &SUPPORTED_POOLS,
            ));
        }

        if !seen.insert(pool.name.as_str()) {
            errs.push(FieldError::duplicate(format!("{}.name", path), &pool.name));
        }

        if pool.name == MASTER_POOL && pool.replicas == Some(0) {
            errs.push(FieldError::invalid(
                format!("{}.replicas", path),
                "0",
                "number of master replicas must be positive",
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::platform::AwsPlatform;

    fn valid_config() -> ClusterConfig {
        ClusterConfig {
            name: "demo".to_string(),
            base_domain: "example.com".to_string(),
            cluster_id: None,
            platform: Some(PlatformConfig::Aws(AwsPlatform {
                region: "us-east-1".to_string(),
                ..Default::default()
            })),
            networking: Networking::default(),
            pull_secret: r#"{"auths":{"quay.io":{"auth":"Zm9vOmJhcg=="}}}"#.to_string(),
            ssh_key: None,
            machine_pools: vec![],
        }
    }

    fn only_error(config: &ClusterConfig) -> String {
        let errs = validate_cluster_config(config).unwrap_err();
        assert_eq!(errs.errors().len(), 1, "unexpected errors: {}", errs);
        errs.to_string()
    }

    #[test]
    fn test_valid_config() {
        assert!(validate_cluster_config(&valid_config()).is_ok());
    }

    #[test]
    fn test_cases() {
        let cases: Vec<(&str, Box<dyn Fn(&mut ClusterConfig)>, &str)> = vec![
            (
                "missing name",
                Box::new(|c: &mut ClusterConfig| c.name.clear()),
                "name: Required value: cluster name must be specified",
            ),
            (
                "upper case name",
                Box::new(|c: &mut ClusterConfig| c.name = "Demo".to_string()),
                r#"name: Invalid value: "Demo": must be a lower case DNS-1123 label"#,
            ),
            (
                "bad base domain",
                Box::new(|c: &mut ClusterConfig| c.base_domain = "example..com".to_string()),
                r#"baseDomain: Invalid value: "example..com": must be a lower case DNS-1123 subdomain"#,
            ),
            (
                "missing region",
                Box::new(|c: &mut ClusterConfig| {
                    c.platform = Some(PlatformConfig::Aws(AwsPlatform::default()));
                }),
                "platform.aws.region: Required value: region must be specified",
            ),
            (
                "missing platform",
                Box::new(|c: &mut ClusterConfig| c.platform = None),
                "platform: Required value: exactly one platform must be configured",
            ),
            (
                "pull secret without auths",
                Box::new(|c: &mut ClusterConfig| c.pull_secret = "{}".to_string()),
                r#"pullSecret: Invalid value: "<redacted>": auths required"#,
            ),
            (
                "machine network contains metadata service",
                Box::new(|c: &mut ClusterConfig| c.networking.machine_cidr = "169.254.0.0/16".to_string()),
                r#"networking.machineCIDR: Invalid value: "169.254.0.0/16": contains 169.254.169.254 which is reserved for the metadata service"#,
            ),
            (
                "host prefix too small",
                Box::new(|c: &mut ClusterConfig| c.networking.cluster_network.host_prefix = 8),
                "networking.clusterNetwork.hostPrefix: Invalid value: \"8\"",
            ),
            (
                "overlapping service network",
                Box::new(|c: &mut ClusterConfig| c.networking.service_cidr = "10.0.128.0/17".to_string()),
                "service network must not overlap with machine network",
            ),
            (
                "bad cluster id",
                Box::new(|c: &mut ClusterConfig| c.cluster_id = Some("not-a-uuid".to_string())),
                r#"clusterID: Invalid value: "not-a-uuid": must be a UUID"#,
            ),
        ];

        for (name, mutate, expected) in cases {
            let mut config = valid_config();
            mutate(&mut config);
            let message = only_error(&config);
            assert!(
                message.contains(expected),
                "{}: expected {:?} in {:?}",
                name,
                expected,
                message
            );
        }
    }

    #[test]
    fn test_machine_pool_errors() {
        let mut config = valid_config();
        config.machine_pools = vec![
            MachinePool {
                name: "master".to_string(),
                replicas: Some(0),
                platform: Default::default(),
            },
            MachinePool {
                name: "master".to_string(),
                replicas: Some(3),
                platform: Default::default(),
            },
            MachinePool {
                name: "infra".to_string(),
                replicas: None,
                platform: Default::default(),
            },
        ];

        let errs = validate_cluster_config(&config).unwrap_err();
        let message = errs.to_string();
        assert_eq!(errs.errors().len(), 3);
        assert!(message.starts_with('['));
        assert!(message.contains(
            r#"machinePools[0].replicas: Invalid value: "0": number of master replicas must be positive"#
        ));
        assert!(message.contains(r#"machinePools[1].name: Duplicate value: "master""#));
        assert!(message.contains(
            r#"machinePools[2].name: Unsupported value: "infra": supported values: "master", "worker""#
        ));
    }

    #[test]
    fn test_openstack_required_fields() {
        let mut config = valid_config();
        config.platform = Some(PlatformConfig::Openstack(OpenStackPlatform {
            cloud: String::new(),
            region: "regionOne".to_string(),
            external_network: String::new(),
            base_image: None,
            flavor_name: None,
            extra_tags: Default::default(),
        }));

        let errs = validate_cluster_config(&config).unwrap_err();
        let paths: Vec<_> = errs.errors().iter().map(|e| e.path.as_str()).collect();
        assert_eq!(
            paths,
            vec!["platform.openstack.cloud", "platform.openstack.externalNetwork"]
        );
    }
}
