//! Executor variables
//!
//! Renders `terraform.tfvars` (JSON) from the cluster config. The output is
//! a pure function of the config, so regenerating it over an existing
//! cluster directory always produces the same bytes.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{json, Value};

use crate::engine::error::InstallError;
use crate::workflow::cluster_config::{ClusterConfig, MASTER_POOL, WORKER_POOL};
use crate::workflow::layout::ignition_file;
use crate::workflow::platform::PlatformConfig;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TerraformVariables {
    pub cluster_name: String,
    pub cluster_id: String,
    pub base_domain: String,
    pub cluster_domain: String,
    pub machine_cidr: String,
    pub master_count: u32,
    pub worker_count: u32,
    pub ignition_bootstrap: String,
    pub ignition_master: String,
    pub ignition_worker: String,
    pub bootstrap_load_balancer_targets: bool,

    /// Platform specific variables, prefixed with the platform name
    #[serde(flatten)]
    pub platform: BTreeMap<String, Value>,
}

impl TerraformVariables {
    pub fn from_config(config: &ClusterConfig) -> Result<Self, InstallError> {
        let cluster_id = config
            .cluster_id
            .clone()
            .ok_or_else(|| InstallError::Config("cluster id has not been assigned".to_string()))?;

        Ok(Self {
            cluster_name: config.name.clone(),
            cluster_id,
            base_domain: config.base_domain.clone(),
            cluster_domain: config.cluster_domain(),
            machine_cidr: config.networking.machine_cidr.clone(),
            master_count: config.replicas(MASTER_POOL),
            worker_count: config.replicas(WORKER_POOL),
            ignition_bootstrap: ignition_file("bootstrap"),
            ignition_master: ignition_file(MASTER_POOL),
            ignition_worker: ignition_file(WORKER_POOL),
            bootstrap_load_balancer_targets: true,
            platform: platform_variables(config)?,
        })
    }

    pub fn to_json(&self) -> Result<String, InstallError> {
        let mut out = serde_json::to_string_pretty(self)?;
        out.push('\n');
        Ok(out)
    }
}

fn platform_variables(config: &ClusterConfig) -> Result<BTreeMap<String, Value>, InstallError> {
    let platform = config
        .platform
        .as_ref()
        .ok_or_else(|| InstallError::Config("no platform configured".to_string()))?;

    let mut vars = BTreeMap::new();
    let master = config.machine_pool(MASTER_POOL);
    let worker = config.machine_pool(WORKER_POOL);

    match platform {
        PlatformConfig::Aws(aws) => {
            let mut tags: BTreeMap<String, String> = aws
                .user_tags
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            tags.insert(
                format!("kubernetes.io/cluster/{}", config.name),
                "owned".to_string(),
            );

            vars.insert("aws_region".to_string(), json!(aws.region));
            vars.insert(
                "aws_master_instance_type".to_string(),
                json!(aws.instance_type(master.and_then(|p| p.platform.aws.as_ref()))),
            );
            vars.insert(
                "aws_worker_instance_type".to_string(),
                json!(aws.instance_type(worker.and_then(|p| p.platform.aws.as_ref()))),
            );
            vars.insert("aws_extra_tags".to_string(), json!(tags));
        }
        PlatformConfig::Openstack(os) => {
            let tags: BTreeMap<_, _> = os.extra_tags.iter().collect();
            let flavor = master
                .and_then(|p| p.platform.openstack.as_ref())
                .and_then(|p| p.flavor_name.clone())
                .or_else(|| os.flavor_name.clone());

            vars.insert("openstack_cloud".to_string(), json!(os.cloud));
            vars.insert("openstack_region".to_string(), json!(os.region));
            vars.insert(
                "openstack_external_network".to_string(),
                json!(os.external_network),
            );
            vars.insert("openstack_base_image".to_string(), json!(os.base_image));
            vars.insert("openstack_master_flavor_name".to_string(), json!(flavor));
            vars.insert("openstack_extra_tags".to_string(), json!(tags));
        }
        PlatformConfig::Libvirt(libvirt) => {
            vars.insert("libvirt_uri".to_string(), json!(libvirt.uri));
            vars.insert(
                "libvirt_network_if".to_string(),
                json!(libvirt.network_interface),
            );
            vars.insert("libvirt_image".to_string(), json!(libvirt.image));
        }
    }

    Ok(vars)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aws_config() -> ClusterConfig {
        serde_yaml::from_str(
            r#"
name: demo
base_domain: example.com
cluster_id: 5f1c2c2e-3c1a-4c59-9d3e-5b0f8a0c9a11
platform:
  aws:
    region: eu-north-1
    user_tags:
      team: infra
machine_pools:
  - name: master
    replicas: 3
    platform:
      aws:
        instance_type: m5.2xlarge
  - name: worker
    replicas: 2
pull_secret: '{"auths":{}}'
"#,
        )
        .unwrap()
    }

    #[test]
    fn test_aws_variables() {
        let vars = TerraformVariables::from_config(&aws_config()).unwrap();
        let json: Value = serde_json::from_str(&vars.to_json().unwrap()).unwrap();

        assert_eq!(json["cluster_domain"], "demo.example.com");
        assert_eq!(json["master_count"], 3);
        assert_eq!(json["worker_count"], 2);
        assert_eq!(json["bootstrap_load_balancer_targets"], true);
        assert_eq!(json["ignition_bootstrap"], "bootstrap.ign");
        assert_eq!(json["aws_region"], "eu-north-1");
        assert_eq!(json["aws_master_instance_type"], "m5.2xlarge");
        assert_eq!(json["aws_worker_instance_type"], "m5.xlarge");
        assert_eq!(json["aws_extra_tags"]["team"], "infra");
        assert_eq!(json["aws_extra_tags"]["kubernetes.io/cluster/demo"], "owned");
    }

    #[test]
    fn test_output_is_stable() {
        let config = aws_config();
        let first = TerraformVariables::from_config(&config).unwrap().to_json().unwrap();
        let second = TerraformVariables::from_config(&config).unwrap().to_json().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_requires_cluster_id() {
        let mut config = aws_config();
        config.cluster_id = None;
        let err = TerraformVariables::from_config(&config).unwrap_err();
        assert!(err.to_string().contains("cluster id"));
    }
}
