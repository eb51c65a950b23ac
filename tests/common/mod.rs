#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use cluster_installer::infra::{state_file_name, ExecutorError, ExecutorOutput, InfraExecutor};
use tempfile::TempDir;

pub const PLATFORMS: [&str; 2] = ["libvirt", "aws"];
pub const STEPS: [&str; 3] = ["assets", "infra", "bootstrap"];

pub fn create_test_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp directory")
}

pub fn libvirt_install_config(name: &str) -> String {
    format!(
        r#"
name: {}
base_domain: example.com
platform:
  libvirt:
    uri: qemu+tcp://192.168.122.1/system
networking:
  machine_cidr: 192.168.126.0/24
pull_secret: '{{"auths":{{"quay.io":{{"auth":"Zm9vOmJhcg=="}}}}}}'
ssh_key: ssh-ed25519 AAAA test
machine_pools:
  - name: master
    replicas: 1
  - name: worker
    replicas: 2
"#,
        name
    )
}

pub fn write_install_config(dir: &Path, content: &str) {
    fs::write(dir.join("install-config.yaml"), content).expect("Failed to write install config");
}

/// `metadata.json` recording `platform`, or no platform section at all
pub fn write_metadata(dir: &Path, platform: Option<&str>) {
    let section = match platform {
        Some("aws") => r#","aws":{"region":"us-east-1","identifier":[]}"#,
        Some("libvirt") => r#","libvirt":{"uri":"qemu:///system"}"#,
        Some(other) => panic!("unsupported fixture platform {}", other),
        None => "",
    };
    fs::write(
        dir.join("metadata.json"),
        format!(r#"{{"clusterName":"demo","clusterID":"abc"{}}}"#, section),
    )
    .expect("Failed to write metadata.json");
}

pub fn write_tfvars(dir: &Path) {
    fs::write(dir.join("terraform.tfvars"), r#"{"cluster_name":"demo"}"#)
        .expect("Failed to write terraform.tfvars");
}

pub fn write_state(dir: &Path, step: &str, contents: &str) -> PathBuf {
    let path = dir.join(state_file_name(step));
    fs::write(&path, contents).expect("Failed to write state file");
    path
}

/// `<root>/<step>/<platform>` for every step and platform
pub fn create_templates(root: &Path) -> PathBuf {
    let templates = root.join("templates");
    for step in STEPS {
        for platform in PLATFORMS {
            fs::create_dir_all(templates.join(step).join(platform))
                .expect("Failed to create template dir");
        }
    }
    templates
}

/// Files directly inside `dir`
pub fn entries(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .expect("Failed to read dir")
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    names.sort();
    names
}

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Init {
        work_dir: PathBuf,
        template_dir: PathBuf,
    },
    Apply {
        work_dir: PathBuf,
        step: String,
        extra_args: Vec<String>,
    },
    Destroy {
        work_dir: PathBuf,
        step: String,
        extra_args: Vec<String>,
    },
}

impl Call {
    pub fn verb(&self) -> &'static str {
        match self {
            Call::Init { .. } => "init",
            Call::Apply { .. } => "apply",
            Call::Destroy { .. } => "destroy",
        }
    }

    pub fn step(&self) -> Option<&str> {
        match self {
            Call::Init { .. } => None,
            Call::Apply { step, .. } | Call::Destroy { step, .. } => Some(step),
        }
    }

    pub fn work_dir(&self) -> &Path {
        match self {
            Call::Init { work_dir, .. }
            | Call::Apply { work_dir, .. }
            | Call::Destroy { work_dir, .. } => work_dir,
        }
    }
}

/// Records every call. `apply` and `destroy` write `<step>.tfstate` in the
/// working directory the way the real executor would.
#[derive(Default)]
pub struct FakeExecutor {
    calls: Mutex<Vec<Call>>,
    fail_on: Mutex<Option<(String, String)>>,
}

impl FakeExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the first `verb` call for `step`
    pub fn failing(verb: &str, step: &str) -> Self {
        let executor = Self::default();
        *executor.fail_on.lock().unwrap() = Some((verb.to_string(), step.to_string()));
        executor
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// `"<verb> <step>"` for every apply and destroy, in order
    pub fn summary(&self) -> Vec<String> {
        self.calls()
            .iter()
            .filter_map(|c| c.step().map(|s| format!("{} {}", c.verb(), s)))
            .collect()
    }

    fn should_fail(&self, verb: &str, step: &str) -> bool {
        let mut fail_on = self.fail_on.lock().unwrap();
        match fail_on.as_ref() {
            Some((v, s)) if v == verb && s == step => {
                *fail_on = None;
                true
            }
            _ => false,
        }
    }

    fn failure(verb: &str) -> ExecutorError {
        ExecutorError::CommandFailed {
            verb: format!("terraform {}", verb),
            code: 1,
            stderr: "injected failure".to_string(),
        }
    }
}

#[async_trait]
impl InfraExecutor for FakeExecutor {
    async fn init(&self, work_dir: &Path, template_dir: &Path) -> Result<(), ExecutorError> {
        self.calls.lock().unwrap().push(Call::Init {
            work_dir: work_dir.to_path_buf(),
            template_dir: template_dir.to_path_buf(),
        });
        if !template_dir.is_dir() {
            return Err(ExecutorError::MissingTemplates(template_dir.to_path_buf()));
        }
        Ok(())
    }

    async fn apply(
        &self,
        work_dir: &Path,
        step: &str,
        _template_dir: &Path,
        extra_args: &[String],
    ) -> Result<ExecutorOutput, ExecutorError> {
        self.calls.lock().unwrap().push(Call::Apply {
            work_dir: work_dir.to_path_buf(),
            step: step.to_string(),
            extra_args: extra_args.to_vec(),
        });
        if self.should_fail("apply", step) {
            return Err(Self::failure("apply"));
        }
        fs::write(work_dir.join(state_file_name(step)), format!("applied {}", step))
            .expect("Failed to write fake state");
        Ok(ExecutorOutput::default())
    }

    async fn destroy(
        &self,
        work_dir: &Path,
        step: &str,
        _template_dir: &Path,
        extra_args: &[String],
    ) -> Result<ExecutorOutput, ExecutorError> {
        self.calls.lock().unwrap().push(Call::Destroy {
            work_dir: work_dir.to_path_buf(),
            step: step.to_string(),
            extra_args: extra_args.to_vec(),
        });
        if self.should_fail("destroy", step) {
            return Err(Self::failure("destroy"));
        }
        fs::write(work_dir.join(state_file_name(step)), format!("destroyed {}", step))
            .expect("Failed to write fake state");
        Ok(ExecutorOutput::default())
    }
}
