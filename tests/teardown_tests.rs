mod common;

use std::fs;
use std::sync::Arc;
use std::time::Duration;

use cluster_installer::engine::{BootstrapTeardown, InstallError};
use common::*;
use tempfile::TempDir;

const OVERRIDE_FILE: &str = "disable-bootstrap-load-balancer-targets.tfvars";

struct Fixture {
    _root: TempDir,
    cluster: std::path::PathBuf,
    temp_root: std::path::PathBuf,
    templates: std::path::PathBuf,
}

impl Fixture {
    fn new() -> Self {
        let root = create_test_dir();
        let cluster = root.path().join("cluster");
        let temp_root = root.path().join("tmp");
        fs::create_dir(&cluster).unwrap();
        fs::create_dir(&temp_root).unwrap();
        let templates = create_templates(root.path());
        Self {
            _root: root,
            cluster,
            temp_root,
            templates,
        }
    }

    /// A cluster directory as left behind by a finished install
    fn installed(platform: &str) -> Self {
        let fixture = Self::new();
        write_metadata(&fixture.cluster, Some(platform));
        write_tfvars(&fixture.cluster);
        write_state(&fixture.cluster, "bootstrap", "original state");
        fixture
    }

    fn teardown(&self, executor: Arc<FakeExecutor>) -> BootstrapTeardown {
        BootstrapTeardown::new(executor, &self.templates)
            .with_settle_delay(Duration::ZERO)
            .with_temp_root(&self.temp_root)
    }

    fn state(&self) -> String {
        fs::read_to_string(self.cluster.join("bootstrap.tfstate")).unwrap()
    }
}

#[tokio::test]
async fn test_success_replaces_state() {
    let fixture = Fixture::installed("aws");
    let executor = Arc::new(FakeExecutor::new());

    fixture
        .teardown(executor.clone())
        .destroy(&fixture.cluster)
        .await
        .unwrap();

    assert_eq!(fixture.state(), "destroyed bootstrap");
    assert!(!fixture.cluster.join("bootstrap.tfstate.new").exists());
    assert!(entries(&fixture.temp_root).is_empty());
    assert_eq!(
        entries(&fixture.cluster),
        vec![
            "bootstrap.tfstate",
            OVERRIDE_FILE,
            "metadata.json",
            "terraform.tfvars",
        ]
    );
}

#[tokio::test]
async fn test_executor_call_sequence() {
    let fixture = Fixture::installed("libvirt");
    let executor = Arc::new(FakeExecutor::new());

    fixture
        .teardown(executor.clone())
        .destroy(&fixture.cluster)
        .await
        .unwrap();

    let calls = executor.calls();
    assert_eq!(calls.len(), 3);

    let workspace = calls[0].work_dir().to_path_buf();
    assert!(workspace.starts_with(&fixture.temp_root));
    assert!(!workspace.exists());

    match &calls[0] {
        Call::Init { template_dir, .. } => {
            assert_eq!(template_dir, &fixture.templates.join("bootstrap").join("libvirt"))
        }
        other => panic!("expected init, got {:?}", other),
    }
    match &calls[1] {
        Call::Apply {
            work_dir,
            step,
            extra_args,
        } => {
            assert_eq!(work_dir, &workspace);
            assert_eq!(step, "bootstrap");
            assert_eq!(
                extra_args,
                &vec![format!("-var-file={}", workspace.join(OVERRIDE_FILE).display())]
            );
        }
        other => panic!("expected apply, got {:?}", other),
    }
    match &calls[2] {
        Call::Destroy {
            work_dir,
            extra_args,
            ..
        } => {
            assert_eq!(work_dir, &workspace);
            assert_eq!(extra_args, &vec!["-target=module.bootstrap".to_string()]);
        }
        other => panic!("expected destroy, got {:?}", other),
    }
}

#[tokio::test]
async fn test_override_file_contents() {
    let fixture = Fixture::installed("aws");
    fixture
        .teardown(Arc::new(FakeExecutor::new()))
        .destroy(&fixture.cluster)
        .await
        .unwrap();

    let contents = fs::read_to_string(fixture.cluster.join(OVERRIDE_FILE)).unwrap();
    let value: serde_json::Value = serde_json::from_str(&contents).unwrap();
    assert_eq!(value, serde_json::json!({ "bootstrap_load_balancer_targets": false }));
}

#[tokio::test]
async fn test_destroy_failure_keeps_state() {
    let fixture = Fixture::installed("aws");
    let before = fs::read(fixture.cluster.join("bootstrap.tfstate")).unwrap();
    let executor = Arc::new(FakeExecutor::failing("destroy", "bootstrap"));

    let err = fixture
        .teardown(executor.clone())
        .destroy(&fixture.cluster)
        .await
        .unwrap_err();

    assert!(err.to_string().starts_with("Terraform destroy: "), "{}", err);
    assert_eq!(fs::read(fixture.cluster.join("bootstrap.tfstate")).unwrap(), before);
    assert!(!fixture.cluster.join("bootstrap.tfstate.new").exists());
    assert!(entries(&fixture.temp_root).is_empty());
}

#[tokio::test]
async fn test_apply_failure_skips_destroy() {
    let fixture = Fixture::installed("aws");
    let executor = Arc::new(FakeExecutor::failing("apply", "bootstrap"));

    let err = fixture
        .teardown(executor.clone())
        .destroy(&fixture.cluster)
        .await
        .unwrap_err();

    assert!(err.to_string().starts_with("Terraform apply: "), "{}", err);
    assert_eq!(executor.summary(), vec!["apply bootstrap"]);
    assert_eq!(fixture.state(), "original state");
    assert!(entries(&fixture.temp_root).is_empty());
}

#[tokio::test]
async fn test_empty_platform_writes_nothing() {
    let fixture = Fixture::new();
    write_metadata(&fixture.cluster, None);
    write_tfvars(&fixture.cluster);
    write_state(&fixture.cluster, "bootstrap", "original state");
    let before = entries(&fixture.cluster);
    let executor = Arc::new(FakeExecutor::new());

    let err = fixture
        .teardown(executor.clone())
        .destroy(&fixture.cluster)
        .await
        .unwrap_err();

    assert!(matches!(err, InstallError::Config(_)));
    assert!(err.to_string().contains("no platform configured in metadata"));
    assert_eq!(entries(&fixture.cluster), before);
    assert!(entries(&fixture.temp_root).is_empty());
    assert!(executor.calls().is_empty());
}

#[tokio::test]
async fn test_copy_failure_names_file() {
    for missing in ["bootstrap.tfstate", "terraform.tfvars"] {
        let fixture = Fixture::installed("aws");
        fs::remove_file(fixture.cluster.join(missing)).unwrap();
        let executor = Arc::new(FakeExecutor::new());

        let err = fixture
            .teardown(executor.clone())
            .destroy(&fixture.cluster)
            .await
            .unwrap_err();

        let message = err.to_string();
        assert!(
            message.contains(&format!("failed to copy {} to the temporary directory", missing)),
            "{}",
            message
        );
        assert!(executor.calls().is_empty());
        assert!(entries(&fixture.temp_root).is_empty());
    }
}

#[tokio::test]
async fn test_missing_templates_is_init_error() {
    let fixture = Fixture::installed("aws");
    fs::remove_dir_all(fixture.templates.join("bootstrap").join("aws")).unwrap();
    let executor = Arc::new(FakeExecutor::new());

    let err = fixture
        .teardown(executor.clone())
        .destroy(&fixture.cluster)
        .await
        .unwrap_err();

    assert!(err.to_string().starts_with("Terraform init: "), "{}", err);
    assert!(executor.calls().is_empty());
    assert_eq!(fixture.state(), "original state");
}

#[tokio::test(start_paused = true)]
async fn test_settle_delay_between_apply_and_destroy() {
    let fixture = Fixture::installed("aws");
    let started = tokio::time::Instant::now();

    BootstrapTeardown::new(Arc::new(FakeExecutor::new()), &fixture.templates)
        .with_temp_root(&fixture.temp_root)
        .destroy(&fixture.cluster)
        .await
        .unwrap();

    assert!(started.elapsed() >= cluster_installer::engine::BOOTSTRAP_SETTLE_DELAY);
}
