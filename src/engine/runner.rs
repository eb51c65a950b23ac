//! Workflow - an ordered list of steps bound to one install metadata
//!
//! Steps run strictly in declaration order with exclusive access to the
//! metadata. The first failing step ends the run: its error is returned
//! unchanged, later steps are never started and earlier steps are not
//! rolled back. Whatever earlier steps wrote stays on disk, so every step
//! must be safe to run again over the same cluster directory.

use tracing::{info, instrument};

use crate::engine::error::InstallError;
use crate::engine::step::Step;
use crate::workflow::Metadata;

pub struct Workflow {
    name: String,
    metadata: Metadata,
    steps: Vec<Box<dyn Step>>,
}

impl Workflow {
    pub fn new(name: impl Into<String>, metadata: Metadata) -> Self {
        Self {
            name: name.into(),
            metadata,
            steps: Vec::new(),
        }
    }

    /// Append a step
    pub fn step(mut self, step: impl Step + 'static) -> Self {
        self.steps.push(Box::new(step));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn into_metadata(self) -> Metadata {
        self.metadata
    }

    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.name()).collect()
    }

    /// Run every step in order, stopping at the first error. Each run starts
    /// from a fresh metadata record for the same cluster directory.
    #[instrument(skip(self), fields(workflow = %self.name, cluster_dir = %self.metadata.cluster_dir().display()))]
    pub async fn run(&mut self) -> Result<(), InstallError> {
        self.metadata.ensure_cluster_dir()?;
        self.metadata.reset();

        let total = self.steps.len();
        info!(steps = total, "Starting workflow");

        for (i, step) in self.steps.iter().enumerate() {
            info!(step = step.name(), "Running step {}/{}", i + 1, total);
            step.run(&mut self.metadata).await?;
        }

        info!("Workflow completed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::step::FnStep;
    use std::sync::{Arc, Mutex};
    use tempfile::tempdir;

    fn recording_step(
        name: &'static str,
        log: Arc<Mutex<Vec<&'static str>>>,
        fail: bool,
    ) -> FnStep<impl Fn(&mut Metadata) -> Result<(), InstallError> + Send + Sync> {
        FnStep::new(name, move |_m: &mut Metadata| {
            log.lock().unwrap().push(name);
            if fail {
                Err(InstallError::Config(format!("{} failed", name)))
            } else {
                Ok(())
            }
        })
    }

    #[tokio::test]
    async fn test_steps_run_in_order() {
        let dir = tempdir().unwrap();
        let log = Arc::new(Mutex::new(Vec::new()));

        let mut workflow = Workflow::new("test", Metadata::new(dir.path(), dir.path()))
            .step(recording_step("first", log.clone(), false))
            .step(recording_step("second", log.clone(), false))
            .step(recording_step("third", log.clone(), false));

        assert_eq!(workflow.step_names(), vec!["first", "second", "third"]);
        workflow.run().await.unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn test_only_prefix_runs_after_failure() {
        let dir = tempdir().unwrap();

        for failing in 0..4 {
            let log = Arc::new(Mutex::new(Vec::new()));
            let names = ["a", "b", "c", "d"];
            let mut workflow = Workflow::new("prefix", Metadata::new(dir.path(), dir.path()));
            for (i, name) in names.iter().enumerate() {
                workflow = workflow.step(recording_step(*name, log.clone(), i == failing));
            }

            let err = workflow.run().await.unwrap_err();
            assert_eq!(
                err.to_string(),
                format!("configuration error: {} failed", names[failing])
            );
            assert_eq!(*log.lock().unwrap(), names[..=failing].to_vec());
        }
    }

    #[tokio::test]
    async fn test_missing_cluster_dir_runs_nothing() {
        let dir = tempdir().unwrap();
        let log = Arc::new(Mutex::new(Vec::new()));

        let mut workflow = Workflow::new(
            "missing",
            Metadata::new(dir.path().join("absent"), dir.path()),
        )
        .step(recording_step("only", log.clone(), false));

        let err = workflow.run().await.unwrap_err();
        assert!(matches!(err, InstallError::Config(_)));
        assert!(log.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_steps_share_metadata() {
        let dir = tempdir().unwrap();

        let mut workflow = Workflow::new("shared", Metadata::new(dir.path(), dir.path()))
            .step(FnStep::new("produce", |m: &mut Metadata| {
                m.tls_dir = Some(m.path("tls"));
                Ok(())
            }))
            .step(FnStep::new("consume", |m: &mut Metadata| {
                m.tls_dir
                    .as_ref()
                    .map(|_| ())
                    .ok_or_else(|| InstallError::Config("tls dir missing".to_string()))
            }));

        workflow.run().await.unwrap();
        assert_eq!(
            workflow.into_metadata().tls_dir,
            Some(dir.path().join("tls"))
        );
    }

    #[tokio::test]
    async fn test_second_run_reloads_config() {
        let dir = tempdir().unwrap();
        let loads = Arc::new(Mutex::new(0));
        let counter = loads.clone();

        let mut workflow = Workflow::new("twice", Metadata::new(dir.path(), dir.path())).step(
            FnStep::new("load", move |m: &mut Metadata| {
                *counter.lock().unwrap() += 1;
                assert!(m.tls_dir.is_none());
                m.tls_dir = Some(m.path("tls"));
                m.set_cluster(serde_yaml::from_str("name: demo\n").unwrap())
            }),
        );

        workflow.run().await.unwrap();
        workflow.run().await.unwrap();
        assert_eq!(*loads.lock().unwrap(), 2);
        assert_eq!(workflow.metadata().cluster().unwrap().name, "demo");
    }
}
