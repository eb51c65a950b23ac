//! The install and destroy pipelines

use std::sync::Arc;

use crate::engine::runner::Workflow;
use crate::engine::steps::{
    DestroyStep, GenerateClusterConfigMapsStep, GenerateIgnitionConfigStep,
    GenerateTerraformVariablesStep, GenerateTlsConfigStep, InstallStep, ReadClusterConfigStep,
    WriteClusterMetadataStep,
};
use crate::infra::InfraExecutor;
use crate::workflow::layout::{ASSETS_STEP, BOOTSTRAP_STEP, INFRA_STEP};
use crate::workflow::Metadata;

/// Generate every install artifact, then apply the assets, infra and
/// bootstrap steps. Bootstrap is skipped when its state already exists.
pub fn install_workflow(metadata: Metadata, executor: Arc<dyn InfraExecutor>) -> Workflow {
    Workflow::new("install", metadata)
        .step(ReadClusterConfigStep)
        .step(GenerateTerraformVariablesStep)
        .step(GenerateTlsConfigStep)
        .step(GenerateClusterConfigMapsStep)
        .step(GenerateIgnitionConfigStep)
        .step(WriteClusterMetadataStep)
        .step(InstallStep::new(ASSETS_STEP, executor.clone()))
        .step(InstallStep::new(INFRA_STEP, executor.clone()))
        .step(InstallStep::new(BOOTSTRAP_STEP, executor).skip_if_applied())
}

/// Destroy every applied step in reverse install order
pub fn destroy_workflow(metadata: Metadata, executor: Arc<dyn InfraExecutor>) -> Workflow {
    Workflow::new("destroy", metadata)
        .step(ReadClusterConfigStep)
        .step(GenerateTerraformVariablesStep)
        .step(DestroyStep::new(BOOTSTRAP_STEP, executor.clone()))
        .step(DestroyStep::new(INFRA_STEP, executor.clone()))
        .step(DestroyStep::new(ASSETS_STEP, executor))
}
