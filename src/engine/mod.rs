//! Install engine module
//!
//! This module contains:
//! - `step` - The `Step` trait
//! - `runner` - `Workflow`, which runs steps in order over one `Metadata`
//! - `steps` - The built-in config and executor steps
//! - `workflows` - The install and destroy pipelines
//! - `teardown` - Scoped destroy of the bootstrap resources
//! - `error` - Install error types

pub mod error;
pub mod runner;
pub mod step;
pub mod steps;
pub mod teardown;
pub mod workflows;

pub use error::InstallError;
pub use runner::Workflow;
pub use step::{FnStep, Step};
pub use teardown::{BootstrapTeardown, BOOTSTRAP_SETTLE_DELAY};
pub use workflows::{destroy_workflow, install_workflow};
