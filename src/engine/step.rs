//! Step trait
//!
//! A step is one named unit of the install pipeline. Steps keep no state of
//! their own between runs; everything they produce lives in [`Metadata`] or
//! on disk under the cluster directory.

use async_trait::async_trait;

use crate::engine::error::InstallError;
use crate::workflow::Metadata;

#[async_trait]
pub trait Step: Send + Sync {
    /// Name used in logs and progress output
    fn name(&self) -> &str;

    /// Run the step against the shared install metadata
    async fn run(&self, metadata: &mut Metadata) -> Result<(), InstallError>;
}

/// Step backed by a plain function, for small steps and tests
pub struct FnStep<F> {
    name: String,
    f: F,
}

impl<F> FnStep<F>
where
    F: Fn(&mut Metadata) -> Result<(), InstallError> + Send + Sync,
{
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }
}

#[async_trait]
impl<F> Step for FnStep<F>
where
    F: Fn(&mut Metadata) -> Result<(), InstallError> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, metadata: &mut Metadata) -> Result<(), InstallError> {
        (self.f)(metadata)
    }
}
