//! Install error types

use std::path::Path;

use crate::infra::ExecutorError;
use crate::workflow::loader::LoadError;
use crate::workflow::validation::ValidationErrors;

/// Errors that can occur while running an install or destroy
#[derive(Debug, thiserror::Error)]
pub enum InstallError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{operation}: {source}")]
    Executor {
        operation: String,
        #[source]
        source: ExecutorError,
    },

    #[error("invalid cluster configuration: {0}")]
    Validation(#[from] ValidationErrors),

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error("template error: {0}")]
    Template(String),

    #[error("TLS error: {0}")]
    Tls(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl InstallError {
    /// Wrap an I/O failure with a description of what was being done
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Wrap a failed write of `path`
    pub fn write(path: &Path, source: std::io::Error) -> Self {
        Self::io(format!("failed to write {}", path.display()), source)
    }

    /// Wrap an executor failure with the operation name
    pub fn executor(operation: impl Into<String>, source: ExecutorError) -> Self {
        Self::Executor {
            operation: operation.into(),
            source,
        }
    }
}

impl From<handlebars::RenderError> for InstallError {
    fn from(e: handlebars::RenderError) -> Self {
        Self::Template(e.to_string())
    }
}

impl From<handlebars::TemplateError> for InstallError {
    fn from(e: handlebars::TemplateError) -> Self {
        Self::Template(e.to_string())
    }
}

impl From<rcgen::Error> for InstallError {
    fn from(e: rcgen::Error) -> Self {
        Self::Tls(e.to_string())
    }
}
