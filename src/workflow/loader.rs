//! Loading of YAML and JSON documents from the cluster directory

use std::path::Path;

use serde::de::DeserializeOwned;

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("failed to read {file}: {source}")]
    Io {
        file: String,
        #[source]
        source: std::io::Error,
    },

    #[error("YAML parse error in {file}: {error}")]
    Yaml {
        file: String,
        error: serde_yaml::Error,
    },

    #[error("JSON parse error in {file}: {error}")]
    Json {
        file: String,
        error: serde_json::Error,
    },
}

impl LoadError {
    /// True when the document simply does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, LoadError::Io { source, .. } if source.kind() == std::io::ErrorKind::NotFound)
    }
}

fn read(path: &Path) -> Result<String, LoadError> {
    std::fs::read_to_string(path).map_err(|e| LoadError::Io {
        file: path.display().to_string(),
        source: e,
    })
}

pub fn load_yaml<T: DeserializeOwned>(path: &Path) -> Result<T, LoadError> {
    let content = read(path)?;
    serde_yaml::from_str(&content).map_err(|e| LoadError::Yaml {
        file: path.display().to_string(),
        error: e,
    })
}

pub fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T, LoadError> {
    let content = read(path)?;
    serde_json::from_str(&content).map_err(|e| LoadError::Json {
        file: path.display().to_string(),
        error: e,
    })
}
