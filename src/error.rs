//! Fatal error taxonomy.
//!
//! Provider and quality failures never surface here; they degrade to a
//! not-found resolution. Only configuration, catalog, and filesystem
//! persistence failures abort a run.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum CoverError {
    /// A file could not be read.
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A file or directory could not be written, renamed, or removed.
    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The config file is not valid TOML for the config model.
    #[error("Invalid config file {path}: {source}")]
    Config {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// The catalog file is not valid JSON.
    #[error("Invalid catalog file {path}: {source}")]
    CatalogParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The catalog JSON does not have the expected partition shape.
    #[error("Unexpected catalog shape: {0}")]
    CatalogShape(String),

    /// The catalog could not be serialized.
    #[error("Failed to serialize catalog: {0}")]
    CatalogSerialize(#[source] serde_json::Error),
}

impl CoverError {
    pub fn write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Write {
            path: path.into(),
            source,
        }
    }

    pub fn read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Read {
            path: path.into(),
            source,
        }
    }
}
