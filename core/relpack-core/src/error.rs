//! Error taxonomy for the relpack pipeline

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

pub type Result<T, E = PackError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum PackError {
    /// Bad arguments, malformed config, unknown platform. Raised before any side effects.
    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to walk directory tree: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("invalid JSON in {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// An external minifier, installer or packager failed to start or exited non-zero.
    #[error("{tool} failed: {detail}")]
    Tool { tool: String, detail: String },

    #[error("malformed version {0:?}: expected major.minor.patch")]
    Format(String),
}

impl PackError {
    pub fn config(msg: impl Into<String>) -> Self {
        PackError::Config(msg.into())
    }

    pub fn tool(tool: impl Into<String>, detail: impl Into<String>) -> Self {
        PackError::Tool {
            tool: tool.into(),
            detail: detail.into(),
        }
    }

    pub fn is_config(&self) -> bool {
        matches!(self, PackError::Config(_) | PackError::Json { .. })
    }
}

/// Attach the offending path to an `io::Error`.
pub(crate) trait IoContext<T> {
    fn at(self, path: &Path) -> Result<T>;
}

impl<T> IoContext<T> for std::result::Result<T, io::Error> {
    fn at(self, path: &Path) -> Result<T> {
        self.map_err(|source| PackError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}
