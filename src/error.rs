//! Error types for cache build and query operations

use std::io;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum SifterError {
    #[error("I/O error on {}: {source}", .path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Traversal error: {0}")]
    Traversal(#[from] ignore::Error),

    #[error("Corrupt cache file {}: {reason}", .path.display())]
    Encoding { path: PathBuf, reason: String },

    #[error(
        "Parameter mismatch: cache was built with k={built_k}, m={built_m} but queried with k={k}, m={m}. Rebuild the cache or pass matching -k/-m."
    )]
    ConfigMismatch {
        built_k: u32,
        built_m: usize,
        k: u32,
        m: usize,
    },

    #[error("No cache found at {}. Run 'sifter build' first.", .0.display())]
    NotFound(PathBuf),

    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Build worker failed: {0}")]
    Worker(String),
}

impl SifterError {
    /// Wrap an I/O error with the path it happened on
    pub fn fs(path: impl AsRef<Path>, source: io::Error) -> Self {
        SifterError::Filesystem {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    pub fn encoding(path: impl AsRef<Path>, reason: impl Into<String>) -> Self {
        SifterError::Encoding {
            path: path.as_ref().to_path_buf(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, SifterError>;
