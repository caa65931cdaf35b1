use crate::error::{Result, SifterError};
use crate::index::types::BloomParams;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Build and query configuration.
///
/// `k` and `m` must be the same for the build that produced a cache and
/// every query against it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SifterConfig {
    /// Hash functions per token
    #[serde(default = "default_k")]
    pub k: u32,

    /// Bloom slots per file (one inverted bitmap per slot)
    #[serde(default = "default_m")]
    pub m: usize,

    /// Capacity of the queue between file workers and serializers
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Number of concurrent filter serializers
    #[serde(default = "default_serialize_workers")]
    pub serialize_workers: usize,

    /// Optional precomputed token table (see `sifter prepare`)
    #[serde(default)]
    pub prepared_hashes: Option<PathBuf>,
}

fn default_k() -> u32 {
    3
}

fn default_m() -> usize {
    500
}

fn default_queue_capacity() -> usize {
    5000
}

fn default_serialize_workers() -> usize {
    20
}

impl Default for SifterConfig {
    fn default() -> Self {
        Self {
            k: default_k(),
            m: default_m(),
            queue_capacity: default_queue_capacity(),
            serialize_workers: default_serialize_workers(),
            prepared_hashes: None,
        }
    }
}

impl SifterConfig {
    /// Config with the given bloom shape and default pipeline settings
    pub fn with_params(k: u32, m: usize) -> Self {
        Self {
            k,
            m,
            ..Self::default()
        }
    }

    /// Load config from a JSON file; missing fields take their defaults
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| SifterError::fs(path, e))?;
        let config: SifterConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save config as pretty JSON
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content).map_err(|e| SifterError::fs(path, e))
    }

    pub fn params(&self) -> Result<BloomParams> {
        BloomParams::new(self.k, self.m)
    }

    pub fn validate(&self) -> Result<()> {
        self.params()?;
        if self.queue_capacity == 0 {
            return Err(SifterError::InvalidParameters(
                "queue_capacity must be at least 1".to_string(),
            ));
        }
        if self.serialize_workers == 0 {
            return Err(SifterError::InvalidParameters(
                "serialize_workers must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
