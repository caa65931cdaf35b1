//! High-level entry point tying configuration, build and query together.

use crate::error::Result;
use crate::index::build::build_cache;
use crate::index::reader::CacheReader;
use crate::index::types::{BloomParams, BuildStats};
use crate::query::selector::{hash_positions, select_candidates};
use crate::utils::config::SifterConfig;
use crate::utils::hash::{PreparedHashes, TokenHasher};
use roaring::RoaringBitmap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Builds caches and answers candidate queries with one set of parameters
pub struct Sifter {
    config: SifterConfig,
    hasher: TokenHasher,
    show_progress: bool,
}

impl Sifter {
    /// Sifter with default pipeline settings and the given bloom shape
    pub fn new(params: BloomParams) -> Self {
        Self {
            config: SifterConfig::with_params(params.k, params.m),
            hasher: TokenHasher::new(params),
            show_progress: false,
        }
    }

    /// Sifter from a full config, loading its prepared hash table if set
    pub fn from_config(config: SifterConfig) -> Result<Self> {
        config.validate()?;
        let mut hasher = TokenHasher::new(config.params()?);
        if let Some(ref path) = config.prepared_hashes {
            let prepared = PreparedHashes::load(path)?;
            info!(path = %path.display(), tokens = prepared.len(), "loaded prepared hashes");
            hasher = hasher.with_prepared(Arc::new(prepared));
        }
        Ok(Self {
            config,
            hasher,
            show_progress: false,
        })
    }

    pub fn with_prepared(mut self, prepared: Arc<PreparedHashes>) -> Self {
        self.hasher = self.hasher.with_prepared(prepared);
        self
    }

    /// Draw progress bars on stderr during builds
    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    pub fn config(&self) -> &SifterConfig {
        &self.config
    }

    pub fn params(&self) -> BloomParams {
        self.hasher.params()
    }

    /// Index every file under `base` into `cache`, replacing any earlier cache
    pub fn build(&self, base: &Path, cache: &Path) -> Result<BuildStats> {
        build_cache(base, cache, &self.config, &self.hasher, self.show_progress)
    }

    /// Open `cache` and check it was built with this sifter's parameters
    pub fn open(&self, cache: &Path) -> Result<CacheReader> {
        let reader = CacheReader::open(cache)?;
        reader.check_params(self.params())?;
        Ok(reader)
    }

    /// Candidate file IDs for `pattern` in an open cache.
    ///
    /// An empty pattern matches every file.
    pub fn select(&self, pattern: &[u8], reader: &CacheReader) -> Result<RoaringBitmap> {
        let file_count = reader.paths().len() as u32;
        if pattern.is_empty() {
            return Ok((0..file_count).collect());
        }

        let positions = hash_positions(pattern, &self.hasher);
        select_candidates(reader, &positions)
    }

    /// Paths of files that may contain `pattern`, in file-ID order.
    ///
    /// Never omits a file that contains the pattern on a single line; may
    /// include files that do not.
    pub fn query(&self, pattern: impl AsRef<[u8]>, cache: &Path) -> Result<Vec<String>> {
        let pattern = pattern.as_ref();
        let reader = self.open(cache)?;
        let candidates = self.select(pattern, &reader)?;

        let paths: Vec<String> = candidates
            .iter()
            .filter_map(|id| reader.path(id).map(str::to_string))
            .collect();

        debug!(
            pattern = %String::from_utf8_lossy(pattern),
            candidates = paths.len(),
            "query complete"
        );
        Ok(paths)
    }
}
