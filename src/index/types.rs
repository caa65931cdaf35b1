use crate::error::{Result, SifterError};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Position of a file in the path registry; bit `FileId` of every bitmap
pub type FileId = u32;

/// Bloom slot in `[0, m)`
pub type HashPosition = usize;

/// Newline-delimited path registry, one path per file ID
pub const PATH_REGISTRY_FILE: &str = "path.txt";

/// Build parameters and file count, written last by a successful build
pub const META_FILE: &str = "meta.json";

/// Current `meta.json` format version
pub const CACHE_VERSION: u32 = 1;

/// File name of the inverted bitmap for slot `h`
#[inline]
pub fn bitmap_file_name(h: HashPosition) -> String {
    format!("hash_{:05}.bin", h)
}

/// Parse a slot number back out of a bitmap file name
pub fn parse_bitmap_file_name(name: &str) -> Option<HashPosition> {
    name.strip_prefix("hash_")?
        .strip_suffix(".bin")?
        .parse()
        .ok()
}

/// File name of the transient per-file filter for `id`
#[inline]
pub fn staged_file_name(id: FileId) -> String {
    format!("{}.bin", id)
}

/// Bloom filter shape: `k` hash functions over `m` slots.
///
/// Caches carry no proof of the parameters they were built with beyond
/// `meta.json`; querying with different values silently produces garbage
/// for caches that lack it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BloomParams {
    pub k: u32,
    pub m: usize,
}

impl BloomParams {
    pub fn new(k: u32, m: usize) -> Result<Self> {
        if k == 0 {
            return Err(SifterError::InvalidParameters(
                "k must be at least 1".to_string(),
            ));
        }
        if m == 0 {
            return Err(SifterError::InvalidParameters(
                "m must be at least 1".to_string(),
            ));
        }
        Ok(Self { k, m })
    }
}

/// Contents of `meta.json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheMeta {
    pub version: u32,
    pub k: u32,
    pub m: usize,
    pub file_count: usize,
    pub created_at: u64,
}

impl CacheMeta {
    pub fn params(&self) -> BloomParams {
        BloomParams {
            k: self.k,
            m: self.m,
        }
    }
}

/// Summary of a completed build
#[derive(Debug, Clone)]
pub struct BuildStats {
    pub files_indexed: usize,
    pub bitmaps_written: usize,
    pub elapsed: Duration,
}

impl BuildStats {
    pub(crate) fn finish(files_indexed: usize, bitmaps_written: usize, started: Instant) -> Self {
        Self {
            files_indexed,
            bitmaps_written,
            elapsed: started.elapsed(),
        }
    }
}
