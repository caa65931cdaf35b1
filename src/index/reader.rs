use crate::error::{Result, SifterError};
use crate::index::types::*;
use crate::utils::bits::{bit_at, packed_len};
use memmap2::Mmap;
use roaring::RoaringBitmap;
use std::fs::{self, File};
use std::ops::Deref;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Anything that can hand out inverted bitmaps by slot.
///
/// The candidate selector only sees this trait, so tests can count or
/// fake bitmap loads.
pub trait BitmapSource {
    /// Number of files `N` covered by every bitmap
    fn file_count(&self) -> usize;

    /// Load the bitmap for slot `h`
    fn load_bitmap(&self, h: HashPosition) -> Result<Bitmap>;
}

enum BitmapBytes {
    Mapped(Mmap),
    Owned(Vec<u8>),
}

impl Deref for BitmapBytes {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match self {
            BitmapBytes::Mapped(m) => &m[..],
            BitmapBytes::Owned(v) => &v[..],
        }
    }
}

/// One inverted bitmap: bit `j` set means file `j` may hold the slot
pub struct Bitmap {
    bytes: BitmapBytes,
    file_count: usize,
}

impl Bitmap {
    /// Wrap packed bytes covering `file_count` files
    pub fn from_bytes(bytes: Vec<u8>, file_count: usize) -> Self {
        Self {
            bytes: BitmapBytes::Owned(bytes),
            file_count,
        }
    }

    /// Memory-map a bitmap file, checking its length is `floor(N/8)+1`
    pub fn open(path: &Path, file_count: usize) -> Result<Self> {
        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(SifterError::encoding(path, "bitmap missing from cache"));
            }
            Err(e) => return Err(SifterError::fs(path, e)),
        };

        let len = file.metadata().map_err(|e| SifterError::fs(path, e))?.len();
        let expected = packed_len(file_count) as u64;
        if len != expected {
            return Err(SifterError::encoding(
                path,
                format!(
                    "expected {} bytes for {} files, found {}",
                    expected, file_count, len
                ),
            ));
        }

        // Length checked above, never zero
        let mmap = unsafe { Mmap::map(&file).map_err(|e| SifterError::fs(path, e))? };
        Ok(Self {
            bytes: BitmapBytes::Mapped(mmap),
            file_count,
        })
    }

    /// Whether file `id` has this slot set
    #[inline]
    pub fn contains(&self, id: FileId) -> bool {
        (id as usize) < self.file_count && bit_at(&self.bytes, id as usize)
    }

    /// All files with this slot set, ascending
    pub fn to_roaring(&self) -> RoaringBitmap {
        RoaringBitmap::from_sorted_iter(
            (0..self.file_count as FileId).filter(|&id| self.contains(id)),
        )
        .unwrap_or_default()
    }

    pub fn file_count(&self) -> usize {
        self.file_count
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// Read-only view of a built cache directory
pub struct CacheReader {
    cache_path: PathBuf,
    meta: Option<CacheMeta>,
    paths: Vec<String>,
}

impl CacheReader {
    /// Open a cache directory, reading the path registry and `meta.json`.
    ///
    /// Caches without `meta.json` (written by older tools) open fine but
    /// cannot be checked against query parameters.
    pub fn open(cache_path: &Path) -> Result<Self> {
        if !cache_path.is_dir() {
            return Err(SifterError::NotFound(cache_path.to_path_buf()));
        }

        let paths = read_path_registry(cache_path)?;
        let meta = read_meta(cache_path)?;

        if let Some(ref meta) = meta {
            if meta.file_count != paths.len() {
                return Err(SifterError::encoding(
                    cache_path.join(META_FILE),
                    format!(
                        "meta.json records {} files but {} lists {}",
                        meta.file_count,
                        PATH_REGISTRY_FILE,
                        paths.len()
                    ),
                ));
            }
        } else {
            warn!(cache = %cache_path.display(), "cache has no meta.json; parameters cannot be verified");
        }

        Ok(Self {
            cache_path: cache_path.to_path_buf(),
            meta,
            paths,
        })
    }

    /// Fail with `ConfigMismatch` if the cache was built with other parameters
    pub fn check_params(&self, params: BloomParams) -> Result<()> {
        match self.meta {
            Some(ref meta) if meta.params() != params => Err(SifterError::ConfigMismatch {
                built_k: meta.k,
                built_m: meta.m,
                k: params.k,
                m: params.m,
            }),
            _ => Ok(()),
        }
    }

    pub fn meta(&self) -> Option<&CacheMeta> {
        self.meta.as_ref()
    }

    pub fn paths(&self) -> &[String] {
        &self.paths
    }

    /// Path registered for file `id`
    pub fn path(&self, id: FileId) -> Option<&str> {
        self.paths.get(id as usize).map(String::as_str)
    }

    pub fn cache_path(&self) -> &Path {
        &self.cache_path
    }
}

impl BitmapSource for CacheReader {
    fn file_count(&self) -> usize {
        self.paths.len()
    }

    fn load_bitmap(&self, h: HashPosition) -> Result<Bitmap> {
        Bitmap::open(&self.cache_path.join(bitmap_file_name(h)), self.paths.len())
    }
}

/// Read `path.txt` into an ordered list.
///
/// Lines end at `\n` only; a `\r` before it belongs to the path.
fn read_path_registry(cache_path: &Path) -> Result<Vec<String>> {
    let registry_path = cache_path.join(PATH_REGISTRY_FILE);
    let content = match fs::read_to_string(&registry_path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(SifterError::NotFound(cache_path.to_path_buf()));
        }
        Err(e) => return Err(SifterError::fs(&registry_path, e)),
    };

    let body = content.strip_suffix('\n').unwrap_or(&content);
    if body.is_empty() {
        return Ok(Vec::new());
    }
    Ok(body.split('\n').map(str::to_string).collect())
}

/// Read `meta.json` if present
fn read_meta(cache_path: &Path) -> Result<Option<CacheMeta>> {
    let meta_path = cache_path.join(META_FILE);
    let content = match fs::read_to_string(&meta_path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(SifterError::fs(&meta_path, e)),
    };

    let meta: CacheMeta = serde_json::from_str(&content)?;
    if meta.version != CACHE_VERSION {
        return Err(SifterError::encoding(
            &meta_path,
            format!("unsupported cache version {}", meta.version),
        ));
    }
    Ok(Some(meta))
}
