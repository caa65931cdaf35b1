use crate::error::{Result, SifterError};
use crate::index::reader::{BitmapSource, CacheReader};
use crate::index::types::{CacheMeta, HashPosition, bitmap_file_name};
use crate::utils::bits::count_ones;
use std::path::{Path, PathBuf};

/// Summary of a built cache
#[derive(Debug, Clone)]
pub struct CacheStats {
    pub cache_path: PathBuf,
    pub file_count: usize,
    pub meta: Option<CacheMeta>,
    /// Bitmaps present on disk (`m` for a complete cache)
    pub bitmap_count: usize,
    pub size_bytes: u64,
    /// Set bits over all bitmap bits. Near 1.0 means `m` is too small.
    pub fill_ratio: f64,
}

impl CacheStats {
    /// Open `cache_path` and scan every bitmap.
    ///
    /// Without `meta.json` the slot count is unknown, so bitmaps are read
    /// from slot 0 until the first one that does not exist.
    pub fn collect(cache_path: &Path) -> Result<Self> {
        let reader = CacheReader::open(cache_path)?;
        let file_count = reader.file_count();

        let mut bitmap_count = 0usize;
        let mut set_bits = 0u64;
        let limit = reader.meta().map(|m| m.m).unwrap_or(HashPosition::MAX);

        for h in 0..limit {
            if reader.meta().is_none() && !cache_path.join(bitmap_file_name(h)).exists() {
                break;
            }
            let bitmap = reader.load_bitmap(h)?;
            set_bits += count_ones(bitmap.as_bytes());
            bitmap_count += 1;
        }

        let total_bits = bitmap_count as u64 * file_count as u64;
        let fill_ratio = if total_bits == 0 {
            0.0
        } else {
            set_bits as f64 / total_bits as f64
        };

        let size_bytes = dir_size(cache_path).map_err(|e| SifterError::fs(cache_path, e))?;

        Ok(Self {
            cache_path: cache_path.to_path_buf(),
            file_count,
            meta: reader.meta().cloned(),
            bitmap_count,
            size_bytes,
            fill_ratio,
        })
    }
}

/// Display cache statistics
pub fn show_stats(cache_path: &Path) -> Result<()> {
    let stats = CacheStats::collect(cache_path)?;

    println!("Cache Statistics");
    println!("================");
    println!();
    println!("Cache location:   {}", stats.cache_path.display());
    println!("File count:       {}", stats.file_count);
    match stats.meta {
        Some(ref meta) => {
            println!("Cache version:    {}", meta.version);
            println!("Hash count (k):   {}", meta.k);
            println!("Filter bits (m):  {}", meta.m);
        }
        None => println!("Parameters:       unknown (no meta.json)"),
    }
    println!("Bitmaps:          {}", stats.bitmap_count);

    println!();
    println!("Cache size:       {}", format_size(stats.size_bytes));
    println!("Fill ratio:       {:.1}%", stats.fill_ratio * 100.0);

    if let Some(ref meta) = stats.meta {
        println!();
        println!("Created:          {}", format_timestamp(meta.created_at));
    }

    Ok(())
}

/// Calculate directory size recursively
fn dir_size(path: &Path) -> std::io::Result<u64> {
    let mut size = 0;
    if path.is_dir() {
        for entry in std::fs::read_dir(path)? {
            let entry = entry?;
            let path = entry.path();
            if path.is_file() {
                size += entry.metadata()?.len();
            } else if path.is_dir() {
                size += dir_size(&path)?;
            }
        }
    }
    Ok(size)
}

/// Format byte size to human readable
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} bytes", bytes)
    }
}

fn format_timestamp(ts: u64) -> String {
    use std::time::{Duration, UNIX_EPOCH};
    let datetime = UNIX_EPOCH + Duration::from_secs(ts);
    format!("{:?} ({}s since epoch)", datetime, ts)
}
