use crate::error::{Result, SifterError};
use crate::index::filter::FileFilter;
use crate::index::types::*;
use crate::utils::bits::pack;
use crate::utils::progress::ProgressBar;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::debug;

/// Writes the persistent cache: path registry, inverted bitmaps, metadata
pub struct CacheWriter {
    cache_path: PathBuf,
    params: BloomParams,
}

impl CacheWriter {
    /// Create the cache directory if needed
    pub fn new(cache_path: &Path, params: BloomParams) -> Result<Self> {
        fs::create_dir_all(cache_path).map_err(|e| SifterError::fs(cache_path, e))?;
        Ok(Self {
            cache_path: cache_path.to_path_buf(),
            params,
        })
    }

    pub fn cache_path(&self) -> &Path {
        &self.cache_path
    }

    /// Remove artifacts of a previous build so the cache is wholly replaced.
    ///
    /// `meta.json` goes first: until the new build writes it again, the
    /// directory does not look like a finished cache.
    pub fn clear(&self) -> Result<()> {
        remove_if_exists(&self.cache_path.join(META_FILE))?;
        remove_if_exists(&self.cache_path.join(PATH_REGISTRY_FILE))?;

        let entries =
            fs::read_dir(&self.cache_path).map_err(|e| SifterError::fs(&self.cache_path, e))?;
        for entry in entries {
            let entry = entry.map_err(|e| SifterError::fs(&self.cache_path, e))?;
            let name = entry.file_name();
            if name.to_str().and_then(parse_bitmap_file_name).is_some() {
                remove_if_exists(&entry.path())?;
            }
        }
        Ok(())
    }

    /// Write `path.txt`, one path per line in file-ID order
    pub fn write_path_registry(&self, paths: &[String]) -> Result<()> {
        let registry_path = self.cache_path.join(PATH_REGISTRY_FILE);
        let file = File::create(&registry_path).map_err(|e| SifterError::fs(&registry_path, e))?;
        let mut file = BufWriter::new(file);

        for path in paths {
            writeln!(file, "{}", path).map_err(|e| SifterError::fs(&registry_path, e))?;
        }

        file.flush().map_err(|e| SifterError::fs(&registry_path, e))?;
        Ok(())
    }

    /// Transpose `file_count` staged per-file filters into one bitmap per slot.
    ///
    /// Bitmap `h` holds bit `j` set when file `j`'s filter has slot `h` set.
    /// Runs single-threaded after every filter has been staged.
    pub fn invert(
        &self,
        staging_path: &Path,
        file_count: usize,
        progress: Option<&ProgressBar>,
    ) -> Result<usize> {
        let m = self.params.m;

        let filters = (0..file_count)
            .map(|id| {
                let path = staging_path.join(staged_file_name(id as FileId));
                FileFilter::read_from(&path, m)
            })
            .collect::<Result<Vec<_>>>()?;

        let mut flags = vec![false; file_count];
        for h in 0..m {
            for (flag, filter) in flags.iter_mut().zip(&filters) {
                *flag = filter.contains(h);
            }

            let bitmap_path = self.cache_path.join(bitmap_file_name(h));
            fs::write(&bitmap_path, pack(&flags)).map_err(|e| SifterError::fs(&bitmap_path, e))?;

            if let Some(pb) = progress {
                pb.inc(1);
            }
        }

        debug!(bitmaps = m, files = file_count, "inverted filters");
        Ok(m)
    }

    /// Write `meta.json`. Called last; its presence marks a finished build.
    pub fn write_meta(&self, file_count: usize) -> Result<CacheMeta> {
        let created_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);

        let meta = CacheMeta {
            version: CACHE_VERSION,
            k: self.params.k,
            m: self.params.m,
            file_count,
            created_at,
        };

        let meta_path = self.cache_path.join(META_FILE);
        let content = serde_json::to_string_pretty(&meta)?;
        fs::write(&meta_path, content).map_err(|e| SifterError::fs(&meta_path, e))?;

        Ok(meta)
    }
}

fn remove_if_exists(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(SifterError::fs(path, e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::bits::bit_at;

    fn stage(dir: &Path, id: FileId, m: usize, slots: &[usize]) {
        let mut filter = FileFilter::new(m);
        for &s in slots {
            filter.insert(s);
        }
        filter.write_to(&dir.join(staged_file_name(id))).unwrap();
    }

    #[test]
    fn test_invert_transposes_bits() {
        let staging = tempfile::tempdir().unwrap();
        let cache = tempfile::tempdir().unwrap();
        let m = 10;

        stage(staging.path(), 0, m, &[1, 3]);
        stage(staging.path(), 1, m, &[3, 9]);
        stage(staging.path(), 2, m, &[]);

        let writer = CacheWriter::new(cache.path(), BloomParams::new(1, m).unwrap()).unwrap();
        assert_eq!(writer.invert(staging.path(), 3, None).unwrap(), m);

        let read = |h: usize| fs::read(cache.path().join(bitmap_file_name(h))).unwrap();

        let slot3 = read(3);
        assert_eq!(slot3.len(), 3 / 8 + 1);
        assert!(bit_at(&slot3, 0));
        assert!(bit_at(&slot3, 1));
        assert!(!bit_at(&slot3, 2));

        let slot1 = read(1);
        assert!(bit_at(&slot1, 0));
        assert!(!bit_at(&slot1, 1));

        assert_eq!(read(0), vec![0u8]);
    }

    #[test]
    fn test_invert_missing_stage_fails() {
        let staging = tempfile::tempdir().unwrap();
        let cache = tempfile::tempdir().unwrap();
        stage(staging.path(), 0, 8, &[0]);

        let writer = CacheWriter::new(cache.path(), BloomParams::new(1, 8).unwrap()).unwrap();
        let err = writer.invert(staging.path(), 2, None).unwrap_err();
        assert!(matches!(err, SifterError::Filesystem { .. }));
    }

    #[test]
    fn test_path_registry_lines() {
        let cache = tempfile::tempdir().unwrap();
        let writer = CacheWriter::new(cache.path(), BloomParams::new(3, 8).unwrap()).unwrap();
        writer
            .write_path_registry(&["a.txt".to_string(), "dir/b.txt".to_string()])
            .unwrap();

        let content = fs::read_to_string(cache.path().join(PATH_REGISTRY_FILE)).unwrap();
        assert_eq!(content, "a.txt\ndir/b.txt\n");
    }

    #[test]
    fn test_clear_removes_previous_build() {
        let cache = tempfile::tempdir().unwrap();
        for name in [META_FILE, PATH_REGISTRY_FILE, "hash_00000.bin", "hash_00999.bin"] {
            fs::write(cache.path().join(name), b"x").unwrap();
        }
        fs::write(cache.path().join("notes.txt"), b"keep").unwrap();

        let writer = CacheWriter::new(cache.path(), BloomParams::new(3, 8).unwrap()).unwrap();
        writer.clear().unwrap();

        let remaining: Vec<String> = fs::read_dir(cache.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(remaining, vec!["notes.txt".to_string()]);
    }

    #[test]
    fn test_write_meta_failure_names_path() {
        let cache = tempfile::tempdir().unwrap();
        let writer = CacheWriter::new(cache.path(), BloomParams::new(3, 8).unwrap()).unwrap();
        // A directory in the way makes the write fail
        fs::create_dir(cache.path().join(META_FILE)).unwrap();

        match writer.write_meta(1).unwrap_err() {
            SifterError::Filesystem { path, .. } => assert_eq!(path, cache.path().join(META_FILE)),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_write_meta() {
        let cache = tempfile::tempdir().unwrap();
        let writer = CacheWriter::new(cache.path(), BloomParams::new(4, 64).unwrap()).unwrap();
        let meta = writer.write_meta(7).unwrap();

        let on_disk: CacheMeta =
            serde_json::from_reader(File::open(cache.path().join(META_FILE)).unwrap()).unwrap();
        assert_eq!(on_disk, meta);
        assert_eq!(on_disk.k, 4);
        assert_eq!(on_disk.m, 64);
        assert_eq!(on_disk.file_count, 7);
    }
}
