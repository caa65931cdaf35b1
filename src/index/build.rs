//! Cache build pipeline.
//!
//! 1. Discovery: a sequential walk of the base tree (pruning `.git`) yields a
//!    sorted path list. A file's position in that list is its ID.
//! 2. Filtering: rayon workers read files and build per-file filters, sending
//!    them through a bounded channel (producers block when it is full).
//! 3. Staging: a fixed pool of serializer threads drains the channel and
//!    writes each filter to a temporary directory under its ID.
//! 4. Inversion: once every serializer has joined, filters are transposed
//!    into one bitmap per slot, then the path registry and `meta.json` are
//!    written.
//!
//! Any error in steps 1-3 cancels outstanding work and fails the build. A
//! failed build leaves no `meta.json` and must be retried from scratch.

use crate::error::{Result, SifterError};
use crate::index::filter::FileFilter;
use crate::index::types::{BuildStats, FileId, staged_file_name};
use crate::index::writer::CacheWriter;
use crate::utils::config::SifterConfig;
use crate::utils::hash::TokenHasher;
use crate::utils::progress::{ProgressBar, bar, spinner};
use ignore::WalkBuilder;
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Directory names that are never descended into
const PRUNED_DIRS: &[&str] = &[".git"];

/// A file's filter on its way from a worker to a serializer
struct ProcessedFile {
    id: FileId,
    filter: FileFilter,
}

/// Walk `base` and return every regular file, sorted by path.
///
/// Hidden files and ignore files are not special: everything except `.git`
/// directories is indexed. Paths that cannot be stored as one registry line
/// (non UTF-8, or containing a newline) are skipped with a warning.
pub fn discover_files(base: &Path) -> Result<Vec<PathBuf>> {
    if !base.is_dir() {
        return Err(SifterError::fs(
            base,
            std::io::Error::new(std::io::ErrorKind::NotFound, "base directory not found"),
        ));
    }

    let walker = WalkBuilder::new(base)
        .standard_filters(false)
        .follow_links(false)
        .filter_entry(|entry| {
            let is_dir = entry.file_type().is_some_and(|t| t.is_dir());
            let name = entry.file_name().to_string_lossy();
            !(is_dir && PRUNED_DIRS.contains(&name.as_ref()))
        })
        .build();

    let mut files = Vec::new();
    for entry in walker {
        let entry = entry?;
        if !entry.file_type().is_some_and(|t| t.is_file()) {
            continue;
        }

        let path = entry.into_path();
        if path.to_str().is_some_and(|s| !s.contains('\n')) {
            files.push(path);
        } else {
            warn!(path = %path.display(), "skipping path that cannot be registered");
        }
    }

    files.sort();
    Ok(files)
}

/// Build the cache for `base` into `cache`
pub fn build_cache(
    base: &Path,
    cache: &Path,
    config: &SifterConfig,
    hasher: &TokenHasher,
    show_progress: bool,
) -> Result<BuildStats> {
    config.validate()?;
    let started = Instant::now();
    let params = hasher.params();

    let writer = CacheWriter::new(cache, params)?;
    writer.clear()?;

    info!(base = %base.display(), cache = %cache.display(), k = params.k, m = params.m, "building cache");

    // Phase 1: discovery
    let discover_spinner = spinner(show_progress, "Discovering files...");
    let files = discover_files(base)?;
    if let Some(s) = discover_spinner {
        s.finish_with_message(format!("Found {} files", files.len()));
    }
    if files.len() > FileId::MAX as usize {
        return Err(SifterError::InvalidParameters(format!(
            "{} files exceeds the maximum of {}",
            files.len(),
            FileId::MAX
        )));
    }

    let staging = tempfile::Builder::new()
        .prefix("sifter")
        .tempdir()
        .map_err(|e| SifterError::fs(std::env::temp_dir(), e))?;

    // Phases 2-3: filter and stage
    let filter_bar = bar(show_progress, files.len() as u64, "Filtering files...");
    stage_filters(&files, staging.path(), config, hasher, filter_bar.as_ref())?;
    if let Some(pb) = filter_bar {
        pb.finish_with_message(format!("Filtered {} files", files.len()));
    }

    let paths: Vec<String> = files
        .iter()
        .map(|p| p.to_string_lossy().into_owned())
        .collect();
    writer.write_path_registry(&paths)?;

    // Phase 4: inversion
    let invert_bar = bar(show_progress, params.m as u64, "Inverting filters...");
    let bitmaps_written = writer.invert(staging.path(), files.len(), invert_bar.as_ref())?;
    if let Some(pb) = invert_bar {
        pb.finish_with_message(format!("Wrote {} bitmaps", bitmaps_written));
    }

    writer.write_meta(files.len())?;

    let stats = BuildStats::finish(files.len(), bitmaps_written, started);
    info!(
        files = stats.files_indexed,
        bitmaps = stats.bitmaps_written,
        elapsed_ms = stats.elapsed.as_millis() as u64,
        "cache built"
    );
    Ok(stats)
}

/// Build every file's filter in parallel and stage it under its ID.
///
/// Returns once the producers have finished, the queue has drained and
/// every serializer has exited. The first error from either side wins.
fn stage_filters(
    files: &[PathBuf],
    staging: &Path,
    config: &SifterConfig,
    hasher: &TokenHasher,
    progress: Option<&ProgressBar>,
) -> Result<()> {
    let (tx, rx) = crossbeam_channel::bounded::<ProcessedFile>(config.queue_capacity);

    // Set by whichever side fails first so the rest stop early
    let cancelled = AtomicBool::new(false);
    let first_error: Mutex<Option<SifterError>> = Mutex::new(None);

    let fail = |err: SifterError| {
        cancelled.store(true, Ordering::Relaxed);
        if let Ok(mut slot) = first_error.lock() {
            if slot.is_none() {
                *slot = Some(err);
            }
        }
    };

    std::thread::scope(|s| {
        // Serializer pool
        for _ in 0..config.serialize_workers {
            let rx = rx.clone();
            let cancelled = &cancelled;
            let fail = &fail;
            s.spawn(move || {
                for item in rx.iter() {
                    // Keep draining after cancellation so producers never block
                    if cancelled.load(Ordering::Relaxed) {
                        continue;
                    }
                    let path = staging.join(staged_file_name(item.id));
                    if let Err(e) = item.filter.write_to(&path) {
                        fail(e);
                    }
                }
            });
        }
        drop(rx);

        // Producers: rayon workers, one filter per file
        let producer = s.spawn(|| {
            let outcome = files.par_iter().enumerate().try_for_each_with(
                tx,
                |sender, (id, path)| -> Result<()> {
                    if cancelled.load(Ordering::Relaxed) {
                        return Ok(());
                    }

                    let content = fs::read(path).map_err(|e| SifterError::fs(path, e))?;
                    let filter = FileFilter::from_content(&content, hasher);
                    debug!(id, path = %path.display(), bits = filter.count_ones(), "filtered file");

                    if let Some(pb) = progress {
                        pb.inc(1);
                    }

                    let item = ProcessedFile {
                        id: id as FileId,
                        filter,
                    };
                    if sender.send(item).is_err() {
                        // Every serializer is gone; its error is already recorded
                        cancelled.store(true, Ordering::Relaxed);
                    }
                    Ok(())
                },
            );
            // Sender dropped here, closing the queue for the serializers
            if let Err(e) = outcome {
                fail(e);
            }
        });

        if producer.join().is_err() {
            fail(SifterError::Worker("file worker panicked".to_string()));
        }
    });

    match first_error.into_inner() {
        Ok(Some(err)) => Err(err),
        Ok(None) => Ok(()),
        Err(_) => Err(SifterError::Worker("error slot poisoned".to_string())),
    }
}
