//! Candidate selection over inverted bitmaps.
//!
//! A pattern is reduced to a set of bloom slots; a file survives only if its
//! bit is set in every one of those slots' bitmaps.

use crate::error::Result;
use crate::index::reader::BitmapSource;
use crate::index::types::{FileId, HashPosition};
use crate::utils::hash::TokenHasher;
use crate::utils::ngram::query_grams;
use roaring::RoaringBitmap;
use tracing::debug;

/// Every slot the pattern's grams hash to, sorted and deduplicated
pub fn hash_positions(pattern: &[u8], hasher: &TokenHasher) -> Vec<HashPosition> {
    let mut positions = Vec::new();
    for gram in query_grams(pattern) {
        hasher.for_each_position(gram, |h| positions.push(h));
    }
    positions.sort_unstable();
    positions.dedup();
    positions
}

/// Intersect the bitmaps for `positions`.
///
/// The first bitmap seeds the candidate set; each later one drops files whose
/// bit is 0. Once the set is empty no further bitmaps are loaded.
pub fn select_candidates<S: BitmapSource + ?Sized>(
    source: &S,
    positions: &[HashPosition],
) -> Result<RoaringBitmap> {
    let mut iter = positions.iter();
    let Some(&first) = iter.next() else {
        return Ok(RoaringBitmap::new());
    };

    let mut candidates = source.load_bitmap(first)?.to_roaring();
    let mut loaded = 1usize;

    for &h in iter {
        if candidates.is_empty() {
            break;
        }
        let bitmap = source.load_bitmap(h)?;
        loaded += 1;

        let dropped: RoaringBitmap = candidates
            .iter()
            .filter(|&id| !bitmap.contains(id as FileId))
            .collect();
        candidates -= dropped;
    }

    debug!(
        slots = positions.len(),
        loaded,
        candidates = candidates.len(),
        "selected candidates"
    );
    Ok(candidates)
}
