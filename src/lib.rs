//! # Sifter - Bloom-filter candidate index
//!
//! Sifter narrows a substring search over a directory tree to the files
//! that might contain the pattern. Every file gets an `m`-bit bloom filter
//! over the 1-, 2- and 3-byte grams of each of its lines; the filters are
//! then transposed into `m` bitmaps, one per slot, so a query only has to
//! read the handful of bitmaps its grams hash to.
//!
//! Results are candidates: a file whose single line contains the pattern is
//! never missed, but files that do not contain it may be returned too.
//!
//! ## Architecture
//!
//! - [`index`] - Cache build pipeline, on-disk writer and reader, stats
//! - [`query`] - Pattern hashing and bitmap intersection
//! - [`utils`] - Bit packing, hashing, gram extraction, configuration
//!
//! ## Quick Start
//!
//! ```no_run
//! use sifter::{BloomParams, Sifter};
//! use std::path::Path;
//!
//! let sifter = Sifter::new(BloomParams::new(3, 500)?);
//! sifter.build(Path::new("src"), Path::new("cache"))?;
//!
//! for path in sifter.query("fn main", Path::new("cache"))? {
//!     println!("{}", path);
//! }
//! # Ok::<(), sifter::SifterError>(())
//! ```
//!
//! ## Cache layout
//!
//! - `path.txt` - one path per line; line `j` is file ID `j`
//! - `hash_00000.bin` .. - bitmap per slot, `N/8 + 1` bytes, MSB-first
//! - `meta.json` - `k`, `m` and file count, written last

pub mod error;
pub mod index;
pub mod query;
mod sifter;
pub mod utils;

pub use error::{Result, SifterError};
pub use index::types::{BloomParams, BuildStats, CacheMeta};
pub use sifter::Sifter;
