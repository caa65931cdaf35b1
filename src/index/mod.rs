//! On-disk cache: per-file filters, inversion into slot bitmaps, reading back.

pub mod build;
pub mod filter;
pub mod reader;
pub mod stats;
pub mod types;
pub mod writer;

pub use filter::FileFilter;
pub use reader::{Bitmap, BitmapSource, CacheReader};
pub use types::*;
pub use writer::CacheWriter;
