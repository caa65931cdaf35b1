//! Utility functions and data structures.
//!
//! ## Modules
//!
//! - [`bits`] - MSB-first bit packing for filters and bitmaps
//! - [`hash`] - MD5 double hashing and the prepared token table
//! - [`ngram`] - Line splitting and 1/2/3-gram extraction
//! - [`config`] - Build/query configuration
//! - [`progress`] - Progress bars (no-op without the `progress` feature)
//!
//! ## Key Functions
//!
//! ```no_run
//! use sifter::utils::{query_grams, pack};
//!
//! // Patterns longer than 2 bytes are split into 3-byte windows
//! let grams = query_grams(b"hello");
//! // Returns: ["hel", "ell", "llo"]
//!
//! // Pack bits MSB-first; always one byte longer than len / 8
//! let bytes = pack(&[true, false, true]);
//! // Returns: [0b1010_0000]
//! ```

pub mod bits;
pub mod config;
pub mod hash;
pub mod ngram;
pub mod progress;

pub use bits::*;
pub use config::*;
pub use hash::*;
pub use ngram::*;
