//! Per-file bloom filters built during the walk.
//!
//! Each file gets one `m`-bit filter holding every slot produced by every
//! 1/2/3-gram on every line. Filters are staged to disk as packed bytes and
//! discarded once the inverter has transposed them.

use crate::error::{Result, SifterError};
use crate::index::types::HashPosition;
use crate::utils::bits::{bit_at, count_ones, packed_len, set_bit};
use crate::utils::hash::TokenHasher;
use crate::utils::ngram::{for_each_line_gram, lines};
use std::fs;
use std::path::Path;

/// An `m`-bit bloom filter for one file, stored packed MSB-first
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileFilter {
    bits: Vec<u8>,
    num_bits: usize,
}

impl FileFilter {
    /// Create an empty filter with `num_bits` slots
    pub fn new(num_bits: usize) -> Self {
        Self {
            bits: vec![0u8; packed_len(num_bits)],
            num_bits,
        }
    }

    /// Build the filter for a file's full content
    pub fn from_content(content: &[u8], hasher: &TokenHasher) -> Self {
        let mut filter = Self::new(hasher.params().m);
        for line in lines(content) {
            for_each_line_gram(line, |gram| {
                hasher.for_each_position(gram, |pos| filter.insert(pos));
            });
        }
        filter
    }

    /// Restore a staged filter, checking its length against `num_bits`
    pub fn from_bytes(bits: Vec<u8>, num_bits: usize, origin: &Path) -> Result<Self> {
        let expected = packed_len(num_bits);
        if bits.len() != expected {
            return Err(SifterError::encoding(
                origin,
                format!("expected {} bytes, found {}", expected, bits.len()),
            ));
        }
        Ok(Self { bits, num_bits })
    }

    #[inline]
    pub fn insert(&mut self, pos: HashPosition) {
        debug_assert!(pos < self.num_bits);
        set_bit(&mut self.bits, pos);
    }

    #[inline]
    pub fn contains(&self, pos: HashPosition) -> bool {
        pos < self.num_bits && bit_at(&self.bits, pos)
    }

    /// Check every position of `token`
    pub fn might_contain(&self, token: &[u8], hasher: &TokenHasher) -> bool {
        let mut all = true;
        hasher.for_each_position(token, |pos| all &= self.contains(pos));
        all
    }

    pub fn num_bits(&self) -> usize {
        self.num_bits
    }

    pub fn count_ones(&self) -> u64 {
        count_ones(&self.bits)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bits
    }

    /// Write the packed bytes to `path`
    pub fn write_to(&self, path: &Path) -> Result<()> {
        fs::write(path, &self.bits).map_err(|e| SifterError::fs(path, e))
    }

    /// Read a filter staged by [`FileFilter::write_to`]
    pub fn read_from(path: &Path, num_bits: usize) -> Result<Self> {
        let bits = fs::read(path).map_err(|e| SifterError::fs(path, e))?;
        Self::from_bytes(bits, num_bits, path)
    }
}
