//! MD5-based double hashing (Kirsch & Mitzenmacher, "Less hashing, same
//! performance: building a better bloom filter", ESA 2006).
//!
//! A token's 128-bit MD5 digest is split into `hash_a` (first 8 bytes,
//! big-endian) and `hash_b` (last 8 bytes). Position `i` is
//! `(hash_a + i * hash_b) mod m`, evaluated in 128-bit arithmetic so the
//! product never wraps for any `i < 2^32`.

use crate::error::{Result, SifterError};
use crate::index::types::{BloomParams, HashPosition};
use md5::{Digest, Md5};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::Path;
use std::sync::Arc;

/// Split the MD5 digest of `token` into its high and low 64-bit halves
#[inline]
pub fn digest_halves(token: &[u8]) -> (u64, u64) {
    let digest = Md5::digest(token);
    let mut high = [0u8; 8];
    let mut low = [0u8; 8];
    high.copy_from_slice(&digest[..8]);
    low.copy_from_slice(&digest[8..]);
    (u64::from_be_bytes(high), u64::from_be_bytes(low))
}

/// The `i`-th unreduced combination `hash_a + i * hash_b`
#[inline]
pub fn combine(hash_a: u64, hash_b: u64, i: u32) -> u128 {
    hash_a as u128 + (i as u128) * (hash_b as u128)
}

/// The `i`-th hash position in `[0, m)`
#[inline]
pub fn double_hash(hash_a: u64, hash_b: u64, i: u32, m: usize) -> HashPosition {
    (combine(hash_a, hash_b, i) % m as u128) as HashPosition
}

/// Derives bloom positions for tokens under fixed `(k, m)`.
///
/// An optional [`PreparedHashes`] table is consulted before computing MD5.
/// The table never changes results, only how they are obtained.
#[derive(Clone, Debug)]
pub struct TokenHasher {
    params: BloomParams,
    prepared: Option<Arc<PreparedHashes>>,
}

impl TokenHasher {
    pub fn new(params: BloomParams) -> Self {
        Self {
            params,
            prepared: None,
        }
    }

    /// Attach a precomputed table
    pub fn with_prepared(mut self, prepared: Arc<PreparedHashes>) -> Self {
        self.prepared = Some(prepared);
        self
    }

    pub fn params(&self) -> BloomParams {
        self.params
    }

    /// Call `f` with each of the `k` positions of `token`, in order `i = 0..k`.
    /// Positions are not deduplicated.
    #[inline]
    pub fn for_each_position(&self, token: &[u8], mut f: impl FnMut(HashPosition)) {
        let BloomParams { k, m } = self.params;

        if let Some(components) = self.prepared.as_deref().and_then(|p| p.get(token, k)) {
            for &c in components {
                f((c % m as u128) as HashPosition);
            }
            return;
        }

        let (hash_a, hash_b) = digest_halves(token);
        for i in 0..k {
            f(double_hash(hash_a, hash_b, i, m));
        }
    }

    /// The `k` positions of `token`
    pub fn positions(&self, token: &[u8]) -> Vec<HashPosition> {
        let mut out = Vec::with_capacity(self.params.k as usize);
        self.for_each_position(token, |p| out.push(p));
        out
    }
}

/// On-disk form of a prepared table. Components are decimal strings since
/// they exceed 64 bits.
#[derive(Debug, Serialize, Deserialize)]
struct PreparedFile {
    k: u32,
    hashes: BTreeMap<String, Vec<String>>,
}

/// Precomputed unreduced double-hash components per token.
///
/// Built offline from a token list (`sifter prepare`). Each entry stores
/// `hash_a + i * hash_b` for `i in 0..k`; reducing modulo `m` happens at
/// lookup so one table serves any `m`.
#[derive(Debug, Default)]
pub struct PreparedHashes {
    k: u32,
    table: FxHashMap<Vec<u8>, Vec<u128>>,
}

impl PreparedHashes {
    /// Compute components for every token
    pub fn prepare<'a>(k: u32, tokens: impl IntoIterator<Item = &'a str>) -> Self {
        let table = tokens
            .into_iter()
            .map(|token| {
                let (hash_a, hash_b) = digest_halves(token.as_bytes());
                let components = (0..k).map(|i| combine(hash_a, hash_b, i)).collect();
                (token.as_bytes().to_vec(), components)
            })
            .collect();
        Self { k, table }
    }

    /// Read a token list (one token per line) and compute its table
    pub fn prepare_from_file(k: u32, input: &Path) -> Result<Self> {
        let content = fs::read_to_string(input).map_err(|e| SifterError::fs(input, e))?;
        Ok(Self::prepare(k, content.lines()))
    }

    /// Components for `token`, if the table holds at least `k` of them
    #[inline]
    pub fn get(&self, token: &[u8], k: u32) -> Option<&[u128]> {
        self.table
            .get(token)
            .filter(|c| c.len() >= k as usize)
            .map(|c| &c[..k as usize])
    }

    pub fn k(&self) -> u32 {
        self.k
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Load a table written by [`PreparedHashes::save`]
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| SifterError::fs(path, e))?;
        let raw: PreparedFile = serde_json::from_reader(std::io::BufReader::new(file))?;

        let mut table = FxHashMap::default();
        for (token, components) in raw.hashes {
            let parsed = components
                .iter()
                .map(|c| c.parse::<u128>())
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|e| SifterError::encoding(path, format!("token {:?}: {}", token, e)))?;
            table.insert(token.into_bytes(), parsed);
        }

        Ok(Self { k: raw.k, table })
    }

    /// Write the table as JSON. Tokens that are not valid UTF-8 are skipped.
    pub fn save(&self, path: &Path) -> Result<()> {
        let hashes = self
            .table
            .iter()
            .filter_map(|(token, components)| {
                let token = String::from_utf8(token.clone()).ok()?;
                Some((token, components.iter().map(u128::to_string).collect()))
            })
            .collect();
        let raw = PreparedFile { k: self.k, hashes };

        let file = File::create(path).map_err(|e| SifterError::fs(path, e))?;
        serde_json::to_writer(BufWriter::new(file), &raw)?;
        Ok(())
    }
}
