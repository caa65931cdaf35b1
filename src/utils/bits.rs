//! MSB-first bit packing shared by per-file filters and inverted bitmaps.
//!
//! Bit `i` of a packed buffer lives in byte `i / 8` at mask `0x80 >> (i % 8)`.
//! Packed buffers always carry `len / 8 + 1` bytes, so a vector whose length
//! is an exact multiple of 8 still gets one trailing all-zero byte. Caches
//! written by earlier versions of the tool rely on that length.

/// Number of bytes used to store `bits` packed bits.
#[inline]
pub fn packed_len(bits: usize) -> usize {
    bits / 8 + 1
}

/// Pack a boolean vector into bytes, first bit in the highest-order position.
pub fn pack(bits: &[bool]) -> Vec<u8> {
    let mut bytes = vec![0u8; packed_len(bits.len())];
    for (chunk, byte) in bits.chunks(8).zip(bytes.iter_mut()) {
        *byte = pack_byte(chunk);
    }
    bytes
}

/// Pack up to 8 bits into one byte. Extra bits past the 8th are ignored.
#[inline]
pub fn pack_byte(bits: &[bool]) -> u8 {
    bits.iter()
        .take(8)
        .enumerate()
        .fold(0u8, |acc, (i, &b)| if b { acc | (0x80 >> i) } else { acc })
}

/// Read bit `index` of a single byte. Indices outside `0..8` read as false.
#[inline]
pub fn unpack(byte: u8, index: usize) -> bool {
    index < 8 && byte & (0x80 >> index) != 0
}

/// Read bit `index` of a packed buffer. Out-of-range indices read as false.
#[inline]
pub fn bit_at(bytes: &[u8], index: usize) -> bool {
    bytes
        .get(index / 8)
        .is_some_and(|&byte| unpack(byte, index % 8))
}

/// Set bit `index` of a packed buffer. The buffer must be long enough.
#[inline]
pub fn set_bit(bytes: &mut [u8], index: usize) {
    bytes[index / 8] |= 0x80 >> (index % 8);
}

/// Unpack the first `len` bits of a packed buffer.
pub fn unpack_all(bytes: &[u8], len: usize) -> Vec<bool> {
    (0..len).map(|i| bit_at(bytes, i)).collect()
}

/// Count the set bits of a packed buffer.
pub fn count_ones(bytes: &[u8]) -> u64 {
    bytes.iter().map(|b| b.count_ones() as u64).sum()
}
