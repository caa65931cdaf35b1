use memchr::memchr_iter;

/// Split content into lines on `\n`, dropping one trailing `\r` per line.
///
/// A final line without a terminator is still yielded; an empty trailing
/// segment after the last newline is not.
pub fn lines(content: &[u8]) -> impl Iterator<Item = &[u8]> {
    let mut start = 0;
    let mut ends = memchr_iter(b'\n', content);
    std::iter::from_fn(move || {
        let (line, next) = match ends.next() {
            Some(end) => (&content[start..end], end + 1),
            None if start < content.len() => (&content[start..], content.len()),
            None => return None,
        };
        start = next;
        Some(line.strip_suffix(b"\r").unwrap_or(line))
    })
}

/// Visit every 1-, 2- and 3-byte gram of a line.
///
/// For each offset `i` the 1-gram at `i` is emitted, followed by the 2-gram
/// ending at `i` (when `i >= 1`) and the 3-gram ending at `i` (when `i >= 2`).
#[inline]
pub fn for_each_line_gram<'a>(line: &'a [u8], mut f: impl FnMut(&'a [u8])) {
    for i in 0..line.len() {
        f(&line[i..=i]);
        if i >= 1 {
            f(&line[i - 1..=i]);
        }
        if i >= 2 {
            f(&line[i - 2..=i]);
        }
    }
}

/// Collect the build-time grams of a line
pub fn line_grams(line: &[u8]) -> Vec<&[u8]> {
    let mut grams = Vec::with_capacity(line.len() * 3);
    for_each_line_gram(line, |g| grams.push(g));
    grams
}

/// Query-time grams: the whole pattern when it is at most 2 bytes, otherwise
/// every 3-byte window.
///
/// Build always indexes 3-grams, so restricting longer patterns to 3-grams
/// cannot cause false negatives.
pub fn query_grams(pattern: &[u8]) -> Vec<&[u8]> {
    if pattern.len() <= 2 {
        return vec![pattern];
    }
    pattern.windows(3).collect()
}
