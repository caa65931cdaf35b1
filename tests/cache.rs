//! End-to-end build and query tests against real directory trees.

use sifter::index::{CacheReader, bitmap_file_name};
use sifter::utils::PreparedHashes;
use sifter::{BloomParams, Sifter, SifterError};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn sifter(k: u32, m: usize) -> Sifter {
    Sifter::new(BloomParams::new(k, m).unwrap())
}

/// Paths relative to `base`, for readable assertions
fn relative(base: &Path, paths: &[String]) -> Vec<String> {
    paths
        .iter()
        .map(|p| {
            Path::new(p)
                .strip_prefix(base)
                .unwrap()
                .to_string_lossy()
                .into_owned()
        })
        .collect()
}

fn hello_goodbye() -> (TempDir, TempDir) {
    let base = TempDir::new().unwrap();
    let cache = TempDir::new().unwrap();
    write(base.path(), "a.txt", "hello world");
    write(base.path(), "b.txt", "goodbye");
    (base, cache)
}

#[test]
fn test_hello_goodbye() {
    let (base, cache) = hello_goodbye();
    let sifter = sifter(3, 500);
    sifter.build(base.path(), cache.path()).unwrap();

    let found = sifter.query("hello", cache.path()).unwrap();
    assert_eq!(relative(base.path(), &found), vec!["a.txt"]);

    let found = sifter.query("goodbye", cache.path()).unwrap();
    assert_eq!(relative(base.path(), &found), vec!["b.txt"]);
}

#[test]
fn test_cache_layout() {
    let (base, cache) = hello_goodbye();
    sifter(3, 64).build(base.path(), cache.path()).unwrap();

    let registry = fs::read_to_string(cache.path().join("path.txt")).unwrap();
    assert_eq!(registry.lines().count(), 2);

    for h in 0..64 {
        let bitmap = fs::read(cache.path().join(bitmap_file_name(h))).unwrap();
        assert_eq!(bitmap.len(), 2 / 8 + 1);
    }
    assert!(!cache.path().join(bitmap_file_name(64)).exists());
    assert!(cache.path().join("meta.json").exists());
}

#[test]
fn test_no_false_negatives() {
    let base = TempDir::new().unwrap();
    let cache = TempDir::new().unwrap();
    let lines = [
        "fn main() { println!(\"hi\"); }",
        "SELECT * FROM users WHERE id = 42;",
        "the quick brown fox jumps over the lazy dog",
        "\u{e9}t\u{e9} \u{00fc}ber caf\u{e9}",
    ];
    for (i, line) in lines.iter().enumerate() {
        write(base.path(), &format!("f{}.txt", i), &format!("header\n{}\nfooter\n", line));
    }
    for i in 0..20 {
        write(base.path(), &format!("noise/n{}.txt", i), &format!("noise file {}", i));
    }

    // Small m so filters are dense and collisions are common
    let sifter = sifter(2, 32);
    sifter.build(base.path(), cache.path()).unwrap();

    for (i, line) in lines.iter().enumerate() {
        let expected = format!("f{}.txt", i);
        let bytes = line.as_bytes();
        for window in bytes.windows(3) {
            let found = sifter.query(window, cache.path()).unwrap();
            assert!(
                relative(base.path(), &found).contains(&expected),
                "{:?} missing for {:?}",
                expected,
                String::from_utf8_lossy(window)
            );
        }
        let found = sifter.query(bytes, cache.path()).unwrap();
        assert!(relative(base.path(), &found).contains(&expected));
    }
}

#[test]
fn test_short_patterns() {
    let (base, cache) = hello_goodbye();
    let sifter = sifter(3, 500);
    sifter.build(base.path(), cache.path()).unwrap();

    let found = relative(base.path(), &sifter.query("wo", cache.path()).unwrap());
    assert!(found.contains(&"a.txt".to_string()));

    let found = relative(base.path(), &sifter.query("y", cache.path()).unwrap());
    assert!(found.contains(&"b.txt".to_string()));
}

#[test]
fn test_git_directories_not_indexed() {
    let base = TempDir::new().unwrap();
    let cache = TempDir::new().unwrap();
    write(base.path(), "src/lib.rs", "pub fn visible() {}");
    write(base.path(), ".git/objects/secret", "zanzibar");
    write(base.path(), "vendor/dep/.git/HEAD", "zanzibar");

    let sifter = sifter(3, 500);
    let stats = sifter.build(base.path(), cache.path()).unwrap();
    assert_eq!(stats.files_indexed, 1);

    assert!(sifter.query("zanzibar", cache.path()).unwrap().is_empty());
    let reader = CacheReader::open(cache.path()).unwrap();
    assert!(reader.paths().iter().all(|p| !p.contains(".git")));
}

#[test]
fn test_pattern_across_lines_is_not_required() {
    let base = TempDir::new().unwrap();
    let cache = TempDir::new().unwrap();
    write(base.path(), "split.txt", "ab\ncd\n");

    let sifter = sifter(3, 500);
    sifter.build(base.path(), cache.path()).unwrap();

    // Grams never span a line break
    let found = sifter.query("bcd", cache.path()).unwrap();
    assert!(found.is_empty());
    assert_eq!(sifter.query("cd", cache.path()).unwrap().len(), 1);
}

#[test]
fn test_empty_tree() {
    let base = TempDir::new().unwrap();
    let cache = TempDir::new().unwrap();

    let sifter = sifter(3, 16);
    let stats = sifter.build(base.path(), cache.path()).unwrap();
    assert_eq!(stats.files_indexed, 0);
    assert_eq!(fs::read(cache.path().join(bitmap_file_name(0))).unwrap(), vec![0u8]);
    assert!(sifter.query("anything", cache.path()).unwrap().is_empty());
}

#[test]
fn test_rebuild_replaces_cache() {
    let (base, cache) = hello_goodbye();
    sifter(3, 500).build(base.path(), cache.path()).unwrap();

    fs::remove_file(base.path().join("a.txt")).unwrap();
    write(base.path(), "c.txt", "hello again");

    let sifter = sifter(3, 250);
    sifter.build(base.path(), cache.path()).unwrap();

    assert!(!cache.path().join(bitmap_file_name(499)).exists());
    let found = relative(base.path(), &sifter.query("hello", cache.path()).unwrap());
    assert_eq!(found, vec!["c.txt"]);
}

#[test]
fn test_query_missing_cache() {
    let err = sifter(3, 500)
        .query("hello", Path::new("/nonexistent/sifter/cache"))
        .unwrap_err();
    assert!(matches!(err, SifterError::NotFound(_)));
}

#[test]
fn test_query_with_mismatched_params() {
    let (base, cache) = hello_goodbye();
    sifter(3, 500).build(base.path(), cache.path()).unwrap();

    let err = sifter(4, 500).query("hello", cache.path()).unwrap_err();
    assert!(matches!(
        err,
        SifterError::ConfigMismatch {
            built_k: 3,
            k: 4,
            ..
        }
    ));
}

#[test]
fn test_truncated_bitmap_is_encoding_error() {
    let (base, cache) = hello_goodbye();
    let sifter = sifter(1, 1);
    sifter.build(base.path(), cache.path()).unwrap();

    // With m=1 every query reads slot 0
    fs::write(cache.path().join(bitmap_file_name(0)), b"").unwrap();
    let err = sifter.query("hello", cache.path()).unwrap_err();
    assert!(matches!(err, SifterError::Encoding { .. }));
}

#[test]
fn test_missing_bitmap_is_encoding_error() {
    let (base, cache) = hello_goodbye();
    let sifter = sifter(1, 1);
    sifter.build(base.path(), cache.path()).unwrap();

    fs::remove_file(cache.path().join(bitmap_file_name(0))).unwrap();
    let err = sifter.query("hello", cache.path()).unwrap_err();
    assert!(matches!(err, SifterError::Encoding { .. }));
}

#[test]
fn test_build_missing_base_fails() {
    let cache = TempDir::new().unwrap();
    let err = sifter(3, 500)
        .build(Path::new("/nonexistent/sifter/base"), cache.path())
        .unwrap_err();
    assert!(matches!(err, SifterError::Filesystem { .. }));
    assert!(!cache.path().join("meta.json").exists());
}

#[test]
fn test_prepared_table_does_not_change_results() {
    let base = TempDir::new().unwrap();
    write(base.path(), "a.txt", "hello world\nfoo bar");
    write(base.path(), "b.txt", "goodbye moon");
    write(base.path(), "c.txt", "hello moon");

    let plain_cache = TempDir::new().unwrap();
    let plain = sifter(3, 97);
    plain.build(base.path(), plain_cache.path()).unwrap();

    let tokens = ["hel", "ell", "llo", "moo", "oon", "o", "he", "zzz"];
    let prepared_cache = TempDir::new().unwrap();
    let prepared = sifter(3, 97).with_prepared(Arc::new(PreparedHashes::prepare(3, tokens)));
    prepared.build(base.path(), prepared_cache.path()).unwrap();

    for pattern in ["hello", "moon", "o", "he", "bar", "zzz"] {
        assert_eq!(
            relative(base.path(), &plain.query(pattern, plain_cache.path()).unwrap()),
            relative(base.path(), &prepared.query(pattern, prepared_cache.path()).unwrap()),
            "pattern {:?}",
            pattern
        );
    }

    for h in 0..97 {
        let name = bitmap_file_name(h);
        assert_eq!(
            fs::read(plain_cache.path().join(&name)).unwrap(),
            fs::read(prepared_cache.path().join(&name)).unwrap()
        );
    }
}

#[test]
fn test_build_is_deterministic() {
    let base = TempDir::new().unwrap();
    for i in 0..30 {
        write(base.path(), &format!("d{}/f{}.txt", i % 4, i), &format!("content {}", i));
    }

    let first = TempDir::new().unwrap();
    let second = TempDir::new().unwrap();
    sifter(3, 50).build(base.path(), first.path()).unwrap();
    sifter(3, 50).build(base.path(), second.path()).unwrap();

    assert_eq!(
        fs::read(first.path().join("path.txt")).unwrap(),
        fs::read(second.path().join("path.txt")).unwrap()
    );
    for h in 0..50 {
        let name = bitmap_file_name(h);
        assert_eq!(
            fs::read(first.path().join(&name)).unwrap(),
            fs::read(second.path().join(&name)).unwrap()
        );
    }
}

#[cfg(unix)]
#[test]
fn test_path_with_carriage_return_round_trips() {
    let base = TempDir::new().unwrap();
    let cache = TempDir::new().unwrap();
    write(base.path(), "note\r", "hello there");
    write(base.path(), "other.txt", "nothing to see");

    let sifter = sifter(3, 500);
    sifter.build(base.path(), cache.path()).unwrap();

    let found = sifter.query("hello", cache.path()).unwrap();
    assert_eq!(relative(base.path(), &found), vec!["note\r"]);
    assert!(Path::new(&found[0]).exists());
}
