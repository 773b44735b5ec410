//! Archive packing through the public API
//!
//! Exclusion, directory entries and extraction round-trips.

mod fixtures;

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use discloud_deploy::bundle::{normalize, ExcludeRules, Packer};
use fixtures::{entry_names, extract, project, read_entry};
use walkdir::WalkDir;

/// Relative path -> contents for every file under `root`
fn snapshot(root: &Path) -> BTreeMap<String, Vec<u8>> {
    WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| {
            let rel = normalize(e.path().strip_prefix(root).unwrap());
            (rel, fs::read(e.path()).unwrap())
        })
        .collect()
}

#[test]
fn test_git_excluded_and_empty_dir_recorded() {
    let dir = project(&[(".git/config", "[core]"), ("src/main.go", "package main\n")]);
    fs::create_dir(dir.path().join("empty")).unwrap();

    let bytes = Packer::new().zip_directory(dir.path(), dir.path()).unwrap();

    let mut names = entry_names(&bytes);
    names.sort();
    assert_eq!(names, vec!["empty/", "src/main.go"]);
    assert_eq!(read_entry(&bytes, "src/main.go"), b"package main\n");
}

#[test]
fn test_extract_round_trip() {
    let dir = project(&[
        ("main.py", "print('hi')\n"),
        ("pkg/__init__.py", ""),
        ("pkg/deep/util.py", "X = 1\n"),
        ("assets/logo.bin", "\u{0}\u{1}\u{2}binary"),
        ("node_modules/left-pad/index.js", "module.exports = 1"),
        ("venv/bin/activate", "#!/bin/sh"),
    ]);

    let bytes = Packer::new().zip_directory(dir.path(), dir.path()).unwrap();
    let extracted = extract(&bytes);

    let mut expected = snapshot(dir.path());
    expected.retain(|path, _| !path.starts_with("node_modules/") && !path.starts_with("venv/"));
    assert_eq!(snapshot(extracted.path()), expected);
}

#[test]
fn test_segment_matching() {
    let dir = project(&[
        ("targetdir/x.txt", "kept"),
        ("rebuild.sh", "kept"),
        ("a/target/x", "dropped"),
        ("BUILD/x", "dropped"),
        ("Node_Modules/y.js", "dropped"),
    ]);

    let bytes = Packer::new().zip_directory(dir.path(), dir.path()).unwrap();

    let mut names = entry_names(&bytes);
    names.sort();
    // `a/` only had excluded children, so it is kept as an empty directory
    assert_eq!(names, vec!["a/", "rebuild.sh", "targetdir/x.txt"]);
}

#[test]
fn test_exclude_rules_directly() {
    let rules = ExcludeRules::new();
    assert!(!rules.is_excluded(Path::new("targetdir/x.txt")));
    assert!(!rules.is_excluded(Path::new("rebuild.sh")));
    assert!(rules.is_excluded(Path::new("a/target/x")));
    assert!(rules.is_excluded(Path::new("BUILD/x")));
}

#[test]
fn test_extra_patterns_apply_to_nested_paths() {
    let dir = project(&[("app.js", "1"), ("logs/today.log", "noise"), ("notes.log", "noise")]);

    let packer = Packer::new().with_excludes(&["*.log"]).unwrap();
    let bytes = packer.zip_directory(dir.path(), dir.path()).unwrap();

    let mut names = entry_names(&bytes);
    names.sort();
    assert_eq!(names, vec!["app.js", "logs/"]);
}

#[test]
fn test_strip_prefix_above_directory() {
    let dir = project(&[("bot/main.rb", "puts 1")]);

    let bytes = Packer::new()
        .zip_directory(&dir.path().join("bot"), dir.path())
        .unwrap();

    assert_eq!(entry_names(&bytes), vec!["bot/main.rb"]);
}

#[test]
fn test_archives_are_deterministic() {
    let dir = project(&[("b.txt", "b"), ("a.txt", "a"), ("c/d.txt", "d")]);
    let packer = Packer::new();

    let first = packer.zip_directory(dir.path(), dir.path()).unwrap();
    let second = packer.zip_directory(dir.path(), dir.path()).unwrap();

    assert_eq!(entry_names(&first), vec!["a.txt", "b.txt", "c/d.txt"]);
    assert_eq!(entry_names(&first), entry_names(&second));
}
