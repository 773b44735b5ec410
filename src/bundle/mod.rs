//! Archive packing
//!
//! Walks a project tree (or a list of files) and produces an in-memory zip
//! archive. Entries are visited top-down in file-name order so the same tree
//! always yields the same entry sequence. Paths are stored relative to a strip
//! prefix with `/` separators; entries matching [`ExcludeRules`] are skipped
//! and excluded directories are not descended into.

mod exclude;

pub use exclude::{normalize, ExcludeError, ExcludeRules, DEFAULT_EXCLUDES};

use std::collections::HashSet;
use std::fs;
use std::io::{self, Cursor, Write};
use std::path::{Path, PathBuf};

use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Errors for packing operations
#[derive(Debug, thiserror::Error)]
pub enum BundleError {
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),

    #[error("Exclude rules error: {0}")]
    ExcludeError(#[from] ExcludeError),

    #[error("Walk error: {0}")]
    WalkError(#[from] walkdir::Error),

    #[error("Zip error: {0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),
}

/// Kind of a collected entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntryKind {
    File,
    Directory,
}

/// A path to pack plus its name inside the archive
#[derive(Debug)]
struct Entry {
    source: PathBuf,
    name: String,
    kind: EntryKind,
}

/// Zip archive packer
#[derive(Debug, Clone, Default)]
pub struct Packer {
    exclude: ExcludeRules,
}

impl Packer {
    /// Create a packer with the default exclusions
    pub fn new() -> Self {
        Self::default()
    }

    /// Use the given exclusion rules
    pub fn with_rules(mut self, exclude: ExcludeRules) -> Self {
        self.exclude = exclude;
        self
    }

    /// Add custom exclude patterns
    pub fn with_excludes<S: AsRef<str>>(mut self, patterns: &[S]) -> Result<Self, BundleError> {
        self.exclude = self.exclude.with_patterns(patterns)?;
        Ok(self)
    }

    /// Pack every non-excluded entry under `dir`, named relative to `strip_prefix`.
    ///
    /// Directories are only recorded when nothing beneath them was packed, so
    /// empty directories survive extraction without duplicating parent entries.
    pub fn zip_directory(&self, dir: &Path, strip_prefix: &Path) -> Result<Vec<u8>, BundleError> {
        if !dir.is_dir() {
            return Err(BundleError::NotADirectory(dir.to_path_buf()));
        }

        let entries = self.collect_entries(dir, strip_prefix)?;
        let entries = retain_leaf_directories(entries);
        let bytes = write_archive(&entries)?;

        tracing::debug!(
            dir = %dir.display(),
            entries = entries.len(),
            bytes = bytes.len(),
            "packed directory"
        );
        Ok(bytes)
    }

    /// Pack the given files, named relative to `strip_prefix`.
    ///
    /// Files outside `strip_prefix` are stored under their bare file name.
    /// Directories and excluded paths in the list are skipped, as are later
    /// files that would collide with an earlier entry's name.
    pub fn zip_files(&self, files: &[PathBuf], strip_prefix: &Path) -> Result<Vec<u8>, BundleError> {
        let mut seen = HashSet::new();
        let mut entries = Vec::new();

        for file in files {
            if file.is_dir() {
                continue;
            }

            let rel = match file.strip_prefix(strip_prefix) {
                Ok(rel) => rel.to_path_buf(),
                Err(_) => match file.file_name() {
                    Some(name) => PathBuf::from(name),
                    None => continue,
                },
            };

            if self.exclude.is_excluded(&rel) {
                continue;
            }

            let name = normalize(&rel);
            if name.is_empty() || !seen.insert(name.clone()) {
                tracing::warn!(file = %file.display(), "skipping duplicate archive entry");
                continue;
            }

            entries.push(Entry {
                source: file.clone(),
                name,
                kind: EntryKind::File,
            });
        }

        write_archive(&entries)
    }

    /// Collect entries under `dir` in walk order (parents before children)
    fn collect_entries(&self, dir: &Path, strip_prefix: &Path) -> Result<Vec<Entry>, BundleError> {
        let root = dir.canonicalize()?;
        let mut entries = Vec::new();

        let walker = WalkDir::new(dir)
            .follow_links(false)
            .sort_by(|a, b| a.file_name().cmp(b.file_name()))
            .into_iter()
            .filter_entry(|e| {
                e.depth() == 0
                    || !self
                        .exclude
                        .is_excluded(&relative_to(e.path(), strip_prefix))
            });

        for entry in walker {
            let entry = entry?;
            if entry.depth() == 0 {
                continue;
            }

            let path = entry.path();
            let name = normalize(&relative_to(path, strip_prefix));
            if name.is_empty() {
                continue;
            }

            let file_type = entry.file_type();
            let kind = if file_type.is_symlink() {
                let Ok(target) = fs::canonicalize(path) else {
                    tracing::warn!(path = %path.display(), "skipping dangling symlink");
                    continue;
                };
                if !target.starts_with(&root) {
                    tracing::warn!(
                        path = %path.display(),
                        target = %target.display(),
                        "skipping symlink that leaves the project"
                    );
                    continue;
                }
                if target.is_dir() {
                    // Not descended; the real directory is packed under its own name
                    tracing::debug!(path = %path.display(), "skipping directory symlink");
                    continue;
                }
                EntryKind::File
            } else if file_type.is_dir() {
                EntryKind::Directory
            } else {
                EntryKind::File
            };

            entries.push(Entry {
                source: path.to_path_buf(),
                name,
                kind,
            });
        }

        Ok(entries)
    }
}

/// Path of `path` relative to `prefix`, or `path` itself when not under it
fn relative_to(path: &Path, prefix: &Path) -> PathBuf {
    path.strip_prefix(prefix).unwrap_or(path).to_path_buf()
}

/// Drop directory entries that have packed descendants.
///
/// Relies on walk order: a directory's children immediately follow it.
fn retain_leaf_directories(entries: Vec<Entry>) -> Vec<Entry> {
    let keep: Vec<bool> = entries
        .iter()
        .enumerate()
        .map(|(i, entry)| {
            if entry.kind != EntryKind::Directory {
                return true;
            }
            let prefix = format!("{}/", entry.name);
            !entries
                .get(i + 1)
                .map(|next| next.name.starts_with(&prefix))
                .unwrap_or(false)
        })
        .collect();

    entries
        .into_iter()
        .zip(keep)
        .filter_map(|(entry, keep)| keep.then_some(entry))
        .collect()
}

fn write_archive(entries: &[Entry]) -> Result<Vec<u8>, BundleError> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));

    for entry in entries {
        match entry.kind {
            EntryKind::Directory => {
                let options = SimpleFileOptions::default().unix_permissions(0o755);
                writer.add_directory(entry.name.as_str(), options)?;
            }
            EntryKind::File => {
                let contents = fs::read(&entry.source)?;
                // Preserve executable bit, normalize others
                let mode = if is_executable(&entry.source) {
                    0o755
                } else {
                    0o644
                };
                let options = SimpleFileOptions::default()
                    .compression_method(CompressionMethod::Deflated)
                    .unix_permissions(mode);
                writer.start_file(entry.name.as_str(), options)?;
                writer.write_all(&contents)?;
            }
        }
    }

    let cursor = writer.finish()?;
    Ok(cursor.into_inner())
}

/// Check if a file is executable
pub(crate) fn is_executable(path: &Path) -> bool {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Ok(metadata) = fs::metadata(path) {
            return metadata.permissions().mode() & 0o111 != 0;
        }
        false
    }
    #[cfg(not(unix))]
    {
        path.extension()
            .map(|e| e.eq_ignore_ascii_case("exe"))
            .unwrap_or(false)
    }
}
