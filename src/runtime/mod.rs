//! Runtime detection
//!
//! Classifies a project into one of a fixed set of runtimes by looking for
//! marker files at the project root, then at the extensions of the files the
//! user selected. Detection never fails: no match means `Unknown`.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Language ecosystem inferred for a project
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeKind {
    Java,
    Go,
    Rust,
    Python,
    Php,
    Ruby,
    Unknown,
}

impl RuntimeKind {
    /// Lowercase name used in artifact filenames and the upload `runtime` field
    pub fn as_str(&self) -> &'static str {
        match self {
            RuntimeKind::Java => "java",
            RuntimeKind::Go => "go",
            RuntimeKind::Rust => "rust",
            RuntimeKind::Python => "python",
            RuntimeKind::Php => "php",
            RuntimeKind::Ruby => "ruby",
            RuntimeKind::Unknown => "unknown",
        }
    }

    /// Whether the runtime has a build step before packaging
    pub fn has_build_step(&self) -> bool {
        matches!(self, RuntimeKind::Go | RuntimeKind::Rust)
    }
}

impl fmt::Display for RuntimeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Marker files checked at the project root, in priority order
const MARKERS: &[(&[&str], RuntimeKind)] = &[
    (&["go.mod"], RuntimeKind::Go),
    (&["Cargo.toml"], RuntimeKind::Rust),
    (
        &["pyproject.toml", "requirements.txt", "setup.py"],
        RuntimeKind::Python,
    ),
    (&["composer.json"], RuntimeKind::Php),
    (&["Gemfile"], RuntimeKind::Ruby),
    (&["pom.xml", "build.gradle"], RuntimeKind::Java),
];

/// Selected-file extensions, in priority order
const EXTENSIONS: &[(&str, RuntimeKind)] = &[
    ("jar", RuntimeKind::Java),
    ("go", RuntimeKind::Go),
    ("rs", RuntimeKind::Rust),
    ("py", RuntimeKind::Python),
    ("php", RuntimeKind::Php),
    ("rb", RuntimeKind::Ruby),
];

/// Project directory (if one is open) plus the files the user selected
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectContext {
    pub base_dir: Option<PathBuf>,
    pub selected_files: Vec<PathBuf>,
}

impl ProjectContext {
    pub fn new(base_dir: Option<PathBuf>, selected_files: Vec<PathBuf>) -> Self {
        Self {
            base_dir,
            selected_files,
        }
    }

    /// Context with only a project directory
    pub fn directory(base_dir: impl Into<PathBuf>) -> Self {
        Self::new(Some(base_dir.into()), Vec::new())
    }

    /// Context with only loose files
    pub fn files(selected_files: Vec<PathBuf>) -> Self {
        Self::new(None, selected_files)
    }

    pub fn base_dir(&self) -> Option<&Path> {
        self.base_dir.as_deref()
    }

    pub fn first_file(&self) -> Option<&Path> {
        self.selected_files.first().map(PathBuf::as_path)
    }

    pub fn detect_runtime(&self) -> RuntimeKind {
        detect(self.base_dir(), &self.selected_files)
    }
}

/// Classify a project.
///
/// Marker files at `base_dir` take precedence; the selected files' extensions
/// are only consulted when there is no directory or no marker matched.
pub fn detect(base_dir: Option<&Path>, selected_files: &[PathBuf]) -> RuntimeKind {
    if let Some(dir) = base_dir {
        if let Some(kind) = detect_by_markers(dir) {
            tracing::debug!(dir = %dir.display(), runtime = %kind, "runtime detected from marker file");
            return kind;
        }
    }

    if let Some(kind) = detect_by_extension(selected_files) {
        tracing::debug!(runtime = %kind, "runtime detected from selected files");
        return kind;
    }

    RuntimeKind::Unknown
}

fn detect_by_markers(dir: &Path) -> Option<RuntimeKind> {
    MARKERS
        .iter()
        .find(|(names, _)| names.iter().any(|name| dir.join(name).exists()))
        .map(|(_, kind)| *kind)
}

fn detect_by_extension(files: &[PathBuf]) -> Option<RuntimeKind> {
    EXTENSIONS
        .iter()
        .find(|(ext, _)| {
            files
                .iter()
                .any(|f| f.extension().and_then(|e| e.to_str()) == Some(*ext))
        })
        .map(|(_, kind)| *kind)
}
