//! Exclusion rules for archive packing
//!
//! Default exclusions name well-known dependency, VCS and build-output
//! directories. They match whole path components only, so `targetdir/` or
//! `rebuild.sh` are kept. Extra glob patterns may be layered on top.

use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::{Component, Path};

/// Path components that are never packed (compared case-insensitively)
pub const DEFAULT_EXCLUDES: &[&str] = &[
    ".git",
    "node_modules",
    "venv",
    "__pycache__",
    "target",
    "build",
    ".idea",
    ".gradle",
];

/// Errors for exclusion rules
#[derive(Debug, thiserror::Error)]
pub enum ExcludeError {
    #[error("Glob pattern error: {0}")]
    GlobError(#[from] globset::Error),
}

/// Exclusion rules for filtering archive entries
#[derive(Debug, Clone)]
pub struct ExcludeRules {
    extra: Option<GlobSet>,
}

impl Default for ExcludeRules {
    fn default() -> Self {
        Self::new()
    }
}

impl ExcludeRules {
    /// Create rules containing only the default exclusions
    pub fn new() -> Self {
        Self { extra: None }
    }

    /// Add glob patterns on top of the defaults
    pub fn with_patterns<S: AsRef<str>>(self, patterns: &[S]) -> Result<Self, ExcludeError> {
        let patterns: Vec<&str> = patterns
            .iter()
            .map(|p| p.as_ref().trim())
            .filter(|p| !p.is_empty())
            .collect();

        if patterns.is_empty() {
            return Ok(self);
        }

        let mut builder = GlobSetBuilder::new();
        for pattern in patterns {
            builder.add(Glob::new(pattern)?);
        }

        Ok(Self {
            extra: Some(builder.build()?),
        })
    }

    /// Check if a path (relative to the archive root) should be excluded
    pub fn is_excluded(&self, rel_path: &Path) -> bool {
        let default_hit = rel_path.components().any(|c| match c {
            Component::Normal(name) => {
                let name = name.to_string_lossy();
                DEFAULT_EXCLUDES
                    .iter()
                    .any(|ex| name.eq_ignore_ascii_case(ex))
            }
            _ => false,
        });

        if default_hit {
            return true;
        }

        match &self.extra {
            Some(set) => set.is_match(normalize(rel_path)),
            None => false,
        }
    }
}

/// Relative path with `/` separators, as stored in the archive
pub fn normalize(rel_path: &Path) -> String {
    rel_path
        .components()
        .filter_map(|c| match c {
            Component::Normal(name) => Some(name.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_excludes_git() {
        let rules = ExcludeRules::new();

        assert!(rules.is_excluded(Path::new(".git")));
        assert!(rules.is_excluded(Path::new(".git/config")));
        assert!(rules.is_excluded(Path::new(".git/objects/pack")));
    }

    #[test]
    fn test_nested_segments_excluded() {
        let rules = ExcludeRules::new();

        assert!(rules.is_excluded(Path::new("web/node_modules/lodash/index.js")));
        assert!(rules.is_excluded(Path::new("a/target/x")));
        assert!(rules.is_excluded(Path::new("pkg/__pycache__/mod.pyc")));
        assert!(rules.is_excluded(Path::new("app/.gradle/caches")));
    }

    #[test]
    fn test_case_insensitive() {
        let rules = ExcludeRules::new();

        assert!(rules.is_excluded(Path::new("BUILD/x")));
        assert!(rules.is_excluded(Path::new("Venv/lib")));
    }

    #[test]
    fn test_partial_segments_not_excluded() {
        let rules = ExcludeRules::new();

        assert!(!rules.is_excluded(Path::new("targetdir/x.txt")));
        assert!(!rules.is_excluded(Path::new("rebuild.sh")));
        assert!(!rules.is_excluded(Path::new("src/build_info.rs")));
        assert!(!rules.is_excluded(Path::new("my.git/config")));
    }

    #[test]
    fn test_normal_files_not_excluded() {
        let rules = ExcludeRules::new();

        assert!(!rules.is_excluded(Path::new("main.py")));
        assert!(!rules.is_excluded(Path::new("src/main.go")));
        assert!(!rules.is_excluded(Path::new("discloud.config")));
    }

    #[test]
    fn test_custom_patterns() {
        let rules = ExcludeRules::new()
            .with_patterns(&["*.log", "temp/**"])
            .unwrap();

        assert!(rules.is_excluded(Path::new("debug.log")));
        assert!(rules.is_excluded(Path::new("temp/file.txt")));
        // Default excludes still work
        assert!(rules.is_excluded(Path::new(".git")));
        assert!(!rules.is_excluded(Path::new("src/app.py")));
    }

    #[test]
    fn test_blank_patterns_ignored() {
        let rules = ExcludeRules::new().with_patterns(&["", "   "]).unwrap();
        assert!(!rules.is_excluded(Path::new("anything.txt")));
    }

    #[test]
    fn test_invalid_pattern() {
        let err = ExcludeRules::new().with_patterns(&["a[b"]).unwrap_err();
        assert!(matches!(err, ExcludeError::GlobError(_)));
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize(Path::new("src/main.go")), "src/main.go");
        assert_eq!(normalize(Path::new("./src//lib.rs")), "src/lib.rs");
    }
}
