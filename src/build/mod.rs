//! Artifact building
//!
//! Turns a detected runtime plus a project context into the [`Artifact`] to
//! upload. Compiled runtimes (Go, Rust) are built first and only their output
//! is shipped; if the build does not succeed the whole source tree is zipped
//! instead. Interpreted runtimes always ship the source tree. When there is no
//! project directory, the first selected file is sent as-is.

mod runner;

pub use runner::{BuildCommand, BuildRunner, BuildStatus, SystemRunner};

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::artifact::Artifact;
use crate::bundle::{is_executable, BundleError, Packer};
use crate::runtime::{ProjectContext, RuntimeKind};

/// Go build output, relative to the project directory
pub const GO_OUTPUT: &str = "build/discloud_bin";

/// Cargo release output directory, relative to the project directory
pub const RUST_OUTPUT_DIR: &str = "target/release";

/// Errors for artifact building
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("packaging failed: {0}")]
    Bundle(#[from] BundleError),

    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("nothing to package for {runtime} project: no project directory and no selected file")]
    NothingToPackage { runtime: RuntimeKind },
}

/// Builds upload artifacts
pub struct ArtifactBuilder {
    runner: Arc<dyn BuildRunner>,
    packer: Packer,
}

impl ArtifactBuilder {
    pub fn new(runner: Arc<dyn BuildRunner>) -> Self {
        Self {
            runner,
            packer: Packer::new(),
        }
    }

    /// Builder that runs real build tools as child processes
    pub fn system() -> Self {
        Self::new(Arc::new(SystemRunner::new()))
    }

    /// Use a packer with custom exclusions
    pub fn with_packer(mut self, packer: Packer) -> Self {
        self.packer = packer;
        self
    }

    pub fn build_context(&self, runtime: RuntimeKind, ctx: &ProjectContext) -> Result<Artifact, BuildError> {
        self.build(runtime, ctx.base_dir(), &ctx.selected_files)
    }

    /// Produce the artifact for `runtime`.
    ///
    /// Either returns a complete artifact or an error; build tool failures are
    /// never errors, they select the next packaging strategy.
    pub fn build(
        &self,
        runtime: RuntimeKind,
        base_dir: Option<&Path>,
        selected_files: &[PathBuf],
    ) -> Result<Artifact, BuildError> {
        // A directory that no longer exists counts as no directory
        let base_dir = base_dir.filter(|d| d.is_dir());
        let artifact = match runtime {
            RuntimeKind::Java => self.build_java(base_dir, selected_files)?,
            RuntimeKind::Go => self.build_go(base_dir, selected_files)?,
            RuntimeKind::Rust => self.build_rust(base_dir, selected_files)?,
            RuntimeKind::Python | RuntimeKind::Php | RuntimeKind::Ruby => {
                match base_dir {
                    Some(dir) => self.zip_project(dir, &format!("-{}", runtime))?,
                    None => first_file(selected_files)?,
                }
            }
            RuntimeKind::Unknown => match selected_files.first() {
                Some(file) => read_file(file)?,
                None => match base_dir {
                    Some(dir) => self.zip_project(dir, "")?,
                    None => None,
                },
            },
        };

        let artifact = artifact.ok_or(BuildError::NothingToPackage { runtime })?;
        tracing::info!(
            runtime = %runtime,
            filename = artifact.filename(),
            size = artifact.size(),
            sha256 = %artifact.sha256(),
            "artifact ready"
        );
        Ok(artifact)
    }

    fn build_java(&self, base_dir: Option<&Path>, selected: &[PathBuf]) -> Result<Option<Artifact>, BuildError> {
        let jar = selected
            .iter()
            .find(|f| f.extension().and_then(|e| e.to_str()) == Some("jar"));
        if let Some(jar) = jar {
            return read_file(jar);
        }

        match base_dir {
            Some(dir) => self.zip_project(dir, ""),
            None => first_file(selected),
        }
    }

    fn build_go(&self, base_dir: Option<&Path>, selected: &[PathBuf]) -> Result<Option<Artifact>, BuildError> {
        let Some(dir) = base_dir else {
            return first_file(selected);
        };

        let status = self.runner.run(&BuildCommand::go(), dir);
        let binary = dir.join(GO_OUTPUT);
        if status.is_success() && binary.is_file() {
            let strip = binary.parent().unwrap_or(dir);
            let bytes = self.packer.zip_files(&[binary.clone()], strip)?;
            return Ok(Some(Artifact::new(format!("{}-go.zip", dir_name(dir)), bytes)));
        }

        log_fallback(RuntimeKind::Go, &status);
        self.zip_project(dir, "-src")
    }

    fn build_rust(&self, base_dir: Option<&Path>, selected: &[PathBuf]) -> Result<Option<Artifact>, BuildError> {
        let Some(dir) = base_dir else {
            return first_file(selected);
        };

        let status = self.runner.run(&BuildCommand::cargo_release(), dir);
        if status.is_success() {
            let release = dir.join(RUST_OUTPUT_DIR);
            let binaries = executables_in(&release);
            if !binaries.is_empty() {
                let bytes = self.packer.zip_files(&binaries, &release)?;
                return Ok(Some(Artifact::new(
                    format!("{}-rust-bin.zip", dir_name(dir)),
                    bytes,
                )));
            }
            tracing::warn!(dir = %release.display(), "build succeeded but produced no executables");
        }

        log_fallback(RuntimeKind::Rust, &status);
        self.zip_project(dir, "-src")
    }

    /// Zip the whole project as `{dirname}{suffix}.zip`
    fn zip_project(&self, dir: &Path, suffix: &str) -> Result<Option<Artifact>, BuildError> {
        let bytes = self.packer.zip_directory(dir, dir)?;
        Ok(Some(Artifact::new(
            format!("{}{}.zip", dir_name(dir), suffix),
            bytes,
        )))
    }
}

fn log_fallback(runtime: RuntimeKind, status: &BuildStatus) {
    match status {
        BuildStatus::Failed { stderr_tail, .. } if !stderr_tail.is_empty() => {
            tracing::warn!(runtime = %runtime, status = %status, stderr = %stderr_tail, "build unsuccessful, shipping sources");
        }
        _ => {
            tracing::warn!(runtime = %runtime, status = %status, "build unsuccessful, shipping sources");
        }
    }
}

fn read_file(path: &Path) -> Result<Option<Artifact>, BuildError> {
    Artifact::from_file(path)
        .map(Some)
        .map_err(|source| BuildError::Read {
            path: path.to_path_buf(),
            source,
        })
}

fn first_file(selected: &[PathBuf]) -> Result<Option<Artifact>, BuildError> {
    match selected.first() {
        Some(file) => read_file(file),
        None => Ok(None),
    }
}

/// Executable regular files directly inside `dir`, sorted by name
fn executables_in(dir: &Path) -> Vec<PathBuf> {
    let Ok(read) = fs::read_dir(dir) else {
        return Vec::new();
    };

    let mut found: Vec<PathBuf> = read
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && is_executable(path))
        .collect();
    found.sort();
    found
}

/// Final path component of the project directory
pub fn dir_name(dir: &Path) -> String {
    let name = match dir.file_name() {
        Some(name) => Some(name.to_os_string()),
        None => dir
            .canonicalize()
            .ok()
            .and_then(|p| p.file_name().map(|n| n.to_os_string())),
    };
    name.map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "project".to_string())
}
