//! Commit pipeline
//!
//! Sequences one user-initiated commit as a single unit of work:
//! - Detect the runtime
//! - Build and package the artifact
//! - Upload it to the commit endpoint
//!
//! [`spawn_commit`] runs the same unit on a background thread and hands the
//! outcome to a completion callback. Each commit owns its artifact; the only
//! thing shared between concurrent commits is the read-only transport.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use thiserror::Error;

use crate::api::{ApiToken, Scope};
use crate::artifact::Artifact;
use crate::build::{dir_name, ArtifactBuilder, BuildError, BuildRunner};
use crate::bundle::Packer;
use crate::commit::{CommitUploader, UploadResult};
use crate::config::{ConfigError, DiscloudConfig};
use crate::runtime::{ProjectContext, RuntimeKind};

/// Name of the background commit thread
pub const COMMIT_THREAD_NAME: &str = "discloud-commit";

/// Pipeline errors
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("no discloud.config in {0}; run `discloud init` first")]
    MissingProjectConfig(PathBuf),

    #[error("invalid discloud.config: {0}")]
    ProjectConfig(#[from] ConfigError),

    #[error("packaging failed: {0}")]
    Packaging(#[from] BuildError),

    #[error("failed to start commit thread: {0}")]
    Spawn(#[source] io::Error),
}

impl PipelineError {
    /// Process exit code for this error family
    pub fn exit_code(&self) -> i32 {
        match self {
            PipelineError::MissingProjectConfig(_) | PipelineError::ProjectConfig(_) => 1,
            PipelineError::Packaging(_) | PipelineError::Spawn(_) => 2,
        }
    }
}

/// Everything one commit needs
#[derive(Debug, Clone)]
pub struct CommitJob {
    pub context: ProjectContext,
    pub app_id: String,
    pub token: ApiToken,
    pub scope: Scope,
    /// Send the detected runtime as the `runtime` form field
    pub runtime_tag: bool,
    /// Extra exclusion globs on top of the defaults
    pub excludes: Vec<String>,
}

impl CommitJob {
    pub fn new(context: ProjectContext, app_id: impl Into<String>, token: ApiToken) -> Self {
        Self {
            context,
            app_id: app_id.into(),
            token,
            scope: Scope::App,
            runtime_tag: true,
            excludes: Vec::new(),
        }
    }

    pub fn with_scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    pub fn with_runtime_tag(mut self, runtime_tag: bool) -> Self {
        self.runtime_tag = runtime_tag;
        self
    }

    pub fn with_excludes(mut self, excludes: Vec<String>) -> Self {
        self.excludes = excludes;
        self
    }
}

/// Result of one commit
#[derive(Debug)]
pub enum CommitOutcome {
    /// An artifact was produced and an upload attempted
    Uploaded {
        runtime: RuntimeKind,
        result: UploadResult,
    },
    /// No artifact could be produced; nothing was sent
    PackagingFailed {
        runtime: RuntimeKind,
        error: BuildError,
    },
}

impl CommitOutcome {
    pub fn runtime(&self) -> RuntimeKind {
        match self {
            CommitOutcome::Uploaded { runtime, .. } | CommitOutcome::PackagingFailed { runtime, .. } => *runtime,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, CommitOutcome::Uploaded { result, .. } if result.is_success())
    }

    /// 0 on success, 2 for packaging failures, 3 for upload failures
    pub fn exit_code(&self) -> i32 {
        match self {
            CommitOutcome::Uploaded { result, .. } if result.is_success() => 0,
            CommitOutcome::Uploaded { .. } => 3,
            CommitOutcome::PackagingFailed { .. } => 2,
        }
    }
}

impl fmt::Display for CommitOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommitOutcome::Uploaded { result, .. } => write!(f, "{}", result),
            CommitOutcome::PackagingFailed { runtime, error } => {
                write!(f, "Error packaging {} project: {}", runtime, error)
            }
        }
    }
}

/// Detect, build and upload
pub struct CommitPipeline {
    runner: Arc<dyn BuildRunner>,
    uploader: CommitUploader,
}

impl CommitPipeline {
    pub fn new(runner: Arc<dyn BuildRunner>, uploader: CommitUploader) -> Self {
        Self { runner, uploader }
    }

    /// Detect the runtime and produce the artifact without uploading it
    pub fn prepare(&self, job: &CommitJob) -> (RuntimeKind, Result<Artifact, BuildError>) {
        let runtime = job.context.detect_runtime();
        tracing::info!(runtime = %runtime, app_id = %job.app_id, "runtime detected");

        let artifact = Packer::new()
            .with_excludes(&job.excludes)
            .map_err(BuildError::from)
            .and_then(|packer| {
                ArtifactBuilder::new(self.runner.clone())
                    .with_packer(packer)
                    .build_context(runtime, &job.context)
            });

        (runtime, artifact)
    }

    /// Run the whole commit on the calling thread
    pub fn run_commit(&self, job: &CommitJob) -> CommitOutcome {
        let (runtime, artifact) = self.prepare(job);
        let artifact = match artifact {
            Ok(artifact) => artifact,
            Err(error) => {
                tracing::warn!(runtime = %runtime, error = %error, "packaging failed, nothing uploaded");
                return CommitOutcome::PackagingFailed { runtime, error };
            }
        };

        let tag = job.runtime_tag.then_some(runtime);
        let result = self
            .uploader
            .upload_scoped(&artifact, &job.token, job.scope, &job.app_id, tag);

        CommitOutcome::Uploaded { runtime, result }
    }

    /// Zip a project directory for the upload endpoint.
    ///
    /// The directory must contain a valid `discloud.config`.
    pub fn package_project(&self, dir: &Path, excludes: &[String]) -> Result<Artifact, PipelineError> {
        if !DiscloudConfig::exists_in(dir) {
            return Err(PipelineError::MissingProjectConfig(dir.to_path_buf()));
        }
        let config = DiscloudConfig::load(dir)?;
        tracing::info!(name = %config.name, app_type = %config.app_type, "packaging project");

        let packer = Packer::new().with_excludes(excludes).map_err(BuildError::from)?;
        let bytes = packer.zip_directory(dir, dir).map_err(BuildError::from)?;
        Ok(Artifact::new(format!("{}-project.zip", dir_name(dir)), bytes))
    }

    /// Zip a project directory and register it as a new app
    pub fn upload_project(&self, dir: &Path, token: &ApiToken, excludes: &[String]) -> Result<UploadResult, PipelineError> {
        let artifact = self.package_project(dir, excludes)?;
        Ok(self.uploader.upload_project(&artifact, token))
    }
}

/// Run a commit on a background thread.
///
/// `on_complete` receives the outcome on that thread. The handle lets callers
/// wait for it; dropping the handle detaches the commit.
pub fn spawn_commit<F>(
    pipeline: Arc<CommitPipeline>,
    job: CommitJob,
    on_complete: F,
) -> Result<JoinHandle<()>, PipelineError>
where
    F: FnOnce(CommitOutcome) + Send + 'static,
{
    thread::Builder::new()
        .name(COMMIT_THREAD_NAME.to_string())
        .spawn(move || {
            let outcome = pipeline.run_commit(&job);
            on_complete(outcome);
        })
        .map_err(PipelineError::Spawn)
}
