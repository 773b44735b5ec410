//! Discloud deploy client
//!
//! Packages projects and manages apps hosted on Discloud. The core is the
//! commit pipeline: detect the project's runtime, build it when the runtime
//! has a build step, zip the result (or the sources) and upload it to the
//! commit endpoint. Around it sit typed wrappers for the rest of the REST API.

pub mod api;
pub mod artifact;
pub mod build;
pub mod bundle;
pub mod commit;
pub mod config;
pub mod mock;
pub mod pipeline;
pub mod runtime;
pub mod transport;

pub use api::{ApiError, ApiToken, DiscloudClient, PowerAction, Scope};
pub use artifact::Artifact;
pub use build::{ArtifactBuilder, BuildError, BuildRunner, BuildStatus, SystemRunner};
pub use bundle::{BundleError, ExcludeRules, Packer};
pub use commit::{CommitUploader, UploadResult};
pub use config::{DiscloudConfig, Settings};
pub use pipeline::{spawn_commit, CommitJob, CommitOutcome, CommitPipeline, PipelineError};
pub use runtime::{detect, ProjectContext, RuntimeKind};
pub use transport::{HttpTransport, ReqwestTransport, TransportError};
