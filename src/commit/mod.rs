//! Artifact upload
//!
//! Sends an [`Artifact`] to the commit endpoint (update an existing app) or
//! the upload endpoint (register a new app from a project zip). Neither call
//! fails past this boundary: every outcome, including transport errors, is
//! returned as an [`UploadResult`] ready to show to the user.

use std::fmt;
use std::sync::Arc;

use discloud_protocol::{extract_message, StatusEnvelope, UploadResponse, API_BASE_URL, TOKEN_HEADER};

use crate::api::{ApiToken, Scope};
use crate::artifact::Artifact;
use crate::runtime::RuntimeKind;
use crate::transport::{Body, FormPart, HttpRequest, HttpTransport, Method};

/// Content type of committed artifacts
pub const COMMIT_CONTENT_TYPE: &str = "application/octet-stream";

/// Content type of project uploads
pub const PROJECT_CONTENT_TYPE: &str = "application/zip";

/// Outcome of an upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadResult {
    /// The server answered (with any status)
    Completed {
        filename: String,
        status: u16,
        message: String,
    },
    /// No response was received
    Failed { filename: String, reason: String },
}

impl UploadResult {
    pub fn filename(&self) -> &str {
        match self {
            UploadResult::Completed { filename, .. } | UploadResult::Failed { filename, .. } => filename,
        }
    }

    /// HTTP status, when the server answered
    pub fn status(&self) -> Option<u16> {
        match self {
            UploadResult::Completed { status, .. } => Some(*status),
            UploadResult::Failed { .. } => None,
        }
    }

    /// True when the server answered 2xx
    pub fn is_success(&self) -> bool {
        matches!(self.status(), Some(status) if (200..300).contains(&status))
    }
}

impl fmt::Display for UploadResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UploadResult::Completed {
                filename,
                status,
                message,
            } => write!(f, "Uploaded {} → Status: {}\n{}", filename, status, message),
            UploadResult::Failed { filename, reason } => {
                write!(f, "Error uploading {}: {}", filename, reason)
            }
        }
    }
}

/// Uploads artifacts to the platform
pub struct CommitUploader {
    transport: Arc<dyn HttpTransport>,
    base_url: String,
}

impl CommitUploader {
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            transport,
            base_url: API_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Commit `artifact` to an app the user owns
    pub fn upload(
        &self,
        artifact: &Artifact,
        api_key: &ApiToken,
        app_id: &str,
        runtime_tag: Option<RuntimeKind>,
    ) -> UploadResult {
        self.upload_scoped(artifact, api_key, Scope::App, app_id, runtime_tag)
    }

    /// Commit `artifact` as owner or team member.
    ///
    /// The optional `runtime` text field is sent before the `file` field.
    pub fn upload_scoped(
        &self,
        artifact: &Artifact,
        api_key: &ApiToken,
        scope: Scope,
        app_id: &str,
        runtime_tag: Option<RuntimeKind>,
    ) -> UploadResult {
        let mut parts = Vec::with_capacity(2);
        if let Some(runtime) = runtime_tag {
            parts.push(FormPart::text("runtime", runtime.as_str()));
        }
        parts.push(FormPart::file(
            "file",
            artifact.filename(),
            COMMIT_CONTENT_TYPE,
            artifact.bytes().to_vec(),
        ));

        let url = format!("{}/{}/{}/commit", self.base_url, scope.segment(), app_id.trim());
        let result = self.send(Method::Put, url, api_key, artifact, parts);
        tracing::info!(app_id = %app_id, result = ?result.status(), "commit finished");
        result
    }

    /// Register a new app from a project zip (`discloud.config` inside)
    pub fn upload_project(&self, artifact: &Artifact, api_key: &ApiToken) -> UploadResult {
        let parts = vec![FormPart::file(
            "file",
            artifact.filename(),
            PROJECT_CONTENT_TYPE,
            artifact.bytes().to_vec(),
        )];

        let url = format!("{}/upload", self.base_url);
        let result = self.send(Method::Post, url, api_key, artifact, parts);
        if let UploadResult::Completed { .. } = result {
            tracing::info!(result = ?result.status(), "project upload finished");
        }
        result
    }

    fn send(
        &self,
        method: Method,
        url: String,
        api_key: &ApiToken,
        artifact: &Artifact,
        parts: Vec<FormPart>,
    ) -> UploadResult {
        let request = HttpRequest::new(method, url)
            .with_header(TOKEN_HEADER, api_key.as_str())
            .with_header("Accept", "application/json")
            .with_body(Body::Multipart(parts));

        tracing::debug!(
            method = %method,
            filename = artifact.filename(),
            size = artifact.size(),
            "uploading artifact"
        );

        match self.transport.send(&request) {
            Ok(response) => {
                if let Ok(parsed) = UploadResponse::from_slice(&response.body) {
                    if let Some(app_id) = parsed.app_id() {
                        tracing::info!(app_id = %app_id, "platform registered app");
                    }
                }
                if response.is_success()
                    && StatusEnvelope::parse(&response.body).is_some_and(|env| env.is_error())
                {
                    tracing::warn!(status = response.status, "upload answered with error status");
                }
                UploadResult::Completed {
                    filename: artifact.filename().to_string(),
                    status: response.status,
                    message: extract_message(&response.body),
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "upload failed");
                UploadResult::Failed {
                    filename: artifact.filename().to_string(),
                    reason: e.to_string(),
                }
            }
        }
    }
}
