//! `POST /upload`

use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;

/// Response of a project upload. `app` is only present once the platform has
/// accepted and registered the new app.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UploadResponse {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub app: Option<serde_json::Value>,
}

impl UploadResponse {
    pub fn from_slice(body: &[u8]) -> Result<Self, ProtocolError> {
        serde_json::from_slice(body).map_err(|e| ProtocolError::decode("upload", e))
    }

    /// Id of the registered app, when the platform returned one
    pub fn app_id(&self) -> Option<&str> {
        self.app.as_ref()?.get("id")?.as_str()
    }
}
