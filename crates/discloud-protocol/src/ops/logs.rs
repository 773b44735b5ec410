//! `GET /{scope}/{id}/logs`

use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogsResponse {
    #[serde(default)]
    pub status: Option<String>,
    pub apps: AppLogs,
}

impl LogsResponse {
    pub fn from_slice(body: &[u8]) -> Result<Self, ProtocolError> {
        serde_json::from_slice(body).map_err(|e| ProtocolError::decode("logs", e))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppLogs {
    pub id: String,
    pub terminal: Terminal,
}

/// Console output. `big` is the full tail, `small` the last few lines.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Terminal {
    #[serde(default)]
    pub big: String,
    #[serde(default)]
    pub small: String,
    #[serde(default)]
    pub url: String,
}
