//! `GET /app/{id}`, `GET /{scope}/{id}/status`, `PUT /{scope}/{id}/ram`

use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;

/// Response of `GET /app/{id}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppResponse {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    pub apps: AppInfo,
}

impl AppResponse {
    pub fn from_slice(body: &[u8]) -> Result<Self, ProtocolError> {
        serde_json::from_slice(body).map_err(|e| ProtocolError::decode("app", e))
    }
}

/// A hosted application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppInfo {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub online: bool,
    /// Allocated RAM in MB.
    #[serde(default)]
    pub ram: u32,
    #[serde(rename = "avatarURL", default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lang: Option<String>,
    #[serde(rename = "mainFile", default, skip_serializing_if = "Option::is_none")]
    pub main_file: Option<String>,
}

impl AppInfo {
    /// `online` / `offline`
    pub fn state_label(&self) -> &'static str {
        if self.online {
            "online"
        } else {
            "offline"
        }
    }
}

/// Response of `GET /{scope}/{id}/status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppStatusResponse {
    #[serde(default)]
    pub status: Option<String>,
    pub apps: AppStatus,
}

impl AppStatusResponse {
    pub fn from_slice(body: &[u8]) -> Result<Self, ProtocolError> {
        serde_json::from_slice(body).map_err(|e| ProtocolError::decode("status", e))
    }
}

/// Container metrics for one app. All values are preformatted by the API.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppStatus {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<String>,
    #[serde(rename = "netIO", default, skip_serializing_if = "Option::is_none")]
    pub net_io: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssd: Option<String>,
    #[serde(rename = "startedAt", default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<String>,
}

/// Body of `PUT /{scope}/{id}/ram`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RamRequest {
    #[serde(rename = "ramMB")]
    pub ram_mb: u32,
}
