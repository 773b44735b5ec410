//! Team membership (`/app/{id}/team`) and team-member app listing (`/team`).

use serde::{Deserialize, Serialize};

use super::app::AppInfo;
use crate::error::ProtocolError;

/// Response of `GET /app/{id}/team`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamResponse {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub team: Vec<TeamMember>,
}

impl TeamResponse {
    pub fn from_slice(body: &[u8]) -> Result<Self, ProtocolError> {
        serde_json::from_slice(body).map_err(|e| ProtocolError::decode("team", e))
    }
}

/// A moderator and the permissions granted to them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamMember {
    #[serde(rename = "modID")]
    pub mod_id: String,
    #[serde(default)]
    pub perms: Vec<String>,
}

/// Body of `POST`/`PUT /app/{id}/team`.
pub type TeamMemberRequest = TeamMember;

/// Response of `GET /team`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamAppsResponse {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub apps: Vec<AppInfo>,
}

impl TeamAppsResponse {
    pub fn from_slice(body: &[u8]) -> Result<Self, ProtocolError> {
        serde_json::from_slice(body).map_err(|e| ProtocolError::decode("team apps", e))
    }
}

/// Split a comma-separated permission list, dropping blanks.
pub fn parse_perms(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}
