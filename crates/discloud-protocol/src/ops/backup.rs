//! `GET /{scope}/{id}/backup`

use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupResponse {
    #[serde(default)]
    pub status: Option<String>,
    pub backups: BackupInfo,
}

impl BackupResponse {
    pub fn from_slice(body: &[u8]) -> Result<Self, ProtocolError> {
        serde_json::from_slice(body).map_err(|e| ProtocolError::decode("backup", e))
    }
}

/// Where to download the backup archive from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupInfo {
    pub id: String,
    #[serde(default)]
    pub status: Option<String>,
    pub url: String,
}
