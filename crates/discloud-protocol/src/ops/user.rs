//! `GET /user`

use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;

/// Response of `GET /user`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserResponse {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    pub user: UserInfo,
}

/// Account summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    #[serde(rename = "userID")]
    pub user_id: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(rename = "totalRamMb", default)]
    pub total_ram_mb: u32,
    #[serde(rename = "ramUsedMb", default)]
    pub ram_used_mb: u32,
    /// IDs of the apps owned by this account.
    #[serde(default)]
    pub apps: Vec<String>,
}

impl UserResponse {
    pub fn from_slice(body: &[u8]) -> Result<Self, ProtocolError> {
        serde_json::from_slice(body).map_err(|e| ProtocolError::decode("user", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_user() {
        let body = br#"{
            "status": "ok",
            "message": "User fetched",
            "user": {
                "userID": "1234",
                "username": "capy",
                "totalRamMb": 1024,
                "ramUsedMb": 356,
                "apps": ["a1", "a2"],
                "plan": "Gold"
            }
        }"#;
        let resp = UserResponse::from_slice(body).unwrap();
        assert_eq!(resp.user.user_id, "1234");
        assert_eq!(resp.user.total_ram_mb, 1024);
        assert_eq!(resp.user.apps, vec!["a1", "a2"]);
    }

    #[test]
    fn test_parse_user_without_apps() {
        let body = br#"{"status":"ok","user":{"userID":"1"}}"#;
        let resp = UserResponse::from_slice(body).unwrap();
        assert!(resp.user.apps.is_empty());
        assert_eq!(resp.user.username, None);
    }

    #[test]
    fn test_parse_user_missing_user_is_error() {
        let err = UserResponse::from_slice(br#"{"status":"ok"}"#).unwrap_err();
        assert!(matches!(err, ProtocolError::Decode { what: "user", .. }));
    }
}
