//! Discloud Protocol Types
//!
//! Defines the JSON bodies exchanged with the Discloud REST API (v2), plus the
//! rule used to turn any response body into a human-readable message.

pub mod error;
pub mod ops;
pub mod response;

pub use error::ProtocolError;
pub use ops::team::parse_perms;
pub use ops::{
    AppInfo, AppLogs, AppResponse, AppStatus, AppStatusResponse, BackupInfo, BackupResponse,
    LogsResponse, RamRequest, TeamAppsResponse, TeamMember, TeamMemberRequest, TeamResponse,
    Terminal, UploadResponse, UserInfo, UserResponse,
};
pub use response::{extract_message, StatusEnvelope, UNKNOWN_ERROR};

/// Production base URL (API v2).
pub const API_BASE_URL: &str = "https://api.discloud.app/v2";

/// Header carrying the API token on every request.
pub const TOKEN_HEADER: &str = "api-token";

/// Value of the `status` field on successful responses.
pub const STATUS_OK: &str = "ok";

/// Value of the `status` field on rejected requests.
pub const STATUS_ERROR: &str = "error";
