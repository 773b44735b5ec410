//! Endpoint-specific bodies.

pub mod app;
pub mod backup;
pub mod logs;
pub mod team;
pub mod upload;
pub mod user;

pub use app::{AppInfo, AppResponse, AppStatus, AppStatusResponse, RamRequest};
pub use backup::{BackupInfo, BackupResponse};
pub use logs::{AppLogs, LogsResponse, Terminal};
pub use team::{TeamAppsResponse, TeamMember, TeamMemberRequest, TeamResponse};
pub use upload::UploadResponse;
pub use user::{UserInfo, UserResponse};
