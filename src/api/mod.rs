//! Discloud REST client
//!
//! Typed wrappers over the v2 endpoints for app management and team
//! membership. Every call carries the [`ApiToken`] it was constructed with;
//! nothing is read from process-wide state.
//!
//! A request fails when the transport fails, when the server answers non-2xx,
//! or when a 2xx body carries `"status": "error"`.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use discloud_protocol::{
    extract_message, AppInfo, AppResponse, AppStatus, AppStatusResponse, BackupInfo,
    BackupResponse, LogsResponse, ProtocolError, RamRequest, StatusEnvelope, TeamAppsResponse,
    TeamMember, TeamMemberRequest, TeamResponse, UserInfo, UserResponse, API_BASE_URL,
    TOKEN_HEADER,
};

use crate::transport::{Body, HttpRequest, HttpResponse, HttpTransport, Method, TransportError};

/// The API credential
#[derive(Clone, PartialEq, Eq)]
pub struct ApiToken(String);

impl ApiToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into().trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for ApiToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiToken(<redacted>)")
    }
}

impl From<&str> for ApiToken {
    fn from(token: &str) -> Self {
        Self::new(token)
    }
}

impl From<String> for ApiToken {
    fn from(token: String) -> Self {
        Self::new(token)
    }
}

/// Whether an operation is performed as the app owner or as a team member
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Scope {
    #[default]
    App,
    Team,
}

impl Scope {
    pub fn from_team_flag(team: bool) -> Self {
        if team {
            Scope::Team
        } else {
            Scope::App
        }
    }

    /// First path segment for this scope
    pub fn segment(&self) -> &'static str {
        match self {
            Scope::App => "app",
            Scope::Team => "team",
        }
    }
}

/// Power actions on a running app
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerAction {
    Start,
    Restart,
    Stop,
}

impl PowerAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            PowerAction::Start => "start",
            PowerAction::Restart => "restart",
            PowerAction::Stop => "stop",
        }
    }
}

/// API client errors
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("API rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Unexpected response: {0}")]
    Decode(#[from] ProtocolError),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Client for the Discloud REST API
pub struct DiscloudClient {
    transport: Arc<dyn HttpTransport>,
    token: ApiToken,
    base_url: String,
}

impl DiscloudClient {
    pub fn new(transport: Arc<dyn HttpTransport>, token: ApiToken) -> Self {
        Self {
            transport,
            token,
            base_url: API_BASE_URL.to_string(),
        }
    }

    /// Point the client at another deployment of the API
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Account details, including the ids of owned apps
    pub fn user(&self) -> Result<UserInfo, ApiError> {
        let response = self.execute(Method::Get, "user", Body::Empty)?;
        Ok(UserResponse::from_slice(&response.body)?.user)
    }

    pub fn app(&self, app_id: &str) -> Result<AppInfo, ApiError> {
        let path = format!("app/{}", non_empty("app id", app_id)?);
        let response = self.execute(Method::Get, &path, Body::Empty)?;
        Ok(AppResponse::from_slice(&response.body)?.apps)
    }

    /// All apps owned by the user.
    ///
    /// Apps whose details cannot be loaded are skipped; only failing to load
    /// the user is an error.
    pub fn list_apps(&self) -> Result<Vec<AppInfo>, ApiError> {
        let user = self.user()?;
        let mut apps = Vec::with_capacity(user.apps.len());
        for app_id in &user.apps {
            match self.app(app_id) {
                Ok(app) => apps.push(app),
                Err(e) => tracing::warn!(app_id = %app_id, error = %e, "skipping app"),
            }
        }
        Ok(apps)
    }

    pub fn status(&self, scope: Scope, app_id: &str) -> Result<AppStatus, ApiError> {
        let path = scoped(scope, app_id, "status")?;
        let response = self.execute(Method::Get, &path, Body::Empty)?;
        Ok(AppStatusResponse::from_slice(&response.body)?.apps)
    }

    /// Start, restart or stop an app; returns the server's message
    pub fn power(&self, scope: Scope, app_id: &str, action: PowerAction) -> Result<String, ApiError> {
        let path = scoped(scope, app_id, action.as_str())?;
        self.action(Method::Put, &path, Body::Empty)
    }

    pub fn start(&self, scope: Scope, app_id: &str) -> Result<String, ApiError> {
        self.power(scope, app_id, PowerAction::Start)
    }

    pub fn restart(&self, scope: Scope, app_id: &str) -> Result<String, ApiError> {
        self.power(scope, app_id, PowerAction::Restart)
    }

    pub fn stop(&self, scope: Scope, app_id: &str) -> Result<String, ApiError> {
        self.power(scope, app_id, PowerAction::Stop)
    }

    /// Permanently delete an app (owner only)
    pub fn delete(&self, app_id: &str) -> Result<String, ApiError> {
        let path = scoped(Scope::App, app_id, "delete")?;
        self.action(Method::Delete, &path, Body::Empty)
    }

    pub fn set_ram(&self, scope: Scope, app_id: &str, ram_mb: u32) -> Result<String, ApiError> {
        if ram_mb == 0 {
            return Err(ApiError::InvalidArgument("RAM must be greater than 0 MB".into()));
        }
        let path = scoped(scope, app_id, "ram")?;
        let body = serde_json::to_value(RamRequest { ram_mb }).map_err(ProtocolError::from_encode)?;
        self.action(Method::Put, &path, Body::Json(body))
    }

    /// Full terminal output of an app
    pub fn logs(&self, scope: Scope, app_id: &str) -> Result<String, ApiError> {
        let path = scoped(scope, app_id, "logs")?;
        let response = self.execute(Method::Get, &path, Body::Empty)?;
        Ok(LogsResponse::from_slice(&response.body)?.apps.terminal.big)
    }

    /// Request a backup; the archive is available at the returned URL
    pub fn backup(&self, scope: Scope, app_id: &str) -> Result<BackupInfo, ApiError> {
        let path = scoped(scope, app_id, "backup")?;
        let response = self.execute(Method::Get, &path, Body::Empty)?;
        Ok(BackupResponse::from_slice(&response.body)?.backups)
    }

    /// Request a backup and save it as `backup_{app_id}.zip` in `dest_dir`
    pub fn download_backup(&self, scope: Scope, app_id: &str, dest_dir: &Path) -> Result<PathBuf, ApiError> {
        let info = self.backup(scope, app_id)?;
        if info.url.is_empty() {
            return Err(ApiError::Rejected {
                status: 200,
                message: "backup response has no download URL".into(),
            });
        }

        // Pre-signed URL: the token is not sent
        let request = HttpRequest::new(Method::Get, info.url.as_str());
        let response = self.transport.send(&request)?;
        tracing::info!(method = "GET", path = "<backup url>", status = response.status, "backup download");
        if !response.is_success() {
            return Err(ApiError::Rejected {
                status: response.status,
                message: extract_message(&response.body),
            });
        }

        let dest = dest_dir.join(format!("backup_{}.zip", app_id));
        fs::write(&dest, &response.body).map_err(|source| ApiError::Write {
            path: dest.clone(),
            source,
        })?;
        Ok(dest)
    }

    /// Apps the user can manage as a team member
    pub fn team_apps(&self) -> Result<Vec<AppInfo>, ApiError> {
        let response = self.execute(Method::Get, "team", Body::Empty)?;
        Ok(TeamAppsResponse::from_slice(&response.body)?.apps)
    }

    /// Moderators of an owned app
    pub fn team_members(&self, app_id: &str) -> Result<Vec<TeamMember>, ApiError> {
        let path = scoped(Scope::App, app_id, "team")?;
        let response = self.execute(Method::Get, &path, Body::Empty)?;
        Ok(TeamResponse::from_slice(&response.body)?.team)
    }

    pub fn add_member(&self, app_id: &str, mod_id: &str, perms: &[String]) -> Result<String, ApiError> {
        self.put_member(Method::Post, app_id, mod_id, perms)
    }

    /// Replace a moderator's permissions
    pub fn edit_member(&self, app_id: &str, mod_id: &str, perms: &[String]) -> Result<String, ApiError> {
        self.put_member(Method::Put, app_id, mod_id, perms)
    }

    pub fn remove_member(&self, app_id: &str, mod_id: &str) -> Result<String, ApiError> {
        let path = format!(
            "{}/{}",
            scoped(Scope::App, app_id, "team")?,
            non_empty("moderator id", mod_id)?
        );
        self.action(Method::Delete, &path, Body::Empty)
    }

    fn put_member(&self, method: Method, app_id: &str, mod_id: &str, perms: &[String]) -> Result<String, ApiError> {
        let path = scoped(Scope::App, app_id, "team")?;
        let member = TeamMemberRequest {
            mod_id: non_empty("moderator id", mod_id)?.to_string(),
            perms: perms.to_vec(),
        };
        let body = serde_json::to_value(member).map_err(ProtocolError::from_encode)?;
        self.action(method, &path, Body::Json(body))
    }

    /// Send a request and return the server's message
    fn action(&self, method: Method, path: &str, body: Body) -> Result<String, ApiError> {
        let response = self.execute(method, path, body)?;
        Ok(extract_message(&response.body))
    }

    fn execute(&self, method: Method, path: &str, body: Body) -> Result<HttpResponse, ApiError> {
        let request = HttpRequest::new(method, format!("{}/{}", self.base_url, path))
            .with_header(TOKEN_HEADER, self.token.as_str())
            .with_header("Accept", "application/json")
            .with_body(body);

        let response = self.transport.send(&request)?;
        tracing::info!(method = %method, path = %path, status = response.status, "api request");

        if !response.is_success() {
            return Err(ApiError::Rejected {
                status: response.status,
                message: extract_message(&response.body),
            });
        }

        if StatusEnvelope::parse(&response.body).is_some_and(|env| env.is_error()) {
            return Err(ApiError::Rejected {
                status: response.status,
                message: extract_message(&response.body),
            });
        }

        Ok(response)
    }
}

fn non_empty<'a>(what: &str, value: &'a str) -> Result<&'a str, ApiError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ApiError::InvalidArgument(format!("{} must not be empty", what)));
    }
    Ok(value)
}

/// `{scope}/{app_id}/{action}`
fn scoped(scope: Scope, app_id: &str, action: &str) -> Result<String, ApiError> {
    Ok(format!("{}/{}/{}", scope.segment(), non_empty("app id", app_id)?, action))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockTransport;
    use serde_json::json;
    use tempfile::TempDir;

    const BASE: &str = "https://api.test/v2";

    fn client() -> (Arc<MockTransport>, DiscloudClient) {
        let transport = Arc::new(MockTransport::new());
        let client = DiscloudClient::new(transport.clone(), ApiToken::new("tok-123"))
            .with_base_url(format!("{}/", BASE));
        (transport, client)
    }

    fn app_body(id: &str, name: &str, online: bool) -> serde_json::Value {
        json!({"status": "ok", "apps": {"id": id, "name": name, "online": online, "ram": 100}})
    }

    #[test]
    fn test_token_debug_is_redacted() {
        let token = ApiToken::new("  super-secret \n");
        assert_eq!(token.as_str(), "super-secret");
        assert!(!format!("{:?}", token).contains("super-secret"));
    }

    #[test]
    fn test_requests_carry_token_and_accept() {
        let (transport, client) = client();
        transport.respond_json(200, json!({"status": "ok", "message": "started"}));

        let message = client.start(Scope::App, "42").unwrap();

        assert_eq!(message, "started");
        let request = transport.last_request().unwrap();
        assert_eq!(request.method, Method::Put);
        assert_eq!(request.url, "https://api.test/v2/app/42/start");
        assert_eq!(request.header("api-token"), Some("tok-123"));
        assert_eq!(request.header("accept"), Some("application/json"));
    }

    #[test]
    fn test_team_scope_paths() {
        let (transport, client) = client();
        transport
            .respond_json(200, json!({"status": "ok", "message": "restarted"}))
            .respond_json(200, json!({"status": "ok", "message": "stopped"}));

        client.restart(Scope::Team, "7").unwrap();
        client.stop(Scope::Team, "7").unwrap();

        let urls: Vec<String> = transport.requests().into_iter().map(|r| r.url).collect();
        assert_eq!(
            urls,
            vec![
                "https://api.test/v2/team/7/restart",
                "https://api.test/v2/team/7/stop"
            ]
        );
    }

    #[test]
    fn test_list_apps_skips_failures() {
        let (transport, client) = client();
        transport
            .respond_json(
                200,
                json!({"status": "ok", "message": "", "user": {
                    "userID": "u1", "totalRamMb": 1024, "ramUsedMb": 200,
                    "apps": ["a1", "a2", "a3"]
                }}),
            )
            .respond_json(200, app_body("a1", "first", true))
            .respond(500, "boom")
            .respond_json(200, app_body("a3", "third", false));

        let apps = client.list_apps().unwrap();

        let names: Vec<&str> = apps.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["first", "third"]);
        assert_eq!(apps[0].state_label(), "online");
        assert_eq!(transport.requests().len(), 4);
    }

    #[test]
    fn test_list_apps_user_failure_is_error() {
        let (transport, client) = client();
        transport.respond(401, r#"{"status":"error","message":"invalid token"}"#);

        match client.list_apps().unwrap_err() {
            ApiError::Rejected { status, message } => {
                assert_eq!(status, 401);
                assert_eq!(message, "invalid token");
            }
            other => panic!("expected Rejected, got {:?}", other),
        }
    }

    #[test]
    fn test_error_status_on_2xx_is_rejection() {
        let (transport, client) = client();
        transport.respond_json(200, json!({"status": "error", "message": "app is offline"}));

        let err = client.stop(Scope::App, "1").unwrap_err();
        assert!(matches!(err, ApiError::Rejected { status: 200, ref message } if message == "app is offline"));
    }

    #[test]
    fn test_logs_returns_big_terminal() {
        let (transport, client) = client();
        transport.respond_json(
            200,
            json!({"status": "ok", "apps": {"id": "1", "terminal": {
                "big": "line1\nline2", "small": "line2", "url": "https://logs"
            }}}),
        );

        assert_eq!(client.logs(Scope::App, "1").unwrap(), "line1\nline2");
        assert_eq!(transport.last_request().unwrap().url, "https://api.test/v2/app/1/logs");
    }

    #[test]
    fn test_status_decodes() {
        let (transport, client) = client();
        transport.respond_json(
            200,
            json!({"status": "ok", "apps": {"id": "1", "container": "Online",
                "cpu": "0.5%", "memory": "50MB/100MB", "startedAt": "2024-01-01T00:00:00Z"}}),
        );

        let status = client.status(Scope::Team, "1").unwrap();
        assert_eq!(status.container.as_deref(), Some("Online"));
        assert_eq!(transport.last_request().unwrap().url, "https://api.test/v2/team/1/status");
    }

    #[test]
    fn test_malformed_body_is_decode_error() {
        let (transport, client) = client();
        transport.respond(200, "<html>maintenance</html>");

        assert!(matches!(client.user().unwrap_err(), ApiError::Decode(_)));
    }

    #[test]
    fn test_set_ram_body() {
        let (transport, client) = client();
        transport.respond_json(200, json!({"status": "ok", "message": "ram updated"}));

        client.set_ram(Scope::App, "9", 256).unwrap();

        let request = transport.last_request().unwrap();
        assert_eq!(request.url, "https://api.test/v2/app/9/ram");
        assert_eq!(request.body, Body::Json(json!({"ramMB": 256})));
    }

    #[test]
    fn test_set_ram_zero_rejected_locally() {
        let (transport, client) = client();
        let err = client.set_ram(Scope::App, "9", 0).unwrap_err();
        assert!(matches!(err, ApiError::InvalidArgument(_)));
        assert!(transport.requests().is_empty());
    }

    #[test]
    fn test_empty_app_id_rejected_locally() {
        let (transport, client) = client();
        assert!(matches!(client.delete("  ").unwrap_err(), ApiError::InvalidArgument(_)));
        assert!(transport.requests().is_empty());
    }

    #[test]
    fn test_delete_path() {
        let (transport, client) = client();
        transport.respond_json(200, json!({"status": "ok", "message": "deleted"}));

        assert_eq!(client.delete("5").unwrap(), "deleted");
        let request = transport.last_request().unwrap();
        assert_eq!(request.method, Method::Delete);
        assert_eq!(request.url, "https://api.test/v2/app/5/delete");
    }

    #[test]
    fn test_download_backup_writes_file_without_token() {
        let (transport, client) = client();
        let dest = TempDir::new().unwrap();
        transport
            .respond_json(
                200,
                json!({"status": "ok", "backups": {"id": "5", "status": "ok",
                    "url": "https://backups.test/5.zip"}}),
            )
            .respond(200, b"PK\x03\x04backup".to_vec());

        let path = client.download_backup(Scope::App, "5", dest.path()).unwrap();

        assert_eq!(path, dest.path().join("backup_5.zip"));
        assert_eq!(fs::read(&path).unwrap(), b"PK\x03\x04backup");
        let download = transport.last_request().unwrap();
        assert_eq!(download.url, "https://backups.test/5.zip");
        assert_eq!(download.header("api-token"), None);
    }

    #[test]
    fn test_download_backup_failure_writes_nothing() {
        let (transport, client) = client();
        let dest = TempDir::new().unwrap();
        transport
            .respond_json(
                200,
                json!({"status": "ok", "backups": {"id": "5", "url": "https://backups.test/5.zip"}}),
            )
            .respond(403, "expired");

        let err = client.download_backup(Scope::App, "5", dest.path()).unwrap_err();
        assert!(matches!(err, ApiError::Rejected { status: 403, .. }));
        assert!(!dest.path().join("backup_5.zip").exists());
    }

    #[test]
    fn test_team_membership_requests() {
        let (transport, client) = client();
        transport
            .respond_json(200, json!({"status": "ok", "team": [{"modID": "m1", "perms": ["start_app"]}]}))
            .respond_json(200, json!({"status": "ok", "message": "added"}))
            .respond_json(200, json!({"status": "ok", "message": "edited"}))
            .respond_json(200, json!({"status": "ok", "message": "removed"}));

        let members = client.team_members("app1").unwrap();
        assert_eq!(members[0].mod_id, "m1");

        let perms = vec!["start_app".to_string(), "logs_app".to_string()];
        assert_eq!(client.add_member("app1", "m2", &perms).unwrap(), "added");
        assert_eq!(client.edit_member("app1", "m2", &perms[..1]).unwrap(), "edited");
        assert_eq!(client.remove_member("app1", "m2").unwrap(), "removed");

        let requests = transport.requests();
        assert_eq!(requests[0].url, "https://api.test/v2/app/app1/team");
        assert_eq!(requests[1].method, Method::Post);
        assert_eq!(
            requests[1].body,
            Body::Json(json!({"modID": "m2", "perms": ["start_app", "logs_app"]}))
        );
        assert_eq!(requests[2].method, Method::Put);
        assert_eq!(requests[3].method, Method::Delete);
        assert_eq!(requests[3].url, "https://api.test/v2/app/app1/team/m2");
    }

    #[test]
    fn test_team_apps() {
        let (transport, client) = client();
        transport.respond_json(
            200,
            json!({"status": "ok", "apps": [{"id": "t1", "name": "shared", "online": true, "ram": 256}]}),
        );

        let apps = client.team_apps().unwrap();
        assert_eq!(apps.len(), 1);
        assert_eq!(apps[0].ram, 256);
        assert_eq!(transport.last_request().unwrap().url, "https://api.test/v2/team");
    }

    #[test]
    fn test_transport_failure_propagates() {
        let (transport, client) = client();
        transport.fail("dns failure");
        assert!(matches!(client.user().unwrap_err(), ApiError::Transport(_)));
    }
}
