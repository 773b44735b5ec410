//! User settings
//!
//! Parses the settings file at `~/.config/discloud/settings.toml` and layers
//! it with the environment and CLI flags:
//! 1. Built-in defaults
//! 2. Settings file
//! 3. `DISCLOUD_TOKEN` (token only)
//! 4. CLI flags

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::api::ApiToken;

/// Environment variable consulted for the API token
pub const TOKEN_ENV: &str = "DISCLOUD_TOKEN";

/// Settings file location under `$HOME`
pub const SETTINGS_PATH: &str = ".config/discloud/settings.toml";

/// Errors that can occur when loading or saving settings
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Failed to access settings file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize settings: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("HOME environment variable not set")]
    NoHome,

    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("No API token configured; run `discloud login <TOKEN>` or set {}", TOKEN_ENV)]
    MissingToken,
}

/// Contents of the settings file
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// API token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    /// API base URL
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Kill builds running longer than this (no limit when absent)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_timeout_secs: Option<u64>,
}

fn default_api_url() -> String {
    discloud_protocol::API_BASE_URL.to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            token: None,
            api_url: default_api_url(),
            build_timeout_secs: None,
        }
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("api_url", &self.api_url)
            .field("build_timeout_secs", &self.build_timeout_secs)
            .finish()
    }
}

impl Settings {
    /// Get the default settings file path
    pub fn default_path() -> Result<PathBuf, SettingsError> {
        let home = std::env::var("HOME").map_err(|_| SettingsError::NoHome)?;
        Ok(PathBuf::from(home).join(SETTINGS_PATH))
    }

    /// Load settings from the default location
    pub fn load_default() -> Result<Self, SettingsError> {
        Self::load(&Self::default_path()?)
    }

    /// Load settings from `path`; a missing file yields the defaults
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no settings file, using defaults");
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content)
    }

    /// Parse settings from a TOML string
    pub fn parse(content: &str) -> Result<Self, SettingsError> {
        let settings: Settings = toml::from_str(content)?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), SettingsError> {
        if !(self.api_url.starts_with("http://") || self.api_url.starts_with("https://")) {
            return Err(SettingsError::InvalidValue {
                field: "api_url".to_string(),
                reason: format!("'{}' is not an http(s) URL", self.api_url),
            });
        }
        if self.build_timeout_secs == Some(0) {
            return Err(SettingsError::InvalidValue {
                field: "build_timeout_secs".to_string(),
                reason: "must be greater than 0".to_string(),
            });
        }
        Ok(())
    }

    /// Write settings to `path`, creating parent directories.
    ///
    /// On Unix the file is readable by the owner only since it holds the token.
    pub fn save(&self, path: &Path) -> Result<(), SettingsError> {
        let io_err = |source: io::Error| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let content = toml::to_string_pretty(self)?;

        #[cfg(unix)]
        {
            use std::io::Write;
            use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

            let mut file = fs::OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .mode(0o600)
                .open(path)
                .map_err(io_err)?;
            // `mode` only applies on creation; tighten an existing file before writing
            file.set_permissions(fs::Permissions::from_mode(0o600))
                .map_err(io_err)?;
            file.write_all(content.as_bytes()).map_err(io_err)?;
        }

        #[cfg(not(unix))]
        fs::write(path, content).map_err(io_err)?;

        Ok(())
    }

    /// Layer environment and CLI overrides on top of these settings
    pub fn resolve(&self, overrides: &SettingsOverrides, env_token: Option<String>) -> ResolvedSettings {
        let file_token = self.token.clone().filter(|t| !t.trim().is_empty());
        let env_token = env_token.filter(|t| !t.trim().is_empty());
        let cli_token = overrides.token.clone().filter(|t| !t.trim().is_empty());

        let (token, token_origin) = match (cli_token, env_token, file_token) {
            (Some(t), _, _) => (Some(t), Some(ConfigOrigin::Cli)),
            (None, Some(t), _) => (Some(t), Some(ConfigOrigin::Env)),
            (None, None, Some(t)) => (Some(t), Some(ConfigOrigin::File)),
            (None, None, None) => (None, None),
        };

        let api_url = overrides
            .api_url
            .clone()
            .unwrap_or_else(|| self.api_url.clone());

        let build_timeout = overrides
            .build_timeout_secs
            .or(self.build_timeout_secs)
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs);

        ResolvedSettings {
            token: token.map(ApiToken::new),
            token_origin,
            api_url: api_url.trim_end_matches('/').to_string(),
            build_timeout,
        }
    }
}

/// Read the token from the environment
pub fn env_token() -> Option<String> {
    std::env::var(TOKEN_ENV).ok()
}

/// Values given on the command line
#[derive(Debug, Clone, Default)]
pub struct SettingsOverrides {
    pub token: Option<String>,
    pub api_url: Option<String>,
    pub build_timeout_secs: Option<u64>,
}

/// Where a resolved value came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigOrigin {
    File,
    Env,
    Cli,
}

/// Settings after all layers are applied
#[derive(Debug, Clone)]
pub struct ResolvedSettings {
    pub token: Option<ApiToken>,
    pub token_origin: Option<ConfigOrigin>,
    pub api_url: String,
    pub build_timeout: Option<Duration>,
}

impl ResolvedSettings {
    pub fn require_token(&self) -> Result<ApiToken, SettingsError> {
        self.token.clone().ok_or(SettingsError::MissingToken)
    }
}
