//! Per-project `discloud.config`
//!
//! A `KEY=value` file at the project root describing how the platform should
//! run the app. Its presence is what makes a directory eligible for
//! whole-project upload.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// File name at the project root
pub const CONFIG_FILE_NAME: &str = "discloud.config";

pub const DEFAULT_AVATAR: &str = "https://i.imgur.com/bWhx7OT.png";
pub const DEFAULT_MAIN: &str = "index.js";
pub const DEFAULT_VERSION: &str = "latest";
pub const DEFAULT_APT: &str = "tools";

/// Errors for reading and writing `discloud.config`
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{0} not found")]
    NotFound(PathBuf),

    #[error("{0} already exists (use --force to overwrite)")]
    AlreadyExists(PathBuf),

    #[error("Missing required field '{0}'")]
    MissingField(&'static str),

    #[error("Line {line}: expected KEY=value, got '{content}'")]
    InvalidLine { line: usize, content: String },

    #[error("Invalid value for '{field}': '{value}'")]
    InvalidValue { field: &'static str, value: String },
}

/// What kind of app the project is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppType {
    Bot,
    Site,
}

impl AppType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppType::Bot => "bot",
            AppType::Site => "site",
        }
    }

    /// RAM in MB used when none is given
    pub fn default_ram(&self) -> u32 {
        match self {
            AppType::Bot => 100,
            AppType::Site => 512,
        }
    }
}

impl fmt::Display for AppType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AppType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bot" => Ok(AppType::Bot),
            "site" => Ok(AppType::Site),
            _ => Err(ConfigError::InvalidValue {
                field: "TYPE",
                value: s.to_string(),
            }),
        }
    }
}

/// Typed `discloud.config`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscloudConfig {
    pub name: String,
    pub avatar: String,
    /// Subdomain, sites only
    pub id: Option<String>,
    pub app_type: AppType,
    pub main: String,
    /// RAM in MB
    pub ram: u32,
    pub autorestart: bool,
    pub version: String,
    pub apt: String,
    pub start: String,
    pub build: String,
}

impl DiscloudConfig {
    /// Config with the default values for `app_type`.
    ///
    /// Sites get an `ID` equal to the lowercased name.
    pub fn new(app_type: AppType, name: impl Into<String>) -> Self {
        let name = name.into().trim().to_string();
        let id = match app_type {
            AppType::Site => Some(name.to_lowercase()),
            AppType::Bot => None,
        };
        Self {
            id,
            avatar: DEFAULT_AVATAR.to_string(),
            app_type,
            main: DEFAULT_MAIN.to_string(),
            ram: app_type.default_ram(),
            autorestart: false,
            version: DEFAULT_VERSION.to_string(),
            apt: DEFAULT_APT.to_string(),
            start: String::new(),
            build: String::new(),
            name,
        }
    }

    pub fn bot(name: impl Into<String>) -> Self {
        Self::new(AppType::Bot, name)
    }

    pub fn site(name: impl Into<String>) -> Self {
        Self::new(AppType::Site, name)
    }

    /// Path of the config file inside `dir`
    pub fn path_in(dir: &Path) -> PathBuf {
        dir.join(CONFIG_FILE_NAME)
    }

    /// Whether `dir` has a `discloud.config`
    pub fn exists_in(dir: &Path) -> bool {
        Self::path_in(dir).is_file()
    }

    /// Load `discloud.config` from `dir`
    pub fn load(dir: &Path) -> Result<Self, ConfigError> {
        let path = Self::path_in(dir);
        if !path.is_file() {
            return Err(ConfigError::NotFound(path));
        }
        let content = fs::read_to_string(&path).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;
        Self::parse(&content)
    }

    /// Write the rendered config into `dir`; refuses to overwrite unless `force`
    pub fn write(&self, dir: &Path, force: bool) -> Result<PathBuf, ConfigError> {
        let path = Self::path_in(dir);
        if path.exists() && !force {
            return Err(ConfigError::AlreadyExists(path));
        }
        fs::write(&path, self.render()).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;
        tracing::info!(path = %path.display(), app_type = %self.app_type, "wrote project config");
        Ok(path)
    }

    /// Parse `KEY=value` lines.
    ///
    /// Blank lines and `#` comments are skipped, keys are case-insensitive,
    /// unknown keys are ignored. NAME, TYPE and MAIN are required.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let mut name = None;
        let mut app_type = None;
        let mut main = None;
        let mut rest: Vec<(String, String)> = Vec::new();

        for (idx, line) in content.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            let (key, value) = trimmed.split_once('=').ok_or_else(|| ConfigError::InvalidLine {
                line: idx + 1,
                content: trimmed.to_string(),
            })?;
            let key = key.trim().to_ascii_uppercase();
            let value = value.trim().to_string();

            match key.as_str() {
                "NAME" => name = Some(value),
                "TYPE" => app_type = Some(value.parse::<AppType>()?),
                "MAIN" => main = Some(value),
                _ => rest.push((key, value)),
            }
        }

        let name = name.filter(|v| !v.is_empty()).ok_or(ConfigError::MissingField("NAME"))?;
        let app_type = app_type.ok_or(ConfigError::MissingField("TYPE"))?;
        let main = main.filter(|v| !v.is_empty()).ok_or(ConfigError::MissingField("MAIN"))?;

        let mut config = Self::new(app_type, name);
        config.main = main;
        config.id = None;

        for (key, value) in rest {
            match key.as_str() {
                "AVATAR" => config.avatar = value,
                "ID" => config.id = Some(value).filter(|v| !v.is_empty()),
                "RAM" => {
                    config.ram = value
                        .parse::<u32>()
                        .ok()
                        .filter(|ram| *ram > 0)
                        .ok_or(ConfigError::InvalidValue { field: "RAM", value })?;
                }
                "AUTORESTART" => {
                    config.autorestart = match value.to_ascii_lowercase().as_str() {
                        "true" => true,
                        "false" => false,
                        _ => {
                            return Err(ConfigError::InvalidValue {
                                field: "AUTORESTART",
                                value,
                            })
                        }
                    };
                }
                "VERSION" => config.version = value,
                "APT" => config.apt = value,
                "START" => config.start = value,
                "BUILD" => config.build = value,
                other => tracing::debug!(key = other, "ignoring unknown discloud.config key"),
            }
        }

        Ok(config)
    }

    /// Render as `KEY=value` lines
    pub fn render(&self) -> String {
        let mut lines = vec![
            format!("NAME={}", self.name),
            format!("AVATAR={}", self.avatar),
        ];
        if let Some(id) = &self.id {
            lines.push(format!("ID={}", id));
        }
        lines.extend([
            format!("TYPE={}", self.app_type),
            format!("MAIN={}", self.main),
            format!("RAM={}", self.ram),
            format!("AUTORESTART={}", self.autorestart),
            format!("VERSION={}", self.version),
            format!("APT={}", self.apt),
            format!("START={}", self.start),
            format!("BUILD={}", self.build),
        ]);
        let mut out = lines.join("\n");
        out.push('\n');
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_bot_defaults_render() {
        let config = DiscloudConfig::bot("MyBot");
        assert_eq!(
            config.render(),
            "NAME=MyBot\n\
             AVATAR=https://i.imgur.com/bWhx7OT.png\n\
             TYPE=bot\n\
             MAIN=index.js\n\
             RAM=100\n\
             AUTORESTART=false\n\
             VERSION=latest\n\
             APT=tools\n\
             START=\n\
             BUILD=\n"
        );
    }

    #[test]
    fn test_site_defaults() {
        let config = DiscloudConfig::site("My-Site");
        assert_eq!(config.id.as_deref(), Some("my-site"));
        assert_eq!(config.ram, 512);
        assert!(config.render().contains("AVATAR=https://i.imgur.com/bWhx7OT.png\nID=my-site\nTYPE=site\n"));
    }

    #[test]
    fn test_render_parse_round_trip() {
        let mut config = DiscloudConfig::site("shop");
        config.main = "server.py".into();
        config.ram = 1024;
        config.autorestart = true;
        config.start = "gunicorn app:app --bind=0.0.0.0:8080".into();
        config.build = "pip install -r requirements.txt".into();

        assert_eq!(DiscloudConfig::parse(&config.render()).unwrap(), config);

        let bot = DiscloudConfig::bot("ticket-bot");
        assert_eq!(DiscloudConfig::parse(&bot.render()).unwrap(), bot);
    }

    #[test]
    fn test_parse_comments_whitespace_and_case() {
        let config = DiscloudConfig::parse(
            "# generated\n\n  name = Bot  \ntype=BOT\nMain= main.py\nram=256\nautorestart=TRUE\nFUTURE_KEY=x\n",
        )
        .unwrap();

        assert_eq!(config.name, "Bot");
        assert_eq!(config.app_type, AppType::Bot);
        assert_eq!(config.main, "main.py");
        assert_eq!(config.ram, 256);
        assert!(config.autorestart);
        assert_eq!(config.version, DEFAULT_VERSION);
        assert_eq!(config.id, None);
    }

    #[test]
    fn test_parse_missing_required() {
        assert!(matches!(
            DiscloudConfig::parse("TYPE=bot\nMAIN=index.js").unwrap_err(),
            ConfigError::MissingField("NAME")
        ));
        assert!(matches!(
            DiscloudConfig::parse("NAME=a\nMAIN=index.js").unwrap_err(),
            ConfigError::MissingField("TYPE")
        ));
        assert!(matches!(
            DiscloudConfig::parse("NAME=a\nTYPE=bot\nMAIN=").unwrap_err(),
            ConfigError::MissingField("MAIN")
        ));
    }

    #[test]
    fn test_parse_invalid_values() {
        let base = "NAME=a\nTYPE=bot\nMAIN=index.js\n";

        let err = DiscloudConfig::parse(&format!("{}RAM=lots", base)).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { field: "RAM", .. }));

        let err = DiscloudConfig::parse(&format!("{}RAM=0", base)).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { field: "RAM", .. }));

        let err = DiscloudConfig::parse(&format!("{}AUTORESTART=maybe", base)).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { field: "AUTORESTART", .. }));

        let err = DiscloudConfig::parse("NAME=a\nTYPE=worker\nMAIN=x").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { field: "TYPE", .. }));

        let err = DiscloudConfig::parse(&format!("{}just some words", base)).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidLine { line: 4, .. }));
    }

    #[test]
    fn test_write_and_load() {
        let dir = TempDir::new().unwrap();
        assert!(!DiscloudConfig::exists_in(dir.path()));
        assert!(matches!(
            DiscloudConfig::load(dir.path()).unwrap_err(),
            ConfigError::NotFound(_)
        ));

        let config = DiscloudConfig::bot("bot");
        let path = config.write(dir.path(), false).unwrap();

        assert_eq!(path, dir.path().join(CONFIG_FILE_NAME));
        assert!(DiscloudConfig::exists_in(dir.path()));
        assert_eq!(DiscloudConfig::load(dir.path()).unwrap(), config);
    }

    #[test]
    fn test_write_refuses_overwrite_without_force() {
        let dir = TempDir::new().unwrap();
        DiscloudConfig::bot("one").write(dir.path(), false).unwrap();

        let err = DiscloudConfig::bot("two").write(dir.path(), false).unwrap_err();
        assert!(matches!(err, ConfigError::AlreadyExists(_)));

        DiscloudConfig::bot("two").write(dir.path(), true).unwrap();
        assert_eq!(DiscloudConfig::load(dir.path()).unwrap().name, "two");
    }
}
