//! Configuration
//!
//! Two files are involved:
//! - User settings (`~/.config/discloud/settings.toml`): token, API URL, build timeout
//! - Project config (`discloud.config` at the project root): how the platform runs the app

mod project;
mod settings;

pub use project::{
    AppType, ConfigError, DiscloudConfig, CONFIG_FILE_NAME, DEFAULT_APT, DEFAULT_AVATAR,
    DEFAULT_MAIN, DEFAULT_VERSION,
};
pub use settings::{
    env_token, ConfigOrigin, ResolvedSettings, Settings, SettingsError, SettingsOverrides,
    SETTINGS_PATH, TOKEN_ENV,
};
