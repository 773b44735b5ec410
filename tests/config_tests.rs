//! Project config files and user settings on disk

mod fixtures;

use std::fs;

use discloud_deploy::config::{
    AppType, ConfigError, ConfigOrigin, DiscloudConfig, Settings, SettingsOverrides,
};
use fixtures::project;
use tempfile::TempDir;

#[test]
fn test_write_then_load() {
    let dir = TempDir::new().unwrap();
    let mut config = DiscloudConfig::site("My Site");
    config.main = "server.js".into();
    config.autorestart = true;
    config.start = "npm start".into();

    let path = config.write(dir.path(), false).unwrap();
    assert!(path.ends_with("discloud.config"));

    let loaded = DiscloudConfig::load(dir.path()).unwrap();
    assert_eq!(loaded, config);
    assert_eq!(loaded.id.as_deref(), Some("my site"));
    assert_eq!(loaded.ram, 512);
}

#[test]
fn test_write_refuses_overwrite_without_force() {
    let dir = project(&[("discloud.config", "NAME=old\nTYPE=bot\nMAIN=a.py\n")]);
    let config = DiscloudConfig::bot("new");

    let err = config.write(dir.path(), false).unwrap_err();
    assert!(matches!(err, ConfigError::AlreadyExists(_)));
    assert_eq!(DiscloudConfig::load(dir.path()).unwrap().name, "old");

    config.write(dir.path(), true).unwrap();
    assert_eq!(DiscloudConfig::load(dir.path()).unwrap().name, "new");
}

#[test]
fn test_handwritten_config() {
    let dir = project(&[(
        "discloud.config",
        "# my bot\nname = Pinger\ntype=BOT\nmain=bot.py\nRAM=256\nautorestart=TRUE\nCUSTOM=x\n",
    )]);

    let config = DiscloudConfig::load(dir.path()).unwrap();
    assert_eq!(config.name, "Pinger");
    assert_eq!(config.app_type, AppType::Bot);
    assert_eq!(config.main, "bot.py");
    assert_eq!(config.ram, 256);
    assert!(config.autorestart);
    assert!(config.id.is_none());
}

#[test]
fn test_load_missing_and_invalid() {
    let dir = TempDir::new().unwrap();
    assert!(matches!(
        DiscloudConfig::load(dir.path()).unwrap_err(),
        ConfigError::NotFound(_)
    ));

    fs::write(dir.path().join("discloud.config"), "NAME=x\nTYPE=bot\n").unwrap();
    assert!(matches!(
        DiscloudConfig::load(dir.path()).unwrap_err(),
        ConfigError::MissingField("MAIN")
    ));
}

#[test]
fn test_settings_file_and_overrides() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join(".config/discloud/settings.toml");
    let settings = Settings {
        token: Some("file-token".into()),
        build_timeout_secs: Some(90),
        ..Settings::default()
    };
    settings.save(&path).unwrap();

    let loaded = Settings::load(&path).unwrap();
    let resolved = loaded.resolve(&SettingsOverrides::default(), Some("env-token".into()));
    assert_eq!(resolved.require_token().unwrap().as_str(), "env-token");
    assert_eq!(resolved.token_origin, Some(ConfigOrigin::Env));

    let cli = SettingsOverrides {
        token: Some("cli-token".into()),
        api_url: Some("http://localhost:9000/v2".into()),
        build_timeout_secs: None,
    };
    let resolved = loaded.resolve(&cli, Some("env-token".into()));
    assert_eq!(resolved.require_token().unwrap().as_str(), "cli-token");
    assert_eq!(resolved.api_url, "http://localhost:9000/v2");
    assert_eq!(resolved.build_timeout.map(|d| d.as_secs()), Some(90));
}
