// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn empty_config_uses_defaults() {
    let config: Config = toml::from_str("").unwrap();
    assert_eq!(config.app.environment, Environment::Development);
    assert_eq!(config.database.path, PathBuf::from("skysync.db"));
    assert!(config.security.encryption_key.is_empty());
    assert_eq!(config.watcher.debounce_ms, 2_000);
    config.validate().unwrap();
}

#[test]
fn full_config_parses() {
    let text = r#"
[app]
environment = "production"

[database]
path = "/var/lib/skysync/state.db"

[security]
encryption_key = "hunter2"

[auth]
username = "admin"
password = "s3cret"

[runner]
workers = 8
publish_interval_ms = 100

[watcher]
debounce_ms = 500
"#;
    let config: Config = toml::from_str(text).unwrap();
    config.validate().unwrap();
    assert_eq!(config.app.environment, Environment::Production);
    assert_eq!(config.runner.workers, Some(8));

    let runner = config.runner_config();
    assert_eq!(runner.workers, 8);
    assert_eq!(runner.policy.publish_interval, Duration::from_millis(100));
    // Untouched knobs keep their defaults.
    assert_eq!(runner.policy.log_batch_size, 128);
    assert_eq!(config.debounce(), Duration::from_millis(500));
}

#[test]
fn one_sided_auth_is_rejected() {
    let config: Config = toml::from_str("[auth]\nusername = \"admin\"\n").unwrap();
    assert!(matches!(config.validate().unwrap_err(), ConfigError::AuthIncomplete));

    let config: Config = toml::from_str("[auth]\npassword = \"pw\"\n").unwrap();
    assert!(matches!(config.validate().unwrap_err(), ConfigError::AuthIncomplete));
}

#[test]
fn load_reads_and_validates_a_file() {
    let tmp = tempfile::TempDir::new().unwrap();
    let path = tmp.path().join("config.toml");
    std::fs::write(&path, "[database]\npath = \"x.db\"\n").unwrap();
    let config = Config::load(&path).unwrap();
    assert_eq!(config.database.path, PathBuf::from("x.db"));
    assert_eq!(config.lock_path(), PathBuf::from("x.lock"));

    let err = Config::load(&tmp.path().join("missing.toml")).unwrap_err();
    assert!(matches!(err, ConfigError::Read { .. }));
}

#[test]
fn malformed_toml_is_a_parse_error() {
    let tmp = tempfile::TempDir::new().unwrap();
    let path = tmp.path().join("config.toml");
    std::fs::write(&path, "not = [valid").unwrap();
    assert!(matches!(Config::load(&path).unwrap_err(), ConfigError::Parse(_)));
}
