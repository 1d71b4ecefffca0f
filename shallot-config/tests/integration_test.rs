//! Integration tests for shallot-config

use serde_json::json;
use shallot_config::*;
use std::env;
use std::fs;
use std::path::PathBuf;

#[test]
fn test_load_json_file_with_comments() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    fs::write(
        &path,
        r#"{
            // name shown in logs
            "APP_NAME": "blog",
            "RUN_MODE": "PROD",
            "URL_PREFIX": "/blog",
            "PROD": {
                "HTTP_PORT": 8080 // behind the proxy
            }
        }"#,
    )
    .unwrap();

    let config = AppConfig::load(&path).unwrap();

    assert_eq!(config.app_name, "blog");
    assert_eq!(config.run_mode, RunMode::Prod);
    assert_eq!(config.http_port, 8080);
    assert_eq!(config.url_prefix, "/blog");
    assert_eq!(config.log_level(), LogLevel::Error);
}

#[test]
fn test_load_toml_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("app.toml");
    fs::write(
        &path,
        r#"
APP_NAME = "toml-app"
LOG_LEVEL = "debug"
LOG_DIR = "/var/log/toml-app"

[CUSTOM]
GREETING = "hi"
"#,
    )
    .unwrap();

    let config = AppConfig::load(&path).unwrap();

    assert_eq!(config.app_name, "toml-app");
    assert_eq!(config.log_level(), LogLevel::Debug);
    assert_eq!(config.log_dir(), Some(PathBuf::from("/var/log/toml-app")));
    assert_eq!(
        config.custom::<String>("GREETING").unwrap().as_deref(),
        Some("hi")
    );
}

#[test]
fn test_load_missing_file_fails() {
    let dir = tempfile::tempdir().unwrap();
    let result = AppConfig::load(dir.path().join("absent.json"));

    assert!(matches!(result, Err(ConfigError::Read { .. })));
}

#[test]
fn test_load_unsupported_extension_fails() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.yaml");
    fs::write(&path, "APP_NAME: x").unwrap();

    assert!(matches!(
        AppConfig::load(&path),
        Err(ConfigError::UnsupportedFormat { .. })
    ));
}

#[test]
fn test_environment_overrides_file_and_section() {
    unsafe {
        env::set_var("SHALLOTIT_RUN_MODE", "TEST");
        env::set_var("SHALLOTIT_HTTP_PORT", "9100");
    }

    let document = json!({
        "HTTP_PORT": 3000,
        "TEST": { "HTTP_PORT": 4000, "APP_NAME": "from-section" }
    });
    let config = AppConfig::resolve(document, &EnvLoader::new("SHALLOTIT")).unwrap();

    unsafe {
        env::remove_var("SHALLOTIT_RUN_MODE");
        env::remove_var("SHALLOTIT_HTTP_PORT");
    }

    assert_eq!(config.run_mode, RunMode::Test);
    assert_eq!(config.app_name, "from-section");
    assert_eq!(config.http_port, 9100);
}

#[test]
fn test_config_loader_env_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("settings.env");
    fs::write(&path, "APP_NAME=envfile\nHTTP_PORT=5000\n").unwrap();

    let config = AppConfig::load(&path).unwrap();

    assert_eq!(config.app_name, "envfile");
    assert_eq!(config.http_port, 5000);
}
