use super::settings::Settings;
use super::load_config;
use serial_test::serial;
use std::env;
use std::fs;
use tempfile::TempDir;

#[test]
fn test_default_settings() {
    let settings = Settings::default();
    assert_eq!(settings.server.host, "0.0.0.0");
    assert_eq!(settings.server.port, 10200);
    assert_eq!(settings.broker.endpoint, None);
    assert_eq!(settings.broker.group_id, "RETAIL");
    assert_eq!(settings.broker.session_timeout_ms, 1000);
    assert_eq!(settings.broker.partition, 0);
    assert!(settings.broker.credentials().is_none());
}

#[test]
fn credentials_need_both_halves() {
    let mut settings = Settings::default();
    settings.broker.username = Some("admin".into());
    assert!(settings.broker.credentials().is_none());

    settings.broker.password = Some("password".into());
    assert_eq!(
        settings.broker.credentials(),
        Some(("admin".to_string(), "password".to_string()))
    );
}

#[test]
#[serial]
fn load_config_without_sources_uses_defaults() {
    let tmp = TempDir::new().expect("create tempdir");
    let orig = env::current_dir().expect("current_dir");
    env::set_current_dir(tmp.path()).expect("set current dir");

    let cfg = temp_env::with_vars_unset(
        ["POPBRIDGE_BROKER__ENDPOINT", "POPBRIDGE_SERVER__PORT"],
        load_config,
    )
    .expect("load_config failed");

    env::set_current_dir(orig).expect("restore cwd");

    assert_eq!(cfg.server.port, 10200);
    assert_eq!(cfg.broker.endpoint, None);
}

#[test]
#[serial]
fn load_config_from_file_overrides_defaults() {
    // load_config reads config/default.toml relative to the working directory.
    let tmp = TempDir::new().expect("create tempdir");
    let orig = env::current_dir().expect("current_dir");
    env::set_current_dir(tmp.path()).expect("set current dir");

    fs::create_dir_all("config").expect("create config dir");
    let toml = r#"
        [server]
        host = "127.0.0.1"
        port = 9000

        [broker]
        endpoint = "broker.local:2181"
        group_id = "ORDERS"
        session_timeout_ms = 250
    "#;
    fs::write("config/default.toml", toml).expect("write config file");

    let cfg = load_config();
    env::set_current_dir(orig).expect("restore cwd");
    let cfg = cfg.expect("load_config failed");

    assert_eq!(cfg.server.host, "127.0.0.1");
    assert_eq!(cfg.server.port, 9000);
    assert_eq!(cfg.broker.endpoint.as_deref(), Some("broker.local:2181"));
    assert_eq!(cfg.broker.group_id, "ORDERS");
    assert_eq!(cfg.broker.session_timeout_ms, 250);
    // untouched keys keep their defaults
    assert_eq!(cfg.broker.send_timeout_ms, 5000);
    assert_eq!(cfg.broker.partition, 0);
}

#[test]
#[serial]
fn environment_overrides_defaults() {
    let tmp = TempDir::new().expect("create tempdir");
    let orig = env::current_dir().expect("current_dir");
    env::set_current_dir(tmp.path()).expect("set current dir");

    let cfg = temp_env::with_vars(
        [
            ("POPBRIDGE_BROKER__ENDPOINT", Some("10.0.0.5:2181")),
            ("POPBRIDGE_BROKER__USERNAME", Some("admin")),
            ("POPBRIDGE_BROKER__PASSWORD", Some("password")),
        ],
        load_config,
    );
    env::set_current_dir(orig).expect("restore cwd");
    let cfg = cfg.expect("load_config failed");

    assert_eq!(cfg.broker.endpoint.as_deref(), Some("10.0.0.5:2181"));
    assert!(cfg.broker.credentials().is_some());
    assert_eq!(cfg.server.port, 10200);
}
