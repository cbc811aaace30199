//! Tests for configuration loading.

use super::*;
use std::io::Write;

#[test]
#[serial_test::serial]
fn test_load_config_from_file() {
    let mut file = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .expect("tempfile");
    writeln!(
        file,
        r#"
[webhook]
secret = "file-secret"

[server]
port = 9999

[mirror]
bootstrap_max_per_installation = 3
"#
    )
    .expect("write config");

    let path = file.path().to_string_lossy().to_string();
    let config = load_config(Some(&path)).expect("load");
    assert_eq!(config.webhook.secret, "file-secret");
    assert_eq!(config.server.port, 9999);
    assert_eq!(config.mirror.bootstrap_max_per_installation, 3);
    // Unspecified values keep their documented defaults.
    assert_eq!(config.mirror.raw_event_max_attempts, 5);
    assert_eq!(config.mirror.github_api_base_url, "https://api.github.com");
}

#[test]
#[serial_test::serial]
fn test_load_config_rejects_missing_secret() {
    let mut file = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .expect("tempfile");
    writeln!(file, "[server]\nport = 8080").expect("write config");

    let path = file.path().to_string_lossy().to_string();
    let err = load_config(Some(&path)).expect_err("must fail validation");
    assert!(err.to_string().contains("webhook.secret"));
}

#[test]
#[serial_test::serial]
fn test_environment_overrides_file() {
    let mut file = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .expect("tempfile");
    writeln!(file, "[webhook]\nsecret = \"file-secret\"").expect("write config");

    std::env::set_var("GHMIRROR__SERVER__PORT", "7777");
    let path = file.path().to_string_lossy().to_string();
    let config = load_config(Some(&path)).expect("load");
    std::env::remove_var("GHMIRROR__SERVER__PORT");

    assert_eq!(config.server.port, 7777);
    assert_eq!(config.webhook.secret, "file-secret");
}

#[test]
fn test_base_url_gets_trailing_slash() {
    assert_eq!(
        ensure_trailing_slash("https://api.github.com"),
        "https://api.github.com/"
    );
    assert_eq!(
        ensure_trailing_slash("https://ghe.example/api/v3/"),
        "https://ghe.example/api/v3/"
    );
}
