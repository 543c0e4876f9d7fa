// SPDX-FileCopyrightText: 2026 Wagate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::io::Write;
use std::time::Duration;

use serial_test::serial;

use wagate_config::{
    ConfigError, LogFormat, WagateConfig, load_and_validate_path, load_and_validate_str,
    load_config_from_str,
};
use wagate_core::EventType;

const FULL: &str = r#"
[server]
host = "0.0.0.0"
port = 9000

[hub]
shared_key = "dash-key"
auth_timeout_secs = 5
ping_interval_secs = 15
write_timeout_secs = 3
client_buffer = 64

[queue]
capacity = 50

[reconnect]
base_delay_ms = 250
max_delay_secs = 20
max_attempts = 0

[webhook]
request_timeout_secs = 4
max_attempts = 2
base_delay_ms = 100
max_delay_secs = 5

[logging]
level = "debug"
format = "json"

[[sessions]]
id = "s1"
name = "Support line"

[[sessions]]
id = "s2"

[[webhooks]]
session_id = "s1"
url = "https://hooks.example.com/wa"
secret = "topsecret"
events = ["message.received", "connection.connected"]
ignore_groups = true
"#;

#[test]
fn full_file_round_trips_into_runtime_types() {
    let config = load_and_validate_str(FULL).expect("valid config");

    assert_eq!(config.server.host, "0.0.0.0");
    assert_eq!(config.server.port, 9000);
    assert_eq!(config.hub.shared_key.as_deref(), Some("dash-key"));
    assert_eq!(config.hub.auth_timeout(), Duration::from_secs(5));
    assert_eq!(config.hub.client_buffer, 64);
    assert_eq!(config.queue.capacity, 50);
    assert_eq!(config.logging.format, LogFormat::Json);

    let reconnect = config.reconnect.retry_policy();
    assert_eq!(reconnect.max_attempts, 0);
    assert_eq!(reconnect.base_delay, Duration::from_millis(250));

    let webhook = config.webhook.retry_policy();
    assert_eq!(webhook.max_attempts, 2);
    assert_eq!(config.webhook.request_timeout(), Duration::from_secs(4));

    let sessions: Vec<_> = config.sessions.iter().map(|s| s.to_session()).collect();
    assert_eq!(sessions[0].name, "Support line");
    assert_eq!(sessions[1].name, "s2");

    let hook = config.webhooks[0].to_webhook_config();
    assert!(hook.enabled);
    assert!(hook.ignore_groups);
    assert_eq!(
        hook.events,
        vec![EventType::MessageReceived, EventType::ConnectionConnected]
    );
}

#[test]
fn empty_file_yields_defaults() {
    let config = load_and_validate_str("").unwrap();
    let defaults = WagateConfig::default();
    assert_eq!(config.server.port, defaults.server.port);
    assert_eq!(config.hub.auth_timeout_secs, 10);
    assert_eq!(config.hub.ping_interval_secs, 30);
    assert_eq!(config.queue.capacity, 1000);
    assert_eq!(config.reconnect.max_attempts, 5);
    assert_eq!(config.reconnect.max_delay_secs, 60);
    assert_eq!(config.webhook.max_attempts, 3);
    assert_eq!(config.webhook.max_delay_secs, 30);
    assert_eq!(config.logging.level, "info");
    assert!(config.hub.shared_key.is_none());
    assert!(config.sessions.is_empty());
}

#[test]
fn unknown_key_is_reported_with_suggestion_and_span() {
    let errors = load_and_validate_str("[hub]\nshared_kye = \"x\"\n").unwrap_err();
    assert_eq!(errors.len(), 1);
    match &errors[0] {
        ConfigError::UnknownKey {
            key, suggestion, ..
        } => {
            assert_eq!(key, "shared_kye");
            assert_eq!(suggestion.as_deref(), Some("shared_key"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn unknown_top_level_table_is_rejected() {
    let err = load_config_from_str("[metrics]\nenabled = true\n").unwrap_err();
    assert!(err.to_string().contains("metrics"));
}

#[test]
fn wrong_type_is_reported() {
    let errors = load_and_validate_str("[server]\nport = \"eighty\"\n").unwrap_err();
    assert!(matches!(errors[0], ConfigError::InvalidType { .. }));
}

#[test]
fn webhook_without_url_is_missing_key() {
    let errors = load_and_validate_str("[[webhooks]]\nsession_id = \"s1\"\n").unwrap_err();
    assert!(matches!(&errors[0], ConfigError::MissingKey { key } if key.ends_with("url")));
}

#[test]
fn unknown_log_format_is_rejected() {
    assert!(load_and_validate_str("[logging]\nformat = \"xml\"\n").is_err());
}

#[test]
fn validation_errors_surface_through_loader() {
    let toml = r#"
[queue]
capacity = 0

[[webhooks]]
session_id = "s1"
url = "hooks.example.com"
events = ["connection.lost"]
"#;
    let errors = load_and_validate_str(toml).unwrap_err();
    assert_eq!(errors.len(), 3);
    assert!(errors.iter().any(|e| matches!(e, ConfigError::UnknownEvent { .. })));
}

#[test]
fn missing_explicit_file_is_an_error() {
    let errors = load_and_validate_path(std::path::Path::new("/nonexistent/wagate.toml"))
        .unwrap_err();
    assert!(errors[0].to_string().contains("does not exist"));
}

#[test]
#[serial]
fn explicit_file_with_env_override() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[hub]\nshared_key = \"from-file\"\n\n[queue]\ncapacity = 7").unwrap();

    // SAFETY: serialized with every other test that touches WAGATE_ variables.
    unsafe { std::env::set_var("WAGATE_HUB_SHARED_KEY", "from-env") };
    let result = load_and_validate_path(file.path());
    unsafe { std::env::remove_var("WAGATE_HUB_SHARED_KEY") };

    let config = result.unwrap();
    assert_eq!(config.hub.shared_key.as_deref(), Some("from-env"));
    assert_eq!(config.queue.capacity, 7);
}

#[test]
#[serial]
fn env_value_failing_validation_is_reported() {
    let file = tempfile::NamedTempFile::new().unwrap();

    // SAFETY: serialized with every other test that touches WAGATE_ variables.
    unsafe { std::env::set_var("WAGATE_QUEUE_CAPACITY", "0") };
    let result = load_and_validate_path(file.path());
    unsafe { std::env::remove_var("WAGATE_QUEUE_CAPACITY") };

    let errors = result.unwrap_err();
    assert!(errors[0].to_string().contains("queue.capacity"));
}
