//! Integration tests for configuration validation

#![allow(clippy::expect_used, clippy::unwrap_used)]

use session_wire::config::{
    ClientConfig, LoggingConfig, ProxyConfig, SessionConfig, KEEPALIVE_INTERVAL, KEEPALIVE_TIME,
    READ_BUFFER_SIZE,
};
use session_wire::transport::proxy::ProxyKind;
use session_wire::Int64Layout;
use std::time::Duration;
use tracing::Level;

fn proxy(kind: ProxyKind, address: &str) -> ProxyConfig {
    ProxyConfig {
        kind,
        address: address.to_string(),
        username: None,
        password: None,
    }
}

#[test]
fn test_default_config_validates() {
    let config = SessionConfig::default();
    let errors = config.validate();
    assert!(
        errors.is_empty(),
        "Default config should be valid, but got errors: {:?}",
        errors
    );
}

#[test]
fn test_defaults_match_protocol_constants() {
    let client = ClientConfig::default();
    assert_eq!(client.keepalive_time, KEEPALIVE_TIME);
    assert_eq!(client.keepalive_time, Duration::from_secs(10));
    assert_eq!(client.keepalive_interval, KEEPALIVE_INTERVAL);
    assert_eq!(client.keepalive_interval, Duration::from_secs(3));
    assert_eq!(client.read_buffer_size, READ_BUFFER_SIZE);
    assert!(client.nodelay);
    assert_eq!(client.int64_layout, Int64Layout::Counted);
}

#[test]
fn test_connect_timeout_bounds() {
    let mut config = SessionConfig::default();
    config.client.connect_timeout = Duration::from_millis(10);
    assert!(config
        .validate()
        .iter()
        .any(|e| e.contains("Connect timeout too short")));

    config.client.connect_timeout = Duration::from_secs(301);
    assert!(config
        .validate()
        .iter()
        .any(|e| e.contains("Connect timeout too long")));
}

#[test]
fn test_keepalive_interval_longer_than_time() {
    let mut config = SessionConfig::default();
    config.client.keepalive_time = Duration::from_secs(2);
    config.client.keepalive_interval = Duration::from_secs(5);

    let errors = config.validate();
    assert!(errors
        .iter()
        .any(|e| e.contains("cannot be longer than the keep-alive time")));
}

#[test]
fn test_keepalive_values_ignored_when_disabled() {
    let mut config = SessionConfig::default();
    config.client.keepalive = false;
    config.client.keepalive_time = Duration::ZERO;
    assert!(config.validate().is_empty());
}

#[test]
fn test_zero_event_capacity() {
    let mut config = SessionConfig::default();
    config.client.event_capacity = 0;

    let errors = config.validate();
    assert!(errors
        .iter()
        .any(|e| e.contains("Event channel capacity must be greater than 0")));
}

#[test]
fn test_read_buffer_bounds() {
    let mut config = SessionConfig::default();
    config.client.read_buffer_size = 16;
    assert!(config
        .validate()
        .iter()
        .any(|e| e.contains("Read buffer too small")));
}

#[test]
fn test_decoder_limits() {
    let mut config = SessionConfig::default();
    config.client.max_value_len = 0;
    config.client.max_message_values = 0;

    let errors = config.validate();
    assert!(errors.iter().any(|e| e.contains("Max value length")));
    assert!(errors.iter().any(|e| e.contains("Max message values")));
}

#[test]
fn test_invalid_proxy_address() {
    let config = SessionConfig {
        proxy: Some(proxy(ProxyKind::Socks5, "no-port")),
        ..SessionConfig::default()
    };
    assert!(config
        .validate()
        .iter()
        .any(|e| e.contains("Invalid proxy address format")));
}

#[test]
fn test_socks4_password_warning() {
    let mut p = proxy(ProxyKind::Socks4, "127.0.0.1:1080");
    p.username = Some("user".into());
    p.password = Some("secret".into());
    let config = SessionConfig {
        proxy: Some(p),
        ..SessionConfig::default()
    };
    assert!(config.validate().iter().any(|e| e.contains("WARNING")));
}

#[test]
fn test_oversized_proxy_credentials() {
    let mut p = proxy(ProxyKind::Socks5, "proxy.local:1080");
    p.username = Some("u".repeat(256));
    let config = SessionConfig {
        proxy: Some(p),
        ..SessionConfig::default()
    };
    assert!(config
        .validate()
        .iter()
        .any(|e| e.contains("Proxy username too long")));
}

#[test]
fn test_logging_requires_output() {
    let mut config = SessionConfig::default();
    config.logging.log_to_console = false;
    config.logging.log_to_file = false;

    let errors = config.validate();
    assert!(errors
        .iter()
        .any(|e| e.contains("At least one logging output")));
}

#[test]
fn test_logging_file_path_required() {
    let logging = LoggingConfig {
        log_to_file: true,
        log_file_path: None,
        ..LoggingConfig::default()
    };
    assert!(logging
        .validate()
        .iter()
        .any(|e| e.contains("log_file_path must be specified")));
}

#[test]
fn test_validate_strict_collects_errors() {
    let mut config = SessionConfig::default();
    config.client.event_capacity = 0;
    config.logging.app_name = String::new();

    let err = config.validate_strict().unwrap_err();
    let text = err.to_string();
    assert!(text.contains("Event channel capacity"));
    assert!(text.contains("Application name cannot be empty"));
}

#[test]
fn test_toml_roundtrip_and_partial_sections() {
    let toml = r#"
        [client]
        connect_timeout = 2500
        keepalive = true
        keepalive_time = 20000
        keepalive_interval = 5000
        nodelay = false
        read_buffer_size = 8192
        event_capacity = 16
        int64_layout = "fixed"
        max_value_len = 1024
        max_message_values = 32

        [proxy]
        kind = "https"
        address = "proxy.local:3128"
        username = "alice"

        [logging]
        app_name = "bot"
        log_level = "debug"
        log_to_console = true
        log_to_file = false
        json_format = true
    "#;

    let config = SessionConfig::from_toml(toml).expect("valid TOML");
    assert_eq!(config.client.connect_timeout, Duration::from_millis(2500));
    assert_eq!(config.client.int64_layout, Int64Layout::Fixed);
    assert!(!config.client.nodelay);
    let proxy = config.proxy.as_ref().expect("proxy section");
    assert_eq!(proxy.kind, ProxyKind::Https);
    assert_eq!(proxy.username.as_deref(), Some("alice"));
    assert_eq!(proxy.password, None);
    assert_eq!(config.logging.log_level, Level::DEBUG);
    assert!(config.validate().is_empty());

    let options = config.client.parser_options();
    assert_eq!(options.max_value_len, 1024);
    assert_eq!(options.max_message_values, 32);

    // Missing sections fall back to defaults
    let minimal = SessionConfig::from_toml("").expect("empty TOML is valid");
    assert!(minimal.proxy.is_none());
    assert_eq!(minimal.client.event_capacity, ClientConfig::default().event_capacity);
}

#[test]
fn test_example_config_parses() {
    let example = SessionConfig::example_config();
    let parsed = SessionConfig::from_toml(&example).expect("example config should parse");
    assert!(parsed.validate().is_empty());
}

#[test]
fn test_bad_toml_is_config_error() {
    let err = SessionConfig::from_toml("[client]\nconnect_timeout = \"soon\"").unwrap_err();
    assert!(err.to_string().contains("Failed to parse TOML"));
}

#[test]
fn test_default_with_overrides() {
    let config = SessionConfig::default_with_overrides(|c| {
        c.client.int64_layout = Int64Layout::Fixed;
        c.logging.log_level = Level::WARN;
    });
    assert_eq!(config.client.int64_layout, Int64Layout::Fixed);
    assert_eq!(config.logging.log_level, Level::WARN);
}
