//! # Configuration Management
//!
//! Centralized configuration for session connections.
//!
//! This module provides structured configuration for the client transport:
//! connection timing, TCP keep-alive, decoder limits, optional proxy traversal
//! and logging.
//!
//! ## Configuration Sources
//! - TOML files via `from_file()`
//! - Direct instantiation with defaults
//! - Environment overrides via `from_env()` (`SESSION_WIRE_*`)
//!
//! ## Liveness
//! There is no application-level heartbeat. A dead peer is only noticed through
//! TCP keep-alive, so the keep-alive values here are the connection's only
//! timeout once it is open.

use crate::core::parser::{ParserOptions, DEFAULT_MAX_MESSAGE_VALUES, DEFAULT_MAX_VALUE_LEN};
use crate::core::value::Int64Layout;
use crate::error::{ProtocolError, Result};
use crate::transport::proxy::ProxyKind;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::time::Duration;
use tracing::Level;

pub use crate::core::tag::SHORT_FORM_MAX;

/// Byte written before the first frame on every new stream.
pub const PREAMBLE: u8 = 0x00;

/// Type of the first application frame on every stream.
pub const JOIN_MESSAGE_TYPE: &str = "join";

/// Size of the buffer each read is issued into (64 KiB).
pub const READ_BUFFER_SIZE: usize = 64 * 1024;

/// Idle time before the first keep-alive probe.
pub const KEEPALIVE_TIME: Duration = Duration::from_secs(10);

/// Interval between keep-alive probes.
pub const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(3);

/// Default timeout for establishing the TCP stream (and proxy tunnel).
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default capacity of the inbound event channel.
pub const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Top-level configuration
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct SessionConfig {
    /// Connection settings
    #[serde(default)]
    pub client: ClientConfig,

    /// Optional proxy used to reach the game server
    #[serde(default)]
    pub proxy: Option<ProxyConfig>,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl SessionConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = File::open(path)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to open config file: {e}")))?;

        let mut contents = String::new();
        file.read_to_string(&mut contents)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to read config file: {e}")))?;

        Self::from_toml(&contents)
    }

    /// Load configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str::<Self>(content)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to parse TOML: {e}")))
    }

    /// Load configuration from environment variables on top of the defaults
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Some(val) = env_parse::<u64>("SESSION_WIRE_CONNECT_TIMEOUT_MS")? {
            config.client.connect_timeout = Duration::from_millis(val);
        }
        if let Some(val) = env_parse::<u64>("SESSION_WIRE_KEEPALIVE_TIME_MS")? {
            config.client.keepalive_time = Duration::from_millis(val);
        }
        if let Some(val) = env_parse::<u64>("SESSION_WIRE_KEEPALIVE_INTERVAL_MS")? {
            config.client.keepalive_interval = Duration::from_millis(val);
        }
        if let Some(val) = env_parse::<usize>("SESSION_WIRE_EVENT_CAPACITY")? {
            config.client.event_capacity = val;
        }
        if let Ok(layout) = std::env::var("SESSION_WIRE_INT64_LAYOUT") {
            config.client.int64_layout = match layout.to_ascii_lowercase().as_str() {
                "counted" => Int64Layout::Counted,
                "fixed" => Int64Layout::Fixed,
                other => {
                    return Err(ProtocolError::ConfigError(format!(
                        "Invalid SESSION_WIRE_INT64_LAYOUT: {other} (expected counted or fixed)"
                    )))
                }
            };
        }
        if let Ok(address) = std::env::var("SESSION_WIRE_PROXY_ADDRESS") {
            let kind = match std::env::var("SESSION_WIRE_PROXY_KIND") {
                Ok(kind) => kind.parse::<ProxyKind>()?,
                Err(_) => ProxyKind::Socks5,
            };
            config.proxy = Some(ProxyConfig {
                kind,
                address,
                username: std::env::var("SESSION_WIRE_PROXY_USERNAME").ok(),
                password: std::env::var("SESSION_WIRE_PROXY_PASSWORD").ok(),
            });
        }
        if let Ok(level) = std::env::var("SESSION_WIRE_LOG_LEVEL") {
            config.logging.log_level = level
                .parse::<Level>()
                .map_err(|_| ProtocolError::ConfigError(format!("Invalid log level: {level}")))?;
        }

        Ok(config)
    }

    /// Apply overrides to the default configuration
    pub fn default_with_overrides<F>(mutator: F) -> Self
    where
        F: FnOnce(&mut Self),
    {
        let mut config = Self::default();
        mutator(&mut config);
        config
    }

    /// Generate example configuration file content
    pub fn example_config() -> String {
        toml::to_string_pretty(&Self::default())
            .unwrap_or_else(|_| String::from("# Failed to generate example config"))
    }

    /// Save configuration to a file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to serialize config: {e}")))?;

        std::fs::write(path, content)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to write config file: {e}")))?;

        Ok(())
    }

    /// Validate the configuration for common issues and misconfigurations
    ///
    /// Returns a list of validation errors. Empty list means configuration is valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        errors.extend(self.client.validate());

        if let Some(proxy) = &self.proxy {
            errors.extend(proxy.validate());
        }

        errors.extend(self.logging.validate());

        errors
    }

    /// Validate and return Result - convenience method
    pub fn validate_strict(&self) -> Result<()> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ProtocolError::ConfigError(format!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            )))
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Result<Option<T>> {
    match std::env::var(name) {
        Ok(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|_| ProtocolError::ConfigError(format!("Invalid value for {name}: {raw}"))),
        Err(_) => Ok(None),
    }
}

/// Per-connection client configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClientConfig {
    /// Timeout for establishing the stream, including proxy negotiation
    #[serde(with = "duration_serde")]
    pub connect_timeout: Duration,

    /// Whether to enable TCP keep-alive
    pub keepalive: bool,

    /// Idle time before the first keep-alive probe
    #[serde(with = "duration_serde")]
    pub keepalive_time: Duration,

    /// Interval between keep-alive probes
    #[serde(with = "duration_serde")]
    pub keepalive_interval: Duration,

    /// Disable send coalescing (Nagle)
    pub nodelay: bool,

    /// Size of the buffer each read is issued into
    pub read_buffer_size: usize,

    /// Capacity of the inbound event channel
    pub event_capacity: usize,

    /// How 64-bit payload lengths are read
    pub int64_layout: Int64Layout,

    /// Largest accepted string or byte-array payload
    pub max_value_len: usize,

    /// Largest accepted declared value count per message
    pub max_message_values: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout: CONNECT_TIMEOUT,
            keepalive: true,
            keepalive_time: KEEPALIVE_TIME,
            keepalive_interval: KEEPALIVE_INTERVAL,
            nodelay: true,
            read_buffer_size: READ_BUFFER_SIZE,
            event_capacity: EVENT_CHANNEL_CAPACITY,
            int64_layout: Int64Layout::Counted,
            max_value_len: DEFAULT_MAX_VALUE_LEN,
            max_message_values: DEFAULT_MAX_MESSAGE_VALUES,
        }
    }
}

impl ClientConfig {
    /// Decoder options derived from this configuration
    pub fn parser_options(&self) -> ParserOptions {
        ParserOptions {
            int64_layout: self.int64_layout,
            max_value_len: self.max_value_len,
            max_message_values: self.max_message_values,
        }
    }

    /// Validate client configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.connect_timeout.as_millis() < 100 {
            errors.push("Connect timeout too short (minimum: 100ms)".to_string());
        } else if self.connect_timeout.as_secs() > 300 {
            errors.push("Connect timeout too long (maximum: 300s)".to_string());
        }

        if self.keepalive {
            if self.keepalive_time.as_secs() < 1 {
                errors.push("Keep-alive time too short (minimum: 1s)".to_string());
            } else if self.keepalive_time.as_secs() > 7200 {
                errors.push("Keep-alive time too long (maximum: 2 hours)".to_string());
            }

            if self.keepalive_interval.as_secs() < 1 {
                errors.push("Keep-alive interval too short (minimum: 1s)".to_string());
            } else if self.keepalive_interval > self.keepalive_time {
                errors.push(
                    "Keep-alive interval cannot be longer than the keep-alive time".to_string(),
                );
            }
        }

        if self.read_buffer_size < 512 {
            errors.push(format!(
                "Read buffer too small: {} bytes (minimum: 512 bytes)",
                self.read_buffer_size
            ));
        } else if self.read_buffer_size > 16 * 1024 * 1024 {
            errors.push(format!(
                "Read buffer too large: {} bytes (maximum: 16 MB)",
                self.read_buffer_size
            ));
        }

        if self.event_capacity == 0 {
            errors.push("Event channel capacity must be greater than 0".to_string());
        } else if self.event_capacity > 1_000_000 {
            errors.push(format!(
                "Event channel capacity too large: {} (max recommended: 1,000,000)",
                self.event_capacity
            ));
        }

        if self.max_value_len == 0 {
            errors.push("Max value length must be greater than 0".to_string());
        } else if self.max_value_len > i32::MAX as usize {
            errors.push(format!(
                "Max value length {} exceeds what the wire format can express",
                self.max_value_len
            ));
        }

        if self.max_message_values == 0 {
            errors.push("Max message values must be greater than 0".to_string());
        }

        errors
    }
}

/// Proxy traversal settings, consulted only at connect time
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct ProxyConfig {
    /// Proxy protocol
    pub kind: ProxyKind,

    /// Proxy address as `host:port`
    pub address: String,

    /// Optional user name (SOCKS4 user id, SOCKS5 or HTTPS basic auth)
    #[serde(default)]
    pub username: Option<String>,

    /// Optional password (SOCKS5 or HTTPS basic auth)
    #[serde(default)]
    pub password: Option<String>,
}

impl ProxyConfig {
    /// Validate proxy configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        match self.address.rsplit_once(':') {
            Some((host, port)) if !host.is_empty() && port.parse::<u16>().is_ok() => {}
            _ => errors.push(format!(
                "Invalid proxy address format: '{}' (expected format: 'host:1080')",
                self.address
            )),
        }

        for (field, value) in [("username", &self.username), ("password", &self.password)] {
            if let Some(v) = value {
                if v.len() > 255 {
                    errors.push(format!("Proxy {field} too long (maximum: 255 bytes)"));
                }
            }
        }

        if self.kind == ProxyKind::Socks4 && self.password.is_some() {
            errors.push("WARNING: SOCKS4 proxies do not use a password".to_string());
        }

        errors
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Application name for logs
    pub app_name: String,

    /// Log level
    #[serde(with = "log_level_serde")]
    pub log_level: Level,

    /// Whether to log to console
    pub log_to_console: bool,

    /// Whether to log to file
    pub log_to_file: bool,

    /// Path to log file (if log_to_file is true)
    pub log_file_path: Option<String>,

    /// Whether to use JSON formatting for logs
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            app_name: String::from("session-wire"),
            log_level: Level::INFO,
            log_to_console: true,
            log_to_file: false,
            log_file_path: None,
            json_format: false,
        }
    }
}

impl LoggingConfig {
    /// Validate logging configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.app_name.is_empty() {
            errors.push("Application name cannot be empty".to_string());
        } else if self.app_name.len() > 64 {
            errors.push(format!(
                "Application name too long: {} characters (maximum: 64)",
                self.app_name.len()
            ));
        }

        if self.log_to_file {
            if let Some(ref path) = self.log_file_path {
                if let Some(parent) = Path::new(path).parent() {
                    if !parent.as_os_str().is_empty() && !parent.exists() {
                        errors.push(format!(
                            "Log file directory does not exist: {}",
                            parent.display()
                        ));
                    }
                }
            } else {
                errors.push("log_file_path must be specified when log_to_file is true".to_string());
            }
        }

        if !self.log_to_console && !self.log_to_file {
            errors
                .push("At least one logging output (console or file) must be enabled".to_string());
        }

        errors
    }
}

/// Helper module for Duration serialization/deserialization
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let millis = duration.as_millis() as u64;
        millis.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

/// Helper module for tracing::Level serialization/deserialization
mod log_level_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::str::FromStr;
    use tracing::Level;

    pub fn serialize<S>(level: &Level, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let level_str = match *level {
            Level::TRACE => "trace",
            Level::DEBUG => "debug",
            Level::INFO => "info",
            Level::WARN => "warn",
            Level::ERROR => "error",
        };
        level_str.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Level, D::Error>
    where
        D: Deserializer<'de>,
    {
        let level_str = String::deserialize(deserializer)?;
        Level::from_str(&level_str)
            .map_err(|_| serde::de::Error::custom(format!("Invalid log level: {level_str}")))
    }
}
