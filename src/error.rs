//! # Error Types
//!
//! Error handling for the session wire protocol.
//!
//! This module defines every error variant that can surface from encoding,
//! incremental decoding, proxy negotiation and connection management.
//!
//! ## Error Categories
//! - **I/O Errors**: socket and stream failures
//! - **Serialization Errors**: values or messages that cannot be put on the wire
//! - **Protocol Errors**: unrecognised tag bytes, malformed frame slots, limit violations
//! - **Connection Errors**: use of a connection that has already been torn down
//! - **Proxy Errors**: SOCKS4/SOCKS5/HTTPS tunnel negotiation failures
//!
//! Transport and protocol failures observed by a running connection are never
//! returned to the caller directly; they are turned into a
//! [`DisconnectReason`](crate::service::DisconnectReason) and delivered as an event.
//!
//! ## Example Usage
//! ```rust
//! use session_wire::error::{ProtocolError, Result};
//! use session_wire::protocol::message::Message;
//!
//! fn first_name(msg: &Message) -> Result<&str> {
//!     msg.get_string(0)
//! }
//!
//! let msg = Message::new("hello").with("world");
//! assert_eq!(first_name(&msg).ok(), Some("world"));
//! assert!(matches!(
//!     Message::new("empty").get_string(0),
//!     Err(ProtocolError::IndexOutOfRange { .. })
//! ));
//! ```

use crate::core::value::ValueKind;
use std::io;
use thiserror::Error;

/// Error message constants to reduce allocations in error paths.
pub mod constants {
    /// Dispatcher-related error messages
    pub const ERR_DISPATCHER_WRITE_LOCK: &str = "Failed to acquire write lock on dispatcher";
    pub const ERR_DISPATCHER_READ_LOCK: &str = "Failed to acquire read lock on dispatcher";

    /// Parser errors
    pub const ERR_PARSER_POISONED: &str =
        "Parser previously failed and cannot resynchronise; the stream must be dropped";

    /// Connection errors
    pub const ERR_CONNECT_TIMEOUT: &str = "Timed out while establishing the connection";
    pub const ERR_NO_ENDPOINT: &str = "Endpoint did not resolve to any address";

    /// Proxy negotiation errors
    pub const ERR_SOCKS4_IPV6: &str = "SOCKS4 proxies cannot reach IPv6 destinations";
    pub const ERR_SOCKS5_NO_METHOD: &str = "SOCKS5 proxy accepted none of the offered methods";
    pub const ERR_SOCKS5_AUTH: &str = "SOCKS5 proxy rejected the supplied credentials";
    pub const ERR_PROXY_CREDENTIAL_LEN: &str = "Proxy credentials must be at most 255 bytes";
    pub const ERR_HTTP_RESPONSE_TOO_LARGE: &str = "HTTPS proxy response header exceeded 8 KiB";
}

/// ProtocolError is the primary error type for all session wire operations
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A tag byte whose stray bits cannot belong to the form it classifies as.
    /// There is no resync marker on the wire, so this is always fatal.
    #[error("Unrecognised tag byte 0x{0:02X}")]
    InvalidTag(u8),

    #[error("String payload is not valid UTF-8")]
    InvalidUtf8,

    #[error("Expected {expected} in frame slot, found {found}")]
    UnexpectedValue {
        expected: &'static str,
        found: ValueKind,
    },

    #[error("Declared message value count {0} is not usable")]
    InvalidCount(i64),

    #[error("Declared length {len} exceeds the limit of {limit} bytes")]
    ValueTooLong { len: usize, limit: usize },

    #[error("Declared value count {count} exceeds the limit of {limit}")]
    TooManyValues { count: usize, limit: usize },

    #[error("Value of {0} bytes is too large to encode")]
    ValueTooLarge(usize),

    #[error("Message type must not be empty")]
    EmptyMessageType,

    #[error("Value index {index} out of range for message with {len} values")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("Value {index} is {found}, not {expected}")]
    WrongKind {
        index: usize,
        expected: ValueKind,
        found: ValueKind,
    },

    #[error("{0}")]
    Desynchronized(&'static str),

    #[error("Connection is not open")]
    NotConnected,

    #[error("Proxy error: {0}")]
    ProxyError(String),

    #[error("Timeout occurred: {0}")]
    Timeout(&'static str),

    #[error("Unexpected message type: {0}")]
    UnexpectedMessage(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Custom error: {0}")]
    Custom(String),
}

impl ProtocolError {
    /// Whether this error means the inbound byte stream can no longer be trusted.
    pub fn is_fatal_protocol(&self) -> bool {
        matches!(
            self,
            ProtocolError::InvalidTag(_)
                | ProtocolError::InvalidUtf8
                | ProtocolError::UnexpectedValue { .. }
                | ProtocolError::InvalidCount(_)
                | ProtocolError::ValueTooLong { .. }
                | ProtocolError::TooManyValues { .. }
                | ProtocolError::Desynchronized(_)
        )
    }
}

/// Type alias for Results using ProtocolError
pub type Result<T> = std::result::Result<T, ProtocolError>;
