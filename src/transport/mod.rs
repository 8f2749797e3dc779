//! # Transport Layer
//!
//! Establishes the byte stream a connection runs over.
//!
//! ## Components
//! - **TCP**: connect with timeout, keep-alive and no-delay
//! - **Proxy**: SOCKS4/4a, SOCKS5 and HTTPS `CONNECT` traversal
//!
//! Transport security is not provided here. A TLS stream can be handed to
//! `Connection::from_stream` directly.

pub mod proxy;
pub mod tcp;

use crate::error::{ProtocolError, Result};
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

/// Address of a game server as handed out by the session directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServerEndpoint {
    /// Host name or IP literal (IPv6 without brackets)
    pub address: String,
    pub port: u16,
}

impl ServerEndpoint {
    pub fn new(address: impl Into<String>, port: u16) -> Self {
        let address = address.into();
        let address = address
            .strip_prefix('[')
            .and_then(|a| a.strip_suffix(']'))
            .map(str::to_string)
            .unwrap_or(address);
        Self { address, port }
    }

    /// The address as an IP literal, if it is one.
    pub fn ip(&self) -> Option<IpAddr> {
        self.address.parse().ok()
    }
}

impl From<SocketAddr> for ServerEndpoint {
    fn from(addr: SocketAddr) -> Self {
        Self::new(addr.ip().to_string(), addr.port())
    }
}

impl fmt::Display for ServerEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.address.contains(':') {
            write!(f, "[{}]:{}", self.address, self.port)
        } else {
            write!(f, "{}:{}", self.address, self.port)
        }
    }
}

impl FromStr for ServerEndpoint {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self> {
        let (host, port) = s.rsplit_once(':').ok_or_else(|| {
            ProtocolError::ConfigError(format!("Endpoint '{s}' is missing a port"))
        })?;
        let port = port
            .parse::<u16>()
            .map_err(|_| ProtocolError::ConfigError(format!("Invalid port in endpoint '{s}'")))?;
        if host.is_empty() {
            return Err(ProtocolError::ConfigError(format!(
                "Endpoint '{s}' is missing a host"
            )));
        }
        Ok(Self::new(host, port))
    }
}
