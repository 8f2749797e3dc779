//! Proxy traversal performed once, before the preamble.
//!
//! Each negotiation runs over an already-connected stream to the proxy and
//! leaves it as a transparent tunnel to the game server. Nothing is read past
//! the proxy's reply, so the first byte after a successful negotiation belongs
//! to the game protocol.

use crate::config::ProxyConfig;
use crate::error::{constants, ProtocolError, Result};
use crate::transport::ServerEndpoint;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, instrument};

const SOCKS4_VERSION: u8 = 0x04;
const SOCKS4_GRANTED: u8 = 0x5A;
const SOCKS5_VERSION: u8 = 0x05;
const SOCKS5_NO_AUTH: u8 = 0x00;
const SOCKS5_USER_PASS: u8 = 0x02;
const SOCKS_CMD_CONNECT: u8 = 0x01;
const ATYP_IPV4: u8 = 0x01;
const ATYP_DOMAIN: u8 = 0x03;
const ATYP_IPV6: u8 = 0x04;
const MAX_HTTP_RESPONSE: usize = 8 * 1024;

/// Supported proxy protocols
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProxyKind {
    /// SOCKS4, falling back to SOCKS4a for host names
    Socks4,
    Socks5,
    /// HTTP `CONNECT` tunnelling
    Https,
}

impl fmt::Display for ProxyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ProxyKind::Socks4 => "socks4",
            ProxyKind::Socks5 => "socks5",
            ProxyKind::Https => "https",
        })
    }
}

impl FromStr for ProxyKind {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "socks4" | "socks4a" => Ok(ProxyKind::Socks4),
            "socks5" => Ok(ProxyKind::Socks5),
            "https" | "http" => Ok(ProxyKind::Https),
            other => Err(ProtocolError::ConfigError(format!(
                "Unknown proxy kind: {other} (expected socks4, socks5 or https)"
            ))),
        }
    }
}

/// Turn `stream` (connected to the proxy) into a tunnel to `target`.
#[instrument(skip(stream, proxy), fields(kind = %proxy.kind, proxy_addr = %proxy.address))]
pub async fn negotiate<S>(
    stream: &mut S,
    proxy: &ProxyConfig,
    target: &ServerEndpoint,
) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    match proxy.kind {
        ProxyKind::Socks4 => socks4_connect(stream, target, proxy.username.as_deref()).await,
        ProxyKind::Socks5 => {
            let credentials = proxy.username.as_deref().map(|user| {
                (user, proxy.password.as_deref().unwrap_or_default())
            });
            socks5_connect(stream, target, credentials).await
        }
        ProxyKind::Https => {
            let credentials = proxy.username.as_deref().map(|user| {
                (user, proxy.password.as_deref().unwrap_or_default())
            });
            http_connect(stream, target, credentials).await
        }
    }?;
    debug!(%target, "Proxy tunnel established");
    Ok(())
}

/// SOCKS4 `CONNECT`. Host names go out as SOCKS4a so the proxy resolves them.
pub async fn socks4_connect<S>(
    stream: &mut S,
    target: &ServerEndpoint,
    user_id: Option<&str>,
) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut request = vec![SOCKS4_VERSION, SOCKS_CMD_CONNECT];
    request.extend_from_slice(&target.port.to_be_bytes());

    let host_name = match target.ip() {
        Some(IpAddr::V4(ip)) => {
            request.extend_from_slice(&ip.octets());
            None
        }
        Some(IpAddr::V6(_)) => {
            return Err(ProtocolError::ProxyError(constants::ERR_SOCKS4_IPV6.to_string()))
        }
        None => {
            // 0.0.0.x with x != 0 marks a SOCKS4a request
            request.extend_from_slice(&[0, 0, 0, 1]);
            Some(target.address.as_str())
        }
    };

    request.extend_from_slice(user_id.unwrap_or_default().as_bytes());
    request.push(0);
    if let Some(host) = host_name {
        request.extend_from_slice(host.as_bytes());
        request.push(0);
    }

    stream.write_all(&request).await?;
    stream.flush().await?;

    let mut reply = [0u8; 8];
    stream.read_exact(&mut reply).await?;
    if reply[1] != SOCKS4_GRANTED {
        return Err(ProtocolError::ProxyError(format!(
            "SOCKS4 request rejected: {}",
            socks4_reply_message(reply[1])
        )));
    }
    Ok(())
}

fn socks4_reply_message(code: u8) -> &'static str {
    match code {
        0x5B => "request rejected or failed",
        0x5C => "proxy could not reach identd on the client",
        0x5D => "identd reported a different user id",
        _ => "unknown reply code",
    }
}

/// SOCKS5 `CONNECT`, offering username/password auth when credentials are given.
pub async fn socks5_connect<S>(
    stream: &mut S,
    target: &ServerEndpoint,
    credentials: Option<(&str, &str)>,
) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let greeting: &[u8] = match credentials {
        Some(_) => &[SOCKS5_VERSION, 2, SOCKS5_NO_AUTH, SOCKS5_USER_PASS],
        None => &[SOCKS5_VERSION, 1, SOCKS5_NO_AUTH],
    };
    stream.write_all(greeting).await?;
    stream.flush().await?;

    let mut choice = [0u8; 2];
    stream.read_exact(&mut choice).await?;
    if choice[0] != SOCKS5_VERSION {
        return Err(ProtocolError::ProxyError(format!(
            "Unexpected SOCKS version {} in method reply",
            choice[0]
        )));
    }

    match (choice[1], credentials) {
        (SOCKS5_NO_AUTH, _) => {}
        (SOCKS5_USER_PASS, Some((user, pass))) => socks5_authenticate(stream, user, pass).await?,
        _ => {
            return Err(ProtocolError::ProxyError(
                constants::ERR_SOCKS5_NO_METHOD.to_string(),
            ))
        }
    }

    let mut request = vec![SOCKS5_VERSION, SOCKS_CMD_CONNECT, 0x00];
    match target.ip() {
        Some(IpAddr::V4(ip)) => {
            request.push(ATYP_IPV4);
            request.extend_from_slice(&ip.octets());
        }
        Some(IpAddr::V6(ip)) => {
            request.push(ATYP_IPV6);
            request.extend_from_slice(&ip.octets());
        }
        None => {
            let host = target.address.as_bytes();
            let len = u8::try_from(host.len()).map_err(|_| {
                ProtocolError::ProxyError(format!("Host name too long for SOCKS5: {}", host.len()))
            })?;
            request.push(ATYP_DOMAIN);
            request.push(len);
            request.extend_from_slice(host);
        }
    }
    request.extend_from_slice(&target.port.to_be_bytes());
    stream.write_all(&request).await?;
    stream.flush().await?;

    let mut head = [0u8; 4];
    stream.read_exact(&mut head).await?;
    if head[1] != 0x00 {
        return Err(ProtocolError::ProxyError(format!(
            "SOCKS5 connect failed: {}",
            socks5_reply_message(head[1])
        )));
    }

    // Drain the bound address so the tunnel starts clean
    let bound_len = match head[3] {
        ATYP_IPV4 => 4,
        ATYP_IPV6 => 16,
        ATYP_DOMAIN => stream.read_u8().await? as usize,
        other => {
            return Err(ProtocolError::ProxyError(format!(
                "Unknown SOCKS5 address type {other} in reply"
            )))
        }
    };
    let mut bound = vec![0u8; bound_len + 2];
    stream.read_exact(&mut bound).await?;
    Ok(())
}

async fn socks5_authenticate<S>(stream: &mut S, user: &str, pass: &str) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (Ok(user_len), Ok(pass_len)) = (u8::try_from(user.len()), u8::try_from(pass.len())) else {
        return Err(ProtocolError::ProxyError(
            constants::ERR_PROXY_CREDENTIAL_LEN.to_string(),
        ));
    };

    let mut request = Vec::with_capacity(3 + user.len() + pass.len());
    request.push(0x01);
    request.push(user_len);
    request.extend_from_slice(user.as_bytes());
    request.push(pass_len);
    request.extend_from_slice(pass.as_bytes());
    stream.write_all(&request).await?;
    stream.flush().await?;

    let mut reply = [0u8; 2];
    stream.read_exact(&mut reply).await?;
    if reply[1] != 0x00 {
        return Err(ProtocolError::ProxyError(constants::ERR_SOCKS5_AUTH.to_string()));
    }
    Ok(())
}

fn socks5_reply_message(code: u8) -> &'static str {
    match code {
        0x01 => "general SOCKS server failure",
        0x02 => "connection not allowed by ruleset",
        0x03 => "network unreachable",
        0x04 => "host unreachable",
        0x05 => "connection refused",
        0x06 => "TTL expired",
        0x07 => "command not supported",
        0x08 => "address type not supported",
        _ => "unknown reply code",
    }
}

/// HTTP `CONNECT` tunnel with optional Basic auth.
pub async fn http_connect<S>(
    stream: &mut S,
    target: &ServerEndpoint,
    credentials: Option<(&str, &str)>,
) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let authority = target.to_string();
    let mut request = format!("CONNECT {authority} HTTP/1.1\r\nHost: {authority}\r\n");
    if let Some((user, pass)) = credentials {
        let token = STANDARD.encode(format!("{user}:{pass}"));
        request.push_str(&format!("Proxy-Authorization: Basic {token}\r\n"));
    }
    request.push_str("\r\n");
    stream.write_all(request.as_bytes()).await?;
    stream.flush().await?;

    // One byte at a time: anything after the blank line is game traffic
    let mut response = Vec::with_capacity(128);
    while !response.ends_with(b"\r\n\r\n") {
        if response.len() >= MAX_HTTP_RESPONSE {
            return Err(ProtocolError::ProxyError(
                constants::ERR_HTTP_RESPONSE_TOO_LARGE.to_string(),
            ));
        }
        response.push(stream.read_u8().await?);
    }

    let head = String::from_utf8_lossy(&response);
    let status_line = head.lines().next().unwrap_or_default();
    let mut parts = status_line.split_whitespace();
    let version = parts.next().unwrap_or_default();
    let status = parts.next().and_then(|code| code.parse::<u16>().ok());

    match status {
        Some(code) if version.starts_with("HTTP/") && (200..300).contains(&code) => Ok(()),
        _ => Err(ProtocolError::ProxyError(format!(
            "HTTPS proxy refused tunnel: {status_line}"
        ))),
    }
}
