use crate::config::{ClientConfig, ProxyConfig};
use crate::error::{constants, ProtocolError, Result};
use crate::transport::{proxy, ServerEndpoint};
use crate::utils::metrics::Timer;
use crate::utils::timeout::with_timeout_error;
use socket2::{SockRef, TcpKeepalive};
use tokio::net::{lookup_host, TcpStream};
use tracing::{debug, instrument, warn};

/// Open a TCP stream to `endpoint`, tunnelling through `proxy` when given.
///
/// The whole sequence (resolution, connect, proxy negotiation) is bounded by
/// `config.connect_timeout`.
#[instrument(
    skip(endpoint, config, proxy),
    fields(endpoint = %endpoint, via_proxy = proxy.is_some())
)]
pub async fn open_stream(
    endpoint: &ServerEndpoint,
    config: &ClientConfig,
    proxy: Option<&ProxyConfig>,
) -> Result<TcpStream> {
    let _timer = Timer::start("connect");

    with_timeout_error(
        async {
            let stream = match proxy {
                Some(proxy) => {
                    let mut stream = TcpStream::connect(proxy.address.as_str()).await?;
                    proxy::negotiate(&mut stream, proxy, endpoint).await?;
                    stream
                }
                None => connect_direct(endpoint).await?,
            };
            configure_socket(&stream, config)?;
            Ok(stream)
        },
        config.connect_timeout,
        constants::ERR_CONNECT_TIMEOUT,
    )
    .await
}

/// Try every resolved address in order and keep the first that connects.
async fn connect_direct(endpoint: &ServerEndpoint) -> Result<TcpStream> {
    let mut last_error = None;
    for addr in lookup_host((endpoint.address.as_str(), endpoint.port)).await? {
        match TcpStream::connect(addr).await {
            Ok(stream) => {
                debug!(%addr, "TCP connected");
                return Ok(stream);
            }
            Err(e) => {
                warn!(%addr, error = %e, "Connect attempt failed");
                last_error = Some(e);
            }
        }
    }
    Err(match last_error {
        Some(e) => ProtocolError::Io(e),
        None => ProtocolError::Custom(constants::ERR_NO_ENDPOINT.to_string()),
    })
}

/// Apply no-delay and keep-alive settings.
///
/// Keep-alive is the only liveness check an open connection has.
pub fn configure_socket(stream: &TcpStream, config: &ClientConfig) -> Result<()> {
    stream.set_nodelay(config.nodelay)?;

    if config.keepalive {
        let keepalive = TcpKeepalive::new().with_time(config.keepalive_time);
        #[cfg(any(
            target_os = "linux",
            target_os = "android",
            target_os = "macos",
            target_os = "ios",
            target_os = "freebsd",
            windows
        ))]
        let keepalive = keepalive.with_interval(config.keepalive_interval);

        SockRef::from(stream).set_tcp_keepalive(&keepalive)?;
        debug!(
            time_ms = config.keepalive_time.as_millis() as u64,
            interval_ms = config.keepalive_interval.as_millis() as u64,
            "TCP keep-alive enabled"
        );
    }
    Ok(())
}
