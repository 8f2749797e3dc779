use crate::config::{ClientConfig, SessionConfig};
use crate::core::codec::MessageCodec;
use crate::core::framing;
use crate::core::value::Value;
use crate::error::{ProtocolError, Result};
use crate::protocol::handshake::{self, JoinRequest};
use crate::protocol::message::Message;
use crate::transport::{tcp, ServerEndpoint};
use crate::utils::metrics::{ConnectionMetrics, ConnectionStats};
use crate::utils::timeout::{with_timeout_error, SHUTDOWN_TIMEOUT};

use futures::{SinkExt, StreamExt};
use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, Mutex as AsyncMutex};
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::codec::{FramedRead, FramedWrite};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, trace, warn};

type BoxedWriter = FramedWrite<Pin<Box<dyn AsyncWrite + Send>>, MessageCodec>;

/// Lifecycle of a [`Connection`]. `Disconnected` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ConnectionState {
    Connecting = 0,
    Open = 1,
    Disconnected = 2,
}

impl ConnectionState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => ConnectionState::Connecting,
            1 => ConnectionState::Open,
            _ => ConnectionState::Disconnected,
        }
    }
}

/// Why a connection ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    /// `disconnect()` was called or the connection was dropped
    LocallyTerminated,
    /// The peer reset or aborted the stream
    ResetByPeer,
    /// The peer closed its side (a read returned zero bytes)
    ZeroLengthRead,
    /// Any other read or write failure
    TransportError(String),
    /// The inbound byte stream could not be decoded
    ProtocolViolation(String),
}

impl DisconnectReason {
    fn from_io(err: &io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::NotConnected => DisconnectReason::ResetByPeer,
            io::ErrorKind::UnexpectedEof => DisconnectReason::ZeroLengthRead,
            _ => DisconnectReason::TransportError(err.to_string()),
        }
    }

    fn from_error(err: &ProtocolError) -> Self {
        match err {
            ProtocolError::Io(e) => Self::from_io(e),
            e if e.is_fatal_protocol() => DisconnectReason::ProtocolViolation(e.to_string()),
            e => DisconnectReason::TransportError(e.to_string()),
        }
    }

    /// Whether the local side asked for the disconnect.
    pub fn is_local(&self) -> bool {
        matches!(self, DisconnectReason::LocallyTerminated)
    }
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisconnectReason::LocallyTerminated => {
                f.write_str("connection was terminated by the local client")
            }
            DisconnectReason::ResetByPeer => f.write_str("connection was reset by peer"),
            DisconnectReason::ZeroLengthRead => {
                f.write_str("connection was closed by peer (zero-length read)")
            }
            DisconnectReason::TransportError(e) => write!(f, "transport error: {e}"),
            DisconnectReason::ProtocolViolation(e) => write!(f, "protocol violation: {e}"),
        }
    }
}

/// Notification delivered from the read loop.
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionEvent {
    Message(Message),
    /// Always the last event; delivered exactly once.
    Disconnected(DisconnectReason),
}

/// Receiving side of a connection's events, in wire order.
#[derive(Debug)]
pub struct ConnectionEvents {
    rx: mpsc::Receiver<ConnectionEvent>,
}

impl ConnectionEvents {
    /// Next event, or `None` once the disconnect has been delivered.
    pub async fn recv(&mut self) -> Option<ConnectionEvent> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<ConnectionEvent> {
        self.rx.try_recv().ok()
    }

    pub fn into_stream(self) -> ReceiverStream<ConnectionEvent> {
        ReceiverStream::new(self.rx)
    }
}

struct Shared {
    state: AtomicU8,
    reason: Mutex<Option<DisconnectReason>>,
    /// Cancelled exactly once, when the connection starts closing. Every
    /// await on the writer races it so teardown never waits on a stalled send.
    closed: CancellationToken,
    metrics: ConnectionMetrics,
    writer: AsyncMutex<Option<BoxedWriter>>,
}

impl Shared {
    fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Move to `Disconnected`, wake the read loop and abort any pending write.
    /// Only the first caller's reason is kept; returns whether this call made
    /// the transition.
    fn begin_close(&self, reason: DisconnectReason) -> bool {
        let previous = self
            .state
            .swap(ConnectionState::Disconnected as u8, Ordering::AcqRel);
        if previous == ConnectionState::Disconnected as u8 {
            return false;
        }
        if let Ok(mut slot) = self.reason.lock() {
            slot.get_or_insert(reason);
        }
        self.closed.cancel();
        true
    }

    fn take_reason(&self) -> Option<DisconnectReason> {
        self.reason.lock().ok().and_then(|mut slot| slot.take())
    }
}

/// A joined session on a game server.
///
/// Inbound messages and the final disconnect arrive on the [`ConnectionEvents`]
/// returned alongside the connection. A single background task owns the read
/// half and the decoder; sends from any number of tasks are serialized so
/// frames never interleave on the wire.
///
/// Dropping the connection disconnects it.
pub struct Connection {
    shared: Arc<Shared>,
    remote_addr: Option<SocketAddr>,
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("remote_addr", &self.remote_addr)
            .field("state", &self.state())
            .finish()
    }
}

impl Connection {
    /// Connect to `endpoint`, send the preamble and join message, and start reading.
    #[instrument(skip(endpoint, join, config), fields(endpoint = %endpoint))]
    pub async fn connect(
        endpoint: &ServerEndpoint,
        join: &JoinRequest,
        config: &SessionConfig,
    ) -> Result<(Connection, ConnectionEvents)> {
        let stream = tcp::open_stream(endpoint, &config.client, config.proxy.as_ref()).await?;
        let remote_addr = match config.proxy {
            Some(_) => endpoint.ip().map(|ip| SocketAddr::new(ip, endpoint.port)),
            None => stream.peer_addr().ok(),
        };
        Self::from_stream(stream, remote_addr, join, &config.client).await
    }

    /// Join over an already-established stream.
    ///
    /// Any `AsyncRead + AsyncWrite` works, which is where a TLS stream would
    /// be attached.
    pub async fn from_stream<S>(
        stream: S,
        remote_addr: Option<SocketAddr>,
        join: &JoinRequest,
        config: &ClientConfig,
    ) -> Result<(Connection, ConnectionEvents)>
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let shared = Arc::new(Shared {
            state: AtomicU8::new(ConnectionState::Connecting as u8),
            reason: Mutex::new(None),
            closed: CancellationToken::new(),
            metrics: ConnectionMetrics::new(),
            writer: AsyncMutex::new(None),
        });

        let (read_half, mut write_half) = tokio::io::split(stream);
        let frame_len = handshake::client_join(&mut write_half, join).await?;
        shared.metrics.message_sent(frame_len as u64);

        let options = config.parser_options();
        let boxed: Pin<Box<dyn AsyncWrite + Send>> = Box::pin(write_half);
        *shared.writer.lock().await = Some(FramedWrite::new(boxed, MessageCodec::new(options)));

        let frames = FramedRead::with_capacity(
            read_half,
            MessageCodec::new(options),
            config.read_buffer_size,
        );
        let (tx, rx) = mpsc::channel(config.event_capacity);

        shared
            .state
            .store(ConnectionState::Open as u8, Ordering::Release);
        tokio::spawn(read_loop(shared.clone(), frames, tx));

        info!(remote = ?remote_addr, join_entries = join.join_data().len(), "Connection open");
        Ok((
            Connection {
                shared,
                remote_addr,
            },
            ConnectionEvents { rx },
        ))
    }

    /// Serialize and write one message.
    ///
    /// Invalid messages are rejected before anything is written. After a
    /// disconnect this returns [`ProtocolError::NotConnected`], and a send still
    /// waiting on a peer that stopped reading is abandoned with the same error.
    /// A write failure also tears the connection down; the reason arrives as
    /// the final event.
    pub async fn send(&self, message: &Message) -> Result<()> {
        framing::validate(message)?;
        if !self.is_connected() {
            return Err(ProtocolError::NotConnected);
        }

        let closed = &self.shared.closed;
        let mut guard = tokio::select! {
            biased;
            _ = closed.cancelled() => return Err(ProtocolError::NotConnected),
            guard = self.shared.writer.lock() => guard,
        };
        let writer = guard.as_mut().ok_or(ProtocolError::NotConnected)?;
        let written = tokio::select! {
            biased;
            _ = closed.cancelled() => None,
            written = writer.send(message) => Some(written),
        };

        match written {
            None => {
                // A frame may be half written; the stream is unusable either way
                guard.take();
                debug!(
                    message_type = message.message_type(),
                    "Send aborted by disconnect"
                );
                Err(ProtocolError::NotConnected)
            }
            Some(Ok(())) => {
                self.shared
                    .metrics
                    .message_sent(framing::encoded_len(message) as u64);
                trace!(message_type = message.message_type(), "Message sent");
                Ok(())
            }
            Some(Err(e)) => {
                guard.take();
                drop(guard);
                warn!(error = %e, "Send failed; closing connection");
                self.shared.begin_close(DisconnectReason::from_error(&e));
                Err(e)
            }
        }
    }

    /// Build and send a message in one call.
    pub async fn send_message<I, V>(&self, message_type: &str, values: I) -> Result<()>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.send(&Message::from_values(message_type, values)).await
    }

    /// Close the connection. Calling it again has no effect.
    ///
    /// The disconnect event is delivered once the read loop has released the
    /// stream.
    pub fn disconnect(&self) {
        if self.shared.begin_close(DisconnectReason::LocallyTerminated) {
            debug!(remote = ?self.remote_addr, "Local disconnect requested");
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.state()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    /// Address of the game server.
    ///
    /// Through a proxy this is only known when the endpoint is an IP literal;
    /// for a host name resolved by the proxy it is `None`.
    pub fn remote_addr(&self) -> Option<SocketAddr> {
        self.remote_addr
    }

    /// Message and byte counters in both directions.
    pub fn stats(&self) -> ConnectionStats {
        self.shared.metrics.snapshot()
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.shared.begin_close(DisconnectReason::LocallyTerminated);
    }
}

/// Sole owner of the decoder. Runs until the stream ends, fails, or a local
/// close is signalled, then releases both halves and emits `Disconnected`.
async fn read_loop<R>(
    shared: Arc<Shared>,
    mut frames: FramedRead<R, MessageCodec>,
    events: mpsc::Sender<ConnectionEvent>,
) where
    R: AsyncRead + Unpin,
{
    let mut subscribed = true;
    let mut counted = 0u64;

    let detected = loop {
        let next = tokio::select! {
            biased;
            _ = shared.closed.cancelled() => break None,
            next = frames.next() => next,
        };

        let total = frames.decoder().bytes_read();
        shared.metrics.bytes_read(total - counted);
        counted = total;

        match next {
            Some(Ok(message)) => {
                shared.metrics.message_received();
                trace!(
                    message_type = message.message_type(),
                    values = message.len(),
                    "Message received"
                );
                if !subscribed {
                    continue;
                }
                tokio::select! {
                    biased;
                    _ = shared.closed.cancelled() => break None,
                    sent = events.send(ConnectionEvent::Message(message)) => {
                        if sent.is_err() {
                            debug!("Event receiver dropped; discarding inbound messages");
                            subscribed = false;
                        }
                    }
                }
            }
            Some(Err(e)) => {
                if e.is_fatal_protocol() {
                    error!(error = %e, "Inbound stream desynchronized");
                }
                break Some(DisconnectReason::from_error(&e));
            }
            None => break Some(DisconnectReason::ZeroLengthRead),
        }
    };

    let reason = match detected {
        Some(reason) => {
            shared.begin_close(reason);
            shared
                .take_reason()
                .unwrap_or(DisconnectReason::LocallyTerminated)
        }
        None => shared
            .take_reason()
            .unwrap_or(DisconnectReason::LocallyTerminated),
    };

    // Any send holding the writer has seen the cancellation and is letting go
    drop(frames);
    if let Some(mut writer) = shared.writer.lock().await.take() {
        let closing = async { writer.get_mut().shutdown().await.map_err(ProtocolError::from) };
        if let Err(e) = with_timeout_error(closing, SHUTDOWN_TIMEOUT, "writer shutdown").await {
            debug!(error = %e, "Write half did not shut down cleanly");
        }
    }

    if reason.is_local() {
        info!(%reason, "Connection closed");
    } else {
        warn!(%reason, "Connection closed");
    }
    shared.metrics.log_metrics();

    let _ = events.send(ConnectionEvent::Disconnected(reason)).await;
}
