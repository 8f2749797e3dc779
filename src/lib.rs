//! # session-wire
//!
//! Client transport for persistent multiplayer game sessions.
//!
//! The crate covers the wire format (a tag-byte scalar codec and
//! count-prefixed message framing), an incremental parser that produces
//! messages from arbitrarily chunked input, and a [`Connection`] that performs
//! the join handshake, runs the read loop and serializes sends.
//!
//! ## Layout
//! - [`core`]: tags, values, framing, the incremental parser and a tokio codec
//! - [`protocol`]: the message model, join handshake and dispatcher
//! - [`transport`]: TCP setup and proxy traversal
//! - [`service`]: the connection lifecycle
//! - [`config`]: configuration and protocol constants
//! - [`utils`]: logging, timeouts and counters
//!
//! ## Example
//! ```no_run
//! use session_wire::{
//!     Connection, ConnectionEvent, JoinRequest, Message, ServerEndpoint, SessionConfig,
//! };
//!
//! # async fn run() -> session_wire::Result<()> {
//! let config = SessionConfig::default();
//! let endpoint = ServerEndpoint::new("game.example", 8184);
//! let join = JoinRequest::new("join-key").with_data("name", "player");
//!
//! let (conn, mut events) = Connection::connect(&endpoint, &join, &config).await?;
//! conn.send(&Message::new("move").with(3i32).with(4i32)).await?;
//!
//! while let Some(event) = events.recv().await {
//!     match event {
//!         ConnectionEvent::Message(msg) => println!("{msg}"),
//!         ConnectionEvent::Disconnected(reason) => println!("closed: {reason}"),
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod protocol;
pub mod service;
pub mod transport;
pub mod utils;

pub use crate::config::SessionConfig;
pub use crate::core::parser::Parser;
pub use crate::core::value::{Int64Layout, Value, ValueKind};
pub use crate::error::{ProtocolError, Result};
pub use crate::protocol::dispatcher::Dispatcher;
pub use crate::protocol::handshake::JoinRequest;
pub use crate::protocol::message::Message;
pub use crate::service::{
    Connection, ConnectionEvent, ConnectionEvents, ConnectionState, DisconnectReason,
};
pub use crate::transport::ServerEndpoint;
pub use crate::utils::metrics::ConnectionStats;
