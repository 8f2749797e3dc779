//! # Session Service
//!
//! The client-side [`Connection`]: join handshake, background read loop,
//! serialized sends and disconnect notification.

pub mod connection;

pub use connection::{
    Connection, ConnectionEvent, ConnectionEvents, ConnectionState, DisconnectReason,
};
