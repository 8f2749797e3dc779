//! # Session Protocol
//!
//! The message model, the join handshake and application-side dispatch.
//!
//! ## Components
//! - **Message**: a named, ordered group of scalar values
//! - **Handshake**: preamble byte plus the `"join"` message
//! - **Dispatcher**: routes received messages to handlers by type

pub mod dispatcher;
pub mod handshake;
pub mod message;

#[cfg(test)]
mod tests;
