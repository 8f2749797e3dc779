//! # Core Protocol Components
//!
//! Tag-based binary encoding, message framing and the incremental parser.
//!
//! ## Components
//! - **Tag**: classifies the leading byte of every encoded value
//! - **Value**: encodes/decodes one scalar using its tag
//! - **Framing**: counted, named groups of values
//! - **Parser**: resumable state machine over arbitrarily chunked input
//! - **Codec**: Tokio codec for framing over byte streams
//!
//! ## Wire Format
//! ```text
//! [Count(tag)] [Type(tag+utf8)] [Value(tag+payload)] x Count
//! ```
//! All multi-byte payloads are big-endian.
//!
//! ## Security
//! - Unrecognised tag bytes are fatal; there is no resynchronisation
//! - Declared lengths and counts are checked against limits before allocation

pub mod codec;
pub mod framing;
pub mod parser;
pub mod tag;
pub mod value;
