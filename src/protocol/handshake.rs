//! Join handshake.
//!
//! Every new stream starts with a single preamble byte (`0x00`) followed by a
//! `"join"` message whose first value is the join key issued by the session
//! directory and whose remaining values are the join data flattened into
//! alternating key/value strings.
//!
//! ```text
//! 0x00 | [Count] ["join"] [join key] [k1] [v1] [k2] [v2] ...
//! ```
//!
//! The handshake is fire-and-forget: the server does not acknowledge it with a
//! dedicated frame, it simply starts sending room messages (or closes the
//! stream if the key is rejected).

use crate::config::PREAMBLE;
use crate::core::framing;
use crate::error::Result;
use crate::protocol::message::Message;
use bytes::{BufMut, BytesMut};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, instrument};

/// Credentials and optional data needed to join a room.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct JoinRequest {
    join_key: String,
    join_data: Vec<(String, String)>,
}

impl JoinRequest {
    pub fn new(join_key: impl Into<String>) -> Self {
        Self {
            join_key: join_key.into(),
            join_data: Vec::new(),
        }
    }

    /// Attach one join data entry. Entries keep their insertion order.
    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.join_data.push((key.into(), value.into()));
        self
    }

    pub fn with_entries<I, K, V>(mut self, entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.join_data
            .extend(entries.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    pub fn join_key(&self) -> &str {
        &self.join_key
    }

    pub fn join_data(&self) -> &[(String, String)] {
        &self.join_data
    }

    /// The `"join"` message carrying the key and flattened join data.
    pub fn to_message(&self) -> Message {
        let mut message = Message::join(self.join_key.as_str());
        for (key, value) in &self.join_data {
            message.push(key.as_str());
            message.push(value.as_str());
        }
        message
    }

    /// Preamble byte followed by the framed join message.
    pub fn to_handshake_bytes(&self) -> Result<BytesMut> {
        let message = self.to_message();
        let mut buf = BytesMut::with_capacity(1 + framing::encoded_len(&message));
        buf.put_u8(PREAMBLE);
        framing::encode_message(&message, &mut buf)?;
        Ok(buf)
    }
}

/// Write the preamble and join message as one transport write.
///
/// Returns the size of the join frame (the preamble byte is not counted).
#[instrument(skip(writer, join), fields(join_entries = join.join_data().len()))]
pub async fn client_join<W>(writer: &mut W, join: &JoinRequest) -> Result<usize>
where
    W: AsyncWrite + Unpin,
{
    let bytes = join.to_handshake_bytes()?;
    writer.write_all(&bytes).await?;
    writer.flush().await?;
    debug!(frame_bytes = bytes.len() - 1, "Join handshake sent");
    Ok(bytes.len() - 1)
}
