use bytes::BytesMut;
use std::collections::VecDeque;
use tokio_util::codec::{Decoder, Encoder};
use tracing::warn;

use crate::core::framing;
use crate::core::parser::{Parser, ParserOptions};
use crate::error::{ProtocolError, Result};
use crate::protocol::message::Message;

/// Tokio codec bridging the wire format to `FramedRead`/`FramedWrite`.
///
/// Decoding drains every readable byte into the incremental [`Parser`] on each
/// call, so the read buffer never holds partial frames; completed messages wait
/// in an internal queue and are handed out one per `decode` call.
#[derive(Debug, Default)]
pub struct MessageCodec {
    parser: Parser,
    ready: VecDeque<Message>,
    failure: Option<ProtocolError>,
    bytes_read: u64,
}

impl MessageCodec {
    pub fn new(options: ParserOptions) -> Self {
        Self {
            parser: Parser::with_options(options),
            ready: VecDeque::new(),
            failure: None,
            bytes_read: 0,
        }
    }

    /// Total bytes consumed from the stream so far.
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    pub fn parser(&self) -> &Parser {
        &self.parser
    }
}

impl Decoder for MessageCodec {
    type Item = Message;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Message>> {
        if !src.is_empty() && self.failure.is_none() {
            let chunk = src.split();
            self.bytes_read += chunk.len() as u64;
            if let Err(e) = self.parser.feed_into(&chunk, &mut self.ready) {
                self.failure = Some(e);
            }
        }

        // Messages completed ahead of a failure keep their place in line
        if let Some(message) = self.ready.pop_front() {
            return Ok(Some(message));
        }
        match self.failure.take() {
            Some(e) => Err(e),
            None => Ok(None),
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Message>> {
        let message = self.decode(src)?;
        if message.is_none() && self.parser.is_mid_message() {
            warn!(
                state = ?self.parser.state(),
                "Stream ended inside a frame; discarding partial message"
            );
        }
        Ok(message)
    }
}

impl Encoder<&Message> for MessageCodec {
    type Error = ProtocolError;

    fn encode(&mut self, message: &Message, dst: &mut BytesMut) -> Result<()> {
        framing::encode_message(message, dst)
    }
}

impl Encoder<Message> for MessageCodec {
    type Error = ProtocolError;

    fn encode(&mut self, message: Message, dst: &mut BytesMut) -> Result<()> {
        framing::encode_message(&message, dst)
    }
}
