//! # Incremental Parser
//!
//! Turns an arbitrarily chunked byte stream into complete [`Message`]s.
//!
//! Frames carry no outer length prefix, only the declared value count, so the
//! parser cannot wait for "one whole frame" before decoding. Instead it keeps a
//! small resumable state machine that survives any split point, including
//! splits inside a tag, a length header or a payload:
//!
//! ```text
//!              tag needs header           header complete
//! AwaitingTag ------------------> AccumulatingHeader ------> AccumulatingData
//!     ^   |                                                        |
//!     |   +---- tag needs payload -------------------------------->|
//!     |                                                            |
//!     +------------- value emitted (inline tag or payload complete) <+
//! ```
//!
//! Each emitted value is handed to the [`FrameAssembler`], which completes a
//! message once the declared count is reached.
//!
//! An unrecognised tag, bad UTF-8, or a limit violation leaves the stream with
//! no way to resynchronise. The parser then poisons itself and every later
//! call fails.

use crate::core::framing::FrameAssembler;
use crate::core::tag::Tag;
use crate::core::value::{be_u64, Int64Layout, Value};
use crate::error::{constants, ProtocolError, Result};
use crate::protocol::message::Message;
use bytes::{BufMut, BytesMut};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Default ceiling for a single string or byte-array payload (16 MiB).
pub const DEFAULT_MAX_VALUE_LEN: usize = 16 * 1024 * 1024;

/// Default ceiling for the declared value count of one message.
pub const DEFAULT_MAX_MESSAGE_VALUES: usize = 65_536;

/// Upper bound on speculative scratch allocation for a declared payload.
const SCRATCH_RESERVE_CAP: usize = 64 * 1024;

/// Decoder tuning shared by [`ValueReader`] and [`Parser`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct ParserOptions {
    pub int64_layout: Int64Layout,
    pub max_value_len: usize,
    pub max_message_values: usize,
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self {
            int64_layout: Int64Layout::Counted,
            max_value_len: DEFAULT_MAX_VALUE_LEN,
            max_message_values: DEFAULT_MAX_MESSAGE_VALUES,
        }
    }
}

/// Progress marker of the value state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParserState {
    /// Next byte is a tag.
    AwaitingTag,
    /// Collecting the big-endian length header of a long string/byte array.
    AccumulatingHeader { tag: Tag, remaining: usize },
    /// Collecting payload bytes.
    AccumulatingData { tag: Tag, remaining: usize },
}

/// Byte-level state machine producing one [`Value`] at a time.
#[derive(Debug)]
pub struct ValueReader {
    state: ParserState,
    scratch: BytesMut,
    layout: Int64Layout,
    max_value_len: usize,
}

impl ValueReader {
    pub fn new(layout: Int64Layout, max_value_len: usize) -> Self {
        Self {
            state: ParserState::AwaitingTag,
            scratch: BytesMut::new(),
            layout,
            max_value_len,
        }
    }

    pub fn state(&self) -> ParserState {
        self.state
    }

    /// Advance by exactly one byte.
    pub fn push(&mut self, byte: u8) -> Result<Option<Value>> {
        match self.state {
            ParserState::AwaitingTag => self.on_tag(byte),
            ParserState::AccumulatingHeader { tag, remaining } => {
                self.scratch.put_u8(byte);
                if remaining > 1 {
                    self.state = ParserState::AccumulatingHeader {
                        tag,
                        remaining: remaining - 1,
                    };
                    return Ok(None);
                }
                let len = be_u64(&self.scratch) as usize;
                self.scratch.clear();
                self.expect_data(tag, len)
            }
            ParserState::AccumulatingData { tag, remaining } => {
                self.scratch.put_u8(byte);
                if remaining > 1 {
                    self.state = ParserState::AccumulatingData {
                        tag,
                        remaining: remaining - 1,
                    };
                    return Ok(None);
                }
                self.finish(tag).map(Some)
            }
        }
    }

    /// Consume a prefix of `input`, returning how many bytes were used and the
    /// value completed by them, if any. Payload bytes are copied in bulk.
    pub fn advance(&mut self, input: &[u8]) -> Result<(usize, Option<Value>)> {
        if let ParserState::AccumulatingData { tag, remaining } = self.state {
            let take = remaining.min(input.len());
            self.scratch.extend_from_slice(&input[..take]);
            if take < remaining {
                self.state = ParserState::AccumulatingData {
                    tag,
                    remaining: remaining - take,
                };
                return Ok((take, None));
            }
            return self.finish(tag).map(|value| (take, Some(value)));
        }
        match input.first() {
            Some(byte) => self.push(*byte).map(|value| (1, value)),
            None => Ok((0, None)),
        }
    }

    fn on_tag(&mut self, byte: u8) -> Result<Option<Value>> {
        let (tag, rem) = Tag::parse(byte)?;
        match tag {
            Tag::UIntShort | Tag::BoolTrue | Tag::BoolFalse => Ok(Value::from_inline(tag, rem)),
            Tag::StringShort | Tag::BytesShort => self.expect_data(tag, rem as usize),
            Tag::StringLong | Tag::BytesLong => {
                self.state = ParserState::AccumulatingHeader {
                    tag,
                    remaining: rem as usize + 1,
                };
                Ok(None)
            }
            Tag::UIntLong | Tag::IntLong => self.expect_data(tag, rem as usize + 1),
            Tag::ULongShort | Tag::ULongLong | Tag::LongShort | Tag::LongLong => {
                self.expect_data(tag, self.layout.payload_len(tag, rem))
            }
            Tag::Double => self.expect_data(tag, 8),
            Tag::Float => self.expect_data(tag, 4),
        }
    }

    /// Enter `AccumulatingData`, or emit an empty value straight away.
    fn expect_data(&mut self, tag: Tag, len: usize) -> Result<Option<Value>> {
        if len > self.max_value_len {
            return Err(ProtocolError::ValueTooLong {
                len,
                limit: self.max_value_len,
            });
        }
        if len == 0 {
            return self.finish(tag).map(Some);
        }
        self.scratch.reserve(len.min(SCRATCH_RESERVE_CAP));
        self.state = ParserState::AccumulatingData {
            tag,
            remaining: len,
        };
        Ok(None)
    }

    fn finish(&mut self, tag: Tag) -> Result<Value> {
        let value = Value::from_payload(tag, &self.scratch)?;
        self.scratch.clear();
        self.state = ParserState::AwaitingTag;
        Ok(value)
    }
}

/// Resumable message parser. Owned by exactly one connection.
#[derive(Debug)]
pub struct Parser {
    reader: ValueReader,
    frames: FrameAssembler,
    poisoned: bool,
}

impl Default for Parser {
    fn default() -> Self {
        Self::new()
    }
}

impl Parser {
    pub fn new() -> Self {
        Self::with_options(ParserOptions::default())
    }

    pub fn with_layout(layout: Int64Layout) -> Self {
        Self::with_options(ParserOptions {
            int64_layout: layout,
            ..ParserOptions::default()
        })
    }

    pub fn with_options(options: ParserOptions) -> Self {
        Self {
            reader: ValueReader::new(options.int64_layout, options.max_value_len),
            frames: FrameAssembler::new(options.max_message_values),
            poisoned: false,
        }
    }

    pub fn state(&self) -> ParserState {
        self.reader.state()
    }

    /// True when some bytes of an unfinished message have been consumed.
    pub fn is_mid_message(&self) -> bool {
        self.reader.state() != ParserState::AwaitingTag || self.frames.in_progress()
    }

    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    /// Feed one chunk, calling `on_message` for every message it completes,
    /// in wire order. Messages completed before an error are still delivered.
    pub fn feed<F>(&mut self, input: &[u8], mut on_message: F) -> Result<()>
    where
        F: FnMut(Message),
    {
        if self.poisoned {
            return Err(ProtocolError::Desynchronized(constants::ERR_PARSER_POISONED));
        }
        let result = self.feed_inner(input, &mut on_message);
        if result.is_err() {
            self.poisoned = true;
        }
        result
    }

    /// Feed one chunk and queue completed messages onto `out`.
    pub fn feed_into(&mut self, input: &[u8], out: &mut VecDeque<Message>) -> Result<()> {
        self.feed(input, |message| out.push_back(message))
    }

    /// Feed one chunk and collect the messages it completes.
    pub fn parse(&mut self, input: &[u8]) -> Result<Vec<Message>> {
        let mut messages = Vec::new();
        self.feed(input, |message| messages.push(message))?;
        Ok(messages)
    }

    fn feed_inner(&mut self, mut input: &[u8], on_message: &mut impl FnMut(Message)) -> Result<()> {
        while !input.is_empty() {
            let (used, value) = self.reader.advance(input)?;
            input = &input[used..];
            if let Some(value) = value {
                if let Some(message) = self.frames.accept(value)? {
                    on_message(message);
                }
            }
        }
        Ok(())
    }
}
