//! Message framing.
//!
//! ```text
//! [Count: int] [Type: string] [Value 0] ... [Value Count-1]
//! ```
//!
//! Count is the number of values after the type string; the type itself is not
//! counted. There is no outer length prefix, so the decoder only knows a frame
//! is done once it has seen Count values.

use crate::core::value::{put_str, str_encoded_len, Value};
use crate::error::{ProtocolError, Result};
use crate::protocol::message::Message;
use bytes::BytesMut;

/// Check a message can be framed without writing anything.
pub fn validate(message: &Message) -> Result<()> {
    if message.message_type().is_empty() {
        return Err(ProtocolError::EmptyMessageType);
    }
    count_value(message)?;
    if message.message_type().len() > i32::MAX as usize {
        return Err(ProtocolError::ValueTooLarge(message.message_type().len()));
    }
    message.values().iter().try_for_each(Value::check_encodable)
}

/// Exact size of the framed message on the wire.
pub fn encoded_len(message: &Message) -> usize {
    let count = Value::Int(message.len().min(i32::MAX as usize) as i32);
    count.encoded_len()
        + str_encoded_len(message.message_type())
        + message.values().iter().map(Value::encoded_len).sum::<usize>()
}

/// Append the framed message to `dst`. Validation runs first, so on error
/// nothing has been written.
pub fn encode_message(message: &Message, dst: &mut BytesMut) -> Result<()> {
    validate(message)?;
    dst.reserve(encoded_len(message));
    count_value(message)?.encode(dst);
    put_str(dst, message.message_type());
    for value in message.values() {
        value.encode(dst);
    }
    Ok(())
}

/// Frame a message into a freshly allocated buffer.
pub fn to_bytes(message: &Message) -> Result<Vec<u8>> {
    let mut buf = BytesMut::new();
    encode_message(message, &mut buf)?;
    Ok(buf.to_vec())
}

fn count_value(message: &Message) -> Result<Value> {
    i32::try_from(message.len())
        .map(Value::Int)
        .map_err(|_| ProtocolError::ValueTooLarge(message.len()))
}

/// Decode-side framing: turns a sequence of values into messages.
#[derive(Debug)]
pub struct FrameAssembler {
    expected: Option<usize>,
    pending: Option<Message>,
    max_values: usize,
}

impl FrameAssembler {
    pub fn new(max_values: usize) -> Self {
        Self {
            expected: None,
            pending: None,
            max_values,
        }
    }

    /// Whether a Count has been read and its message is not yet complete.
    pub fn in_progress(&self) -> bool {
        self.expected.is_some()
    }

    /// Feed the next decoded value; returns the message it completes, if any.
    pub fn accept(&mut self, value: Value) -> Result<Option<Message>> {
        let Some(count) = self.expected else {
            let count = declared_count(&value)?;
            if count > self.max_values {
                return Err(ProtocolError::TooManyValues {
                    count,
                    limit: self.max_values,
                });
            }
            self.expected = Some(count);
            return Ok(None);
        };

        match self.pending.take() {
            None => {
                let Value::String(message_type) = value else {
                    return Err(ProtocolError::UnexpectedValue {
                        expected: "message type string",
                        found: value.kind(),
                    });
                };
                let message = Message::new(message_type);
                if count == 0 {
                    self.expected = None;
                    return Ok(Some(message));
                }
                self.pending = Some(message);
                Ok(None)
            }
            Some(mut message) => {
                message.push(value);
                if message.len() == count {
                    self.expected = None;
                    Ok(Some(message))
                } else {
                    self.pending = Some(message);
                    Ok(None)
                }
            }
        }
    }
}

fn declared_count(value: &Value) -> Result<usize> {
    match value {
        Value::Int(n) if *n >= 0 => Ok(*n as usize),
        Value::Int(n) => Err(ProtocolError::InvalidCount(*n as i64)),
        Value::UInt(n) => Ok(*n as usize),
        other => Err(ProtocolError::UnexpectedValue {
            expected: "value count",
            found: other.kind(),
        }),
    }
}
