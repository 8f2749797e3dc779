//! # Scalar Values
//!
//! The nine scalar kinds a message can carry, and their tag-based wire encoding.
//!
//! ## Encoding rules
//! - Strings and byte arrays of up to 63 bytes put their length in a short tag;
//!   longer ones use a long tag followed by a minimal big-endian length header.
//! - Signed 32-bit values in `0..=63` use `UINT_SHORT`; every other signed value
//!   uses `INT_LONG` with the minimal number of big-endian bytes.
//! - Unsigned 32-bit values always use `UINT_LONG`, so the two 32-bit kinds
//!   survive a round trip unchanged.
//! - 64-bit values write 1 to 8 significant bytes and signal the count in the
//!   tag remainder (see [`Int64Layout`] for how the decoder reads them back).
//! - Floats and doubles are the bare tag plus 4 or 8 big-endian bytes.
//! - Booleans are the bare tag.

use crate::core::tag::{Tag, SHORT_FORM_MAX};
use crate::error::{ProtocolError, Result};
use bytes::{BufMut, BytesMut};
use serde::{Deserialize, Serialize};
use std::fmt;

/// How the decoder sizes 64-bit payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Int64Layout {
    /// Read the byte count signalled in the tag remainder: short forms carry
    /// `rem + 1` bytes, long forms `rem + 5` bytes. Matches the encoder.
    #[default]
    Counted,
    /// Read exactly 1 byte for short forms and 6 bytes for long forms,
    /// ignoring the remainder. Compatible with legacy peers that decode this way.
    Fixed,
}

impl Int64Layout {
    /// Payload bytes following a 64-bit tag.
    pub fn payload_len(self, tag: Tag, rem: u8) -> usize {
        let long = matches!(tag, Tag::LongLong | Tag::ULongLong);
        match (self, long) {
            (Int64Layout::Counted, false) => rem as usize + 1,
            (Int64Layout::Counted, true) => rem as usize + 5,
            (Int64Layout::Fixed, false) => 1,
            (Int64Layout::Fixed, true) => 6,
        }
    }
}

/// One wire-representable scalar.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Bytes(Vec<u8>),
    Int(i32),
    UInt(u32),
    Long(i64),
    ULong(u64),
    Float(f32),
    Double(f64),
    Bool(bool),
}

/// The kind of a [`Value`], used in error reporting and typed accessors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    String,
    Bytes,
    Int,
    UInt,
    Long,
    ULong,
    Float,
    Double,
    Bool,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueKind::String => "string",
            ValueKind::Bytes => "byte array",
            ValueKind::Int => "int",
            ValueKind::UInt => "uint",
            ValueKind::Long => "long",
            ValueKind::ULong => "ulong",
            ValueKind::Float => "float",
            ValueKind::Double => "double",
            ValueKind::Bool => "bool",
        };
        f.write_str(name)
    }
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::String(_) => ValueKind::String,
            Value::Bytes(_) => ValueKind::Bytes,
            Value::Int(_) => ValueKind::Int,
            Value::UInt(_) => ValueKind::UInt,
            Value::Long(_) => ValueKind::Long,
            Value::ULong(_) => ValueKind::ULong,
            Value::Float(_) => ValueKind::Float,
            Value::Double(_) => ValueKind::Double,
            Value::Bool(_) => ValueKind::Bool,
        }
    }

    /// Reject values that cannot be put on the wire. Lengths travel as
    /// signed 32-bit numbers, so anything above `i32::MAX` bytes is refused.
    pub fn check_encodable(&self) -> Result<()> {
        let len = match self {
            Value::String(s) => s.len(),
            Value::Bytes(b) => b.len(),
            _ => return Ok(()),
        };
        if len > i32::MAX as usize {
            return Err(ProtocolError::ValueTooLarge(len));
        }
        Ok(())
    }

    /// Exact number of bytes [`Value::encode`] will write.
    pub fn encoded_len(&self) -> usize {
        match self {
            Value::String(s) => str_encoded_len(s),
            Value::Bytes(b) => length_prefix_len(b.len()) + b.len(),
            Value::Int(v) if (0..=SHORT_FORM_MAX as i32).contains(v) => 1,
            Value::Int(v) => 1 + significant_bytes_u32(&v.to_be_bytes()),
            Value::UInt(v) => 1 + significant_bytes_u32(&v.to_be_bytes()),
            Value::Long(v) => 1 + significant_bytes_u64(&v.to_be_bytes()),
            Value::ULong(v) => 1 + significant_bytes_u64(&v.to_be_bytes()),
            Value::Float(_) => 5,
            Value::Double(_) => 9,
            Value::Bool(_) => 1,
        }
    }

    /// Append the wire form of this value to `dst`.
    ///
    /// Call [`Value::check_encodable`] first; oversized strings and byte
    /// arrays would otherwise have their length truncated.
    pub fn encode(&self, dst: &mut BytesMut) {
        match self {
            Value::String(s) => put_str(dst, s),
            Value::Bytes(b) => {
                put_tagged_length(dst, b.len() as i32, Tag::BytesShort, Tag::BytesLong);
                dst.put_slice(b);
            }
            Value::Int(v) => put_tagged_length(dst, *v, Tag::UIntShort, Tag::IntLong),
            Value::UInt(v) => put_minimal(dst, Tag::UIntLong, &v.to_be_bytes()),
            Value::Long(v) => put_wide(dst, Tag::LongShort, Tag::LongLong, &v.to_be_bytes()),
            Value::ULong(v) => put_wide(dst, Tag::ULongShort, Tag::ULongLong, &v.to_be_bytes()),
            Value::Float(v) => {
                dst.put_u8(Tag::Float.pattern());
                dst.put_f32(*v);
            }
            Value::Double(v) => {
                dst.put_u8(Tag::Double.pattern());
                dst.put_f64(*v);
            }
            Value::Bool(true) => dst.put_u8(Tag::BoolTrue.pattern()),
            Value::Bool(false) => dst.put_u8(Tag::BoolFalse.pattern()),
        }
    }

    /// Encode a single value into a fresh buffer.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        self.check_encodable()?;
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        self.encode(&mut buf);
        Ok(buf.to_vec())
    }

    /// Decode exactly one value from `src`, which must hold nothing else.
    pub fn from_bytes(src: &[u8], layout: Int64Layout) -> Result<Value> {
        let mut reader = crate::core::parser::ValueReader::new(layout, usize::MAX);
        for (i, byte) in src.iter().enumerate() {
            if let Some(value) = reader.push(*byte)? {
                if i + 1 != src.len() {
                    return Err(ProtocolError::Desynchronized(
                        "trailing bytes after a complete value",
                    ));
                }
                return Ok(value);
            }
        }
        Err(ProtocolError::Desynchronized("value truncated"))
    }

    /// Build a value from a self-contained tag (no payload).
    pub(crate) fn from_inline(tag: Tag, rem: u8) -> Option<Value> {
        match tag {
            Tag::UIntShort => Some(Value::Int(rem as i32)),
            Tag::BoolTrue => Some(Value::Bool(true)),
            Tag::BoolFalse => Some(Value::Bool(false)),
            _ => None,
        }
    }

    /// Build a value from the payload bytes accumulated after `tag`.
    pub(crate) fn from_payload(tag: Tag, payload: &[u8]) -> Result<Value> {
        let value = match tag {
            Tag::StringShort | Tag::StringLong => Value::String(
                String::from_utf8(payload.to_vec()).map_err(|_| ProtocolError::InvalidUtf8)?,
            ),
            Tag::BytesShort | Tag::BytesLong => Value::Bytes(payload.to_vec()),
            Tag::UIntLong => Value::UInt(be_u64(payload) as u32),
            Tag::IntLong => Value::Int(be_u64(payload) as u32 as i32),
            Tag::ULongShort | Tag::ULongLong => Value::ULong(be_u64(payload)),
            Tag::LongShort | Tag::LongLong => Value::Long(be_u64(payload) as i64),
            Tag::Float => Value::Float(f32::from_bits(be_u64(payload) as u32)),
            Tag::Double => Value::Double(f64::from_bits(be_u64(payload))),
            Tag::UIntShort | Tag::BoolTrue | Tag::BoolFalse => {
                return Err(ProtocolError::Desynchronized("inline tag carries no payload"))
            }
        };
        Ok(value)
    }
}

/// Big-endian bytes zero-extended on the left to 64 bits.
pub(crate) fn be_u64(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0u64, |acc, b| (acc << 8) | *b as u64)
}

/// Append a string in its tagged form without building a [`Value`].
pub(crate) fn put_str(dst: &mut BytesMut, s: &str) {
    put_tagged_length(dst, s.len() as i32, Tag::StringShort, Tag::StringLong);
    dst.put_slice(s.as_bytes());
}

pub(crate) fn str_encoded_len(s: &str) -> usize {
    length_prefix_len(s.len()) + s.len()
}

fn length_prefix_len(len: usize) -> usize {
    if len <= SHORT_FORM_MAX as usize {
        1
    } else {
        1 + significant_bytes_u32(&(len as u32).to_be_bytes())
    }
}

/// Significant trailing bytes of a big-endian 32-bit number, at least one.
fn significant_bytes_u32(be: &[u8; 4]) -> usize {
    4 - be[..3].iter().take_while(|b| **b == 0).count()
}

/// Significant trailing bytes of a big-endian 64-bit number, at least one.
fn significant_bytes_u64(be: &[u8; 8]) -> usize {
    8 - be[..7].iter().take_while(|b| **b == 0).count()
}

/// Short tag with inline magnitude for `0..=63`, otherwise the long tag with
/// minimal big-endian bytes. Negative numbers always take four bytes.
fn put_tagged_length(dst: &mut BytesMut, n: i32, short: Tag, long: Tag) {
    if (0..=SHORT_FORM_MAX as i32).contains(&n) {
        dst.put_u8(short.with_remainder(n as u8));
    } else {
        put_minimal(dst, long, &n.to_be_bytes());
    }
}

fn put_minimal(dst: &mut BytesMut, tag: Tag, be: &[u8; 4]) {
    let count = significant_bytes_u32(be);
    dst.put_u8(tag.with_remainder((count - 1) as u8));
    dst.put_slice(&be[4 - count..]);
}

fn put_wide(dst: &mut BytesMut, short: Tag, long: Tag, be: &[u8; 8]) {
    let count = significant_bytes_u64(be);
    if count > 4 {
        dst.put_u8(long.with_remainder((count - 5) as u8));
    } else {
        dst.put_u8(short.with_remainder((count - 1) as u8));
    }
    dst.put_slice(&be[8 - count..]);
}

macro_rules! impl_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::$variant(v.into())
                }
            }
        )*
    };
}

impl_from! {
    String => String,
    &str => String,
    Vec<u8> => Bytes,
    &[u8] => Bytes,
    i32 => Int,
    u32 => UInt,
    i64 => Long,
    u64 => ULong,
    f32 => Float,
    f64 => Double,
    bool => Bool,
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => write!(f, "{s}"),
            Value::Bytes(b) => write!(f, "<{} bytes>", b.len()),
            Value::Int(v) => write!(f, "{v}"),
            Value::UInt(v) => write!(f, "{v}"),
            Value::Long(v) => write!(f, "{v}"),
            Value::ULong(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Double(v) => write!(f, "{v}"),
            Value::Bool(v) => write!(f, "{v}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enc(v: impl Into<Value>) -> Vec<u8> {
        v.into().to_bytes().expect("encodable")
    }

    #[test]
    fn test_int_short_and_long_boundary() {
        assert_eq!(enc(0i32), vec![0x80]);
        assert_eq!(enc(63i32), vec![0xBF]);
        assert_eq!(enc(64i32), vec![0x04, 0x40]);
        assert_eq!(enc(256i32), vec![0x05, 0x01, 0x00]);
        assert_eq!(enc(i32::MAX), vec![0x07, 0x7F, 0xFF, 0xFF, 0xFF]);
        assert_eq!(enc(-1i32), vec![0x07, 0xFF, 0xFF, 0xFF, 0xFF]);
    }

    #[test]
    fn test_uint_always_uses_long_form() {
        assert_eq!(enc(0u32), vec![0x08, 0x00]);
        assert_eq!(enc(5u32), vec![0x08, 0x05]);
        assert_eq!(enc(u32::MAX), vec![0x0B, 0xFF, 0xFF, 0xFF, 0xFF]);
    }

    #[test]
    fn test_wide_forms_signal_byte_count() {
        assert_eq!(enc(0i64), vec![0x30, 0x00]);
        assert_eq!(enc(0x0102_0304i64), vec![0x33, 0x01, 0x02, 0x03, 0x04]);
        assert_eq!(enc(0x01_0203_0405u64), vec![0x3C, 0x01, 0x02, 0x03, 0x04, 0x05]);
        assert_eq!(
            enc(i64::MAX),
            vec![0x37, 0x7F, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF]
        );
        assert_eq!(enc(-1i64).len(), 9);
    }

    #[test]
    fn test_empty_string_and_bytes_are_one_byte() {
        assert_eq!(enc(""), vec![0xC0]);
        assert_eq!(enc(Vec::<u8>::new()), vec![0x40]);
    }

    #[test]
    fn test_long_string_header_is_minimal() {
        let s = "x".repeat(64);
        let bytes = enc(s.as_str());
        assert_eq!(&bytes[..2], &[0x0C, 0x40]);
        assert_eq!(bytes.len(), 2 + 64);

        let big = vec![7u8; 300];
        let bytes = enc(big);
        assert_eq!(&bytes[..3], &[0x11, 0x01, 0x2C]);
    }

    #[test]
    fn test_floating_point_is_big_endian() {
        assert_eq!(enc(1.0f32), vec![0x02, 0x3F, 0x80, 0x00, 0x00]);
        assert_eq!(
            enc(1.0f64),
            vec![0x03, 0x3F, 0xF0, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00]
        );
    }

    #[test]
    fn test_encoded_len_matches_output() {
        let samples: Vec<Value> = vec![
            "".into(),
            "abc".into(),
            "y".repeat(70_000).into(),
            vec![1u8; 63].into(),
            vec![1u8; 64].into(),
            0i32.into(),
            64i32.into(),
            (-5i32).into(),
            7u32.into(),
            0x1_0000u32.into(),
            (-2i64).into(),
            0xFFu64.into(),
            0x1_0000_0000u64.into(),
            1.5f32.into(),
            2.5f64.into(),
            true.into(),
        ];
        for v in samples {
            assert_eq!(v.encoded_len(), enc(v.clone()).len(), "{v:?}");
        }
    }

    #[test]
    fn test_from_bytes_rejects_trailing_data() {
        assert!(Value::from_bytes(&[0x81, 0x82], Int64Layout::Counted).is_err());
        assert!(Value::from_bytes(&[0xC3, b'a'], Int64Layout::Counted).is_err());
    }

    #[test]
    fn test_invalid_utf8_is_rejected() {
        let err = Value::from_bytes(&[0xC2, 0xFF, 0xFE], Int64Layout::Counted).unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidUtf8));
    }

    #[test]
    fn test_layout_payload_lengths() {
        assert_eq!(Int64Layout::Counted.payload_len(Tag::LongShort, 0), 1);
        assert_eq!(Int64Layout::Counted.payload_len(Tag::LongShort, 3), 4);
        assert_eq!(Int64Layout::Counted.payload_len(Tag::ULongLong, 0), 5);
        assert_eq!(Int64Layout::Counted.payload_len(Tag::ULongLong, 3), 8);
        assert_eq!(Int64Layout::Fixed.payload_len(Tag::LongShort, 3), 1);
        assert_eq!(Int64Layout::Fixed.payload_len(Tag::ULongLong, 0), 6);
    }
}
