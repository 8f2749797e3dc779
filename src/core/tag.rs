//! Tag byte classification.
//!
//! Every encoded value starts with a tag byte. A tag is recognised by testing
//! `byte & pattern == pattern` against the patterns from numerically largest to
//! smallest; the first hit wins. The bits outside the pattern (the remainder)
//! carry either an inline magnitude (short forms) or a byte count (long forms).
//!
//! ```text
//! 0xC0 STRING_SHORT   len 0..=63 inline      0x0C STRING_LONG  1..=4 length bytes
//! 0x80 UINT_SHORT     value 0..=63 inline    0x08 UINT_LONG    1..=4 value bytes
//! 0x40 BYTES_SHORT    len 0..=63 inline      0x10 BYTES_LONG   1..=4 length bytes
//! 0x3C ULONG_LONG     0x38 ULONG_SHORT       0x34 LONG_LONG    0x30 LONG_SHORT
//! 0x04 INT_LONG       0x03 DOUBLE            0x02 FLOAT        0x01 TRUE   0x00 FALSE
//! ```

use crate::error::{ProtocolError, Result};
use std::fmt;

/// Largest magnitude a short inline form can carry.
pub const SHORT_FORM_MAX: u8 = 0x3F;

/// Largest remainder a long form may carry (remainder + 1 = byte count).
const LONG_FORM_MAX: u8 = 0x03;

/// Wire tag kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tag {
    StringShort,
    StringLong,
    BytesShort,
    BytesLong,
    ULongShort,
    ULongLong,
    LongShort,
    LongLong,
    UIntShort,
    UIntLong,
    IntLong,
    Double,
    Float,
    BoolTrue,
    BoolFalse,
}

/// Tags ordered by descending pattern value, the order classification uses.
const BY_PRIORITY: [Tag; 15] = [
    Tag::StringShort,
    Tag::UIntShort,
    Tag::BytesShort,
    Tag::ULongLong,
    Tag::ULongShort,
    Tag::LongLong,
    Tag::LongShort,
    Tag::BytesLong,
    Tag::StringLong,
    Tag::UIntLong,
    Tag::IntLong,
    Tag::Double,
    Tag::Float,
    Tag::BoolTrue,
    Tag::BoolFalse,
];

impl Tag {
    /// The fixed bit pattern identifying this tag.
    pub const fn pattern(self) -> u8 {
        match self {
            Tag::StringShort => 0xC0,
            Tag::StringLong => 0x0C,
            Tag::BytesShort => 0x40,
            Tag::BytesLong => 0x10,
            Tag::ULongShort => 0x38,
            Tag::ULongLong => 0x3C,
            Tag::LongShort => 0x30,
            Tag::LongLong => 0x34,
            Tag::UIntShort => 0x80,
            Tag::UIntLong => 0x08,
            Tag::IntLong => 0x04,
            Tag::Double => 0x03,
            Tag::Float => 0x02,
            Tag::BoolTrue => 0x01,
            Tag::BoolFalse => 0x00,
        }
    }

    /// Classify a byte by pattern priority. Every byte matches something,
    /// since `BoolFalse` has an all-zero pattern; use [`Tag::parse`] to also
    /// reject remainders the form cannot carry.
    pub fn classify(byte: u8) -> Tag {
        BY_PRIORITY
            .iter()
            .copied()
            .find(|tag| byte & tag.pattern() == tag.pattern())
            .unwrap_or(Tag::BoolFalse)
    }

    /// Bits of `byte` outside this tag's pattern.
    #[inline]
    pub const fn remainder(self, byte: u8) -> u8 {
        byte & !self.pattern()
    }

    /// Largest remainder a well-formed tag byte of this kind may carry.
    pub const fn max_remainder(self) -> u8 {
        match self {
            Tag::StringShort | Tag::BytesShort | Tag::UIntShort => SHORT_FORM_MAX,
            Tag::StringLong
            | Tag::BytesLong
            | Tag::UIntLong
            | Tag::IntLong
            | Tag::ULongShort
            | Tag::ULongLong
            | Tag::LongShort
            | Tag::LongLong => LONG_FORM_MAX,
            Tag::Double | Tag::Float | Tag::BoolTrue | Tag::BoolFalse => 0,
        }
    }

    /// Classify a byte and validate its remainder.
    pub fn parse(byte: u8) -> Result<(Tag, u8)> {
        let tag = Tag::classify(byte);
        let rem = tag.remainder(byte);
        if rem > tag.max_remainder() {
            return Err(ProtocolError::InvalidTag(byte));
        }
        Ok((tag, rem))
    }

    /// Build the tag byte for this kind with the given remainder.
    #[inline]
    pub const fn with_remainder(self, rem: u8) -> u8 {
        self.pattern() | rem
    }

    /// Whether the tag byte alone is the complete value.
    pub const fn is_self_contained(self) -> bool {
        matches!(self, Tag::UIntShort | Tag::BoolTrue | Tag::BoolFalse)
    }

    /// Wire name as used in protocol documentation.
    pub const fn name(self) -> &'static str {
        match self {
            Tag::StringShort => "STRING_SHORT",
            Tag::StringLong => "STRING_LONG",
            Tag::BytesShort => "BYTES_SHORT",
            Tag::BytesLong => "BYTES_LONG",
            Tag::ULongShort => "ULONG_SHORT",
            Tag::ULongLong => "ULONG_LONG",
            Tag::LongShort => "LONG_SHORT",
            Tag::LongLong => "LONG_LONG",
            Tag::UIntShort => "UINT_SHORT",
            Tag::UIntLong => "UINT_LONG",
            Tag::IntLong => "INT_LONG",
            Tag::Double => "DOUBLE",
            Tag::Float => "FLOAT",
            Tag::BoolTrue => "BOOL_TRUE",
            Tag::BoolFalse => "BOOL_FALSE",
        }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
