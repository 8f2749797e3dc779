use crate::config::JOIN_MESSAGE_TYPE;
use crate::core::value::{Value, ValueKind};
use crate::error::{ProtocolError, Result};
use std::fmt;

/// A named, ordered group of scalar values exchanged as one frame.
///
/// `len()` is the number of values; the type name is not counted.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Message {
    message_type: String,
    values: Vec<Value>,
}

macro_rules! copy_getter {
    ($(#[$doc:meta])* $name:ident, $variant:ident, $ty:ty) => {
        $(#[$doc])*
        pub fn $name(&self, index: usize) -> Result<$ty> {
            match self.value_at(index)? {
                Value::$variant(v) => Ok(*v),
                other => Err(wrong_kind(index, ValueKind::$variant, other)),
            }
        }
    };
}

impl Message {
    pub fn new(message_type: impl Into<String>) -> Self {
        Self {
            message_type: message_type.into(),
            values: Vec::new(),
        }
    }

    /// A `"join"` message carrying only the join key.
    pub fn join(join_key: impl Into<String>) -> Self {
        Self::new(JOIN_MESSAGE_TYPE).with(Value::String(join_key.into()))
    }

    /// Build a message from a type and any iterator of convertible values.
    pub fn from_values<I, V>(message_type: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self {
            message_type: message_type.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// Builder-style append.
    pub fn with(mut self, value: impl Into<Value>) -> Self {
        self.values.push(value.into());
        self
    }

    pub fn push(&mut self, value: impl Into<Value>) {
        self.values.push(value.into());
    }

    pub fn message_type(&self) -> &str {
        &self.message_type
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Value> {
        self.values.iter()
    }

    pub fn get_string(&self, index: usize) -> Result<&str> {
        match self.value_at(index)? {
            Value::String(s) => Ok(s),
            other => Err(wrong_kind(index, ValueKind::String, other)),
        }
    }

    pub fn get_bytes(&self, index: usize) -> Result<&[u8]> {
        match self.value_at(index)? {
            Value::Bytes(b) => Ok(b),
            other => Err(wrong_kind(index, ValueKind::Bytes, other)),
        }
    }

    copy_getter!(get_bool, Bool, bool);
    copy_getter!(
        /// Signed 32-bit value. Small non-negative numbers arrive in this kind.
        get_int, Int, i32
    );
    copy_getter!(get_uint, UInt, u32);
    copy_getter!(get_long, Long, i64);
    copy_getter!(get_ulong, ULong, u64);
    copy_getter!(get_float, Float, f32);
    copy_getter!(get_double, Double, f64);

    fn value_at(&self, index: usize) -> Result<&Value> {
        self.values.get(index).ok_or(ProtocolError::IndexOutOfRange {
            index,
            len: self.values.len(),
        })
    }
}

fn wrong_kind(index: usize, expected: ValueKind, found: &Value) -> ProtocolError {
    ProtocolError::WrongKind {
        index,
        expected,
        found: found.kind(),
    }
}

impl<'a> IntoIterator for &'a Message {
    type Item = &'a Value;
    type IntoIter = std::slice::Iter<'a, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.iter()
    }
}

impl IntoIterator for Message {
    type Item = Value;
    type IntoIter = std::vec::IntoIter<Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.into_iter()
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} values)", self.message_type, self.values.len())?;
        for (i, value) in self.values.iter().enumerate() {
            write!(f, "\n  [{i}] {value} ({})", value.kind())?;
        }
        Ok(())
    }
}
