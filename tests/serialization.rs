//! Wire-level encoding of values and messages: golden bytes and boundaries

#![allow(clippy::expect_used, clippy::unwrap_used)]

use session_wire::core::framing;
use session_wire::core::tag::Tag;
use session_wire::{Int64Layout, Message, Parser, Value, ValueKind};

fn encode(value: impl Into<Value>) -> Vec<u8> {
    value.into().to_bytes().expect("value should encode")
}

fn roundtrip(value: Value) -> Value {
    let bytes = value.to_bytes().expect("value should encode");
    assert_eq!(bytes.len(), value.encoded_len(), "encoded_len mismatch for {value:?}");
    Value::from_bytes(&bytes, Int64Layout::Counted).expect("value should decode")
}

#[test]
fn test_int_short_form_boundary() {
    assert_eq!(encode(0i32), vec![0x80]);
    assert_eq!(encode(63i32), vec![0xBF]);
    assert_eq!(encode(64i32), vec![0x04, 0x40]);
    assert_eq!(encode(256i32), vec![0x05, 0x01, 0x00]);
}

#[test]
fn test_negative_int_uses_four_bytes() {
    assert_eq!(encode(-1i32), vec![0x07, 0xFF, 0xFF, 0xFF, 0xFF]);
    assert_eq!(encode(i32::MIN), vec![0x07, 0x80, 0x00, 0x00, 0x00]);
}

#[test]
fn test_int_max() {
    assert_eq!(encode(i32::MAX), vec![0x07, 0x7F, 0xFF, 0xFF, 0xFF]);
}

#[test]
fn test_uint_always_long_form() {
    assert_eq!(encode(0u32), vec![0x08, 0x00]);
    assert_eq!(encode(5u32), vec![0x08, 0x05]);
    assert_eq!(encode(u32::MAX), vec![0x0B, 0xFF, 0xFF, 0xFF, 0xFF]);
}

#[test]
fn test_64_bit_forms() {
    assert_eq!(encode(5i64), vec![0x30, 0x05]);
    assert_eq!(encode(0x0102_0304i64), vec![0x33, 0x01, 0x02, 0x03, 0x04]);
    assert_eq!(
        encode(0x01_0203_0405i64),
        vec![0x34, 0x01, 0x02, 0x03, 0x04, 0x05]
    );
    assert_eq!(
        encode(i64::MAX),
        vec![0x37, 0x7F, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF]
    );
    assert_eq!(encode(7u64), vec![0x38, 0x07]);
    assert_eq!(
        encode(u64::MAX),
        vec![0x3F, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF]
    );
}

#[test]
fn test_floats_and_bools() {
    assert_eq!(encode(1.0f32), vec![0x02, 0x3F, 0x80, 0x00, 0x00]);
    assert_eq!(
        encode(1.0f64),
        vec![0x03, 0x3F, 0xF0, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00]
    );
    assert_eq!(encode(true), vec![0x01]);
    assert_eq!(encode(false), vec![0x00]);
}

#[test]
fn test_string_and_bytes_lengths() {
    assert_eq!(encode(""), vec![0xC0]);
    assert_eq!(encode("hi"), vec![0xC2, b'h', b'i']);
    assert_eq!(encode(Vec::<u8>::new()), vec![0x40]);

    let s63 = "x".repeat(63);
    assert_eq!(encode(s63.as_str())[0], 0xFF);

    let s64 = "x".repeat(64);
    let bytes = encode(s64.as_str());
    assert_eq!(&bytes[..2], &[0x0C, 0x40]);
    assert_eq!(bytes.len(), 66);

    let blob = vec![7u8; 300];
    let bytes = encode(blob.as_slice());
    assert_eq!(&bytes[..3], &[0x11, 0x01, 0x2C]);
    assert_eq!(bytes.len(), 303);
}

#[test]
fn test_boundary_values_roundtrip_with_kind() {
    let values = vec![
        Value::Int(0),
        Value::Int(63),
        Value::Int(64),
        Value::Int(i32::MAX),
        Value::Int(-1),
        Value::Int(i32::MIN),
        Value::UInt(0),
        Value::UInt(u32::MAX),
        Value::Long(0),
        Value::Long(-1),
        Value::Long(i64::MIN),
        Value::Long(i64::MAX),
        Value::Long(1 << 32),
        Value::ULong(0),
        Value::ULong(u64::MAX),
        Value::ULong(1 << 40),
        Value::Float(-0.5),
        Value::Double(std::f64::consts::PI),
        Value::Bool(true),
        Value::Bool(false),
        Value::String(String::new()),
        Value::String("ünïcødé".into()),
        Value::Bytes(Vec::new()),
        Value::Bytes(vec![0; 64]),
    ];
    for value in values {
        let decoded = roundtrip(value.clone());
        assert_eq!(decoded.kind(), value.kind());
        assert_eq!(decoded, value);
    }
}

#[test]
fn test_fixed_layout_reads_legacy_widths() {
    // Short 64-bit tags carry one byte, long ones six, whatever the remainder says
    let short = Value::from_bytes(&[0x33, 0x2A], Int64Layout::Fixed).unwrap();
    assert_eq!(short, Value::Long(0x2A));

    let long = Value::from_bytes(&[0x3C, 1, 2, 3, 4, 5, 6], Int64Layout::Fixed).unwrap();
    assert_eq!(long, Value::ULong(0x0102_0304_0506));

    // The same long tag under the counted layout wants only five bytes
    assert!(Value::from_bytes(&[0x3C, 1, 2, 3, 4, 5, 6], Int64Layout::Counted).is_err());
}

#[test]
fn test_message_frame_layout() {
    let msg = Message::new("move").with(3i32).with("n").with(true);
    let bytes = framing::to_bytes(&msg).unwrap();
    assert_eq!(
        bytes,
        vec![0x83, 0xC4, b'm', b'o', b'v', b'e', 0x83, 0xC1, b'n', 0x01]
    );
    assert_eq!(bytes.len(), framing::encoded_len(&msg));
}

#[test]
fn test_message_with_no_values() {
    let msg = Message::new("ping");
    let bytes = framing::to_bytes(&msg).unwrap();
    assert_eq!(bytes, vec![0x80, 0xC4, b'p', b'i', b'n', b'g']);
    assert_eq!(Parser::new().parse(&bytes).unwrap(), vec![msg]);
}

#[test]
fn test_all_tags_classify_by_pattern() {
    for (byte, tag) in [
        (0xC5, Tag::StringShort),
        (0x9F, Tag::UIntShort),
        (0x41, Tag::BytesShort),
        (0x3D, Tag::ULongLong),
        (0x39, Tag::ULongShort),
        (0x35, Tag::LongLong),
        (0x31, Tag::LongShort),
        (0x12, Tag::BytesLong),
        (0x0E, Tag::StringLong),
        (0x09, Tag::UIntLong),
        (0x05, Tag::IntLong),
        (0x03, Tag::Double),
        (0x02, Tag::Float),
        (0x01, Tag::BoolTrue),
        (0x00, Tag::BoolFalse),
    ] {
        assert_eq!(Tag::classify(byte), tag, "byte 0x{byte:02X}");
    }
}

#[test]
fn test_value_kind_reported_in_accessor_errors() {
    let msg = Message::new("t").with(1u32);
    let err = msg.get_int(0).unwrap_err();
    assert!(err.to_string().contains(&ValueKind::UInt.to_string()));
}
