use bytes::BytesMut;
use criterion::{criterion_group, criterion_main, BatchSize, Criterion, Throughput};
use session_wire::core::codec::MessageCodec;
use session_wire::core::framing;
use session_wire::{Message, Value};
use tokio_util::codec::Encoder;

fn sample_messages() -> Vec<(&'static str, Message)> {
    vec![
        ("empty", Message::new("ping")),
        (
            "small_ints",
            Message::from_values("move", [3i32, 4, 63, 64, -1]),
        ),
        (
            "mixed",
            Message::new("state")
                .with("player-one")
                .with(42u32)
                .with(-7_000_000_000i64)
                .with(u64::MAX)
                .with(1.5f32)
                .with(2.25f64)
                .with(true),
        ),
        ("string_4k", Message::new("chat").with("x".repeat(4096))),
        ("bytes_64k", Message::new("blob").with(vec![0xABu8; 64 * 1024])),
    ]
}

#[allow(clippy::unwrap_used)]
fn bench_message_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("message_encode");

    for (name, msg) in sample_messages() {
        group.throughput(Throughput::Bytes(framing::encoded_len(&msg) as u64));
        group.bench_function(name, |b| {
            b.iter_batched(
                || BytesMut::with_capacity(framing::encoded_len(&msg)),
                |mut buf| {
                    let mut codec = MessageCodec::default();
                    codec.encode(&msg, &mut buf).unwrap();
                    buf
                },
                BatchSize::SmallInput,
            )
        });
    }

    group.finish();
}

#[allow(clippy::unwrap_used)]
fn bench_value_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("value_encode");
    let values = [
        ("int_short", Value::Int(17)),
        ("int_negative", Value::Int(-17)),
        ("ulong_max", Value::ULong(u64::MAX)),
        ("double", Value::Double(std::f64::consts::E)),
        ("string_64", Value::String("s".repeat(64))),
    ];

    for (name, value) in values {
        group.bench_function(name, |b| b.iter(|| value.to_bytes().unwrap()));
    }

    group.finish();
}

criterion_group!(benches, bench_message_encode, bench_value_encode);
criterion_main!(benches);
