#![no_main]

use libfuzzer_sys::fuzz_target;
use session_wire::core::framing;
use session_wire::{JoinRequest, Parser};

fuzz_target!(|data: &[u8]| {
    // Arbitrary text becomes a join key and data; the frame must parse back exactly
    let text = String::from_utf8_lossy(data);
    let mut parts = text.split('\u{0}');
    let key = parts.next().unwrap_or_default();
    let mut join = JoinRequest::new(key);
    while let (Some(k), Some(v)) = (parts.next(), parts.next()) {
        join = join.with_data(k, v);
    }

    let message = join.to_message();
    let bytes = framing::to_bytes(&message).expect("join frames always encode");
    let parsed = Parser::new().parse(&bytes).expect("own frames always parse");
    assert_eq!(parsed, vec![message]);
});
