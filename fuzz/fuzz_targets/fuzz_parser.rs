#![no_main]

use libfuzzer_sys::fuzz_target;
use session_wire::{Int64Layout, Parser};

fuzz_target!(|data: &[u8]| {
    // First byte picks the layout and a split point; the rest is the stream
    let Some((&control, stream)) = data.split_first() else {
        return;
    };
    let layout = if control & 1 == 0 {
        Int64Layout::Counted
    } else {
        Int64Layout::Fixed
    };
    let split = (control as usize >> 1).min(stream.len());

    let mut parser = Parser::with_layout(layout);
    if parser.parse(&stream[..split]).is_ok() {
        let _ = parser.parse(&stream[split..]);
    }
});
