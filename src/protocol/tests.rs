// test-only module included via protocol/mod.rs
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use crate::core::parser::Parser;
use crate::error::ProtocolError;
use crate::protocol::dispatcher::Dispatcher;
use crate::protocol::handshake::*;
use crate::protocol::message::Message;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::io::AsyncReadExt;

#[test]
fn test_join_message_layout() {
    let join = JoinRequest::new("ABC123");
    let msg = join.to_message();
    assert_eq!(msg.message_type(), "join");
    assert_eq!(msg.len(), 1);
    assert_eq!(msg.get_string(0).unwrap(), "ABC123");
}

#[test]
fn test_join_data_is_flattened_in_order() {
    let join = JoinRequest::new("key")
        .with_data("name", "alice")
        .with_entries([("team", "red"), ("slot", "2")]);
    let msg = join.to_message();
    let values: Vec<&str> = (0..msg.len()).map(|i| msg.get_string(i).unwrap()).collect();
    assert_eq!(values, ["key", "name", "alice", "team", "red", "slot", "2"]);
}

#[test]
fn test_handshake_bytes_start_with_preamble() {
    let bytes = JoinRequest::new("ABC123").to_handshake_bytes().unwrap();
    assert_eq!(
        &bytes[..],
        &[0x00, 0x81, 0xC4, b'j', b'o', b'i', b'n', 0xC6, b'A', b'B', b'C', b'1', b'2', b'3']
    );
}

#[tokio::test]
async fn test_client_join_writes_single_buffer() {
    let (mut client, mut server) = tokio::io::duplex(1024);
    let join = JoinRequest::new("room-key").with_data("k", "v");

    let frame_len = client_join(&mut client, &join).await.expect("join");
    drop(client);

    let mut received = Vec::new();
    server.read_to_end(&mut received).await.unwrap();
    assert_eq!(received[0], 0x00);
    assert_eq!(received.len(), frame_len + 1);

    let mut parser = Parser::new();
    let messages = parser.parse(&received[1..]).unwrap();
    assert_eq!(messages, vec![join.to_message()]);
}

#[test]
fn test_dispatcher_routes_by_type() {
    let dispatcher = Dispatcher::new();
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();
    dispatcher
        .register("move", move |msg| {
            assert_eq!(msg.get_int(0)?, 4);
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .unwrap();

    dispatcher.dispatch(&Message::new("move").with(4i32)).unwrap();
    assert_eq!(hits.load(Ordering::SeqCst), 1);

    let err = dispatcher.dispatch(&Message::new("chat")).unwrap_err();
    assert!(matches!(err, ProtocolError::UnexpectedMessage(t) if t == "chat"));
}

#[test]
fn test_dispatcher_fallback_catches_unregistered() {
    let dispatcher = Dispatcher::new();
    let seen = Arc::new(AtomicUsize::new(0));
    let counter = seen.clone();
    dispatcher
        .set_fallback(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .unwrap();

    dispatcher.dispatch(&Message::new("anything")).unwrap();
    assert_eq!(seen.load(Ordering::SeqCst), 1);
}

#[test]
fn test_handler_errors_propagate() {
    let dispatcher = Dispatcher::new();
    dispatcher
        .register("bad", |msg| msg.get_string(0).map(|_| ()))
        .unwrap();
    assert!(matches!(
        dispatcher.dispatch(&Message::new("bad")),
        Err(ProtocolError::IndexOutOfRange { .. })
    ));
}
