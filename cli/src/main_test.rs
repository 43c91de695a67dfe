use super::*;

fn message(id: i64, thread_id: RoomId) -> Message {
    Message { id, thread_id, text: "hey".into(), ..Message::default() }
}

#[test]
fn api_url_joins_origin_and_path() {
    assert_eq!(
        api_url("http://127.0.0.1:4000/", "/healthcheck").expect("url"),
        "http://127.0.0.1:4000/api/v1/healthcheck"
    );
    assert_eq!(
        api_url("https://chat.example.com", "/rooms/3/events").expect("url"),
        "https://chat.example.com/api/v1/rooms/3/events"
    );
}

#[test]
fn api_url_rejects_non_http_origin() {
    assert!(matches!(api_url("ftp://host", "/healthcheck"), Err(CliError::InvalidOrigin(_))));
}

#[test]
fn parse_event_accepts_matching_room() {
    let raw = r#"{"type":"new-message","data":{"id":1,"thread_id":42,"text":"hi"}}"#;
    let event = parse_event(42, raw).expect("event");
    assert_eq!(event.room_id(), 42);
    assert_eq!(event.kind(), frames::EVENT_NEW_MESSAGE);
}

#[test]
fn parse_event_rejects_other_room() {
    let raw = r#"{"type":"delete-thread","room_id":7}"#;
    assert!(matches!(
        parse_event(42, raw),
        Err(CliError::RoomMismatch { room_id: 42, event_room: 7 })
    ));
}

#[test]
fn parse_event_rejects_malformed_json() {
    assert!(matches!(parse_event(1, "{nope"), Err(CliError::InvalidJson(_))));
}

#[test]
fn printer_rebuilds_events_from_callbacks() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut printer = EventPrinter { room_id: 42, tx };

    printer.on_new_message(message(1, 42));
    printer.on_delete_message(message(2, 42));
    printer.on_delete_thread();
    printer.on_disconnect();

    assert_eq!(rx.try_recv().ok(), Some(WatchLine::Event(InboundEvent::new_message(message(1, 42)))));
    assert_eq!(rx.try_recv().ok(), Some(WatchLine::Event(InboundEvent::delete_message(message(2, 42)))));
    assert_eq!(rx.try_recv().ok(), Some(WatchLine::Event(InboundEvent::delete_thread(42))));
    assert_eq!(rx.try_recv().ok(), Some(WatchLine::Disconnected));
}

#[test]
fn cli_parses_watch_with_reconnect() {
    let cli = Cli::try_parse_from(["globechat", "--origin", "http://relay:4000", "watch", "42", "--reconnect"])
        .expect("parse");
    assert_eq!(cli.origin, "http://relay:4000");
    assert!(matches!(cli.command, Command::Watch { room_id: 42, reconnect: true }));
}

#[test]
fn cli_requires_event_for_publish() {
    assert!(Cli::try_parse_from(["globechat", "publish", "42", "--token", "t"]).is_err());
}

#[test]
fn cli_parses_publish_token() {
    let cli = Cli::try_parse_from([
        "globechat",
        "publish",
        "42",
        "--event",
        r#"{"type":"delete-thread","room_id":42}"#,
        "--token",
        "s3cret",
    ])
    .expect("parse");
    let Command::Publish { room_id, token, .. } = cli.command else {
        panic!("expected publish");
    };
    assert_eq!(room_id, 42);
    assert_eq!(token, "s3cret");
}
