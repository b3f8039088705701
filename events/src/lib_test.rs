use super::*;

#[test]
fn decode_event_reads_type_and_flat_payload() {
    let event = decode_event(r#"{"type":"progress","message":"connecting","conversation_id":"c-1"}"#)
        .expect("decode should succeed");
    assert_eq!(event.kind, "progress");
    assert_eq!(event.str_field("message"), Some("connecting"));
    assert_eq!(event.conversation_id(), Some("c-1"));
    assert!(!event.payload.contains_key("type"));
}

#[test]
fn decode_event_flattens_nested_data_object() {
    let event = decode_event(r#"{"type":"result","conversation_id":"c-2","data":{"content":"ok","conversation_id":"nested"}}"#)
        .expect("decode should succeed");
    assert_eq!(event.str_field("content"), Some("ok"));
    assert_eq!(event.conversation_id(), Some("c-2"));
    assert!(!event.payload.contains_key("data"));
}

#[test]
fn decode_event_keeps_non_object_data_field() {
    let event = decode_event(r#"{"type":"thinking","data":"raw"}"#).expect("decode should succeed");
    assert_eq!(event.str_field("data"), Some("raw"));
}

#[test]
fn decode_event_rejects_missing_type() {
    let err = decode_event(r#"{"message":"hi"}"#).expect_err("type is required");
    assert!(matches!(err, DecodeError::MissingType));
}

#[test]
fn decode_event_rejects_non_object() {
    let err = decode_event("[1,2]").expect_err("arrays are not events");
    assert!(matches!(err, DecodeError::NotObject));
}

#[test]
fn decode_event_rejects_malformed_json() {
    let err = decode_event("{not json").expect_err("malformed json");
    assert!(matches!(err, DecodeError::Json(_)));
}

#[test]
fn empty_conversation_id_is_treated_as_absent() {
    let event = WireEvent::new("progress", serde_json::json!({ "conversation_id": "" }));
    assert_eq!(event.conversation_id(), None);
}

#[test]
fn encode_event_writes_type_field() {
    let event = WireEvent::new("status", serde_json::json!({ "status": "running" }));
    let decoded = decode_event(&encode_event(&event)).expect("decode");
    assert_eq!(decoded, event);
}

#[test]
fn parse_line_accepts_sse_and_ndjson() {
    let sse = parse_line(r#"data: {"type":"status","status":"running"}"#)
        .expect("line should yield an event")
        .expect("decode");
    assert_eq!(sse.kind, "status");

    let ndjson = parse_line(r#"{"type":"done"}"#)
        .expect("line should yield an event")
        .expect("decode");
    assert_eq!(ndjson.kind, "done");
}

#[test]
fn parse_line_skips_blank_comments_and_sse_fields() {
    assert!(parse_line("").is_none());
    assert!(parse_line("   ").is_none());
    assert!(parse_line(": keepalive").is_none());
    assert!(parse_line("event: message").is_none());
    assert!(parse_line("id: 7").is_none());
    assert!(parse_line("retry: 5000").is_none());
    assert!(parse_line("data:").is_none());
}

#[test]
fn parse_line_maps_done_sentinel() {
    let event = parse_line("data: [DONE]").expect("sentinel").expect("decode");
    assert_eq!(event, WireEvent::done());
}

#[test]
fn line_decoder_reassembles_split_chunks() {
    let mut decoder = LineDecoder::new();
    assert!(decoder.push(br#"{"type":"prog"#).is_empty());
    let lines = decoder.push(b"ress\"}\r\n{\"type\":\"done\"}\n");
    assert_eq!(lines, vec![r#"{"type":"progress"}"#.to_owned(), r#"{"type":"done"}"#.to_owned()]);
    assert!(decoder.finish().is_none());
}

#[test]
fn line_decoder_keeps_multibyte_characters_split_across_chunks() {
    let text = "{\"type\":\"progress\",\"message\":\"查询\"}\n";
    let bytes = text.as_bytes();
    let split = bytes.iter().position(|b| *b >= 0x80).expect("multibyte") + 1;

    let mut decoder = LineDecoder::new();
    assert!(decoder.push(&bytes[..split]).is_empty());
    let lines = decoder.push(&bytes[split..]);
    assert_eq!(lines, vec![text.trim_end().to_owned()]);
}

#[test]
fn line_decoder_finish_flushes_unterminated_line() {
    let mut decoder = LineDecoder::new();
    assert!(decoder.push(br#"{"type":"done"}"#).is_empty());
    assert_eq!(decoder.finish().as_deref(), Some(r#"{"type":"done"}"#));
    assert!(decoder.finish().is_none());
}

#[test]
fn truncate_chars_counts_characters_not_bytes() {
    assert_eq!(truncate_chars("数据库连接检查中", 3), "数据库");
    assert_eq!(truncate_chars("short", 10), "short");
}
