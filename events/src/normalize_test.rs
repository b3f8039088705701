use super::*;
use serde_json::json;

fn wire(kind: &str, payload: Value) -> WireEvent {
    WireEvent::new(kind, payload)
}

#[test]
fn progress_plan_maps_labels() {
    let event = normalize(&wire("progress_plan", json!({ "labels": ["connect", "query", "chart"] })), false);
    assert_eq!(
        event,
        Some(QueryEvent::ProgressPlan { labels: vec!["connect".into(), "query".into(), "chart".into()] })
    );
}

#[test]
fn progress_uses_message_then_stage() {
    let event = normalize(&wire("progress", json!({ "message": "running SQL", "stage": "query" })), false);
    assert_eq!(event, Some(QueryEvent::ProgressTip { text: "running SQL".into(), stage: Some("query".into()) }));

    let event = normalize(&wire("progress", json!({ "stage": "chart" })), false);
    assert_eq!(event, Some(QueryEvent::ProgressTip { text: "chart".into(), stage: Some("chart".into()) }));

    assert_eq!(normalize(&wire("progress", json!({})), false), None);
}

#[test]
fn thinking_maps_to_delta() {
    let event = normalize(&wire("thinking", json!({ "content": "planning" })), false);
    assert_eq!(event, Some(QueryEvent::ThinkingDelta { text: "planning".into() }));
}

#[test]
fn result_defaults_to_no_steps() {
    let event = normalize(&wire("result", json!({ "content": "42 rows" })), false);
    assert_eq!(event, Some(QueryEvent::Result { content: json!("42 rows"), steps: Vec::new() }));
}

#[test]
fn result_reads_steps_with_aliases() {
    let event = normalize(
        &wire(
            "result",
            json!({ "content": "ok", "steps": [{ "index": 1, "summary": "load" }, { "description": "plot" }] }),
        ),
        false,
    );
    let Some(QueryEvent::Result { steps, .. }) = event else {
        panic!("expected result");
    };
    assert_eq!(steps.len(), 2);
    assert_eq!(steps[0].label(0), "[1] load");
    assert_eq!(steps[1].label(1), "[2] plot");
}

#[test]
fn result_accepts_free_text_steps() {
    let event = normalize(&wire("result", json!({ "content": "chart ready", "steps": ["loaded rows", "drew chart"] })), false);
    let Some(QueryEvent::Result { content, steps }) = event else {
        panic!("expected result");
    };
    assert_eq!(content, json!("chart ready"));
    assert_eq!(steps.iter().enumerate().map(|(i, step)| step.label(i)).collect::<Vec<_>>(), ["[1] loaded rows", "[2] drew chart"]);
}

#[test]
fn result_keeps_content_when_steps_are_malformed() {
    let event = normalize(&wire("result", json!({ "content": "42", "steps": "not a list" })), false);
    assert_eq!(event, Some(QueryEvent::Result { content: json!("42"), steps: Vec::new() }));

    let event = normalize(&wire("result", json!({ "content": "42", "steps": [7, null, { "index": "3", "summary": "sum" }] })), false);
    let Some(QueryEvent::Result { steps, .. }) = event else {
        panic!("expected result");
    };
    assert_eq!(steps, vec![ExecutionStep { index: Some(3), summary: Some("sum".into()) }]);
}

#[test]
fn step_label_truncates_summary_and_handles_missing_text() {
    let long = "x".repeat(120);
    let step = ExecutionStep { index: Some(3), summary: Some(long) };
    assert_eq!(step.label(0).chars().count(), "[3] ".len() + 80);

    let bare = ExecutionStep { index: None, summary: Some("   ".into()) };
    assert_eq!(bare.label(4), "[5]");
}

#[test]
fn interrupted_stringifies_partial_result() {
    let event = normalize(&wire("interrupted", json!({ "partial_result": "half", "model": "m1" })), false);
    assert_eq!(event, Some(QueryEvent::Interrupted { partial: Some("half".into()), model: Some("m1".into()) }));

    let event = normalize(&wire("interrupted", json!({ "partial_result": { "rows": 2 } })), false);
    assert_eq!(event, Some(QueryEvent::Interrupted { partial: Some(r#"{"rows":2}"#.into()), model: None }));

    let event = normalize(&wire("interrupted", json!({})), false);
    assert_eq!(event, Some(QueryEvent::Interrupted { partial: None, model: None }));
}

#[test]
fn error_prefers_error_field_over_message() {
    let event = normalize(&wire("error", json!({ "error": "SQL failed", "message": "other" })), false);
    assert_eq!(event, Some(QueryEvent::Error { message: "SQL failed".into() }));

    let event = normalize(&wire("error", json!({ "message": "timeout talking to db" })), false);
    assert_eq!(event, Some(QueryEvent::Error { message: "timeout talking to db".into() }));
}

#[test]
fn error_object_does_not_hide_backend_message() {
    let event = normalize(
        &wire("error", json!({ "error": { "code": "E42" }, "message": "SQL failed near SELECT" })),
        false,
    );
    assert_eq!(event, Some(QueryEvent::Error { message: "SQL failed near SELECT".into() }));

    let event = normalize(&wire("error", json!({ "error": { "message": "permission denied" } })), false);
    assert_eq!(event, Some(QueryEvent::Error { message: "permission denied".into() }));

    let event = normalize(&wire("error", json!({ "error": { "code": "E42" } })), false);
    assert_eq!(event, Some(QueryEvent::Error { message: r#"{"code":"E42"}"#.into() }));
}

#[test]
fn numeric_progress_stage_is_stringified() {
    let event = normalize(&wire("progress", json!({ "stage": 2 })), false);
    assert_eq!(event, Some(QueryEvent::ProgressTip { text: "2".into(), stage: Some("2".into()) }));
}

#[test]
fn abort_like_error_is_reclassified_as_interrupted() {
    for message in ["AbortError: The user aborted a request.", "request was cancelled", "Query interrupted"] {
        let event = normalize(&wire("error", json!({ "error": message })), false);
        assert_eq!(event, Some(QueryEvent::Interrupted { partial: None, model: None }), "{message}");
    }
}

#[test]
fn any_error_during_stop_is_reclassified_as_interrupted() {
    let event = normalize(&wire("error", json!({ "error": "connection reset" })), true);
    assert_eq!(event, Some(QueryEvent::Interrupted { partial: None, model: None }));
}

#[test]
fn db_unavailable_reads_nested_payload() {
    let event = normalize(
        &wire(
            "db_unavailable",
            json!({
                "error": "cannot reach database",
                "connection": { "name": "warehouse", "host": "db", "port": 5432, "database": "sales", "db_type": "postgres" },
                "db_check": { "checked_at": "2026-10-19T10:00:00Z", "suggestions": ["a", "b"] },
                "ui": { "auto_dismiss_ms": 0 }
            }),
        ),
        false,
    );
    let Some(QueryEvent::DbUnavailable(payload)) = event else {
        panic!("expected db_unavailable");
    };
    assert_eq!(payload.error, "cannot reach database");
    assert_eq!(payload.connection.display(), "warehouse (postgres sales@db:5432)");
    assert_eq!(payload.db_check.suggestions, vec!["a".to_owned(), "b".to_owned()]);
    assert_eq!(payload.ui.auto_dismiss_ms, Some(0));
}

#[test]
fn db_unavailable_falls_back_when_payload_is_malformed() {
    let event = normalize(&wire("db_unavailable", json!({ "error": "down", "ui": "bogus" })), false);
    let Some(QueryEvent::DbUnavailable(payload)) = event else {
        panic!("expected db_unavailable");
    };
    assert_eq!(payload.error, "down");
    assert_eq!(payload.ui.auto_dismiss_ms, None);
}

#[test]
fn connection_display_falls_back_to_placeholder() {
    assert_eq!(ConnectionTarget::default().display(), "unknown connection");
    let named = ConnectionTarget { name: Some("prod".into()), ..ConnectionTarget::default() };
    assert_eq!(named.display(), "prod");
}

#[test]
fn status_and_done_map() {
    assert_eq!(
        normalize(&wire("status", json!({ "status": "executing" })), false),
        Some(QueryEvent::StatusChange { status: "executing".into() })
    );
    assert_eq!(normalize(&WireEvent::done(), false), Some(QueryEvent::Done));
}

#[test]
fn unknown_kinds_are_ignored() {
    assert_eq!(normalize(&wire("token_usage", json!({ "input": 3 })), false), None);
}

#[test]
fn terminal_classification() {
    assert!(QueryEvent::Error { message: String::new() }.is_terminal());
    assert!(QueryEvent::DbUnavailable(DbUnavailablePayload::default()).is_terminal());
    assert!(!QueryEvent::Done.is_terminal());
    assert!(!QueryEvent::ThinkingDelta { text: String::new() }.is_terminal());
}
