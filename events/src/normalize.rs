//! Event normalizer: heterogeneous wire events -> one typed [`QueryEvent`].
//!
//! DESIGN
//! ======
//! One variant per event kind, matched exhaustively by the controller. Kinds
//! this client does not know yet are ignored (`None`) so newer backends can
//! add events without breaking older clients.
//!
//! `error` events need a second look: the transport cannot always tell a user
//! cancel from a real failure, so abort-like messages, and any error that
//! arrives while a stop is in progress, are reported as `Interrupted`.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{WireEvent, truncate_chars};

const STEP_SUMMARY_MAX_CHARS: usize = 80;

const ABORT_PHRASES: &[&str] = &["abort", "cancel", "interrupt", "stopped by user", "user stopped"];

// =============================================================================
// NORMALIZED EVENTS
// =============================================================================

/// Internal event shape consumed by the query controller.
#[derive(Clone, Debug, PartialEq)]
pub enum QueryEvent {
    /// Pre-declared stage labels for the thinking list.
    ProgressPlan { labels: Vec<String> },
    /// Progress message; advances one stage.
    ProgressTip { text: String, stage: Option<String> },
    /// Legacy thinking text; advances one stage.
    ThinkingDelta { text: String },
    /// Final answer plus the execution steps the backend ran.
    Result { content: Value, steps: Vec<ExecutionStep> },
    /// The backend (or the user) interrupted the query.
    Interrupted { partial: Option<String>, model: Option<String> },
    /// Backend logical error.
    Error { message: String },
    /// Pre-flight database check failed.
    DbUnavailable(DbUnavailablePayload),
    /// Status badge update.
    StatusChange { status: String },
    /// End of the event stream.
    Done,
}

impl QueryEvent {
    /// Whether this event ends the query lifecycle.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Result { .. } | Self::Interrupted { .. } | Self::Error { .. } | Self::DbUnavailable(_))
    }
}

/// One backend-reported execution step, revealed during step playback.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionStep {
    /// One-based position reported by the backend.
    #[serde(default)]
    pub index: Option<u32>,
    /// Short free-text description of what the step did.
    #[serde(default, alias = "description", alias = "title")]
    pub summary: Option<String>,
}

impl ExecutionStep {
    /// Stage label `"[index] summary"`; `position` is the zero-based fallback index.
    #[must_use]
    pub fn label(&self, position: usize) -> String {
        let index = self
            .index
            .map_or(position + 1, |index| index as usize);
        let summary = self
            .summary
            .as_deref()
            .map(str::trim)
            .unwrap_or_default();
        if summary.is_empty() {
            format!("[{index}]")
        } else {
            format!("[{index}] {}", truncate_chars(summary, STEP_SUMMARY_MAX_CHARS))
        }
    }
}

// =============================================================================
// DB GUARD PAYLOAD
// =============================================================================

/// Payload of a `db_unavailable` event.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DbUnavailablePayload {
    /// Why the check failed, as reported by the backend.
    #[serde(default)]
    pub error: String,
    /// Connection the query would have run against.
    #[serde(default)]
    pub connection: ConnectionTarget,
    #[serde(default)]
    pub db_check: DbCheck,
    /// Opaque routing details; kept for diagnostics, never interpreted.
    #[serde(default)]
    pub routing_info: Option<Value>,
    #[serde(default)]
    pub ui: GuardUiHints,
}

/// Connection the guard checked.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ConnectionTarget {
    /// Backend identifier of the saved connection.
    #[serde(default)]
    pub id: Option<String>,
    /// Display name chosen by the user.
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    /// Database or schema name.
    #[serde(default)]
    pub database: Option<String>,
    /// Engine, e.g. `postgres`.
    #[serde(default)]
    pub db_type: Option<String>,
}

impl ConnectionTarget {
    /// Human-readable target, e.g. `warehouse (postgres sales@db:5432)`.
    #[must_use]
    pub fn display(&self) -> String {
        let mut endpoint = String::new();
        if let Some(db_type) = &self.db_type {
            endpoint.push_str(db_type);
            endpoint.push(' ');
        }
        if let Some(database) = &self.database {
            endpoint.push_str(database);
        }
        if let Some(host) = &self.host {
            endpoint.push('@');
            endpoint.push_str(host);
            if let Some(port) = self.port {
                endpoint.push(':');
                endpoint.push_str(&port.to_string());
            }
        }
        let endpoint = endpoint.trim().to_owned();

        match (&self.name, endpoint.is_empty()) {
            (Some(name), false) => format!("{name} ({endpoint})"),
            (Some(name), true) => name.clone(),
            (None, false) => endpoint,
            (None, true) => "unknown connection".to_owned(),
        }
    }
}

/// Result of the backend pre-flight check.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DbCheck {
    /// RFC 3339 timestamp of the check.
    #[serde(default)]
    pub checked_at: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    /// Driver-level error, when the check reached the driver.
    #[serde(default)]
    pub error: Option<String>,
    /// Round-trip time of the check, when it got that far.
    #[serde(default)]
    pub latency_ms: Option<u64>,
    /// Remediation hints shown on the warning card.
    #[serde(default, alias = "next_steps")]
    pub suggestions: Vec<String>,
}

/// UI hints attached by the backend.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GuardUiHints {
    /// Auto-dismiss delay; `0` keeps the warning until the user acts.
    #[serde(default)]
    pub auto_dismiss_ms: Option<u64>,
}

// =============================================================================
// LENIENT FIELD ACCESS
// =============================================================================

/// Non-blank text of a field; non-string values are stringified.
fn text_field(payload: &Map<String, Value>, key: &str) -> Option<String> {
    payload.get(key).and_then(value_to_text)
}

/// Non-blank string value only.
fn plain_str(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .filter(|text| !text.trim().is_empty())
        .map(str::to_owned)
}

fn text_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items.iter().filter_map(value_to_text).collect(),
        _ => Vec::new(),
    }
}

/// Structured field decoded on its own; a bad shape falls back to the default.
fn typed_field<T: DeserializeOwned + Default>(payload: &Map<String, Value>, key: &str) -> T {
    payload
        .get(key)
        .and_then(|value| serde_json::from_value(value.clone()).ok())
        .unwrap_or_default()
}

fn step_index(value: Option<&Value>) -> Option<u32> {
    match value? {
        Value::Number(number) => number
            .as_u64()
            .and_then(|index| u32::try_from(index).ok()),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

/// Steps arrive as objects or as free-text summaries; anything else is skipped.
fn parse_steps(value: Option<&Value>) -> Vec<ExecutionStep> {
    let Some(Value::Array(items)) = value else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| match item {
            Value::String(summary) => Some(ExecutionStep { index: None, summary: Some(summary.clone()) }),
            Value::Object(step) => Some(ExecutionStep {
                index: step_index(step.get("index")),
                summary: ["summary", "description", "title"]
                    .iter()
                    .find_map(|key| text_field(step, key)),
            }),
            _ => None,
        })
        .collect()
}

/// Prefer a plain `error` string, then `error.message`, then `message`, then
/// whatever `error` stringifies to.
fn error_message(payload: &Map<String, Value>) -> Option<String> {
    let error = payload.get("error");
    plain_str(error)
        .or_else(|| plain_str(error.and_then(|error| error.get("message"))))
        .or_else(|| plain_str(payload.get("message")))
        .or_else(|| error.and_then(value_to_text))
        .or_else(|| text_field(payload, "message"))
}

// =============================================================================
// NORMALIZE
// =============================================================================

/// Whether an error message reads like a cancellation rather than a failure.
#[must_use]
pub fn is_abort_message(message: &str) -> bool {
    let lower = message.to_lowercase();
    ABORT_PHRASES.iter().any(|phrase| lower.contains(phrase))
}

/// Map a wire event onto a [`QueryEvent`].
///
/// Fields are read one at a time, so a badly shaped field degrades to its
/// default instead of dropping the event. Returns `None` for unknown kinds and
/// for progress, thinking or status events with no usable text.
/// `stop_in_progress` reclassifies any `error` as `Interrupted`.
#[must_use]
pub fn normalize(event: &WireEvent, stop_in_progress: bool) -> Option<QueryEvent> {
    match event.kind.as_str() {
        "progress_plan" => {
            let labels = match event.payload.get("labels") {
                Some(labels) => text_list(Some(labels)),
                None => text_list(event.payload.get("stages")),
            };
            Some(QueryEvent::ProgressPlan { labels })
        }
        "progress" => {
            let stage = text_field(&event.payload, "stage");
            let text = text_field(&event.payload, "message").or_else(|| stage.clone())?;
            Some(QueryEvent::ProgressTip { text, stage })
        }
        "thinking" => {
            let text = text_field(&event.payload, "content")?;
            Some(QueryEvent::ThinkingDelta { text })
        }
        "result" => Some(QueryEvent::Result {
            content: event
                .payload
                .get("content")
                .cloned()
                .unwrap_or(Value::Null),
            steps: parse_steps(event.payload.get("steps")),
        }),
        "interrupted" => Some(QueryEvent::Interrupted {
            partial: event
                .payload
                .get("partial_result")
                .and_then(value_to_text),
            model: text_field(&event.payload, "model"),
        }),
        "error" => {
            let message = error_message(&event.payload).unwrap_or_else(|| "unknown error".to_owned());
            if stop_in_progress || is_abort_message(&message) {
                return Some(QueryEvent::Interrupted { partial: None, model: None });
            }
            Some(QueryEvent::Error { message })
        }
        "db_unavailable" => Some(QueryEvent::DbUnavailable(DbUnavailablePayload {
            error: error_message(&event.payload).unwrap_or_else(|| "database unavailable".to_owned()),
            connection: typed_field(&event.payload, "connection"),
            db_check: typed_field(&event.payload, "db_check"),
            routing_info: event.payload.get("routing_info").cloned(),
            ui: typed_field(&event.payload, "ui"),
        })),
        "status" => Some(QueryEvent::StatusChange { status: text_field(&event.payload, "status")? }),
        "done" => Some(QueryEvent::Done),
        _ => None,
    }
}

fn value_to_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(text) if text.trim().is_empty() => None,
        Value::String(text) => Some(text.clone()),
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
#[path = "normalize_test.rs"]
mod tests;
