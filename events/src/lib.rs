//! Wire event model and line codec for the query event channel.
//!
//! This crate owns the representation shared by both transports and the
//! controller. Payloads stay flexible (`serde_json::Map`) on the wire; the
//! [`normalize`] module maps them onto one typed [`QueryEvent`] shape.
//!
//! Both transports deliver UTF-8 text: the chunked transport as NDJSON or
//! SSE-framed lines, the stream transport as one JSON document per message.

pub mod normalize;

pub use normalize::{
    ConnectionTarget, DbCheck, DbUnavailablePayload, ExecutionStep, GuardUiHints, QueryEvent, is_abort_message,
    normalize,
};

use serde_json::{Map, Value};

/// Error returned by [`decode_event`] and [`parse_line`].
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// The text is not valid JSON.
    #[error("invalid event JSON: {0}")]
    Json(#[from] serde_json::Error),
    /// The JSON document is not an object.
    #[error("event is not a JSON object")]
    NotObject,
    /// The object has no string `type` field.
    #[error("event has no `type` field")]
    MissingType,
}

/// Raw wire event: a `type` discriminator plus its payload fields.
#[derive(Clone, Debug, PartialEq)]
pub struct WireEvent {
    /// Event kind, e.g. `"progress"` or `"result"`.
    pub kind: String,
    /// Payload fields, flattened from either the top level or a nested `data` object.
    pub payload: Map<String, Value>,
}

impl WireEvent {
    /// Build an event from a kind and a JSON payload. Non-object payloads are dropped.
    #[must_use]
    pub fn new(kind: impl Into<String>, payload: Value) -> Self {
        let payload = match payload {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self { kind: kind.into(), payload }
    }

    /// The terminal `done` marker.
    #[must_use]
    pub fn done() -> Self {
        Self { kind: "done".to_owned(), payload: Map::new() }
    }

    /// Conversation id carried by this event, if any.
    #[must_use]
    pub fn conversation_id(&self) -> Option<&str> {
        self.str_field("conversation_id")
            .filter(|id| !id.is_empty())
    }

    /// String payload field lookup.
    #[must_use]
    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.payload.get(key).and_then(Value::as_str)
    }
}

/// Decode one JSON document into a [`WireEvent`].
///
/// When the object carries a nested `data` object its fields are merged into
/// the payload; top-level fields win on conflict.
///
/// # Errors
///
/// Returns [`DecodeError`] for malformed JSON, non-object documents, or a
/// missing `type`.
pub fn decode_event(text: &str) -> Result<WireEvent, DecodeError> {
    let value: Value = serde_json::from_str(text)?;
    let Value::Object(mut map) = value else {
        return Err(DecodeError::NotObject);
    };

    let kind = match map.remove("type") {
        Some(Value::String(kind)) if !kind.is_empty() => kind,
        _ => return Err(DecodeError::MissingType),
    };

    if matches!(map.get("data"), Some(Value::Object(_))) {
        if let Some(Value::Object(nested)) = map.remove("data") {
            for (key, value) in nested {
                map.entry(key).or_insert(value);
            }
        }
    }

    Ok(WireEvent { kind, payload: map })
}

/// Encode an event as a single-line JSON document.
#[must_use]
pub fn encode_event(event: &WireEvent) -> String {
    let mut map = event.payload.clone();
    map.insert("type".to_owned(), Value::String(event.kind.clone()));
    Value::Object(map).to_string()
}

/// Parse one line of a chunked body.
///
/// Accepts bare NDJSON and SSE framing. Returns `None` for blank lines, SSE
/// comments, and non-`data` SSE fields. `data: [DONE]` maps to [`WireEvent::done`].
#[must_use]
pub fn parse_line(line: &str) -> Option<Result<WireEvent, DecodeError>> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with(':') {
        return None;
    }

    if let Some(data) = trimmed.strip_prefix("data:") {
        let data = data.trim();
        if data.is_empty() {
            return None;
        }
        if data == "[DONE]" {
            return Some(Ok(WireEvent::done()));
        }
        return Some(decode_event(data));
    }

    if ["event:", "id:", "retry:"]
        .iter()
        .any(|field| trimmed.starts_with(field))
    {
        return None;
    }

    Some(decode_event(trimmed))
}

/// Reassembles newline-delimited lines from arbitrary byte chunks.
///
/// Bytes are buffered until a newline arrives, so multi-byte UTF-8 sequences
/// split across chunks decode intact.
#[derive(Debug, Default)]
pub struct LineDecoder {
    buf: Vec<u8>,
}

impl LineDecoder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and return every line it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(chunk);

        let mut lines = Vec::new();
        while let Some(pos) = self.buf.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buf.drain(..=pos).collect();
            let text = String::from_utf8_lossy(&line[..line.len() - 1]);
            lines.push(text.trim_end_matches('\r').to_owned());
        }
        lines
    }

    /// Flush a trailing unterminated line at end of body.
    pub fn finish(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.buf);
        let text = String::from_utf8_lossy(&rest);
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        Some(text.to_owned())
    }
}

/// Truncate to at most `max` characters.
#[must_use]
pub fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

#[cfg(test)]
#[path = "lib_test.rs"]
mod tests;
