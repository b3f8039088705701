//! Request and response DTOs for the backend HTTP surface.
//!
//! DESIGN
//! ======
//! List endpoints have answered both with a bare array and with an object
//! wrapping the array; `parse_list` accepts either so history keeps working
//! across backend versions.

#[cfg(test)]
#[path = "types_test.rs"]
mod types_test;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// How the backend should shape its answer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    #[default]
    Chat,
    Dashboard,
}

/// Per-send flags. Both are set when resubmitting after a guard warning.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SendOptions {
    /// Skip the backend's pre-flight database check.
    pub force_execute: bool,
    /// Do not append a new user turn (the original one is already shown).
    pub skip_user_message: bool,
}

impl SendOptions {
    /// Flags used by "continue anyway".
    #[must_use]
    pub fn forced() -> Self {
        Self { force_execute: true, skip_user_message: true }
    }
}

/// Body of `POST /api/query` and first message of the stream transport.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryRequest {
    pub query: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    #[serde(default)]
    pub view_mode: ViewMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_window: Option<u32>,
    #[serde(default)]
    pub force_execute: bool,
    #[serde(default)]
    pub skip_user_message: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StopRequest {
    pub conversation_id: String,
}

/// Response of `POST /api/query/stop`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StopResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// One row of the conversation history list.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub message_count: Option<u32>,
}

/// Stored message of a past conversation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HistoryMessage {
    /// `"user"` or `"assistant"`; anything else is rendered as assistant output.
    pub role: String,
    #[serde(default)]
    pub content: Value,
}

/// Parse a list response that is either `[...]` or `{ "<key>": [...] }`.
///
/// # Errors
///
/// Returns a serde error when neither shape matches.
pub fn parse_list<T: DeserializeOwned>(value: Value, key: &str) -> Result<Vec<T>, serde_json::Error> {
    match value {
        Value::Object(mut map) => {
            let inner = map.remove(key).unwrap_or(Value::Array(Vec::new()));
            serde_json::from_value(inner)
        }
        other => serde_json::from_value(other),
    }
}
