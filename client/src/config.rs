//! Client configuration parsed from environment variables.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::ClientError;
use crate::net::transport::TransportKind;
use crate::net::types::ViewMode;

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000";
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

const DEFAULT_STEP_DELAY_MS: u64 = 500;
const DEFAULT_PLAYBACK_SETTLE_MS: u64 = 200;
const DEFAULT_FINALIZE_SETTLE_MS: u64 = 300;
const DEFAULT_HISTORY_REFRESH_DELAY_MS: u64 = 180;
const DEFAULT_GUARD_FADE_MS: u64 = 300;

/// Per-query settings forwarded to the backend with every request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuerySettings {
    pub model_id: Option<String>,
    pub context_window: Option<u32>,
    pub view_mode: ViewMode,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Backend origin without a trailing slash, e.g. `http://127.0.0.1:8000`.
    pub base_url: String,
    pub transport: TransportKind,
    pub model_id: Option<String>,
    pub context_window: Option<u32>,
    pub view_mode: ViewMode,
    /// Where the active conversation id is persisted. `None` keeps it in memory.
    pub session_file: Option<PathBuf>,
    pub connect_timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_owned(),
            transport: TransportKind::default(),
            model_id: None,
            context_window: None,
            view_mode: ViewMode::default(),
            session_file: None,
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
        }
    }
}

impl ClientConfig {
    /// Build typed client config from environment variables.
    ///
    /// Optional:
    /// - `DATACHAT_BASE_URL`: default `http://127.0.0.1:8000`
    /// - `DATACHAT_TRANSPORT`: `chunked` (default) or `stream`
    /// - `DATACHAT_MODEL_ID`: backend default when absent
    /// - `DATACHAT_CONTEXT_WINDOW`: backend default when absent
    /// - `DATACHAT_VIEW_MODE`: `chat` (default) or `dashboard`
    /// - `DATACHAT_SESSION_FILE`: in-memory session when absent
    /// - `DATACHAT_CONNECT_TIMEOUT_SECS`: default 10
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Config`] for unknown transport or view mode values.
    pub fn from_env() -> Result<Self, ClientError> {
        let base_url = std::env::var("DATACHAT_BASE_URL")
            .unwrap_or_else(|_| DEFAULT_BASE_URL.to_owned())
            .trim_end_matches('/')
            .to_owned();
        let transport = parse_transport(std::env::var("DATACHAT_TRANSPORT").ok().as_deref())?;
        let view_mode = parse_view_mode(std::env::var("DATACHAT_VIEW_MODE").ok().as_deref())?;
        let model_id = std::env::var("DATACHAT_MODEL_ID")
            .ok()
            .filter(|v| !v.trim().is_empty());
        let context_window = std::env::var("DATACHAT_CONTEXT_WINDOW")
            .ok()
            .and_then(|v| v.parse::<u32>().ok());
        let session_file = std::env::var("DATACHAT_SESSION_FILE")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from);
        let connect_timeout_secs = env_parse_u64("DATACHAT_CONNECT_TIMEOUT_SECS", DEFAULT_CONNECT_TIMEOUT_SECS);

        Ok(Self { base_url, transport, model_id, context_window, view_mode, session_file, connect_timeout_secs })
    }

    #[must_use]
    pub fn query_settings(&self) -> QuerySettings {
        QuerySettings {
            model_id: self.model_id.clone(),
            context_window: self.context_window,
            view_mode: self.view_mode,
        }
    }

    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

/// Fixed delays of the query lifecycle. Tests shrink or pause these.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timings {
    /// Pause after each revealed execution step.
    pub step_delay: Duration,
    /// Pause after the last revealed step.
    pub playback_settle: Duration,
    /// Pause between "all stages completed" and the final render swap.
    pub finalize_settle: Duration,
    /// Delay before the history list is refetched.
    pub history_refresh_delay: Duration,
    /// How long an expired guard warning stays visible while fading.
    pub guard_fade: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            step_delay: Duration::from_millis(DEFAULT_STEP_DELAY_MS),
            playback_settle: Duration::from_millis(DEFAULT_PLAYBACK_SETTLE_MS),
            finalize_settle: Duration::from_millis(DEFAULT_FINALIZE_SETTLE_MS),
            history_refresh_delay: Duration::from_millis(DEFAULT_HISTORY_REFRESH_DELAY_MS),
            guard_fade: Duration::from_millis(DEFAULT_GUARD_FADE_MS),
        }
    }
}

fn env_parse_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(default)
}

pub(crate) fn parse_transport(raw: Option<&str>) -> Result<TransportKind, ClientError> {
    match raw.map(str::trim).unwrap_or("chunked") {
        "" | "chunked" => Ok(TransportKind::Chunked),
        "stream" => Ok(TransportKind::Stream),
        other => Err(ClientError::Config(format!(
            "unknown DATACHAT_TRANSPORT '{other}' (expected 'chunked' or 'stream')"
        ))),
    }
}

pub(crate) fn parse_view_mode(raw: Option<&str>) -> Result<ViewMode, ClientError> {
    match raw.map(str::trim).unwrap_or("chat") {
        "" | "chat" => Ok(ViewMode::Chat),
        "dashboard" => Ok(ViewMode::Dashboard),
        other => Err(ClientError::Config(format!(
            "unknown DATACHAT_VIEW_MODE '{other}' (expected 'chat' or 'dashboard')"
        ))),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
