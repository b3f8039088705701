//! Client error type.
//!
//! ERROR HANDLING
//! ==============
//! Operations that talk to the backend return `ClientError`. Query lifecycle
//! failures never surface here: the controller turns them into terminal turn
//! states and notices instead.

/// Errors produced by backend calls, configuration and session persistence.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("invalid base URL: {0}")]
    InvalidBaseUrl(String),
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server returned HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("session store failed: {0}")]
    Session(#[from] std::io::Error),
    #[error("config parse failed: {0}")]
    Config(String),
    #[error("a query is still running")]
    Busy,
}
