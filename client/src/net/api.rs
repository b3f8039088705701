//! REST helpers for the stop and history endpoints.
//!
//! ERROR HANDLING
//! ==============
//! A non-2xx answer from the stop endpoint is folded into an unsuccessful
//! [`StopResponse`] so the stop protocol can report it as a soft warning and
//! carry on. History calls propagate [`ClientError`] to the caller.

#[cfg(test)]
#[path = "api_test.rs"]
mod api_test;

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

use super::types::{ConversationSummary, HistoryMessage, StopRequest, StopResponse, parse_list};
use crate::error::ClientError;

/// Whole-request bound for REST calls; the query event channel is not subject to it.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Backend operations outside the query event channel.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Ask the backend to stop the running query of a conversation.
    async fn stop_query(&self, conversation_id: &str) -> Result<StopResponse, ClientError>;

    async fn list_conversations(&self) -> Result<Vec<ConversationSummary>, ClientError>;

    async fn fetch_messages(&self, conversation_id: &str) -> Result<Vec<HistoryMessage>, ClientError>;
}

fn stop_endpoint(base_url: &str) -> String {
    format!("{base_url}/api/query/stop")
}

fn conversations_endpoint(base_url: &str) -> String {
    format!("{base_url}/api/conversations")
}

/// The id is one percent-encoded path segment, so `/` or `?` in it stay inside it.
fn messages_endpoint(base_url: &str, conversation_id: &str) -> Result<reqwest::Url, ClientError> {
    let invalid = || ClientError::InvalidBaseUrl(base_url.to_owned());
    let mut url = reqwest::Url::parse(&conversations_endpoint(base_url)).map_err(|_| invalid())?;
    url.path_segments_mut()
        .map_err(|()| invalid())?
        .push(conversation_id)
        .push("messages");
    Ok(url)
}

fn stop_failed_message(status: u16, body: &str) -> String {
    if body.trim().is_empty() {
        format!("stop request failed: {status}")
    } else {
        format!("stop request failed: {status}: {}", body.trim())
    }
}

/// [`Backend`] over `reqwest`.
pub struct HttpBackend {
    http: reqwest::Client,
    base_url: String,
}

impl HttpBackend {
    /// Requests are bounded by [`REQUEST_TIMEOUT`] on top of `connect_timeout`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client fails to build.
    pub fn new(base_url: &str, connect_timeout: Duration) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self { http, base_url: base_url.trim_end_matches('/').to_owned() })
    }

    async fn get_json(&self, url: &str) -> Result<Value, ClientError> {
        let response = self.http.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::HttpStatus { status: status.as_u16(), body });
        }
        Ok(response.json::<Value>().await?)
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn stop_query(&self, conversation_id: &str) -> Result<StopResponse, ClientError> {
        let url = stop_endpoint(&self.base_url);
        let body = StopRequest { conversation_id: conversation_id.to_owned() };
        let response = self.http.post(&url).json(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            warn!(%conversation_id, status = status.as_u16(), "stop request rejected");
            return Ok(StopResponse { success: false, error: Some(stop_failed_message(status.as_u16(), &text)) });
        }
        Ok(response.json::<StopResponse>().await?)
    }

    async fn list_conversations(&self) -> Result<Vec<ConversationSummary>, ClientError> {
        let value = self
            .get_json(&conversations_endpoint(&self.base_url))
            .await?;
        let rows = parse_list(value, "conversations")?;
        debug!(count = rows.len(), "history: conversations listed");
        Ok(rows)
    }

    async fn fetch_messages(&self, conversation_id: &str) -> Result<Vec<HistoryMessage>, ClientError> {
        let value = self
            .get_json(messages_endpoint(&self.base_url, conversation_id)?.as_str())
            .await?;
        Ok(parse_list(value, "messages")?)
    }
}
