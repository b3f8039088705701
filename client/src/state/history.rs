//! Conversation history list and its refresh flag.
//!
//! DESIGN
//! ======
//! Query completion and new conversation ids only raise `needs_refresh`; the
//! list is refetched lazily when the history view is activated, after a short
//! delay so the backend has committed the latest turn.

#[cfg(test)]
#[path = "history_test.rs"]
mod history_test;

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::ClientError;
use crate::net::api::Backend;
use crate::net::types::ConversationSummary;

#[derive(Debug, Default)]
struct HistoryInner {
    needs_refresh: bool,
    loaded: bool,
    entries: Vec<ConversationSummary>,
}

#[derive(Debug, Default)]
pub struct HistoryPanel {
    inner: Mutex<HistoryInner>,
}

impl HistoryPanel {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HistoryInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn mark_needs_refresh(&self) {
        self.lock().needs_refresh = true;
    }

    #[must_use]
    pub fn needs_refresh(&self) -> bool {
        self.lock().needs_refresh
    }

    #[must_use]
    pub fn entries(&self) -> Vec<ConversationSummary> {
        self.lock().entries.clone()
    }

    /// Consume the refresh flag and refetch when it was set, when forced, or
    /// when the list was never loaded. Returns whether a fetch happened.
    ///
    /// # Errors
    ///
    /// Propagates the backend error; the flag is raised again so the next
    /// activation retries.
    pub async fn activate(&self, force: bool, backend: &dyn Backend, delay: Duration) -> Result<bool, ClientError> {
        let should_fetch = {
            let mut inner = self.lock();
            let should_fetch = force || inner.needs_refresh || !inner.loaded;
            inner.needs_refresh = false;
            should_fetch
        };
        if !should_fetch {
            return Ok(false);
        }

        tokio::time::sleep(delay).await;
        match backend.list_conversations().await {
            Ok(entries) => {
                debug!(count = entries.len(), "history: refreshed");
                let mut inner = self.lock();
                inner.entries = entries;
                inner.loaded = true;
                Ok(true)
            }
            Err(error) => {
                warn!(error = %error, "history: refresh failed");
                self.lock().needs_refresh = true;
                Err(error)
            }
        }
    }
}
