//! Stop coordinator.
//!
//! DESIGN
//! ======
//! `stop` sets the stop latch atomically on entry, so a second call while the
//! first is running is ignored. The local interruption happens first, under
//! the controller lock in one step, so the UI never shows a half-stopped
//! query and never waits on the network: close the transport, cancel the
//! token, mark acknowledged thinking turns interrupted, restore the input,
//! drop unacknowledged placeholders, and return to idle. The backend is told
//! afterwards (when a conversation id is known), bounded by
//! [`STOP_REQUEST_TIMEOUT`]. Failures along the way become notices and never
//! abort the protocol.

use std::time::Duration;

use tracing::{debug, info, warn};

use super::{QueryController, StopOutcome};
use crate::state::conversation::Turn;
use crate::state::ui::NoticeLevel;

/// Upper bound on waiting for the backend to acknowledge a stop.
pub(super) const STOP_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

impl QueryController {
    /// Cancel the in-flight query.
    ///
    /// The UI is idle before the backend stop request is sent; the returned
    /// future resolves once that request settles or times out.
    pub async fn stop(&self) -> StopOutcome {
        let conversation_id = {
            let mut state = self.lock();
            if !state.processing || state.stop_in_progress {
                debug!(
                    processing = state.processing,
                    stop_in_progress = state.stop_in_progress,
                    "stop: ignored"
                );
                return StopOutcome::Ignored;
            }
            state.stop_in_progress = true;
            state.conversation.id().map(str::to_owned)
        };
        self.inner.revision.bump();

        let conversation_id = conversation_id.or_else(|| self.inner.session.load());
        info!(conversation_id = ?conversation_id, "stop: requested");

        self.update(|state| {
            if let Some(handle) = state.handle.take() {
                handle.close();
            }
            if let Some(cancel) = state.cancel.take() {
                cancel.cancel();
            }

            if state.conversation.interrupt_thinking() == 0 {
                state.conversation.push(Turn::interrupted(None));
            }

            if let Some(text) = state.last_submitted.clone() {
                state.ui.restore_input(&text);
            }
            state.ui.notify(
                NoticeLevel::Info,
                "Query stopped. Your question is back in the input box.",
            );

            let removed = state.conversation.remove_pending();
            state.cleanup();
            debug!(removed_placeholders = removed, "stop: cleanup complete");
        });
        self.inner.history.mark_needs_refresh();

        if let Some(id) = conversation_id {
            if let Some(message) = self.request_backend_stop(&id).await {
                warn!(warning = %message, "stop: backend stop not confirmed");
                self.notify(NoticeLevel::Warning, message);
            }
        }
        StopOutcome::Stopped
    }

    /// Returns the warning to show when the backend did not confirm the stop.
    async fn request_backend_stop(&self, conversation_id: &str) -> Option<String> {
        let request = self.inner.backend.stop_query(conversation_id);
        match tokio::time::timeout(STOP_REQUEST_TIMEOUT, request).await {
            Ok(Ok(response)) if response.success => None,
            Ok(Ok(response)) => Some(format!(
                "The backend did not confirm the stop: {}",
                response
                    .error
                    .unwrap_or_else(|| "no reason given".to_owned())
            )),
            Ok(Err(error)) => Some(format!("Could not reach the backend to stop the query: {error}")),
            Err(_) => Some(format!(
                "The backend did not answer the stop request within {}s.",
                STOP_REQUEST_TIMEOUT.as_secs()
            )),
        }
    }
}
