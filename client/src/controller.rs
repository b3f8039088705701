//! Query lifecycle controller.
//!
//! SYSTEM CONTEXT
//! ==============
//! One `QueryController` owns the conversation, the UI chrome and the single
//! in-flight query. `send` opens a transport, consumes its events in order
//! until a terminal event, end of stream, or cancellation, and always returns
//! the UI to idle. `stop` (see `controller_stop`) cancels cooperatively and
//! applies the interrupted state synchronously.
//!
//! DESIGN
//! ======
//! All mutable state sits behind one `std::sync::Mutex` that is never held
//! across an `.await`. The guard manager and history panel own their own
//! locks and are only touched after the controller lock is released. Every
//! mutation bumps a shared revision that renderers subscribe to.
//!
//! Each query gets an id. Cleanup after `send` only runs while that id is
//! still current and no stop is in progress, so a stop that already cleaned
//! up is never undone by the send task winding down.

#[path = "controller_finalize.rs"]
mod controller_finalize;
#[path = "controller_stop.rs"]
mod controller_stop;

#[cfg(test)]
#[path = "controller_test.rs"]
mod controller_test;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use events::{DbUnavailablePayload, QueryEvent, WireEvent};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::{ClientConfig, QuerySettings, Timings};
use crate::error::ClientError;
use crate::net::api::{Backend, HttpBackend};
use crate::net::transport::{HandleControl, QueryTransport, TransportError, TransportHandle, build_transport};
use crate::net::types::{ConversationSummary, QueryRequest, SendOptions, ViewMode};
use crate::state::Revision;
use crate::state::conversation::{Conversation, Turn, TurnKind};
use crate::state::guard::{DbGuardWarning, GuardManager};
use crate::state::history::HistoryPanel;
use crate::state::session::{FileSessionStore, MemorySessionStore, SessionStore};
use crate::state::stages::StageTracker;
use crate::state::ui::{NoticeLevel, Route, UiState};

/// How a `send` ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SendOutcome {
    /// Final answer rendered.
    Completed,
    /// Backend or transport error rendered in place of the answer.
    Failed,
    /// Stopped by the user or interrupted by the backend.
    Interrupted,
    /// Database guard card shown instead of running the query.
    Guarded,
    /// Not started: empty text or another query in flight.
    Rejected,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopOutcome {
    /// Local state was reset and the backend was asked to stop.
    Stopped,
    /// Nothing in flight, or a stop is already running.
    Ignored,
}

/// Collaborators injected into the controller.
pub struct ControllerDeps {
    /// Opens the event stream for each query.
    pub transport: Arc<dyn QueryTransport>,
    /// REST calls: stop, database check, history and messages.
    pub backend: Arc<dyn Backend>,
    /// Keeps the active conversation id across restarts.
    pub session: Arc<dyn SessionStore>,
}

/// Read-only copy of everything a renderer needs.
#[derive(Clone, Debug)]
pub struct Snapshot {
    /// Bumped on every state change; matches the value on the watch channel.
    pub revision: u64,
    /// Backend conversation the next query continues, if any.
    pub conversation_id: Option<String>,
    /// Transcript in display order.
    pub turns: Vec<Turn>,
    pub ui: UiState,
    /// Model, context window and view mode sent with each query.
    pub settings: QuerySettings,
    /// A query is in flight.
    pub processing: bool,
    /// `stop()` is between its latch and its cleanup.
    pub stop_in_progress: bool,
    /// Database warning card, when one is showing.
    pub guard: Option<DbGuardWarning>,
    /// The history list is stale and should be refetched before display.
    pub history_needs_refresh: bool,
}

#[derive(Default)]
struct ControllerState {
    conversation: Conversation,
    ui: UiState,
    settings: QuerySettings,
    processing: bool,
    stop_in_progress: bool,
    query_id: Option<u64>,
    next_query_id: u64,
    cancel: Option<CancellationToken>,
    handle: Option<HandleControl>,
    active_turn: Option<Uuid>,
    last_submitted: Option<String>,
}

impl ControllerState {
    /// Return to idle. Shared by completion, error, interruption and stop.
    fn cleanup(&mut self) {
        self.ui.leave_processing();
        self.processing = false;
        self.cancel = None;
        if let Some(handle) = self.handle.take() {
            handle.close();
        }
        self.active_turn = None;
        self.query_id = None;
        self.stop_in_progress = false;
    }

    /// Whether `query_id` still owns the visible state.
    fn owns(&self, query_id: u64) -> bool {
        self.query_id == Some(query_id) && !self.stop_in_progress
    }
}

struct Inner {
    state: Mutex<ControllerState>,
    transport: Arc<dyn QueryTransport>,
    backend: Arc<dyn Backend>,
    session: Arc<dyn SessionStore>,
    guard: GuardManager,
    history: HistoryPanel,
    revision: Revision,
    timings: Timings,
}

/// Per-send bookkeeping owned by the `send` future.
struct ActiveQuery {
    id: u64,
    turn: Uuid,
    text: String,
    cancel: CancellationToken,
    handle: TransportHandle,
    conversation_noted: bool,
}

/// Cloneable handle to the controller; clones share state.
#[derive(Clone)]
pub struct QueryController {
    inner: Arc<Inner>,
}

impl QueryController {
    #[must_use]
    pub fn new(deps: ControllerDeps, settings: QuerySettings, timings: Timings) -> Self {
        let revision = Revision::new();
        let state = ControllerState { settings, next_query_id: 1, ..ControllerState::default() };
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(state),
                transport: deps.transport,
                backend: deps.backend,
                session: deps.session,
                guard: GuardManager::new(revision.clone(), timings.guard_fade),
                history: HistoryPanel::new(),
                revision,
                timings,
            }),
        }
    }

    /// Build the configured transport, HTTP backend and session store.
    ///
    /// # Errors
    ///
    /// Returns an error when the base URL does not fit the transport or the
    /// HTTP client fails to build.
    pub fn from_config(config: &ClientConfig, timings: Timings) -> Result<Self, ClientError> {
        let session: Arc<dyn SessionStore> = match &config.session_file {
            Some(path) => Arc::new(FileSessionStore::new(path)),
            None => Arc::new(MemorySessionStore::new()),
        };
        let deps = ControllerDeps {
            transport: build_transport(config)?,
            backend: Arc::new(HttpBackend::new(&config.base_url, config.connect_timeout())?),
            session,
        };
        Ok(Self::new(deps, config.query_settings(), timings))
    }

    fn lock(&self) -> MutexGuard<'_, ControllerState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Mutate state under the lock, then notify renderers.
    fn update<R>(&self, apply: impl FnOnce(&mut ControllerState) -> R) -> R {
        let result = {
            let mut state = self.lock();
            apply(&mut state)
        };
        self.inner.revision.bump();
        result
    }

    fn notify(&self, level: NoticeLevel, message: impl Into<String>) {
        let message = message.into();
        self.update(|state| state.ui.notify(level, message));
    }

    // =========================================================================
    // SEND
    // =========================================================================

    /// Submit a question with default options.
    pub async fn send(&self, text: &str) -> SendOutcome {
        self.send_with(text, SendOptions::default())
            .await
    }

    /// Submit a question and drive it to a terminal state.
    ///
    /// Never fails: every outcome leaves a terminal turn and, where useful, a
    /// notice. Resolves once the query has settled.
    pub async fn send_with(&self, text: &str, options: SendOptions) -> SendOutcome {
        let Some(mut query) = self.begin_query(text, options) else {
            return SendOutcome::Rejected;
        };
        let outcome = self.run_query(&mut query).await;
        self.finish_query(query.id, outcome);
        info!(query_id = query.id, ?outcome, "query: finished");
        outcome
    }

    fn begin_query(&self, text: &str, options: SendOptions) -> Option<ActiveQuery> {
        let text = text.trim();
        let mut state = self.lock();

        if text.is_empty() {
            state
                .ui
                .notify(NoticeLevel::Warning, "Type a question before sending.");
            drop(state);
            self.inner.revision.bump();
            return None;
        }
        if state.processing {
            state.ui.notify(
                NoticeLevel::Warning,
                "A query is already running. Stop it or wait for it to finish.",
            );
            drop(state);
            self.inner.revision.bump();
            debug!("query: rejected while another is in flight");
            return None;
        }

        let id = state.next_query_id;
        state.next_query_id += 1;
        state.processing = true;
        state.stop_in_progress = false;
        state.ui.enter_processing();

        if !options.skip_user_message {
            state
                .conversation
                .push(Turn::pending(TurnKind::User { text: text.to_owned() }));
        }
        let turn = state
            .conversation
            .push(Turn::pending(TurnKind::Thinking { stages: StageTracker::new() }));

        let request = QueryRequest {
            query: text.to_owned(),
            conversation_id: state.conversation.id().map(str::to_owned),
            view_mode: state.settings.view_mode,
            model_id: state.settings.model_id.clone(),
            context_window: state.settings.context_window,
            force_execute: options.force_execute,
            skip_user_message: options.skip_user_message,
        };
        let cancel = CancellationToken::new();
        let handle = self
            .inner
            .transport
            .open(request, cancel.clone());

        state.cancel = Some(cancel.clone());
        state.handle = Some(handle.control());
        state.active_turn = Some(turn);
        state.last_submitted = Some(text.to_owned());
        state.query_id = Some(id);
        drop(state);
        self.inner.revision.bump();

        info!(
            query_id = id,
            transport = self.inner.transport.kind().as_str(),
            force_execute = options.force_execute,
            "query: started"
        );
        Some(ActiveQuery {
            id,
            turn,
            text: text.to_owned(),
            cancel,
            handle,
            conversation_noted: false,
        })
    }

    async fn run_query(&self, query: &mut ActiveQuery) -> SendOutcome {
        loop {
            let next = tokio::select! {
                biased;
                () = query.cancel.cancelled() => return SendOutcome::Interrupted,
                next = query.handle.next() => next,
            };
            let wire = match next {
                None => return self.on_stream_end(query),
                Some(Err(error)) => return self.on_transport_error(query, &error),
                Some(Ok(wire)) => wire,
            };

            self.observe_wire_event(query, &wire);
            let stopping = self.lock().stop_in_progress;
            let Some(event) = events::normalize(&wire, stopping) else {
                debug!(kind = %wire.kind, "query: ignoring unrecognized event");
                continue;
            };
            if stopping {
                debug!(kind = %wire.kind, "query: event dropped while stopping");
                return SendOutcome::Interrupted;
            }

            match event {
                QueryEvent::ProgressPlan { labels } => {
                    self.with_stages(query.turn, |stages| stages.apply_plan(&labels));
                }
                QueryEvent::ProgressTip { text, .. } | QueryEvent::ThinkingDelta { text } => {
                    self.with_stages(query.turn, |stages| stages.advance(&text));
                }
                QueryEvent::StatusChange { status } => {
                    self.update(|state| state.ui.status_badge = Some(status));
                }
                QueryEvent::Result { content, steps } => return self.finalize(query, &content, &steps).await,
                QueryEvent::Interrupted { partial, model } => return self.on_interrupted(query, partial, model),
                QueryEvent::Error { message } => return self.on_error(query, &message),
                QueryEvent::DbUnavailable(payload) => return self.on_db_unavailable(query, &payload),
                QueryEvent::Done => return self.on_stream_end(query),
            }
        }
    }

    /// Acknowledge placeholders and pick up the backend-assigned conversation id.
    fn observe_wire_event(&self, query: &mut ActiveQuery, wire: &WireEvent) {
        let assigned = if query.conversation_noted {
            None
        } else {
            wire.conversation_id().map(str::to_owned)
        };

        self.update(|state| {
            state.conversation.acknowledge_pending();
            if let Some(id) = &assigned {
                state.conversation.set_id(Some(id.clone()));
            }
        });

        let Some(conversation_id) = assigned else {
            return;
        };
        query.conversation_noted = true;
        info!(query_id = query.id, %conversation_id, "query: conversation id assigned");
        if let Err(error) = self.inner.session.save(&conversation_id) {
            warn!(error = %error, %conversation_id, "session: persisting conversation id failed");
        }
        self.inner.history.mark_needs_refresh();
    }

    fn with_stages<R>(&self, turn: Uuid, apply: impl FnOnce(&mut StageTracker) -> R) -> Option<R> {
        self.update(|state| state.conversation.stages_mut(turn).map(apply))
    }

    /// Sleep unless the query is cancelled first. Returns `false` when cancelled.
    async fn pause(cancel: &CancellationToken, duration: Duration) -> bool {
        tokio::select! {
            biased;
            () = cancel.cancelled() => false,
            () = tokio::time::sleep(duration) => true,
        }
    }

    // =========================================================================
    // TERMINAL EVENTS
    // =========================================================================

    fn on_interrupted(&self, query: &ActiveQuery, partial: Option<String>, model: Option<String>) -> SendOutcome {
        info!(query_id = query.id, model = ?model, has_partial = partial.is_some(), "query: interrupted");
        query.cancel.cancel();
        self.update(|state| {
            if !state.owns(query.id) {
                return;
            }
            state.conversation.remove(query.turn);
            state.conversation.push(Turn::interrupted(partial));
            state.ui.restore_input(&query.text);
            state.ui.notify(NoticeLevel::Info, "The query was interrupted.");
        });
        SendOutcome::Interrupted
    }

    fn on_error(&self, query: &ActiveQuery, message: &str) -> SendOutcome {
        warn!(query_id = query.id, error = %message, "query: failed");
        self.update(|state| {
            if !state.owns(query.id) {
                return;
            }
            state.conversation.acknowledge_pending();
            let kind = TurnKind::Error { message: message.to_owned() };
            if !state.conversation.replace(query.turn, kind.clone()) {
                state.conversation.push(Turn::new(kind));
            }
            state.ui.notify(NoticeLevel::Error, message);
        });
        SendOutcome::Failed
    }

    fn on_db_unavailable(&self, query: &ActiveQuery, payload: &DbUnavailablePayload) -> SendOutcome {
        let owned = self.update(|state| {
            if !state.owns(query.id) {
                return false;
            }
            state.conversation.remove(query.turn);
            state.conversation.acknowledge_pending();
            state.ui.notify(
                NoticeLevel::Warning,
                format!("Database unavailable: {}", payload.connection.display()),
            );
            true
        });
        if !owned {
            return SendOutcome::Interrupted;
        }
        self.inner.guard.show(payload, &query.text);
        SendOutcome::Guarded
    }

    fn on_transport_error(&self, query: &ActiveQuery, error: &TransportError) -> SendOutcome {
        if error.is_abort() || query.cancel.is_cancelled() || self.lock().stop_in_progress {
            debug!(query_id = query.id, error = %error, "query: transport ended by cancellation");
            return self.on_interrupted(query, None, None);
        }
        let message = match error {
            TransportError::Http { status, .. } => format!("The analysis service returned HTTP {status}."),
            TransportError::Network(detail) => format!("Could not reach the analysis service: {detail}"),
        };
        self.on_error(query, &message)
    }

    fn on_stream_end(&self, query: &ActiveQuery) -> SendOutcome {
        if query.cancel.is_cancelled() || self.lock().stop_in_progress {
            return SendOutcome::Interrupted;
        }
        self.on_error(query, "The response ended before an answer arrived.")
    }

    fn finish_query(&self, query_id: u64, outcome: SendOutcome) {
        self.inner.history.mark_needs_refresh();
        let cleaned = self.update(|state| {
            if !state.owns(query_id) {
                return false;
            }
            state.cleanup();
            true
        });
        if !cleaned {
            debug!(query_id, ?outcome, "query: cleanup owned by stop");
        }
    }

    // =========================================================================
    // GUARD ACTIONS
    // =========================================================================

    /// Resubmit the guarded query, skipping the database check and without a
    /// second user turn.
    pub async fn continue_anyway(&self) -> SendOutcome {
        if self.is_processing() {
            self.notify(NoticeLevel::Warning, "Wait for the running query to finish first.");
            return SendOutcome::Rejected;
        }
        let Some(query) = self.inner.guard.continue_anyway() else {
            return SendOutcome::Rejected;
        };
        info!("guard: continuing without database check");
        self.send_with(&query, SendOptions::forced())
            .await
    }

    /// Clear the guard card and route to connection settings.
    pub fn configure_connection(&self) -> bool {
        let cleared = self.inner.guard.configure();
        self.update(|state| state.ui.route = Route::ConnectionSettings);
        cleared
    }

    /// Close the guard card without acting on it.
    pub fn dismiss_warning(&self) -> bool {
        self.inner.guard.dismiss()
    }

    // =========================================================================
    // CONVERSATIONS
    // =========================================================================

    /// Start over with no conversation id.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Busy`] while a query is running, or the session
    /// store error when the persisted id cannot be cleared.
    pub fn new_conversation(&self) -> Result<(), ClientError> {
        self.update(|state| {
            if state.processing {
                return Err(ClientError::Busy);
            }
            state.conversation.clear();
            state.ui.route = Route::Chat;
            Ok(())
        })?;
        self.inner.guard.dismiss();
        self.inner.history.mark_needs_refresh();
        info!("conversation: started new");
        self.inner.session.clear()
    }

    /// Reload the persisted conversation, if any, with its messages.
    ///
    /// # Errors
    ///
    /// Returns the backend error when messages cannot be fetched; the id is
    /// still adopted so the next query continues the conversation.
    pub async fn resume(&self) -> Result<Option<String>, ClientError> {
        let Some(conversation_id) = self.inner.session.load() else {
            return Ok(None);
        };
        self.update(|state| {
            if !state.processing && state.conversation.id().is_none() {
                state
                    .conversation
                    .set_id(Some(conversation_id.clone()));
            }
        });
        self.open_conversation(&conversation_id).await?;
        Ok(Some(conversation_id))
    }

    /// Replace the visible conversation with a stored one.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Busy`] while a query is running, or the backend error.
    pub async fn open_conversation(&self, conversation_id: &str) -> Result<(), ClientError> {
        if self.is_processing() {
            return Err(ClientError::Busy);
        }
        let messages = self
            .inner
            .backend
            .fetch_messages(conversation_id)
            .await?;
        let count = messages.len();
        self.update(|state| {
            if state.processing {
                return Err(ClientError::Busy);
            }
            state.conversation = Conversation::from_history(conversation_id, &messages);
            state.ui.route = Route::Chat;
            Ok(())
        })?;
        info!(%conversation_id, messages = count, "conversation: opened");
        self.inner.session.save(conversation_id)
    }

    /// Refresh the history list when it is stale, forced, or never loaded.
    ///
    /// # Errors
    ///
    /// Returns the backend error; the list is retried on the next activation.
    pub async fn activate_history(&self, force: bool) -> Result<bool, ClientError> {
        let fetched = self
            .inner
            .history
            .activate(force, self.inner.backend.as_ref(), self.inner.timings.history_refresh_delay)
            .await?;
        if fetched {
            self.inner.revision.bump();
        }
        Ok(fetched)
    }

    #[must_use]
    pub fn history_entries(&self) -> Vec<ConversationSummary> {
        self.inner.history.entries()
    }

    // =========================================================================
    // SETTINGS & VIEW
    // =========================================================================

    /// Model used by subsequent queries; `None` lets the backend choose.
    pub fn set_model(&self, model_id: Option<String>) {
        self.update(|state| state.settings.model_id = model_id);
    }

    pub fn set_context_window(&self, context_window: Option<u32>) {
        self.update(|state| state.settings.context_window = context_window);
    }

    pub fn set_view_mode(&self, view_mode: ViewMode) {
        self.update(|state| state.settings.view_mode = view_mode);
    }

    pub fn set_route(&self, route: Route) {
        self.update(|state| state.ui.route = route);
    }

    pub fn dismiss_notice(&self, notice_id: u64) -> bool {
        self.update(|state| state.ui.dismiss(notice_id))
    }

    #[must_use]
    pub fn is_processing(&self) -> bool {
        self.lock().processing
    }

    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        let (conversation_id, turns, ui, settings, processing, stop_in_progress) = {
            let state = self.lock();
            (
                state.conversation.id().map(str::to_owned),
                state.conversation.turns().to_vec(),
                state.ui.clone(),
                state.settings.clone(),
                state.processing,
                state.stop_in_progress,
            )
        };
        Snapshot {
            revision: self.inner.revision.current(),
            conversation_id,
            turns,
            ui,
            settings,
            processing,
            stop_in_progress,
            guard: self.inner.guard.current(),
            history_needs_refresh: self.inner.history.needs_refresh(),
        }
    }

    /// Revision counter that changes on every state mutation.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.inner.revision.subscribe()
    }

    #[cfg(test)]
    pub(crate) fn guard(&self) -> &GuardManager {
        &self.inner.guard
    }

    #[cfg(test)]
    pub(crate) fn has_live_query(&self) -> bool {
        let state = self.lock();
        state.cancel.is_some() || state.handle.is_some() || state.active_turn.is_some() || state.query_id.is_some()
    }
}
