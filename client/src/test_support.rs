//! Scripted transport and backend doubles for controller tests.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use events::WireEvent;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::error::ClientError;
use crate::net::api::Backend;
use crate::net::transport::{EventResult, EventSender, QueryTransport, TransportHandle, TransportKind};
use crate::net::types::{ConversationSummary, HistoryMessage, QueryRequest, StopResponse};

pub(crate) fn event(kind: &str, payload: Value) -> EventResult {
    Ok(WireEvent::new(kind, payload))
}

// =============================================================================
// TRANSPORT
// =============================================================================

/// Each `open` replays the next script and then drops its sender, ending the
/// stream. With no script left the channel stays open and the test pushes
/// events through [`MockTransport::sender`] (indexed by manual opens).
#[derive(Default)]
pub(crate) struct MockTransport {
    scripts: Mutex<VecDeque<Vec<EventResult>>>,
    requests: Mutex<Vec<QueryRequest>>,
    senders: Mutex<Vec<EventSender>>,
    event_gap: Option<Duration>,
}

impl MockTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_script(self, events: Vec<EventResult>) -> Self {
        self.scripts
            .lock()
            .expect("scripts lock")
            .push_back(events);
        self
    }

    /// Sleep this long before each scripted event.
    pub(crate) fn with_event_gap(mut self, gap: Duration) -> Self {
        self.event_gap = Some(gap);
        self
    }

    pub(crate) fn requests(&self) -> Vec<QueryRequest> {
        self.requests.lock().expect("requests lock").clone()
    }

    pub(crate) fn sender(&self, index: usize) -> EventSender {
        self.senders.lock().expect("senders lock")[index].clone()
    }
}

impl QueryTransport for MockTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Chunked
    }

    fn open(&self, request: QueryRequest, cancel: CancellationToken) -> TransportHandle {
        self.requests
            .lock()
            .expect("requests lock")
            .push(request);
        let (sender, handle) = TransportHandle::channel(&cancel);

        let script = self
            .scripts
            .lock()
            .expect("scripts lock")
            .pop_front();
        let Some(events) = script else {
            self.senders
                .lock()
                .expect("senders lock")
                .push(sender);
            return handle;
        };

        let gap = self.event_gap;
        tokio::spawn(async move {
            for event in events {
                if let Some(gap) = gap {
                    tokio::time::sleep(gap).await;
                }
                if !sender.send(event).await {
                    break;
                }
            }
        });
        handle
    }
}

// =============================================================================
// BACKEND
// =============================================================================

pub(crate) struct MockBackend {
    stop_calls: Mutex<Vec<String>>,
    stop_response: Result<StopResponse, u16>,
    conversations: Vec<ConversationSummary>,
    messages: Vec<HistoryMessage>,
    list_calls: AtomicUsize,
    fail_history: bool,
    hang_stop: bool,
}

impl MockBackend {
    pub(crate) fn new() -> Self {
        Self {
            stop_calls: Mutex::new(Vec::new()),
            stop_response: Ok(StopResponse { success: true, error: None }),
            conversations: Vec::new(),
            messages: Vec::new(),
            list_calls: AtomicUsize::new(0),
            fail_history: false,
            hang_stop: false,
        }
    }

    pub(crate) fn with_conversations(mut self, ids: &[&str]) -> Self {
        self.conversations = ids
            .iter()
            .map(|id| ConversationSummary {
                id: (*id).to_owned(),
                title: Some(format!("title {id}")),
                updated_at: None,
                message_count: None,
            })
            .collect();
        self
    }

    pub(crate) fn with_messages(mut self, messages: Vec<HistoryMessage>) -> Self {
        self.messages = messages;
        self
    }

    pub(crate) fn with_stop_response(mut self, response: StopResponse) -> Self {
        self.stop_response = Ok(response);
        self
    }

    /// Stop calls fail with this HTTP status.
    pub(crate) fn failing_stop(mut self, status: u16) -> Self {
        self.stop_response = Err(status);
        self
    }

    /// Stop calls are recorded but never answered.
    pub(crate) fn hanging_stop(mut self) -> Self {
        self.hang_stop = true;
        self
    }

    pub(crate) fn failing_history(mut self) -> Self {
        self.fail_history = true;
        self
    }

    pub(crate) fn stop_calls(&self) -> Vec<String> {
        self.stop_calls.lock().expect("stop lock").clone()
    }

    pub(crate) fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Backend for MockBackend {
    async fn stop_query(&self, conversation_id: &str) -> Result<StopResponse, ClientError> {
        self.stop_calls
            .lock()
            .expect("stop lock")
            .push(conversation_id.to_owned());
        if self.hang_stop {
            std::future::pending::<()>().await;
        }
        tokio::task::yield_now().await;
        match &self.stop_response {
            Ok(response) => Ok(response.clone()),
            Err(status) => Err(ClientError::HttpStatus { status: *status, body: "stop failed".to_owned() }),
        }
    }

    async fn list_conversations(&self) -> Result<Vec<ConversationSummary>, ClientError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_history {
            return Err(ClientError::HttpStatus { status: 503, body: "unavailable".to_owned() });
        }
        Ok(self.conversations.clone())
    }

    async fn fetch_messages(&self, _conversation_id: &str) -> Result<Vec<HistoryMessage>, ClientError> {
        if self.fail_history {
            return Err(ClientError::HttpStatus { status: 503, body: "unavailable".to_owned() });
        }
        Ok(self.messages.clone())
    }
}
