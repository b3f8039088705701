//! Query event channel contract shared by both transport strategies.
//!
//! DESIGN
//! ======
//! `open` returns immediately with a [`TransportHandle`]; a spawned pump task
//! performs the request and feeds decoded events into a bounded channel in
//! arrival order. The handle's [`HandleControl`] is a child of the query's
//! cancellation token, so cancelling the query also closes the transport,
//! while `close()` alone stops the pump without cancelling anything else.
//!
//! Undecodable lines are logged and skipped; a `done` event ends the pump.

use std::sync::Arc;

use events::{WireEvent, is_abort_message, truncate_chars};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use super::chunked::ChunkedTransport;
use super::stream::StreamTransport;
use super::types::QueryRequest;
use crate::config::ClientConfig;
use crate::error::ClientError;

const EVENT_CHANNEL_CAPACITY: usize = 64;
const LOGGED_LINE_MAX_CHARS: usize = 200;

/// Which strategy carries query events.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TransportKind {
    /// One `POST` whose body is read incrementally.
    #[default]
    Chunked,
    /// Persistent WebSocket.
    Stream,
}

impl TransportKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Chunked => "chunked",
            Self::Stream => "stream",
        }
    }
}

/// Failure of the event channel itself, as opposed to a backend `error` event.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("network failure: {0}")]
    Network(String),
    #[error("server returned HTTP {status}: {body}")]
    Http { status: u16, body: String },
}

impl TransportError {
    /// Whether the failure reads like a cancellation rather than a fault.
    #[must_use]
    pub fn is_abort(&self) -> bool {
        match self {
            Self::Network(message) => is_abort_message(message),
            Self::Http { .. } => false,
        }
    }
}

pub type EventResult = Result<WireEvent, TransportError>;

/// Strategy for opening a query event channel.
pub trait QueryTransport: Send + Sync {
    fn kind(&self) -> TransportKind;

    /// Start the query. Must be called inside a tokio runtime.
    fn open(&self, request: QueryRequest, cancel: CancellationToken) -> TransportHandle;
}

/// Build the configured transport strategy.
///
/// # Errors
///
/// Returns an error when the base URL cannot be mapped onto the strategy's
/// endpoint or the HTTP client fails to build.
pub fn build_transport(config: &ClientConfig) -> Result<Arc<dyn QueryTransport>, ClientError> {
    match config.transport {
        TransportKind::Chunked => Ok(Arc::new(ChunkedTransport::new(&config.base_url, config.connect_timeout())?)),
        TransportKind::Stream => {
            let transport = StreamTransport::new(&config.base_url)?;
            warn!(
                ws_url = transport.ws_url(),
                "stream transport selected; event parity with the chunked transport is unverified"
            );
            Ok(Arc::new(transport))
        }
    }
}

// =============================================================================
// HANDLE
// =============================================================================

/// Cloneable close switch for one open transport.
#[derive(Clone, Debug)]
pub struct HandleControl {
    closed: CancellationToken,
}

impl HandleControl {
    /// Stop delivering events. Idempotent, and harmless after natural completion.
    pub fn close(&self) {
        self.closed.cancel();
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// Resolves once the handle is closed or the query is cancelled.
    pub async fn closed(&self) {
        self.closed.cancelled().await;
    }
}

/// Receiving side of an open query.
#[derive(Debug)]
pub struct TransportHandle {
    events: mpsc::Receiver<EventResult>,
    control: HandleControl,
}

impl TransportHandle {
    /// Create a connected sender/handle pair whose control is a child of `cancel`.
    #[must_use]
    pub fn channel(cancel: &CancellationToken) -> (EventSender, Self) {
        let (tx, events) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let control = HandleControl { closed: cancel.child_token() };
        (EventSender { tx, control: control.clone() }, Self { events, control })
    }

    /// Next event in arrival order; `None` once the stream ends or the handle closes.
    pub async fn next(&mut self) -> Option<EventResult> {
        if self.control.is_closed() {
            return None;
        }
        tokio::select! {
            biased;
            () = self.control.closed() => None,
            event = self.events.recv() => event,
        }
    }

    #[must_use]
    pub fn control(&self) -> HandleControl {
        self.control.clone()
    }

    pub fn close(&self) {
        self.control.close();
    }
}

/// Producing side held by a transport's pump task.
#[derive(Clone, Debug)]
pub struct EventSender {
    tx: mpsc::Sender<EventResult>,
    control: HandleControl,
}

impl EventSender {
    /// Queue an event. Returns `false` once the handle is closed or dropped.
    pub async fn send(&self, event: EventResult) -> bool {
        if self.control.is_closed() {
            return false;
        }
        tokio::select! {
            biased;
            () = self.control.closed() => false,
            sent = self.tx.send(event) => sent.is_ok(),
        }
    }

    #[must_use]
    pub fn control(&self) -> &HandleControl {
        &self.control
    }
}

/// Decode one line and forward it. Returns `false` when the pump should stop.
pub(crate) async fn deliver_line(sender: &EventSender, line: &str) -> bool {
    match events::parse_line(line) {
        None => true,
        Some(Ok(event)) => {
            let done = event.kind == "done";
            sender.send(Ok(event)).await && !done
        }
        Some(Err(error)) => {
            warn!(
                error = %error,
                line = %truncate_chars(line, LOGGED_LINE_MAX_CHARS),
                "transport: skipping undecodable event"
            );
            true
        }
    }
}

#[cfg(test)]
#[path = "transport_test.rs"]
mod transport_test;
