//! Persistent-stream transport: WebSocket at `/api/query/ws`.
//!
//! The request is sent as the first text message; every text message after
//! that carries one or more newline-separated JSON events. Closing the handle
//! sends a close frame rather than dropping the socket.

use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::transport::{EventSender, QueryTransport, TransportError, TransportHandle, TransportKind, deliver_line};
use super::types::QueryRequest;
use crate::error::ClientError;

pub struct StreamTransport {
    ws_url: String,
}

impl StreamTransport {
    /// Build a transport for the WebSocket endpoint derived from `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidBaseUrl`] when the scheme is not http(s) or ws(s).
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        Ok(Self { ws_url: ws_url(base_url)? })
    }

    #[must_use]
    pub fn ws_url(&self) -> &str {
        &self.ws_url
    }
}

pub(crate) fn ws_url(base_url: &str) -> Result<String, ClientError> {
    let base = base_url.trim_end_matches('/');
    let origin = if let Some(rest) = base.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = base.strip_prefix("http://") {
        format!("ws://{rest}")
    } else if base.starts_with("ws://") || base.starts_with("wss://") {
        base.to_owned()
    } else {
        return Err(ClientError::InvalidBaseUrl(base_url.to_owned()));
    };
    Ok(format!("{origin}/api/query/ws"))
}

impl QueryTransport for StreamTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Stream
    }

    fn open(&self, request: QueryRequest, cancel: CancellationToken) -> TransportHandle {
        let (sender, handle) = TransportHandle::channel(&cancel);
        let url = self.ws_url.clone();
        tokio::spawn(async move {
            pump(&url, &request, &sender).await;
            debug!(%url, "stream transport: finished");
        });
        handle
    }
}

async fn pump(url: &str, request: &QueryRequest, sender: &EventSender) {
    let control = sender.control().clone();
    let connected = tokio::select! {
        biased;
        () = control.closed() => return,
        connected = connect_async(url) => connected,
    };
    let mut socket = match connected {
        Ok((socket, _)) => socket,
        Err(error) => {
            warn!(error = %error, %url, "stream transport: connect failed");
            sender
                .send(Err(TransportError::Network(error.to_string())))
                .await;
            return;
        }
    };

    let body = match serde_json::to_string(request) {
        Ok(body) => body,
        Err(error) => {
            sender
                .send(Err(TransportError::Network(error.to_string())))
                .await;
            return;
        }
    };
    if let Err(error) = socket.send(Message::Text(body.into())).await {
        sender
            .send(Err(TransportError::Network(error.to_string())))
            .await;
        return;
    }

    loop {
        let message = tokio::select! {
            biased;
            () = control.closed() => {
                if let Err(error) = socket.close(None).await {
                    debug!(error = %error, "stream transport: close frame not sent");
                }
                return;
            }
            message = socket.next() => message,
        };

        let text = match message {
            Some(Ok(Message::Text(text))) => text.as_str().to_owned(),
            Some(Ok(Message::Binary(bytes))) => String::from_utf8_lossy(&bytes).into_owned(),
            Some(Ok(Message::Close(_))) | None => return,
            Some(Ok(_)) => continue,
            Some(Err(error)) => {
                warn!(error = %error, %url, "stream transport: read failed");
                sender
                    .send(Err(TransportError::Network(error.to_string())))
                    .await;
                return;
            }
        };

        for line in text.lines() {
            if !deliver_line(sender, line).await {
                if let Err(error) = socket.close(None).await {
                    debug!(error = %error, "stream transport: close frame not sent");
                }
                return;
            }
        }
    }
}
