//! Chunked-response transport: one `POST /api/query`, body read incrementally.
//!
//! The body may be bare NDJSON or SSE `data:` framing; both go through the
//! same line decoder.

use std::time::Duration;

use events::LineDecoder;
use futures_util::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::transport::{EventSender, QueryTransport, TransportError, TransportHandle, TransportKind, deliver_line};
use super::types::QueryRequest;
use crate::error::ClientError;

pub struct ChunkedTransport {
    http: reqwest::Client,
    endpoint: String,
}

impl ChunkedTransport {
    /// Build a transport posting to `{base_url}/api/query`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client fails to build.
    pub fn new(base_url: &str, connect_timeout: Duration) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()?;
        Ok(Self { http, endpoint: query_endpoint(base_url) })
    }
}

pub(crate) fn query_endpoint(base_url: &str) -> String {
    format!("{}/api/query", base_url.trim_end_matches('/'))
}

impl QueryTransport for ChunkedTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Chunked
    }

    fn open(&self, request: QueryRequest, cancel: CancellationToken) -> TransportHandle {
        let (sender, handle) = TransportHandle::channel(&cancel);
        let http = self.http.clone();
        let endpoint = self.endpoint.clone();

        tokio::spawn(async move {
            let control = sender.control().clone();
            tokio::select! {
                biased;
                () = control.closed() => debug!(%endpoint, "chunked transport: closed before end of body"),
                () = pump(&http, &endpoint, &request, &sender) => debug!(%endpoint, "chunked transport: body finished"),
            }
        });

        handle
    }
}

async fn pump(http: &reqwest::Client, endpoint: &str, request: &QueryRequest, sender: &EventSender) {
    let response = match http.post(endpoint).json(request).send().await {
        Ok(response) => response,
        Err(error) => {
            warn!(error = %error, %endpoint, "chunked transport: request failed");
            sender
                .send(Err(TransportError::Network(error.to_string())))
                .await;
            return;
        }
    };

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        sender
            .send(Err(TransportError::Http { status: status.as_u16(), body }))
            .await;
        return;
    }

    let mut decoder = LineDecoder::new();
    let mut body = response.bytes_stream();
    while let Some(chunk) = body.next().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(error) => {
                warn!(error = %error, %endpoint, "chunked transport: body read failed");
                sender
                    .send(Err(TransportError::Network(error.to_string())))
                    .await;
                return;
            }
        };
        for line in decoder.push(&chunk) {
            if !deliver_line(sender, &line).await {
                return;
            }
        }
    }

    if let Some(line) = decoder.finish() {
        deliver_line(sender, &line).await;
    }
}
