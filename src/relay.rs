use crate::config::Upstream;
use crate::error::{ProxyError, Result};
use crate::logging::RequestLogger;
use crate::translate::UpstreamRequest;

use bytes::Bytes;
use futures::stream::{Stream, StreamExt};
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use std::convert::Infallible;
use std::fmt::Display;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;

const EVENT_STREAM: &str = "text/event-stream";

/// Client side of a streaming relay. Dropping it cancels the upstream read.
pub type RelayBody = ReceiverStream<std::result::Result<Bytes, Infallible>>;

/// What the upstream answered, ready to be written to the client.
pub enum RelayOutcome {
    /// One JSON document, re-serialized as received.
    Buffered { status: u16, body: serde_json::Value },
    /// Upstream chunks, forwarded as they arrive.
    Streaming { status: u16, body: RelayBody },
    /// Non-2xx upstream answer, mirrored verbatim.
    Rejected {
        status: u16,
        content_type: Option<String>,
        body: Bytes,
    },
}

/// How a streaming relay ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEnd {
    Completed { chunks: usize },
    UpstreamFailed { chunks: usize, error: String },
    ClientDisconnected { chunks: usize },
}

/// Issue the single upstream call for one chat completion and prepare the reply.
pub async fn relay_chat(
    req: &UpstreamRequest,
    upstream: &Upstream,
    client: &reqwest::Client,
    channel_capacity: usize,
    log: &RequestLogger,
) -> Result<RelayOutcome> {
    log.info(
        "relay",
        format!(
            "POST {} model={} stream={} tool_choice={}",
            upstream.completions_url,
            req.model,
            req.stream,
            req.tool_choice.as_str()
        ),
    );

    let response = send_upstream(req, upstream, client).await?;
    let status = response.status().as_u16();

    if !response.status().is_success() {
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response
            .bytes()
            .await
            .map_err(|e| ProxyError::upstream(format!("Failed to read error body: {}", e)))?;

        log.warn(
            "relay",
            format!(
                "Upstream rejected request status={}: {}",
                status,
                truncate(&String::from_utf8_lossy(&body), 500)
            ),
        );

        return Ok(RelayOutcome::Rejected {
            status,
            content_type,
            body,
        });
    }

    if streams(&response, req.stream) {
        log.info("relay", format!("Streaming upstream response status={}", status));
        let (body, _task) =
            spawn_stream_relay(response.bytes_stream(), channel_capacity, log.clone());
        return Ok(RelayOutcome::Streaming { status, body });
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| ProxyError::upstream(format!("Failed to read response body: {}", e)))?;
    let body: serde_json::Value = serde_json::from_slice(&bytes)?;

    log.info(
        "relay",
        format!("Completed status={} body_len={}", status, bytes.len()),
    );

    Ok(RelayOutcome::Buffered { status, body })
}

async fn send_upstream(
    req: &UpstreamRequest,
    upstream: &Upstream,
    client: &reqwest::Client,
) -> Result<reqwest::Response> {
    let accept = if req.stream {
        EVENT_STREAM
    } else {
        "application/json"
    };

    let send = client
        .post(&upstream.completions_url)
        .header(AUTHORIZATION, format!("Bearer {}", upstream.api_key))
        .header(CONTENT_TYPE, "application/json")
        .header(ACCEPT, accept)
        .json(req)
        .send();

    let response = match upstream.response_timeout {
        Some(limit) => tokio::time::timeout(limit, send)
            .await
            .map_err(|_| ProxyError::UpstreamTimeout {
                secs: limit.as_secs(),
            })?,
        None => send.await,
    };

    response.map_err(|e| ProxyError::upstream(format!("Request failed: {}", e)))
}

/// The upstream's declared framing wins; the client's flag only decides when
/// the reply carries no usable `Content-Type`.
fn streams(response: &reqwest::Response, requested: bool) -> bool {
    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok());
    is_event_stream(content_type, requested)
}

fn is_event_stream(content_type: Option<&str>, requested: bool) -> bool {
    match content_type {
        Some(ct) => ct.trim_start().to_ascii_lowercase().starts_with(EVENT_STREAM),
        None => requested,
    }
}

/// Start forwarding `upstream` into a bounded channel read by the client body.
///
/// Up to `capacity` chunks sit in the channel, plus one more the task holds
/// while waiting for room, so the upstream is read that far ahead of the
/// client. With a capacity of 1 the relay is one chunk behind the client at
/// most. When the returned [`RelayBody`] is dropped the task stops polling
/// `upstream` and drops it, which releases the upstream connection; chunks
/// already read ahead are discarded.
pub fn spawn_stream_relay<S, E>(
    upstream: S,
    capacity: usize,
    log: RequestLogger,
) -> (RelayBody, JoinHandle<StreamEnd>)
where
    S: Stream<Item = std::result::Result<Bytes, E>> + Send + 'static,
    E: Display + Send + 'static,
{
    let (tx, rx) = mpsc::channel(capacity.max(1));

    let task = tokio::spawn(async move {
        let end = forward_chunks(upstream, tx).await;
        match &end {
            StreamEnd::Completed { chunks } => {
                log.info("stream", format!("Stream completed after {} chunks", chunks));
            }
            StreamEnd::UpstreamFailed { chunks, error } => {
                log.error(
                    "stream",
                    format!("Stream error after {} chunks: {}", chunks, error),
                );
            }
            StreamEnd::ClientDisconnected { chunks } => {
                log.info(
                    "stream",
                    format!("Client disconnected after {} chunks, upstream read cancelled", chunks),
                );
            }
        }
        end
    });

    (ReceiverStream::new(rx), task)
}

async fn forward_chunks<S, E>(
    upstream: S,
    tx: mpsc::Sender<std::result::Result<Bytes, Infallible>>,
) -> StreamEnd
where
    S: Stream<Item = std::result::Result<Bytes, E>>,
    E: Display,
{
    let mut upstream = Box::pin(upstream);
    let mut chunks = 0;

    loop {
        let next = tokio::select! {
            biased;
            () = tx.closed() => return StreamEnd::ClientDisconnected { chunks },
            next = upstream.next() => next,
        };

        match next {
            None => return StreamEnd::Completed { chunks },
            Some(Err(e)) => {
                return StreamEnd::UpstreamFailed {
                    chunks,
                    error: e.to_string(),
                }
            }
            Some(Ok(chunk)) => {
                if tx.send(Ok(chunk)).await.is_err() {
                    return StreamEnd::ClientDisconnected { chunks };
                }
                chunks += 1;
            }
        }
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
