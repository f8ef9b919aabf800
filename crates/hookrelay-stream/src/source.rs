//! Event sources a receiver can attach to.
//!
//! `EventSource` is the seam between the receiver's connect loop and the
//! transport. `SseSource` implements it over a long-lived HTTP response
//! parsed as server-sent events.

use std::{fmt, time::Duration};

use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::{stream::BoxStream, StreamExt};
use hookrelay_core::RawEvent;
use reqwest::header::{ACCEPT, CACHE_CONTROL};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, StreamError};

/// Frames of one attached session, in arrival order.
///
/// The stream ends when the session closes; an `Err` item is a transport
/// failure and the receiver reconnects.
pub type EventStream = BoxStream<'static, Result<RawEvent>>;

/// A place a receiver can open event sessions against.
#[async_trait]
pub trait EventSource: Send + Sync + fmt::Debug {
    /// Source URL, for log context.
    fn url(&self) -> &str;

    /// Opens a new session.
    ///
    /// # Errors
    ///
    /// Returns `StreamError` if the session cannot be established.
    async fn connect(&self) -> Result<EventStream>;
}

/// Configuration for the SSE HTTP client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SseConfig {
    /// Timeout for establishing the TCP/TLS connection.
    pub connect_timeout: Duration,
    /// User agent for stream requests.
    pub user_agent: String,
}

impl Default for SseConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            user_agent: concat!("hookrelay/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Server-sent events over HTTP.
#[derive(Debug, Clone)]
pub struct SseSource {
    client: reqwest::Client,
    url: String,
}

impl SseSource {
    /// Creates a source for `url` with its own HTTP client.
    ///
    /// The client has no overall request timeout: a session is expected to
    /// stay open indefinitely.
    ///
    /// # Errors
    ///
    /// Returns `StreamError::Configuration` if the HTTP client cannot be
    /// built.
    pub fn new(url: impl Into<String>, config: &SseConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| StreamError::Configuration {
                message: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self::with_client(client, url))
    }

    /// Creates a source sharing an existing HTTP client.
    pub fn with_client(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self { client, url: url.into() }
    }
}

#[async_trait]
impl EventSource for SseSource {
    fn url(&self) -> &str {
        &self.url
    }

    async fn connect(&self) -> Result<EventStream> {
        let response = self
            .client
            .get(&self.url)
            .header(ACCEPT, "text/event-stream")
            .header(CACHE_CONTROL, "no-cache")
            .send()
            .await
            .map_err(|e| StreamError::connect(&self.url, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(StreamError::Status { url: self.url.clone(), status: status.as_u16() });
        }
        debug!(url = %self.url, status = status.as_u16(), "stream attached");

        let frames = response.bytes_stream().eventsource().map(|frame| {
            frame
                .map(|event| RawEvent::new(event.event.as_str(), event.id, event.data))
                .map_err(|e| StreamError::transport(e.to_string()))
        });

        Ok(frames.boxed())
    }
}

#[cfg(test)]
mod tests {
    use futures::TryStreamExt;
    use hookrelay_core::EventKind;
    use wiremock::{matchers, Mock, MockServer, ResponseTemplate};

    use super::*;

    #[tokio::test]
    async fn frames_are_parsed_in_order() {
        let mock_server = MockServer::start().await;
        let body = "event: ready\ndata: {}\n\n\
                    id: 1\nevent: message\ndata: {\"body\":{}}\n\n\
                    event: ping\ndata: 1700000000\n\n";

        Mock::given(matchers::method("GET"))
            .and(matchers::path("/channel"))
            .and(matchers::header("accept", "text/event-stream"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/event-stream")
                    .set_body_string(body),
            )
            .mount(&mock_server)
            .await;

        let url = format!("{}/channel", mock_server.uri());
        let source = SseSource::new(url, &SseConfig::default()).unwrap();
        let frames: Vec<RawEvent> = source.connect().await.unwrap().try_collect().await.unwrap();

        let kinds: Vec<EventKind> = frames.iter().map(|frame| frame.kind.clone()).collect();
        assert_eq!(kinds, vec![EventKind::Ready, EventKind::Message, EventKind::Ping]);
        assert_eq!(frames[1].id, "1");
        assert_eq!(frames[1].data, r#"{"body":{}}"#);
    }

    #[tokio::test]
    async fn error_status_fails_connect() {
        let mock_server = MockServer::start().await;
        Mock::given(matchers::method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&mock_server)
            .await;

        let source = SseSource::new(mock_server.uri(), &SseConfig::default()).unwrap();
        let error = source.connect().await.err().unwrap();

        assert!(matches!(error, StreamError::Status { status: 503, .. }));
    }

    #[tokio::test]
    async fn unreachable_source_fails_connect() {
        let source = SseSource::new("http://127.0.0.1:9/channel", &SseConfig::default()).unwrap();
        let error = source.connect().await.err().unwrap();

        assert!(matches!(error, StreamError::Connect { .. }));
    }
}
