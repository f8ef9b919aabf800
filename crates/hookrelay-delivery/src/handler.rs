//! Destinations for decoded messages.
//!
//! A dispatch worker hands every successfully decoded `message` event to one
//! `MessageHandler`. `ForwardHandler` POSTs it to a target URL and
//! `ShowHandler` only logs it.

use std::fmt;

use async_trait::async_trait;
use hookrelay_core::DecodedMessage;
use tracing::{info, trace, warn};

use crate::{client::ForwardClient, error::Result};

/// Receives decoded messages from dispatch workers.
///
/// Implementations must be safe to call from many workers at once. An error
/// returned here is logged by the worker against the event that produced it
/// and never stops the worker.
#[async_trait]
pub trait MessageHandler: Send + Sync + fmt::Debug {
    /// Handles one decoded message.
    async fn handle(&self, message: DecodedMessage) -> Result<()>;
}

/// Forwards decoded messages to a fixed target URL.
#[derive(Debug, Clone)]
pub struct ForwardHandler {
    client: ForwardClient,
    target: String,
}

impl ForwardHandler {
    /// Creates a handler forwarding to `target`.
    pub fn new(client: ForwardClient, target: impl Into<String>) -> Self {
        Self { client, target: target.into() }
    }

    /// Returns the forward target URL.
    pub fn target(&self) -> &str {
        &self.target
    }
}

#[async_trait]
impl MessageHandler for ForwardHandler {
    async fn handle(&self, message: DecodedMessage) -> Result<()> {
        trace!(headers = ?message.headers, body = %message.body, "forwarding message");

        let response = self.client.post(&self.target, &message).await?;
        if response.is_success {
            info!(
                status = response.status_code,
                duration_ms = response.duration.as_millis(),
                "POST {} - {}",
                self.target,
                response.status_code
            );
        } else {
            warn!(
                status = response.status_code,
                duration_ms = response.duration.as_millis(),
                "POST {} - {}",
                self.target,
                response.status_code
            );
        }
        Ok(())
    }
}

/// Logs decoded messages instead of forwarding them.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShowHandler;

#[async_trait]
impl MessageHandler for ShowHandler {
    async fn handle(&self, message: DecodedMessage) -> Result<()> {
        info!("Headers: {:?}\nBody: {}", message.headers, message.body);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use wiremock::{matchers, Mock, MockServer, ResponseTemplate};

    use super::*;

    fn message() -> DecodedMessage {
        let mut headers = BTreeMap::new();
        headers.insert("x-test".to_string(), "v".to_string());
        DecodedMessage { headers, body: r#"{"a":1}"#.to_string() }
    }

    #[tokio::test]
    async fn show_handler_never_fails() {
        assert!(ShowHandler.handle(message()).await.is_ok());
    }

    #[tokio::test]
    async fn forward_handler_posts_to_target() {
        let mock_server = MockServer::start().await;
        Mock::given(matchers::method("POST"))
            .and(matchers::path("/change_hook/github"))
            .and(matchers::header("x-test", "v"))
            .respond_with(ResponseTemplate::new(202))
            .expect(1)
            .mount(&mock_server)
            .await;

        let target = format!("{}/change_hook/github", mock_server.uri());
        let handler = ForwardHandler::new(ForwardClient::with_defaults().unwrap(), target.clone());
        assert_eq!(handler.target(), target);

        handler.handle(message()).await.unwrap();
    }

    #[tokio::test]
    async fn forward_handler_treats_error_status_as_handled() {
        let mock_server = MockServer::start().await;
        Mock::given(matchers::method("POST"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        let handler =
            ForwardHandler::new(ForwardClient::with_defaults().unwrap(), mock_server.uri());

        assert!(handler.handle(message()).await.is_ok());
    }

    #[tokio::test]
    async fn forward_handler_surfaces_transport_failure() {
        let handler = ForwardHandler::new(
            ForwardClient::with_defaults().unwrap(),
            "http://127.0.0.1:9/unreachable",
        );

        let error = handler.handle(message()).await.unwrap_err();
        assert!(error.is_transport());
    }
}
