//! HTTP client for forwarding decoded webhooks.
//!
//! Sends the canonical body with the envelope's headers to the forward
//! target. Failures are categorized and returned to the caller, which logs
//! them; nothing here retries.

use std::{collections::BTreeMap, time::Duration};

use bytes::Bytes;
use hookrelay_core::DecodedMessage;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};
use tracing::{debug, info_span, warn, Instrument};

use crate::error::{DeliveryError, Result};

/// Configuration for the forwarding client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Timeout for a single forward request.
    pub timeout: Duration,
    /// User agent sent when the envelope carries none.
    pub user_agent: String,
    /// Maximum number of redirects to follow.
    pub max_redirects: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(crate::DEFAULT_TIMEOUT_SECONDS),
            user_agent: concat!("hookrelay/", env!("CARGO_PKG_VERSION")).to_string(),
            max_redirects: 3,
        }
    }
}

/// Client that POSTs decoded webhooks to a target URL.
///
/// Cheap to clone; clones share one connection pool.
#[derive(Debug, Clone)]
pub struct ForwardClient {
    client: reqwest::Client,
    config: ClientConfig,
}

/// Outcome of a forward request that reached the target.
#[derive(Debug, Clone)]
pub struct ForwardResponse {
    /// HTTP status code.
    pub status_code: u16,
    /// Total duration of the request.
    pub duration: Duration,
    /// Whether the status was 2xx.
    pub is_success: bool,
}

impl ForwardClient {
    /// Creates a forwarding client with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns `DeliveryError::Configuration` if the HTTP client cannot be
    /// built with the provided settings.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects as usize))
            .build()
            .map_err(|e| {
                DeliveryError::configuration(format!("failed to build HTTP client: {e}"))
            })?;

        Ok(Self { client, config })
    }

    /// Creates a forwarding client with default configuration.
    pub fn with_defaults() -> Result<Self> {
        Self::new(ClientConfig::default())
    }

    /// POSTs a decoded message to `url`.
    ///
    /// Any status code is a successful forward from the client's point of
    /// view; the caller decides how to log non-2xx responses.
    ///
    /// # Errors
    ///
    /// - `Timeout` when the request exceeds the configured timeout
    /// - `Network` for connection and other transport failures
    pub async fn post(&self, url: &str, message: &DecodedMessage) -> Result<ForwardResponse> {
        let span = info_span!("forward", url = %url, body_len = message.body.len());

        async move {
            let start_time = std::time::Instant::now();

            let response = self
                .client
                .post(url)
                .headers(forward_headers(&message.headers))
                .body(Bytes::from(message.body.clone()))
                .send()
                .await
                .map_err(|e| {
                    if e.is_timeout() {
                        DeliveryError::timeout(url, self.config.timeout.as_secs())
                    } else if e.is_connect() {
                        DeliveryError::network(url, format!("connection failed: {e}"))
                    } else {
                        DeliveryError::network(url, e.to_string())
                    }
                })?;

            let duration = start_time.elapsed();
            let status = response.status();
            debug!(
                status = status.as_u16(),
                duration_ms = duration.as_millis(),
                "received response"
            );

            Ok(ForwardResponse {
                status_code: status.as_u16(),
                duration,
                is_success: status.is_success(),
            })
        }
        .instrument(span)
        .await
    }
}

/// Builds the outgoing header map from envelope headers.
///
/// Headers owned by the HTTP client and names or values that are not valid
/// HTTP are skipped.
fn forward_headers(headers: &BTreeMap<String, String>) -> HeaderMap {
    let mut map = HeaderMap::with_capacity(headers.len());

    for (key, value) in headers {
        if is_managed_header(key) {
            continue;
        }
        let name = match HeaderName::from_bytes(key.as_bytes()) {
            Ok(name) => name,
            Err(_) => {
                warn!(header = %key, "skipping invalid header name");
                continue;
            },
        };
        let value = match HeaderValue::from_str(value) {
            Ok(value) => value,
            Err(_) => {
                warn!(header = %key, "skipping invalid header value");
                continue;
            },
        };
        map.insert(name, value);
    }

    map
}

/// Checks if a header is managed by the HTTP client and must not be copied
/// from the envelope.
fn is_managed_header(header_name: &str) -> bool {
    let lowercase = header_name.to_lowercase();
    lowercase.starts_with("proxy-")
        || matches!(
            lowercase.as_str(),
            "content-length"
                | "connection"
                | "keep-alive"
                | "te"
                | "trailer"
                | "transfer-encoding"
                | "upgrade"
        )
}
